/// Encryption type of a session key, stored as a 16-bit value in the
/// credential cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Enctype(pub i16);

macro_rules! enctype {
    ($enctype:ident, $int:expr) => {
        pub const $enctype: Enctype = Enctype($int);
    };
}

impl Enctype {
    enctype!(NULL, 0x0000);
    // @deprecated no longer supported
    enctype!(DES_CBC_CRC, 0x0001);
    // @deprecated no longer supported
    enctype!(DES_CBC_MD4, 0x0002);
    // @deprecated no longer supported
    enctype!(DES_CBC_MD5, 0x0003);
    // @deprecated DES-3 cbc mode raw
    enctype!(DES3_CBC_RAW, 0x0006);
    enctype!(DES3_CBC_SHA1, 0x0010);
    // RFC 3962
    enctype!(AES128_CTS_HMAC_SHA1_96, 0x0011);
    // RFC 3962
    enctype!(AES256_CTS_HMAC_SHA1_96, 0x0012);
    // RFC 8009
    enctype!(AES128_CTS_HMAC_SHA256_128, 0x0013);
    // RFC 8009
    enctype!(AES256_CTS_HMAC_SHA384_192, 0x0014);
    // RFC 4757
    enctype!(ARCFOUR_HMAC, 0x0017);
    // RFC 4757
    enctype!(ARCFOUR_HMAC_EXP, 0x0018);
    // RFC 6803
    enctype!(CAMELLIA128_CTS_CMAC, 0x0019);
    // RFC 6803
    enctype!(CAMELLIA256_CTS_CMAC, 0x001a);

    /// Session keys whose type the KDC left unreported are assumed to be
    /// AES256-CTS-HMAC-SHA1-96.
    pub fn or_default(self) -> Self {
        if self == Self::NULL {
            Self::AES256_CTS_HMAC_SHA1_96
        } else {
            self
        }
    }

    pub fn name(&self) -> Option<&'static str> {
        ENCTYPE_NAMES
            .iter()
            .find(|(enctype, _)| enctype == self)
            .map(|(_, name)| *name)
    }

    /// Human-readable name, falling back to the numeric value.
    pub fn display_name(&self) -> String {
        match self.name() {
            Some(name) => name.to_owned(),
            None => format!("etype {}", self.0),
        }
    }
}

const ENCTYPE_NAMES: [(Enctype, &str); 13] = [
    (Enctype::DES_CBC_CRC, "DEPRECATED:des-cbc-crc"),
    (Enctype::DES_CBC_MD4, "DEPRECATED:des-cbc-md4"),
    (Enctype::DES_CBC_MD5, "DEPRECATED:des-cbc-md5"),
    (Enctype::DES3_CBC_RAW, "DEPRECATED:des3-cbc-raw"),
    (Enctype::DES3_CBC_SHA1, "DEPRECATED:des3-cbc-sha1"),
    (Enctype::AES128_CTS_HMAC_SHA1_96, "aes128-cts-hmac-sha1-96"),
    (Enctype::AES256_CTS_HMAC_SHA1_96, "aes256-cts-hmac-sha1-96"),
    (Enctype::AES128_CTS_HMAC_SHA256_128, "aes128-cts-hmac-sha256-128"),
    (Enctype::AES256_CTS_HMAC_SHA384_192, "aes256-cts-hmac-sha384-192"),
    (Enctype::ARCFOUR_HMAC, "DEPRECATED:arcfour-hmac"),
    (Enctype::ARCFOUR_HMAC_EXP, "DEPRECATED:arcfour-hmac-exp"),
    (Enctype::CAMELLIA128_CTS_CMAC, "camellia128-cts-cmac"),
    (Enctype::CAMELLIA256_CTS_CMAC, "camellia256-cts-cmac"),
];
