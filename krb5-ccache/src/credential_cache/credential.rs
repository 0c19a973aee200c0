use crate::{Flags, KdcTicket, Keyblock, Principal, Timestamp};
use chrono::{DateTime, TimeZone, Utc};

pub(super) const CONF_REALM: &str = "X-CACHECONF:";
const CONF_NAME: &str = "krb5_ccache_conf_data";

type AddressType = u16;
type AuthDataType = u16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub client: Principal,
    pub server: Principal,
    pub keyblock: Keyblock,
    pub times: TicketTimes,
    pub is_skey: bool,
    pub ticket_flags: Flags,
    pub addresses: Vec<Address>,
    pub authdata: Vec<AuthData>,
    pub ticket: Vec<u8>,
    pub second_ticket: Vec<u8>,
}

macro_rules! ticket_flag {
    ($name:ident, $value:expr) => {
        pub const $name: Flags = $value;
    };
}

impl Credential {
    ticket_flag!(TKT_FLG_FORWARDABLE, 0x40000000);
    ticket_flag!(TKT_FLG_FORWARDED, 0x20000000);
    ticket_flag!(TKT_FLG_PROXIABLE, 0x10000000);
    ticket_flag!(TKT_FLG_PROXY, 0x08000000);
    ticket_flag!(TKT_FLG_MAY_POSTDATE, 0x04000000);
    ticket_flag!(TKT_FLG_POSTDATED, 0x02000000);
    ticket_flag!(TKT_FLG_INVALID, 0x01000000);
    ticket_flag!(TKT_FLG_RENEWABLE, 0x00800000);
    ticket_flag!(TKT_FLG_INITIAL, 0x00400000);
    ticket_flag!(TKT_FLG_PRE_AUTH, 0x00200000);
    ticket_flag!(TKT_FLG_HW_AUTH, 0x00100000);
    ticket_flag!(TKT_FLG_TRANSIT_POLICY_CHECKED, 0x00080000);
    ticket_flag!(TKT_FLG_OK_AS_DELEGATE, 0x00040000);
    ticket_flag!(TKT_FLG_ENC_PA_REP, 0x00010000);
    ticket_flag!(TKT_FLG_ANONYMOUS, 0x00008000);

    /// Converts a ticket handed back by the KDC exchange into a cache entry.
    /// Addresses, authdata and the second ticket are never carried over.
    pub fn from_kdc_ticket(ticket: &KdcTicket) -> Self {
        let times = TicketTimes {
            authtime: to_timestamp(&ticket.auth_time),
            starttime: to_timestamp(&ticket.start_time),
            endtime: to_timestamp(&ticket.end_time),
            renew_till: ticket.renew_till.as_ref().map(to_timestamp).unwrap_or(0),
        };
        Self {
            client: ticket.client.clone(),
            server: ticket.server.clone(),
            keyblock: Keyblock {
                enctype: ticket.session_key_type.or_default(),
                contents: ticket.session_key.clone(),
            },
            times,
            is_skey: false,
            ticket_flags: Self::flags_of(ticket),
            addresses: vec![],
            authdata: vec![],
            ticket: ticket.encoded.clone(),
            second_ticket: vec![],
        }
    }

    /// Every ticket we store was obtained by an initial, pre-authenticated
    /// exchange; the remaining bits follow the ticket's own attributes.
    pub fn flags_of(ticket: &KdcTicket) -> Flags {
        let mut flags = Self::TKT_FLG_INITIAL | Self::TKT_FLG_PRE_AUTH;
        let optional = [
            (ticket.forwardable, Self::TKT_FLG_FORWARDABLE),
            (ticket.forwarded, Self::TKT_FLG_FORWARDED),
            (ticket.proxiable, Self::TKT_FLG_PROXIABLE),
            (ticket.proxy, Self::TKT_FLG_PROXY),
            (ticket.postdated, Self::TKT_FLG_POSTDATED),
            (ticket.renewable, Self::TKT_FLG_RENEWABLE),
        ];
        for (set, flag) in optional {
            if set {
                flags |= flag;
            }
        }
        flags
    }

    #[inline]
    pub fn has_flag(&self, flag: Flags) -> bool {
        self.ticket_flags & flag != 0
    }

    #[inline]
    pub fn is_removed(&self) -> bool {
        self.times.endtime == 0 && self.times.authtime == -1
    }

    // Configuration entries are encoded as credential entries. The server
    // principal has the realm X-CACHECONF: and two or three components, the
    // first of which is krb5_ccache_conf_data. The configuration value is
    // stored in the ticket field of the entry.
    pub fn is_config(&self) -> bool {
        self.server.realm == CONF_REALM
            && self
                .server
                .components
                .first()
                .is_some_and(|component| component == CONF_NAME)
    }

    pub fn get_config(&self) -> Option<(&str, Option<&str>, &[u8])> {
        if !self.is_config() {
            return None;
        }
        let components = &self.server.components;
        let key = components.get(1)?;
        let principal = components.get(2).map(String::as_str);
        Some((key.as_str(), principal, self.ticket.as_slice()))
    }
}

// The file keeps 32-bit times which readers treat as unsigned, so keeping the
// low 32 bits stays correct until 2106.
fn to_timestamp(time: &DateTime<Utc>) -> Timestamp {
    time.timestamp() as Timestamp
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketTimes {
    pub authtime: Timestamp,
    pub starttime: Timestamp,
    pub endtime: Timestamp,
    pub renew_till: Timestamp,
}

impl TicketTimes {
    pub fn epoch_seconds(timestamp: Timestamp) -> i64 {
        timestamp as u32 as i64
    }

    pub fn to_datetime(timestamp: Timestamp) -> DateTime<Utc> {
        Utc.timestamp_opt(Self::epoch_seconds(timestamp), 0)
            .single()
            .unwrap_or_default()
    }

    pub fn end(&self) -> DateTime<Utc> {
        Self::to_datetime(self.endtime)
    }

    /// Start time, or the auth time when the KDC left it unset.
    pub fn start(&self) -> DateTime<Utc> {
        if self.starttime == 0 {
            Self::to_datetime(self.authtime)
        } else {
            Self::to_datetime(self.starttime)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub addrtype: AddressType,
    pub contents: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthData {
    pub ad_type: AuthDataType,
    pub contents: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Enctype, NameType};
    use chrono::Duration;

    fn kdc_ticket() -> KdcTicket {
        let auth_time = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        KdcTicket {
            client: Principal::new(NameType::PRINCIPAL, "REALM.COM", &["hdfs", "host"]),
            server: Principal::tgs("REALM.COM"),
            session_key_type: Enctype::NULL,
            session_key: vec![7; 32],
            auth_time,
            start_time: auth_time,
            end_time: auth_time + Duration::hours(1),
            renew_till: None,
            forwardable: false,
            forwarded: false,
            proxiable: false,
            proxy: false,
            postdated: false,
            renewable: false,
            encoded: vec![0x61, 0x03, 0x02, 0x01, 0x05],
        }
    }

    #[test]
    fn base_flags_are_always_present() {
        let flags = Credential::flags_of(&kdc_ticket());
        assert_eq!(flags, Credential::TKT_FLG_INITIAL | Credential::TKT_FLG_PRE_AUTH);
        assert_eq!(flags, 0x00600000);
    }

    #[test]
    fn each_attribute_sets_exactly_its_bit() {
        type Setter = fn(&mut KdcTicket);
        let cases: [(Setter, Flags); 6] = [
            (|t| t.forwardable = true, Credential::TKT_FLG_FORWARDABLE),
            (|t| t.forwarded = true, Credential::TKT_FLG_FORWARDED),
            (|t| t.proxiable = true, Credential::TKT_FLG_PROXIABLE),
            (|t| t.proxy = true, Credential::TKT_FLG_PROXY),
            (|t| t.postdated = true, Credential::TKT_FLG_POSTDATED),
            (|t| t.renewable = true, Credential::TKT_FLG_RENEWABLE),
        ];
        for (set, flag) in cases {
            let mut ticket = kdc_ticket();
            set(&mut ticket);
            let flags = Credential::flags_of(&ticket);
            assert_eq!(flags, 0x00600000 | flag);
        }
    }

    #[test]
    fn converts_kdc_ticket() {
        let mut ticket = kdc_ticket();
        ticket.renewable = true;
        ticket.renew_till = Some(ticket.auth_time + Duration::days(7));
        let credential = Credential::from_kdc_ticket(&ticket);
        assert_eq!(credential.keyblock.enctype, Enctype::AES256_CTS_HMAC_SHA1_96);
        assert_eq!(credential.times.authtime, 1_700_000_000);
        assert_eq!(credential.times.endtime, 1_700_003_600);
        assert_eq!(credential.times.renew_till, 1_700_604_800);
        assert!(credential.has_flag(Credential::TKT_FLG_RENEWABLE));
        assert!(!credential.is_skey);
        assert!(credential.addresses.is_empty() && credential.authdata.is_empty());
        assert!(credential.second_ticket.is_empty());
        assert_eq!(credential.ticket, ticket.encoded);
        assert_eq!(credential.times.end(), ticket.end_time);
    }

    #[test]
    fn absent_renew_till_is_zero() {
        let credential = Credential::from_kdc_ticket(&kdc_ticket());
        assert_eq!(credential.times.renew_till, 0);
    }

    #[test]
    fn recognises_config_entries() {
        let mut credential = Credential::from_kdc_ticket(&kdc_ticket());
        assert!(!credential.is_config());
        credential.server = Principal::new(
            NameType::PRINCIPAL,
            CONF_REALM,
            &[CONF_NAME, "fast_avail", "krbtgt/REALM.COM@REALM.COM"],
        );
        credential.ticket = b"yes".to_vec();
        assert_eq!(
            credential.get_config(),
            Some((
                "fast_avail",
                Some("krbtgt/REALM.COM@REALM.COM"),
                b"yes".as_slice()
            ))
        );
    }
}
