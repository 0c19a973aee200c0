use super::{error, Error};

impl Error {
    error!(
        KRB5_PARSE_MALFORMED,
        -1765328250, "Malformed representation of principal"
    );
    error!(KRB5_CC_NOTFOUND, -1765328243, "Matching credential not found");
    error!(
        KRB5_CONFIG_BADFORMAT,
        -1765328248, "Improper format of Kerberos configuration file"
    );
    error!(KRB5_FCC_NOFILE, -1765328189, "No credentials cache found");
    error!(KRB5_CC_FORMAT, -1765328185, "Bad format in credentials cache");
    error!(
        KRB5_CC_IO,
        -1765328191, "Credentials cache I/O operation failed"
    );
    error!(
        KRB5_CCACHE_BADVNO,
        -1765328149, "Credentials cache file format version not supported"
    );
    error!(KRB5_CC_UNKNOWN_TYPE, -1765328244, "Unknown credential cache type");
}
