use crate::{ClientConfig, Enctype, Principal};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// A ticket as handed back by the KDC exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdcTicket {
    pub client: Principal,
    pub server: Principal,
    /// `Enctype::NULL` when the exchange did not report one.
    pub session_key_type: Enctype,
    pub session_key: Vec<u8>,
    pub auth_time: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub renew_till: Option<DateTime<Utc>>,
    pub forwardable: bool,
    pub forwarded: bool,
    pub proxiable: bool,
    pub proxy: bool,
    pub postdated: bool,
    pub renewable: bool,
    /// DER encoding of the ticket, kept opaque.
    pub encoded: Vec<u8>,
}

/// Result of a successful authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub principal: Principal,
    pub tickets: Vec<KdcTicket>,
}

/// Options passed to the provider for a single authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginOptions {
    pub principal: Option<Principal>,
    pub keytab_path: Option<PathBuf>,
    pub ticket_cache_path: Option<PathBuf>,
    pub krb5_conf_path: Option<PathBuf>,
    pub use_keytab: bool,
    pub use_ticket_cache: bool,
    pub renew_tgt: bool,
    pub store_key: bool,
    pub do_not_prompt: bool,
    pub is_initiator: bool,
    pub refresh_krb5_config: bool,
}

impl LoginOptions {
    fn common(config: &ClientConfig) -> Self {
        Self {
            principal: Some(config.principal.clone()),
            krb5_conf_path: config.krb5_conf_path.clone(),
            do_not_prompt: true,
            is_initiator: true,
            refresh_krb5_config: true,
            ..Default::default()
        }
    }

    pub fn keytab(config: &ClientConfig) -> Self {
        Self {
            keytab_path: config.keytab_path.clone(),
            use_keytab: true,
            store_key: true,
            ..Self::common(config)
        }
    }

    pub fn ticket_cache(config: &ClientConfig) -> Self {
        Self {
            ticket_cache_path: Some(config.ticket_cache_path.clone()),
            use_ticket_cache: true,
            renew_tgt: true,
            ..Self::common(config)
        }
    }
}

/// The KDC side of a login. Errors are surfaced to callers unchanged.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate_with_keytab(&self, options: &LoginOptions) -> anyhow::Result<Login>;

    async fn authenticate_from_cache(&self, options: &LoginOptions) -> anyhow::Result<Login>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::new(Principal::parse_name("hdfs/host@REALM.COM").unwrap())
            .unwrap()
            .with_keytab("/etc/security/hdfs.keytab")
            .with_ticket_cache("/tmp/krb5cc_test")
    }

    #[test]
    fn keytab_options() {
        let options = LoginOptions::keytab(&config());
        assert!(options.use_keytab && options.store_key);
        assert!(options.do_not_prompt && options.is_initiator && options.refresh_krb5_config);
        assert!(!options.use_ticket_cache && !options.renew_tgt);
        assert_eq!(options.keytab_path, Some(PathBuf::from("/etc/security/hdfs.keytab")));
        assert_eq!(options.ticket_cache_path, None);
    }

    #[test]
    fn ticket_cache_options() {
        let options = LoginOptions::ticket_cache(&config());
        assert!(options.use_ticket_cache && options.renew_tgt);
        assert!(!options.use_keytab && !options.store_key);
        assert_eq!(options.ticket_cache_path, Some(PathBuf::from("/tmp/krb5cc_test")));
        assert_eq!(options.principal.unwrap().to_string(), "hdfs/host@REALM.COM");
    }
}
