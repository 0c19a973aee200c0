mod profile;

pub use self::profile::Profile;
use crate::{renewal::RenewalSettings, Error, Principal};
use anyhow::Context;
use nix::unistd::{Uid, User};
use std::{path::PathBuf, time::Duration};

const DEFAULT_TICKET_CACHE_PATH: &str = "/tmp/krb5cc_%{username}";

pub struct Conf;

macro_rules! conf {
    ($name:ident, $value:expr) => {
        pub const $name: &'static str = $value;
    };
}

impl Conf {
    conf!(KERBEROS, "kerberos");
    conf!(PRINCIPAL, "principal");
    conf!(KEYTAB_PATH, "keytab_path");
    conf!(KRB5_CONF_PATH, "krb5_conf_path");
    conf!(TICKET_CACHE_PATH, "ticket_cache_path");
    conf!(RENEWAL, "renewal");
    conf!(POLL_INTERVAL_MS, "poll_interval_ms");
    conf!(EXPIRY_THRESHOLD_MS, "expiry_threshold_ms");
}

/// Everything a client needs to log in and keep its cache fresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub principal: Principal,
    /// When set, logins and renewals authenticate with this keytab.
    pub keytab_path: Option<PathBuf>,
    /// Handed to the provider; the client never reads it.
    pub krb5_conf_path: Option<PathBuf>,
    pub ticket_cache_path: PathBuf,
    pub renewal: RenewalSettings,
}

impl ClientConfig {
    pub fn new(principal: Principal) -> anyhow::Result<Self> {
        Ok(Self {
            principal,
            keytab_path: None,
            krb5_conf_path: None,
            ticket_cache_path: PathBuf::from(expand_path_tokens(DEFAULT_TICKET_CACHE_PATH)?),
            renewal: RenewalSettings::default(),
        })
    }

    pub fn with_keytab(mut self, keytab_path: impl Into<PathBuf>) -> Self {
        self.keytab_path = Some(keytab_path.into());
        self
    }

    pub fn with_ticket_cache(mut self, ticket_cache_path: impl Into<PathBuf>) -> Self {
        self.ticket_cache_path = ticket_cache_path.into();
        self
    }

    pub fn load(filename: Option<&str>) -> anyhow::Result<Self> {
        let profile = Profile::new(filename).context("while loading client profile")?;
        Self::from_profile(&profile)
    }

    pub fn from_profile(profile: &Profile) -> anyhow::Result<Self> {
        let principal = get_string(profile, Conf::KERBEROS, Conf::PRINCIPAL)
            .ok_or(Error::KRB5_CONFIG_BADFORMAT)
            .context("kerberos.principal is not set")?;
        let principal = Principal::parse_name(&principal)?;
        let mut config = Self::new(principal)?;
        config.keytab_path = get_string(profile, Conf::KERBEROS, Conf::KEYTAB_PATH).map(PathBuf::from);
        config.krb5_conf_path =
            get_string(profile, Conf::KERBEROS, Conf::KRB5_CONF_PATH).map(PathBuf::from);
        if let Some(path) = get_string(profile, Conf::KERBEROS, Conf::TICKET_CACHE_PATH) {
            config.ticket_cache_path = PathBuf::from(expand_path_tokens(&path)?);
        }
        let poll_interval = get_millis(profile, Conf::RENEWAL, Conf::POLL_INTERVAL_MS)?
            .unwrap_or(config.renewal.poll_interval);
        let expiry_threshold = get_millis(profile, Conf::RENEWAL, Conf::EXPIRY_THRESHOLD_MS)?
            .unwrap_or(config.renewal.expiry_threshold);
        config.renewal = RenewalSettings::new(poll_interval, expiry_threshold)?;
        Ok(config)
    }
}

fn get_string(profile: &Profile, section: &str, name: &str) -> Option<String> {
    profile
        .get_string(&format!("{}.{}", section, name))
        .filter(|value| !value.is_empty())
}

fn get_millis(profile: &Profile, section: &str, name: &str) -> anyhow::Result<Option<Duration>> {
    let key = format!("{}.{}", section, name);
    if get_string(profile, section, name).is_none() {
        return Ok(None);
    }
    match profile.get_int(&key) {
        Some(millis) if millis >= 0 => Ok(Some(Duration::from_millis(millis as u64))),
        _ => Err(Error::KRB5_CONFIG_BADFORMAT).with_context(|| format!("{} is not a duration", key)),
    }
}

/// Expands `%{uid}`, `%{euid}` and `%{username}` in `path`.
pub fn expand_path_tokens(path: &str) -> anyhow::Result<String> {
    let mut buf = String::new();
    let mut path_remained = path;
    while !path_remained.is_empty() {
        let token_begin = match path_remained.find("%{") {
            Some(token_begin) => {
                buf.push_str(&path_remained[..token_begin]);
                token_begin
            }
            None => {
                buf.push_str(path_remained);
                break;
            }
        };
        let token_end = match path_remained[token_begin..].find('}') {
            Some(token_end) => token_begin + token_end,
            None => Err(Error::KRB5_CONFIG_BADFORMAT)
                .with_context(|| format!("unterminated token in {}", path))?,
        };
        buf.push_str(&expand_token(&path_remained[token_begin + 2..token_end])?);
        path_remained = &path_remained[token_end + 1..];
    }
    Ok(buf)
}

fn expand_token(token: &str) -> anyhow::Result<String> {
    let token_value = match token {
        "euid" => Uid::effective().to_string(),
        "username" => User::from_uid(Uid::effective())?
            .map(|u| u.name)
            .unwrap_or_else(|| Uid::effective().to_string()),
        "uid" | "USERID" => Uid::current().to_string(),
        _ => Err(Error::KRB5_CONFIG_BADFORMAT)
            .with_context(|| format!("unknown path token %{{{}}}", token))?,
    };
    Ok(token_value)
}
