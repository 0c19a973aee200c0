mod credential;
mod file_data;

pub use self::{
    credential::{Address, AuthData, Credential, TicketTimes},
    file_data::KdcTimeOffset,
};
use crate::{context, Error, Principal};
use anyhow::Context;
use std::{
    env, fs,
    io::{self, Write},
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::debug;

const KRB5_ENV_CCNAME: &str = "KRB5CCNAME";
const DEFCCNAME: &str = "FILE:/tmp/krb5cc_%{uid}";
const CACHE_FILE_MODE: u32 = 0o600;

/// In-memory image of a FILE credential cache: a default principal and the
/// credentials that follow it, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialCache {
    pub default_principal: Principal,
    pub time_offset: Option<KdcTimeOffset>,
    pub credentials: Vec<Credential>,
}

impl CredentialCache {
    pub fn new(default_principal: Principal, credentials: Vec<Credential>) -> Self {
        Self {
            default_principal,
            time_offset: None,
            credentials,
        }
    }

    pub fn encode(&self) -> anyhow::Result<Vec<u8>> {
        file_data::encode(self)
    }

    pub fn decode(data: &[u8]) -> anyhow::Result<Self> {
        file_data::decode(data)
    }

    /// Path of the default cache: `KRB5CCNAME` when set, otherwise
    /// `/tmp/krb5cc_<uid>`.
    pub fn default_name() -> anyhow::Result<PathBuf> {
        let name = env::var(KRB5_ENV_CCNAME).unwrap_or_else(|_| DEFCCNAME.to_owned());
        Self::resolve(&name)
    }

    /// Resolves a cache name to a file path. Only the `FILE` type exists.
    pub fn resolve(name: &str) -> anyhow::Result<PathBuf> {
        let residual = match name.split_once(':') {
            None => name,
            // Use `FILE` when prefix is a drive letter
            Some((p, _)) if p.len() == 1 && p.as_bytes()[0].is_ascii_alphabetic() => name,
            Some(("FILE", residual)) => residual,
            Some((prefix, _)) => Err(Error::KRB5_CC_UNKNOWN_TYPE)
                .with_context(|| format!("cache type {} is not supported", prefix))?,
        };
        Ok(PathBuf::from(context::expand_path_tokens(residual)?))
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.try_exists().context(Error::KRB5_CC_IO)? {
            Err(Error::KRB5_FCC_NOFILE).with_context(|| format!("{}", path.display()))?
        }
        let data = fs::read(path)
            .context(Error::KRB5_CC_IO)
            .with_context(|| format!("while reading {}", path.display()))?;
        Self::decode(&data).with_context(|| format!("while decoding {}", path.display()))
    }

    /// Writes the cache to `path`. The file is replaced atomically so readers
    /// never see a partial cache, and is readable by its owner only.
    pub fn store(&self, path: &Path) -> anyhow::Result<()> {
        if self.credentials.is_empty() {
            Err(Error::KRB5_CC_NOTFOUND).context("refusing to write a cache without tickets")?
        }
        let data = self.encode()?;
        write_atomically(path, &data)
            .context(Error::KRB5_CC_IO)
            .with_context(|| format!("while writing {}", path.display()))?;
        debug!(path = %path.display(), bytes = data.len(), "credentials cache written");
        Ok(())
    }

    /// The ticket-granting ticket for the default principal's realm, else the
    /// first usable credential.
    pub fn tgt(&self) -> Option<&Credential> {
        let realm = &self.default_principal.realm;
        let usable = || {
            self.credentials
                .iter()
                .filter(|credential| !credential.is_config() && !credential.is_removed())
        };
        usable()
            .find(|credential| credential.server.is_local_tgt(realm))
            .or_else(|| usable().next())
    }
}

fn write_atomically(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(data)?;
    file.as_file()
        .set_permissions(fs::Permissions::from_mode(CACHE_FILE_MODE))?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Enctype, KdcTicket, NameType};
    use chrono::{Duration, Utc};

    fn credential(server: Principal) -> Credential {
        let now = Utc::now();
        Credential::from_kdc_ticket(&KdcTicket {
            client: Principal::new(NameType::PRINCIPAL, "REALM.COM", &["alice"]),
            server,
            session_key_type: Enctype::AES128_CTS_HMAC_SHA1_96,
            session_key: vec![1; 16],
            auth_time: now,
            start_time: now,
            end_time: now + Duration::hours(10),
            renew_till: None,
            forwardable: false,
            forwarded: false,
            proxiable: false,
            proxy: false,
            postdated: false,
            renewable: false,
            encoded: vec![0x61, 0x00],
        })
    }

    fn cache() -> CredentialCache {
        CredentialCache::new(
            Principal::new(NameType::PRINCIPAL, "REALM.COM", &["alice"]),
            vec![
                credential(Principal::new(NameType::SRV_HST, "REALM.COM", &["HTTP", "web"])),
                credential(Principal::tgs("REALM.COM")),
            ],
        )
    }

    #[test]
    fn store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("krb5cc_alice");
        let cache = cache();
        cache.store(&path).unwrap();
        assert_eq!(CredentialCache::load(&path).unwrap(), cache);
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn store_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("krb5cc_alice");
        fs::write(&path, b"stale contents that are longer than nothing").unwrap();
        let cache = cache();
        cache.store(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), cache.encode().unwrap());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn refuses_to_store_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("krb5cc_empty");
        let cache = CredentialCache::new(Principal::tgs("REALM.COM"), vec![]);
        let err = cache.store(&path).unwrap_err();
        assert!(Error::KRB5_CC_NOTFOUND.matches(&err));
        assert!(!path.exists());
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = CredentialCache::load(&dir.path().join("absent")).unwrap_err();
        assert!(Error::KRB5_FCC_NOFILE.matches(&err));
    }

    #[test]
    fn tgt_prefers_local_krbtgt() {
        let cache = cache();
        assert!(cache.tgt().unwrap().server.is_local_tgt("REALM.COM"));

        let only_service = CredentialCache::new(
            cache.default_principal.clone(),
            cache.credentials[..1].to_vec(),
        );
        assert_eq!(only_service.tgt(), only_service.credentials.first());
        assert_eq!(CredentialCache::new(Principal::tgs("R"), vec![]).tgt(), None);
    }

    #[test]
    fn resolves_cache_names() {
        assert_eq!(
            CredentialCache::resolve("FILE:/tmp/krb5cc_test").unwrap(),
            PathBuf::from("/tmp/krb5cc_test")
        );
        assert_eq!(
            CredentialCache::resolve("/var/tmp/cc").unwrap(),
            PathBuf::from("/var/tmp/cc")
        );
        let err = CredentialCache::resolve("KEYRING:persistent:0").unwrap_err();
        assert!(Error::KRB5_CC_UNKNOWN_TYPE.matches(&err));
    }
}
