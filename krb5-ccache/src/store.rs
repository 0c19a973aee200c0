use crate::{CredentialCache, Error, Principal};
use arc_swap::ArcSwapOption;
use std::{path::PathBuf, sync::Arc};

/// How the current identity was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginSource {
    Keytab,
    TicketCache,
}

/// An authenticated identity and the tickets obtained for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub principal: Principal,
    pub cache: CredentialCache,
    /// The file this identity is persisted to, or was loaded from.
    pub cache_path: PathBuf,
    pub source: LoginSource,
}

/// Holds the current identity as an immutable snapshot. Writers replace the
/// snapshot whole; readers keep whatever snapshot they loaded.
#[derive(Debug, Default)]
pub struct CredentialStore {
    current: ArcSwapOption<Identity>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, identity: Identity) {
        self.set_arc(Arc::new(identity));
    }

    pub fn set_arc(&self, identity: Arc<Identity>) {
        self.current.store(Some(identity));
    }

    pub fn get(&self) -> Option<Arc<Identity>> {
        self.current.load_full()
    }

    pub fn clear(&self) {
        self.current.store(None);
    }

    pub fn is_logged_in(&self) -> bool {
        self.current.load().is_some()
    }

    /// Runs `action` against the current identity.
    pub fn run_as<F, T>(&self, action: F) -> anyhow::Result<T>
    where
        F: FnOnce(&Identity) -> T,
    {
        match self.get() {
            Some(identity) => Ok(action(identity.as_ref())),
            None => Err(Error::NOT_LOGGED_IN)?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NameType;

    fn identity(name: &str) -> Identity {
        let principal = Principal::new(NameType::PRINCIPAL, "REALM.COM", &[name]);
        Identity {
            principal: principal.clone(),
            cache: CredentialCache::new(principal, vec![]),
            cache_path: PathBuf::from("/tmp/krb5cc_test"),
            source: LoginSource::Keytab,
        }
    }

    #[test]
    fn run_as_before_login() {
        let store = CredentialStore::new();
        let err = store.run_as(|_| ()).unwrap_err();
        assert!(Error::NOT_LOGGED_IN.matches(&err));
        assert!(!store.is_logged_in());
    }

    #[test]
    fn readers_keep_their_snapshot() {
        let store = CredentialStore::new();
        store.set(identity("alice"));
        let before = store.get().unwrap();
        store.set(identity("bob"));
        assert_eq!(before.principal.components, ["alice"]);
        assert_eq!(
            store.run_as(|id| id.principal.to_string()).unwrap(),
            "bob@REALM.COM"
        );
        store.clear();
        assert!(store.get().is_none());
    }
}
