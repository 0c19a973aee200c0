use crate::{
    renewal::{validate_interval, RenewalSettings},
    AuthProvider, ClientConfig, Credential, CredentialCache, CredentialStore, Error, Identity,
    Login, LoginOptions, LoginSource, Refresh, RenewalScheduler, SchedulerState,
};
use anyhow::Context;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Logs in through an [`AuthProvider`], mirrors the tickets to a ccache file
/// and keeps them fresh in the background.
pub struct KerberosClient {
    session: Arc<Session>,
    scheduler: RenewalScheduler,
    renewal: ArcSwap<RenewalSettings>,
}

struct Session {
    config: ClientConfig,
    provider: Arc<dyn AuthProvider>,
    store: Arc<CredentialStore>,
    /// Bumped on every logout. Holding the lock orders cache writes with
    /// store swaps, so the file always mirrors the published identity.
    generation: Mutex<u64>,
}

impl KerberosClient {
    pub fn new(config: ClientConfig, provider: Arc<dyn AuthProvider>) -> Self {
        let renewal = ArcSwap::from_pointee(config.renewal);
        Self {
            session: Arc::new(Session {
                config,
                provider,
                store: Arc::new(CredentialStore::new()),
                generation: Mutex::new(0),
            }),
            scheduler: RenewalScheduler::new(),
            renewal,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.session.config
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.session.store
    }

    pub fn identity(&self) -> Option<Arc<Identity>> {
        self.session.store.get()
    }

    /// Authenticates with the configured keytab and writes the tickets to the
    /// configured cache path.
    pub async fn login_with_keytab(&self) -> anyhow::Result<Arc<Identity>> {
        self.session.login_with_keytab().await
    }

    /// Establishes the identity from an existing cache file. The file is not
    /// rewritten.
    pub async fn login_from_cache(&self, path: impl AsRef<Path>) -> anyhow::Result<Arc<Identity>> {
        let path = path.as_ref();
        if !path.try_exists().context(Error::KRB5_CC_IO)? {
            Err(Error::KRB5_FCC_NOFILE).with_context(|| format!("{}", path.display()))?
        }
        let options = LoginOptions {
            ticket_cache_path: Some(path.to_owned()),
            ..LoginOptions::ticket_cache(&self.session.config)
        };
        let started = self.session.generation().await;
        let login = self.session.provider.authenticate_from_cache(&options).await?;
        let identity = Arc::new(Identity {
            cache: cache_of(&login),
            principal: login.principal,
            cache_path: path.to_owned(),
            source: LoginSource::TicketCache,
        });
        let generation = self.session.generation.lock().await;
        if *generation != started {
            Err(Error::NOT_LOGGED_IN).context("logged out while reading the ticket cache")?
        }
        info!(principal = %identity.principal, path = %path.display(), "logged in from ticket cache");
        self.session.store.set_arc(identity.clone());
        Ok(identity)
    }

    pub fn run_as<F, T>(&self, action: F) -> anyhow::Result<T>
    where
        F: FnOnce(&Identity) -> T,
    {
        self.session.store.run_as(action)
    }

    pub fn set_poll_interval(&self, poll_interval: Duration) -> anyhow::Result<()> {
        let poll_interval = validate_interval("poll interval", poll_interval)?;
        self.renewal.rcu(|settings| RenewalSettings {
            poll_interval,
            ..**settings
        });
        Ok(())
    }

    pub fn set_expiration_threshold(&self, expiry_threshold: Duration) -> anyhow::Result<()> {
        let expiry_threshold = validate_interval("expiry threshold", expiry_threshold)?;
        self.renewal.rcu(|settings| RenewalSettings {
            expiry_threshold,
            ..**settings
        });
        Ok(())
    }

    pub fn renewal_settings(&self) -> RenewalSettings {
        **self.renewal.load()
    }

    /// Starts background renewal with the current settings, replacing any
    /// renewal loop already running.
    pub async fn start_renewal(&self) -> anyhow::Result<()> {
        let settings = self.renewal_settings();
        self.scheduler
            .start(
                self.session.store.clone(),
                self.session.clone(),
                settings.poll_interval,
                settings.expiry_threshold,
            )
            .await
    }

    pub async fn stop_renewal(&self) {
        self.scheduler.stop().await;
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Stops renewal and forgets the identity. The cache file stays on disk.
    /// Logins and refreshes still in flight are discarded when they finish.
    pub async fn logout(&self) {
        self.scheduler.stop().await;
        let mut generation = self.session.generation.lock().await;
        *generation += 1;
        if let Some(identity) = self.session.store.get() {
            info!(principal = %identity.principal, "logged out");
        }
        self.session.store.clear();
    }
}

impl Session {
    async fn generation(&self) -> u64 {
        *self.generation.lock().await
    }

    async fn login_with_keytab(&self) -> anyhow::Result<Arc<Identity>> {
        let options = LoginOptions::keytab(&self.config);
        let started = self.generation().await;
        let login = self.provider.authenticate_with_keytab(&options).await?;
        let path = self.config.ticket_cache_path.clone();
        self.publish(started, login, path, LoginSource::Keytab).await
    }

    async fn renew_from_cache(&self) -> anyhow::Result<Arc<Identity>> {
        let path = match self.store.get() {
            Some(identity) => identity.cache_path.clone(),
            None => self.config.ticket_cache_path.clone(),
        };
        let options = LoginOptions {
            ticket_cache_path: Some(path.clone()),
            ..LoginOptions::ticket_cache(&self.config)
        };
        let started = self.generation().await;
        let login = self.provider.authenticate_from_cache(&options).await?;
        self.publish(started, login, path, LoginSource::TicketCache)
            .await
    }

    /// Persists a fresh login, then makes it the current identity. Nothing
    /// changes when persisting fails, or when a logout happened since
    /// `started`.
    async fn publish(
        &self,
        started: u64,
        login: Login,
        cache_path: PathBuf,
        source: LoginSource,
    ) -> anyhow::Result<Arc<Identity>> {
        if login.tickets.is_empty() {
            Err(Error::KRB5_CC_NOTFOUND)
                .with_context(|| format!("no tickets obtained for {}", login.principal))?
        }
        let cache = cache_of(&login);
        let generation = self.generation.lock().await;
        if *generation != started {
            warn!(principal = %login.principal, "discarding tickets obtained across a logout");
            Err(Error::NOT_LOGGED_IN).context("logged out while authenticating")?
        }
        cache.store(&cache_path)?;
        let identity = Arc::new(Identity {
            principal: login.principal,
            cache,
            cache_path,
            source,
        });
        info!(
            principal = %identity.principal,
            path = %identity.cache_path.display(),
            tickets = identity.cache.credentials.len(),
            "logged in"
        );
        self.store.set_arc(identity.clone());
        drop(generation);
        Ok(identity)
    }
}

fn cache_of(login: &Login) -> CredentialCache {
    CredentialCache::new(
        login.principal.clone(),
        login.tickets.iter().map(Credential::from_kdc_ticket).collect(),
    )
}

#[async_trait]
impl Refresh for Session {
    async fn refresh(&self) -> anyhow::Result<()> {
        match self.config.keytab_path {
            Some(_) => self.login_with_keytab().await?,
            None => self.renew_from_cache().await?,
        };
        Ok(())
    }
}
