use crate::{CredentialStore, Error, TicketTimes};
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::{sleep, timeout},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const MIN_RENEWAL_INTERVAL: Duration = Duration::from_millis(1000);
pub const BACKOFF: Duration = Duration::from_secs(10);

/// How often the scheduler looks at the ticket, and how close to expiry a
/// ticket may get before it is refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalSettings {
    pub poll_interval: Duration,
    pub expiry_threshold: Duration,
}

impl Default for RenewalSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            expiry_threshold: Duration::from_secs(300),
        }
    }
}

impl RenewalSettings {
    pub fn new(poll_interval: Duration, expiry_threshold: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            poll_interval: validate_interval("poll interval", poll_interval)?,
            expiry_threshold: validate_interval("expiry threshold", expiry_threshold)?,
        })
    }
}

pub fn validate_interval(name: &str, value: Duration) -> anyhow::Result<Duration> {
    if value < MIN_RENEWAL_INTERVAL {
        Err(Error::RENEWAL_INTERVAL_TOO_SHORT)
            .with_context(|| format!("{} is {} ms", name, value.as_millis()))?
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Monitoring,
    Refreshing,
    Backoff,
    Stopped,
}

/// Re-acquires credentials and publishes them to the store.
#[async_trait]
pub trait Refresh: Send + Sync {
    async fn refresh(&self) -> anyhow::Result<()>;
}

struct Running {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
    poll_interval: Duration,
}

/// Background loop keeping the store's tickets ahead of their expiry.
pub struct RenewalScheduler {
    state: Arc<watch::Sender<SchedulerState>>,
    running: Mutex<Option<Running>>,
}

impl Default for RenewalScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RenewalScheduler {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            state: Arc::new(state),
            running: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Starts monitoring `store`. A loop already running is stopped first.
    pub async fn start(
        &self,
        store: Arc<CredentialStore>,
        refresher: Arc<dyn Refresh>,
        poll_interval: Duration,
        expiry_threshold: Duration,
    ) -> anyhow::Result<()> {
        let settings = RenewalSettings::new(poll_interval, expiry_threshold)?;
        let mut running = self.running.lock().await;
        if let Some(previous) = running.take() {
            shutdown(previous).await;
        }
        let token = CancellationToken::new();
        self.state.send_replace(SchedulerState::Monitoring);
        let handle = tokio::spawn(run(
            store,
            refresher,
            settings,
            token.clone(),
            self.state.clone(),
        ));
        info!(
            poll_interval_ms = settings.poll_interval.as_millis() as u64,
            expiry_threshold_ms = settings.expiry_threshold.as_millis() as u64,
            "renewal scheduler started"
        );
        *running = Some(Running {
            shutdown: token,
            handle,
            poll_interval: settings.poll_interval,
        });
        Ok(())
    }

    /// Cancels the loop and waits at most one poll interval for it to exit.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };
        shutdown(running).await;
        self.state.send_replace(SchedulerState::Stopped);
        info!("renewal scheduler stopped");
    }
}

async fn shutdown(running: Running) {
    running.shutdown.cancel();
    // A refresh still talking to the KDC is left to finish on its own.
    if timeout(running.poll_interval, running.handle).await.is_err() {
        warn!("renewal loop still busy after cancellation, detaching it");
    }
}

async fn run(
    store: Arc<CredentialStore>,
    refresher: Arc<dyn Refresh>,
    settings: RenewalSettings,
    shutdown: CancellationToken,
    state: Arc<watch::Sender<SchedulerState>>,
) {
    // Once cancelled, the loop no longer owns the published state.
    let publish = |new_state| {
        if !shutdown.is_cancelled() {
            state.send_replace(new_state);
        }
    };
    loop {
        tokio::select! {
            _ = sleep(settings.poll_interval) => {}
            _ = shutdown.cancelled() => return,
        }
        if !needs_refresh(&store, settings.expiry_threshold) {
            continue;
        }
        publish(SchedulerState::Refreshing);
        debug!("ticket close to expiry, refreshing");
        match refresher.refresh().await {
            Ok(()) => {
                info!("credentials refreshed");
                publish(SchedulerState::Monitoring);
            }
            Err(e) => {
                let error = format!("{:#}", e);
                warn!(
                    error = %error,
                    backoff_secs = BACKOFF.as_secs(),
                    "credential refresh failed"
                );
                publish(SchedulerState::Backoff);
                tokio::select! {
                    _ = sleep(BACKOFF) => {}
                    _ = shutdown.cancelled() => return,
                }
                publish(SchedulerState::Monitoring);
            }
        }
    }
}

fn needs_refresh(store: &CredentialStore, expiry_threshold: Duration) -> bool {
    let Some(identity) = store.get() else {
        return false;
    };
    let Some(tgt) = identity.cache.tgt() else {
        return false;
    };
    let remaining_ms =
        TicketTimes::epoch_seconds(tgt.times.endtime) * 1000 - Utc::now().timestamp_millis();
    remaining_ms < expiry_threshold.as_millis() as i64
}
