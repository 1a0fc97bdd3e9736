use std::sync::Arc;

use parking_lot::Mutex;
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::{debug, warn};

use crate::{
    Client, ClientConfig, Error, FactoryBuilder, RequestConfig,
    error::Result,
    pool::{PoolManager, PoolStats},
};

struct Reaper {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Reaper {
    fn spawn(pool: &Arc<PoolManager>, max_idle: std::time::Duration) -> Option<Self> {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let pool = Arc::clone(pool);
                let (stop, mut stop_rx) = oneshot::channel::<()>();
                let task = handle.spawn(async move {
                    let mut interval = tokio::time::interval(max_idle / 2);
                    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

                    loop {
                        tokio::select! {
                            _ = &mut stop_rx => break,
                            _ = interval.tick() => pool.cleanup(max_idle),
                        }
                    }
                });
                Some(Self { stop, task })
            }
            Err(e) => {
                warn!("idle connection reaper not started: no tokio runtime available ({e})");
                None
            }
        }
    }

    fn stop(self) {
        let _ = self.stop.send(());
        self.task.abort();
    }
}

/// Owns a pooled HTTPS transport and hands out [`Client`]s that share it.
///
/// Dropping the factory closes the pool.
pub struct ClientFactory {
    pool: Arc<PoolManager>,
    config: ClientConfig,
    request_config: RequestConfig,
    reaper: Mutex<Option<Reaper>>,
}

impl ClientFactory {
    pub fn builder() -> FactoryBuilder {
        FactoryBuilder::new()
    }

    /// Build a factory with every tunable at its default.
    ///
    /// # Errors
    /// See [`FactoryBuilder::build`].
    pub fn with_defaults() -> Result<Self> {
        Self::builder().build()
    }

    pub(crate) fn build(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = config.build_transport()?;
        Ok(Self::with_transport(config, transport))
    }

    /// `config` must already be validated.
    pub(crate) fn with_transport(config: ClientConfig, transport: reqwest::Client) -> Self {
        let request_config = config.request_config();
        let pool = Arc::new(PoolManager::new(
            transport,
            config.max_total_connections_in_pool,
            config.max_connections_per_route,
        ));
        let reaper = Reaper::spawn(&pool, config.idle_connection_timeout());
        debug!(?config, "https client factory built");

        Self {
            pool,
            config,
            request_config,
            reaper: Mutex::new(reaper),
        }
    }

    /// Hand out a client that shares this factory's pool and timeouts.
    ///
    /// # Errors
    /// [`Error::PoolShutdown`] if the factory has been closed.
    pub fn create(&self) -> Result<Client> {
        if self.pool.is_shutdown() {
            return Err(Error::PoolShutdown);
        }
        Ok(Client::new(Arc::clone(&self.pool), self.request_config))
    }

    /// Shut the pool down: pending and future leases fail, idle connections
    /// are released once in-flight requests finish, and the reaper stops.
    /// Calling it again does nothing.
    pub fn close(&self) {
        if let Some(reaper) = self.reaper.lock().take() {
            reaper.stop();
        }
        if self.pool.shutdown() {
            debug!(stats = ?self.pool.stats(), "https client factory closed");
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub const fn request_config(&self) -> RequestConfig {
        self.request_config
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

impl Drop for ClientFactory {
    fn drop(&mut self) {
        self.close();
    }
}
