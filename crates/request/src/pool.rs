use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
use fastant::{Atomic, Instant};
use parking_lot::RwLock;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::{Error, error::Result, route::Route};

/// Holds one connection slot on a route and one in the global budget until
/// dropped.
pub struct Lease {
    route: Route,
    last_used: Arc<Atomic>,
    _route_slot: OwnedSemaphorePermit,
    _total_slot: OwnedSemaphorePermit,
}

impl Lease {
    #[must_use]
    pub const fn route(&self) -> &Route {
        &self.route
    }
}

impl core::fmt::Debug for Lease {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Lease")
            .field("route", &self.route)
            .finish_non_exhaustive()
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.last_used.store(Instant::now(), Ordering::Relaxed);
    }
}

struct RouteEntry {
    slots: Arc<Semaphore>,
    last_used: Arc<Atomic>,
}

impl RouteEntry {
    fn new(max_per_route: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_per_route)),
            last_used: Arc::new(Atomic::new(Instant::now())),
        }
    }

    /// Only the map holds the semaphore: no lease is out and nobody is waiting.
    fn is_unreferenced(&self) -> bool {
        Arc::strong_count(&self.slots) == 1
    }
}

/// Point-in-time view of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections currently leased across all routes.
    pub leased: usize,
    pub max_total: usize,
    pub max_per_route: usize,
    /// Routes with a live bucket.
    pub routes: usize,
}

/// Shared transport plus the connection budgets it is leased under.
///
/// Internally synchronized; every client handle of a factory holds the same
/// manager behind an `Arc`.
pub struct PoolManager {
    transport: RwLock<Option<reqwest::Client>>,
    total: Arc<Semaphore>,
    routes: DashMap<Route, RouteEntry>,
    max_total: usize,
    max_per_route: usize,
    shutdown: AtomicBool,
}

impl PoolManager {
    pub fn new(transport: reqwest::Client, max_total: usize, max_per_route: usize) -> Self {
        Self {
            transport: RwLock::new(Some(transport)),
            total: Arc::new(Semaphore::new(max_total)),
            routes: DashMap::new(),
            max_total,
            max_per_route,
            shutdown: AtomicBool::new(false),
        }
    }

    /// Wait up to `wait` for a slot on `route` and in the global budget.
    ///
    /// # Errors
    /// [`Error::PoolTimeout`] if no slot frees up in time, [`Error::PoolShutdown`]
    /// if the pool is closed before or while waiting.
    pub async fn lease(&self, route: &Route, wait: Duration) -> Result<Lease> {
        if self.is_shutdown() {
            return Err(Error::PoolShutdown);
        }

        let (slots, last_used) = {
            let entry = self
                .routes
                .entry(route.clone())
                .or_insert_with(|| RouteEntry::new(self.max_per_route));
            (Arc::clone(&entry.slots), Arc::clone(&entry.last_used))
        };
        let total = Arc::clone(&self.total);

        // Route slot first, then global: holders of a global slot never wait
        // on a route slot, so the two budgets cannot deadlock.
        let acquire = async move {
            let route_slot = slots.acquire_owned().await?;
            let total_slot = total.acquire_owned().await?;
            Ok::<_, tokio::sync::AcquireError>((route_slot, total_slot))
        };

        match tokio::time::timeout(wait, acquire).await {
            Ok(Ok((route_slot, total_slot))) => {
                last_used.store(Instant::now(), Ordering::Relaxed);
                Ok(Lease {
                    route: route.clone(),
                    last_used,
                    _route_slot: route_slot,
                    _total_slot: total_slot,
                })
            }
            Ok(Err(_closed)) => Err(Error::PoolShutdown),
            Err(_elapsed) => Err(Error::PoolTimeout {
                route: route.clone(),
                waited: wait,
            }),
        }
    }

    /// The shared transport. Cloning is cheap and shares its connections.
    ///
    /// # Errors
    /// [`Error::PoolShutdown`] once the pool is closed.
    pub fn transport(&self) -> Result<reqwest::Client> {
        self.transport.read().clone().ok_or(Error::PoolShutdown)
    }

    /// Drop route buckets that nobody references and that have been idle
    /// for at least `max_idle`.
    pub fn cleanup(&self, max_idle: Duration) {
        let now = Instant::now();
        self.routes.retain(|route, entry| {
            let idle = entry.is_unreferenced()
                && now.duration_since(entry.last_used.load(Ordering::Relaxed)) >= max_idle;
            if idle {
                debug!(%route, "evicting idle route");
            }
            !idle
        });
    }

    /// Close both budgets and release the transport. Waiters and later
    /// leases fail with [`Error::PoolShutdown`]; in-flight requests keep
    /// their own transport handle until they finish. Returns `false` if the
    /// pool was already shut down.
    pub fn shutdown(&self) -> bool {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.total.close();
        for entry in &self.routes {
            entry.slots.close();
        }
        self.routes.clear();
        self.transport.write().take();
        true
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            leased: self.max_total - self.total.available_permits(),
            max_total: self.max_total,
            max_per_route: self.max_per_route,
            routes: self.routes.len(),
        }
    }
}
