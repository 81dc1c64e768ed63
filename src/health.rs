// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

//! # Session Store Health Monitor
//!
//! Background task that pings the session store and drives the readiness
//! probe. It never touches session state.
//!
//! ## Strategy
//!
//! - While the store answers, ping every `healthy_interval` (default 5 s).
//! - After a failed ping, mark the gateway not ready and retry every
//!   `retry_interval` (default 1 s) until the store answers again.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::session::SessionStore;

const DEFAULT_HEALTHY_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Shared ready/not-ready flag read by the readiness probe.
#[derive(Debug, Clone)]
pub struct Readiness(Arc<AtomicBool>);

impl Readiness {
    pub fn new(ready: bool) -> Self {
        Self(Arc::new(AtomicBool::new(ready)))
    }

    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Returns the previous state.
    pub fn set(&self, ready: bool) -> bool {
        self.0.swap(ready, Ordering::AcqRel)
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new(true)
    }
}

pub struct StoreHealthMonitor {
    store: Arc<dyn SessionStore>,
    readiness: Readiness,
    healthy_interval: Duration,
    retry_interval: Duration,
}

impl StoreHealthMonitor {
    pub fn new(store: Arc<dyn SessionStore>, readiness: Readiness) -> Self {
        Self {
            store,
            readiness,
            healthy_interval: DEFAULT_HEALTHY_INTERVAL,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    pub fn with_intervals(mut self, healthy: Duration, retry: Duration) -> Self {
        self.healthy_interval = healthy;
        self.retry_interval = retry;
        self
    }

    /// Run until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(monitor.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.healthy_interval.as_secs(),
            "Session store health monitor starting"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let delay = if self.check().await {
                self.healthy_interval
            } else {
                self.retry_interval
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {},
                _ = shutdown.cancelled() => break,
            }
        }
        info!("Session store health monitor shutting down");
    }

    /// One ping. Returns whether the store answered.
    async fn check(&self) -> bool {
        match self.store.ping().await {
            Ok(()) => {
                if !self.readiness.set(true) {
                    info!("Session store reachable again, gateway ready");
                }
                true
            }
            Err(e) => {
                if self.readiness.set(false) {
                    warn!(error = %e, "Session store unreachable, gateway not ready");
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::session::{SessionRecord, SessionStoreError, SessionToken};

    /// Store whose ping fails while `down` is set.
    struct FlakyStore {
        down: AtomicBool,
        pings: AtomicUsize,
    }

    #[async_trait]
    impl SessionStore for FlakyStore {
        async fn save(&self, _: &SessionToken, _: &SessionRecord) -> Result<(), SessionStoreError> {
            unimplemented!()
        }
        async fn get(&self, _: &SessionToken) -> Result<SessionRecord, SessionStoreError> {
            unimplemented!()
        }
        async fn exists(&self, _: &SessionToken) -> Result<bool, SessionStoreError> {
            unimplemented!()
        }
        async fn delete(&self, _: &SessionToken) -> Result<(), SessionStoreError> {
            unimplemented!()
        }
        async fn id_by_uuid(&self, _: Uuid) -> Result<SessionToken, SessionStoreError> {
            unimplemented!()
        }
        async fn ping(&self) -> Result<(), SessionStoreError> {
            self.pings.fetch_add(1, Ordering::SeqCst);
            if self.down.load(Ordering::SeqCst) {
                Err(SessionStoreError::BackendUnavailable("refused".into()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn readiness_follows_store() {
        let store = Arc::new(FlakyStore {
            down: AtomicBool::new(true),
            pings: AtomicUsize::new(0),
        });
        let readiness = Readiness::default();
        let monitor = StoreHealthMonitor::new(store.clone(), readiness.clone())
            .with_intervals(Duration::from_millis(50), Duration::from_millis(5));
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(monitor.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!readiness.is_ready());
        // Failures are retried on the short interval.
        assert!(store.pings.load(Ordering::SeqCst) >= 2);

        store.down.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(readiness.is_ready());

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn stops_when_cancelled() {
        let store = Arc::new(FlakyStore {
            down: AtomicBool::new(false),
            pings: AtomicUsize::new(0),
        });
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        StoreHealthMonitor::new(store.clone(), Readiness::default())
            .run(shutdown)
            .await;
        assert_eq!(store.pings.load(Ordering::SeqCst), 0);
    }
}
