//! Connectivity gate
//!
//! The controller asks the gate before attempting any remote item. The answer
//! must be cheap and non-blocking, so implementations report a cached flag;
//! [`NetworkMonitor`] refreshes that flag from a background probe.

use mirp_common::config::NetworkSettings;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Reports whether the network route for remote items is usable
pub trait ConnectivityGate: Send + Sync {
    fn is_available(&self) -> bool;
}

/// Gate whose answer is set explicitly (offline mode and tests)
#[derive(Debug)]
pub struct StaticGate {
    available: AtomicBool,
}

impl StaticGate {
    pub fn new(available: bool) -> Self {
        Self {
            available: AtomicBool::new(available),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }
}

impl ConnectivityGate for StaticGate {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }
}

/// Periodic TCP reachability probe
///
/// Connects to `probe_addr` every `probe_interval_secs` and caches the
/// result. The first probe runs immediately on start. The probe task is
/// aborted when the monitor is dropped.
pub struct NetworkMonitor {
    available: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl NetworkMonitor {
    pub fn start(settings: &NetworkSettings) -> Self {
        let available = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&available);
        let addr = settings.probe_addr.clone();
        let interval = Duration::from_secs(settings.probe_interval_secs.max(1));
        let timeout = Duration::from_millis(settings.probe_timeout_ms);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut last: Option<bool> = None;

            loop {
                ticker.tick().await;
                let reachable = probe(&addr, timeout).await;
                flag.store(reachable, Ordering::Release);

                if last != Some(reachable) {
                    if reachable {
                        info!("Network route available (probe {})", addr);
                    } else {
                        warn!("Network route unavailable (probe {})", addr);
                    }
                    last = Some(reachable);
                }
            }
        });

        Self { available, handle }
    }
}

impl ConnectivityGate for NetworkMonitor {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }
}

impl Drop for NetworkMonitor {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn probe(addr: &str, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!("Connectivity probe to {} failed: {}", addr, e);
            false
        }
        Err(_) => {
            debug!("Connectivity probe to {} timed out", addr);
            false
        }
    }
}
