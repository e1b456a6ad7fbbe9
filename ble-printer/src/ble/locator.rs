//! Device locator
//!
//! `Idle → Scanning → {Found | TimedOut | Error}`, one scan at a time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use super::adapter::{BleAdapter, Device};
use crate::error::{PrintError, PrintResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanState {
    #[default]
    Idle,
    Scanning,
    Found,
    TimedOut,
    Error,
}

/// Finds a peripheral by exact advertised name
pub struct DeviceLocator {
    adapter: Arc<dyn BleAdapter>,
    state: Mutex<ScanState>,
    busy: AtomicBool,
}

/// Clears the busy flag however `locate` exits
struct ScanGuard<'a>(&'a AtomicBool);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl DeviceLocator {
    pub fn new(adapter: Arc<dyn BleAdapter>) -> Self {
        Self {
            adapter,
            state: Mutex::new(ScanState::Idle),
            busy: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ScanState {
        *self.state.lock()
    }

    fn set_state(&self, state: ScanState) {
        *self.state.lock() = state;
    }

    /// Scan until a peripheral advertises exactly `target_name`
    ///
    /// Fails fast with [`PrintError::ScanInProgress`] if another call is
    /// outstanding. The scan is stopped on every exit path.
    #[instrument(skip(self), fields(timeout_ms = timeout.as_millis() as u64))]
    pub async fn locate(&self, target_name: &str, timeout: Duration) -> PrintResult<Device> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("locate called while a scan is outstanding");
            return Err(PrintError::ScanInProgress);
        }
        let _guard = ScanGuard(&self.busy);

        // A scan left over from an earlier attempt would deliver into a dead channel
        if let Err(e) = self.adapter.stop_scan().await {
            debug!(error = %e, "no active scan to stop");
        }

        self.set_state(ScanState::Scanning);
        let mut rx = match self.adapter.start_scan().await {
            Ok(rx) => rx,
            Err(e) => {
                self.set_state(ScanState::Error);
                return Err(PrintError::ScanFailed(e));
            }
        };

        let matched = tokio::time::timeout(timeout, async {
            while let Some(ad) = rx.recv().await {
                debug!(device_id = %ad.device_id, name = ?ad.name, "advertisement");
                if ad.name.as_deref() == Some(target_name) {
                    return Some(Device {
                        id: ad.device_id,
                        advertised_name: target_name.to_string(),
                    });
                }
            }
            None
        })
        .await;

        if let Err(e) = self.adapter.stop_scan().await {
            warn!(error = %e, "stop scan failed");
        }

        match matched {
            Ok(Some(device)) => {
                self.set_state(ScanState::Found);
                info!(device_id = %device.id, "device found");
                Ok(device)
            }
            Ok(None) | Err(_) => {
                self.set_state(ScanState::TimedOut);
                Err(PrintError::DeviceNotFound {
                    name: target_name.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::LoopbackAdapter;

    #[tokio::test]
    async fn test_locate_first_exact_match() {
        let adapter = Arc::new(
            LoopbackAdapter::new()
                .with_device("00:01", "MPT-II-X")
                .with_anonymous_device("00:02")
                .with_device("00:03", "MPT-II")
                .with_device("00:04", "MPT-II"),
        );
        let locator = DeviceLocator::new(adapter.clone());

        let device = locator
            .locate("MPT-II", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(device.id, "00:03");
        assert_eq!(locator.state(), ScanState::Found);
        assert!(!adapter.is_scanning());
    }

    #[tokio::test(start_paused = true)]
    async fn test_locate_times_out() {
        let adapter = Arc::new(LoopbackAdapter::new().with_device("00:01", "Other"));
        let locator = DeviceLocator::new(adapter.clone());

        let err = locator
            .locate("MPT-II", Duration::from_millis(5000))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PrintError::DeviceNotFound { timeout_ms: 5000, .. }
        ));
        assert_eq!(locator.state(), ScanState::TimedOut);
        assert!(!adapter.is_scanning());
    }

    #[tokio::test]
    async fn test_stops_previous_scan_first() {
        let adapter = Arc::new(LoopbackAdapter::new().with_device("00:03", "MPT-II"));
        let locator = DeviceLocator::new(adapter.clone());

        locator.locate("MPT-II", Duration::from_secs(1)).await.unwrap();
        // one idempotent stop before the scan, one after the match
        assert_eq!(adapter.scan_stops(), 2);
        assert_eq!(adapter.scan_starts(), 1);
    }

    #[tokio::test]
    async fn test_scan_error() {
        let adapter = Arc::new(LoopbackAdapter::new().fail_scan("bluetooth off"));
        let locator = DeviceLocator::new(adapter);

        let err = locator
            .locate("MPT-II", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, PrintError::ScanFailed(_)));
        assert_eq!(locator.state(), ScanState::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_locate_fails_fast() {
        let adapter = Arc::new(
            LoopbackAdapter::new()
                .advertise_every(Duration::from_millis(500))
                .with_device("00:03", "MPT-II"),
        );
        let locator = DeviceLocator::new(adapter.clone());

        let (first, second) = tokio::join!(
            locator.locate("MPT-II", Duration::from_secs(5)),
            async {
                tokio::task::yield_now().await;
                locator.locate("MPT-II", Duration::from_secs(5)).await
            }
        );

        assert_eq!(first.unwrap().id, "00:03");
        assert!(matches!(second, Err(PrintError::ScanInProgress)));
        assert_eq!(adapter.scan_starts(), 1);

        // usable again once the first call returned
        assert!(locator.locate("MPT-II", Duration::from_secs(5)).await.is_ok());
    }
}
