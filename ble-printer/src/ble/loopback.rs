//! In-memory BLE peripheral
//!
//! Behaves like a platform adapter with one scripted radio environment:
//! advertisements are replayed on every scan and writes are recorded.
//! Failures can be injected at scan, connect, disconnect or a given write,
//! and the peripheral can drop an established link.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;
use uuid::Uuid;

use super::adapter::{AdapterError, Advertisement, BleAdapter, LinkLost};

#[derive(Default)]
struct LoopbackState {
    advertisements: Vec<Advertisement>,
    advertise_delay: Duration,
    write_delay: Duration,

    scan_error: Option<String>,
    connect_error: Option<String>,
    disconnect_error: Option<String>,
    fail_write_at: Option<usize>,

    scan_tx: Option<mpsc::Sender<Advertisement>>,
    scan_starts: usize,
    scan_stops: usize,

    connected: Option<String>,
    link_lost: Option<oneshot::Sender<()>>,
    connects: Vec<String>,
    disconnects: Vec<String>,

    write_attempts: usize,
    writes: Vec<Vec<u8>>,
}

/// Scriptable in-memory adapter
#[derive(Default)]
pub struct LoopbackAdapter {
    state: Mutex<LoopbackState>,
}

impl LoopbackAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advertise a named peripheral on every scan
    pub fn with_device(self, id: &str, name: &str) -> Self {
        self.state.lock().advertisements.push(Advertisement {
            device_id: id.to_string(),
            name: Some(name.to_string()),
        });
        self
    }

    /// Advertise a peripheral without a name
    pub fn with_anonymous_device(self, id: &str) -> Self {
        self.state.lock().advertisements.push(Advertisement {
            device_id: id.to_string(),
            name: None,
        });
        self
    }

    /// Delay before each advertisement is delivered
    pub fn advertise_every(self, delay: Duration) -> Self {
        self.state.lock().advertise_delay = delay;
        self
    }

    /// Delay before each write is acknowledged
    pub fn with_write_delay(self, delay: Duration) -> Self {
        self.state.lock().write_delay = delay;
        self
    }

    pub fn fail_scan(self, msg: &str) -> Self {
        self.state.lock().scan_error = Some(msg.to_string());
        self
    }

    pub fn fail_connect(self, msg: &str) -> Self {
        self.state.lock().connect_error = Some(msg.to_string());
        self
    }

    pub fn fail_disconnect(self, msg: &str) -> Self {
        self.state.lock().disconnect_error = Some(msg.to_string());
        self
    }

    /// Reject the write attempt with this zero-based index
    pub fn fail_write_at(self, index: usize) -> Self {
        self.state.lock().fail_write_at = Some(index);
        self
    }

    /// Peripheral side drop of the link to `device_id` (power off, out of
    /// range). Returns whether a link was dropped.
    pub fn drop_link(&self, device_id: &str) -> bool {
        let mut s = self.state.lock();
        if s.connected.as_deref() != Some(device_id) {
            return false;
        }
        s.connected = None;
        if let Some(tx) = s.link_lost.take() {
            let _ = tx.send(());
        }
        debug!(device_id, "loopback link dropped");
        true
    }

    // === Inspection ===

    /// Acknowledged writes, in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().writes.clone()
    }

    /// Acknowledged writes concatenated
    pub fn written_bytes(&self) -> Vec<u8> {
        self.state.lock().writes.concat()
    }

    pub fn write_attempts(&self) -> usize {
        self.state.lock().write_attempts
    }

    pub fn is_scanning(&self) -> bool {
        self.state.lock().scan_tx.is_some()
    }

    pub fn scan_starts(&self) -> usize {
        self.state.lock().scan_starts
    }

    pub fn scan_stops(&self) -> usize {
        self.state.lock().scan_stops
    }

    pub fn connected_device(&self) -> Option<String> {
        self.state.lock().connected.clone()
    }

    pub fn connects(&self) -> Vec<String> {
        self.state.lock().connects.clone()
    }

    pub fn disconnects(&self) -> Vec<String> {
        self.state.lock().disconnects.clone()
    }
}

#[async_trait]
impl BleAdapter for LoopbackAdapter {
    async fn start_scan(&self) -> Result<mpsc::Receiver<Advertisement>, AdapterError> {
        let (tx, rx) = mpsc::channel(32);
        let (ads, delay) = {
            let mut s = self.state.lock();
            if let Some(err) = &s.scan_error {
                return Err(AdapterError::new(err.clone()));
            }
            s.scan_starts += 1;
            // Held until stop_scan so the stream stays open like a live radio
            s.scan_tx = Some(tx.clone());
            (s.advertisements.clone(), s.advertise_delay)
        };

        tokio::spawn(async move {
            for ad in ads {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if tx.send(ad).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }

    async fn stop_scan(&self) -> Result<(), AdapterError> {
        let mut s = self.state.lock();
        s.scan_stops += 1;
        s.scan_tx = None;
        Ok(())
    }

    async fn connect(&self, device_id: &str) -> Result<LinkLost, AdapterError> {
        let mut s = self.state.lock();
        if let Some(err) = &s.connect_error {
            return Err(AdapterError::new(err.clone()));
        }
        if !s.advertisements.iter().any(|a| a.device_id == device_id) {
            return Err(AdapterError::new(format!("unknown device {}", device_id)));
        }
        let (tx, rx) = oneshot::channel();
        s.connected = Some(device_id.to_string());
        // dropping the previous sender closes that link's notification
        s.link_lost = Some(tx);
        s.connects.push(device_id.to_string());
        debug!(device_id, "loopback connected");
        Ok(rx)
    }

    async fn disconnect(&self, device_id: &str) -> Result<(), AdapterError> {
        let mut s = self.state.lock();
        s.disconnects.push(device_id.to_string());
        if s.connected.as_deref() == Some(device_id) {
            s.connected = None;
            s.link_lost = None;
        }
        match &s.disconnect_error {
            Some(err) => Err(AdapterError::new(err.clone())),
            None => Ok(()),
        }
    }

    async fn write(
        &self,
        device_id: &str,
        _service: Uuid,
        _characteristic: Uuid,
        data: &[u8],
    ) -> Result<(), AdapterError> {
        let delay = self.state.lock().write_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut s = self.state.lock();
        let attempt = s.write_attempts;
        s.write_attempts += 1;

        if s.connected.as_deref() != Some(device_id) {
            return Err(AdapterError::new("not connected"));
        }
        if s.fail_write_at == Some(attempt) {
            return Err(AdapterError::new(format!("write {} rejected", attempt)));
        }
        s.writes.push(data.to_vec());
        Ok(())
    }
}
