//! Connection manager
//!
//! Owns the one live GATT connection. Only this type creates or destroys a
//! [`Connection`]; everyone else gets a cloned handle that is checked
//! against the active slot before use. A link the peripheral dropped is
//! cleared from the slot the next time the slot is read.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::adapter::{AdapterError, BleAdapter, Device, LinkLost};
use crate::error::{PrintError, PrintResult};
use crate::profile::PrinterProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Handle to the active link: device plus the writable characteristic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    device_id: String,
    service: Uuid,
    characteristic: Uuid,
}

impl Connection {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn service(&self) -> Uuid {
        self.service
    }

    pub fn characteristic(&self) -> Uuid {
        self.characteristic
    }
}

/// Stored connection plus the platform's link-lost notification
struct ActiveLink {
    conn: Connection,
    lost: LinkLost,
}

impl ActiveLink {
    fn is_lost(&mut self) -> bool {
        !matches!(self.lost.try_recv(), Err(TryRecvError::Empty))
    }
}

pub struct ConnectionManager {
    adapter: Arc<dyn BleAdapter>,
    service: Uuid,
    characteristic: Uuid,
    settle_delay: Duration,
    connect_timeout: Duration,
    active: tokio::sync::Mutex<Option<ActiveLink>>,
    state: Mutex<LinkState>,
}

impl ConnectionManager {
    pub fn new(adapter: Arc<dyn BleAdapter>, profile: &PrinterProfile) -> Self {
        Self {
            adapter,
            service: profile.service_uuid,
            characteristic: profile.characteristic_uuid,
            settle_delay: profile.settle_delay,
            connect_timeout: profile.connect_timeout,
            active: tokio::sync::Mutex::new(None),
            state: Mutex::new(LinkState::Disconnected),
        }
    }

    pub fn state(&self) -> LinkState {
        *self.state.lock()
    }

    fn set_state(&self, state: LinkState) {
        *self.state.lock() = state;
    }

    /// Clear the slot if the peripheral dropped the link
    fn prune(&self, slot: &mut Option<ActiveLink>) {
        if let Some(link) = slot.as_mut() {
            if link.is_lost() {
                info!(device_id = %link.conn.device_id, "link lost");
                *slot = None;
                self.set_state(LinkState::Disconnected);
            }
        }
    }

    /// The live connection, if any
    pub async fn active(&self) -> Option<Connection> {
        let mut slot = self.active.lock().await;
        self.prune(&mut slot);
        slot.as_ref().map(|link| link.conn.clone())
    }

    /// Whether `conn` is still the live connection
    pub async fn is_active(&self, conn: &Connection) -> bool {
        let mut slot = self.active.lock().await;
        self.prune(&mut slot);
        slot.as_ref().is_some_and(|link| &link.conn == conn)
    }

    /// [`PrintError::NotConnected`] unless `conn` is the live connection
    pub async fn ensure_active(&self, conn: &Connection) -> PrintResult<()> {
        if self.is_active(conn).await {
            Ok(())
        } else {
            Err(PrintError::NotConnected)
        }
    }

    /// Connect to `device`, replacing any existing connection
    ///
    /// The link is only handed out after the settle delay, since some
    /// peripherals report "connected" before their GATT table is stable.
    #[instrument(skip(self, device), fields(device_id = %device.id))]
    pub async fn connect(&self, device: &Device) -> PrintResult<Connection> {
        let mut active = self.active.lock().await;

        if let Some(existing) = active.take() {
            info!(previous = %existing.conn.device_id, "replacing active connection");
            self.release(&existing.conn).await;
        }

        self.set_state(LinkState::Connecting);
        let handshake = tokio::time::timeout(self.connect_timeout, self.adapter.connect(&device.id))
            .await
            .unwrap_or_else(|_| {
                Err(AdapterError::new(format!(
                    "connect timed out after {}ms",
                    self.connect_timeout.as_millis()
                )))
            });

        let lost = match handshake {
            Ok(lost) => lost,
            Err(source) => {
                self.set_state(LinkState::Failed);
                // Platform may have a half-open link even though the handshake failed
                self.release_device(&device.id).await;
                warn!(error = %source, "connect failed");
                return Err(PrintError::ConnectionFailed {
                    device_id: device.id.clone(),
                    source,
                });
            }
        };

        tokio::time::sleep(self.settle_delay).await;

        let conn = Connection {
            device_id: device.id.clone(),
            service: self.service,
            characteristic: self.characteristic,
        };
        *active = Some(ActiveLink {
            conn: conn.clone(),
            lost,
        });
        self.set_state(LinkState::Connected);
        info!("connected");
        Ok(conn)
    }

    /// Best-effort disconnect; failures are logged, never returned
    #[instrument(skip(self, conn), fields(device_id = %conn.device_id))]
    pub async fn disconnect(&self, conn: &Connection) {
        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(|link| &link.conn == conn) {
            *active = None;
        }
        self.release(conn).await;
        if active.is_none() {
            self.set_state(LinkState::Disconnected);
        }
    }

    async fn release(&self, conn: &Connection) {
        self.release_device(&conn.device_id).await;
    }

    async fn release_device(&self, device_id: &str) {
        match self.adapter.disconnect(device_id).await {
            Ok(()) => info!(device_id, "disconnected"),
            Err(e) => warn!(device_id, error = %e, "disconnect failed, ignoring"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::LoopbackAdapter;

    fn device(id: &str) -> Device {
        Device {
            id: id.to_string(),
            advertised_name: "MPT-II".to_string(),
        }
    }

    fn manager(adapter: Arc<LoopbackAdapter>) -> ConnectionManager {
        ConnectionManager::new(adapter, &PrinterProfile::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_waits_settle_delay() {
        let adapter = Arc::new(LoopbackAdapter::new().with_device("00:01", "MPT-II"));
        let mgr = manager(adapter.clone());

        let start = tokio::time::Instant::now();
        let conn = mgr.connect(&device("00:01")).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));

        assert_eq!(conn.device_id(), "00:01");
        assert_eq!(conn.service(), PrinterProfile::default().service_uuid);
        assert_eq!(mgr.state(), LinkState::Connected);
        assert_eq!(mgr.active().await, Some(conn));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_connect_replaces_first() {
        let adapter = Arc::new(
            LoopbackAdapter::new()
                .with_device("00:01", "MPT-II")
                .with_device("00:02", "MPT-II"),
        );
        let mgr = manager(adapter.clone());

        let first = mgr.connect(&device("00:01")).await.unwrap();
        let second = mgr.connect(&device("00:02")).await.unwrap();

        assert_eq!(adapter.disconnects(), vec!["00:01".to_string()]);
        assert!(matches!(
            mgr.ensure_active(&first).await,
            Err(PrintError::NotConnected)
        ));
        assert!(mgr.is_active(&second).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_carries_cause() {
        let adapter = Arc::new(
            LoopbackAdapter::new()
                .with_device("00:01", "MPT-II")
                .fail_connect("gatt 133"),
        );
        let mgr = manager(adapter);

        let err = mgr.connect(&device("00:01")).await.unwrap_err();
        match err {
            PrintError::ConnectionFailed { device_id, source } => {
                assert_eq!(device_id, "00:01");
                assert_eq!(source.0, "gatt 133");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(mgr.state(), LinkState::Failed);
        assert!(mgr.active().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_failure_is_swallowed() {
        let adapter = Arc::new(
            LoopbackAdapter::new()
                .with_device("00:01", "MPT-II")
                .fail_disconnect("already gone"),
        );
        let mgr = manager(adapter.clone());

        let conn = mgr.connect(&device("00:01")).await.unwrap();
        mgr.disconnect(&conn).await;

        assert_eq!(mgr.state(), LinkState::Disconnected);
        assert!(mgr.active().await.is_none());
        // a fresh connect still works
        assert!(mgr.connect(&device("00:01")).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_peripheral_drop_clears_active() {
        let adapter = Arc::new(LoopbackAdapter::new().with_device("00:01", "MPT-II"));
        let mgr = manager(adapter.clone());

        let conn = mgr.connect(&device("00:01")).await.unwrap();
        assert!(mgr.is_active(&conn).await);

        assert!(adapter.drop_link("00:01"));

        assert!(mgr.active().await.is_none());
        assert_eq!(mgr.state(), LinkState::Disconnected);
        assert!(matches!(
            mgr.ensure_active(&conn).await,
            Err(PrintError::NotConnected)
        ));
        // the platform already tore the link down
        assert!(adapter.disconnects().is_empty());

        let again = mgr.connect(&device("00:01")).await.unwrap();
        assert!(mgr.is_active(&again).await);
        assert_eq!(adapter.connects().len(), 2);
    }
}
