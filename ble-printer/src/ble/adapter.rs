//! Platform BLE seam
//!
//! Platform bindings are callback driven; implementations translate those
//! callbacks into the awaitable operations and channel below.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Failure reported by the platform BLE stack
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct AdapterError(pub String);

impl AdapterError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// One scan result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub device_id: String,
    pub name: Option<String>,
}

/// Fires (or closes) when the platform reports the link as dropped
pub type LinkLost = oneshot::Receiver<()>;

/// A discovered peripheral; never persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: String,
    pub advertised_name: String,
}

/// Trait for BLE platform adapters
#[async_trait]
pub trait BleAdapter: Send + Sync {
    /// Start scanning; advertisements arrive on the returned channel until
    /// [`stop_scan`](Self::stop_scan) is called
    async fn start_scan(&self) -> Result<mpsc::Receiver<Advertisement>, AdapterError>;

    /// Stop the active scan. Stopping when idle is not an error.
    async fn stop_scan(&self) -> Result<(), AdapterError>;

    /// Resolves once the platform reports the link as connected
    ///
    /// The returned [`LinkLost`] resolves when the link goes away for any
    /// reason other than a later `connect` to the same adapter.
    async fn connect(&self, device_id: &str) -> Result<LinkLost, AdapterError>;

    async fn disconnect(&self, device_id: &str) -> Result<(), AdapterError>;

    /// Write with response; resolves on acknowledgement
    async fn write(
        &self,
        device_id: &str,
        service: Uuid,
        characteristic: Uuid,
        data: &[u8],
    ) -> Result<(), AdapterError>;
}
