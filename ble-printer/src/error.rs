//! Error types for the printer library

use thiserror::Error;

use crate::ble::AdapterError;

/// Printer error types
///
/// Every variant except `ScanInProgress` and `InvalidConfig` is terminal for
/// the print attempt that produced it; retrying means starting a new attempt.
#[derive(Debug, Error)]
pub enum PrintError {
    /// Scan timed out or finished without an exact name match
    #[error("Device not found: no peripheral named {name} within {timeout_ms}ms")]
    DeviceNotFound { name: String, timeout_ms: u64 },

    /// A scan is already outstanding on this locator
    #[error("Scan already in progress")]
    ScanInProgress,

    /// The platform refused to start the scan
    #[error("Scan failed: {0}")]
    ScanFailed(#[source] AdapterError),

    /// Handshake (or its timeout) failed
    #[error("Connection failed: {device_id}: {source}")]
    ConnectionFailed {
        device_id: String,
        #[source]
        source: AdapterError,
    },

    /// The connection handle is not the active one
    #[error("Printer not connected")]
    NotConnected,

    /// A chunk write failed; remaining chunks were not attempted
    #[error("Transport write failed at chunk {chunk_index}/{total_chunks}: {source}")]
    TransportWriteFailed {
        chunk_index: usize,
        total_chunks: usize,
        #[source]
        source: AdapterError,
    },

    /// Cancelled between two chunk writes
    #[error("Print cancelled after {chunks_sent} chunk(s)")]
    Cancelled { chunks_sent: usize },

    /// Invalid printer configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type for printer operations
pub type PrintResult<T> = Result<T, PrintError>;
