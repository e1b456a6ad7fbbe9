//! Printer profile - identity and tuning of one printer model
//!
//! Nothing below the profile hard-codes a device name, GATT identifier or
//! chunk size; swap the profile to target another model.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PrintError, PrintResult};

/// Advertised name of the MPT-II portable printer
pub const DEFAULT_DEVICE_NAME: &str = "MPT-II";

/// Printer GATT service (0x18F0)
pub const DEFAULT_SERVICE_UUID: Uuid = Uuid::from_u128(0x000018f0_0000_1000_8000_00805f9b34fb);

/// Writable characteristic (0x2AF1)
pub const DEFAULT_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x00002af1_0000_1000_8000_00805f9b34fb);

/// Maximum bytes per characteristic write on the negotiated link
pub const DEFAULT_CHUNK_SIZE: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterProfile {
    /// Exact advertised name to match during scan
    pub device_name: String,
    pub service_uuid: Uuid,
    pub characteristic_uuid: Uuid,
    /// Bytes per write
    pub chunk_size: usize,
    pub scan_timeout: Duration,
    /// Pause after "connected" before the GATT table is trusted
    pub settle_delay: Duration,
    pub connect_timeout: Duration,
    /// Per-chunk write timeout
    pub write_timeout: Duration,
    /// Characters per line (58mm paper: 32)
    pub paper_width: usize,
}

impl Default for PrinterProfile {
    fn default() -> Self {
        Self {
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            service_uuid: DEFAULT_SERVICE_UUID,
            characteristic_uuid: DEFAULT_CHARACTERISTIC_UUID,
            chunk_size: DEFAULT_CHUNK_SIZE,
            scan_timeout: Duration::from_secs(5),
            settle_delay: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
            paper_width: 32,
        }
    }
}

impl PrinterProfile {
    /// Reject values that would make printing impossible
    pub fn validate(&self) -> PrintResult<()> {
        if self.device_name.is_empty() {
            return Err(PrintError::InvalidConfig("device name is empty".into()));
        }
        if self.chunk_size == 0 {
            return Err(PrintError::InvalidConfig("chunk size must be > 0".into()));
        }
        if self.paper_width == 0 {
            return Err(PrintError::InvalidConfig("paper width must be > 0".into()));
        }
        Ok(())
    }
}
