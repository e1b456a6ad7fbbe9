//! # ble-printer
//!
//! ESC/POS thermal printing over Bluetooth LE - low-level printing capabilities only.
//!
//! ## Scope
//!
//! This crate handles HOW to print:
//! - Fixed-width column layout (half-width / full-width measurement)
//! - ESC/POS style directives and GBK transcoding
//! - Device discovery by advertised name
//! - Single active GATT connection lifecycle
//! - Chunked, strictly sequential characteristic writes
//!
//! Business logic (WHAT to print) stays in application code:
//! - Sale / return / merged receipts → receipt-service
//!
//! ## Example
//!
//! ```ignore
//! use ble_printer::{ConnectionManager, DeviceLocator, PrinterProfile, TransportChunker};
//! use ble_printer::escpos::{encode_line, Style};
//!
//! let profile = PrinterProfile::default();
//! let locator = DeviceLocator::new(adapter.clone());
//! let manager = ConnectionManager::new(adapter.clone(), &profile);
//! let chunker = TransportChunker::from_profile(adapter, &profile);
//!
//! let device = locator.locate(&profile.device_name, profile.scan_timeout).await?;
//! let conn = manager.connect(&device).await?;
//! let frame = encode_line("小票\n", &Style::new().bold());
//! chunker.send(&conn, &frame, &CancellationToken::new()).await?;
//! manager.disconnect(&conn).await;
//! ```

pub mod ble;
mod encoding;
mod error;
pub mod escpos;
pub mod layout;
mod profile;

// Re-exports
pub use ble::{
    AdapterError, Advertisement, BleAdapter, Connection, ConnectionManager, Device,
    DeviceLocator, LinkLost, LinkState, LoopbackAdapter, ScanState, SendReport,
    TransportChunker,
};
pub use encoding::{EncodingDegraded, PLACEHOLDER, encode_text, transcode};
pub use error::{PrintError, PrintResult};
pub use escpos::{EncodedFrame, Scale, Style};
pub use profile::PrinterProfile;
