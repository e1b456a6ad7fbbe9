//! Bluetooth LE transport
//!
//! - [`adapter`]: platform seam (scan / connect / write)
//! - [`locator`]: find a peripheral by advertised name
//! - [`connection`]: single active connection lifecycle
//! - [`chunker`]: split a frame into sequential writes
//! - [`loopback`]: in-memory peripheral for tests and dry runs

pub mod adapter;
pub mod chunker;
pub mod connection;
pub mod locator;
pub mod loopback;

pub use adapter::{AdapterError, Advertisement, BleAdapter, Device, LinkLost};
pub use chunker::{SendReport, TransportChunker, plan_chunks};
pub use connection::{Connection, ConnectionManager, LinkState};
pub use locator::{DeviceLocator, ScanState};
pub use loopback::LoopbackAdapter;
