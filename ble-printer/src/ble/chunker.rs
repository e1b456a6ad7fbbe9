//! Transport chunker
//!
//! Splits an encoded frame into characteristic-sized writes and sends them
//! strictly one after another. Chunk `i + 1` is never issued before chunk
//! `i` has been acknowledged.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::adapter::{AdapterError, BleAdapter};
use super::connection::Connection;
use crate::error::{PrintError, PrintResult};
use crate::profile::PrinterProfile;

const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a completed send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    pub chunks: usize,
    pub bytes: usize,
}

/// Chunk lengths for a frame of `len` bytes
///
/// Every chunk is `size` bytes except possibly the last.
pub fn plan_chunks(len: usize, size: usize) -> Vec<usize> {
    let size = size.max(1);
    (0..len)
        .step_by(size)
        .map(|start| size.min(len - start))
        .collect()
}

pub struct TransportChunker {
    adapter: Arc<dyn BleAdapter>,
    chunk_size: usize,
    write_timeout: Duration,
}

impl TransportChunker {
    pub fn new(adapter: Arc<dyn BleAdapter>, chunk_size: usize) -> Self {
        Self {
            adapter,
            chunk_size: chunk_size.max(1),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    pub fn from_profile(adapter: Arc<dyn BleAdapter>, profile: &PrinterProfile) -> Self {
        Self::new(adapter, profile.chunk_size).with_write_timeout(profile.write_timeout)
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Send `frame` over `conn`
    pub async fn send(
        &self,
        conn: &Connection,
        frame: &[u8],
        cancel: &CancellationToken,
    ) -> PrintResult<SendReport> {
        self.send_with_progress(conn, frame, cancel, |_, _| {}).await
    }

    /// Send `frame` over `conn`, calling `on_chunk(sent, total)` after each
    /// acknowledged write
    #[instrument(skip_all, fields(device_id = %conn.device_id(), bytes = frame.len()))]
    pub async fn send_with_progress<F>(
        &self,
        conn: &Connection,
        frame: &[u8],
        cancel: &CancellationToken,
        mut on_chunk: F,
    ) -> PrintResult<SendReport>
    where
        F: FnMut(usize, usize) + Send,
    {
        let plan = plan_chunks(frame.len(), self.chunk_size);
        let total = plan.len();
        let mut offset = 0;

        for (index, len) in plan.into_iter().enumerate() {
            let chunk = &frame[offset..offset + len];
            offset += len;

            if cancel.is_cancelled() {
                warn!(chunks_sent = index, total, "send cancelled");
                return Err(PrintError::Cancelled { chunks_sent: index });
            }

            let write = self.adapter.write(
                conn.device_id(),
                conn.service(),
                conn.characteristic(),
                chunk,
            );
            let result = match tokio::time::timeout(self.write_timeout, write).await {
                Ok(r) => r,
                Err(_) => Err(AdapterError::new(format!(
                    "write timed out after {}ms",
                    self.write_timeout.as_millis()
                ))),
            };

            if let Err(source) = result {
                warn!(chunk_index = index, total, error = %source, "chunk write failed");
                return Err(PrintError::TransportWriteFailed {
                    chunk_index: index,
                    total_chunks: total,
                    source,
                });
            }

            debug!(chunk = index + 1, total, len = chunk.len(), "chunk sent");
            on_chunk(index + 1, total);
        }

        info!(chunks = total, "frame sent");
        Ok(SendReport {
            chunks: total,
            bytes: frame.len(),
        })
    }
}
