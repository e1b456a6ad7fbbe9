//! Print orchestrator
//!
//! Runs one print request top-down: compose, encode, locate, connect, send,
//! disconnect. Every stage and the terminal outcome are pushed to the
//! caller's event channel.

use std::fmt;
use std::sync::Arc;

use ble_printer::{
    BleAdapter, ConnectionManager, DeviceLocator, PrintError, PrinterProfile, SendReport,
    TransportChunker,
};
use chrono::{Local, NaiveDateTime};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::composer::{ComposeError, ReceiptComposer, ReceiptDocument, RenderMode};
use crate::config::Config;
use crate::types::{OrderRecord, ReturnOrder, SaleOrder};

#[derive(Debug, Error)]
pub enum PrintJobError {
    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error(transparent)]
    Printer(#[from] PrintError),

    #[error("Another print job is in progress")]
    Busy,
}

pub type PrintJobResult<T> = Result<T, PrintJobError>;

/// What to print
#[derive(Debug, Clone)]
pub enum PrintJob {
    Sale(SaleOrder),
    Return(ReturnOrder),
    /// Several orders of one shop on a single receipt
    Merged(Vec<OrderRecord>),
}

impl PrintJob {
    pub fn kind(&self) -> &'static str {
        match self {
            PrintJob::Sale(_) => "sale",
            PrintJob::Return(_) => "return",
            PrintJob::Merged(_) => "merged",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintStage {
    Composing,
    LocatingDevice,
    Connecting,
    Sending,
    Disconnecting,
    Done,
}

impl PrintStage {
    /// Status text shown to the operator
    pub fn label(self) -> &'static str {
        match self {
            PrintStage::Composing => "生成小票...",
            PrintStage::LocatingDevice => "查找打印机...",
            PrintStage::Connecting => "连接打印机...",
            PrintStage::Sending => "正在打印...",
            PrintStage::Disconnecting => "断开连接...",
            PrintStage::Done => "打印成功",
        }
    }
}

impl fmt::Display for PrintStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Status update for one print request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintEvent {
    Stage(PrintStage),
    /// `sent` of `total` chunks acknowledged
    Progress { sent: usize, total: usize },
    /// Terminal outcome, always the last event of a request
    Finished(Result<(), String>),
}

fn emit(events: &UnboundedSender<PrintEvent>, event: PrintEvent) {
    // receiver gone means nobody is watching; the job still runs
    let _ = events.send(event);
}

/// Print service
///
/// Holds the one device locator and connection manager of the process.
/// Requests are single-flight.
pub struct PrintService {
    profile: PrinterProfile,
    composer: ReceiptComposer,
    locator: DeviceLocator,
    connections: ConnectionManager,
    chunker: TransportChunker,
    keep_alive: bool,
    in_flight: tokio::sync::Mutex<()>,
}

impl PrintService {
    pub fn new(adapter: Arc<dyn BleAdapter>, config: &Config) -> PrintJobResult<Self> {
        let profile = config.printer.clone();
        profile.validate()?;

        Ok(Self {
            composer: ReceiptComposer::new(config.merchant.clone(), profile.paper_width),
            locator: DeviceLocator::new(adapter.clone()),
            connections: ConnectionManager::new(adapter.clone(), &profile),
            chunker: TransportChunker::from_profile(adapter, &profile),
            keep_alive: config.keep_alive,
            in_flight: tokio::sync::Mutex::new(()),
            profile,
        })
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Compose the document for `job`
    pub fn compose(
        &self,
        job: &PrintJob,
        mode: RenderMode,
        printed_at: NaiveDateTime,
    ) -> Result<ReceiptDocument, ComposeError> {
        match job {
            PrintJob::Sale(order) => Ok(self.composer.compose_sale(order, mode)),
            PrintJob::Return(order) => Ok(self.composer.compose_return(order, mode)),
            PrintJob::Merged(orders) => self.composer.compose_merged(orders, printed_at, mode),
        }
    }

    /// On-screen text of the receipt `print` would produce
    pub fn preview(&self, job: &PrintJob, printed_at: NaiveDateTime) -> Result<String, ComposeError> {
        Ok(self.compose(job, RenderMode::Display, printed_at)?.preview())
    }

    /// Print one job
    ///
    /// Fails immediately with [`PrintJobError::Busy`] while another job runs.
    /// Errors are terminal for this attempt; retrying is a new call.
    #[instrument(skip_all, fields(job = job.kind()))]
    pub async fn print(
        &self,
        job: &PrintJob,
        events: &UnboundedSender<PrintEvent>,
        cancel: &CancellationToken,
    ) -> PrintJobResult<SendReport> {
        let result = match self.in_flight.try_lock() {
            Ok(_guard) => self.run(job, events, cancel).await,
            Err(_) => Err(PrintJobError::Busy),
        };

        match &result {
            Ok(report) => info!(chunks = report.chunks, bytes = report.bytes, "print finished"),
            Err(e) => error!(error = %e, "print failed"),
        }
        emit(
            events,
            PrintEvent::Finished(result.as_ref().map(|_| ()).map_err(|e| e.to_string())),
        );
        result
    }

    async fn run(
        &self,
        job: &PrintJob,
        events: &UnboundedSender<PrintEvent>,
        cancel: &CancellationToken,
    ) -> PrintJobResult<SendReport> {
        emit(events, PrintEvent::Stage(PrintStage::Composing));
        let doc = self.compose(job, RenderMode::Print, Local::now().naive_local())?;
        let frame = doc.encode();
        debug!(bytes = frame.len(), lines = doc.lines().len(), "receipt encoded");

        let conn = match self.connections.active().await {
            Some(conn) => {
                debug!(device_id = conn.device_id(), "reusing connection");
                conn
            }
            None => {
                emit(events, PrintEvent::Stage(PrintStage::LocatingDevice));
                let device = self
                    .locator
                    .locate(&self.profile.device_name, self.profile.scan_timeout)
                    .await?;

                emit(events, PrintEvent::Stage(PrintStage::Connecting));
                self.connections.connect(&device).await?
            }
        };

        emit(events, PrintEvent::Stage(PrintStage::Sending));
        let sent = match self.connections.ensure_active(&conn).await {
            Ok(()) => {
                self.chunker
                    .send_with_progress(&conn, frame.as_bytes(), cancel, |sent, total| {
                        emit(events, PrintEvent::Progress { sent, total })
                    })
                    .await
            }
            Err(e) => Err(e),
        };

        match sent {
            Ok(report) => {
                if !self.keep_alive {
                    emit(events, PrintEvent::Stage(PrintStage::Disconnecting));
                    self.connections.disconnect(&conn).await;
                }
                emit(events, PrintEvent::Stage(PrintStage::Done));
                Ok(report)
            }
            Err(e) => {
                // never leave a half-open link behind a failed print
                emit(events, PrintEvent::Stage(PrintStage::Disconnecting));
                self.connections.disconnect(&conn).await;
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_labels() {
        assert_eq!(PrintStage::Connecting.to_string(), "连接打印机...");
        assert_eq!(PrintStage::Sending.label(), "正在打印...");
    }

    #[test]
    fn test_busy_message() {
        assert_eq!(
            PrintJobError::Busy.to_string(),
            "Another print job is in progress"
        );
    }
}
