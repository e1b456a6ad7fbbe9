//! `receipt-print` command line
//!
//! ```text
//! receipt-print preview <sale|return|merged> <orders.json>
//! receipt-print dry-run <sale|return|merged> <orders.json> [out.bin]
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use ble_printer::LoopbackAdapter;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::service::{PrintEvent, PrintJob, PrintService};

/// Device id the loopback printer advertises under
const LOOPBACK_DEVICE_ID: &str = "00:00:00:00:00:00";

/// Receipt printing for the MPT-II BLE thermal printer
#[derive(Parser, Debug)]
#[command(name = "receipt-print")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the on-screen preview of a receipt
    Preview {
        /// Receipt kind
        #[arg(value_enum)]
        kind: JobKind,

        /// Order JSON file (an array of orders for `merged`)
        input: PathBuf,
    },
    /// Run the whole print pipeline against an in-memory printer
    DryRun {
        /// Receipt kind
        #[arg(value_enum)]
        kind: JobKind,

        /// Order JSON file (an array of orders for `merged`)
        input: PathBuf,

        /// Write the captured printer bytes here
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Sale,
    Return,
    Merged,
}

/// Read a job of `kind` from a JSON file
pub fn load_job(kind: JobKind, path: &Path) -> anyhow::Result<PrintJob> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let job = match kind {
        JobKind::Sale => PrintJob::Sale(serde_json::from_str(&raw)?),
        JobKind::Return => PrintJob::Return(serde_json::from_str(&raw)?),
        JobKind::Merged => PrintJob::Merged(serde_json::from_str(&raw)?),
    };
    Ok(job)
}

/// Display-mode text of `job`, timestamped now
///
/// Composing never touches the radio, so an idle loopback adapter backs the
/// service here.
pub fn preview(config: &Config, job: &PrintJob) -> anyhow::Result<String> {
    let service = PrintService::new(Arc::new(LoopbackAdapter::new()), config)?;
    Ok(service.preview(job, chrono::Local::now().naive_local())?)
}

/// Run the full print pipeline against an in-memory printer
///
/// Returns every byte the printer acknowledged.
pub async fn dry_run(config: &Config, job: &PrintJob) -> anyhow::Result<Vec<u8>> {
    let adapter = Arc::new(
        LoopbackAdapter::new().with_device(LOOPBACK_DEVICE_ID, &config.printer.device_name),
    );
    let service = PrintService::new(adapter.clone(), config)?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let watcher = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                PrintEvent::Stage(stage) => info!(stage = ?stage, "{}", stage),
                PrintEvent::Progress { sent, total } => info!("chunk {}/{}", sent, total),
                PrintEvent::Finished(_) => break,
            }
        }
    });

    let result = service.print(job, &tx, &CancellationToken::new()).await;
    drop(tx);
    if let Err(e) = watcher.await {
        warn!(error = %e, "event watcher failed");
    }

    result?;
    Ok(adapter.written_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preview() {
        let cli = Cli::try_parse_from(["receipt-print", "preview", "sale", "order.json"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Preview {
                kind: JobKind::Sale,
                input: PathBuf::from("order.json"),
            }
        );
    }

    #[test]
    fn test_parse_dry_run_output_is_optional() {
        let cli =
            Cli::try_parse_from(["receipt-print", "dry-run", "merged", "in.json", "out.bin"])
                .unwrap();
        assert_eq!(
            cli.command,
            Command::DryRun {
                kind: JobKind::Merged,
                input: PathBuf::from("in.json"),
                output: Some(PathBuf::from("out.bin")),
            }
        );

        let cli = Cli::try_parse_from(["receipt-print", "dry-run", "return", "in.json"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::DryRun {
                kind: JobKind::Return,
                output: None,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Cli::try_parse_from(["receipt-print"]).is_err());
        assert!(Cli::try_parse_from(["receipt-print", "preview", "sale"]).is_err());
        assert!(Cli::try_parse_from(["receipt-print", "preview", "refund", "a.json"]).is_err());
        assert!(Cli::try_parse_from(["receipt-print", "print", "sale", "a.json"]).is_err());
        assert!(Cli::try_parse_from(["receipt-print", "preview", "sale", "a.json", "b"]).is_err());
    }
}
