//! # receipt-service
//!
//! WHAT to print: sale, return and merged receipts for the POS front end,
//! delivered to a BLE thermal printer through `ble-printer`.
//!
//! - [`types`]: order records as handed over by the order store
//! - [`composer`]: order records → [`ReceiptDocument`]
//! - [`service`]: single-flight print orchestration with a status stream
//! - [`config`]: environment configuration
//! - [`logger`]: tracing subscriber setup
//! - [`cli`]: `receipt-print` argument parsing and commands

pub mod cli;
pub mod composer;
pub mod config;
pub mod logger;
pub mod service;
pub mod types;

pub use composer::{
    ComposeError, DocumentBuilder, MergedTotals, MerchantInfo, ReceiptComposer, ReceiptDocument,
    ReceiptLine, RenderMode, encode_document, format_time,
};
pub use config::Config;
pub use service::{PrintEvent, PrintJob, PrintJobError, PrintJobResult, PrintService, PrintStage};
pub use types::{
    OrderDetail, OrderRecord, Product, ReturnOrder, ReturnOrderDetail, ReturnType, SaleOrder,
    Shop, ShopId,
};

/// 加载 .env 并初始化日志
///
/// Returns the loaded configuration.
pub fn setup_environment() -> anyhow::Result<Config> {
    // .env is optional
    let _ = dotenv::dotenv();

    let config = Config::from_env();
    logger::init_logger_with_file(&config.log_level, config.log_dir.as_deref())?;
    Ok(config)
}
