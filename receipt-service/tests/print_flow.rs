use std::sync::Arc;
use std::time::Duration;

use ble_printer::{LoopbackAdapter, PrintError};
use chrono::Local;
use receipt_service::cli::{self, JobKind};
use receipt_service::{
    Config, OrderRecord, PrintEvent, PrintJob, PrintJobError, PrintService, PrintStage,
    RenderMode, ReturnOrder, SaleOrder,
};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const PRINTER_ID: &str = "DC:0D:30:00:11:22";

fn config() -> Config {
    let mut config = Config::default();
    config.printer.settle_delay = Duration::ZERO;
    config
}

fn printer() -> Arc<LoopbackAdapter> {
    Arc::new(
        LoopbackAdapter::new()
            .with_device("AA:AA:AA:AA:AA:AA", "Headphones")
            .with_device(PRINTER_ID, "MPT-II"),
    )
}

fn sale_order(shop_id: i64, items: usize) -> SaleOrder {
    let details: Vec<_> = (0..items)
        .map(|i| {
            json!({
                "product": {"name": format!("农夫山泉矿泉水{}", i)},
                "quantity": 2,
                "salePrice": "1.50",
                "totalSalesAmount": "3.00"
            })
        })
        .collect();
    serde_json::from_value(json!({
        "shop": {"id": shop_id, "name": "清徐一号店"},
        "createTime": "2024-05-20T14:03:00",
        "totalSalesAmount": format!("{}.00", items * 3),
        "orderDetails": details
    }))
    .unwrap()
}

fn return_order(shop_id: i64) -> ReturnOrder {
    serde_json::from_value(json!({
        "shop": {"id": shop_id, "name": "清徐一号店"},
        "createTime": "2024-05-21 08:00:00",
        "amount": "5.00",
        "returnOrderDetails": [
            {"product": {"name": "可乐"}, "type": "换货", "amount": "5.00"}
        ]
    }))
    .unwrap()
}

async fn print_collect(
    service: &PrintService,
    job: &PrintJob,
    cancel: &CancellationToken,
) -> (Result<(), PrintJobError>, Vec<PrintEvent>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let result = service.print(job, &tx, cancel).await.map(|_| ());
    drop(tx);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    (result, events)
}

fn stages(events: &[PrintEvent]) -> Vec<PrintStage> {
    events
        .iter()
        .filter_map(|e| match e {
            PrintEvent::Stage(s) => Some(*s),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_sale_print_end_to_end() {
    let adapter = printer();
    let service = PrintService::new(adapter.clone(), &config()).unwrap();
    let job = PrintJob::Sale(sale_order(1, 5));

    let (result, events) = print_collect(&service, &job, &CancellationToken::new()).await;
    result.unwrap();

    assert_eq!(
        stages(&events),
        vec![
            PrintStage::Composing,
            PrintStage::LocatingDevice,
            PrintStage::Connecting,
            PrintStage::Sending,
            PrintStage::Disconnecting,
            PrintStage::Done,
        ]
    );
    assert_eq!(events.last(), Some(&PrintEvent::Finished(Ok(()))));

    // the bytes on the wire are exactly the encoded document, in order
    let expected = service
        .compose(&job, RenderMode::Print, Local::now().naive_local())
        .unwrap()
        .encode();
    assert_eq!(adapter.written_bytes(), expected.as_bytes());
    assert!(adapter.writes().iter().all(|w| w.len() <= 128));

    let chunk_count = adapter.writes().len();
    assert!(events.contains(&PrintEvent::Progress {
        sent: chunk_count,
        total: chunk_count
    }));

    assert_eq!(adapter.connects(), vec![PRINTER_ID.to_string()]);
    assert_eq!(adapter.connected_device(), None);
}

#[tokio::test]
async fn test_keep_alive_reuses_connection() {
    let adapter = printer();
    let mut config = config();
    config.keep_alive = true;
    let service = PrintService::new(adapter.clone(), &config).unwrap();

    for _ in 0..2 {
        let (result, events) = print_collect(
            &service,
            &PrintJob::Return(return_order(1)),
            &CancellationToken::new(),
        )
        .await;
        result.unwrap();
        assert!(!stages(&events).contains(&PrintStage::Disconnecting));
    }

    assert_eq!(adapter.scan_starts(), 1);
    assert_eq!(adapter.connects().len(), 1);
    assert_eq!(adapter.connected_device().as_deref(), Some(PRINTER_ID));
}

#[tokio::test]
async fn test_keep_alive_reconnects_after_peripheral_drops_link() {
    let adapter = printer();
    let mut config = config();
    config.keep_alive = true;
    let service = PrintService::new(adapter.clone(), &config).unwrap();
    let job = PrintJob::Return(return_order(1));

    let (result, _) = print_collect(&service, &job, &CancellationToken::new()).await;
    result.unwrap();
    let first_len = adapter.written_bytes().len();

    // printer powered off between jobs
    assert!(adapter.drop_link(PRINTER_ID));

    let (result, events) = print_collect(&service, &job, &CancellationToken::new()).await;
    result.unwrap();

    assert_eq!(
        stages(&events),
        vec![
            PrintStage::Composing,
            PrintStage::LocatingDevice,
            PrintStage::Connecting,
            PrintStage::Sending,
            PrintStage::Done,
        ]
    );
    assert_eq!(adapter.scan_starts(), 2);
    assert_eq!(
        adapter.connects(),
        vec![PRINTER_ID.to_string(), PRINTER_ID.to_string()]
    );
    assert_eq!(adapter.written_bytes().len(), first_len * 2);
    assert_eq!(adapter.connected_device().as_deref(), Some(PRINTER_ID));
}

#[tokio::test]
async fn test_merged_across_shops_never_touches_radio() {
    let adapter = printer();
    let service = PrintService::new(adapter.clone(), &config()).unwrap();
    let job = PrintJob::Merged(vec![
        OrderRecord::Sale(sale_order(1, 1)),
        OrderRecord::Return(return_order(2)),
    ]);

    let (result, events) = print_collect(&service, &job, &CancellationToken::new()).await;

    assert!(matches!(result, Err(PrintJobError::Compose(_))));
    assert_eq!(stages(&events), vec![PrintStage::Composing]);
    assert!(matches!(events.last(), Some(PrintEvent::Finished(Err(_)))));
    assert_eq!(adapter.scan_starts(), 0);
    assert!(adapter.connects().is_empty());
    assert_eq!(adapter.write_attempts(), 0);
}

#[tokio::test]
async fn test_write_failure_disconnects_and_reports_chunk() {
    let adapter = Arc::new(
        LoopbackAdapter::new()
            .with_device(PRINTER_ID, "MPT-II")
            .fail_write_at(1),
    );
    let service = PrintService::new(adapter.clone(), &config()).unwrap();

    let (result, events) = print_collect(
        &service,
        &PrintJob::Sale(sale_order(1, 5)),
        &CancellationToken::new(),
    )
    .await;

    match result {
        Err(PrintJobError::Printer(PrintError::TransportWriteFailed {
            chunk_index,
            total_chunks,
            ..
        })) => {
            assert_eq!(chunk_index, 1);
            assert!(total_chunks >= 3);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    // aborted right after the failing chunk
    assert_eq!(adapter.write_attempts(), 2);
    assert_eq!(adapter.disconnects(), vec![PRINTER_ID.to_string()]);
    assert!(stages(&events).contains(&PrintStage::Disconnecting));
    assert!(!stages(&events).contains(&PrintStage::Done));
    assert!(service.connections().active().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_printer_not_found() {
    let adapter = Arc::new(LoopbackAdapter::new().with_device("AA:AA", "Headphones"));
    let service = PrintService::new(adapter.clone(), &config()).unwrap();

    let (result, events) = print_collect(
        &service,
        &PrintJob::Return(return_order(1)),
        &CancellationToken::new(),
    )
    .await;

    assert!(matches!(
        result,
        Err(PrintJobError::Printer(PrintError::DeviceNotFound { timeout_ms: 5000, .. }))
    ));
    assert_eq!(
        stages(&events),
        vec![PrintStage::Composing, PrintStage::LocatingDevice]
    );
    assert!(!adapter.is_scanning());
    assert!(adapter.connects().is_empty());
}

#[tokio::test]
async fn test_cancelled_before_first_chunk() {
    let adapter = printer();
    let service = PrintService::new(adapter.clone(), &config()).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let (result, _) = print_collect(&service, &PrintJob::Sale(sale_order(1, 1)), &cancel).await;

    assert!(matches!(
        result,
        Err(PrintJobError::Printer(PrintError::Cancelled { chunks_sent: 0 }))
    ));
    assert_eq!(adapter.write_attempts(), 0);
    assert_eq!(adapter.connected_device(), None);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_print_is_busy() {
    let adapter = Arc::new(
        LoopbackAdapter::new()
            .with_device(PRINTER_ID, "MPT-II")
            .with_write_delay(Duration::from_millis(100)),
    );
    let service = PrintService::new(adapter.clone(), &config()).unwrap();
    let job = PrintJob::Sale(sale_order(1, 1));
    let cancel = CancellationToken::new();

    let (first, second) = tokio::join!(print_collect(&service, &job, &cancel), async {
        tokio::task::yield_now().await;
        print_collect(&service, &job, &cancel).await
    });

    assert!(first.0.is_ok());
    assert!(matches!(second.0, Err(PrintJobError::Busy)));
    assert_eq!(
        second.1,
        vec![PrintEvent::Finished(Err(
            "Another print job is in progress".to_string()
        ))]
    );
    assert_eq!(adapter.connects().len(), 1);
}

#[tokio::test]
async fn test_cli_dry_run_writes_frame() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("orders.json");
    let orders = json!([
        serde_json::to_value(sale_order(7, 2)).unwrap(),
        serde_json::to_value(return_order(7)).unwrap(),
    ]);
    std::fs::write(&input, orders.to_string()).unwrap();

    let job = cli::load_job(JobKind::Merged, &input).unwrap();
    assert!(matches!(&job, PrintJob::Merged(records) if records.len() == 2));

    let preview = cli::preview(&config(), &job).unwrap();
    assert!(preview.contains("最终结算: 1.00"));

    let bytes = cli::dry_run(&config(), &job).await.unwrap();
    assert_eq!(&bytes[..2], &[0x1B, 0x40]);

    let output = dir.path().join("out.bin");
    std::fs::write(&output, &bytes).unwrap();
    assert_eq!(std::fs::read(&output).unwrap(), bytes);
}

#[test]
fn test_cli_load_job_reports_bad_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.json");
    let err = cli::load_job(JobKind::Sale, &missing).unwrap_err();
    assert!(err.to_string().contains("nope.json"));
}
