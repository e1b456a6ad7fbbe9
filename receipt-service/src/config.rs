use std::time::Duration;

use ble_printer::PrinterProfile;
use uuid::Uuid;

use crate::composer::MerchantInfo;

/// 打印服务配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | PRINTER_NAME | MPT-II | 打印机广播名称 (精确匹配) |
/// | PRINTER_SERVICE_UUID | 000018f0-0000-1000-8000-00805f9b34fb | GATT 服务 |
/// | PRINTER_CHARACTERISTIC_UUID | 00002af1-0000-1000-8000-00805f9b34fb | 可写特征 |
/// | PRINTER_CHUNK_SIZE | 128 | 每次写入字节数 |
/// | SCAN_TIMEOUT_MS | 5000 | 扫描超时(毫秒) |
/// | SETTLE_DELAY_MS | 1000 | 连接后等待(毫秒) |
/// | CONNECT_TIMEOUT_MS | 10000 | 连接超时(毫秒) |
/// | WRITE_TIMEOUT_MS | 5000 | 单次写入超时(毫秒) |
/// | PAPER_WIDTH | 32 | 每行字符数 |
/// | MERCHANT_NAME | 清徐欣凯副食经销 | 小票抬头 |
/// | MERCHANT_PHONE | 13912345678 | 抬头电话 |
/// | KEEP_ALIVE | false | 打印后保持连接 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | (无) | 日志目录，设置后按天滚动写文件 |
///
/// # 示例
///
/// ```ignore
/// PRINTER_NAME=MPT-III KEEP_ALIVE=true receipt-print dry-run sale orders.json
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 打印机型号参数
    pub printer: PrinterProfile,
    /// 小票抬头
    pub merchant: MerchantInfo,
    /// 打印完成后是否保持连接，供下一次打印复用
    pub keep_alive: bool,
    pub log_level: String,
    pub log_dir: Option<String>,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置或无法解析，使用默认值
    pub fn from_env() -> Self {
        let defaults = PrinterProfile::default();
        let merchant = MerchantInfo::default();

        let printer = PrinterProfile {
            device_name: std::env::var("PRINTER_NAME").unwrap_or(defaults.device_name),
            service_uuid: std::env::var("PRINTER_SERVICE_UUID")
                .ok()
                .and_then(|v| Uuid::parse_str(&v).ok())
                .unwrap_or(defaults.service_uuid),
            characteristic_uuid: std::env::var("PRINTER_CHARACTERISTIC_UUID")
                .ok()
                .and_then(|v| Uuid::parse_str(&v).ok())
                .unwrap_or(defaults.characteristic_uuid),
            chunk_size: std::env::var("PRINTER_CHUNK_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.chunk_size),
            scan_timeout: env_millis("SCAN_TIMEOUT_MS").unwrap_or(defaults.scan_timeout),
            settle_delay: env_millis("SETTLE_DELAY_MS").unwrap_or(defaults.settle_delay),
            connect_timeout: env_millis("CONNECT_TIMEOUT_MS").unwrap_or(defaults.connect_timeout),
            write_timeout: env_millis("WRITE_TIMEOUT_MS").unwrap_or(defaults.write_timeout),
            paper_width: std::env::var("PAPER_WIDTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.paper_width),
        };

        Self {
            printer,
            merchant: MerchantInfo {
                name: std::env::var("MERCHANT_NAME").unwrap_or(merchant.name),
                phone: std::env::var("MERCHANT_PHONE").unwrap_or(merchant.phone),
            },
            keep_alive: std::env::var("KEEP_ALIVE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.is_empty()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            printer: PrinterProfile::default(),
            merchant: MerchantInfo::default(),
            keep_alive: false,
            log_level: "info".into(),
            log_dir: None,
        }
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_profile() {
        let config = Config::default();
        assert_eq!(config.printer, PrinterProfile::default());
        assert_eq!(config.merchant.name, "清徐欣凯副食经销");
        assert!(!config.keep_alive);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_env_millis_rejects_garbage() {
        // SAFETY: variable name is unique to this test
        unsafe { std::env::set_var("RECEIPT_TEST_BAD_MS", "abc") };
        assert_eq!(env_millis("RECEIPT_TEST_BAD_MS"), None);
        unsafe { std::env::set_var("RECEIPT_TEST_BAD_MS", "250") };
        assert_eq!(
            env_millis("RECEIPT_TEST_BAD_MS"),
            Some(Duration::from_millis(250))
        );
    }
}
