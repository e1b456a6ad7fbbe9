//! Receipt composer
//!
//! Builds sale / return / merged receipt documents from order records.
//! The same composer serves on-screen preview (`RenderMode::Display`) and
//! printing (`RenderMode::Print`); the text is identical in both modes, only
//! print mode carries style directives.

use ble_printer::escpos::{EncodedFrame, FrameBuilder, Scale, Style};
use ble_printer::layout::{Column, layout_header, layout_row};
use chrono::{DateTime, Local, NaiveDateTime};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{OrderRecord, ReturnOrder, ReturnOrderDetail, SaleOrder, Shop};

/// Blank lines appended after the last content line for tear-off
const FEED_LINES: usize = 3;

const DEFAULT_MERCHANT_NAME: &str = "清徐欣凯副食经销";
const DEFAULT_MERCHANT_PHONE: &str = "13912345678";

#[derive(Debug, Error)]
pub enum ComposeError {
    /// Upstream handed over data the composer must not render
    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),
}

// ============================================================================
// Document
// ============================================================================

/// One printed line, without its line terminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptLine {
    Styled { text: String, style: Style },
    Plain { text: String },
}

impl ReceiptLine {
    pub fn text(&self) -> &str {
        match self {
            ReceiptLine::Styled { text, .. } | ReceiptLine::Plain { text } => text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Plain text only, for on-screen preview
    #[default]
    Display,
    /// Styled lines for the printer
    Print,
}

/// A finished receipt; always ends with the tear-off feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptDocument {
    lines: Vec<ReceiptLine>,
}

impl ReceiptDocument {
    pub fn lines(&self) -> &[ReceiptLine] {
        &self.lines
    }

    /// Human-readable text of the whole receipt
    pub fn preview(&self) -> String {
        self.lines
            .iter()
            .map(ReceiptLine::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Encode into one ESC/POS frame
    pub fn encode(&self) -> EncodedFrame {
        encode_document(self)
    }
}

/// `ESC @`, then every line followed by LF
pub fn encode_document(doc: &ReceiptDocument) -> EncodedFrame {
    let mut builder = FrameBuilder::new();
    for line in &doc.lines {
        match line {
            ReceiptLine::Styled { text, style } => builder.styled_line(text, style),
            ReceiptLine::Plain { text } => builder.plain_line(text),
        };
    }
    builder.build()
}

/// Accumulates lines; the only way to obtain a [`ReceiptDocument`]
pub struct DocumentBuilder {
    mode: RenderMode,
    lines: Vec<ReceiptLine>,
}

impl DocumentBuilder {
    pub fn new(mode: RenderMode) -> Self {
        Self {
            mode,
            lines: Vec::with_capacity(64),
        }
    }

    /// Add a line in `style`; display mode drops the style
    pub fn line(&mut self, text: impl Into<String>, style: Style) -> &mut Self {
        let text = text.into();
        self.lines.push(match self.mode {
            RenderMode::Display => ReceiptLine::Plain { text },
            RenderMode::Print => ReceiptLine::Styled { text, style },
        });
        self
    }

    pub fn text(&mut self, text: impl Into<String>) -> &mut Self {
        self.line(text, Style::default())
    }

    pub fn bold(&mut self, text: impl Into<String>) -> &mut Self {
        self.line(text, Style::new().bold())
    }

    pub fn blank(&mut self) -> &mut Self {
        self.lines.push(ReceiptLine::Plain {
            text: String::new(),
        });
        self
    }

    pub fn divider(&mut self, ch: char, width: usize) -> &mut Self {
        self.text(ch.to_string().repeat(width))
    }

    pub fn finish(mut self) -> ReceiptDocument {
        for _ in 0..FEED_LINES {
            self.blank();
        }
        ReceiptDocument { lines: self.lines }
    }
}

// ============================================================================
// Composer
// ============================================================================

/// Header identity printed at the top of every receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantInfo {
    pub name: String,
    pub phone: String,
}

impl Default for MerchantInfo {
    fn default() -> Self {
        Self {
            name: DEFAULT_MERCHANT_NAME.to_string(),
            phone: DEFAULT_MERCHANT_PHONE.to_string(),
        }
    }
}

/// Merged receipt subtotals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergedTotals {
    pub sales: Decimal,
    pub returns: Decimal,
    /// sales - returns; may be negative
    pub net: Decimal,
}

impl MergedTotals {
    /// Exact sums of each order's stated total
    pub fn from_orders(orders: &[OrderRecord]) -> Self {
        let (sales, returns) =
            orders
                .iter()
                .fold((Decimal::ZERO, Decimal::ZERO), |(s, r), order| match order {
                    OrderRecord::Sale(o) => (s + o.total_sales_amount, r),
                    OrderRecord::Return(o) => (s, r + o.amount),
                });
        Self {
            sales,
            returns,
            net: sales - returns,
        }
    }
}

fn sale_columns() -> [Column; 4] {
    [
        Column::new("商品名称", 14).wrapping(10),
        Column::new("数量", 6),
        Column::new("单价", 8),
        Column::new("总价", 8),
    ]
}

fn return_columns() -> [Column; 4] {
    [
        Column::new("商品名称", 14).wrapping(10),
        Column::new("类型", 8),
        Column::new("数量", 6),
        Column::new("金额", 8),
    ]
}

/// Receipt composer
pub struct ReceiptComposer {
    merchant: MerchantInfo,
    width: usize,
}

impl ReceiptComposer {
    pub fn new(merchant: MerchantInfo, width: usize) -> Self {
        Self { merchant, width }
    }

    /// 销售小票
    pub fn compose_sale(&self, order: &SaleOrder, mode: RenderMode) -> ReceiptDocument {
        let mut b = DocumentBuilder::new(mode);
        let columns = sale_columns();

        self.render_header(&mut b, &order.shop, None);
        b.text(format!("日期: {}", format_time(order.create_time.as_deref())));
        b.divider('-', self.width);
        b.bold(layout_header(&columns));
        for detail in &order.order_details {
            let values = [
                detail.product.name.clone(),
                detail.quantity.to_string(),
                detail.sale_price.to_string(),
                detail.total_sales_amount.to_string(),
            ];
            push_rows(&mut b, &values, &columns);
        }
        b.divider('-', self.width);
        b.bold(format!("总计: {}", order.total_sales_amount));

        b.finish()
    }

    /// 退货单
    pub fn compose_return(&self, order: &ReturnOrder, mode: RenderMode) -> ReceiptDocument {
        let mut b = DocumentBuilder::new(mode);
        let columns = return_columns();

        self.render_header(&mut b, &order.shop, Some("退货单"));
        b.text(format!("日期: {}", format_time(order.create_time.as_deref())));
        b.divider('-', self.width);
        b.bold(layout_header(&columns));
        for detail in &order.return_order_details {
            push_rows(&mut b, &return_row(detail), &columns);
        }
        b.divider('-', self.width);
        b.bold(format!("退款总额: {}", order.amount));

        b.finish()
    }

    /// 合并订单
    ///
    /// All orders must belong to one shop; checked before anything is built.
    pub fn compose_merged(
        &self,
        orders: &[OrderRecord],
        printed_at: NaiveDateTime,
        mode: RenderMode,
    ) -> Result<ReceiptDocument, ComposeError> {
        let shop = check_single_shop(orders)?;
        let totals = MergedTotals::from_orders(orders);

        let mut b = DocumentBuilder::new(mode);
        self.render_header(&mut b, shop, Some("合并订单"));
        b.text(format!("打印时间: {}", printed_at.format("%Y-%m-%d %H:%M")));
        b.divider('-', self.width);

        let sales: Vec<&SaleOrder> = orders
            .iter()
            .filter_map(|o| match o {
                OrderRecord::Sale(s) => Some(s),
                _ => None,
            })
            .collect();
        let returns: Vec<&ReturnOrder> = orders
            .iter()
            .filter_map(|o| match o {
                OrderRecord::Return(r) => Some(r),
                _ => None,
            })
            .collect();

        if !sales.is_empty() {
            let columns = sale_columns();
            b.blank();
            b.bold("【销售订单】");
            b.bold(layout_header(&columns));
            for detail in sales.iter().flat_map(|o| &o.order_details) {
                let values = [
                    detail.product.name.clone(),
                    detail.quantity.to_string(),
                    detail.sale_price.to_string(),
                    detail.total_sales_amount.to_string(),
                ];
                push_rows(&mut b, &values, &columns);
            }
            b.divider('-', self.width);
            b.bold(format!("销售总额: {}", money(totals.sales)));
            b.blank();
        }

        if !returns.is_empty() {
            let columns = return_columns();
            b.blank();
            b.bold("【退货订单】");
            b.bold(layout_header(&columns));
            for detail in returns.iter().flat_map(|o| &o.return_order_details) {
                push_rows(&mut b, &return_row(detail), &columns);
            }
            b.divider('-', self.width);
            b.bold(format!("退款总额: {}", money(totals.returns)));
            b.blank();
        }

        b.divider('=', self.width);
        b.bold(format!("最终结算: {}", money(totals.net)));

        Ok(b.finish())
    }

    fn render_header(&self, b: &mut DocumentBuilder, shop: &Shop, title: Option<&str>) {
        let large = Style::new().scale(Scale::DoubleBoth).bold();

        b.blank().blank();
        b.line(
            self.merchant.name.as_str(),
            Style::new().scale(Scale::TripleBoth).bold(),
        );
        b.text(format!("电话: {}", self.merchant.phone));
        b.blank();
        b.line(shop.name.as_str(), large);
        b.blank();
        if let Some(title) = title {
            b.line(title, large);
            b.blank();
        }
    }
}

impl Default for ReceiptComposer {
    fn default() -> Self {
        Self::new(MerchantInfo::default(), 32)
    }
}

fn push_rows(b: &mut DocumentBuilder, values: &[String], columns: &[Column]) {
    for row in layout_row(values, columns) {
        b.text(row);
    }
}

fn return_row(detail: &ReturnOrderDetail) -> [String; 4] {
    let quantity = if detail.return_type.shows_quantity() {
        detail.quantity.unwrap_or(Decimal::ONE).to_string()
    } else {
        "-".to_string()
    };
    [
        detail.product.name.clone(),
        detail.return_type.label().to_string(),
        quantity,
        detail.amount.to_string(),
    ]
}

fn check_single_shop(orders: &[OrderRecord]) -> Result<&Shop, ComposeError> {
    let first = orders.first().ok_or_else(|| {
        ComposeError::PreconditionViolation("merged receipt needs at least one order".into())
    })?;
    let shop = first.shop();
    if let Some(other) = orders.iter().find(|o| o.shop().id != shop.id) {
        return Err(ComposeError::PreconditionViolation(format!(
            "merged orders span shops {} and {}",
            shop.id,
            other.shop().id
        )));
    }
    Ok(shop)
}

/// Two decimal places, rounded half away from zero; never `-0.00`
fn money(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_zero() {
        return "0.00".to_string();
    }
    format!("{:.2}", rounded)
}

/// `YYYY-MM-DD HH:MM` in local time when parseable, otherwise verbatim
pub fn format_time(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return String::new();
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string();
    }
    const NAIVE_FORMATS: [&str; 3] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return dt.format("%Y-%m-%d %H:%M").to_string();
        }
    }
    raw.to_string()
}
