//! Order records as supplied by the order store
//!
//! Field names follow the upstream JSON (camelCase). Money and quantities
//! are `Decimal` and accept either JSON numbers or strings.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Shop identity; upstream ids are numeric or string depending on the source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShopId {
    Int(i64),
    Text(String),
}

impl fmt::Display for ShopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShopId::Int(id) => write!(f, "{}", id),
            ShopId::Text(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shop {
    pub id: ShopId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
}

/// 销售明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    pub product: Product,
    pub quantity: Decimal,
    pub sale_price: Decimal,
    pub total_sales_amount: Decimal,
}

/// 销售订单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleOrder {
    pub shop: Shop,
    #[serde(default)]
    pub create_time: Option<String>,
    /// Stated order total; merged subtotals sum this, never the rows
    pub total_sales_amount: Decimal,
    pub order_details: Vec<OrderDetail>,
}

/// 退货类型
///
/// Only `ReturnAndRefund` is refunded per unit, so only it shows a quantity.
/// Labels outside the known set are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReturnType {
    /// 退货退款
    ReturnAndRefund,
    /// 仅退款
    RefundOnly,
    /// 换货
    Exchange,
    Other(String),
}

impl ReturnType {
    pub fn label(&self) -> &str {
        match self {
            ReturnType::ReturnAndRefund => "退货退款",
            ReturnType::RefundOnly => "仅退款",
            ReturnType::Exchange => "换货",
            ReturnType::Other(label) => label,
        }
    }

    /// Whether the quantity column is meaningful for this type
    pub fn shows_quantity(&self) -> bool {
        matches!(self, ReturnType::ReturnAndRefund)
    }
}

impl From<String> for ReturnType {
    fn from(label: String) -> Self {
        match label.as_str() {
            "退货退款" => ReturnType::ReturnAndRefund,
            "仅退款" => ReturnType::RefundOnly,
            "换货" => ReturnType::Exchange,
            _ => ReturnType::Other(label),
        }
    }
}

impl From<ReturnType> for String {
    fn from(t: ReturnType) -> Self {
        t.label().to_string()
    }
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 退货明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnOrderDetail {
    pub product: Product,
    #[serde(rename = "type")]
    pub return_type: ReturnType,
    #[serde(default)]
    pub quantity: Option<Decimal>,
    pub amount: Decimal,
}

/// 退货单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnOrder {
    pub shop: Shop,
    #[serde(default)]
    pub create_time: Option<String>,
    /// Stated refund total
    pub amount: Decimal,
    pub return_order_details: Vec<ReturnOrderDetail>,
}

/// Either kind of order, distinguished by which detail list it carries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrderRecord {
    Sale(SaleOrder),
    Return(ReturnOrder),
}

impl OrderRecord {
    pub fn shop(&self) -> &Shop {
        match self {
            OrderRecord::Sale(o) => &o.shop,
            OrderRecord::Return(o) => &o.shop,
        }
    }
}

impl From<SaleOrder> for OrderRecord {
    fn from(order: SaleOrder) -> Self {
        OrderRecord::Sale(order)
    }
}

impl From<ReturnOrder> for OrderRecord {
    fn from(order: ReturnOrder) -> Self {
        OrderRecord::Return(order)
    }
}
