//! Gateway-facing types and Binance API response definitions.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Best bid/ask snapshot for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BestPrices {
    pub bid: Decimal,
    pub ask: Decimal,
}

/// Result of an order execution. Immutable, produced per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fill {
    pub avg_price: Decimal,
    pub filled_size: Decimal,
}

/// Account balance for one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Balance {
    pub equity: Decimal,
    pub available: Decimal,
}

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
    ExpiredInMatch,
}

// ==================== Binance wire types ====================

/// Best bid/ask prices and quantities.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookTicker {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub bid_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub bid_qty: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub ask_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub ask_qty: Decimal,
}

/// Account balance information.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    pub asset: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub balance: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub cross_un_pnl: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub available_balance: Decimal,
}

/// Order response from the exchange.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: i64,
    pub symbol: String,
    pub status: OrderStatus,
    #[serde(with = "rust_decimal::serde::str")]
    pub avg_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub orig_qty: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub executed_qty: Decimal,
    pub side: OrderSide,
}

impl From<&OrderResponse> for Fill {
    fn from(order: &OrderResponse) -> Self {
        Fill {
            avg_price: order.avg_price,
            filled_size: order.executed_qty,
        }
    }
}
