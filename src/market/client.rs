//! Binance USDT-M futures REST gateway.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, instrument};

use super::traits::MarketGateway;
use super::types::{AccountBalance, Balance, BestPrices, BookTicker, Fill, OrderResponse, OrderSide};
use crate::config::ExchangeConfig;
use crate::error::{EngineError, Result};

const FUTURES_BASE_URL: &str = "https://fapi.binance.com";
const FUTURES_TESTNET_URL: &str = "https://testnet.binancefuture.com";

/// REST client for Binance USDT-M futures.
pub struct BinanceFuturesClient {
    http: Client,
    api_key: String,
    secret_key: String,
    base_url: String,
}

impl BinanceFuturesClient {
    /// Create a new client from configuration.
    pub fn new(config: &ExchangeConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        let base_url = if config.testnet {
            FUTURES_TESTNET_URL.to_string()
        } else {
            FUTURES_BASE_URL.to_string()
        };

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            secret_key: config.secret_key.clone(),
            base_url,
        })
    }

    /// Generate HMAC-SHA256 signature for authenticated requests.
    fn sign(&self, query_string: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(query_string.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Current timestamp in milliseconds.
    fn timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards")
            .as_millis() as u64
    }

    /// Place a market order and wait for the fill report.
    #[instrument(skip(self))]
    async fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        size: Decimal,
    ) -> Result<Fill> {
        let timestamp = Self::timestamp();
        let params = vec![
            ("symbol".to_string(), symbol.to_string()),
            ("side".to_string(), format!("{:?}", side).to_uppercase()),
            ("type".to_string(), "MARKET".to_string()),
            ("quantity".to_string(), size.to_string()),
            ("newOrderRespType".to_string(), "RESULT".to_string()),
            ("timestamp".to_string(), timestamp.to_string()),
        ];

        let query_string: String = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let signature = self.sign(&query_string);
        let url = format!(
            "{}/fapi/v1/order?{}&signature={}",
            self.base_url, query_string, signature
        );

        debug!(%symbol, ?side, %size, "Placing market order");

        let response = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(|e| EngineError::OrderRejected(e.to_string()))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::OrderRejected(body));
        }

        let order: OrderResponse = response
            .json()
            .await
            .map_err(|e| EngineError::OrderRejected(e.to_string()))?;

        Ok(Fill::from(&order))
    }
}

#[async_trait]
impl MarketGateway for BinanceFuturesClient {
    #[instrument(skip(self))]
    async fn best_prices(&self, symbol: &str) -> Result<BestPrices> {
        let url = format!(
            "{}/fapi/v1/ticker/bookTicker?symbol={}",
            self.base_url, symbol
        );
        let ticker: BookTicker = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::MarketUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| EngineError::MarketUnavailable(e.to_string()))?;

        Ok(BestPrices {
            bid: ticker.bid_price,
            ask: ticker.ask_price,
        })
    }

    async fn open_long(&self, symbol: &str, size: Decimal) -> Result<Fill> {
        self.place_market_order(symbol, OrderSide::Buy, size).await
    }

    async fn open_short(&self, symbol: &str, size: Decimal) -> Result<Fill> {
        self.place_market_order(symbol, OrderSide::Sell, size).await
    }

    #[instrument(skip(self))]
    async fn balance(&self, asset: &str) -> Result<Balance> {
        let timestamp = Self::timestamp();
        let query = format!("timestamp={}", timestamp);
        let signature = self.sign(&query);

        let url = format!(
            "{}/fapi/v2/balance?{}&signature={}",
            self.base_url, query, signature
        );

        let balances: Vec<AccountBalance> = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(|e| EngineError::MarketUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| EngineError::MarketUnavailable(e.to_string()))?;

        balances
            .into_iter()
            .find(|b| b.asset == asset)
            .map(|b| Balance {
                equity: b.balance + b.cross_un_pnl,
                available: b.available_balance,
            })
            .ok_or_else(|| {
                EngineError::MarketUnavailable(format!("no balance entry for asset {}", asset))
            })
    }
}
