use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use common::clients::{AccountClient, MarketDataClient, OrderClient};
use common::config::AppConfig;
use common::errors::NetworkError;
use common::models::{Candle, OrderResult, Position, TradeIntent};
use hmac::{Hmac, Mac};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use sha2::Sha256;
use tracing::{debug, error, info, warn};

use crate::remote::responses::{
    Envelope, KlineResult, LEVERAGE_NOT_MODIFIED, OrderCreateResult, PositionResult, WalletResult,
};

type HmacSha256 = Hmac<Sha256>;

const RECV_WINDOW: &str = "5000";
const CATEGORY: &str = "linear";

/// Bybit v5 REST client for USDT linear perpetuals.
#[derive(Clone)]
pub struct BybitClient {
    client: Client,
    base_url: String,
    api_key: String,
    secret_key: String,
    timeout: Duration,
}

impl BybitClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .user_agent("signal_bot/0.1.0")
            .timeout(timeout)
            .build()
            .map_err(|e| NetworkError::Request(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            timeout,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, NetworkError> {
        Self::new(
            config.bybit_base_url.clone(),
            config.bybit_api_key.clone(),
            config.bybit_api_secret.clone(),
            config.network_timeout,
        )
    }

    /// hex(HMAC-SHA256(timestamp + api_key + recv_window + payload))
    fn sign(&self, timestamp: &str, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(timestamp.as_bytes());
        mac.update(self.api_key.as_bytes());
        mac.update(RECV_WINDOW.as_bytes());
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn timestamp() -> String {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default()
            .to_string()
    }

    fn with_auth(&self, request: RequestBuilder, payload: &str) -> RequestBuilder {
        let timestamp = Self::timestamp();
        let signature = self.sign(&timestamp, payload);
        request
            .header("X-BAPI-API-KEY", &self.api_key)
            .header("X-BAPI-TIMESTAMP", timestamp)
            .header("X-BAPI-RECV-WINDOW", RECV_WINDOW)
            .header("X-BAPI-SIGN", signature)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        private: bool,
    ) -> Result<T, NetworkError> {
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let url = format!("{}{}?{}", self.base_url, path, query);

        let mut request = self.client.get(&url);
        if private {
            request = self.with_auth(request, &query);
        }
        let resp = request.send().await.map_err(|e| self.map_err(e))?;
        self.decode(path, resp).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<Envelope<T>, NetworkError> {
        let body = body.to_string();
        let url = format!("{}{}", self.base_url, path);

        let request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(body.clone());
        let resp = self
            .with_auth(request, &body)
            .send()
            .await
            .map_err(|e| self.map_err(e))?;
        self.decode(path, resp).await
    }

    async fn decode<T: DeserializeOwned>(&self, path: &str, resp: Response) -> Result<T, NetworkError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!("Bybit {} failed: HTTP {} {}", path, status, body);
            return Err(NetworkError::Status {
                status: status.as_u16(),
                body,
            });
        }
        resp.json::<T>()
            .await
            .map_err(|e| NetworkError::Decode(format!("{}: {}", path, e)))
    }

    fn map_err(&self, e: reqwest::Error) -> NetworkError {
        if e.is_timeout() {
            NetworkError::Timeout(self.timeout)
        } else {
            NetworkError::Request(e.to_string())
        }
    }
}

/// Plain decimal text without exponent or trailing zeros.
fn format_decimal(value: f64, max_decimals: usize) -> String {
    let text = format!("{:.*}", max_decimals, value);
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

#[async_trait]
impl MarketDataClient for BybitClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, NetworkError> {
        let params = [
            ("category", CATEGORY.to_string()),
            ("symbol", symbol.to_uppercase()),
            ("interval", interval.to_string()),
            ("limit", limit.to_string()),
        ];
        let envelope: Envelope<KlineResult> = self.get("/v5/market/kline", &params, false).await?;
        let candles = envelope.into_result()?.into_candles()?;
        debug!("Fetched {} candles for {}", candles.len(), symbol);
        Ok(candles)
    }
}

#[async_trait]
impl AccountClient for BybitClient {
    async fn get_balance(&self) -> Result<f64, NetworkError> {
        let params = [
            ("accountType", "UNIFIED".to_string()),
            ("coin", "USDT".to_string()),
        ];
        let envelope: Envelope<WalletResult> =
            self.get("/v5/account/wallet-balance", &params, true).await?;
        envelope.into_result()?.total_equity()
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), NetworkError> {
        let body = json!({
            "category": CATEGORY,
            "symbol": symbol.to_uppercase(),
            "buyLeverage": leverage.to_string(),
            "sellLeverage": leverage.to_string(),
        });
        let envelope: Envelope<serde_json::Value> =
            self.post("/v5/position/set-leverage", body).await?;
        if envelope.ret_code == LEVERAGE_NOT_MODIFIED {
            debug!("Leverage for {} already {}", symbol, leverage);
            return Ok(());
        }
        envelope.into_result().map(|_| ())
    }

    async fn open_positions(&self) -> Result<Vec<Position>, NetworkError> {
        let params = [
            ("category", CATEGORY.to_string()),
            ("settleCoin", "USDT".to_string()),
        ];
        let envelope: Envelope<PositionResult> =
            self.get("/v5/position/list", &params, true).await?;
        envelope.into_result()?.into_positions()
    }
}

#[async_trait]
impl OrderClient for BybitClient {
    async fn place_order(&self, intent: &TradeIntent) -> Result<OrderResult, NetworkError> {
        let body = json!({
            "category": CATEGORY,
            "symbol": intent.symbol.to_uppercase(),
            "side": intent.side.as_str(),
            "orderType": "Market",
            "qty": format_decimal(intent.quantity, 6),
            "stopLoss": format_decimal(intent.stop_loss, 8),
            "takeProfit": format_decimal(intent.take_profit, 8),
            "timeInForce": "GTC",
            "positionIdx": 0,
        });

        info!(
            "Placing Order: {} {} {}",
            intent.side, intent.quantity, intent.symbol
        );

        let envelope: Envelope<OrderCreateResult> = self.post("/v5/order/create", body).await?;
        match envelope.into_result() {
            Ok(order) => Ok(order.into()),
            Err(e) => {
                warn!("Bybit order rejected for {}: {}", intent.symbol, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> BybitClient {
        BybitClient::new("http://localhost", "key", "secret", Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn signature_covers_timestamp_key_window_and_payload() {
        let signature = client().sign("1700000000000", "category=linear&symbol=BTCUSDT");
        assert_eq!(
            signature,
            "3906b813750309cce9879a975510651953382a28592d69104d0b599e3d201f40"
        );
    }

    #[test]
    fn decimals_are_plain_text() {
        assert_eq!(format_decimal(2.0, 6), "2");
        assert_eq!(format_decimal(0.00012345678, 6), "0.000123");
        assert_eq!(format_decimal(98.5, 8), "98.5");
        assert_eq!(format_decimal(103.0, 8), "103");
    }
}
