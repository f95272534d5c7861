use common::errors::NetworkError;
use common::models::{Candle, OrderResult, Position};
use serde::Deserialize;

/// Returned by set-leverage when the requested value is already in place.
pub const LEVERAGE_NOT_MODIFIED: i64 = 110043;

#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "retCode")]
    pub ret_code: i64,
    #[serde(rename = "retMsg")]
    pub ret_msg: String,
    pub result: Option<T>,
}

impl<T> Envelope<T> {
    pub fn into_result(self) -> Result<T, NetworkError> {
        if self.ret_code != 0 {
            return Err(NetworkError::Exchange {
                code: self.ret_code,
                message: self.ret_msg,
            });
        }
        self.result
            .ok_or_else(|| NetworkError::Decode("missing result".to_string()))
    }
}

/// `/v5/market/kline` rows: [startTime, open, high, low, close, volume, turnover], newest first.
#[derive(Debug, Deserialize)]
pub struct KlineResult {
    pub list: Vec<Vec<String>>,
}

impl KlineResult {
    /// Candles oldest first.
    pub fn into_candles(self) -> Result<Vec<Candle>, NetworkError> {
        let mut candles = self
            .list
            .iter()
            .map(|row| parse_kline_row(row))
            .collect::<Result<Vec<_>, _>>()?;
        candles.reverse();
        Ok(candles)
    }
}

fn parse_kline_row(row: &[String]) -> Result<Candle, NetworkError> {
    if row.len() < 6 {
        return Err(NetworkError::Decode(format!("short kline row: {:?}", row)));
    }
    Ok(Candle {
        timestamp: parse_num(&row[0])?,
        open: parse_num(&row[1])?,
        high: parse_num(&row[2])?,
        low: parse_num(&row[3])?,
        close: parse_num(&row[4])?,
        volume: parse_num(&row[5])?,
    })
}

#[derive(Debug, Deserialize)]
pub struct WalletResult {
    pub list: Vec<WalletAccount>,
}

#[derive(Debug, Deserialize)]
pub struct WalletAccount {
    #[serde(rename = "totalEquity")]
    pub total_equity: String,
}

impl WalletResult {
    pub fn total_equity(&self) -> Result<f64, NetworkError> {
        let account = self
            .list
            .first()
            .ok_or_else(|| NetworkError::Decode("empty wallet list".to_string()))?;
        parse_num(&account.total_equity)
    }
}

#[derive(Debug, Deserialize)]
pub struct PositionResult {
    pub list: Vec<PositionRow>,
}

#[derive(Debug, Deserialize)]
pub struct PositionRow {
    pub symbol: String,
    pub side: String,
    pub size: String,
    #[serde(rename = "avgPrice")]
    pub avg_price: String,
    #[serde(rename = "unrealisedPnl")]
    pub unrealised_pnl: String,
    pub leverage: String,
}

impl PositionResult {
    /// Open positions only; the endpoint also lists flat slots with size 0.
    pub fn into_positions(self) -> Result<Vec<Position>, NetworkError> {
        let mut positions = Vec::new();
        for row in self.list {
            let size: f64 = parse_num(&row.size)?;
            if size <= 0.0 {
                continue;
            }
            positions.push(Position {
                symbol: row.symbol,
                side: row.side,
                size,
                entry_price: parse_num(&row.avg_price)?,
                unrealised_pnl: parse_num(&row.unrealised_pnl).unwrap_or(0.0),
                leverage: row.leverage,
            });
        }
        Ok(positions)
    }
}

#[derive(Debug, Deserialize)]
pub struct OrderCreateResult {
    #[serde(rename = "orderId")]
    pub order_id: String,
    #[serde(rename = "orderLinkId")]
    pub order_link_id: Option<String>,
}

impl From<OrderCreateResult> for OrderResult {
    fn from(value: OrderCreateResult) -> Self {
        Self {
            order_id: value.order_id,
            order_link_id: value.order_link_id.filter(|s| !s.is_empty()),
        }
    }
}

fn parse_num<T: std::str::FromStr>(raw: &str) -> Result<T, NetworkError> {
    raw.parse::<T>()
        .map_err(|_| NetworkError::Decode(format!("not a number: {:?}", raw)))
}
