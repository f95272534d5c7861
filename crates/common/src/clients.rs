//! Seams to the outside world. The exchange client and the chat transport
//! implement these; the scanner and the command layer only see the traits.

use async_trait::async_trait;

use crate::errors::NetworkError;
use crate::models::{AggregatedSignal, Candle, OrderResult, Position, TradeIntent};

#[async_trait]
pub trait MarketDataClient: Send + Sync {
    /// Candles in chronological order, oldest first.
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, NetworkError>;
}

#[async_trait]
pub trait AccountClient: Send + Sync {
    async fn get_balance(&self) -> Result<f64, NetworkError>;

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), NetworkError>;

    async fn open_positions(&self) -> Result<Vec<Position>, NetworkError>;
}

#[async_trait]
pub trait OrderClient: Send + Sync {
    async fn place_order(&self, intent: &TradeIntent) -> Result<OrderResult, NetworkError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_signal_alert(
        &self,
        signal: &AggregatedSignal,
        confirm_action_id: &str,
        cancel_action_id: &str,
    ) -> Result<(), NetworkError>;

    async fn send_text(&self, message: &str) -> Result<(), NetworkError>;
}
