//! mockall doubles for the outbound client traits.

use async_trait::async_trait;
use common::clients::{AccountClient, MarketDataClient, Notifier, OrderClient};
use common::errors::NetworkError;
use common::models::{AggregatedSignal, Candle, OrderResult, Position, TradeIntent};
use mockall::mock;

mock! {
    pub Account {}
    #[async_trait]
    impl AccountClient for Account {
        async fn get_balance(&self) -> Result<f64, NetworkError>;
        async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), NetworkError>;
        async fn open_positions(&self) -> Result<Vec<Position>, NetworkError>;
    }
}

mock! {
    pub Orders {}
    #[async_trait]
    impl OrderClient for Orders {
        async fn place_order(&self, intent: &TradeIntent) -> Result<OrderResult, NetworkError>;
    }
}

mock! {
    pub Market {}
    #[async_trait]
    impl MarketDataClient for Market {
        async fn fetch_candles(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Candle>, NetworkError>;
    }
}

mock! {
    pub Notify {}
    #[async_trait]
    impl Notifier for Notify {
        async fn send_signal_alert(&self, signal: &AggregatedSignal, confirm_action_id: &str, cancel_action_id: &str) -> Result<(), NetworkError>;
        async fn send_text(&self, message: &str) -> Result<(), NetworkError>;
    }
}
