pub mod candle;
pub mod signal;
pub mod trade;

pub use candle::{Candle, PriceSeries};
pub use signal::{AggregatedSignal, Direction, StrategyVote};
pub use trade::{OrderResult, Position, Side, TradeIntent};
