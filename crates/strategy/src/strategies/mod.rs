//! Independent technical votes on the latest bar of a close series.
//!
//! Every strategy is pure: the same series always yields the same vote, and a
//! series shorter than [`Strategy::min_history`] yields HOLD with strength 0.

use common::models::{PriceSeries, StrategyVote};

pub mod breakout;
pub mod ema_cross;
pub mod mean_reversion;
pub mod rsi;
pub mod trend_follow;

pub use breakout::Breakout;
pub use ema_cross::EmaCrossover;
pub use mean_reversion::MeanReversion;
pub use rsi::RsiStrategy;
pub use trend_follow::TrendFollow;

pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fewest closes the strategy needs to say anything but HOLD.
    fn min_history(&self) -> usize;

    fn evaluate(&self, series: &PriceSeries) -> StrategyVote;
}

/// The five strategies the aggregator's majority gate is calibrated for.
pub fn default_strategies() -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(RsiStrategy::default()),
        Box::new(EmaCrossover::default()),
        Box::new(Breakout::default()),
        Box::new(TrendFollow::default()),
        Box::new(MeanReversion::default()),
    ]
}
