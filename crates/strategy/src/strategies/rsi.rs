use common::models::{Direction, PriceSeries, StrategyVote};

use crate::indicators;
use crate::strategies::Strategy;

pub struct RsiStrategy {
    period: usize,
    oversold: f64,
    overbought: f64,
}

impl Default for RsiStrategy {
    fn default() -> Self {
        Self {
            period: 14,
            oversold: 30.0,
            overbought: 70.0,
        }
    }
}

impl Strategy for RsiStrategy {
    fn name(&self) -> &'static str {
        "RSI"
    }

    fn min_history(&self) -> usize {
        self.period + 1
    }

    fn evaluate(&self, series: &PriceSeries) -> StrategyVote {
        if series.len() < self.min_history() {
            return StrategyVote::hold(self.name());
        }
        let Some(value) = indicators::rsi(series.closes(), self.period) else {
            return StrategyVote::hold(self.name());
        };

        if value >= 100.0 {
            // No losses in the window at all.
            StrategyVote::new(self.name(), Direction::Buy, 1.0)
        } else if value < self.oversold {
            let strength = (self.oversold - value) / self.oversold;
            StrategyVote::new(self.name(), Direction::Buy, strength)
        } else if value > self.overbought {
            let strength = (value - self.overbought) / (100.0 - self.overbought);
            StrategyVote::new(self.name(), Direction::Sell, strength)
        } else {
            StrategyVote::hold(self.name())
        }
    }
}
