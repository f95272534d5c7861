use common::models::{PriceSeries, StrategyVote};

use crate::strategies::{self, Strategy};

/// A fixed, ordered set of strategies evaluated together.
pub struct StrategyEngine {
    strategies: Vec<Box<dyn Strategy>>,
}

impl Default for StrategyEngine {
    fn default() -> Self {
        Self::new(strategies::default_strategies())
    }
}

impl StrategyEngine {
    pub fn new(strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self { strategies }
    }

    /// One vote per registered strategy, in registration order.
    pub fn evaluate(&self, series: &PriceSeries) -> Vec<StrategyVote> {
        self.strategies.iter().map(|s| s.evaluate(series)).collect()
    }

    /// Longest window any strategy needs; fetch at least this many candles.
    pub fn required_history(&self) -> usize {
        self.strategies
            .iter()
            .map(|s| s.min_history())
            .max()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}
