use common::models::{Direction, PriceSeries, StrategyVote};

use crate::indicators;
use crate::strategies::Strategy;

const MAX_STRENGTH: f64 = 0.9;

pub struct EmaCrossover {
    fast: usize,
    slow: usize,
}

impl Default for EmaCrossover {
    fn default() -> Self {
        Self { fast: 9, slow: 21 }
    }
}

impl Strategy for EmaCrossover {
    fn name(&self) -> &'static str {
        "EMA_CROSS"
    }

    fn min_history(&self) -> usize {
        self.slow + 1
    }

    fn evaluate(&self, series: &PriceSeries) -> StrategyVote {
        if series.len() < self.min_history() {
            return StrategyVote::hold(self.name());
        }
        let fast = indicators::ema_series(series.closes(), self.fast);
        let slow = indicators::ema_series(series.closes(), self.slow);
        let n = fast.len();
        let (prev_fast, prev_slow) = (fast[n - 2], slow[n - 2]);
        let (cur_fast, cur_slow) = (fast[n - 1], slow[n - 1]);

        let direction = if prev_fast <= prev_slow && cur_fast > cur_slow {
            Direction::Buy
        } else if prev_fast >= prev_slow && cur_fast < cur_slow {
            Direction::Sell
        } else {
            return StrategyVote::hold(self.name());
        };

        if cur_slow <= 0.0 {
            return StrategyVote::hold(self.name());
        }
        let gap = (cur_fast - cur_slow).abs() / cur_slow;
        let strength = (0.5 + gap * 50.0).min(MAX_STRENGTH);
        StrategyVote::new(self.name(), direction, strength)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_then(last: f64) -> PriceSeries {
        let mut closes = vec![100.0; 30];
        closes.push(last);
        PriceSeries::new(closes)
    }

    #[test]
    fn upward_cross_on_latest_bar_is_buy() {
        let vote = EmaCrossover::default().evaluate(&flat_then(103.0));
        assert_eq!(vote.direction, Direction::Buy);
        assert!(vote.strength > 0.5 && vote.strength <= MAX_STRENGTH);
    }

    #[test]
    fn downward_cross_on_latest_bar_is_sell() {
        let vote = EmaCrossover::default().evaluate(&flat_then(97.0));
        assert_eq!(vote.direction, Direction::Sell);
    }

    #[test]
    fn strength_is_capped() {
        let vote = EmaCrossover::default().evaluate(&flat_then(200.0));
        assert_eq!(vote.strength, MAX_STRENGTH);
    }

    #[test]
    fn no_cross_is_hold() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let vote = EmaCrossover::default().evaluate(&PriceSeries::new(closes));
        assert_eq!(vote.direction, Direction::Hold);
    }
}
