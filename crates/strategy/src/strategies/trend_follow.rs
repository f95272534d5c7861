use common::models::{Direction, PriceSeries, StrategyVote};

use crate::indicators;
use crate::strategies::Strategy;

const MAX_STRENGTH: f64 = 0.88;

/// EMA alignment confirmed by the slope of a short linear fit.
pub struct TrendFollow {
    fast: usize,
    slow: usize,
    fit_window: usize,
}

impl Default for TrendFollow {
    fn default() -> Self {
        Self {
            fast: 20,
            slow: 50,
            fit_window: 10,
        }
    }
}

impl Strategy for TrendFollow {
    fn name(&self) -> &'static str {
        "TREND"
    }

    fn min_history(&self) -> usize {
        self.slow.max(self.fit_window)
    }

    fn evaluate(&self, series: &PriceSeries) -> StrategyVote {
        if series.len() < self.min_history() {
            return StrategyVote::hold(self.name());
        }
        let (Some(fast), Some(slow)) = (
            indicators::last_ema(series.closes(), self.fast),
            indicators::last_ema(series.closes(), self.slow),
        ) else {
            return StrategyVote::hold(self.name());
        };
        let slope = indicators::linear_slope(series.tail(self.fit_window));

        let direction = match (fast > slow, fast < slow, slope > 0.0, slope < 0.0) {
            (true, _, true, _) => Direction::Buy,
            (_, true, _, true) => Direction::Sell,
            _ => return StrategyVote::hold(self.name()),
        };

        if slow <= 0.0 {
            return StrategyVote::hold(self.name());
        }
        let separation = (fast - slow).abs() / slow;
        let strength = (0.5 + separation * 20.0).min(MAX_STRENGTH);
        StrategyVote::new(self.name(), direction, strength)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_rise_is_buy() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let vote = TrendFollow::default().evaluate(&PriceSeries::new(closes));
        assert_eq!(vote.direction, Direction::Buy);
        assert_eq!(vote.strength, MAX_STRENGTH);
    }

    #[test]
    fn steady_fall_is_sell() {
        let closes: Vec<f64> = (0..60).map(|i| 200.0 - i as f64).collect();
        let vote = TrendFollow::default().evaluate(&PriceSeries::new(closes));
        assert_eq!(vote.direction, Direction::Sell);
    }

    #[test]
    fn disagreement_is_hold() {
        // EMAs still aligned upward, but the last ten bars slope down.
        let mut closes: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        closes.extend((0..10).map(|i| 149.0 - 2.0 * i as f64));
        let vote = TrendFollow::default().evaluate(&PriceSeries::new(closes));
        assert_eq!(vote.direction, Direction::Hold);
    }
}
