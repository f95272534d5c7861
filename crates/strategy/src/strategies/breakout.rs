use common::models::{Direction, PriceSeries, StrategyVote};

use crate::strategies::Strategy;

const MAX_STRENGTH: f64 = 0.85;

/// Latest close against the range of the bars before it.
pub struct Breakout {
    lookback: usize,
}

impl Default for Breakout {
    fn default() -> Self {
        Self { lookback: 19 }
    }
}

impl Strategy for Breakout {
    fn name(&self) -> &'static str {
        "BREAKOUT"
    }

    fn min_history(&self) -> usize {
        self.lookback + 1
    }

    fn evaluate(&self, series: &PriceSeries) -> StrategyVote {
        if series.len() < self.min_history() {
            return StrategyVote::hold(self.name());
        }
        let window = series.tail(self.lookback + 1);
        let (prior, latest) = window.split_at(self.lookback);
        let close = latest[0];

        let high = prior.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let low = prior.iter().copied().fold(f64::INFINITY, f64::min);

        let (direction, moved) = if close > high && high > 0.0 {
            (Direction::Buy, (close - high) / high)
        } else if close < low && low > 0.0 {
            (Direction::Sell, (low - close) / low)
        } else {
            return StrategyVote::hold(self.name());
        };

        let strength = (0.5 + moved * 20.0).min(MAX_STRENGTH);
        StrategyVote::new(self.name(), direction, strength)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range_then(last: f64) -> PriceSeries {
        let mut closes: Vec<f64> = (0..19).map(|i| if i % 2 == 0 { 99.0 } else { 100.0 }).collect();
        closes.push(last);
        PriceSeries::new(closes)
    }

    #[test]
    fn close_above_range_is_buy() {
        let vote = Breakout::default().evaluate(&range_then(100.5));
        assert_eq!(vote.direction, Direction::Buy);
        assert!((vote.strength - 0.6).abs() < 1e-9);
    }

    #[test]
    fn close_below_range_is_sell_and_capped() {
        let vote = Breakout::default().evaluate(&range_then(90.0));
        assert_eq!(vote.direction, Direction::Sell);
        assert_eq!(vote.strength, MAX_STRENGTH);
    }

    #[test]
    fn close_inside_range_is_hold() {
        let vote = Breakout::default().evaluate(&range_then(99.5));
        assert_eq!(vote.direction, Direction::Hold);
    }

    #[test]
    fn only_the_last_twenty_bars_matter() {
        let mut closes = vec![500.0; 10];
        closes.extend(range_then(100.5).closes());
        let vote = Breakout::default().evaluate(&PriceSeries::new(closes));
        assert_eq!(vote.direction, Direction::Buy);
    }
}
