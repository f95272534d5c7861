use common::models::{Direction, PriceSeries, StrategyVote};

use crate::indicators;
use crate::strategies::Strategy;

const MAX_STRENGTH: f64 = 0.95;

pub struct MeanReversion {
    period: usize,
    band_width: f64,
}

impl Default for MeanReversion {
    fn default() -> Self {
        Self {
            period: 20,
            band_width: 2.0,
        }
    }
}

impl Strategy for MeanReversion {
    fn name(&self) -> &'static str {
        "MEAN_REV"
    }

    fn min_history(&self) -> usize {
        self.period
    }

    fn evaluate(&self, series: &PriceSeries) -> StrategyVote {
        if series.len() < self.min_history() {
            return StrategyVote::hold(self.name());
        }
        let (Some(bands), Some(price)) = (
            indicators::bollinger(series.closes(), self.period, self.band_width),
            series.last(),
        ) else {
            return StrategyVote::hold(self.name());
        };

        let sigma = (bands.upper - bands.average) / self.band_width;
        if sigma <= 0.0 {
            return StrategyVote::hold(self.name());
        }

        let (direction, depth) = if price < bands.lower {
            (Direction::Buy, (bands.lower - price) / sigma)
        } else if price > bands.upper {
            (Direction::Sell, (price - bands.upper) / sigma)
        } else {
            return StrategyVote::hold(self.name());
        };

        let strength = (0.5 + depth * 0.5).min(MAX_STRENGTH);
        StrategyVote::new(self.name(), direction, strength)
    }
}
