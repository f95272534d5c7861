use std::sync::Arc;

use chrono::Utc;
use common::models::{AggregatedSignal, Direction, PriceSeries, StrategyVote};
use tracing::{debug, warn};

use crate::inference::ConfidenceScorer;

pub const DEFAULT_MIN_AGREEING: usize = 3;

/// Majority-gated vote combiner with an optional model blend.
pub struct SignalAggregator {
    scorer: Option<Arc<dyn ConfidenceScorer>>,
    min_agreeing: usize,
}

impl Default for SignalAggregator {
    fn default() -> Self {
        Self {
            scorer: None,
            min_agreeing: DEFAULT_MIN_AGREEING,
        }
    }
}

impl SignalAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn ConfidenceScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn has_scorer(&self) -> bool {
        self.scorer.is_some()
    }

    /// BUY needs strictly more BUY than SELL votes and at least `min_agreeing`
    /// BUY votes; SELL is symmetric. Anything else is HOLD with confidence 0.
    pub fn aggregate(
        &self,
        symbol: &str,
        votes: Vec<StrategyVote>,
        reference_price: f64,
        series: &PriceSeries,
    ) -> AggregatedSignal {
        let buys = count(&votes, Direction::Buy);
        let sells = count(&votes, Direction::Sell);

        let direction = if buys > sells && buys >= self.min_agreeing {
            Direction::Buy
        } else if sells > buys && sells >= self.min_agreeing {
            Direction::Sell
        } else {
            Direction::Hold
        };

        let confidence = match direction {
            Direction::Hold => 0.0,
            _ => self.confidence(&votes, direction, series),
        };

        debug!(
            symbol,
            buys,
            sells,
            direction = %direction,
            confidence,
            "aggregated votes"
        );

        AggregatedSignal {
            symbol: symbol.to_string(),
            direction,
            confidence,
            reference_price,
            votes,
            created_at: Utc::now(),
        }
    }

    fn confidence(&self, votes: &[StrategyVote], direction: Direction, series: &PriceSeries) -> f64 {
        let agreeing: Vec<f64> = votes
            .iter()
            .filter(|v| v.direction == direction)
            .map(|v| v.strength)
            .collect();
        if agreeing.is_empty() {
            return 0.0;
        }
        let strategy_confidence = agreeing.iter().sum::<f64>() / agreeing.len() as f64;

        let blended = match &self.scorer {
            Some(scorer) => match scorer.score(series, direction) {
                Ok(model) => 0.5 * strategy_confidence + 0.5 * model,
                Err(e) => {
                    warn!("Confidence model skipped: {}", e);
                    strategy_confidence
                }
            },
            None => strategy_confidence,
        };

        if blended.is_finite() {
            blended.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

fn count(votes: &[StrategyVote], direction: Direction) -> usize {
    votes.iter().filter(|v| v.direction == direction).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::InferenceError;

    struct FixedScorer(f64);

    impl ConfidenceScorer for FixedScorer {
        fn score(&self, _: &PriceSeries, _: Direction) -> Result<f64, InferenceError> {
            Ok(self.0)
        }
    }

    struct BrokenScorer;

    impl ConfidenceScorer for BrokenScorer {
        fn score(&self, _: &PriceSeries, _: Direction) -> Result<f64, InferenceError> {
            Err(InferenceError::Model("shape mismatch".into()))
        }
    }

    fn votes(entries: &[(Direction, f64)]) -> Vec<StrategyVote> {
        const NAMES: [&str; 5] = ["A", "B", "C", "D", "E"];
        entries
            .iter()
            .enumerate()
            .map(|(i, (d, s))| StrategyVote::new(NAMES[i], *d, *s))
            .collect()
    }

    use Direction::{Buy, Hold, Sell};

    #[test]
    fn lone_rsi_buy_is_held_back_by_the_majority_gate() {
        let votes = votes(&[(Buy, 1.0 / 3.0), (Hold, 0.0), (Hold, 0.0), (Hold, 0.0), (Hold, 0.0)]);
        let signal = SignalAggregator::new().aggregate("BTCUSDT", votes, 100.0, &PriceSeries::default());
        assert_eq!(signal.direction, Hold);
        assert_eq!(signal.confidence, 0.0);
        assert!(!signal.is_actionable());
    }

    #[test]
    fn three_buys_pass_with_mean_strength() {
        let votes = votes(&[(Buy, 0.6), (Buy, 0.8), (Buy, 0.7), (Sell, 0.9), (Hold, 0.0)]);
        let signal = SignalAggregator::new().aggregate("ETHUSDT", votes, 2500.0, &PriceSeries::default());
        assert_eq!(signal.direction, Buy);
        assert!((signal.confidence - 0.7).abs() < 1e-9);
        assert_eq!(signal.reference_price, 2500.0);
        assert_eq!(signal.votes.len(), 5);
    }

    #[test]
    fn two_votes_are_not_enough() {
        let votes = votes(&[(Sell, 0.9), (Sell, 0.9), (Hold, 0.0), (Hold, 0.0), (Hold, 0.0)]);
        let signal = SignalAggregator::new().aggregate("SOLUSDT", votes, 20.0, &PriceSeries::default());
        assert_eq!(signal.direction, Hold);
    }

    #[test]
    fn three_sells_pass() {
        let votes = votes(&[(Sell, 0.5), (Sell, 0.5), (Sell, 0.8), (Buy, 0.9), (Buy, 0.9)]);
        let signal = SignalAggregator::new().aggregate("SOLUSDT", votes, 20.0, &PriceSeries::default());
        assert_eq!(signal.direction, Sell);
        assert!((signal.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn model_score_is_blended_evenly() {
        let aggregator = SignalAggregator::new().with_scorer(Arc::new(FixedScorer(0.2)));
        let votes = votes(&[(Buy, 0.8), (Buy, 0.8), (Buy, 0.8), (Hold, 0.0), (Hold, 0.0)]);
        let signal = aggregator.aggregate("BTCUSDT", votes, 1.0, &PriceSeries::default());
        assert!((signal.confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn failing_model_falls_back_to_strategy_confidence() {
        let aggregator = SignalAggregator::new().with_scorer(Arc::new(BrokenScorer));
        let votes = votes(&[(Buy, 0.9), (Buy, 0.9), (Buy, 0.9), (Hold, 0.0), (Hold, 0.0)]);
        let signal = aggregator.aggregate("BTCUSDT", votes, 1.0, &PriceSeries::default());
        assert!((signal.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_model_output_is_clamped() {
        let aggregator = SignalAggregator::new().with_scorer(Arc::new(FixedScorer(5.0)));
        let votes = votes(&[(Buy, 1.0), (Buy, 1.0), (Buy, 1.0), (Hold, 0.0), (Hold, 0.0)]);
        let signal = aggregator.aggregate("BTCUSDT", votes, 1.0, &PriceSeries::default());
        assert_eq!(signal.confidence, 1.0);
    }

    #[test]
    fn steady_uptrend_through_the_full_engine() {
        let series = PriceSeries::new((0..60).map(|i| 100.0 + i as f64).collect());
        let votes = crate::StrategyEngine::default().evaluate(&series);
        let signal = SignalAggregator::new().aggregate("BTCUSDT", votes, 159.0, &series);
        assert_eq!(signal.direction, Buy);
        assert!(signal.confidence > 0.0 && signal.confidence <= 1.0);
    }
}
