pub mod aggregator;
pub mod engine;
pub mod indicators;
pub mod inference;
pub mod strategies;

pub use aggregator::SignalAggregator;
pub use engine::StrategyEngine;
pub use inference::{ConfidenceScorer, OnnxConfidenceScorer};
pub use strategies::Strategy;
