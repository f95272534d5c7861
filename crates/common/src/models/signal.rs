use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
    Hold,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Hold => "HOLD",
        }
    }

    /// +1 for BUY, -1 for SELL, 0 for HOLD.
    pub fn sign(&self) -> f64 {
        match self {
            Self::Buy => 1.0,
            Self::Sell => -1.0,
            Self::Hold => 0.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One strategy's opinion on the latest bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyVote {
    pub strategy: &'static str,
    pub direction: Direction,
    /// Always within [0, 1]; HOLD votes carry 0.
    pub strength: f64,
}

impl StrategyVote {
    pub fn hold(strategy: &'static str) -> Self {
        Self {
            strategy,
            direction: Direction::Hold,
            strength: 0.0,
        }
    }

    pub fn new(strategy: &'static str, direction: Direction, strength: f64) -> Self {
        if direction == Direction::Hold {
            return Self::hold(strategy);
        }
        let strength = if strength.is_finite() {
            strength.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            strategy,
            direction,
            strength,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedSignal {
    pub symbol: String,
    pub direction: Direction,
    pub confidence: f64,
    pub reference_price: f64,
    pub votes: Vec<StrategyVote>,
    pub created_at: DateTime<Utc>,
}

impl AggregatedSignal {
    pub fn is_actionable(&self) -> bool {
        self.direction != Direction::Hold
    }
}
