use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Bar open time, unix milliseconds.
    pub timestamp: i64,
}

/// Chronological closing prices of one symbol, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    closes: Vec<f64>,
}

impl PriceSeries {
    pub fn new(closes: Vec<f64>) -> Self {
        Self { closes }
    }

    pub fn from_candles(candles: &[Candle]) -> Self {
        Self {
            closes: candles.iter().map(|c| c.close).collect(),
        }
    }

    pub fn push(&mut self, close: f64) {
        self.closes.push(close);
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.closes.last().copied()
    }

    /// The newest `n` closes, or fewer if the series is shorter.
    pub fn tail(&self, n: usize) -> &[f64] {
        let start = self.closes.len().saturating_sub(n);
        &self.closes[start..]
    }
}

impl From<Vec<f64>> for PriceSeries {
    fn from(closes: Vec<f64>) -> Self {
        Self::new(closes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_is_clamped_to_series_length() {
        let series = PriceSeries::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(series.tail(2), &[2.0, 3.0]);
        assert_eq!(series.tail(10), &[1.0, 2.0, 3.0]);
        assert_eq!(series.last(), Some(3.0));
    }

    #[test]
    fn closes_follow_candle_order() {
        let candles: Vec<Candle> = (0..3)
            .map(|i| Candle {
                open: 1.0,
                high: 2.0,
                low: 0.5,
                close: i as f64,
                volume: 10.0,
                timestamp: i * 60_000,
            })
            .collect();
        let series = PriceSeries::from_candles(&candles);
        assert_eq!(series.closes(), &[0.0, 1.0, 2.0]);
    }
}
