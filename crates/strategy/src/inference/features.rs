use common::models::{Direction, PriceSeries};

use crate::indicators;

pub const FEATURE_COUNT: usize = 5;
pub const MIN_FEATURE_HISTORY: usize = 22;

/// Feature vector: [RSI/100, EMA(9/21) gap, 20-bar return volatility, 10-bar return, direction].
pub fn extract(series: &PriceSeries, direction: Direction) -> Option<[f32; FEATURE_COUNT]> {
    if series.len() < MIN_FEATURE_HISTORY {
        return None;
    }
    let closes = series.closes();
    let last = series.last()?;

    let rsi = indicators::rsi(closes, 14).unwrap_or(50.0) / 100.0;

    let fast = indicators::last_ema(closes, 9)?;
    let slow = indicators::last_ema(closes, 21)?;
    let ema_gap = if slow != 0.0 { (fast - slow) / slow } else { 0.0 };

    let volatility = indicators::std_dev(&indicators::returns(series.tail(21)));

    let anchor = series.tail(11)[0];
    let momentum = if anchor != 0.0 { (last - anchor) / anchor } else { 0.0 };

    Some([
        rsi as f32,
        ema_gap as f32,
        volatility as f32,
        momentum as f32,
        direction.sign() as f32,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_series_has_no_features() {
        let series = PriceSeries::new(vec![1.0; MIN_FEATURE_HISTORY - 1]);
        assert!(extract(&series, Direction::Buy).is_none());
    }

    #[test]
    fn rising_series_has_positive_momentum() {
        let series = PriceSeries::new((0..30).map(|i| 100.0 + i as f64).collect());
        let features = extract(&series, Direction::Sell).unwrap();
        assert_eq!(features[0], 1.0);
        assert!(features[1] > 0.0);
        assert!(features[3] > 0.0);
        assert_eq!(features[4], -1.0);
    }
}
