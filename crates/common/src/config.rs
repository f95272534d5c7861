use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::errors::ConfigError;

pub const LEVERAGE_RANGE: (u32, u32) = (1, 100);
pub const RISK_PERCENT_RANGE: (f64, f64) = (0.1, 10.0);

const DEFAULT_PAIRS: &[&str; 5] = &["BTCUSDT", "ETHUSDT", "BNBUSDT", "SOLUSDT", "XRPUSDT"];

/// Sizing and scanning knobs the administrator can change at runtime.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskConfig {
    pub leverage: u32,
    pub risk_percent_per_trade: f64,
    pub stop_loss_percent: f64,
    pub take_profit_percent: f64,
    pub min_confidence: f64,
    pub scan_interval_seconds: u64,
}

pub type SharedRiskConfig = Arc<RwLock<RiskConfig>>;

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            leverage: 5,
            risk_percent_per_trade: 2.0,
            stop_loss_percent: 1.5,
            take_profit_percent: 3.0,
            min_confidence: 0.7,
            scan_interval_seconds: 60,
        }
    }
}

impl RiskConfig {
    pub fn shared(self) -> SharedRiskConfig {
        Arc::new(RwLock::new(self))
    }

    pub fn set_leverage(&mut self, leverage: u32) -> Result<(), ConfigError> {
        validate_leverage(leverage)?;
        self.leverage = leverage;
        Ok(())
    }

    pub fn set_risk_percent(&mut self, percent: f64) -> Result<(), ConfigError> {
        validate_risk_percent(percent)?;
        self.risk_percent_per_trade = percent;
        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_seconds.max(1))
    }
}

pub fn validate_leverage(leverage: u32) -> Result<(), ConfigError> {
    let (min, max) = LEVERAGE_RANGE;
    if !(min..=max).contains(&leverage) {
        return Err(ConfigError::OutOfRange {
            name: "leverage",
            min: min as f64,
            max: max as f64,
            value: leverage as f64,
        });
    }
    Ok(())
}

pub fn validate_risk_percent(percent: f64) -> Result<(), ConfigError> {
    let (min, max) = RISK_PERCENT_RANGE;
    if !(min..=max).contains(&percent) {
        return Err(ConfigError::OutOfRange {
            name: "risk percentage",
            min,
            max,
            value: percent,
        });
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telegram_token: String,
    pub admin_id: i64,
    pub bybit_api_key: String,
    pub bybit_api_secret: String,
    pub bybit_base_url: String,
    pub trade_pairs: Vec<String>,
    pub candle_interval: String,
    pub candle_limit: usize,
    pub signal_cooldown: Duration,
    pub confirmation_ttl: Duration,
    pub network_timeout: Duration,
    pub model_path: String,
    pub risk: RiskConfig,
}

impl AppConfig {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| -> Result<String, ConfigError> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let telegram_token = required("TELEGRAM_BOT_TOKEN")?;
        let admin_id = parse_value("ADMIN_ID", &required("ADMIN_ID")?)?;
        let bybit_api_key = required("BYBIT_API_KEY")?;
        let bybit_api_secret = required("BYBIT_API_SECRET")?;

        let testnet: bool = optional(&lookup, "BYBIT_TESTNET", false)?;
        let bybit_base_url = lookup("BYBIT_BASE_URL").unwrap_or_else(|| {
            if testnet {
                "https://api-testnet.bybit.com".to_string()
            } else {
                "https://api.bybit.com".to_string()
            }
        });

        let trade_pairs = match lookup("TRADE_PAIRS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
            None => DEFAULT_PAIRS.iter().map(|s| s.to_string()).collect(),
        };

        let defaults = RiskConfig::default();
        let risk = RiskConfig {
            leverage: optional(&lookup, "DEFAULT_LEVERAGE", defaults.leverage)?,
            risk_percent_per_trade: optional(&lookup, "RISK_PERCENTAGE", defaults.risk_percent_per_trade)?,
            stop_loss_percent: optional(&lookup, "STOP_LOSS_PERCENT", defaults.stop_loss_percent)?,
            take_profit_percent: optional(&lookup, "TAKE_PROFIT_PERCENT", defaults.take_profit_percent)?,
            min_confidence: optional(&lookup, "MIN_CONFIDENCE", defaults.min_confidence)?,
            scan_interval_seconds: optional(&lookup, "SCAN_INTERVAL", defaults.scan_interval_seconds)?,
        };
        validate_leverage(risk.leverage)?;
        validate_risk_percent(risk.risk_percent_per_trade)?;

        Ok(Self {
            telegram_token,
            admin_id,
            bybit_api_key,
            bybit_api_secret,
            bybit_base_url,
            trade_pairs,
            candle_interval: lookup("CANDLE_INTERVAL").unwrap_or_else(|| "15".to_string()),
            candle_limit: optional(&lookup, "CANDLE_LIMIT", 100)?,
            signal_cooldown: Duration::from_secs(optional(&lookup, "SIGNAL_COOLDOWN_SECS", 300)?),
            confirmation_ttl: Duration::from_secs(optional(&lookup, "CONFIRMATION_TTL_SECS", 600)?),
            network_timeout: Duration::from_secs(optional(&lookup, "NETWORK_TIMEOUT_SECS", 10)?),
            model_path: lookup("MODEL_PATH").unwrap_or_else(|| "models/confidence.onnx".to_string()),
            risk,
        })
    }
}

fn parse_value<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.to_string(),
    })
}

fn optional<T, F>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => parse_value(name, &raw),
        None => Ok(default),
    }
}
