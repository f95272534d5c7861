use std::sync::Arc;
use std::time::Duration;

use common::clients::{AccountClient, OrderClient};
use common::config::{RiskConfig, SharedRiskConfig};
use common::errors::{CommandError, ConfigError, with_timeout};
use common::models::{AggregatedSignal, OrderResult, Side, TradeIntent};
use tracing::{error, info};

/// Sizes an approved signal against the account.
///
/// `quantity = balance * risk% / 100 * leverage / reference_price`; stop-loss and
/// take-profit are percentage offsets from the reference price, below/above for
/// BUY and mirrored for SELL. Never yields a non-positive quantity.
pub fn plan(
    signal: &AggregatedSignal,
    account_balance: f64,
    risk: &RiskConfig,
) -> Result<TradeIntent, ConfigError> {
    let side = Side::from_direction(signal.direction)
        .ok_or_else(|| ConfigError::NotTradable(signal.symbol.clone()))?;

    let price = signal.reference_price;
    if !(price.is_finite() && price > 0.0) {
        return Err(ConfigError::NonPositivePrice(price));
    }
    if !(account_balance.is_finite() && account_balance > 0.0) {
        return Err(ConfigError::NonPositiveBalance(account_balance));
    }

    let risk_amount = account_balance * risk.risk_percent_per_trade / 100.0;
    let position_value = risk_amount * risk.leverage as f64;
    let quantity = position_value / price;
    if !(quantity.is_finite() && quantity > 0.0) {
        return Err(ConfigError::NonPositiveQuantity(quantity));
    }

    let sl = risk.stop_loss_percent / 100.0;
    let tp = risk.take_profit_percent / 100.0;
    let (stop_loss, take_profit) = match side {
        Side::Buy => (price * (1.0 - sl), price * (1.0 + tp)),
        Side::Sell => (price * (1.0 + sl), price * (1.0 - tp)),
    };

    Ok(TradeIntent {
        symbol: signal.symbol.clone(),
        side,
        quantity,
        entry_price_ref: price,
        stop_loss,
        take_profit,
    })
}

#[derive(Debug, Clone)]
pub struct ExecutedTrade {
    pub intent: TradeIntent,
    pub order: OrderResult,
    pub confidence: f64,
}

pub struct ExecutionService {
    account: Arc<dyn AccountClient>,
    orders: Arc<dyn OrderClient>,
    risk: SharedRiskConfig,
    network_timeout: Duration,
}

impl ExecutionService {
    pub fn new(
        account: Arc<dyn AccountClient>,
        orders: Arc<dyn OrderClient>,
        risk: SharedRiskConfig,
        network_timeout: Duration,
    ) -> Self {
        Self {
            account,
            orders,
            risk,
            network_timeout,
        }
    }

    /// Fetches the balance, sizes the trade and submits it. Locks are only
    /// held long enough to copy the risk settings.
    pub async fn execute(&self, signal: &AggregatedSignal) -> Result<ExecutedTrade, CommandError> {
        let balance = with_timeout(self.network_timeout, self.account.get_balance()).await?;
        let risk = self.risk.read().await.clone();

        let intent = plan(signal, balance, &risk).inspect_err(|e| {
            error!("Refusing to size {} {}: {}", signal.symbol, signal.direction, e);
        })?;

        let order = with_timeout(self.network_timeout, self.orders.place_order(&intent))
            .await
            .inspect_err(|e| error!("ORDER FAILED: {}", e))?;

        info!(
            "ORDER EXECUTED: ID={} {} {} {:.6} @ {:.4}",
            order.order_id, intent.symbol, intent.side, intent.quantity, intent.entry_price_ref
        );

        Ok(ExecutedTrade {
            intent,
            order,
            confidence: signal.confidence,
        })
    }
}
