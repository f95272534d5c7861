use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use common::clients::AccountClient;
use common::config::{SharedRiskConfig, validate_leverage};
use common::errors::{CommandError, UnauthorizedError, with_timeout};
use storage::{PendingAction, PendingConfirmationStore};
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use super::execution_service::{ExecutedTrade, ExecutionService};
use super::scanner_service::{Scanner, ScannerState, SweepOutcome};

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Admin commands:")]
pub enum AdminCommand {
    #[command(description = "show this help.")]
    Start,
    #[command(description = "set leverage (1-100) on every pair.")]
    SetLeverage(String),
    #[command(description = "set risk per trade in percent (0.1-10).")]
    SetRisk(String),
    #[command(description = "show account equity.")]
    Balance,
    #[command(description = "show scanner and risk settings.")]
    Status,
    #[command(description = "list open positions.")]
    Positions,
    #[command(description = "run a sweep now.")]
    Scan,
}

/// Authorization-gated entry point for admin commands and the confirm/cancel
/// buttons. Never holds a store lock across an exchange call.
pub struct CommandService {
    admin_id: i64,
    account: Arc<dyn AccountClient>,
    pending: PendingConfirmationStore,
    execution: ExecutionService,
    scanner: Arc<Scanner>,
    risk: SharedRiskConfig,
    network_timeout: Duration,
}

impl CommandService {
    pub fn new(
        admin_id: i64,
        account: Arc<dyn AccountClient>,
        pending: PendingConfirmationStore,
        execution: ExecutionService,
        scanner: Arc<Scanner>,
        risk: SharedRiskConfig,
        network_timeout: Duration,
    ) -> Self {
        Self {
            admin_id,
            account,
            pending,
            execution,
            scanner,
            risk,
            network_timeout,
        }
    }

    pub fn admin_id(&self) -> i64 {
        self.admin_id
    }

    fn authorize(&self, caller: i64) -> Result<(), UnauthorizedError> {
        if caller == self.admin_id {
            Ok(())
        } else {
            warn!("Rejected request from {}", caller);
            Err(UnauthorizedError(caller))
        }
    }

    pub async fn handle_command(&self, caller: i64, command: AdminCommand) -> Result<String, CommandError> {
        self.authorize(caller)?;

        match command {
            AdminCommand::Start => Ok(AdminCommand::descriptions().to_string()),
            AdminCommand::SetLeverage(arg) => self.set_leverage(&arg).await,
            AdminCommand::SetRisk(arg) => {
                let percent: f64 = arg
                    .trim()
                    .parse()
                    .map_err(|_| CommandError::Usage("/setrisk <0.1-10>"))?;
                self.risk.write().await.set_risk_percent(percent)?;
                info!("Risk per trade set to {}%", percent);
                Ok(format!("Risk per trade set to {}%", percent))
            }
            AdminCommand::Balance => {
                let balance = with_timeout(self.network_timeout, self.account.get_balance()).await?;
                Ok(format!("Balance: {:.2} USDT", balance))
            }
            AdminCommand::Status => Ok(self.status().await),
            AdminCommand::Positions => {
                let positions = with_timeout(self.network_timeout, self.account.open_positions()).await?;
                if positions.is_empty() {
                    return Ok("No open positions".to_string());
                }
                let mut reply = String::from("Open positions:\n");
                for p in positions {
                    let _ = writeln!(
                        reply,
                        "{} {} {} @ {} ({}x) PnL {:.2}",
                        p.symbol, p.side, p.size, p.entry_price, p.leverage, p.unrealised_pnl
                    );
                }
                Ok(reply)
            }
            AdminCommand::Scan => Ok(self.trigger_scan()),
        }
    }

    async fn set_leverage(&self, arg: &str) -> Result<String, CommandError> {
        let leverage: u32 = arg
            .trim()
            .parse()
            .map_err(|_| CommandError::Usage("/setleverage <1-100>"))?;
        validate_leverage(leverage)?;

        let mut failed = Vec::new();
        for symbol in self.scanner.pairs() {
            if let Err(e) = with_timeout(
                self.network_timeout,
                self.account.set_leverage(symbol, leverage),
            )
            .await
            {
                warn!(symbol = %symbol, "Failed to set leverage: {}", e);
                failed.push(symbol.as_str());
            }
        }

        self.risk.write().await.set_leverage(leverage)?;
        info!("Leverage set to {}x", leverage);

        let mut reply = format!("Leverage set to {}x", leverage);
        if !failed.is_empty() {
            let _ = write!(reply, " (exchange update failed for {})", failed.join(", "));
        }
        Ok(reply)
    }

    async fn status(&self) -> String {
        let risk = self.risk.read().await.clone();
        let state = match self.scanner.state() {
            ScannerState::Idle => "idle",
            ScannerState::Sweeping => "sweeping",
        };
        format!(
            "Scanner: {} ({} sweeps)\nPairs: {}\nLeverage: {}x\nRisk: {}%\nSL/TP: {}% / {}%\nMin confidence: {:.0}%\nInterval: {}s\nPending confirmations: {}",
            state,
            self.scanner.sweeps_completed(),
            self.scanner.pairs().join(", "),
            risk.leverage,
            risk.risk_percent_per_trade,
            risk.stop_loss_percent,
            risk.take_profit_percent,
            risk.min_confidence * 100.0,
            risk.scan_interval_seconds,
            self.pending.len().await,
        )
    }

    fn trigger_scan(&self) -> String {
        if self.scanner.state() == ScannerState::Sweeping {
            return "A sweep is already running, skipped".to_string();
        }
        let scanner = self.scanner.clone();
        tokio::spawn(async move {
            match scanner.sweep().await {
                SweepOutcome::Completed(r) => info!(
                    "Manual sweep done: scanned={} alerted={} failed={}",
                    r.scanned, r.alerted, r.failed
                ),
                SweepOutcome::Cancelled(_) => info!("Manual sweep cancelled"),
                SweepOutcome::Skipped => info!("Manual sweep skipped, one was already running"),
            }
        });
        "Sweep started".to_string()
    }

    /// Resolves a `confirm:<id>` / `cancel:<id>` button press. The pending
    /// entry is consumed before any exchange call, so a double tap executes once.
    pub async fn handle_action(&self, caller: i64, action_id: &str) -> Result<String, CommandError> {
        self.authorize(caller)?;

        match PendingAction::parse(action_id) {
            Some(PendingAction::Confirm(id)) => {
                let signal = self.pending.confirm(&id).await?;
                info!("Confirmed {} {} ({})", signal.symbol, signal.direction, id);
                let trade = self.execution.execute(&signal).await?;
                Ok(describe_trade(&trade))
            }
            Some(PendingAction::Cancel(id)) => {
                let signal = self.pending.cancel(&id).await?;
                info!("Cancelled {} {} ({})", signal.symbol, signal.direction, id);
                Ok(format!("Signal cancelled: {} {}", signal.symbol, signal.direction))
            }
            None => Err(CommandError::Usage("confirm:<id> or cancel:<id>")),
        }
    }
}

fn describe_trade(trade: &ExecutedTrade) -> String {
    let intent = &trade.intent;
    format!(
        "Order placed: {} {}\nQty: {:.6}\nEntry: {:.4}\nSL: {:.4}\nTP: {:.4}\nConfidence: {:.0}%\nOrder id: {}",
        intent.side,
        intent.symbol,
        intent.quantity,
        intent.entry_price_ref,
        intent.stop_loss,
        intent.take_profit,
        trade.confidence * 100.0,
        trade.order.order_id,
    )
}

/// What the admin sees when a command or action fails.
pub fn reply_for_error(err: &CommandError) -> String {
    match err {
        CommandError::Unauthorized(_) => "Unauthorized.".to_string(),
        CommandError::NotFound(_) => "Signal expired or already handled.".to_string(),
        CommandError::Config(e) => format!("Trade not placed: {}", e),
        CommandError::Network(e) => format!("Exchange unavailable, try again: {}", e),
        CommandError::Usage(_) => err.to_string(),
    }
}
