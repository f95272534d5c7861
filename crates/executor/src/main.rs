use std::sync::Arc;

use anyhow::Context;
use common::actors::ActorType;
use common::clients::{AccountClient, MarketDataClient, Notifier, OrderClient};
use common::config::AppConfig;
use common::errors::with_timeout;
use common::logger;
use dotenvy::dotenv;
use market_data::BybitClient;
use storage::{DedupTracker, PendingConfirmationStore};
use strategy::{OnnxConfidenceScorer, SignalAggregator, StrategyEngine};
use teloxide::Bot;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::actors::supervisor::Supervisor;
use crate::services::command_service::CommandService;
use crate::services::execution_service::ExecutionService;
use crate::services::expiry_service::ExpiryService;
use crate::services::scanner_service::{Scanner, ScannerService, ScannerSettings};
use crate::services::telegram_service::{TelegramNotifier, TelegramService};

mod actors;
mod services;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    logger::setup_logger();

    let config = AppConfig::from_env().context("invalid configuration")?;
    info!(
        "Starting signal bot: {} pairs on {}m candles, {}",
        config.trade_pairs.len(),
        config.candle_interval,
        config.bybit_base_url
    );

    let bybit = Arc::new(BybitClient::from_config(&config).context("failed to build exchange client")?);
    let market: Arc<dyn MarketDataClient> = bybit.clone();
    let account: Arc<dyn AccountClient> = bybit.clone();
    let orders: Arc<dyn OrderClient> = bybit;

    let bot = Bot::new(config.telegram_token.clone());
    let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(bot.clone(), config.admin_id));

    let risk = config.risk.clone().shared();
    let dedup = DedupTracker::new(config.signal_cooldown);
    let pending = PendingConfirmationStore::new(config.confirmation_ttl);
    let shutdown = CancellationToken::new();

    let aggregator = match OnnxConfidenceScorer::load(&config.model_path) {
        Some(scorer) => {
            info!("Confidence model loaded from {}", config.model_path);
            SignalAggregator::new().with_scorer(Arc::new(scorer))
        }
        None => SignalAggregator::new(),
    };

    let scanner = Arc::new(Scanner::new(
        ScannerSettings {
            pairs: config.trade_pairs.clone(),
            candle_interval: config.candle_interval.clone(),
            candle_limit: config.candle_limit,
            network_timeout: config.network_timeout,
        },
        market,
        notifier.clone(),
        StrategyEngine::default(),
        aggregator,
        dedup,
        pending.clone(),
        risk.clone(),
        shutdown.clone(),
    ));

    let execution = ExecutionService::new(account.clone(), orders, risk.clone(), config.network_timeout);
    let commands = Arc::new(CommandService::new(
        config.admin_id,
        account,
        pending.clone(),
        execution,
        scanner.clone(),
        risk,
        config.network_timeout,
    ));

    let mut supervisor = Supervisor::new();

    let scanner_for_actor = scanner.clone();
    supervisor.register_actor(
        ActorType::ScannerActor,
        Box::new(move || Box::new(ScannerService::new(scanner_for_actor.clone()))),
    );

    let pending_for_expiry = pending.clone();
    let notifier_for_expiry = notifier.clone();
    let timeout = config.network_timeout;
    let token_for_expiry = shutdown.clone();
    supervisor.register_actor(
        ActorType::ExpiryActor,
        Box::new(move || {
            Box::new(ExpiryService::new(
                pending_for_expiry.clone(),
                notifier_for_expiry.clone(),
                timeout,
                token_for_expiry.clone(),
            ))
        }),
    );

    let token_for_telegram = shutdown.clone();
    supervisor.register_actor(
        ActorType::TelegramActor,
        Box::new(move || {
            Box::new(TelegramService::new(
                bot.clone(),
                commands.clone(),
                token_for_telegram.clone(),
            ))
        }),
    );

    let ctrl_c_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, stopping after the current symbol");
                ctrl_c_token.cancel();
            }
            Err(e) => warn!("Cannot listen for Ctrl-C: {}", e),
        }
    });

    let greeting = format!(
        "Bot started. Watching {}. Send /start for commands.",
        config.trade_pairs.join(", ")
    );
    if let Err(e) = with_timeout(config.network_timeout, notifier.send_text(&greeting)).await {
        warn!("Startup message not delivered: {}", e);
    }

    supervisor.start(shutdown).await;
    info!("Shutdown complete.");
    Ok(())
}
