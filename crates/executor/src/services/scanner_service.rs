use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use common::actors::{Actor, ActorType, ControlMessage};
use common::clients::{MarketDataClient, Notifier};
use common::config::{RiskConfig, SharedRiskConfig};
use common::errors::{NetworkError, with_timeout};
use common::models::PriceSeries;
use storage::{DedupTracker, PendingAction, PendingConfirmationStore};
use strategy::{SignalAggregator, StrategyEngine};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerState {
    Idle,
    Sweeping,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub alerted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed(SweepReport),
    /// Stop was requested; the symbols before it were processed.
    Cancelled(SweepReport),
    /// Another sweep was already in flight.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct ScannerSettings {
    pub pairs: Vec<String>,
    pub candle_interval: String,
    pub candle_limit: usize,
    pub network_timeout: Duration,
}

/// Releases the in-flight flag even when the sweeping task is aborted.
struct SweepGuard<'a>(&'a AtomicBool);

impl<'a> SweepGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Scanner {
    settings: ScannerSettings,
    market: Arc<dyn MarketDataClient>,
    notifier: Arc<dyn Notifier>,
    engine: StrategyEngine,
    aggregator: SignalAggregator,
    dedup: DedupTracker,
    pending: PendingConfirmationStore,
    risk: SharedRiskConfig,
    shutdown: CancellationToken,
    sweeping: AtomicBool,
    sweeps_completed: AtomicU64,
}

impl Scanner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mut settings: ScannerSettings,
        market: Arc<dyn MarketDataClient>,
        notifier: Arc<dyn Notifier>,
        engine: StrategyEngine,
        aggregator: SignalAggregator,
        dedup: DedupTracker,
        pending: PendingConfirmationStore,
        risk: SharedRiskConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let needed = engine.required_history();
        if settings.candle_limit < needed {
            warn!(
                "Candle limit {} is below the {} bars the strategies need; raising it",
                settings.candle_limit, needed
            );
            settings.candle_limit = needed;
        }
        Self {
            settings,
            market,
            notifier,
            engine,
            aggregator,
            dedup,
            pending,
            risk,
            shutdown,
            sweeping: AtomicBool::new(false),
            sweeps_completed: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> ScannerState {
        if self.sweeping.load(Ordering::Acquire) {
            ScannerState::Sweeping
        } else {
            ScannerState::Idle
        }
    }

    pub fn sweeps_completed(&self) -> u64 {
        self.sweeps_completed.load(Ordering::Relaxed)
    }

    pub fn pairs(&self) -> &[String] {
        &self.settings.pairs
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub async fn scan_interval(&self) -> Duration {
        self.risk.read().await.scan_interval()
    }

    /// One pass over every pair. Returns `Skipped` immediately if another
    /// sweep is in flight; stops between symbols once shutdown is requested.
    pub async fn sweep(&self) -> SweepOutcome {
        let Some(_guard) = SweepGuard::acquire(&self.sweeping) else {
            debug!("Sweep already in flight, skipping tick");
            return SweepOutcome::Skipped;
        };

        let risk = self.risk.read().await.clone();
        let mut report = SweepReport::default();

        for symbol in &self.settings.pairs {
            if self.shutdown.is_cancelled() {
                info!("Stop requested, ending sweep after {} symbols", report.scanned);
                return SweepOutcome::Cancelled(report);
            }

            match self.scan_symbol(symbol, &risk).await {
                Ok(Some(id)) => {
                    debug!(symbol = %symbol, id = %id, "Signal staged");
                    report.alerted += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(symbol = %symbol, "Scan failed: {}", e);
                    report.failed += 1;
                }
            }
            report.scanned += 1;
        }

        self.sweeps_completed.fetch_add(1, Ordering::Relaxed);
        SweepOutcome::Completed(report)
    }

    /// Fetch, vote, aggregate, gate, stage and notify for one symbol.
    /// Returns the pending id when an alert went out.
    async fn scan_symbol(&self, symbol: &str, risk: &RiskConfig) -> Result<Option<String>, NetworkError> {
        let candles = with_timeout(
            self.settings.network_timeout,
            self.market.fetch_candles(
                symbol,
                &self.settings.candle_interval,
                self.settings.candle_limit,
            ),
        )
        .await?;

        let series = PriceSeries::from_candles(&candles);
        let Some(price) = series.last() else {
            warn!(symbol = %symbol, "No candles returned");
            return Ok(None);
        };
        if series.len() < self.engine.required_history() {
            debug!(
                symbol = %symbol,
                "Only {} candles, some strategies will hold",
                series.len()
            );
        }

        let votes = self.engine.evaluate(&series);
        let signal = self.aggregator.aggregate(symbol, votes, price, &series);

        if !signal.is_actionable() {
            return Ok(None);
        }
        if signal.confidence < risk.min_confidence {
            debug!(
                symbol = %symbol,
                "{} below confidence gate ({:.2} < {:.2})",
                signal.direction, signal.confidence, risk.min_confidence
            );
            return Ok(None);
        }

        let now = Instant::now();
        if !self.dedup.should_emit(symbol, signal.direction, now).await {
            debug!(symbol = %symbol, "{} suppressed by cooldown", signal.direction);
            return Ok(None);
        }

        let direction = signal.direction;
        let id = self.pending.stage(signal.clone()).await;
        let confirm_id = PendingAction::confirm_id(&id);
        let cancel_id = PendingAction::cancel_id(&id);

        if let Err(e) = with_timeout(
            self.settings.network_timeout,
            self.notifier.send_signal_alert(&signal, &confirm_id, &cancel_id),
        )
        .await
        {
            // Nobody saw the buttons; drop the entry and let the next sweep retry.
            let _ = self.pending.cancel(&id).await;
            return Err(e);
        }

        self.dedup.record_emitted(symbol, direction, now).await;
        info!(
            "SIGNAL {} {} @ {:.4} (confidence {:.2})",
            symbol, direction, price, signal.confidence
        );
        Ok(Some(id))
    }
}

/// Drives `Scanner::sweep` on the configured interval until shutdown.
pub struct ScannerService {
    id: Uuid,
    scanner: Arc<Scanner>,
}

impl ScannerService {
    pub fn new(scanner: Arc<Scanner>) -> Self {
        Self {
            id: Uuid::new_v4(),
            scanner,
        }
    }

    async fn run_loop(&self) {
        let shutdown = self.scanner.shutdown_token().clone();
        info!(
            "Starting scanner for {} pairs",
            self.scanner.pairs().len()
        );

        while !shutdown.is_cancelled() {
            match self.scanner.sweep().await {
                SweepOutcome::Completed(report) => info!(
                    "Sweep #{} done: scanned={} alerted={} failed={}",
                    self.scanner.sweeps_completed(),
                    report.scanned,
                    report.alerted,
                    report.failed
                ),
                SweepOutcome::Cancelled(_) => break,
                SweepOutcome::Skipped => {}
            }

            // Re-read every cycle so /setrisk-style changes to the interval apply next time.
            let interval = self.scanner.scan_interval().await;
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = time::sleep(interval) => {}
            }
        }
        info!("Scanner stopped.");
    }
}

#[async_trait]
impl Actor for ScannerService {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> ActorType {
        ActorType::ScannerActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> Result<()> {
        let heartbeat_handle = self.spawn_heartbeat(supervisor_tx.clone());
        self.run_loop().await;
        heartbeat_handle.abort();
        supervisor_tx.send(ControlMessage::Shutdown(self.id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mocks::{MockMarket, MockNotify};
    use common::models::Candle;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn candles(closes: impl Iterator<Item = f64>) -> Vec<Candle> {
        closes
            .enumerate()
            .map(|(i, close)| Candle {
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
                timestamp: i as i64 * 60_000,
            })
            .collect()
    }

    fn uptrend() -> Vec<Candle> {
        candles((0..100).map(|i| 100.0 + i as f64))
    }

    fn flat() -> Vec<Candle> {
        candles(std::iter::repeat(100.0).take(100))
    }

    fn settings(pairs: &[&str]) -> ScannerSettings {
        ScannerSettings {
            pairs: pairs.iter().map(|s| s.to_string()).collect(),
            candle_interval: "15".to_string(),
            candle_limit: 100,
            network_timeout: Duration::from_secs(10),
        }
    }

    fn scanner(
        pairs: &[&str],
        market: Arc<dyn MarketDataClient>,
        notifier: Arc<dyn Notifier>,
        risk: RiskConfig,
    ) -> (Scanner, PendingConfirmationStore) {
        let pending = PendingConfirmationStore::default();
        let scanner = Scanner::new(
            settings(pairs),
            market,
            notifier,
            StrategyEngine::default(),
            SignalAggregator::new(),
            DedupTracker::default(),
            pending.clone(),
            risk.shared(),
            CancellationToken::new(),
        );
        (scanner, pending)
    }

    /// Fetches take one second of (paused) time each and record overlap.
    struct SlowMarket {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        fetched: Mutex<Vec<String>>,
    }

    impl SlowMarket {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                fetched: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MarketDataClient for SlowMarket {
        async fn fetch_candles(&self, symbol: &str, _: &str, _: usize) -> Result<Vec<Candle>, NetworkError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            time::sleep(Duration::from_secs(1)).await;
            self.fetched.lock().unwrap().push(symbol.to_string());
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(flat())
        }
    }

    const FIVE: &[&str] = &["BTCUSDT", "ETHUSDT", "BNBUSDT", "SOLUSDT", "XRPUSDT"];

    #[tokio::test]
    async fn agreeing_signal_is_staged_and_notified_once_per_cooldown() {
        let mut market = MockMarket::new();
        market.expect_fetch_candles().returning(|_, _, _| Ok(uptrend()));
        let mut notifier = MockNotify::new();
        notifier
            .expect_send_signal_alert()
            .withf(|signal, confirm, cancel| {
                signal.symbol == "BTCUSDT"
                    && confirm.starts_with("confirm:BTCUSDT-BUY-")
                    && cancel.starts_with("cancel:BTCUSDT-BUY-")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let (scanner, pending) = scanner(&["BTCUSDT"], Arc::new(market), Arc::new(notifier), RiskConfig::default());

        let first = scanner.sweep().await;
        assert_eq!(
            first,
            SweepOutcome::Completed(SweepReport { scanned: 1, alerted: 1, failed: 0 })
        );
        let second = scanner.sweep().await;
        assert_eq!(
            second,
            SweepOutcome::Completed(SweepReport { scanned: 1, alerted: 0, failed: 0 })
        );
        assert_eq!(pending.len().await, 1);
        assert_eq!(scanner.sweeps_completed(), 2);
    }

    #[tokio::test]
    async fn confidence_gate_blocks_weak_signals() {
        let mut market = MockMarket::new();
        market.expect_fetch_candles().returning(|_, _, _| Ok(uptrend()));
        let mut notifier = MockNotify::new();
        notifier.expect_send_signal_alert().times(0);

        let risk = RiskConfig {
            min_confidence: 0.99,
            ..RiskConfig::default()
        };
        let (scanner, pending) = scanner(&["BTCUSDT"], Arc::new(market), Arc::new(notifier), risk);

        scanner.sweep().await;
        assert!(pending.is_empty().await);
    }

    #[tokio::test]
    async fn one_failing_symbol_does_not_abort_the_sweep() {
        let mut market = MockMarket::new();
        market
            .expect_fetch_candles()
            .returning(|symbol, _, _| match symbol {
                "ETHUSDT" => Err(NetworkError::Request("connection reset".into())),
                "BNBUSDT" => Ok(Vec::new()),
                _ => Ok(flat()),
            });
        let mut notifier = MockNotify::new();
        notifier.expect_send_signal_alert().times(0);

        let (scanner, _) = scanner(FIVE, Arc::new(market), Arc::new(notifier), RiskConfig::default());

        assert_eq!(
            scanner.sweep().await,
            SweepOutcome::Completed(SweepReport { scanned: 5, alerted: 0, failed: 1 })
        );
        assert_eq!(scanner.state(), ScannerState::Idle);
    }

    #[tokio::test]
    async fn failed_notification_unstages_and_retries_next_sweep() {
        let mut market = MockMarket::new();
        market.expect_fetch_candles().returning(|_, _, _| Ok(uptrend()));
        let mut notifier = MockNotify::new();
        let mut calls = 0;
        notifier.expect_send_signal_alert().times(2).returning(move |_, _, _| {
            calls += 1;
            if calls == 1 {
                Err(NetworkError::Request("telegram down".into()))
            } else {
                Ok(())
            }
        });

        let (scanner, pending) = scanner(&["BTCUSDT"], Arc::new(market), Arc::new(notifier), RiskConfig::default());

        assert_eq!(
            scanner.sweep().await,
            SweepOutcome::Completed(SweepReport { scanned: 1, alerted: 0, failed: 1 })
        );
        assert!(pending.is_empty().await);

        assert_eq!(
            scanner.sweep().await,
            SweepOutcome::Completed(SweepReport { scanned: 1, alerted: 1, failed: 0 })
        );
        assert_eq!(pending.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_during_a_sweep_is_skipped() {
        let market = Arc::new(SlowMarket::new());
        let (scanner, _) = scanner(FIVE, market.clone(), Arc::new(MockNotify::new()), RiskConfig::default());
        let scanner = Arc::new(scanner);

        let background = scanner.clone();
        let first = tokio::spawn(async move { background.sweep().await });

        time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(scanner.state(), ScannerState::Sweeping);
        assert_eq!(scanner.sweep().await, SweepOutcome::Skipped);

        let outcome = first.await.unwrap();
        assert!(matches!(outcome, SweepOutcome::Completed(r) if r.scanned == 5));
        assert_eq!(market.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(scanner.sweeps_completed(), 1);

        // The next tick starts a fresh sweep only after the first finished.
        assert!(matches!(scanner.sweep().await, SweepOutcome::Completed(_)));
        assert_eq!(market.fetched.lock().unwrap().len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_finishes_the_current_symbol_then_exits() {
        let market = Arc::new(SlowMarket::new());
        let (scanner, _) = scanner(FIVE, market.clone(), Arc::new(MockNotify::new()), RiskConfig::default());
        let scanner = Arc::new(scanner);

        let background = scanner.clone();
        let sweep = tokio::spawn(async move { background.sweep().await });

        time::sleep(Duration::from_millis(1500)).await;
        scanner.shutdown_token().cancel();

        let outcome = sweep.await.unwrap();
        assert_eq!(
            outcome,
            SweepOutcome::Cancelled(SweepReport { scanned: 2, alerted: 0, failed: 0 })
        );
        assert_eq!(*market.fetched.lock().unwrap(), vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(scanner.state(), ScannerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_fetch_times_out_and_sweep_moves_on() {
        struct Stalled;
        #[async_trait]
        impl MarketDataClient for Stalled {
            async fn fetch_candles(&self, _: &str, _: &str, _: usize) -> Result<Vec<Candle>, NetworkError> {
                time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
        }

        let (scanner, _) = scanner(&["BTCUSDT", "ETHUSDT"], Arc::new(Stalled), Arc::new(MockNotify::new()), RiskConfig::default());
        let started = Instant::now();
        assert_eq!(
            scanner.sweep().await,
            SweepOutcome::Completed(SweepReport { scanned: 2, alerted: 0, failed: 2 })
        );
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn service_loop_exits_on_shutdown() {
        let mut market = MockMarket::new();
        market.expect_fetch_candles().returning(|_, _, _| Ok(flat()));
        let (scanner, _) = scanner(&["BTCUSDT"], Arc::new(market), Arc::new(MockNotify::new()), RiskConfig::default());
        let scanner = Arc::new(scanner);
        let token = scanner.shutdown_token().clone();

        let mut service = ScannerService::new(scanner.clone());
        let (tx, mut rx) = mpsc::channel(1024);
        let handle = tokio::spawn(async move { service.run(tx).await });

        time::sleep(Duration::from_secs(150)).await;
        token.cancel();
        handle.await.unwrap().unwrap();

        assert!(scanner.sweeps_completed() >= 3);
        let mut saw_shutdown = false;
        while let Ok(msg) = rx.try_recv() {
            if matches!(msg, ControlMessage::Shutdown(_)) {
                saw_shutdown = true;
            }
        }
        assert!(saw_shutdown);
    }
}
