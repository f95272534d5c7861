use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use common::actors::{Actor, ActorType, ControlMessage};
use common::clients::Notifier;
use common::errors::with_timeout;
use storage::PendingConfirmationStore;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

pub const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Periodically drops pending confirmations whose TTL has passed and tells the
/// admin which signals lapsed.
pub struct ExpiryService {
    id: Uuid,
    pending: PendingConfirmationStore,
    notifier: Arc<dyn Notifier>,
    network_timeout: Duration,
    shutdown: CancellationToken,
}

impl ExpiryService {
    pub fn new(
        pending: PendingConfirmationStore,
        notifier: Arc<dyn Notifier>,
        network_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            pending,
            notifier,
            network_timeout,
            shutdown,
        }
    }

    /// Returns how many entries were expired.
    pub async fn expire_once(&self) -> usize {
        let expired = self.pending.expire(Instant::now()).await;
        for entry in &expired {
            info!(id = %entry.id, "Pending confirmation expired");
            let text = format!(
                "Signal expired: {} {} @ {:.4}",
                entry.signal.symbol, entry.signal.direction, entry.signal.reference_price
            );
            if let Err(e) = with_timeout(self.network_timeout, self.notifier.send_text(&text)).await {
                warn!("Failed to report expiry of {}: {}", entry.id, e);
            }
        }
        expired.len()
    }
}

#[async_trait]
impl Actor for ExpiryService {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> ActorType {
        ActorType::ExpiryActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> Result<()> {
        let heartbeat_handle = self.spawn_heartbeat(supervisor_tx.clone());
        let mut ticker = time::interval(EXPIRY_SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.expire_once().await;
                }
            }
        }

        heartbeat_handle.abort();
        supervisor_tx.send(ControlMessage::Shutdown(self.id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mocks::MockNotify;
    use chrono::Utc;
    use common::models::{AggregatedSignal, Direction};

    fn signal(symbol: &str) -> AggregatedSignal {
        AggregatedSignal {
            symbol: symbol.to_string(),
            direction: Direction::Sell,
            confidence: 0.75,
            reference_price: 2.5,
            votes: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn lapsed_entries_are_removed_and_reported() {
        let pending = PendingConfirmationStore::new(Duration::from_secs(600));
        let old = pending.stage(signal("XRPUSDT")).await;
        time::advance(Duration::from_secs(400)).await;
        let fresh = pending.stage(signal("ADAUSDT")).await;
        time::advance(Duration::from_secs(201)).await;

        let mut notifier = MockNotify::new();
        notifier
            .expect_send_text()
            .withf(|text| text == "Signal expired: XRPUSDT SELL @ 2.5000")
            .times(1)
            .returning(|_| Ok(()));

        let service = ExpiryService::new(
            pending.clone(),
            Arc::new(notifier),
            Duration::from_secs(10),
            CancellationToken::new(),
        );
        assert_eq!(service.expire_once().await, 1);
        assert!(pending.confirm(&old).await.is_err());
        assert!(pending.confirm(&fresh).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_shutdown() {
        let pending = PendingConfirmationStore::new(Duration::from_secs(60));
        pending.stage(signal("BTCUSDT")).await;

        let mut notifier = MockNotify::new();
        notifier.expect_send_text().times(1).returning(|_| Ok(()));

        let token = CancellationToken::new();
        let mut service = ExpiryService::new(pending.clone(), Arc::new(notifier), Duration::from_secs(10), token.clone());
        let (tx, mut rx) = mpsc::channel(1024);
        let handle = tokio::spawn(async move { service.run(tx).await });

        time::sleep(Duration::from_secs(95)).await;
        assert!(pending.is_empty().await);
        token.cancel();
        handle.await.unwrap().unwrap();

        let mut saw_shutdown = false;
        while let Ok(msg) = rx.try_recv() {
            saw_shutdown |= matches!(msg, ControlMessage::Shutdown(_));
        }
        assert!(saw_shutdown);
    }
}
