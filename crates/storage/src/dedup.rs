use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::models::Direction;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(300);

/// Remembers when each (symbol, direction) last alerted. Timestamps are
/// monotonic, so wall-clock jumps cannot shorten or extend a cooldown.
#[derive(Clone)]
pub struct DedupTracker {
    cooldown: Duration,
    last_emitted: Arc<Mutex<HashMap<(String, Direction), Instant>>>,
}

impl Default for DedupTracker {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

impl DedupTracker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_emitted: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub async fn should_emit(&self, symbol: &str, direction: Direction, now: Instant) -> bool {
        let mut last_emitted = self.last_emitted.lock().await;
        self.evict_expired(&mut last_emitted, now);
        !last_emitted.contains_key(&(symbol.to_string(), direction))
    }

    pub async fn record_emitted(&self, symbol: &str, direction: Direction, now: Instant) {
        let mut last_emitted = self.last_emitted.lock().await;
        last_emitted.insert((symbol.to_string(), direction), now);
    }

    pub async fn tracked(&self) -> usize {
        self.last_emitted.lock().await.len()
    }

    fn evict_expired(&self, entries: &mut HashMap<(String, Direction), Instant>, now: Instant) {
        entries.retain(|_, &mut at| now.saturating_duration_since(at) < self.cooldown);
    }
}
