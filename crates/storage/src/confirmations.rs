use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use common::errors::NotFoundError;
use common::models::AggregatedSignal;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

const CONFIRM_PREFIX: &str = "confirm:";
const CANCEL_PREFIX: &str = "cancel:";

#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    pub id: String,
    pub signal: AggregatedSignal,
    pub created_at: Instant,
    pub expires_at: Instant,
}

/// What a button press asks for, decoded from its action id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    Confirm(String),
    Cancel(String),
}

impl PendingAction {
    pub fn confirm_id(id: &str) -> String {
        format!("{CONFIRM_PREFIX}{id}")
    }

    pub fn cancel_id(id: &str) -> String {
        format!("{CANCEL_PREFIX}{id}")
    }

    pub fn parse(action_id: &str) -> Option<Self> {
        if let Some(id) = action_id.strip_prefix(CONFIRM_PREFIX) {
            Some(Self::Confirm(id.to_string()))
        } else {
            action_id
                .strip_prefix(CANCEL_PREFIX)
                .map(|id| Self::Cancel(id.to_string()))
        }
    }
}

/// Signals waiting for a human decision. Every entry leaves the store exactly
/// once: through the first confirm, cancel, or expiry that reaches it.
#[derive(Clone)]
pub struct PendingConfirmationStore {
    ttl: Duration,
    sequence: Arc<AtomicU64>,
    pending: Arc<Mutex<HashMap<String, PendingConfirmation>>>,
}

impl Default for PendingConfirmationStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl PendingConfirmationStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sequence: Arc::new(AtomicU64::new(0)),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn stage(&self, signal: AggregatedSignal) -> String {
        self.stage_at(signal, Instant::now()).await
    }

    pub async fn stage_at(&self, signal: AggregatedSignal, now: Instant) -> String {
        let id = self.next_id(&signal);
        let entry = PendingConfirmation {
            id: id.clone(),
            signal,
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.pending.lock().await.insert(id.clone(), entry);
        debug!(id = %id, "staged signal for confirmation");
        id
    }

    pub async fn confirm(&self, id: &str) -> Result<AggregatedSignal, NotFoundError> {
        self.take(id, Instant::now()).await
    }

    pub async fn cancel(&self, id: &str) -> Result<AggregatedSignal, NotFoundError> {
        self.take(id, Instant::now()).await
    }

    /// Removes the entry if it is still live at `now`. An entry whose TTL has
    /// already passed is dropped and reported as not found.
    pub async fn take(&self, id: &str, now: Instant) -> Result<AggregatedSignal, NotFoundError> {
        let entry = self.pending.lock().await.remove(id);
        match entry {
            Some(entry) if entry.expires_at > now => Ok(entry.signal),
            _ => Err(NotFoundError(id.to_string())),
        }
    }

    /// Drops every entry whose TTL has passed and returns them.
    pub async fn expire(&self, now: Instant) -> Vec<PendingConfirmation> {
        let mut pending = self.pending.lock().await;
        let stale: Vec<String> = pending
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(id, _)| id.clone())
            .collect();
        stale.iter().filter_map(|id| pending.remove(id)).collect()
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }

    fn next_id(&self, signal: &AggregatedSignal) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!(
            "{}-{}-{}-{}",
            signal.symbol,
            signal.direction,
            Utc::now().timestamp_millis(),
            seq
        )
    }
}
