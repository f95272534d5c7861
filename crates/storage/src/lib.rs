//! Process-memory stores shared between the scan loop and the command layer.
//! Each store guards only its own map; no lock is held across a network call.

pub mod confirmations;
pub mod dedup;

pub use confirmations::{PendingAction, PendingConfirmation, PendingConfirmationStore};
pub use dedup::DedupTracker;
