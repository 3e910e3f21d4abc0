use thiserror::Error;

/// Engine-facing failure taxonomy.
///
/// `Transient` and `Calendar` mean "skip this cycle, retry on the next poll";
/// `InconsistentSnapshot` means the whole cycle was discarded unacted-on.
/// Sticky state (kill switch, decision ledger, dedup keys) is never mutated
/// by a failed cycle.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Platform IO failed (connection drop, timeout). Retry next cycle.
    #[error("transient platform error: {0}")]
    Transient(String),

    /// Snapshot failed internal validation; no rule ran against it.
    #[error("inconsistent snapshot: {0}")]
    InconsistentSnapshot(String),

    /// Calendar source failed; the news guard fails open for this cycle.
    #[error("calendar source error: {0}")]
    Calendar(String),

    /// Notification channel unavailable. Prompts and messages are dropped
    /// (treated as "no reply"), never fatal.
    #[error("notification channel unavailable: {0}")]
    Channel(String),

    /// Bad wiring or limits; surfaced at startup, not per cycle.
    #[error("configuration error: {0}")]
    Configuration(String),
}
