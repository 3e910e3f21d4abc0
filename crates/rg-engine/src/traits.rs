//! Collaborator contracts and the message types that cross them.
//!
//! All three traits are object-safe and synchronous; the daemon's poll loop
//! owns the only clock and drives them once per cycle.

use chrono::{DateTime, Utc};
use rg_schemas::{NewsEvent, Snapshot, Ticket};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use rg_decision::OperatorChoice;

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Correction command sent back to the trading platform.
///
/// Commands are idempotent from the engine's perspective: one whose effect is
/// already reflected in the latest snapshot is not reissued.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    /// Set (or clear) the stop-loss of one open position.
    ModifySl { ticket: Ticket, sl: Option<f64> },
    /// Close one open position at market.
    ClosePosition { ticket: Ticket },
    /// Disable automated/new trading on the account.
    DisableTrading,
    /// Re-enable trading after a completed cooldown.
    EnableTrading,
}

pub trait TradingPlatform {
    /// One self-consistent snapshot of the account and its open positions.
    fn fetch_snapshot(&mut self) -> Result<Snapshot, EngineError>;

    fn execute(&mut self, cmd: &Command) -> Result<(), EngineError>;
}

// ---------------------------------------------------------------------------
// Calendar
// ---------------------------------------------------------------------------

pub trait CalendarSource {
    /// Events near `now` (implementations decide the horizon; the guard only
    /// looks one window to either side).
    fn events(&mut self, now: DateTime<Utc>) -> Result<Vec<NewsEvent>, EngineError>;
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub severity: Severity,
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn new(severity: Severity, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Interactive prompt offering keep-original vs keep-adjusted for one ticket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionPrompt {
    pub ticket: Ticket,
    pub symbol: String,
    pub original_sl: Option<f64>,
    pub adjusted_sl: f64,
    pub risk_pct: f64,
    pub limit_pct: f64,
    pub deadline: DateTime<Utc>,
}

/// Operator answer, correlated to the pending decision by ticket id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorReply {
    pub ticket: Ticket,
    pub choice: OperatorChoice,
}

pub trait Notifier {
    fn notify(&mut self, n: &Notification) -> Result<(), EngineError>;

    /// Fire-and-forget: the reply, if any, comes back later via
    /// [`drain_replies`](Notifier::drain_replies).
    fn prompt(&mut self, p: &DecisionPrompt) -> Result<(), EngineError>;

    /// Replies received since the last drain. Unmatched and late replies are
    /// discarded by the engine, not here.
    fn drain_replies(&mut self) -> Vec<OperatorReply>;
}
