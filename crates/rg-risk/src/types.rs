use rg_schemas::{Side, Ticket};
use serde::{Deserialize, Serialize};

/// Tolerance applied to every inclusive percentage comparison, so that a
/// position computed at exactly the limit is never flagged by float noise.
pub const EPSILON_PCT: f64 = 1e-9;

/// One limit violation found in a snapshot.
///
/// Violations are facts, not actions: the orchestrator decides what command
/// or notification each one produces.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// A single position risks more than the per-trade limit.
    ///
    /// `required_sl` is the stop price that brings risk exactly to the limit,
    /// rounded toward tighter risk; `None` when the instrument metadata
    /// cannot express the conversion (surfaced as an adjust failure).
    PerTradeRiskExceeded {
        ticket: Ticket,
        symbol: String,
        side: Side,
        volume: f64,
        risk_pct: f64,
        limit_pct: f64,
        required_sl: Option<f64>,
        original_sl: Option<f64>,
    },
    /// Sum of open-position risk exceeds the aggregate limit.
    AggregateRiskExceeded { total_risk_pct: f64, limit_pct: f64 },
    /// Equity drawdown from the high-water mark breached the kill limit.
    DrawdownBreached { drawdown_pct: f64, limit_pct: f64 },
    /// A new position was observed while admission is blocked (news blackout,
    /// tripped/cooling kill switch, or no aggregate headroom). `ticket` is
    /// `None` when the block is reported without a specific position.
    NewOpenBlockedByNews { ticket: Option<Ticket> },
}

impl Violation {
    /// Ticket this violation concerns, when it concerns exactly one.
    pub fn ticket(&self) -> Option<Ticket> {
        match self {
            Violation::PerTradeRiskExceeded { ticket, .. } => Some(*ticket),
            Violation::NewOpenBlockedByNews { ticket } => *ticket,
            _ => None,
        }
    }
}
