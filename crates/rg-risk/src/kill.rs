//! Drawdown kill switch.
//!
//! # Invariants
//!
//! - Drawdown is measured against a running equity **high-water mark**, not
//!   balance history. The mark only moves up, and only while `Armed`; it
//!   resets to current equity at re-arm and at no other time.
//! - At most one trip action per breach episode: a breach while `Tripped` or
//!   in `Cooldown` neither re-emits the trip nor moves the deadline. An
//!   episode ends only when the state returns to `Armed`.
//! - The cooldown deadline is fixed at trip time. Deeper drawdown during
//!   cooldown does not extend it.
//! - Re-arm needs both: the deadline has passed **and** drawdown is back
//!   under the limit.

use chrono::{DateTime, Duration, Utc};
use rg_config::RiskLimits;
use serde::{Deserialize, Serialize};

use crate::types::EPSILON_PCT;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum KillSwitchState {
    /// Normal operation.
    Armed,
    /// Breach detected this cycle; trading-blocking commands are being
    /// emitted. Transitions to `Cooldown` as soon as the orchestrator
    /// confirms the trip actions were issued (state reflects intent even if
    /// a command failed).
    Tripped,
    /// New entries blocked until the fixed deadline.
    Cooldown { until: DateTime<Utc> },
}

/// Emitted exactly once per breach episode, at the `Armed → Tripped` edge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TripEvent {
    pub drawdown_pct: f64,
    pub limit_pct: f64,
    pub peak_equity: f64,
    pub equity: f64,
    pub cooldown_until: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KillSwitch {
    state: KillSwitchState,
    peak_equity: f64,
}

impl KillSwitch {
    pub fn new(initial_equity: f64) -> Self {
        Self {
            state: KillSwitchState::Armed,
            peak_equity: initial_equity.max(0.0),
        }
    }

    pub fn state(&self) -> KillSwitchState {
        self.state
    }

    pub fn peak_equity(&self) -> f64 {
        self.peak_equity
    }

    /// Current drawdown from the high-water mark, %. Zero-floored.
    pub fn drawdown_pct(&self, equity: f64) -> f64 {
        if self.peak_equity <= 0.0 {
            return 0.0;
        }
        ((self.peak_equity - equity) / self.peak_equity * 100.0).max(0.0)
    }

    /// `true` while new exposure is blocked (`Tripped` or `Cooldown`).
    pub fn blocks_new_entries(&self) -> bool {
        !matches!(self.state, KillSwitchState::Armed)
    }

    /// Advance the state machine by one poll.
    ///
    /// Returns `Some(TripEvent)` exactly at the `Armed → Tripped` edge; the
    /// caller must emit the trip commands and then call
    /// [`confirm_trip`](KillSwitch::confirm_trip).
    pub fn step(&mut self, now: DateTime<Utc>, equity: f64, limits: &RiskLimits) -> Option<TripEvent> {
        match self.state {
            KillSwitchState::Armed => {
                if equity > self.peak_equity {
                    self.peak_equity = equity;
                }
                let dd = self.drawdown_pct(equity);
                if dd >= limits.drawdown_limit_pct - EPSILON_PCT {
                    let until = now + limits.drawdown_cooldown();
                    self.state = KillSwitchState::Tripped;
                    return Some(TripEvent {
                        drawdown_pct: dd,
                        limit_pct: limits.drawdown_limit_pct,
                        peak_equity: self.peak_equity,
                        equity,
                        cooldown_until: until,
                    });
                }
                None
            }
            // Awaiting confirm_trip; nothing to re-emit.
            KillSwitchState::Tripped => None,
            KillSwitchState::Cooldown { until } => {
                // Peak is frozen during cooldown so a partial recovery does
                // not quietly raise the bar for the next episode.
                let dd = self.drawdown_pct(equity);
                if now >= until && dd < limits.drawdown_limit_pct - EPSILON_PCT {
                    self.state = KillSwitchState::Armed;
                    self.peak_equity = equity.max(0.0);
                }
                None
            }
        }
    }

    /// Move `Tripped → Cooldown` with the deadline fixed at trip time.
    ///
    /// Called unconditionally after the trip commands were attempted: the
    /// state must reflect intent even when a close/disable command failed.
    pub fn confirm_trip(&mut self, cooldown_until: DateTime<Utc>) {
        if matches!(self.state, KillSwitchState::Tripped) {
            self.state = KillSwitchState::Cooldown {
                until: cooldown_until,
            };
        }
    }

    /// Deadline of the active cooldown, if any.
    pub fn cooldown_until(&self) -> Option<DateTime<Utc>> {
        match self.state {
            KillSwitchState::Cooldown { until } => Some(until),
            _ => None,
        }
    }

    /// Restore persisted state (operational continuity across restarts is
    /// owned by the embedding process).
    pub fn restore(state: KillSwitchState, peak_equity: f64) -> Self {
        Self {
            state,
            peak_equity: peak_equity.max(0.0),
        }
    }

    #[doc(hidden)]
    pub fn force_peak_for_test(&mut self, peak: f64) {
        self.peak_equity = peak;
    }
}

/// Convenience used by status surfaces: remaining cooldown, zero-floored.
pub fn cooldown_remaining(state: &KillSwitchState, now: DateTime<Utc>) -> Option<Duration> {
    match state {
        KillSwitchState::Cooldown { until } => Some((*until - now).max(Duration::zero())),
        _ => None,
    }
}
