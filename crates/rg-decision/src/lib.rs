//! Interactive stop-loss decision ledger.
//!
//! One record per ticket, resolved exactly once. There are no per-decision
//! timers: timeouts come from a wall-clock scan each poll, which makes
//! cancellation "mark the record before the scan sees it" and nothing more.
//!
//! # Invariants
//!
//! - At most one active decision per ticket.
//! - Exactly one terminal status is ever reached per decision
//!   (first-writer-wins); a reply after resolution is a no-op.
//! - A reply is valid strictly before the deadline; at the deadline the
//!   timeout wins.
//! - Position closure cancels a pending decision without producing commands.

use chrono::{DateTime, Utc};
use rg_schemas::Ticket;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Pending,
    ResolvedKeepOriginal,
    ResolvedKeepAdjusted,
    TimedOut,
    Cancelled,
}

impl DecisionStatus {
    pub fn is_terminal(self) -> bool {
        self != DecisionStatus::Pending
    }
}

/// Operator's answer to an open decision prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorChoice {
    /// Revert to the stop the trade was opened with; suppress re-flagging
    /// this ticket until it closes.
    KeepOriginal,
    /// Confirm the auto-adjusted stop. Terminal, no command needed.
    KeepAdjusted,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingDecision {
    pub ticket: Ticket,
    pub symbol: String,
    /// Stop before adjustment; `None` when the trade had no stop at all.
    pub original_sl: Option<f64>,
    /// Stop the engine applied to bring risk under the limit.
    pub adjusted_sl: f64,
    pub opened_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    /// Re-apply commands already spent keeping `adjusted_sl` in force.
    pub reapply_attempts: u32,
    pub status: DecisionStatus,
}

/// What the caller must do after a reply was accepted.
#[derive(Clone, Debug, PartialEq)]
pub enum ReplyOutcome {
    /// Issue a command restoring this stop (the trade's original).
    RestoreOriginal { original_sl: Option<f64> },
    /// Adjusted stop stands; nothing to issue.
    KeepAdjusted,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Terminal records retained for status reporting; older ones are dropped so
/// the archive stays bounded over a long-running process.
const RESOLVED_KEEP: usize = 256;

#[derive(Clone, Debug, Default)]
pub struct DecisionLedger {
    active: BTreeMap<Ticket, PendingDecision>,
    resolved: Vec<PendingDecision>,
    overridden: BTreeSet<Ticket>,
}

impl DecisionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a decision for `ticket`. Returns `false` (and changes nothing)
    /// when one is already active.
    pub fn open(
        &mut self,
        ticket: Ticket,
        symbol: &str,
        original_sl: Option<f64>,
        adjusted_sl: f64,
        now: DateTime<Utc>,
        deadline: DateTime<Utc>,
    ) -> bool {
        if self.active.contains_key(&ticket) {
            return false;
        }
        self.active.insert(
            ticket,
            PendingDecision {
                ticket,
                symbol: symbol.to_owned(),
                original_sl,
                adjusted_sl,
                opened_at: now,
                deadline,
                reapply_attempts: 0,
                status: DecisionStatus::Pending,
            },
        );
        true
    }

    pub fn is_pending(&self, ticket: Ticket) -> bool {
        self.active.contains_key(&ticket)
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingDecision> {
        self.active.values()
    }

    pub fn pending_count(&self) -> usize {
        self.active.len()
    }

    /// Tickets under a keep-original override (still open).
    pub fn overridden(&self) -> &BTreeSet<Ticket> {
        &self.overridden
    }

    /// Terminal records, oldest first (most recent [`RESOLVED_KEEP`] only).
    pub fn resolved(&self) -> &[PendingDecision] {
        &self.resolved
    }

    fn archive(&mut self, decision: PendingDecision) {
        self.resolved.push(decision);
        if self.resolved.len() > RESOLVED_KEEP {
            let excess = self.resolved.len() - RESOLVED_KEEP;
            self.resolved.drain(..excess);
        }
    }

    /// Apply an operator reply. `None` when the reply is late, unmatched, or
    /// a duplicate — all discarded silently.
    pub fn resolve(
        &mut self,
        ticket: Ticket,
        choice: OperatorChoice,
        now: DateTime<Utc>,
    ) -> Option<ReplyOutcome> {
        let decision = self.active.get(&ticket)?;
        // At the deadline exactly, the timeout scan owns the record.
        if now >= decision.deadline {
            return None;
        }
        let mut decision = self.active.remove(&ticket)?;
        let outcome = match choice {
            OperatorChoice::KeepOriginal => {
                decision.status = DecisionStatus::ResolvedKeepOriginal;
                self.overridden.insert(ticket);
                ReplyOutcome::RestoreOriginal {
                    original_sl: decision.original_sl,
                }
            }
            OperatorChoice::KeepAdjusted => {
                decision.status = DecisionStatus::ResolvedKeepAdjusted;
                ReplyOutcome::KeepAdjusted
            }
        };
        self.archive(decision);
        Some(outcome)
    }

    /// Mark every decision whose deadline has passed as `TimedOut` and return
    /// the expired records. The adjusted stop stays in force.
    pub fn scan_timeouts(&mut self, now: DateTime<Utc>) -> Vec<PendingDecision> {
        let expired: Vec<Ticket> = self
            .active
            .values()
            .filter(|d| now >= d.deadline)
            .map(|d| d.ticket)
            .collect();
        let mut out = Vec::with_capacity(expired.len());
        for ticket in expired {
            if let Some(mut d) = self.active.remove(&ticket) {
                d.status = DecisionStatus::TimedOut;
                self.archive(d.clone());
                out.push(d);
            }
        }
        out
    }

    /// Cancel pending decisions for tickets no longer open, and drop override
    /// flags for closed tickets. Returns the cancelled tickets.
    pub fn reconcile_closed(&mut self, open_tickets: &BTreeSet<Ticket>) -> Vec<Ticket> {
        let gone: Vec<Ticket> = self
            .active
            .keys()
            .filter(|t| !open_tickets.contains(t))
            .copied()
            .collect();
        for ticket in &gone {
            if let Some(mut d) = self.active.remove(ticket) {
                d.status = DecisionStatus::Cancelled;
                self.archive(d);
            }
        }
        self.overridden.retain(|t| open_tickets.contains(t));
        gone
    }

    /// Record one more re-apply attempt for a still-pending decision.
    /// Returns `Some(adjusted_sl)` when the attempt is within `max_attempts`,
    /// `None` when the budget is exhausted or the decision is not pending.
    pub fn note_reapply(&mut self, ticket: Ticket, max_attempts: u32) -> Option<f64> {
        let d = self.active.get_mut(&ticket)?;
        if d.reapply_attempts >= max_attempts {
            return None;
        }
        d.reapply_attempts += 1;
        Some(d.adjusted_sl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
    }

    fn open_one(ledger: &mut DecisionLedger, ticket: Ticket) -> DateTime<Utc> {
        let deadline = t0() + Duration::minutes(15);
        assert!(ledger.open(ticket, "EURUSD", Some(1.08), 1.099, t0(), deadline));
        deadline
    }

    #[test]
    fn one_decision_per_ticket() {
        let mut ledger = DecisionLedger::new();
        open_one(&mut ledger, 1);
        assert!(!ledger.open(1, "EURUSD", Some(1.08), 1.099, t0(), t0()));
        assert_eq!(ledger.pending_count(), 1);
    }

    #[test]
    fn keep_original_records_override_and_restores() {
        let mut ledger = DecisionLedger::new();
        open_one(&mut ledger, 1);
        let outcome = ledger
            .resolve(1, OperatorChoice::KeepOriginal, t0() + Duration::minutes(5))
            .unwrap();
        assert_eq!(
            outcome,
            ReplyOutcome::RestoreOriginal {
                original_sl: Some(1.08)
            }
        );
        assert!(ledger.overridden().contains(&1));
        assert_eq!(
            ledger.resolved()[0].status,
            DecisionStatus::ResolvedKeepOriginal
        );
    }

    #[test]
    fn keep_adjusted_issues_nothing() {
        let mut ledger = DecisionLedger::new();
        open_one(&mut ledger, 1);
        let outcome = ledger
            .resolve(1, OperatorChoice::KeepAdjusted, t0() + Duration::minutes(5))
            .unwrap();
        assert_eq!(outcome, ReplyOutcome::KeepAdjusted);
        assert!(!ledger.overridden().contains(&1));
    }

    #[test]
    fn second_reply_is_a_noop() {
        let mut ledger = DecisionLedger::new();
        open_one(&mut ledger, 1);
        let at = t0() + Duration::minutes(5);
        assert!(ledger.resolve(1, OperatorChoice::KeepAdjusted, at).is_some());
        assert!(ledger.resolve(1, OperatorChoice::KeepOriginal, at).is_none());
        assert_eq!(ledger.resolved().len(), 1);
    }

    #[test]
    fn reply_one_ms_before_deadline_wins() {
        let mut ledger = DecisionLedger::new();
        let deadline = open_one(&mut ledger, 1);
        let at = deadline - Duration::milliseconds(1);
        assert!(ledger.resolve(1, OperatorChoice::KeepAdjusted, at).is_some());
    }

    #[test]
    fn reply_at_deadline_loses_to_timeout() {
        let mut ledger = DecisionLedger::new();
        let deadline = open_one(&mut ledger, 1);
        assert!(ledger
            .resolve(1, OperatorChoice::KeepOriginal, deadline)
            .is_none());
        let expired = ledger.scan_timeouts(deadline);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].status, DecisionStatus::TimedOut);
        // A straggler reply after the scan is also dropped.
        assert!(ledger
            .resolve(1, OperatorChoice::KeepOriginal, deadline)
            .is_none());
    }

    #[test]
    fn closure_cancels_without_commands() {
        let mut ledger = DecisionLedger::new();
        open_one(&mut ledger, 1);
        let open: BTreeSet<Ticket> = BTreeSet::new();
        let cancelled = ledger.reconcile_closed(&open);
        assert_eq!(cancelled, vec![1]);
        assert_eq!(ledger.resolved()[0].status, DecisionStatus::Cancelled);
        assert!(!ledger.is_pending(1));
    }

    #[test]
    fn closure_clears_override_flag() {
        let mut ledger = DecisionLedger::new();
        open_one(&mut ledger, 1);
        ledger
            .resolve(1, OperatorChoice::KeepOriginal, t0() + Duration::minutes(1))
            .unwrap();
        assert!(ledger.overridden().contains(&1));
        ledger.reconcile_closed(&BTreeSet::new());
        assert!(!ledger.overridden().contains(&1));
    }

    #[test]
    fn resolved_archive_is_bounded() {
        let mut ledger = DecisionLedger::new();
        let deadline = t0() + Duration::minutes(15);
        for ticket in 0..400u64 {
            assert!(ledger.open(ticket, "EURUSD", Some(1.08), 1.099, t0(), deadline));
            ledger
                .resolve(ticket, OperatorChoice::KeepAdjusted, t0())
                .unwrap();
        }
        assert_eq!(ledger.resolved().len(), RESOLVED_KEEP);
        // Oldest records were dropped first.
        assert_eq!(ledger.resolved()[0].ticket, 400 - RESOLVED_KEEP as u64);
    }

    #[test]
    fn reapply_attempts_are_bounded() {
        let mut ledger = DecisionLedger::new();
        open_one(&mut ledger, 1);
        assert_eq!(ledger.note_reapply(1, 3), Some(1.099));
        assert_eq!(ledger.note_reapply(1, 3), Some(1.099));
        assert_eq!(ledger.note_reapply(1, 3), Some(1.099));
        assert_eq!(ledger.note_reapply(1, 3), None);
    }
}
