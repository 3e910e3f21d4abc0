//! Poll-cycle orchestrator.
//!
//! One `run_cycle` call per poll. Sequence: fetch → validate → reconcile
//! closures → timeouts → operator replies → news guard → kill switch →
//! evaluate → act. Command issuance always precedes the notification that
//! describes it, and a failed cycle leaves every piece of sticky state
//! untouched.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use rg_config::RiskLimits;
use rg_decision::{DecisionLedger, PendingDecision, ReplyOutcome};
use rg_news::symbol_in_blackout;
use rg_risk::{evaluate, AggregateRisk, EvalInput, KillSwitch, KillSwitchState, Violation};
use rg_schemas::Ticket;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::EngineError;
use crate::traits::{
    CalendarSource, Command, DecisionPrompt, Notification, Notifier, Severity, TradingPlatform,
};

// ---------------------------------------------------------------------------
// Dedup keys
// ---------------------------------------------------------------------------

/// One logical occurrence that must be notified at most once. Keys are
/// removed when the occurrence ends, so a genuinely new occurrence of the
/// same condition notifies again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum EventKey {
    TradeOpened(Ticket),
    AggregateExceeded,
    NewsBlocked(Ticket),
    AdjustFailed(Ticket),
    ReapplyExhausted(Ticket),
}

// ---------------------------------------------------------------------------
// Status / report
// ---------------------------------------------------------------------------

/// Observable engine state backing the status surface.
#[derive(Clone, Debug, Serialize)]
pub struct EngineStatus {
    pub kill_state: KillSwitchState,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub peak_equity: f64,
    pub equity: f64,
    pub aggregate_risk_pct: f64,
    pub pending_decisions: Vec<PendingDecision>,
    pub last_violations: Vec<Violation>,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

/// What one cycle did, for the caller's log line.
#[derive(Clone, Debug, Default)]
pub struct CycleReport {
    pub violations: Vec<Violation>,
    pub commands_issued: usize,
    pub tripped: bool,
    /// Calendar source failed; the news guard failed open this cycle.
    pub calendar_failed: bool,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine<P, C, N> {
    limits: RiskLimits,
    platform: P,
    calendar: C,
    notifier: N,

    kill: KillSwitch,
    ledger: DecisionLedger,
    known_tickets: BTreeSet<Ticket>,
    notified: BTreeSet<EventKey>,

    // First snapshot seeds the baseline; its positions are pre-existing, not
    // newly opened.
    primed: bool,

    equity: f64,
    aggregate: AggregateRisk,
    last_violations: Vec<Violation>,
    last_cycle_at: Option<DateTime<Utc>>,
}

impl<P, C, N> Engine<P, C, N>
where
    P: TradingPlatform,
    C: CalendarSource,
    N: Notifier,
{
    pub fn new(limits: RiskLimits, platform: P, calendar: C, notifier: N) -> Self {
        Self {
            limits,
            platform,
            calendar,
            notifier,
            kill: KillSwitch::new(0.0),
            ledger: DecisionLedger::new(),
            known_tickets: BTreeSet::new(),
            notified: BTreeSet::new(),
            primed: false,
            equity: 0.0,
            aggregate: AggregateRisk::default(),
            last_violations: Vec::new(),
            last_cycle_at: None,
        }
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            kill_state: self.kill.state(),
            cooldown_until: self.kill.cooldown_until(),
            peak_equity: self.kill.peak_equity(),
            equity: self.equity,
            aggregate_risk_pct: self.aggregate.total_risk_pct,
            pending_decisions: self.ledger.pending().cloned().collect(),
            last_violations: self.last_violations.clone(),
            last_cycle_at: self.last_cycle_at,
        }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn calendar_mut(&mut self) -> &mut C {
        &mut self.calendar
    }

    pub fn notifier_mut(&mut self) -> &mut N {
        &mut self.notifier
    }

    /// Run one full poll cycle at `now`.
    ///
    /// A `Transient` or `InconsistentSnapshot` error means nothing was acted
    /// on; the caller logs it and polls again next tick.
    pub fn run_cycle(&mut self, now: DateTime<Utc>) -> Result<CycleReport, EngineError> {
        let snapshot = self.platform.fetch_snapshot()?;
        snapshot
            .check_consistent()
            .map_err(|d| EngineError::InconsistentSnapshot(d.to_string()))?;

        let mut report = CycleReport::default();
        let equity = snapshot.account.equity;
        let current: BTreeSet<Ticket> = snapshot.tickets();

        let (new_tickets, closed_tickets) = if self.primed {
            (
                current
                    .difference(&self.known_tickets)
                    .copied()
                    .collect::<BTreeSet<_>>(),
                self.known_tickets
                    .difference(&current)
                    .copied()
                    .collect::<BTreeSet<_>>(),
            )
        } else {
            (BTreeSet::new(), BTreeSet::new())
        };

        // Closures first: cancelled decisions produce no commands and no
        // decision notifications.
        let cancelled = self.ledger.reconcile_closed(&current);
        for ticket in &cancelled {
            debug!(ticket, "pending decision cancelled by position closure");
        }
        for &ticket in &closed_tickets {
            // The snapshot diff is edge-triggered: a ticket shows up here on
            // exactly one cycle, so no dedup key is kept for closures.
            self.send(&Notification::new(
                Severity::Info,
                "trade closed",
                format!("position {ticket} closed"),
            ));
            self.notified.remove(&EventKey::TradeOpened(ticket));
            self.notified.remove(&EventKey::NewsBlocked(ticket));
            self.notified.remove(&EventKey::AdjustFailed(ticket));
            self.notified.remove(&EventKey::ReapplyExhausted(ticket));
        }

        // Timeouts before replies: at the deadline the timeout wins.
        for expired in self.ledger.scan_timeouts(now) {
            info!(ticket = expired.ticket, "decision timed out, adjusted stop stays");
            self.send(&Notification::new(
                Severity::Info,
                "decision timed out",
                format!(
                    "no reply for position {} by {}; adjusted stop {} remains in force",
                    expired.ticket, expired.deadline, expired.adjusted_sl
                ),
            ));
        }

        // Operator replies, matched by ticket. Late and unmatched replies are
        // dropped.
        for reply in self.notifier.drain_replies() {
            match self.ledger.resolve(reply.ticket, reply.choice, now) {
                Some(ReplyOutcome::RestoreOriginal { original_sl }) => {
                    let cmd = Command::ModifySl {
                        ticket: reply.ticket,
                        sl: original_sl,
                    };
                    match self.platform.execute(&cmd) {
                        Ok(()) => {
                            report.commands_issued += 1;
                            self.send(&Notification::new(
                                Severity::Info,
                                "original stop restored",
                                format!(
                                    "position {} reverted to its original stop; \
                                     override recorded until it closes",
                                    reply.ticket
                                ),
                            ));
                        }
                        Err(err) => {
                            warn!(ticket = reply.ticket, %err, "restore command failed");
                            self.send(&Notification::new(
                                Severity::Warning,
                                "stop restore failed",
                                format!("could not restore stop for position {}", reply.ticket),
                            ));
                        }
                    }
                }
                Some(ReplyOutcome::KeepAdjusted) => {
                    self.send(&Notification::new(
                        Severity::Info,
                        "adjusted stop confirmed",
                        format!("position {} keeps the adjusted stop", reply.ticket),
                    ));
                }
                None => debug!(ticket = reply.ticket, "late or unmatched reply dropped"),
            }
        }

        // News guard. Calendar failure fails open for this cycle only.
        let events = match self.calendar.events(now) {
            Ok(events) => events,
            Err(err) => {
                warn!(%err, "calendar unavailable, news guard fails open");
                report.calendar_failed = true;
                Vec::new()
            }
        };
        let window = self.limits.news_window();
        let mut blackout_tickets = BTreeSet::new();
        for p in &snapshot.positions {
            if !new_tickets.contains(&p.ticket) {
                continue;
            }
            if symbol_in_blackout(now, &events, &p.symbol.symbol, window) {
                blackout_tickets.insert(p.ticket);
            }
        }

        // Kill switch: on the trip edge, flatten and disable before telling
        // anyone. State transitions even when a command fails.
        let was_blocking = self.kill.blocks_new_entries();
        if let Some(trip) = self.kill.step(now, equity, &self.limits) {
            report.tripped = true;
            let mut any_failed = false;
            for &ticket in &current {
                let cmd = Command::ClosePosition { ticket };
                match self.platform.execute(&cmd) {
                    Ok(()) => report.commands_issued += 1,
                    Err(err) => {
                        error!(ticket, %err, "close command failed during trip");
                        any_failed = true;
                    }
                }
            }
            if let Err(err) = self.platform.execute(&Command::DisableTrading) {
                error!(%err, "disable-trading command failed during trip");
                any_failed = true;
            } else {
                report.commands_issued += 1;
            }
            self.kill.confirm_trip(trip.cooldown_until);
            self.send(&Notification::new(
                Severity::Critical,
                "kill switch tripped",
                format!(
                    "drawdown {:.2}% breached limit {:.2}% (peak {:.2}, equity {:.2}); \
                     new entries blocked until {}",
                    trip.drawdown_pct,
                    trip.limit_pct,
                    trip.peak_equity,
                    trip.equity,
                    trip.cooldown_until
                ),
            ));
            if any_failed {
                self.send(&Notification::new(
                    Severity::Critical,
                    "trip commands incomplete",
                    "one or more close/disable commands failed; manual intervention required"
                        .to_string(),
                ));
            }
        } else if was_blocking && !self.kill.blocks_new_entries() {
            // Cooldown completed with recovered equity: re-arm edge.
            match self.platform.execute(&Command::EnableTrading) {
                Ok(()) => report.commands_issued += 1,
                Err(err) => warn!(%err, "enable-trading command failed after cooldown"),
            }
            self.send(&Notification::new(
                Severity::Info,
                "kill switch re-armed",
                format!(
                    "cooldown complete; new entries allowed again (peak reset to {:.2})",
                    self.kill.peak_equity()
                ),
            ));
        }

        // Rule evaluation over the validated snapshot.
        let violations = evaluate(&EvalInput {
            snapshot: &snapshot,
            limits: &self.limits,
            kill: &self.kill,
            blackout_tickets: &blackout_tickets,
            new_tickets: &new_tickets,
            overridden: self.ledger.overridden(),
        });

        let mut opened_this_cycle: BTreeSet<Ticket> = BTreeSet::new();
        for v in &violations {
            match v {
                Violation::PerTradeRiskExceeded {
                    ticket,
                    symbol,
                    risk_pct,
                    limit_pct,
                    required_sl,
                    original_sl,
                    ..
                } => {
                    if report.tripped {
                        // The trip already closed every position this cycle;
                        // a closed position cannot be acted on.
                        continue;
                    }
                    if self.ledger.is_pending(*ticket) {
                        continue; // handled by the re-apply pass below
                    }
                    match required_sl {
                        Some(sl) => {
                            let cmd = Command::ModifySl {
                                ticket: *ticket,
                                sl: Some(*sl),
                            };
                            match self.platform.execute(&cmd) {
                                Ok(()) => {
                                    report.commands_issued += 1;
                                    let deadline = now + self.limits.interactive_timeout();
                                    self.ledger.open(
                                        *ticket, symbol, *original_sl, *sl, now, deadline,
                                    );
                                    opened_this_cycle.insert(*ticket);
                                    let prompt = DecisionPrompt {
                                        ticket: *ticket,
                                        symbol: symbol.clone(),
                                        original_sl: *original_sl,
                                        adjusted_sl: *sl,
                                        risk_pct: *risk_pct,
                                        limit_pct: *limit_pct,
                                        deadline,
                                    };
                                    if let Err(err) = self.notifier.prompt(&prompt) {
                                        // No reply will come; the timeout
                                        // keeps the adjusted stop.
                                        warn!(ticket = *ticket, %err, "decision prompt undeliverable");
                                    }
                                }
                                Err(err) => {
                                    warn!(ticket = *ticket, %err, "stop adjust failed, retrying next cycle");
                                }
                            }
                        }
                        None => {
                            if self.notified.insert(EventKey::AdjustFailed(*ticket)) {
                                self.send(&Notification::new(
                                    Severity::Warning,
                                    "cannot adjust stop",
                                    format!(
                                        "position {ticket} risks {risk_pct:.2}% (limit {limit_pct:.2}%) \
                                         but no valid stop could be computed"
                                    ),
                                ));
                            }
                        }
                    }
                }
                Violation::AggregateRiskExceeded {
                    total_risk_pct,
                    limit_pct,
                } => {
                    if self.notified.insert(EventKey::AggregateExceeded) {
                        self.send(&Notification::new(
                            Severity::Warning,
                            "aggregate risk exceeded",
                            format!("total open risk {total_risk_pct:.2}% over limit {limit_pct:.2}%"),
                        ));
                    }
                }
                // The trip edge above already produced the critical alert;
                // while tripped or cooling this is status-only.
                Violation::DrawdownBreached { .. } => {}
                Violation::NewOpenBlockedByNews { ticket } => {
                    if let Some(t) = ticket {
                        if self.notified.insert(EventKey::NewsBlocked(*t)) {
                            self.send(&Notification::new(
                                Severity::Warning,
                                "new exposure blocked",
                                format!("position {t} opened while new exposure is blocked"),
                            ));
                        }
                    }
                }
            }
        }
        if !violations
            .iter()
            .any(|v| matches!(v, Violation::AggregateRiskExceeded { .. }))
        {
            self.notified.remove(&EventKey::AggregateExceeded);
        }

        // Re-apply pass: keep the adjusted stop in force while a decision is
        // pending, within the attempt budget. Decisions opened this cycle are
        // excluded: their adjust command postdates the snapshot, so the stale
        // stop it shows is not drift. Nothing to re-apply on a trip cycle
        // either, the positions are gone.
        let reapply: Vec<(Ticket, f64)> = if report.tripped {
            Vec::new()
        } else {
            self.ledger
                .pending()
                .filter(|d| !opened_this_cycle.contains(&d.ticket))
                .filter_map(|d| {
                    let p = snapshot.position(d.ticket)?;
                    let drifted = match p.sl {
                        Some(sl) => (sl - d.adjusted_sl).abs() > p.symbol.grid() * 0.5,
                        None => true,
                    };
                    drifted.then_some((d.ticket, d.adjusted_sl))
                })
                .collect()
        };
        for (ticket, _) in reapply {
            match self
                .ledger
                .note_reapply(ticket, self.limits.max_sl_reapply_attempts)
            {
                Some(sl) => {
                    let cmd = Command::ModifySl {
                        ticket,
                        sl: Some(sl),
                    };
                    match self.platform.execute(&cmd) {
                        Ok(()) => report.commands_issued += 1,
                        Err(err) => warn!(ticket, %err, "stop re-apply failed"),
                    }
                }
                None => {
                    if self.notified.insert(EventKey::ReapplyExhausted(ticket)) {
                        self.send(&Notification::new(
                            Severity::Warning,
                            "stop re-apply budget exhausted",
                            format!("position {ticket} keeps drifting off the adjusted stop"),
                        ));
                    }
                }
            }
        }

        // Open notifications last among the per-ticket events.
        for &ticket in &new_tickets {
            if self.notified.insert(EventKey::TradeOpened(ticket)) {
                self.send(&Notification::new(
                    Severity::Info,
                    "trade opened",
                    format!("position {ticket} opened"),
                ));
            }
        }

        self.aggregate = AggregateRisk::compute(&snapshot);
        self.equity = equity;
        self.known_tickets = current;
        self.primed = true;
        self.last_violations = violations.clone();
        self.last_cycle_at = Some(now);
        report.violations = violations;
        Ok(report)
    }

    fn send(&mut self, n: &Notification) {
        if let Err(err) = self.notifier.notify(n) {
            warn!(%err, title = %n.title, "notification dropped");
        }
    }
}
