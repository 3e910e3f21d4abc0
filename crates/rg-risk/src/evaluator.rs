//! Pure violation evaluator.
//!
//! Runs once per poll with no internal state: deterministic given its
//! inputs, so every rule is testable with a hand-built [`EvalInput`].

use rg_config::RiskLimits;
use rg_schemas::{PositionSnapshot, Side, Snapshot, Ticket};
use std::collections::BTreeSet;

use crate::aggregate::AggregateRisk;
use crate::kill::KillSwitch;
use crate::types::{Violation, EPSILON_PCT};

/// Context object threaded through one evaluation.
pub struct EvalInput<'a> {
    pub snapshot: &'a Snapshot,
    pub limits: &'a RiskLimits,
    pub kill: &'a KillSwitch,
    /// New tickets whose symbol sits inside an active news window.
    pub blackout_tickets: &'a BTreeSet<Ticket>,
    /// Tickets first observed this cycle (admission checks apply to these).
    pub new_tickets: &'a BTreeSet<Ticket>,
    /// Tickets under an operator keep-original override; exempt from
    /// per-trade re-flagging until they close.
    pub overridden: &'a BTreeSet<Ticket>,
}

/// Map one snapshot to the list of violations it contains.
pub fn evaluate(input: &EvalInput) -> Vec<Violation> {
    let snap = input.snapshot;
    let limits = input.limits;
    let equity = snap.account.equity;
    let mut out = Vec::new();

    // Drawdown against the high-water mark.
    let dd = input.kill.drawdown_pct(equity);
    if dd >= limits.drawdown_limit_pct - EPSILON_PCT {
        out.push(Violation::DrawdownBreached {
            drawdown_pct: dd,
            limit_pct: limits.drawdown_limit_pct,
        });
    }

    // Per-trade risk.
    if equity > 0.0 {
        for p in &snap.positions {
            if input.overridden.contains(&p.ticket) {
                continue;
            }
            let risk_pct = match per_trade_risk_pct(p, equity) {
                Some(r) => r,
                // SL present but the instrument metadata cannot express the
                // conversion: nothing sound to flag against.
                None => continue,
            };
            if risk_pct > limits.per_trade_max_pct + EPSILON_PCT {
                out.push(Violation::PerTradeRiskExceeded {
                    ticket: p.ticket,
                    symbol: p.symbol.symbol.clone(),
                    side: p.side,
                    volume: p.volume,
                    risk_pct,
                    limit_pct: limits.per_trade_max_pct,
                    required_sl: required_sl_for_limit(p, equity, limits.per_trade_max_pct),
                    original_sl: p.sl,
                });
            }
        }
    }

    // Aggregate risk.
    let agg = AggregateRisk::compute(snap);
    if agg.exceeds_limit(limits) {
        out.push(Violation::AggregateRiskExceeded {
            total_risk_pct: agg.total_risk_pct,
            limit_pct: limits.aggregate_max_pct,
        });
    }

    // Admission checks for positions that appeared this cycle. Headroom is
    // judged against the book as it stood before them, through the same
    // `can_admit` gate the aggregate tracker exposes.
    let blocked_globally = input.kill.blocks_new_entries();
    if !input.new_tickets.is_empty() {
        let mut existing = snap.clone();
        existing
            .positions
            .retain(|p| !input.new_tickets.contains(&p.ticket));
        let baseline = AggregateRisk::compute(&existing);
        for p in &snap.positions {
            if !input.new_tickets.contains(&p.ticket) {
                continue;
            }
            let own = p.risk_pct(equity).unwrap_or(0.0);
            if blocked_globally
                || !baseline.can_admit(own, limits)
                || input.blackout_tickets.contains(&p.ticket)
            {
                out.push(Violation::NewOpenBlockedByNews {
                    ticket: Some(p.ticket),
                });
            }
        }
    }

    out
}

/// Effective per-trade risk %, applying the policy edges:
/// no SL ⇒ maximal risk (100%); SL beyond entry ⇒ zero.
fn per_trade_risk_pct(p: &PositionSnapshot, equity: f64) -> Option<f64> {
    if p.sl.is_none() {
        return Some(100.0);
    }
    p.risk_pct(equity)
}

/// Stop price that brings the position's risk exactly to `limit_pct`,
/// rounded to the instrument grid **toward tighter risk** (never looser).
///
/// `None` when equity, volume, or the instrument metadata cannot support the
/// computation; the caller reports an adjust failure instead of guessing.
pub fn required_sl_for_limit(p: &PositionSnapshot, equity: f64, limit_pct: f64) -> Option<f64> {
    if equity <= 0.0 || p.volume <= 0.0 || p.entry_price <= 0.0 {
        return None;
    }
    let allowed_money = equity * limit_pct / 100.0;
    if allowed_money <= 0.0 {
        return None;
    }
    let price_ref = p.current_price.unwrap_or(p.entry_price);
    let diff = p
        .symbol
        .price_diff_for_money_per_lot(allowed_money / p.volume, price_ref)?;
    if !(diff.is_finite() && diff > 0.0) {
        return None;
    }

    let grid = p.symbol.grid();
    let sl = match p.side {
        // Buy: higher SL = smaller distance = tighter. Round up.
        Side::Buy => {
            let raw = p.entry_price - diff;
            ((raw / grid) - 1e-9).ceil() * grid
        }
        // Sell: lower SL is tighter. Round down.
        Side::Sell => {
            let raw = p.entry_price + diff;
            ((raw / grid) + 1e-9).floor() * grid
        }
    };
    if sl <= 0.0 || !sl.is_finite() {
        return None;
    }
    // Snap to the instrument's quoted precision: the tick index above is
    // exact, but multiplying by the binary-inexact grid leaves residue
    // (e.g. 1.0990000000000002) that brokers reject at `digits` precision.
    let scale = 10f64.powi(p.symbol.digits as i32);
    Some((sl * scale).round() / scale)
}
