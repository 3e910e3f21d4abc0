//! Shared snapshot schema for the risk engine.
//!
//! Everything here is a plain immutable value: one [`Snapshot`] is captured
//! per poll cycle and handed to the pure evaluation layers. No IO, no clock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Position identifier assigned by the trading platform.
pub type Ticket = u64;

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

// ---------------------------------------------------------------------------
// SymbolInfo — instrument metadata from the platform
// ---------------------------------------------------------------------------

/// Instrument metadata required for money/price conversions.
///
/// Always sourced from the platform connector; pip/tick conventions are
/// broker-specific and never hard-coded in the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    pub digits: u32,
    pub point: f64,
    pub tick_size: f64,
    pub tick_value: f64,
    pub contract_size: f64,
}

impl SymbolInfo {
    /// Smallest price increment for this instrument.
    pub fn grid(&self) -> f64 {
        if self.point > 0.0 {
            self.point
        } else {
            10f64.powi(-(self.digits as i32))
        }
    }

    /// Account-currency value of a price move of `price_diff` for one lot.
    ///
    /// Prefers the platform's tick size/value pair; falls back to the
    /// contract-size point formula used for FX/CFD instruments. Returns
    /// `None` when the metadata is unusable for either path.
    pub fn money_per_lot(&self, price_diff: f64, price_ref: f64) -> Option<f64> {
        if !(price_diff.is_finite() && price_diff >= 0.0) {
            return None;
        }
        if self.tick_size > 0.0 && self.tick_value > 0.0 {
            return Some((price_diff / self.tick_size) * self.tick_value);
        }
        // FX fallback: points × point value, point value derived from the
        // contract size and a reference price.
        if self.point > 0.0 && self.contract_size > 0.0 && price_ref > 0.0 {
            let point_value = (self.contract_size * self.point) / price_ref;
            if point_value > 0.0 {
                return Some((price_diff / self.point) * point_value);
            }
        }
        None
    }

    /// Inverse of [`money_per_lot`]: price distance that corresponds to a
    /// per-lot money amount.
    ///
    /// [`money_per_lot`]: SymbolInfo::money_per_lot
    pub fn price_diff_for_money_per_lot(&self, money: f64, price_ref: f64) -> Option<f64> {
        if !(money.is_finite() && money > 0.0) {
            return None;
        }
        if self.tick_size > 0.0 && self.tick_value > 0.0 {
            return Some((money / self.tick_value) * self.tick_size);
        }
        if self.point > 0.0 && self.contract_size > 0.0 && price_ref > 0.0 {
            let point_value = (self.contract_size * self.point) / price_ref;
            if point_value > 0.0 {
                return Some((money / point_value) * self.point);
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// AccountSnapshot
// ---------------------------------------------------------------------------

/// Account state at poll time. Immutable once captured.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub login: i64,
    pub server: String,
    pub balance: f64,
    pub equity: f64,
    pub margin: f64,
    pub margin_free: f64,
    pub currency: String,
    pub server_time: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// PositionSnapshot
// ---------------------------------------------------------------------------

/// One open position as observed at poll time.
///
/// Superseded each cycle by a newer snapshot carrying the same ticket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub ticket: Ticket,
    pub symbol: SymbolInfo,
    pub side: Side,
    pub volume: f64,
    pub entry_price: f64,
    pub current_price: Option<f64>,
    /// `None` means no stop-loss is set on the position.
    pub sl: Option<f64>,
    pub tp: Option<f64>,
    pub open_time: DateTime<Utc>,
    pub floating_pnl: f64,
}

impl PositionSnapshot {
    /// Adverse price distance to the stop-loss.
    ///
    /// - `None`: no SL set.
    /// - `Some(0.0)`: SL is at or beyond entry (locked profit) — zero risk.
    pub fn sl_distance(&self) -> Option<f64> {
        let sl = self.sl?;
        let diff = match self.side {
            Side::Buy => self.entry_price - sl,
            Side::Sell => sl - self.entry_price,
        };
        Some(diff.max(0.0))
    }

    /// Potential loss at the stop-loss in account currency, zero-floored.
    ///
    /// `None` when the position has no SL or the instrument metadata cannot
    /// express the conversion.
    pub fn risk_money(&self) -> Option<f64> {
        let diff = self.sl_distance()?;
        if diff == 0.0 {
            return Some(0.0);
        }
        let price_ref = self.current_price.unwrap_or(self.entry_price);
        Some(self.symbol.money_per_lot(diff, price_ref)? * self.volume)
    }

    /// Risk as a percentage of the given equity; `None` under the same
    /// conditions as [`risk_money`](PositionSnapshot::risk_money).
    pub fn risk_pct(&self, equity: f64) -> Option<f64> {
        if equity <= 0.0 {
            return None;
        }
        Some(self.risk_money()? / equity * 100.0)
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Full account + positions capture for one poll cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub captured_at: DateTime<Utc>,
    pub account: AccountSnapshot,
    pub positions: Vec<PositionSnapshot>,
}

/// A structural defect that makes a snapshot unusable for evaluation.
///
/// The orchestrator skips the whole cycle on any defect; there is no partial
/// evaluation of malformed input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SnapshotDefect {
    NonFiniteEquity,
    NegativeEquity,
    NonPositiveVolume { ticket: Ticket },
    NonPositiveEntryPrice { ticket: Ticket },
    NonFinitePrice { ticket: Ticket },
    DuplicateTicket { ticket: Ticket },
}

impl std::fmt::Display for SnapshotDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotDefect::NonFiniteEquity => write!(f, "equity is not finite"),
            SnapshotDefect::NegativeEquity => write!(f, "equity is negative"),
            SnapshotDefect::NonPositiveVolume { ticket } => {
                write!(f, "ticket {ticket}: volume is zero or negative")
            }
            SnapshotDefect::NonPositiveEntryPrice { ticket } => {
                write!(f, "ticket {ticket}: entry price is zero or negative")
            }
            SnapshotDefect::NonFinitePrice { ticket } => {
                write!(f, "ticket {ticket}: non-finite price field")
            }
            SnapshotDefect::DuplicateTicket { ticket } => {
                write!(f, "ticket {ticket}: appears more than once")
            }
        }
    }
}

impl Snapshot {
    /// Structural validation; first defect wins.
    pub fn check_consistent(&self) -> Result<(), SnapshotDefect> {
        if !self.account.equity.is_finite() {
            return Err(SnapshotDefect::NonFiniteEquity);
        }
        if self.account.equity < 0.0 {
            return Err(SnapshotDefect::NegativeEquity);
        }
        let mut seen = std::collections::BTreeSet::new();
        for p in &self.positions {
            if !seen.insert(p.ticket) {
                return Err(SnapshotDefect::DuplicateTicket { ticket: p.ticket });
            }
            if !(p.volume.is_finite() && p.volume > 0.0) {
                return Err(SnapshotDefect::NonPositiveVolume { ticket: p.ticket });
            }
            if !(p.entry_price.is_finite() && p.entry_price > 0.0) {
                return Err(SnapshotDefect::NonPositiveEntryPrice { ticket: p.ticket });
            }
            let prices = [
                p.sl.unwrap_or(0.0),
                p.tp.unwrap_or(0.0),
                p.current_price.unwrap_or(p.entry_price),
            ];
            if prices.iter().any(|x| !x.is_finite()) {
                return Err(SnapshotDefect::NonFinitePrice { ticket: p.ticket });
            }
        }
        Ok(())
    }

    pub fn position(&self, ticket: Ticket) -> Option<&PositionSnapshot> {
        self.positions.iter().find(|p| p.ticket == ticket)
    }

    pub fn tickets(&self) -> std::collections::BTreeSet<Ticket> {
        self.positions.iter().map(|p| p.ticket).collect()
    }
}

// ---------------------------------------------------------------------------
// News events
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsImpact {
    Low,
    Medium,
    High,
}

/// One scheduled economic-calendar event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewsEvent {
    pub scheduled_at: DateTime<Utc>,
    pub impact: NewsImpact,
    /// Currency the event concerns ("USD", "EUR", ...); `None` = global.
    pub currency: Option<String>,
    pub title: String,
}
