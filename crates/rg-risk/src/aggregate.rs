//! Aggregate open-risk tracker.
//!
//! Derived state: recomputed from each snapshot, never independently
//! mutated. Positions without a stop-loss contribute nothing here — they are
//! already flagged at maximal risk by the per-trade rule.

use rg_config::RiskLimits;
use rg_schemas::Snapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::EPSILON_PCT;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateRisk {
    pub total_risk_money: f64,
    pub total_risk_pct: f64,
    pub by_symbol: BTreeMap<String, f64>,
}

impl AggregateRisk {
    /// Sum per-position risk (zero-floored) over one snapshot.
    pub fn compute(snapshot: &Snapshot) -> Self {
        let equity = snapshot.account.equity;
        let mut total = 0.0;
        let mut by_symbol: BTreeMap<String, f64> = BTreeMap::new();
        for p in &snapshot.positions {
            if let Some(money) = p.risk_money() {
                total += money;
                *by_symbol.entry(p.symbol.symbol.clone()).or_insert(0.0) += money;
            }
        }
        let total_pct = if equity > 0.0 {
            total / equity * 100.0
        } else {
            0.0
        };
        Self {
            total_risk_money: total,
            total_risk_pct: total_pct,
            by_symbol,
        }
    }

    /// `true` if `additional_pct` more risk would still fit under the
    /// aggregate limit (inclusive).
    pub fn can_admit(&self, additional_pct: f64, limits: &RiskLimits) -> bool {
        self.total_risk_pct + additional_pct <= limits.aggregate_max_pct + EPSILON_PCT
    }

    /// `true` if the current total already exceeds the limit.
    pub fn exceeds_limit(&self, limits: &RiskLimits) -> bool {
        self.total_risk_pct > limits.aggregate_max_pct + EPSILON_PCT
    }
}
