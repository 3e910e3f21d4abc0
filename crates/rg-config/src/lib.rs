//! Risk-policy limits configuration.
//!
//! Loaded once per process lifetime and read-only to the engine. Validation
//! is fatal at startup: an invalid limit must never reach a running cycle.

use anyhow::{bail, Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// All tunable limits of the risk engine.
///
/// Defaults match the shipped policy: 1% per trade, 5% aggregate, 20%
/// drawdown with a 30-day cooldown, 60-minute news window, 15-minute
/// interactive decision timeout, 3 stop-loss re-apply attempts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskLimits {
    /// Max risk per open trade, % of equity (inclusive bound).
    pub per_trade_max_pct: f64,
    /// Max aggregate open risk, % of equity (inclusive bound).
    pub aggregate_max_pct: f64,
    /// Drawdown from the equity high-water mark that trips the kill switch, %.
    pub drawdown_limit_pct: f64,
    /// Cooldown after a kill-switch trip, days.
    pub drawdown_cooldown_days: i64,
    /// Symmetric blackout half-window around each news event, minutes.
    pub news_window_minutes: i64,
    /// How long an interactive SL decision stays open, minutes.
    pub interactive_timeout_minutes: i64,
    /// Max attempts to re-apply an adjusted SL while a decision is pending.
    pub max_sl_reapply_attempts: u32,
    /// Poll cadence of the control loop, milliseconds.
    pub poll_interval_ms: u64,
    /// Calendar cache refresh cadence, minutes.
    pub calendar_refresh_minutes: i64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            per_trade_max_pct: 1.0,
            aggregate_max_pct: 5.0,
            drawdown_limit_pct: 20.0,
            drawdown_cooldown_days: 30,
            news_window_minutes: 60,
            interactive_timeout_minutes: 15,
            max_sl_reapply_attempts: 3,
            poll_interval_ms: 500,
            calendar_refresh_minutes: 10,
        }
    }
}

impl RiskLimits {
    pub fn drawdown_cooldown(&self) -> Duration {
        Duration::days(self.drawdown_cooldown_days)
    }

    pub fn news_window(&self) -> Duration {
        Duration::minutes(self.news_window_minutes)
    }

    pub fn interactive_timeout(&self) -> Duration {
        Duration::minutes(self.interactive_timeout_minutes)
    }

    pub fn calendar_refresh(&self) -> Duration {
        Duration::minutes(self.calendar_refresh_minutes)
    }

    /// Load from a YAML or JSON file (decided by extension), then validate.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading limits config {}", path.display()))?;
        let limits: RiskLimits = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&raw)
                .with_context(|| format!("parsing JSON limits {}", path.display()))?,
            _ => serde_yaml::from_str(&raw)
                .with_context(|| format!("parsing YAML limits {}", path.display()))?,
        };
        limits.validate()?;
        Ok(limits)
    }

    /// Load from `path` if given, otherwise defaults. Always validated.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let limits = Self::default();
                limits.validate()?;
                Ok(limits)
            }
        }
    }

    /// Fatal-at-startup validation of every field.
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("per_trade_max_pct", self.per_trade_max_pct),
            ("aggregate_max_pct", self.aggregate_max_pct),
            ("drawdown_limit_pct", self.drawdown_limit_pct),
        ] {
            if !v.is_finite() {
                bail!("limit {name} is not a finite number");
            }
            if v <= 0.0 || v > 100.0 {
                bail!("limit {name} must be in (0, 100], got {v}");
            }
        }
        if self.per_trade_max_pct > self.aggregate_max_pct {
            bail!(
                "per_trade_max_pct ({}) exceeds aggregate_max_pct ({})",
                self.per_trade_max_pct,
                self.aggregate_max_pct
            );
        }
        if self.drawdown_cooldown_days <= 0 {
            bail!("drawdown_cooldown_days must be positive");
        }
        if self.news_window_minutes < 0 {
            bail!("news_window_minutes must not be negative");
        }
        if self.interactive_timeout_minutes <= 0 {
            bail!("interactive_timeout_minutes must be positive");
        }
        if self.poll_interval_ms == 0 {
            bail!("poll_interval_ms must be positive");
        }
        if self.calendar_refresh_minutes <= 0 {
            bail!("calendar_refresh_minutes must be positive");
        }
        Ok(())
    }
}
