//! Scenario harness: a manually-clocked engine over the sim collaborators.
//!
//! Tests mutate the platform's held snapshot between cycles and advance the
//! clock explicitly, so every scenario is deterministic and runs in-process.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rg_config::RiskLimits;
use rg_decision::OperatorChoice;
use rg_engine::sim::{SimCalendar, SimNotifier, SimPlatform};
use rg_engine::{Command, CycleReport, Engine, EngineError, EngineStatus, OperatorReply};
use rg_schemas::{
    AccountSnapshot, NewsEvent, NewsImpact, PositionSnapshot, Side, Snapshot, SymbolInfo,
};

pub type SimEngine = Engine<SimPlatform, SimCalendar, SimNotifier>;

/// Fixed scenario epoch: 2026-03-02 12:00:00 UTC.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn snapshot(equity: f64, positions: Vec<PositionSnapshot>) -> Snapshot {
    Snapshot {
        captured_at: epoch(),
        account: AccountSnapshot {
            login: 7001,
            server: "sim".into(),
            balance: equity,
            equity,
            margin: 0.0,
            margin_free: equity,
            currency: "USD".into(),
            server_time: epoch(),
        },
        positions,
    }
}

/// EURUSD with a $1-per-tick grid: risk money = ticks × volume.
pub fn eurusd(ticket: u64, side: Side, volume: f64, entry: f64, sl: Option<f64>) -> PositionSnapshot {
    PositionSnapshot {
        ticket,
        symbol: SymbolInfo {
            symbol: "EURUSD".into(),
            digits: 5,
            point: 0.00001,
            tick_size: 0.00001,
            tick_value: 1.0,
            contract_size: 100_000.0,
        },
        side,
        volume,
        entry_price: entry,
        current_price: None,
        sl,
        tp: None,
        open_time: epoch(),
        floating_pnl: 0.0,
    }
}

pub fn gbpjpy(ticket: u64, side: Side, volume: f64, entry: f64, sl: Option<f64>) -> PositionSnapshot {
    PositionSnapshot {
        ticket,
        symbol: SymbolInfo {
            symbol: "GBPJPY".into(),
            digits: 3,
            point: 0.001,
            tick_size: 0.001,
            tick_value: 0.65,
            contract_size: 100_000.0,
        },
        side,
        volume,
        entry_price: entry,
        current_price: None,
        sl,
        tp: None,
        open_time: epoch(),
        floating_pnl: 0.0,
    }
}

pub fn high_impact_event(at: DateTime<Utc>, currency: &str) -> NewsEvent {
    NewsEvent {
        scheduled_at: at,
        impact: NewsImpact::High,
        currency: Some(currency.to_string()),
        title: "Nonfarm Payrolls".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub now: DateTime<Utc>,
    pub engine: SimEngine,
}

impl Harness {
    pub fn new(limits: RiskLimits, initial: Snapshot) -> Self {
        Self {
            now: epoch(),
            engine: Engine::new(
                limits,
                SimPlatform::new(initial),
                SimCalendar::default(),
                SimNotifier::new(),
            ),
        }
    }

    pub fn advance(&mut self, d: Duration) {
        self.now += d;
    }

    pub fn cycle(&mut self) -> Result<CycleReport, EngineError> {
        self.engine.run_cycle(self.now)
    }

    pub fn status(&self) -> EngineStatus {
        self.engine.status()
    }

    pub fn reply(&mut self, ticket: u64, choice: OperatorChoice) {
        self.engine
            .notifier_mut()
            .push_reply(OperatorReply { ticket, choice });
    }

    pub fn set_equity(&mut self, equity: f64) {
        let snap = self.engine.platform_mut().snapshot_mut();
        snap.account.equity = equity;
        snap.account.balance = equity;
    }

    pub fn add_position(&mut self, p: PositionSnapshot) {
        self.engine.platform_mut().snapshot_mut().positions.push(p);
    }

    pub fn close_position(&mut self, ticket: u64) {
        self.engine
            .platform_mut()
            .snapshot_mut()
            .positions
            .retain(|p| p.ticket != ticket);
    }

    pub fn commands(&mut self) -> &[Command] {
        &self.engine.platform_mut().commands
    }

    pub fn modify_sl_count(&mut self) -> usize {
        self.engine
            .platform_mut()
            .commands_of_kind(|c| matches!(c, Command::ModifySl { .. }))
    }

    pub fn notification_count(&mut self, title: &str) -> usize {
        self.engine
            .notifier_mut()
            .titles()
            .iter()
            .filter(|t| **t == title)
            .count()
    }
}
