//! Paper-mode wiring: a deterministic in-memory account supervised by the
//! real engine. Useful for demos and for exercising the HTTP surface without
//! a live platform connection.

use chrono::{DateTime, Utc};
use rg_config::RiskLimits;
use rg_engine::sim::{SimCalendar, SimNotifier, SimPlatform};
use rg_engine::Engine;
use rg_schemas::{AccountSnapshot, PositionSnapshot, Side, Snapshot, SymbolInfo};

pub type PaperEngine = Engine<SimPlatform, SimCalendar, SimNotifier>;

/// Demo account: 10k USD, one EURUSD position safely inside the limits.
pub fn seed_snapshot(now: DateTime<Utc>) -> Snapshot {
    Snapshot {
        captured_at: now,
        account: AccountSnapshot {
            login: 1001,
            server: "paper".into(),
            balance: 10_000.0,
            equity: 10_000.0,
            margin: 0.0,
            margin_free: 10_000.0,
            currency: "USD".into(),
            server_time: now,
        },
        positions: vec![PositionSnapshot {
            ticket: 1,
            symbol: SymbolInfo {
                symbol: "EURUSD".into(),
                digits: 5,
                point: 0.00001,
                tick_size: 0.00001,
                tick_value: 1.0,
                contract_size: 100_000.0,
            },
            side: Side::Buy,
            volume: 0.1,
            entry_price: 1.10000,
            current_price: Some(1.10050),
            sl: Some(1.09500),
            tp: None,
            open_time: now,
            floating_pnl: 5.0,
        }],
    }
}

pub fn build_engine(limits: RiskLimits, now: DateTime<Utc>) -> PaperEngine {
    Engine::new(
        limits,
        SimPlatform::new(seed_snapshot(now)),
        SimCalendar::default(),
        SimNotifier::new(),
    )
}
