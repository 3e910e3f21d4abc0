//! Scenario: drawdown kill switch trips, flattens, and re-arms only after
//! the cooldown deadline plus recovery.
//!
//! Asserts:
//!   - 25% drawdown against a 20% limit trips once: close-all + disable
//!     commands precede the critical notification, cooldown deadline is
//!     trip time + 30 days.
//!   - Deeper drawdown during cooldown does not re-trip or move the deadline.
//!   - Recovery before the deadline stays in cooldown; the deadline alone is
//!     not enough either.
//!   - Deadline + recovery re-arms with a fresh high-water mark, and a later
//!     breach trips again.

use chrono::Duration;
use rg_config::RiskLimits;
use rg_engine::Command;
use rg_risk::KillSwitchState;
use rg_schemas::Side;
use rg_testkit::{epoch, eurusd, snapshot, Harness};

#[test]
fn trip_flatten_cooldown_rearm() {
    let snap = snapshot(12_000.0, vec![eurusd(3, Side::Buy, 0.1, 1.10000, Some(1.09500))]);
    let mut h = Harness::new(RiskLimits::default(), snap);

    h.cycle().expect("cycle"); // baseline: peak = 12k
    assert_eq!(h.status().kill_state, KillSwitchState::Armed);

    // Equity collapses to 9k: 25% drawdown vs the 20% limit.
    h.advance(Duration::minutes(1));
    h.set_equity(9_000.0);
    let report = h.cycle().expect("cycle");
    assert!(report.tripped);

    let trip_at = epoch() + Duration::minutes(1);
    let until = trip_at + Duration::days(30);
    assert_eq!(h.status().kill_state, KillSwitchState::Cooldown { until });
    assert_eq!(h.status().cooldown_until, Some(until));
    assert_eq!(h.notification_count("kill switch tripped"), 1);

    // Commands came before the alert: position closed, trading disabled.
    assert_eq!(
        h.commands().to_vec(),
        vec![Command::ClosePosition { ticket: 3 }, Command::DisableTrading]
    );
    assert!(h.engine.platform_mut().trading_disabled);
    assert!(h.engine.platform_mut().snapshot_mut().positions.is_empty());

    // Deeper drawdown during cooldown: one trip per episode, fixed deadline.
    h.advance(Duration::days(1));
    h.set_equity(6_000.0);
    let report = h.cycle().expect("cycle");
    assert!(!report.tripped);
    assert_eq!(h.status().cooldown_until, Some(until));
    assert_eq!(h.notification_count("kill switch tripped"), 1);

    // Recovery before the deadline: still cooling.
    h.advance(Duration::days(10));
    h.set_equity(11_500.0);
    h.cycle().expect("cycle");
    assert!(matches!(
        h.status().kill_state,
        KillSwitchState::Cooldown { .. }
    ));

    // Deadline passed but equity back down: still cooling.
    h.advance(Duration::days(25));
    h.set_equity(9_000.0);
    h.cycle().expect("cycle");
    assert!(matches!(
        h.status().kill_state,
        KillSwitchState::Cooldown { .. }
    ));

    // Deadline passed and recovered: re-armed, high-water mark reset,
    // trading re-enabled.
    h.advance(Duration::days(1));
    h.set_equity(11_500.0);
    h.cycle().expect("cycle");
    assert_eq!(h.status().kill_state, KillSwitchState::Armed);
    assert_eq!(h.status().peak_equity, 11_500.0);
    assert!(!h.engine.platform_mut().trading_disabled);
    assert_eq!(h.notification_count("kill switch re-armed"), 1);

    // A fresh breach against the new mark trips a second time.
    h.advance(Duration::hours(1));
    h.set_equity(9_000.0); // ~21.7% below 11.5k
    let report = h.cycle().expect("cycle");
    assert!(report.tripped);
    assert_eq!(h.notification_count("kill switch tripped"), 2);
}

#[test]
fn trip_cycle_does_not_adjust_flattened_positions() {
    // The position loses its stop on the same poll that breaches the
    // drawdown limit. The trip closes it; no stop-adjust or prompt may
    // follow for a position that no longer exists.
    let snap = snapshot(12_000.0, vec![eurusd(9, Side::Buy, 0.1, 1.10000, Some(1.09950))]);
    let mut h = Harness::new(RiskLimits::default(), snap);
    h.cycle().expect("cycle"); // baseline: peak = 12k

    h.advance(Duration::minutes(1));
    h.set_equity(9_000.0);
    h.engine.platform_mut().snapshot_mut().positions[0].sl = None;
    let report = h.cycle().expect("cycle");
    assert!(report.tripped);

    assert_eq!(
        h.commands().to_vec(),
        vec![Command::ClosePosition { ticket: 9 }, Command::DisableTrading]
    );
    assert_eq!(h.modify_sl_count(), 0);
    assert!(h.status().pending_decisions.is_empty());
    assert!(h.engine.notifier_mut().prompts.is_empty());
}
