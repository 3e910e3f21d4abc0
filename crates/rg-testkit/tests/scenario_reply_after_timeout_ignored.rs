//! Scenario: a reply arriving at/after the deadline loses to the timeout.
//!
//! Asserts:
//!   - A reply observed in the same cycle the deadline passes is discarded;
//!     the timeout resolves the decision and the adjusted stop stays.
//!   - No restore command is issued for the late keep-original.

use chrono::Duration;
use rg_config::RiskLimits;
use rg_decision::OperatorChoice;
use rg_schemas::Side;
use rg_testkit::{eurusd, snapshot, Harness};

#[test]
fn late_reply_is_discarded_after_timeout() {
    let snap = snapshot(10_000.0, vec![eurusd(7, Side::Buy, 1.0, 1.10000, Some(1.09850))]);
    let mut h = Harness::new(RiskLimits::default(), snap);

    h.cycle().expect("cycle"); // adjust + open decision
    assert_eq!(h.modify_sl_count(), 1);

    // Reply queued, but the next poll happens one millisecond past the
    // deadline: the timeout scan runs first and wins.
    h.reply(7, OperatorChoice::KeepOriginal);
    h.advance(Duration::minutes(15) + Duration::milliseconds(1));
    h.cycle().expect("cycle");

    assert_eq!(h.notification_count("decision timed out"), 1);
    assert_eq!(h.notification_count("original stop restored"), 0);
    assert_eq!(h.modify_sl_count(), 1);
    assert_eq!(
        h.engine.platform_mut().snapshot_mut().positions[0].sl,
        Some(1.09900)
    );
    assert!(h.status().pending_decisions.is_empty());
}

#[test]
fn reply_just_before_deadline_still_wins() {
    let snap = snapshot(10_000.0, vec![eurusd(7, Side::Buy, 1.0, 1.10000, Some(1.09850))]);
    let mut h = Harness::new(RiskLimits::default(), snap);

    h.cycle().expect("cycle");
    h.reply(7, OperatorChoice::KeepOriginal);
    h.advance(Duration::minutes(15) - Duration::milliseconds(1));
    h.cycle().expect("cycle");

    assert_eq!(h.notification_count("original stop restored"), 1);
    assert_eq!(h.notification_count("decision timed out"), 0);
    assert_eq!(h.modify_sl_count(), 2);
}
