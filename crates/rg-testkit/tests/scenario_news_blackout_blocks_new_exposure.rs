//! Scenario: new exposure during a news blackout is flagged; unrelated
//! symbols are not.
//!
//! Asserts:
//!   - A EURUSD position opened 30 minutes before a high-impact USD event
//!     (60-minute window) is reported blocked, once.
//!   - A GBPJPY position opened in the same window is not touched by the
//!     USD event.
//!   - A position opened after the window closes is admitted.

use chrono::Duration;
use rg_config::RiskLimits;
use rg_schemas::Side;
use rg_testkit::{epoch, eurusd, gbpjpy, high_impact_event, snapshot, Harness};

#[test]
fn usd_event_blocks_only_usd_exposure() {
    let mut h = Harness::new(RiskLimits::default(), snapshot(10_000.0, vec![]));
    let event_at = epoch() + Duration::minutes(30);
    h.engine.calendar_mut().events = vec![high_impact_event(event_at, "USD")];

    h.cycle().expect("cycle"); // baseline, empty book

    // Trader opens EURUSD and GBPJPY inside the USD window.
    h.advance(Duration::minutes(1));
    h.add_position(eurusd(21, Side::Buy, 0.1, 1.10000, Some(1.09950)));
    h.add_position(gbpjpy(22, Side::Sell, 0.1, 185.000, Some(185.100)));
    h.cycle().expect("cycle");

    assert_eq!(h.notification_count("new exposure blocked"), 1);
    assert_eq!(h.notification_count("trade opened"), 2);

    // Repeated polls inside the window do not renotify.
    h.advance(Duration::minutes(5));
    h.cycle().expect("cycle");
    assert_eq!(h.notification_count("new exposure blocked"), 1);

    // Well past the window (event + 60 min), a new USD position is admitted.
    h.advance(Duration::hours(3));
    h.add_position(eurusd(23, Side::Buy, 0.1, 1.10000, Some(1.09950)));
    let report = h.cycle().expect("cycle");
    assert!(report
        .violations
        .iter()
        .all(|v| v.ticket() != Some(23)));
    assert_eq!(h.notification_count("new exposure blocked"), 1);
}
