//! Scenario: over-limit trade is auto-adjusted, then the decision times out.
//!
//! Asserts:
//!   - 1.5% risk vs a 1% limit produces exactly one stop-adjust command
//!     bringing risk to exactly 1.0%, plus one interactive prompt with a
//!     15-minute deadline.
//!   - No reply by the deadline: the decision reports timed-out and the
//!     adjusted stop remains in force. No second command, no second prompt.

use chrono::Duration;
use rg_config::RiskLimits;
use rg_engine::Command;
use rg_schemas::Side;
use rg_testkit::{epoch, eurusd, snapshot, Harness};

#[test]
fn adjust_then_timeout_keeps_adjusted_stop() {
    // 150 ticks × $1 × 1.0 lot = $150 = 1.5% of 10k.
    let snap = snapshot(10_000.0, vec![eurusd(42, Side::Buy, 1.0, 1.10000, Some(1.09850))]);
    let mut h = Harness::new(RiskLimits::default(), snap);

    let report = h.cycle().expect("cycle");
    assert_eq!(report.commands_issued, 1);
    assert_eq!(
        h.commands()[0],
        Command::ModifySl {
            ticket: 42,
            sl: Some(1.09900) // exactly 1.0% of equity
        }
    );
    let prompt = &h.engine.notifier_mut().prompts[0];
    assert_eq!(prompt.ticket, 42);
    assert_eq!(prompt.original_sl, Some(1.09850));
    assert_eq!(prompt.deadline, epoch() + Duration::minutes(15));
    assert_eq!(h.status().pending_decisions.len(), 1);
    // The adjust itself is not a re-apply: the attempt budget is untouched.
    assert_eq!(h.status().pending_decisions[0].reapply_attempts, 0);

    // Mid-wait polls are quiet: the adjusted stop holds risk at the limit.
    h.advance(Duration::minutes(14));
    let report = h.cycle().expect("cycle");
    assert_eq!(report.commands_issued, 0);
    assert!(report.violations.is_empty());

    // Deadline reached with no reply: timeout wins, adjusted stop stays.
    h.advance(Duration::minutes(1));
    h.cycle().expect("cycle");
    assert_eq!(h.status().pending_decisions.len(), 0);
    assert_eq!(h.notification_count("decision timed out"), 1);
    assert_eq!(h.modify_sl_count(), 1);
    assert_eq!(
        h.engine.platform_mut().snapshot_mut().positions[0].sl,
        Some(1.09900)
    );
    assert_eq!(h.engine.notifier_mut().prompts.len(), 1);
}

#[test]
fn drifted_stop_is_reapplied_while_pending() {
    let snap = snapshot(10_000.0, vec![eurusd(42, Side::Buy, 1.0, 1.10000, Some(1.09850))]);
    let mut h = Harness::new(RiskLimits::default(), snap);

    let report = h.cycle().expect("cycle");
    assert_eq!(report.commands_issued, 1); // the adjust, nothing more

    // Something moves the stop back off the adjusted level mid-wait.
    h.engine.platform_mut().snapshot_mut().positions[0].sl = Some(1.09850);
    h.advance(Duration::minutes(1));
    let report = h.cycle().expect("cycle");
    assert_eq!(report.commands_issued, 1);
    assert_eq!(
        h.commands().last(),
        Some(&Command::ModifySl {
            ticket: 42,
            sl: Some(1.09900)
        })
    );
    assert_eq!(h.status().pending_decisions[0].reapply_attempts, 1);

    // Back in force: the next poll is quiet again.
    h.advance(Duration::minutes(1));
    let report = h.cycle().expect("cycle");
    assert_eq!(report.commands_issued, 0);
}
