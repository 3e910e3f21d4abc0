//! Pure risk policy: violation evaluation, the drawdown kill switch, and the
//! aggregate exposure tracker.
//!
//! Nothing in this crate performs IO or reads the clock; the orchestrator
//! threads `now`, the snapshot, and sticky state through every call, which
//! keeps each rule unit-testable with a hand-built context.

mod aggregate;
mod evaluator;
mod kill;
mod types;

pub use aggregate::AggregateRisk;
pub use evaluator::{evaluate, required_sl_for_limit, EvalInput};
pub use kill::{KillSwitch, KillSwitchState, TripEvent};
pub use types::{Violation, EPSILON_PCT};
