//! Orchestrator: drives the pure risk policy crates against the collaborator
//! traits once per poll, owns dedup and the decision lifecycle, and exposes
//! the observable status used by the daemon's HTTP surface.

mod engine;
mod error;
pub mod sim;
mod traits;

pub use engine::{CycleReport, Engine, EngineStatus};
pub use error::EngineError;
pub use traits::{
    CalendarSource, Command, DecisionPrompt, Notification, Notifier, OperatorReply, Severity,
    TradingPlatform,
};
