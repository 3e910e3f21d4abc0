//! Deterministic in-memory collaborators.
//!
//! Used by the daemon's paper mode and by scenario tests. No randomness, no
//! wall clock: the platform holds one current snapshot that tests mutate
//! directly, and commands either apply to it or are recorded verbatim.

use chrono::{DateTime, Utc};
use rg_schemas::{NewsEvent, Snapshot};
use std::collections::VecDeque;

use crate::error::EngineError;
use crate::traits::{
    CalendarSource, Command, DecisionPrompt, Notification, Notifier, OperatorReply,
    TradingPlatform,
};

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct SimPlatform {
    snapshot: Snapshot,
    /// Every command the engine issued, in order.
    pub commands: Vec<Command>,
    /// When set, commands mutate the held snapshot so their effect shows up
    /// in the next fetch (idempotence checks rely on this).
    pub apply_commands: bool,
    pub trading_disabled: bool,
    /// Scripted failures.
    pub fail_next_fetch: bool,
    pub fail_commands: bool,
}

impl SimPlatform {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            commands: Vec::new(),
            apply_commands: true,
            trading_disabled: false,
            fail_next_fetch: false,
            fail_commands: false,
        }
    }

    pub fn snapshot_mut(&mut self) -> &mut Snapshot {
        &mut self.snapshot
    }

    pub fn set_snapshot(&mut self, snapshot: Snapshot) {
        self.snapshot = snapshot;
    }

    pub fn commands_of_kind(&self, pred: impl Fn(&Command) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(c)).count()
    }
}

impl TradingPlatform for SimPlatform {
    fn fetch_snapshot(&mut self) -> Result<Snapshot, EngineError> {
        if self.fail_next_fetch {
            self.fail_next_fetch = false;
            return Err(EngineError::Transient("link down".into()));
        }
        Ok(self.snapshot.clone())
    }

    fn execute(&mut self, cmd: &Command) -> Result<(), EngineError> {
        if self.fail_commands {
            return Err(EngineError::Transient("order rejected".into()));
        }
        self.commands.push(cmd.clone());
        if self.apply_commands {
            match cmd {
                Command::ModifySl { ticket, sl } => {
                    if let Some(p) = self
                        .snapshot
                        .positions
                        .iter_mut()
                        .find(|p| p.ticket == *ticket)
                    {
                        p.sl = *sl;
                    }
                }
                Command::ClosePosition { ticket } => {
                    self.snapshot.positions.retain(|p| p.ticket != *ticket);
                }
                Command::DisableTrading => self.trading_disabled = true,
                Command::EnableTrading => self.trading_disabled = false,
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Calendar
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct SimCalendar {
    pub events: Vec<NewsEvent>,
    pub fail: bool,
}

impl SimCalendar {
    pub fn new(events: Vec<NewsEvent>) -> Self {
        Self {
            events,
            fail: false,
        }
    }
}

impl CalendarSource for SimCalendar {
    fn events(&mut self, _now: DateTime<Utc>) -> Result<Vec<NewsEvent>, EngineError> {
        if self.fail {
            return Err(EngineError::Calendar("feed unreachable".into()));
        }
        Ok(self.events.clone())
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct SimNotifier {
    pub notifications: Vec<Notification>,
    pub prompts: Vec<DecisionPrompt>,
    pub queued_replies: VecDeque<OperatorReply>,
    pub unavailable: bool,
}

impl SimNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply to be drained on the next cycle.
    pub fn push_reply(&mut self, reply: OperatorReply) {
        self.queued_replies.push_back(reply);
    }

    pub fn titles(&self) -> Vec<&str> {
        self.notifications.iter().map(|n| n.title.as_str()).collect()
    }
}

impl Notifier for SimNotifier {
    fn notify(&mut self, n: &Notification) -> Result<(), EngineError> {
        if self.unavailable {
            return Err(EngineError::Channel("channel down".into()));
        }
        self.notifications.push(n.clone());
        Ok(())
    }

    fn prompt(&mut self, p: &DecisionPrompt) -> Result<(), EngineError> {
        if self.unavailable {
            return Err(EngineError::Channel("channel down".into()));
        }
        self.prompts.push(p.clone());
        Ok(())
    }

    fn drain_replies(&mut self) -> Vec<OperatorReply> {
        self.queued_replies.drain(..).collect()
    }
}
