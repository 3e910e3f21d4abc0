//! News blackout guard.
//!
//! Deterministic, pure logic. No IO, no wall-clock: callers pass `now` and
//! the cached event set explicitly.
//!
//! # Semantics
//!
//! A blackout is active when `now` lies within `window` before or after any
//! event's scheduled time (symmetric, closed interval). Overlapping windows
//! collapse into one continuous blackout — the query is a union over
//! intervals, so re-triggering never happens. An empty event set means no
//! blackout: availability fails open; the orchestrator logs the degraded
//! calendar separately.

use chrono::{DateTime, Duration, Utc};
use rg_schemas::NewsEvent;
use std::collections::BTreeSet;

/// `true` if `now ∈ [t − window, t + window]` for any event time `t`.
pub fn in_blackout(now: DateTime<Utc>, events: &[NewsEvent], window: Duration) -> bool {
    events
        .iter()
        .any(|e| e.scheduled_at - window <= now && now <= e.scheduled_at + window)
}

/// End of the current blackout: the latest `t + window` among events whose
/// window covers `now`. `None` when no blackout is active.
pub fn blackout_until(
    now: DateTime<Utc>,
    events: &[NewsEvent],
    window: Duration,
) -> Option<DateTime<Utc>> {
    events
        .iter()
        .filter(|e| e.scheduled_at - window <= now && now <= e.scheduled_at + window)
        .map(|e| e.scheduled_at + window)
        .max()
}

/// Home currency of common index CFD symbols, which carry no currency code
/// of their own.
const INDEX_CURRENCIES: &[(&str, &str)] = &[
    ("US30", "USD"),
    ("US100", "USD"),
    ("US500", "USD"),
    ("NAS", "USD"),
    ("SPX", "USD"),
    ("DJ", "USD"),
    ("DE30", "EUR"),
    ("DE40", "EUR"),
    ("DAX", "EUR"),
    ("GER", "EUR"),
    ("UK100", "GBP"),
    ("FTSE", "GBP"),
    ("JP225", "JPY"),
    ("JPN", "JPY"),
    ("NIK", "JPY"),
    ("AUS200", "AUD"),
];

/// Currencies an instrument symbol exposes.
///
/// FX pairs split into base and quote ("EURUSD" → {EUR, USD}); index CFDs
/// map to their home currency ("US30" → {USD}); anything else is attributed
/// to its trailing currency code when that is alphabetic ("XAGEUR" → {EUR}).
pub fn symbol_currencies(symbol: &str) -> BTreeSet<String> {
    let s = symbol.trim().to_ascii_uppercase();
    let mut out = BTreeSet::new();
    if s.len() >= 6 && s.is_char_boundary(6) {
        let (base, quote) = (&s[0..3], &s[3..6]);
        if base.chars().all(|c| c.is_ascii_alphabetic())
            && quote.chars().all(|c| c.is_ascii_alphabetic())
        {
            out.insert(base.to_string());
            out.insert(quote.to_string());
            return out;
        }
    }
    for (prefix, currency) in INDEX_CURRENCIES {
        if s.starts_with(prefix) {
            out.insert((*currency).to_string());
            return out;
        }
    }
    if s.len() >= 3 && s.is_char_boundary(s.len() - 3) {
        let tail = &s[s.len() - 3..];
        if tail.chars().all(|c| c.is_ascii_alphabetic()) {
            out.insert(tail.to_string());
        }
    }
    out
}

/// Events relevant to a symbol: currency matches, or the event is global.
pub fn events_for_symbol<'a>(events: &'a [NewsEvent], symbol: &str) -> Vec<&'a NewsEvent> {
    let currencies = symbol_currencies(symbol);
    events
        .iter()
        .filter(|e| match &e.currency {
            Some(c) => currencies.contains(&c.to_ascii_uppercase()),
            None => true,
        })
        .collect()
}

/// Blackout check restricted to events relevant to `symbol`.
pub fn symbol_in_blackout(
    now: DateTime<Utc>,
    events: &[NewsEvent],
    symbol: &str,
    window: Duration,
) -> bool {
    events_for_symbol(events, symbol)
        .into_iter()
        .any(|e| e.scheduled_at - window <= now && now <= e.scheduled_at + window)
}
