//! rg-daemon library target.
//!
//! Exposes the router, shared state, and paper-mode wiring so integration
//! tests can compose the daemon in-process. The binary `main.rs` depends on
//! this library target.

pub mod paper;
pub mod routes;
pub mod state;
