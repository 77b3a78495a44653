//! mw-reconcile
//!
//! Mirror reconciliation engine.
//!
//! Compares the authoritative catalog against one mirror catalog and produces
//! a per-project problem report plus a tally of branch verdicts.
//!
//! Deterministic, pure logic. No IO, no clock: the caller supplies "now".

mod engine;
mod types;

pub use engine::{classify_branch, format_epoch, reconcile};
pub use types::*;
