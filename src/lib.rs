//! Reconciliation of synthetic energy inputs with polled energy-management API snapshots.
//!
//! Synthetic load and solar series are keyed by UTC time of day, each API
//! snapshot is flattened and keyed by its report time floored to the minute,
//! and the two tables are joined on that key.

pub mod align;
pub mod cli;
pub mod config;
pub mod error;
/// Snapshot flattening and the subsystem projection table.
pub mod extract;
pub mod io;
pub mod plot;
/// Time-of-day join and key deduplication.
pub mod reconcile;
pub mod report;
pub mod runner;
/// Synthetic load/solar CSV loading.
pub mod synthetic;

pub use error::{ReconcileError, Result};
