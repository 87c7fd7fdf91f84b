//! Canonical data models.
//!
//! This module contains the normalized ticket and attendant records
//! produced by the reconciliation engine, and the aggregate dashboard
//! statistics computed from them.

mod attendant;
mod stats;
mod ticket;

pub use attendant::*;
pub use stats::*;
pub use ticket::*;
