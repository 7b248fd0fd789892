//! Outcome tracking for individual fetch/parse units
//!
//! Per-unit failures never abort an index or database run. They are collected
//! into reports keyed by the unit that failed.
//!
//! # Components
//!
//! - `FailureKind`: why a single page or review could not be processed
//! - `Failure`: a `FailureKind` together with its ISBN context
//! - `FailureReport`: review ID → failure, returned alongside built data

mod failure;

pub use failure::{Failure, FailureKind, FailureReport};
