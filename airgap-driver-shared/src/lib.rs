//! Air-gap driver shared code.
//!
//! This crate contains the error taxonomy and the well-known names used by
//! both the distribution drivers and the orchestrator that sequences them.

pub mod constants;
pub mod errors;

pub use errors::{DriverError, DriverResult, ResolveFailure, ResolveFailureKind};
