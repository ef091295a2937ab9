//! HTTP dispatch for the Hornet fuzzer.
//!
//! This crate provides:
//! - A reusable, authenticated session against one OData service root
//! - Optional TLS trust material loaded from a conventional path
//! - Classified outcomes carrying status, OData error fields and timing
//!
//! The dispatcher never retries; retry discipline belongs to the evolution
//! driver.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod client;
pub mod error;
pub mod response;

pub use client::{Credentials, Dispatch, Dispatcher, DispatcherConfig};
pub use error::{Error, Result};
pub use response::Outcome;
