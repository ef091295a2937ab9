//! Query population management for the Hornet fuzzer.
//!
//! This crate provides:
//! - The [`Query`] individual: options, serialized string, response, score
//! - The [`CorpusStore`]: bucketed persistence with dedup, sampling and
//!   pruning
//! - CSV report rows over the stored population

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod query;
pub mod report;
pub mod store;

pub use error::{Error, Result};
pub use query::{Query, QueryOptions};
pub use store::{BucketKey, CorpusStore};
