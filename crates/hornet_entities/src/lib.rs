//! Entity-set modeling for the Hornet fuzzer.
//!
//! This crate provides:
//! - Typed entity-set descriptors built from OData `$metadata` documents
//! - The `$filter` expression tree with its serializer and parser
//! - Randomized query option generators (filter, orderby, top, skip, search)
//! - Restriction files that narrow what the fuzzer may touch
//!
//! # Example
//!
//! ```rust,ignore
//! use hornet_entities::{build_queryables, GeneratorConfig};
//!
//! let queryables = build_queryables(&metadata_xml, None, GeneratorConfig::default())?;
//! let option = queryables[0].query_option(QueryOption::Filter).unwrap();
//! let generated = option.generate(&mut rng);
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod builder;
pub mod error;
pub mod filter;
pub mod generator;
pub mod parser;
pub mod property;
pub mod queryable;
pub mod restrictions;

pub use builder::build_queryables;
pub use error::{Error, Result};
pub use filter::{build_filter_string, CompareOp, FilterGroup, FilterPart, FilterTree, Logical};
pub use generator::GeneratorConfig;
pub use parser::parse_filter;
pub use property::{EntityProperty, PropertyKind};
pub use queryable::{EntitySet, EntityTarget, GeneratedOption, OptionValue, QueryOption, Queryable};
pub use restrictions::Restrictions;
