//! The query individual.

use hornet_dispatch::Outcome;
use hornet_entities::{FilterTree, OptionValue, QueryOption};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Structured option values attached to a query.
///
/// One slot per option kind; a slot is `None` until a generator fills it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct QueryOptions {
    /// `$filter` tree.
    pub filter: Option<FilterTree>,
    /// `$orderby` clause.
    pub orderby: Option<String>,
    /// `$top` count.
    pub top: Option<u32>,
    /// `$skip` count.
    pub skip: Option<u32>,
    /// `$expand` path list.
    pub expand: Option<String>,
    /// `search` term.
    pub search: Option<String>,
}

impl QueryOptions {
    /// Stores `value` in its slot, replacing any previous value.
    pub fn set(&mut self, value: OptionValue) {
        match value {
            OptionValue::Filter(tree) => self.filter = Some(tree),
            OptionValue::OrderBy(clause) => self.orderby = Some(clause),
            OptionValue::Top(count) => self.top = Some(count),
            OptionValue::Skip(count) => self.skip = Some(count),
            OptionValue::Expand(path) => self.expand = Some(path),
            OptionValue::Search(term) => self.search = Some(term),
        }
    }

    /// Sum of the URL key lengths of all set options (`$filter` counts 7,
    /// `search` counts 6, ...). Used by the fitness length computation.
    #[must_use]
    pub fn keys_len(&self) -> usize {
        let mut len = 0;
        if self.filter.is_some() {
            len += QueryOption::Filter.key().len();
        }
        if self.orderby.is_some() {
            len += QueryOption::OrderBy.key().len();
        }
        if self.top.is_some() {
            len += QueryOption::Top.key().len();
        }
        if self.skip.is_some() {
            len += QueryOption::Skip.key().len();
        }
        if self.expand.is_some() {
            len += QueryOption::Expand.key().len();
        }
        if self.search.is_some() {
            len += QueryOption::Search.key().len();
        }
        len
    }
}

/// One individual of the population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Unique identifier, assigned at construction.
    pub id: Uuid,
    /// Target entity set.
    pub entity_name: String,
    /// Rendered key values when the query addresses a single entity.
    pub accessible_keys: Option<String>,
    /// Structured option values.
    pub options: QueryOptions,
    /// The serialized URL path+query actually dispatched. Kept consistent
    /// with `options`: whoever changes the options rebuilds the string.
    pub query_string: String,
    /// Response attached after dispatch.
    pub response: Option<Outcome>,
    /// Fitness, assigned exactly once by the analyzer.
    pub score: Option<i64>,
    /// Parent query ids; empty for seed individuals.
    pub predecessors: Vec<Uuid>,
}

impl Query {
    /// Creates a fresh query against `entity_name`.
    #[must_use]
    pub fn new(entity_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_name: entity_name.into(),
            accessible_keys: None,
            options: QueryOptions::default(),
            query_string: String::new(),
            response: None,
            score: None,
            predecessors: Vec::new(),
        }
    }

    /// Stores an option value.
    pub fn add_option(&mut self, value: OptionValue) {
        self.options.set(value);
    }

    /// Records a parent id.
    pub fn add_predecessor(&mut self, id: Uuid) {
        self.predecessors.push(id);
    }

    /// The filter tree, if the query has one.
    #[must_use]
    pub fn filter(&self) -> Option<&FilterTree> {
        self.options.filter.as_ref()
    }

    /// Number of top-level filter parts; 0 without a filter.
    #[must_use]
    pub fn filter_parts_len(&self) -> usize {
        self.filter().map_or(0, FilterTree::parts_len)
    }

    /// HTTP status of the attached response, if any.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hornet_entities::{CompareOp, FilterPart};

    #[test]
    fn ids_are_unique() {
        let a = Query::new("Customers");
        let b = Query::new("Customers");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn option_key_lengths_sum_over_set_slots() {
        let mut query = Query::new("Customers");
        assert_eq!(query.options.keys_len(), 0);

        query.add_option(OptionValue::Filter(FilterTree::single(FilterPart::new(
            "Name",
            CompareOp::Eq,
            "'x'",
        ))));
        assert_eq!(query.options.keys_len(), "$filter".len());

        query.add_option(OptionValue::Top(5));
        query.add_option(OptionValue::Search("abc".to_string()));
        assert_eq!(
            query.options.keys_len(),
            "$filter".len() + "$top".len() + "search".len()
        );
    }

    #[test]
    fn filter_parts_len_defaults_to_zero() {
        let query = Query::new("Orders");
        assert_eq!(query.filter_parts_len(), 0);
    }
}
