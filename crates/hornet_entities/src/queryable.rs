//! Queryable entity-set descriptors.
//!
//! A [`Queryable`] couples an entity set with the generator configuration and
//! hands out per-option generators. Queryables are built once at startup and
//! never change afterwards.

use crate::filter::FilterTree;
use crate::generator::{self, GeneratorConfig};
use crate::property::EntityProperty;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// An entity set together with the properties of its entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySet {
    /// Entity set name, unique within the service.
    pub name: String,
    /// Name of the backing entity type.
    pub entity_type: String,
    /// Ordered properties of the entity type.
    pub properties: Vec<EntityProperty>,
}

impl EntitySet {
    /// Creates an empty entity set.
    #[must_use]
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            properties: Vec::new(),
        }
    }

    /// Adds a property.
    #[must_use]
    pub fn with_property(mut self, property: EntityProperty) -> Self {
        self.properties.push(property);
        self
    }

    /// Properties the generators can build filter operands for.
    #[must_use]
    pub fn filterable_properties(&self) -> Vec<&EntityProperty> {
        self.properties
            .iter()
            .filter(|p| p.kind.is_filterable())
            .collect()
    }

    /// Key properties, in declaration order.
    pub fn key_properties(&self) -> impl Iterator<Item = &EntityProperty> {
        self.properties.iter().filter(|p| p.is_key)
    }
}

/// The query options the fuzzer knows how to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryOption {
    /// `$filter`
    Filter,
    /// `$orderby`
    OrderBy,
    /// `$top`
    Top,
    /// `$skip`
    Skip,
    /// `$expand`
    Expand,
    /// `search` (SAP extension, no `$` prefix)
    Search,
}

impl QueryOption {
    /// The option key as it appears in the URL.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Filter => "$filter",
            Self::OrderBy => "$orderby",
            Self::Top => "$top",
            Self::Skip => "$skip",
            Self::Expand => "$expand",
            Self::Search => "search",
        }
    }
}

/// A structured query option value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OptionValue {
    /// A `$filter` tree.
    Filter(FilterTree),
    /// Rendered `$orderby` clause.
    OrderBy(String),
    /// `$top` count.
    Top(u32),
    /// `$skip` count.
    Skip(u32),
    /// Rendered `$expand` path list.
    Expand(String),
    /// Free-text `search` term.
    Search(String),
}

/// One generated option value plus its URL rendering.
#[derive(Debug, Clone)]
pub struct GeneratedOption {
    /// Structured value, stored on the query for later mating.
    pub value: OptionValue,
    /// Serialized form placed after `<key>=` in the query string.
    pub option_string: String,
}

/// Where a generated query points: the whole set, or one entity of it.
#[derive(Debug, Clone)]
pub struct EntityTarget {
    /// URL path segment, e.g. `Customers` or `Customers(guid'...')`.
    pub path: String,
    /// Rendered key values when addressing a single entity.
    pub accessible_keys: Option<String>,
}

/// An entity set the fuzzer can generate queries against.
#[derive(Debug, Clone)]
pub struct Queryable {
    entity_set: EntitySet,
    config: GeneratorConfig,
}

impl Queryable {
    /// Creates a queryable for `entity_set`.
    #[must_use]
    pub const fn new(entity_set: EntitySet, config: GeneratorConfig) -> Self {
        Self { entity_set, config }
    }

    /// The underlying entity set.
    #[must_use]
    pub const fn entity_set(&self) -> &EntitySet {
        &self.entity_set
    }

    /// Entity set name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.entity_set.name
    }

    /// Returns the generator for `option`, or `None` when the entity set
    /// cannot support it (no filterable properties, or navigation paths that
    /// are not modeled).
    #[must_use]
    pub fn query_option(&self, option: QueryOption) -> Option<OptionGenerator<'_>> {
        let supported = match option {
            QueryOption::Filter => !self.entity_set.filterable_properties().is_empty(),
            QueryOption::OrderBy => !self.entity_set.properties.is_empty(),
            QueryOption::Top | QueryOption::Skip | QueryOption::Search => true,
            // Navigation properties are not modeled; $expand is never generated.
            QueryOption::Expand => false,
        };
        supported.then_some(OptionGenerator {
            queryable: self,
            option,
        })
    }

    /// Picks the dispatch target: usually the whole set, occasionally a
    /// single entity addressed by (possibly mutated) key values.
    pub fn target(&self, rng: &mut impl Rng) -> EntityTarget {
        let keys: Vec<&EntityProperty> = self.entity_set.key_properties().collect();
        if !keys.is_empty() && rng.gen_bool(self.config.single_entity_prob) {
            let rendered: Vec<(String, String)> = keys
                .iter()
                .map(|k| {
                    (
                        k.name.clone(),
                        generator::render_key_value(k, &self.config, rng),
                    )
                })
                .collect();
            let accessor = if rendered.len() == 1 {
                format!("{}({})", self.entity_set.name, rendered[0].1)
            } else {
                let pairs: Vec<String> = rendered
                    .iter()
                    .map(|(name, value)| format!("{name}={value}"))
                    .collect();
                format!("{}({})", self.entity_set.name, pairs.join(","))
            };
            let keys_desc = rendered
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join(",");
            return EntityTarget {
                path: accessor,
                accessible_keys: Some(keys_desc),
            };
        }
        EntityTarget {
            path: self.entity_set.name.clone(),
            accessible_keys: None,
        }
    }
}

/// Generator handle for one query option of one queryable.
#[derive(Debug)]
pub struct OptionGenerator<'a> {
    queryable: &'a Queryable,
    option: QueryOption,
}

impl OptionGenerator<'_> {
    /// The option this generator produces.
    #[must_use]
    pub const fn option(&self) -> QueryOption {
        self.option
    }

    /// Synthesizes one option value.
    pub fn generate(&self, rng: &mut impl Rng) -> GeneratedOption {
        let set = &self.queryable.entity_set;
        let config = &self.queryable.config;
        match self.option {
            QueryOption::Filter => {
                let props = set.filterable_properties();
                let tree = generator::random_filter_tree(&props, config, rng);
                let option_string = crate::filter::build_filter_string(&tree);
                GeneratedOption {
                    value: OptionValue::Filter(tree),
                    option_string,
                }
            }
            // Unsupported options never hand out a generator; an empty
            // expand keeps the match total.
            QueryOption::Expand => GeneratedOption {
                value: OptionValue::Expand(String::new()),
                option_string: String::new(),
            },
            QueryOption::OrderBy => {
                let props: Vec<&EntityProperty> = set.properties.iter().collect();
                let clause = generator::random_orderby(&props, rng);
                GeneratedOption {
                    value: OptionValue::OrderBy(clause.clone()),
                    option_string: clause,
                }
            }
            QueryOption::Top => {
                let count = generator::random_count(rng);
                GeneratedOption {
                    value: OptionValue::Top(count),
                    option_string: count.to_string(),
                }
            }
            QueryOption::Skip => {
                let count = generator::random_count(rng);
                GeneratedOption {
                    value: OptionValue::Skip(count),
                    option_string: count.to_string(),
                }
            }
            QueryOption::Search => {
                let term = generator::random_search(rng);
                GeneratedOption {
                    value: OptionValue::Search(term.clone()),
                    option_string: term,
                }
            }
        }
    }
}
