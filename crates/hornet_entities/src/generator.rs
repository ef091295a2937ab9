//! Randomized synthesis of query option values.
//!
//! Operand generation is driven by the property kind; function families are
//! weighted by the configured probabilities so string functions dominate the
//! way real OData abuse does.

use crate::filter::{CompareOp, FilterGroup, FilterPart, FilterTree, Logical};
use crate::property::{EntityProperty, PropertyKind};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Probabilities and bounds consumed by the generators.
///
/// Passed through verbatim from the fuzzer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Probability a string-typed part uses a string function.
    pub string_func_prob: f64,
    /// Probability a numeric part uses a math function.
    pub math_func_prob: f64,
    /// Probability a date part uses a date function.
    pub date_func_prob: f64,
    /// Probability a generated query addresses a single entity.
    pub single_entity_prob: f64,
    /// Probability a single-entity key value is type-mutated.
    pub key_mutation_prob: f64,
    /// Probability a filter tree carries a parenthesized group.
    pub group_prob: f64,
    /// Maximum number of top-level filter parts per tree.
    pub max_filter_parts: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            string_func_prob: 0.70,
            math_func_prob: 0.15,
            date_func_prob: 0.15,
            single_entity_prob: 0.05,
            key_mutation_prob: 0.05,
            group_prob: 0.10,
            max_filter_parts: 4,
        }
    }
}

fn pick<T: Copy>(items: &[T], rng: &mut impl Rng) -> T {
    items[rng.gen_range(0..items.len())]
}

fn random_logical(rng: &mut impl Rng) -> Logical {
    if rng.gen_bool(0.5) {
        Logical::And
    } else {
        Logical::Or
    }
}

fn random_string(rng: &mut impl Rng, max_length: Option<u16>) -> String {
    let cap = max_length.map_or(20, |m| usize::from(m).clamp(1, 20));
    let len = rng.gen_range(1..=cap);
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn quoted(value: &str) -> String {
    format!("'{value}'")
}

fn random_int_literal(rng: &mut impl Rng) -> String {
    match rng.gen_range(0..6) {
        0 => "0".to_string(),
        1 => "-1".to_string(),
        2 => i32::MAX.to_string(),
        3 => i32::MIN.to_string(),
        4 => rng.gen_range(-1000i64..=1000).to_string(),
        _ => rng.gen::<i64>().to_string(),
    }
}

fn random_decimal_literal(rng: &mut impl Rng) -> String {
    format!("{}.{:02}m", rng.gen_range(-9999i32..=9999), rng.gen_range(0..100))
}

fn random_double_literal(rng: &mut impl Rng) -> String {
    format!("{}.{:02}d", rng.gen_range(-9999i32..=9999), rng.gen_range(0..100))
}

fn random_datetime_literal(rng: &mut impl Rng) -> String {
    format!(
        "datetime'{:04}-{:02}-{:02}T{:02}:{:02}:{:02}'",
        rng.gen_range(1900..=2050),
        rng.gen_range(1..=12),
        rng.gen_range(1..=28),
        rng.gen_range(0..24),
        rng.gen_range(0..60),
        rng.gen_range(0..60)
    )
}

fn random_guid_literal(rng: &mut impl Rng) -> String {
    format!(
        "guid'{:08x}-{:04x}-{:04x}-{:04x}-{:012x}'",
        rng.gen::<u32>(),
        rng.gen::<u16>(),
        rng.gen::<u16>(),
        rng.gen::<u16>(),
        rng.gen::<u64>() & 0xffff_ffff_ffff
    )
}

fn random_bool_literal(rng: &mut impl Rng) -> String {
    if rng.gen_bool(0.5) { "true" } else { "false" }.to_string()
}

fn string_function_part(
    name: &str,
    max_length: Option<u16>,
    rng: &mut impl Rng,
) -> FilterPart {
    let value = random_string(rng, max_length);
    match rng.gen_range(0..9) {
        0 => FilterPart::new(
            format!("startswith({name},{})", quoted(&value)),
            pick(&CompareOp::EQUALITY, rng),
            random_bool_literal(rng),
        ),
        1 => FilterPart::new(
            format!("endswith({name},{})", quoted(&value)),
            pick(&CompareOp::EQUALITY, rng),
            random_bool_literal(rng),
        ),
        2 => FilterPart::new(
            format!("substringof({},{name})", quoted(&value)),
            pick(&CompareOp::EQUALITY, rng),
            random_bool_literal(rng),
        ),
        3 => FilterPart::new(
            format!("length({name})"),
            pick(&CompareOp::ALL, rng),
            rng.gen_range(0..=200).to_string(),
        ),
        4 => FilterPart::new(
            format!("tolower({name})"),
            pick(&CompareOp::EQUALITY, rng),
            quoted(&value.to_lowercase()),
        ),
        5 => FilterPart::new(
            format!("toupper({name})"),
            pick(&CompareOp::EQUALITY, rng),
            quoted(&value.to_uppercase()),
        ),
        6 => FilterPart::new(
            format!("trim({name})"),
            pick(&CompareOp::EQUALITY, rng),
            quoted(&value),
        ),
        7 => FilterPart::new(
            format!("indexof({name},{})", quoted(&value)),
            pick(&CompareOp::ALL, rng),
            rng.gen_range(-1..=50).to_string(),
        ),
        _ => FilterPart::new(
            format!(
                "replace({name},{},{})",
                quoted(&value),
                quoted(&random_string(rng, max_length))
            ),
            pick(&CompareOp::EQUALITY, rng),
            quoted(&random_string(rng, max_length)),
        ),
    }
}

fn math_function_part(name: &str, rng: &mut impl Rng) -> FilterPart {
    let func = pick(&["round", "floor", "ceiling"], rng);
    FilterPart::new(
        format!("{func}({name})"),
        pick(&CompareOp::ALL, rng),
        rng.gen_range(-1000i32..=1000).to_string(),
    )
}

fn date_function_part(name: &str, rng: &mut impl Rng) -> FilterPart {
    let (func, upper) = pick(
        &[
            ("year", 2100),
            ("month", 12),
            ("day", 31),
            ("hour", 23),
            ("minute", 59),
            ("second", 59),
        ],
        rng,
    );
    FilterPart::new(
        format!("{func}({name})"),
        pick(&CompareOp::ALL, rng),
        rng.gen_range(0..=upper).to_string(),
    )
}

/// Synthesizes one filter part for a random property from `props`.
///
/// `props` must be non-empty and contain only filterable properties.
pub(crate) fn random_part(
    props: &[&EntityProperty],
    config: &GeneratorConfig,
    rng: &mut impl Rng,
) -> FilterPart {
    let prop = props[rng.gen_range(0..props.len())];
    match prop.kind {
        PropertyKind::Str { max_length } => {
            if rng.gen_bool(config.string_func_prob) {
                string_function_part(&prop.name, max_length, rng)
            } else {
                FilterPart::new(
                    &prop.name,
                    pick(&CompareOp::ALL, rng),
                    quoted(&random_string(rng, max_length)),
                )
            }
        }
        PropertyKind::Int => FilterPart::new(
            &prop.name,
            pick(&CompareOp::ALL, rng),
            random_int_literal(rng),
        ),
        PropertyKind::Decimal => {
            if rng.gen_bool(config.math_func_prob) {
                math_function_part(&prop.name, rng)
            } else {
                FilterPart::new(
                    &prop.name,
                    pick(&CompareOp::ALL, rng),
                    random_decimal_literal(rng),
                )
            }
        }
        PropertyKind::Double => {
            if rng.gen_bool(config.math_func_prob) {
                math_function_part(&prop.name, rng)
            } else {
                FilterPart::new(
                    &prop.name,
                    pick(&CompareOp::ALL, rng),
                    random_double_literal(rng),
                )
            }
        }
        PropertyKind::DateTime => {
            if rng.gen_bool(config.date_func_prob) {
                date_function_part(&prop.name, rng)
            } else {
                FilterPart::new(
                    &prop.name,
                    pick(&CompareOp::ALL, rng),
                    random_datetime_literal(rng),
                )
            }
        }
        PropertyKind::Guid => FilterPart::new(
            &prop.name,
            pick(&CompareOp::EQUALITY, rng),
            random_guid_literal(rng),
        ),
        // `Other` never reaches here; non-filterable kinds are filtered out
        // before part synthesis.
        PropertyKind::Bool | PropertyKind::Other => FilterPart::new(
            &prop.name,
            pick(&CompareOp::EQUALITY, rng),
            random_bool_literal(rng),
        ),
    }
}

/// Synthesizes a whole filter tree over `props`.
pub(crate) fn random_filter_tree(
    props: &[&EntityProperty],
    config: &GeneratorConfig,
    rng: &mut impl Rng,
) -> FilterTree {
    let mut tree = FilterTree::default();

    if rng.gen_bool(config.group_prob) {
        let mut group = FilterGroup::default();
        let group_parts = rng.gen_range(1..=2);
        for i in 0..group_parts {
            if i > 0 {
                group.logicals.push(random_logical(rng));
            }
            group.parts.push(random_part(props, config, rng));
        }
        tree.groups.push(group);
    }

    let parts_num = rng.gen_range(1..=config.max_filter_parts.max(1));
    for _ in 0..parts_num {
        tree.parts.push(random_part(props, config, rng));
    }

    let items = tree.groups.len() + tree.parts.len();
    for _ in 1..items {
        tree.logicals.push(random_logical(rng));
    }
    tree
}

/// Synthesizes an `$orderby` value over `props`.
pub(crate) fn random_orderby(props: &[&EntityProperty], rng: &mut impl Rng) -> String {
    let count = rng.gen_range(1..=props.len().min(2));
    let mut chosen: Vec<&str> = Vec::with_capacity(count);
    while chosen.len() < count {
        let candidate = props[rng.gen_range(0..props.len())].name.as_str();
        if !chosen.contains(&candidate) {
            chosen.push(candidate);
        }
    }
    chosen
        .into_iter()
        .map(|name| {
            let direction = pick(&[" asc", " desc"], rng);
            format!("{name}{direction}")
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Synthesizes a `$top` or `$skip` value, biased toward boundary counts.
pub(crate) fn random_count(rng: &mut impl Rng) -> u32 {
    match rng.gen_range(0..6) {
        0 => 0,
        1 => 1,
        2 => 100,
        3 => 99_999_999,
        _ => rng.gen_range(0..1_000_000),
    }
}

/// Synthesizes a `search` value.
pub(crate) fn random_search(rng: &mut impl Rng) -> String {
    random_string(rng, Some(10))
}

/// Renders one key value for a single-entity accessor.
pub(crate) fn render_key_value(
    prop: &EntityProperty,
    config: &GeneratorConfig,
    rng: &mut impl Rng,
) -> String {
    let mutate = rng.gen_bool(config.key_mutation_prob);
    match prop.kind {
        PropertyKind::Str { max_length } => {
            let value = random_string(rng, max_length);
            // Mutation drops the quotes, handing the server a bare token
            // where it expects a string literal.
            if mutate {
                value
            } else {
                quoted(&value)
            }
        }
        PropertyKind::Int | PropertyKind::Decimal | PropertyKind::Double => {
            let value = random_int_literal(rng);
            if mutate {
                quoted(&value)
            } else {
                value
            }
        }
        PropertyKind::Guid => {
            if mutate {
                quoted(&random_string(rng, Some(8)))
            } else {
                random_guid_literal(rng)
            }
        }
        PropertyKind::DateTime => random_datetime_literal(rng),
        PropertyKind::Bool | PropertyKind::Other => random_bool_literal(rng),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn props() -> Vec<EntityProperty> {
        vec![
            EntityProperty::new("Name", PropertyKind::Str { max_length: Some(10) }),
            EntityProperty::new("Price", PropertyKind::Decimal),
            EntityProperty::new("Created", PropertyKind::DateTime),
            EntityProperty::new("Id", PropertyKind::Guid),
        ]
    }

    #[test]
    fn tree_invariant_holds_across_seeds() {
        let owned = props();
        let refs: Vec<&EntityProperty> = owned.iter().collect();
        let config = GeneratorConfig::default();
        for seed in 0..200 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let tree = random_filter_tree(&refs, &config, &mut rng);
            let items = tree.groups.len() + tree.parts.len();
            assert!(items >= 1);
            assert_eq!(tree.logicals.len(), items - 1, "seed {seed}");
            assert!(!tree.parts.is_empty(), "at least one top-level part");
        }
    }

    #[test]
    fn generated_trees_serialize_non_empty() {
        let owned = props();
        let refs: Vec<&EntityProperty> = owned.iter().collect();
        let config = GeneratorConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            let tree = random_filter_tree(&refs, &config, &mut rng);
            assert!(!crate::filter::build_filter_string(&tree).is_empty());
        }
    }

    #[test]
    fn orderby_names_are_distinct() {
        let owned = props();
        let refs: Vec<&EntityProperty> = owned.iter().collect();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..50 {
            let orderby = random_orderby(&refs, &mut rng);
            let names: Vec<&str> = orderby
                .split(',')
                .map(|c| c.rsplit_once(' ').map_or(c, |(n, _)| n))
                .collect();
            let mut deduped = names.clone();
            deduped.dedup();
            assert_eq!(names.len(), deduped.len());
        }
    }

    #[test]
    fn key_values_render_by_kind() {
        let config = GeneratorConfig {
            key_mutation_prob: 0.0,
            ..GeneratorConfig::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let guid = EntityProperty::new("Id", PropertyKind::Guid).as_key();
        assert!(render_key_value(&guid, &config, &mut rng).starts_with("guid'"));

        let name = EntityProperty::new("Name", PropertyKind::Str { max_length: Some(4) }).as_key();
        let rendered = render_key_value(&name, &config, &mut rng);
        assert!(rendered.starts_with('\'') && rendered.ends_with('\''));
    }
}
