//! Breeding: fresh generation and crossover.
//!
//! Both produce a batch per call; the batch size equals the worker-pool size
//! in concurrent mode and one in serial mode. Crossover mates the same
//! parent pair for the whole batch, so siblings differ only by the
//! randomized part index.

use hornet_corpus::Query;
use hornet_entities::{build_filter_string, OptionValue, QueryOption, Queryable};
use rand::Rng;
use tracing::debug;

/// Generates one fresh query, or nothing when the queryable has no
/// `$filter` generator.
pub fn generate_query(queryable: &Queryable, rng: &mut impl Rng) -> Option<Query> {
    let generator = queryable.query_option(QueryOption::Filter)?;
    let target = queryable.target(rng);
    let generated = generator.generate(rng);

    let mut query = Query::new(queryable.name());
    query.accessible_keys = target.accessible_keys;
    query.query_string = format!(
        "{}?{}={}",
        target.path,
        QueryOption::Filter.key(),
        generated.option_string
    );
    query.add_option(generated.value);
    Some(query)
}

/// Generates a batch of fresh queries.
pub fn generate_batch(
    queryable: &Queryable,
    batch_size: usize,
    rng: &mut impl Rng,
) -> Vec<Query> {
    let batch: Vec<Query> = (0..batch_size)
        .filter_map(|_| generate_query(queryable, rng))
        .collect();
    if batch.is_empty() {
        debug!("queryable {} yields no queries", queryable.name());
    }
    batch
}

/// Mates two parents into one child.
///
/// The child inherits the first parent's tree; one random part is
/// overwritten with a random part of the second parent. Both parent ids are
/// recorded as predecessors. Parents without filter parts yield nothing.
pub fn crossover_queries(
    parent1: &Query,
    parent2: &Query,
    entity_name: &str,
    rng: &mut impl Rng,
) -> Option<Query> {
    let base = parent1.filter()?;
    let donor = parent2.filter()?;
    if base.parts.is_empty() || donor.parts.is_empty() {
        return None;
    }

    let mut tree = base.clone();
    let replace_at = rng.gen_range(0..tree.parts.len());
    let donor_part = donor.parts[rng.gen_range(0..donor.parts.len())].clone();
    tree.parts[replace_at] = donor_part;

    let option_string = build_filter_string(&tree);
    let mut child = Query::new(entity_name);
    child.query_string = format!(
        "{entity_name}?{}={option_string}",
        QueryOption::Filter.key()
    );
    child.add_option(OptionValue::Filter(tree));
    child.add_predecessor(parent1.id);
    child.add_predecessor(parent2.id);
    Some(child)
}

/// Mates the same parent pair `batch_size` times.
pub fn crossover_batch(
    parents: &(Query, Query),
    entity_name: &str,
    batch_size: usize,
    rng: &mut impl Rng,
) -> Vec<Query> {
    (0..batch_size)
        .filter_map(|_| crossover_queries(&parents.0, &parents.1, entity_name, rng))
        .collect()
}
