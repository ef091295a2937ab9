//! The corpus store.
//!
//! Buckets the population by `(entity_set, error_code)` and keeps the
//! aggregates the selector needs in O(1). Reads take `&self` and may happen
//! concurrently; all writes are issued from the single driver thread.

use crate::query::Query;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};
use uuid::Uuid;

/// Corpus bucket key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    /// Entity set of the bucketed queries.
    pub entity_set: String,
    /// Error code shared by the bucketed queries (`None` for clean runs).
    pub error_code: Option<String>,
}

#[derive(Debug, Default)]
struct Bucket {
    queries: Vec<Query>,
    strings: HashSet<String>,
}

/// In-process population store.
#[derive(Debug, Default)]
pub struct CorpusStore {
    buckets: HashMap<BucketKey, Bucket>,
    overall_score: i64,
    total_queries: usize,
}

impl CorpusStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Persists a query.
    ///
    /// Inserts a new bucket for an unseen `(entity_set, error_code)` key,
    /// otherwise appends, unless a query with the same serialized string
    /// already sits in that bucket. Returns false when the query was
    /// deduplicated away (or carried no response yet, which callers never
    /// do on the persistence path).
    pub fn save(&mut self, query: Query) -> bool {
        let Some(response) = query.response.as_ref() else {
            warn!("refusing to persist a query without a response");
            return false;
        };
        let key = BucketKey {
            entity_set: query.entity_name.clone(),
            error_code: response.error_code.clone(),
        };
        let bucket = self.buckets.entry(key).or_default();
        if bucket.strings.contains(&query.query_string) {
            debug!("duplicate query string in bucket, skipping: {}", query.query_string);
            return false;
        }
        bucket.strings.insert(query.query_string.clone());
        self.overall_score += query.score.unwrap_or(0);
        self.total_queries += 1;
        bucket.queries.push(query);
        true
    }

    /// Finds a query by id across all buckets.
    #[must_use]
    pub fn query_by_id(&self, id: Uuid) -> Option<&Query> {
        self.iter().find(|q| q.id == id)
    }

    /// Sum of all stored scores.
    #[must_use]
    pub const fn overall_score(&self) -> i64 {
        self.overall_score
    }

    /// Number of stored queries.
    #[must_use]
    pub const fn total_queries(&self) -> usize {
        self.total_queries
    }

    /// Iterates over every stored query.
    pub fn iter(&self) -> impl Iterator<Item = &Query> {
        self.buckets.values().flat_map(|b| b.queries.iter())
    }

    fn matching<'a>(
        &'a self,
        http_code: u16,
        entity_set: &str,
    ) -> impl Iterator<Item = &'a Query> {
        let entity_set = entity_set.to_string();
        self.buckets
            .iter()
            .filter(move |(key, _)| key.entity_set == entity_set)
            .flat_map(|(_, bucket)| bucket.queries.iter())
            .filter(move |q| q.status_code() == Some(http_code))
    }

    /// Uniform random sample of up to `n` queries matching status and
    /// entity set.
    #[must_use]
    pub fn sample(
        &self,
        http_code: u16,
        entity_set: &str,
        n: usize,
        rng: &mut impl Rng,
    ) -> Vec<Query> {
        let candidates: Vec<&Query> = self.matching(http_code, entity_set).collect();
        candidates
            .choose_multiple(rng, n)
            .map(|q| (*q).clone())
            .collect()
    }

    /// Picks exactly two mating candidates sharing entity set and status,
    /// each with at least `min_parts` filter parts. Empty when fewer than
    /// two candidates exist.
    #[must_use]
    pub fn find_similar(
        &self,
        http_code: u16,
        entity_set: &str,
        min_parts: usize,
        rng: &mut impl Rng,
    ) -> Vec<Query> {
        let candidates: Vec<&Query> = self
            .matching(http_code, entity_set)
            .filter(|q| q.filter_parts_len() >= min_parts)
            .collect();
        if candidates.len() < 2 {
            return Vec::new();
        }
        candidates
            .choose_multiple(rng, 2)
            .map(|q| (*q).clone())
            .collect()
    }

    /// Deletes up to `max_n` queries with `score < score_threshold`.
    /// Returns how many were removed.
    pub fn remove_weak(&mut self, score_threshold: f64, max_n: usize) -> usize {
        let mut removed = 0;
        for bucket in self.buckets.values_mut() {
            if removed == max_n {
                break;
            }
            let mut kept = Vec::with_capacity(bucket.queries.len());
            for query in bucket.queries.drain(..) {
                let weak = query.score.is_some_and(|s| (s as f64) < score_threshold);
                if weak && removed < max_n {
                    removed += 1;
                    self.overall_score -= query.score.unwrap_or(0);
                    self.total_queries -= 1;
                    bucket.strings.remove(&query.query_string);
                } else {
                    kept.push(query);
                }
            }
            bucket.queries = kept;
        }
        if removed > 0 {
            debug!("slayed {removed} weak individuals below {score_threshold}");
        }
        removed
    }
}
