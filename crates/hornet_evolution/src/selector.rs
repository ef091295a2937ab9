//! Queryable and mating-pair selection with stagnation detection.

use crate::config::FuzzerConfig;
use hornet_corpus::{CorpusStore, Query};
use hornet_entities::Queryable;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

/// What the selector decided for one iteration.
#[derive(Debug)]
pub struct Selection {
    /// Mating pair; `None` forces a fresh-generation step.
    pub crossable: Option<(Query, Query)>,
    /// Index of the chosen queryable.
    pub queryable_index: usize,
    /// Score average the pruning step compares against.
    pub score_average: f64,
}

/// Chooses what to breed next and watches the population for stagnation.
#[derive(Debug)]
pub struct Selector {
    score_average: f64,
    passed_iterations: u64,
    iterations_threshold: u64,
    score_eps: f64,
    selection_threshold: usize,
    filter_parts_num: usize,
    rng: ChaCha8Rng,
}

impl Selector {
    /// Creates a selector with its own random stream.
    #[must_use]
    pub fn new(config: &FuzzerConfig, rng: ChaCha8Rng) -> Self {
        Self {
            score_average: 0.0,
            passed_iterations: 0,
            iterations_threshold: config.iterations_threshold,
            score_eps: config.score_eps,
            selection_threshold: config.selection_threshold,
            filter_parts_num: config.filter_parts_num,
            rng,
        }
    }

    /// The current score average.
    #[must_use]
    pub const fn score_average(&self) -> f64 {
        self.score_average
    }

    /// Seeds the score average, typically right after the seed phase.
    pub fn set_score_average(&mut self, average: f64) {
        self.score_average = average;
    }

    /// Selects a queryable and, unless the population stagnates, a mating
    /// pair from the corpus.
    ///
    /// The pair search rerolls the queryable up to the selection threshold;
    /// exhausting it falls through to fresh generation.
    pub fn select(&mut self, queryables: &[Queryable], store: &CorpusStore) -> Selection {
        let selection = if self.is_score_stagnating(store) {
            info!("population stagnated, forcing fresh generation");
            Selection {
                crossable: None,
                queryable_index: self.rng.gen_range(0..queryables.len()),
                score_average: self.score_average,
            }
        } else {
            let mut queryable_index = self.rng.gen_range(0..queryables.len());
            let mut crossable = None;
            for attempt in 0..self.selection_threshold {
                if let Some(pair) = self.crossable_pair(&queryables[queryable_index], store) {
                    crossable = Some(pair);
                    break;
                }
                debug!(attempt, "no mating pair, rerolling queryable");
                queryable_index = self.rng.gen_range(0..queryables.len());
            }
            Selection {
                crossable,
                queryable_index,
                score_average: self.score_average,
            }
        };
        self.passed_iterations += 1;
        selection
    }

    /// Once the iteration counter exceeds its threshold, recomputes the
    /// population average; movement below `score_eps` is stagnation.
    fn is_score_stagnating(&mut self, store: &CorpusStore) -> bool {
        if self.passed_iterations > self.iterations_threshold {
            self.passed_iterations = 0;
            let total = store.total_queries();
            if total == 0 {
                return false;
            }
            let current_average = store.overall_score() as f64 / total as f64;
            let old_average = self.score_average;
            self.score_average = current_average;
            if (old_average - current_average).abs() < self.score_eps {
                return true;
            }
        }
        false
    }

    /// Fetches a mating pair for the queryable: HTTP 500 first, falling back
    /// to HTTP 200.
    fn crossable_pair(
        &mut self,
        queryable: &Queryable,
        store: &CorpusStore,
    ) -> Option<(Query, Query)> {
        let mut pair =
            store.find_similar(500, queryable.name(), self.filter_parts_num, &mut self.rng);
        if pair.len() != 2 {
            pair = store.find_similar(200, queryable.name(), self.filter_parts_num, &mut self.rng);
        }
        let mut queries = pair.into_iter();
        match (queries.next(), queries.next()) {
            (Some(first), Some(second)) => Some((first, second)),
            _ => None,
        }
    }
}
