//! Query analysis: scoring, population score, killability.

use crate::config::FuzzerConfig;
use crate::fitness;
use hornet_corpus::{CorpusStore, Query};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;
use uuid::Uuid;

/// Outcome of analyzing one query.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisInfo {
    /// Fitness assigned to the query.
    pub score: i64,
    /// Whether the query lost the survival roll.
    pub killable: bool,
    /// Population score after this analysis.
    pub population_score: i64,
}

/// Scores queries and applies selection pressure against regressing
/// offspring.
#[derive(Debug)]
pub struct Analyzer {
    population_score: Option<i64>,
    death_chance: f64,
    string_threshold: usize,
    rng: ChaCha8Rng,
}

impl Analyzer {
    /// Creates an analyzer with its own random stream.
    #[must_use]
    pub fn new(config: &FuzzerConfig, rng: ChaCha8Rng) -> Self {
        Self {
            population_score: None,
            death_chance: config.death_chance,
            string_threshold: config.string_threshold,
            rng,
        }
    }

    /// Primes the population score cache.
    ///
    /// In concurrent mode this must happen before workers start; the first
    /// `analyze` call otherwise primes lazily from the store.
    pub fn prime(&mut self, overall_score: i64) {
        self.population_score = Some(overall_score);
    }

    /// Scores `query` and decides whether it is killable.
    ///
    /// A child is eligible for death only when it regressed below every one
    /// of its parents; eligibility converts to a kill with `death_chance`
    /// probability.
    pub fn analyze(&mut self, query: &mut Query, store: &CorpusStore) -> AnalysisInfo {
        let score = fitness::evaluate(query, self.string_threshold);
        query.score = Some(score);

        let population_score = match self.population_score {
            Some(current) => {
                let updated = current + score;
                self.population_score = Some(updated);
                updated
            }
            None => {
                let primed = store.overall_score();
                self.population_score = Some(primed);
                primed
            }
        };

        let killable = !query.predecessors.is_empty()
            && !Self::any_parent_not_better(&query.predecessors, score, store)
            && self.rng.gen::<f64>() < self.death_chance;
        if killable {
            debug!("query {} regressed below all parents", query.id);
        }

        AnalysisInfo {
            score,
            killable,
            population_score,
        }
    }

    /// True when at least one parent has `score <= new_score`, i.e. the
    /// child did not regress below the whole parent set.
    fn any_parent_not_better(predecessors: &[Uuid], new_score: i64, store: &CorpusStore) -> bool {
        predecessors.iter().any(|id| {
            store
                .query_by_id(*id)
                .and_then(|parent| parent.score)
                .is_some_and(|parent_score| parent_score <= new_score)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hornet_dispatch::Outcome;
    use hornet_entities::{CompareOp, FilterPart, FilterTree, OptionValue};
    use rand::SeedableRng;
    use std::time::Duration;

    fn config(death_chance: f64) -> FuzzerConfig {
        FuzzerConfig {
            death_chance,
            ..FuzzerConfig::default()
        }
    }

    fn analyzer(death_chance: f64) -> Analyzer {
        Analyzer::new(&config(death_chance), ChaCha8Rng::seed_from_u64(9))
    }

    fn stored_parent(store: &mut CorpusStore, string: &str, score: i64) -> Uuid {
        let mut parent = Query::new("E");
        parent.query_string = string.to_string();
        parent.response = Some(Outcome::new(200, Duration::from_millis(50)));
        parent.score = Some(score);
        let id = parent.id;
        assert!(store.save(parent));
        id
    }

    /// A child whose fitness computes to exactly 25:
    /// `"E?$filter=A eq 1"` is 16 chars, minus entity and key leaves 8,
    /// `round(200 / 8) = 25`, status 200 and fast elapsed add nothing.
    fn child(predecessors: Vec<Uuid>) -> Query {
        let mut query = Query::new("E");
        query.query_string = "E?$filter=A eq 1".to_string();
        query.add_option(OptionValue::Filter(FilterTree::single(FilterPart::new(
            "A",
            CompareOp::Eq,
            "1",
        ))));
        query.response = Some(Outcome::new(200, Duration::from_millis(50)));
        query.predecessors = predecessors;
        query
    }

    #[test]
    fn seed_queries_are_never_killable() {
        let store = CorpusStore::new();
        let mut analyzer = analyzer(1.0);
        let mut query = child(Vec::new());
        let info = analyzer.analyze(&mut query, &store);
        assert!(!info.killable);
        assert_eq!(info.score, 25);
        assert_eq!(query.score, Some(25));
    }

    #[test]
    fn child_below_every_parent_is_killable_at_full_death_chance() {
        let mut store = CorpusStore::new();
        let p1 = stored_parent(&mut store, "E?$filter=P1 eq 1", 30);
        let p2 = stored_parent(&mut store, "E?$filter=P2 eq 2", 40);

        let mut analyzer = analyzer(1.0);
        let mut query = child(vec![p1, p2]);
        let info = analyzer.analyze(&mut query, &store);
        assert!(info.killable);
    }

    #[test]
    fn one_weak_parent_saves_the_child() {
        let mut store = CorpusStore::new();
        let p1 = stored_parent(&mut store, "E?$filter=P1 eq 1", 20);
        let p2 = stored_parent(&mut store, "E?$filter=P2 eq 2", 40);

        let mut analyzer = analyzer(1.0);
        let mut query = child(vec![p1, p2]);
        let info = analyzer.analyze(&mut query, &store);
        assert!(!info.killable, "parent with score 20 <= 25 shields the child");
    }

    #[test]
    fn zero_death_chance_never_kills() {
        let mut store = CorpusStore::new();
        let p1 = stored_parent(&mut store, "E?$filter=P1 eq 1", 30);

        let mut analyzer = analyzer(0.0);
        let mut query = child(vec![p1]);
        assert!(!analyzer.analyze(&mut query, &store).killable);
    }

    #[test]
    fn population_score_primes_then_accumulates() {
        let mut store = CorpusStore::new();
        stored_parent(&mut store, "E?$filter=P1 eq 1", 100);
        stored_parent(&mut store, "E?$filter=P2 eq 2", 50);

        let mut analyzer = analyzer(0.0);
        let mut first = child(Vec::new());
        let info = analyzer.analyze(&mut first, &store);
        assert_eq!(info.population_score, 150);

        let mut second = child(Vec::new());
        let info = analyzer.analyze(&mut second, &store);
        assert_eq!(info.population_score, 175);
    }

    #[test]
    fn explicit_priming_preempts_the_lazy_path() {
        let store = CorpusStore::new();
        let mut analyzer = analyzer(0.0);
        analyzer.prime(1000);
        let mut query = child(Vec::new());
        let info = analyzer.analyze(&mut query, &store);
        assert_eq!(info.population_score, 1025);
    }
}
