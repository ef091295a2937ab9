//! The evolution driver.
//!
//! Seed phase: every queryable contributes `|properties| * seed_population`
//! batches of fresh queries. Steady phase: select, breed (crossover or
//! fresh), dispatch, analyze, persist, prune, repeated until the shutdown
//! signal flips.

use crate::analyzer::Analyzer;
use crate::breeding;
use crate::config::FuzzerConfig;
use crate::selector::Selector;
use futures::future::join_all;
use hornet_corpus::{CorpusStore, Query};
use hornet_dispatch::{Dispatch, Outcome};
use hornet_entities::Queryable;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Pause between retries of a transport-failed dispatch.
const RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Counters the driver keeps while running.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunStats {
    /// Queries generated (including discarded ones).
    pub tests: u64,
    /// Responses with a status other than 200.
    pub fails: u64,
}

/// The top-level fuzzing loop.
#[derive(Debug)]
pub struct Fuzzer<D> {
    dispatcher: D,
    queryables: Vec<Queryable>,
    config: FuzzerConfig,
    store: CorpusStore,
    analyzer: Analyzer,
    selector: Selector,
    rng: ChaCha8Rng,
    concurrent: bool,
    tests_num: u64,
    fails_num: u64,
}

impl<D: Dispatch> Fuzzer<D> {
    /// Creates a fuzzer over the given queryables.
    ///
    /// All random streams derive from the configured master seed, or from
    /// entropy when none is set.
    #[must_use]
    pub fn new(
        dispatcher: D,
        queryables: Vec<Queryable>,
        config: FuzzerConfig,
        concurrent: bool,
    ) -> Self {
        let master = config.seed.unwrap_or_else(rand::random);
        let mut seeder = ChaCha8Rng::seed_from_u64(master);
        let analyzer = Analyzer::new(&config, ChaCha8Rng::seed_from_u64(seeder.gen()));
        let selector = Selector::new(&config, ChaCha8Rng::seed_from_u64(seeder.gen()));
        let rng = ChaCha8Rng::seed_from_u64(seeder.gen());

        Self {
            dispatcher,
            queryables,
            config,
            store: CorpusStore::new(),
            analyzer,
            selector,
            rng,
            concurrent,
            tests_num: 0,
            fails_num: 0,
        }
    }

    /// The stored population.
    #[must_use]
    pub const fn store(&self) -> &CorpusStore {
        &self.store
    }

    /// Current counters.
    #[must_use]
    pub const fn stats(&self) -> RunStats {
        RunStats {
            tests: self.tests_num,
            fails: self.fails_num,
        }
    }

    const fn batch_size(&self) -> usize {
        if self.concurrent {
            self.config.pool_size
        } else {
            1
        }
    }

    /// Runs the full loop: seed, prime, evolve until `shutdown` flips.
    pub async fn run(&mut self, shutdown: watch::Receiver<bool>) -> RunStats {
        self.seed_population(&shutdown).await;
        self.prime_population_score();

        while !*shutdown.borrow() {
            self.evolve_step().await;
        }
        info!(
            tests = self.tests_num,
            fails = self.fails_num,
            stored = self.store.total_queries(),
            "fuzzing loop stopped"
        );
        self.stats()
    }

    /// Seeds the population: `|properties| * seed_population` batches per
    /// queryable (divided by the pool size in concurrent mode).
    pub async fn seed_population(&mut self, shutdown: &watch::Receiver<bool>) {
        for index in 0..self.queryables.len() {
            let properties = self.queryables[index].entity_set().properties.len();
            let mut seed_range = properties * self.config.seed_population;
            if self.concurrent {
                seed_range = (seed_range as f64 / self.config.pool_size as f64).round() as usize;
            }
            debug!(
                "seeding {} with {seed_range} batches",
                self.queryables[index].name()
            );
            for _ in 0..seed_range {
                if *shutdown.borrow() {
                    return;
                }
                let batch =
                    breeding::generate_batch(&self.queryables[index], self.batch_size(), &mut self.rng);
                if batch.is_empty() {
                    break;
                }
                self.tests_num += batch.len() as u64;
                let batch = self.dispatch_batch(batch).await;
                let batch = self.analyze_batch(batch);
                self.persist_batch(batch);
            }
        }
        info!(
            tests = self.tests_num,
            stored = self.store.total_queries(),
            "seed phase complete"
        );
    }

    /// Primes the selector average and the analyzer population score from
    /// the store. Must run after seeding, before the steady phase.
    pub fn prime_population_score(&mut self) {
        let total = self.store.total_queries();
        if total > 0 {
            self.selector
                .set_score_average(self.store.overall_score() as f64 / total as f64);
        }
        self.analyzer.prime(self.store.overall_score());
    }

    /// One steady-phase iteration.
    pub async fn evolve_step(&mut self) {
        let selection = self.selector.select(&self.queryables, &self.store);
        let entity_name = self.queryables[selection.queryable_index].name().to_string();

        let batch = match selection.crossable.as_ref() {
            Some(pair) => {
                breeding::crossover_batch(pair, &entity_name, self.batch_size(), &mut self.rng)
            }
            None => breeding::generate_batch(
                &self.queryables[selection.queryable_index],
                self.batch_size(),
                &mut self.rng,
            ),
        };
        if batch.is_empty() {
            return;
        }
        let generated = batch.len();
        self.tests_num += generated as u64;

        let batch = self.dispatch_batch(batch).await;
        let batch = self.analyze_batch(batch);
        self.persist_batch(batch);
        self.store.remove_weak(selection.score_average, generated);

        debug!(
            tests = self.tests_num,
            fails = self.fails_num,
            "generated tests"
        );
    }

    /// Dispatches a whole batch, in parallel up to the batch size, and
    /// attaches responses. Queries whose dispatch keeps failing past the
    /// retry window are discarded.
    async fn dispatch_batch(&mut self, batch: Vec<Query>) -> Vec<Query> {
        let retry_window = Duration::from_secs(self.config.retry_timeout_seconds);
        let dispatcher = &self.dispatcher;
        let outcomes = join_all(
            batch
                .iter()
                .map(|query| dispatch_with_retry(dispatcher, &query.query_string, retry_window)),
        )
        .await;

        let mut kept = Vec::with_capacity(batch.len());
        for (mut query, outcome) in batch.into_iter().zip(outcomes) {
            match outcome {
                Ok(outcome) => {
                    if outcome.is_error() {
                        self.fails_num += 1;
                    }
                    query.response = Some(outcome);
                    kept.push(query);
                }
                Err(e) => warn!("discarding {}: {e}", query.query_string),
            }
        }
        kept
    }

    /// Scores every query; killable children are dropped here and never
    /// reach the store.
    fn analyze_batch(&mut self, batch: Vec<Query>) -> Vec<Query> {
        let mut kept = Vec::with_capacity(batch.len());
        for mut query in batch {
            let info = self.analyzer.analyze(&mut query, &self.store);
            if info.killable {
                debug!("slaying killable child {}", query.id);
                continue;
            }
            kept.push(query);
        }
        kept
    }

    fn persist_batch(&mut self, batch: Vec<Query>) {
        for query in batch {
            self.store.save(query);
        }
    }
}

async fn dispatch_with_retry<D: Dispatch>(
    dispatcher: &D,
    path: &str,
    retry_window: Duration,
) -> hornet_dispatch::Result<Outcome> {
    let started = Instant::now();
    loop {
        match dispatcher.get(path).await {
            Ok(outcome) => return Ok(outcome),
            Err(e) => {
                if started.elapsed() >= retry_window {
                    return Err(e);
                }
                debug!("transport failure, retrying: {e}");
                tokio::time::sleep(RETRY_BACKOFF.min(retry_window)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hornet_entities::{EntityProperty, EntitySet, GeneratorConfig, PropertyKind};
    use std::collections::HashSet;
    use std::future::Future;

    #[derive(Debug, Clone)]
    struct StubDispatch {
        status: u16,
        elapsed: Duration,
    }

    impl Dispatch for StubDispatch {
        fn get(&self, _path: &str) -> impl Future<Output = hornet_dispatch::Result<Outcome>> + Send {
            let outcome = Outcome::new(self.status, self.elapsed);
            async move { Ok(outcome) }
        }
    }

    #[derive(Debug, Clone)]
    struct FailingDispatch;

    impl Dispatch for FailingDispatch {
        fn get(&self, _path: &str) -> impl Future<Output = hornet_dispatch::Result<Outcome>> + Send {
            async { Err(hornet_dispatch::Error::MissingCredentials("SAP_USERNAME")) }
        }
    }

    fn test_config() -> FuzzerConfig {
        FuzzerConfig {
            seed_population: 10,
            pool_size: 4,
            retry_timeout_seconds: 0,
            death_chance: 0.0,
            seed: Some(42),
            generator: GeneratorConfig {
                single_entity_prob: 0.0,
                group_prob: 0.0,
                max_filter_parts: 3,
                ..GeneratorConfig::default()
            },
            ..FuzzerConfig::default()
        }
    }

    fn three_property_queryable() -> Queryable {
        let set = EntitySet::new("Customers", "Customer")
            .with_property(EntityProperty::new(
                "Name",
                PropertyKind::Str { max_length: Some(10) },
            ))
            .with_property(EntityProperty::new(
                "Code",
                PropertyKind::Str { max_length: Some(10) },
            ))
            .with_property(EntityProperty::new("Id", PropertyKind::Guid));
        Queryable::new(set, GeneratorConfig {
            single_entity_prob: 0.0,
            group_prob: 0.0,
            max_filter_parts: 3,
            ..GeneratorConfig::default()
        })
    }

    fn shutdown_handle() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    #[tokio::test]
    async fn serial_seed_persists_properties_times_seed_population() {
        let stub = StubDispatch {
            status: 200,
            elapsed: Duration::from_millis(100),
        };
        let mut fuzzer =
            Fuzzer::new(stub, vec![three_property_queryable()], test_config(), false);

        let (_tx, rx) = shutdown_handle();
        fuzzer.seed_population(&rx).await;

        // 3 properties * seed_population 10, one query per serial batch.
        assert_eq!(fuzzer.store().total_queries(), 30);
        assert_eq!(fuzzer.stats().tests, 30);
        assert_eq!(fuzzer.stats().fails, 0);

        let mut ids = HashSet::new();
        for query in fuzzer.store().iter() {
            assert!(query.query_string.starts_with("Customers"));
            assert_eq!(query.entity_name, "Customers");
            let response = query.response.as_ref().expect("response attached");
            assert_eq!(response.status_code, 200);
            assert!(response.error_code.is_none(), "clean bucket");
            assert!(query.score.expect("score assigned") >= 1);
            assert!(ids.insert(query.id), "ids are unique");
        }
    }

    #[tokio::test]
    async fn concurrent_seed_divides_batches_by_pool_size() {
        let stub = StubDispatch {
            status: 200,
            elapsed: Duration::from_millis(100),
        };
        let mut fuzzer =
            Fuzzer::new(stub, vec![three_property_queryable()], test_config(), true);

        let (_tx, rx) = shutdown_handle();
        fuzzer.seed_population(&rx).await;

        // round(30 / 4) = 8 batches of 4 queries each.
        assert_eq!(fuzzer.store().total_queries(), 32);
    }

    #[tokio::test]
    async fn transport_failures_discard_queries() {
        let mut fuzzer = Fuzzer::new(
            FailingDispatch,
            vec![three_property_queryable()],
            test_config(),
            false,
        );

        let (_tx, rx) = shutdown_handle();
        fuzzer.seed_population(&rx).await;

        assert_eq!(fuzzer.store().total_queries(), 0);
        assert_eq!(fuzzer.stats().tests, 30, "generation still counted");
        assert_eq!(fuzzer.stats().fails, 0, "transport failures are not fails");
    }

    #[tokio::test]
    async fn five_hundreds_count_as_fails_and_land_in_an_error_bucket() {
        let stub = StubDispatch {
            status: 500,
            elapsed: Duration::from_millis(100),
        };
        let mut fuzzer =
            Fuzzer::new(stub, vec![three_property_queryable()], test_config(), false);

        let (_tx, rx) = shutdown_handle();
        fuzzer.seed_population(&rx).await;

        assert_eq!(fuzzer.stats().fails, 30);
        for query in fuzzer.store().iter() {
            assert!(query.score.unwrap() >= 100, "500 dominates the fitness");
        }
    }

    #[tokio::test]
    async fn steady_phase_breeds_children_with_predecessors() {
        let stub = StubDispatch {
            status: 200,
            elapsed: Duration::from_millis(100),
        };
        let mut fuzzer =
            Fuzzer::new(stub, vec![three_property_queryable()], test_config(), false);

        let (_tx, rx) = shutdown_handle();
        fuzzer.seed_population(&rx).await;

        // Leave the score average at zero so pruning cannot erase the
        // children this test is looking for.
        for _ in 0..30 {
            fuzzer.evolve_step().await;
        }

        assert_eq!(fuzzer.stats().tests, 60);
        assert!(
            fuzzer.store().iter().any(|q| q.predecessors.len() == 2),
            "some crossover children must be stored"
        );
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let stub = StubDispatch {
            status: 200,
            elapsed: Duration::from_millis(1),
        };
        let mut fuzzer =
            Fuzzer::new(stub, vec![three_property_queryable()], test_config(), false);

        let (tx, rx) = shutdown_handle();
        tx.send(true).unwrap();
        let stats = fuzzer.run(rx).await;
        // The flag was already set: seeding bails out and the steady phase
        // never starts.
        assert_eq!(stats.tests, 0);
    }
}
