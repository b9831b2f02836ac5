//! Batch Runner: many independent walks from one base seed.
//!
//! Walk `i` is seeded with [`derive_seed`]`(base, i)` and owns its own
//! `ChaCha8Rng`; nothing is shared between walks, so the batch gives the same
//! results sequentially, in parallel, or in any order. Randomly chosen start
//! tokens come from stream 1 of the walk's seed, leaving stream 0 (the walk
//! itself) identical to a direct [`walk`](super::walk) call with that seed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, RngCore};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{seeded_rng, walk_from};
use crate::cancel::CancelToken;
use crate::corpus::{resolve_text, CorpusProvider};
use crate::graph::NeighborGraph;
use crate::model::*;
use crate::profile::WalkProfile;
use crate::{Error, Result};

/// RNG stream used to choose start tokens.
const START_STREAM: u64 = 1;

/// Seed for walk `index` of a batch based on `base`.
///
/// SplitMix64 finalizer over `base + (index + 1)·φ64`. Adjacent indices land
/// far apart, and `derive_seed(base, i) != base` for typical bases.
pub fn derive_seed(base: u64, index: u64) -> u64 {
    let mut z = base.wrapping_add(index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Base seed of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseSeed {
    Fixed(u64),
    /// Read once from the OS. The resolved value is reported by
    /// [`BatchRunner::base_seed`] so the batch can be replayed.
    Entropy,
}

impl BaseSeed {
    pub fn resolve(self) -> u64 {
        match self {
            BaseSeed::Fixed(seed) => seed,
            BaseSeed::Entropy => rand::rngs::OsRng.next_u64(),
        }
    }
}

impl From<u64> for BaseSeed {
    fn from(seed: u64) -> Self {
        BaseSeed::Fixed(seed)
    }
}

/// How each walk of a batch picks its start token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPolicy {
    /// Every walk starts at this token.
    Fixed(String),
    /// Uniform over all tokens.
    Uniform,
    /// Proportional to `max(frequency, 1)`.
    FrequencyWeighted,
}

/// Start chooser with the policy's tables prepared once per batch.
enum Starts {
    Fixed(TokenId),
    Uniform(u32),
    Weighted(WeightedIndex<f64>),
}

impl Starts {
    fn prepare<C: CorpusProvider + ?Sized>(
        policy: &StartPolicy,
        graph: &NeighborGraph,
        corpus: &C,
    ) -> Result<Self> {
        let n = graph.token_count();
        if n == 0 && !matches!(policy, StartPolicy::Fixed(_)) {
            return Err(Error::validation("start_policy", "cannot draw a start token from an empty corpus"));
        }
        Ok(match policy {
            StartPolicy::Fixed(text) => Starts::Fixed(resolve_text(corpus, text)?),
            StartPolicy::Uniform => Starts::Uniform(n as u32),
            StartPolicy::FrequencyWeighted => {
                let weights = (0..n)
                    .map(|i| graph.frequency(TokenId(i as u32)).map(|f| f.max(1) as f64))
                    .collect::<Result<Vec<f64>>>()?;
                let index = WeightedIndex::new(weights)
                    .map_err(|e| Error::validation("start_policy", e.to_string()))?;
                Starts::Weighted(index)
            }
        })
    }

    fn choose(&self, seed: u64) -> TokenId {
        match self {
            Starts::Fixed(id) => *id,
            Starts::Uniform(n) => TokenId(seeded_rng(seed, START_STREAM).gen_range(0..*n)),
            Starts::Weighted(index) => {
                TokenId(index.sample(&mut seeded_rng(seed, START_STREAM)) as u32)
            }
        }
    }
}

// ============================================================================
// Runner
// ============================================================================

/// Batch configuration. The base seed is resolved on construction.
pub struct BatchRunner<'a, C: CorpusProvider + ?Sized> {
    graph: &'a NeighborGraph,
    corpus: &'a C,
    profile: &'a WalkProfile,
    start: StartPolicy,
    base: u64,
    parallel: bool,
    cancel: Option<CancelToken>,
}

impl<'a, C: CorpusProvider + ?Sized> BatchRunner<'a, C> {
    pub fn new(
        graph: &'a NeighborGraph,
        corpus: &'a C,
        profile: &'a WalkProfile,
        base_seed: impl Into<BaseSeed>,
    ) -> Self {
        Self {
            graph,
            corpus,
            profile,
            start: StartPolicy::Uniform,
            base: base_seed.into().resolve(),
            parallel: true,
            cancel: None,
        }
    }

    pub fn start_policy(mut self, policy: StartPolicy) -> Self {
        self.start = policy;
        self
    }

    /// Run walks on the rayon pool. Results are identical either way.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check `cancel` before each walk.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// The base seed every walk seed is derived from.
    pub fn base_seed(&self) -> u64 {
        self.base
    }

    /// Seed of walk `index`.
    pub fn seed_for(&self, index: usize) -> u64 {
        derive_seed(self.base, index as u64)
    }

    /// Run `count` walks; result `i` is walk `i`.
    pub fn run(&self, count: usize) -> Result<Vec<WalkResult>> {
        self.profile.validate_for(self.graph)?;
        let starts = Starts::prepare(&self.start, self.graph, self.corpus)?;
        let started = Instant::now();
        let completed = AtomicUsize::new(0);

        let one = |i: usize| -> Result<WalkResult> {
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                return Err(Error::BatchCancelled { completed: completed.load(Ordering::Relaxed) });
            }
            let seed = self.seed_for(i);
            let result = walk_from(self.graph, self.corpus, starts.choose(seed), self.profile, seed)?;
            completed.fetch_add(1, Ordering::Relaxed);
            Ok(result)
        };

        let results: Result<Vec<WalkResult>> = if self.parallel {
            (0..count).into_par_iter().map(one).collect()
        } else {
            (0..count).map(one).collect()
        };

        let results = match results {
            Ok(results) => results,
            Err(e) => {
                if let Error::BatchCancelled { completed } = e {
                    warn!(base_seed = self.base, completed, requested = count, "walk batch cancelled");
                }
                return Err(e);
            }
        };

        info!(
            profile = self.profile.label(),
            base_seed = self.base,
            walks = results.len(),
            exhausted = results.iter().filter(|r| !r.is_complete()).count(),
            parallel = self.parallel,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "walk batch finished"
        );
        Ok(results)
    }
}

/// Run `count` walks from `base_seed` on the rayon pool.
pub fn walk_batch<C: CorpusProvider + ?Sized>(
    graph: &NeighborGraph,
    corpus: &C,
    profile: &WalkProfile,
    count: usize,
    base_seed: impl Into<BaseSeed>,
    start_policy: StartPolicy,
) -> Result<Vec<WalkResult>> {
    BatchRunner::new(graph, corpus, profile, base_seed)
        .start_policy(start_policy)
        .run(count)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::MemoryCorpus;
    use crate::graph::build_graph;
    use crate::walk::walk;

    fn fixture() -> (MemoryCorpus, NeighborGraph) {
        let records = (0..40u16)
            .map(|i| {
                let bits = (i * 37) & 0x3F;
                TokenRecord::new(format!("w{i}"), u64::from(i % 7), FeatureVector::from_bits(bits).unwrap())
            })
            .collect();
        let corpus = MemoryCorpus::from_records(records).unwrap();
        let graph = build_graph(&corpus, 2).unwrap();
        (corpus, graph)
    }

    #[test]
    fn test_derive_seed_spreads_indices() {
        let seeds: Vec<u64> = (0..100).map(|i| derive_seed(42, i)).collect();
        let mut unique = seeds.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), seeds.len());
        assert_eq!(derive_seed(42, 3), derive_seed(42, 3));
        assert_ne!(derive_seed(42, 3), derive_seed(43, 3));
    }

    #[test]
    fn test_batch_matches_direct_walks() {
        let (corpus, graph) = fixture();
        let profile = WalkProfile::new(6, 2, 1.5);
        let batch = walk_batch(&graph, &corpus, &profile, 10, 7u64, StartPolicy::Fixed("w3".into())).unwrap();
        assert_eq!(batch.len(), 10);
        for (i, result) in batch.iter().enumerate() {
            let direct = walk(&graph, &corpus, "w3", &profile, derive_seed(7, i as u64)).unwrap();
            assert_eq!(result, &direct, "walk {i}");
        }
    }

    #[test]
    fn test_parallel_equals_sequential() {
        let (corpus, graph) = fixture();
        let profile = WalkProfile::new(8, 1, 2.0);
        for policy in [StartPolicy::Uniform, StartPolicy::FrequencyWeighted] {
            let runner = BatchRunner::new(&graph, &corpus, &profile, 99u64).start_policy(policy);
            let par = runner.run(25).unwrap();
            let seq = BatchRunner::new(&graph, &corpus, &profile, 99u64)
                .start_policy(runner.start.clone())
                .parallel(false)
                .run(25)
                .unwrap();
            assert_eq!(par, seq);
        }
    }

    #[test]
    fn test_random_starts_use_walk_seed() {
        let (corpus, graph) = fixture();
        let profile = WalkProfile::new(4, 2, 1.0);
        let batch = walk_batch(&graph, &corpus, &profile, 12, 5u64, StartPolicy::Uniform).unwrap();
        for (i, result) in batch.iter().enumerate() {
            let direct = walk(&graph, &corpus, &result.start, &profile, derive_seed(5, i as u64)).unwrap();
            assert_eq!(result, &direct);
        }
    }

    #[test]
    fn test_entropy_base_is_reported() {
        let (corpus, graph) = fixture();
        let profile = WalkProfile::new(3, 1, 1.0);
        let runner = BatchRunner::new(&graph, &corpus, &profile, BaseSeed::Entropy);
        let first = runner.run(3).unwrap();
        let replay = BatchRunner::new(&graph, &corpus, &profile, runner.base_seed()).run(3).unwrap();
        assert_eq!(first, replay);
    }

    #[test]
    fn test_cancelled_batch() {
        let (corpus, graph) = fixture();
        let profile = WalkProfile::new(3, 1, 1.0);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = BatchRunner::new(&graph, &corpus, &profile, 1u64)
            .with_cancel(cancel)
            .parallel(false)
            .run(5)
            .unwrap_err();
        assert!(matches!(err, Error::BatchCancelled { completed: 0 }));
    }

    #[test]
    fn test_unknown_fixed_start() {
        let (corpus, graph) = fixture();
        let err = walk_batch(&graph, &corpus, &WalkProfile::default(), 2, 0u64, StartPolicy::Fixed("nope".into()))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_empty_batch_and_empty_corpus() {
        let (corpus, graph) = fixture();
        let profile = WalkProfile::default();
        assert!(walk_batch(&graph, &corpus, &profile, 0, 1u64, StartPolicy::Uniform).unwrap().is_empty());

        let empty = MemoryCorpus::default();
        let g = build_graph(&empty, 2).unwrap();
        let err = walk_batch(&g, &empty, &profile, 1, 1u64, StartPolicy::Uniform).unwrap_err();
        assert!(matches!(err, Error::Validation { field: "start_policy", .. }));
    }
}
