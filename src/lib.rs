//! # phonospace: Phonetic Feature-Space Walks
//!
//! Builds a neighbor graph over a corpus of syllable tokens, where each token
//! carries a 12-bit phonetic feature vector, and generates cost-weighted
//! stochastic walks through it.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `CorpusProvider` is the contract between the engine and record storage
//! 2. **Build once, walk many**: `NeighborGraph` is immutable and shared without locks
//! 3. **Seed in, path out**: every walk owns an RNG built from its seed; no global RNG
//! 4. **Errors are values**: bad input is rejected before any work starts, never clamped
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use phonospace::{GraphConfig, MemoryCorpus, Phonospace};
//!
//! # fn example(json: &str) -> phonospace::Result<()> {
//! let corpus = MemoryCorpus::from_json(json)?;
//! let space = Phonospace::build(corpus, &GraphConfig::new(2))?;
//!
//! let result = space.walk("ka", "balanced", 42)?;
//! println!("{}", result.text(" → "));
//! # Ok(())
//! # }
//! ```
//!
//! ## Presets
//!
//! | Profile | Steps | Max flips | Temperature | Frequency bias |
//! |---------|-------|-----------|-------------|----------------|
//! | `conservative` | 8 | 1 | 0.35 | favors common |
//! | `balanced` | 10 | 2 | 1.0 | neutral |
//! | `high-variance` | 12 | 2 | 2.5 | favors rare |
//! | `explorer` | 16 | 3 | 6.0 | neutral |

use std::sync::Arc;

use parking_lot::RwLock;

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod corpus;
pub mod graph;
pub mod walk;
pub mod profile;
pub mod cancel;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{
    Feature, FeatureVector, FEATURE_COUNT,
    RawRecord, TokenId, TokenRecord,
    Transition, WalkResult, WalkTermination,
};

// ============================================================================
// Re-exports: Corpus, Graph, Walks
// ============================================================================

pub use corpus::{search, search_limit, CorpusProvider, MemoryCorpus, TokenQuery};
pub use graph::{
    build_graph, build_graph_with, build_graph_with_cancel,
    BuildStrategy, GraphConfig, GraphStats, Neighbor, NeighborGraph,
};
pub use walk::{
    cost, derive_seed, softmax, walk, walk_batch, walk_from,
    BaseSeed, BatchRunner, CostBreakdown, CostWeights, StartPolicy, Walker,
};
pub use profile::{Preset, ProfileOverrides, ProfileRegistry, WalkProfile};
pub use cancel::CancelToken;

// ============================================================================
// Top-level handle
// ============================================================================

/// The primary entry point. A `Phonospace` owns a corpus, the graph built
/// from it, and a profile registry seeded with the presets.
///
/// Corpus and graph are read-only and shared behind `Arc`; only the registry
/// is behind a lock, so walks from many threads never contend.
pub struct Phonospace<C: CorpusProvider> {
    corpus: Arc<C>,
    graph: Arc<NeighborGraph>,
    profiles: RwLock<ProfileRegistry>,
}

impl<C: CorpusProvider> Phonospace<C> {
    /// Build the neighbor graph for `corpus`.
    pub fn build(corpus: C, config: &GraphConfig) -> Result<Self> {
        Self::build_with_cancel(corpus, config, &CancelToken::new())
    }

    /// Build, giving up with [`Error::ConstructionCancelled`] if `cancel` fires.
    pub fn build_with_cancel(corpus: C, config: &GraphConfig, cancel: &CancelToken) -> Result<Self> {
        let graph = build_graph_with_cancel(&corpus, config, cancel)?;
        Self::from_parts(Arc::new(corpus), Arc::new(graph))
    }

    /// Pair an existing graph with the corpus it was built from.
    pub fn from_parts(corpus: Arc<C>, graph: Arc<NeighborGraph>) -> Result<Self> {
        if corpus.record_count() != graph.token_count() {
            return Err(Error::validation(
                "corpus",
                format!(
                    "graph holds {} tokens but the corpus holds {}",
                    graph.token_count(),
                    corpus.record_count()
                ),
            ));
        }
        Ok(Self { corpus, graph, profiles: RwLock::new(ProfileRegistry::new()) })
    }

    pub fn corpus(&self) -> &Arc<C> {
        &self.corpus
    }

    pub fn graph(&self) -> &Arc<NeighborGraph> {
        &self.graph
    }

    // ------------------------------------------------------------------
    // Profiles
    // ------------------------------------------------------------------

    /// Copy of a registered profile.
    pub fn profile(&self, name: &str) -> Result<WalkProfile> {
        self.profiles.read().get(name).cloned()
    }

    /// Registered profile names, sorted.
    pub fn profile_names(&self) -> Vec<String> {
        self.profiles.read().names().into_iter().map(String::from).collect()
    }

    /// Register or replace a named profile. It must fit this graph.
    pub fn register_profile(&self, name: impl Into<String>, profile: WalkProfile) -> Result<Option<WalkProfile>> {
        profile.validate_for(&self.graph)?;
        self.profiles.write().register(name, profile)
    }

    /// Load profiles from JSON; see [`ProfileRegistry::load_json`]. Every
    /// loaded profile must fit this graph, or nothing is registered.
    pub fn load_profiles(&self, json: &str) -> Result<usize> {
        let mut profiles = self.profiles.write();
        let mut staged = profiles.clone();
        let loaded = staged.load_json_names(json)?;
        for name in &loaded {
            staged.get(name)?.validate_for(&self.graph)?;
        }
        *profiles = staged;
        Ok(loaded.len())
    }

    /// Named profile with overrides applied.
    pub fn resolve_profile(&self, name: &str, overrides: &ProfileOverrides) -> Result<WalkProfile> {
        self.profiles.read().resolve(name, overrides)
    }

    // ------------------------------------------------------------------
    // Walks
    // ------------------------------------------------------------------

    /// Walk from `start` with a registered profile.
    pub fn walk(&self, start: &str, profile: &str, seed: u64) -> Result<WalkResult> {
        let profile = self.profile(profile)?;
        self.walk_with(start, &profile, seed)
    }

    /// Walk with an ad hoc profile.
    pub fn walk_with(&self, start: &str, profile: &WalkProfile, seed: u64) -> Result<WalkResult> {
        walk::walk(&self.graph, &*self.corpus, start, profile, seed)
    }

    /// `count` independent walks; result `i` used `derive_seed(base, i)`.
    pub fn walk_batch(
        &self,
        profile: &WalkProfile,
        count: usize,
        base_seed: impl Into<BaseSeed>,
        start_policy: StartPolicy,
    ) -> Result<Vec<WalkResult>> {
        walk::walk_batch(&self.graph, &*self.corpus, profile, count, base_seed, start_policy)
    }

    /// Batch runner bound to this space, for parallelism and cancellation control.
    pub fn batch<'a>(&'a self, profile: &'a WalkProfile, base_seed: impl Into<BaseSeed>) -> BatchRunner<'a, C> {
        BatchRunner::new(&self.graph, &*self.corpus, profile, base_seed)
    }

    pub fn search(&self, query: &TokenQuery<'_>) -> Result<Vec<TokenRecord>> {
        corpus::search(&*self.corpus, query)
    }
}

#[cfg(feature = "runtime")]
impl<C: CorpusProvider + 'static> Phonospace<C> {
    /// Build on tokio's blocking pool so an async caller is never stalled.
    pub async fn build_async(corpus: C, config: GraphConfig, cancel: CancelToken) -> Result<Self> {
        let corpus = Arc::new(corpus);
        let source = Arc::clone(&corpus);
        let graph = tokio::task::spawn_blocking(move || build_graph_with_cancel(&*source, &config, &cancel))
            .await
            .map_err(|e| Error::Runtime(e.to_string()))??;
        Self::from_parts(corpus, Arc::new(graph))
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Walk exhausted at '{token}' after {at_step} of {requested} steps")]
    WalkExhausted { token: String, at_step: usize, requested: usize },

    #[error("Graph construction cancelled")]
    ConstructionCancelled,

    #[error("Walk batch cancelled after {completed} walks")]
    BatchCancelled { completed: usize },

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[cfg(feature = "runtime")]
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl Error {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Error::Validation { field, message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
