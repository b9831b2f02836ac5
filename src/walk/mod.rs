//! # Walk Engine
//!
//! ```text
//! Ready(start, steps) ─step─▶ Ready(next, steps−1) ─step─▶ … ─▶ Done(Completed)
//!          │
//!          └─ no neighbor within max_flips ─▶ Done(Exhausted { at_step })
//! ```
//!
//! Each step takes the current row prefix with `distance <= max_flips`, costs
//! every candidate, softmaxes the negated costs at the profile temperature and
//! draws once from the walk's own `ChaCha8Rng`.
//!
//! ## Determinism
//!
//! The RNG is built fresh from the seed for every walk (stream 0); nothing is
//! shared between walks. Candidate order is the graph's `(distance, id)` row
//! order, so identical `(graph, profile, start, seed)` gives an identical path.
//!
//! ## Exhaustion
//!
//! A node with no eligible neighbor ends the walk early. The result is still
//! returned: a shorter valid path with `termination = Exhausted { at_step }`.
//! Use [`WalkResult::require_complete`] to turn that into an error.

pub mod batch;
pub mod cost;

pub use batch::{derive_seed, walk_batch, BaseSeed, BatchRunner, StartPolicy};
pub use cost::{cost, softmax, CostBreakdown, CostWeights};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

use crate::corpus::{require_record, resolve_text, CorpusProvider};
use crate::graph::NeighborGraph;
use crate::model::*;
use crate::profile::WalkProfile;
use crate::{Error, Result};

/// RNG stream used for transitions.
pub(crate) const WALK_STREAM: u64 = 0;

/// Per-walk RNG for `seed`.
pub(crate) fn seeded_rng(seed: u64, stream: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(stream);
    rng
}

// ============================================================================
// State machine
// ============================================================================

/// Walker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    Ready { current: TokenId, remaining: usize },
    Done(WalkTermination),
}

/// Step-by-step walk over a graph. Yields one [`Transition`] per step.
pub struct Walker<'g> {
    graph: &'g NeighborGraph,
    profile: &'g WalkProfile,
    rng: ChaCha8Rng,
    state: WalkState,
    taken: usize,
    costs: Vec<f64>,
}

impl<'g> Walker<'g> {
    /// Validate `profile` against `graph` and enter `Ready(start, steps)`.
    pub fn new(graph: &'g NeighborGraph, profile: &'g WalkProfile, start: TokenId, seed: u64) -> Result<Self> {
        profile.validate_for(graph)?;
        graph.neighbors(start)?;
        let state = if profile.steps == 0 {
            WalkState::Done(WalkTermination::Completed)
        } else {
            WalkState::Ready { current: start, remaining: profile.steps }
        };
        Ok(Self {
            graph,
            profile,
            rng: seeded_rng(seed, WALK_STREAM),
            state,
            taken: 0,
            costs: Vec::new(),
        })
    }

    pub fn state(&self) -> WalkState {
        self.state
    }

    /// Take one transition. `Ok(None)` once the walker is `Done`.
    pub fn step(&mut self) -> Result<Option<Transition>> {
        let (current, remaining) = match self.state {
            WalkState::Done(_) => return Ok(None),
            WalkState::Ready { current, remaining } => (current, remaining),
        };

        let eligible = self.graph.neighbors_within(current, self.profile.max_flips)?;
        if eligible.is_empty() {
            self.state = WalkState::Done(WalkTermination::Exhausted { at_step: self.taken });
            return Ok(None);
        }

        let here = self.graph.features(current)?;
        self.costs.clear();
        for nb in eligible {
            let parts = cost::cost_parts(
                here,
                self.graph.features(nb.id)?,
                self.graph.frequency(nb.id)?,
                &self.profile.weights,
            );
            let total = parts.total();
            // finite terms can still overflow when summed
            if !total.is_finite() {
                return Err(Error::validation(
                    "weights",
                    format!("cost of step {} -> {} is {total}", current.0, nb.id.0),
                ));
            }
            self.costs.push(total);
        }
        let probabilities = softmax(&self.costs, self.profile.temperature)?;
        let u: f64 = self.rng.gen_range(0.0..1.0);
        let k = cost::pick(&probabilities, u);
        let next = eligible[k];

        let transition = Transition {
            from: current,
            to: next.id,
            distance: next.distance,
            flipped: here.differing(self.graph.features(next.id)?),
            cost: self.costs[k],
            probability: probabilities[k],
        };

        self.taken += 1;
        self.state = if remaining == 1 {
            WalkState::Done(WalkTermination::Completed)
        } else {
            WalkState::Ready { current: next.id, remaining: remaining - 1 }
        };
        Ok(Some(transition))
    }
}

impl Iterator for Walker<'_> {
    type Item = Result<Transition>;

    fn next(&mut self) -> Option<Self::Item> {
        self.step().transpose()
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Walk from the token whose text is `start`.
///
/// Fails with [`Error::NotFound`] for unknown text and with a validation
/// error if the profile does not fit the graph; both before the first step.
pub fn walk<C: CorpusProvider + ?Sized>(
    graph: &NeighborGraph,
    corpus: &C,
    start: &str,
    profile: &WalkProfile,
    seed: u64,
) -> Result<WalkResult> {
    profile.validate_for(graph)?;
    let id = resolve_text(corpus, start)?;
    walk_from(graph, corpus, id, profile, seed)
}

/// Walk from a token id.
pub fn walk_from<C: CorpusProvider + ?Sized>(
    graph: &NeighborGraph,
    corpus: &C,
    start: TokenId,
    profile: &WalkProfile,
    seed: u64,
) -> Result<WalkResult> {
    check_corpus(graph, corpus)?;
    let start_record = require_record(corpus, start)?;
    if graph.features(start)? != start_record.features {
        return Err(Error::validation(
            "corpus",
            format!("token '{}' differs from the corpus the graph was built from", start_record.text),
        ));
    }

    let mut walker = Walker::new(graph, profile, start, seed)?;
    let mut transitions = Vec::with_capacity(profile.steps);
    while let Some(t) = walker.step()? {
        transitions.push(t);
    }
    let termination = match walker.state() {
        WalkState::Done(t) => t,
        WalkState::Ready { .. } => unreachable!("walker stops only when done"),
    };

    let mut path = Vec::with_capacity(transitions.len() + 1);
    let mut ids = Vec::with_capacity(transitions.len() + 1);
    ids.push(start);
    path.push(start_record);
    for t in &transitions {
        ids.push(t.to);
        path.push(require_record(corpus, t.to)?);
    }

    match termination {
        WalkTermination::Completed => trace!(
            profile = profile.label(),
            start = %path[0].text,
            seed,
            steps = transitions.len(),
            "walk completed"
        ),
        WalkTermination::Exhausted { at_step } => debug!(
            profile = profile.label(),
            start = %path[0].text,
            stuck_at = %path[path.len() - 1].text,
            seed,
            at_step,
            requested = profile.steps,
            "walk exhausted: no neighbor within max_flips"
        ),
    }

    Ok(WalkResult {
        start: path[0].text.clone(),
        path,
        ids,
        transitions,
        profile: profile.clone(),
        seed,
        termination,
    })
}

/// The graph must have been built from a corpus of the same size.
fn check_corpus<C: CorpusProvider + ?Sized>(graph: &NeighborGraph, corpus: &C) -> Result<()> {
    if graph.token_count() != corpus.record_count() {
        return Err(Error::validation(
            "corpus",
            format!(
                "graph holds {} tokens but the corpus holds {}",
                graph.token_count(),
                corpus.record_count()
            ),
        ));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
