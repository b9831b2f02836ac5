//! # Neighbor Graph
//!
//! Immutable adjacency over a corpus: token → every other token whose feature
//! vector lies within `max_neighbor_distance` Hamming steps, with the distance.
//!
//! ## Layout
//!
//! Compressed sparse rows. `offsets[i]..offsets[i + 1]` indexes node `i`'s
//! slice of `neighbors`, sorted by `(distance, id)`. Restricting a walk to a
//! smaller budget is therefore a prefix of the row (`partition_point`), never
//! a filter pass.
//!
//! The graph also snapshots every token's feature vector and frequency, so the
//! walk engine never goes back to the corpus provider while stepping.
//!
//! ## Invariants
//!
//! - symmetry: `b ∈ row(a)` at `d` ⇔ `a ∈ row(b)` at `d`
//! - no self-loops
//! - identical feature vectors are neighbors at distance 0

mod builder;

pub use builder::{build_graph, build_graph_with, build_graph_with_cancel, probe_masks};

use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::{Error, Result};

/// Largest accepted `max_neighbor_distance`.
pub const MAX_NEIGHBOR_DISTANCE: u8 = 3;

// ============================================================================
// Configuration
// ============================================================================

/// How rows are computed. Both produce identical graphs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStrategy {
    /// Bucket tokens by exact signature and probe every signature within the
    /// radius (at most 299 probes per token at radius 3).
    #[default]
    Bucketed,
    /// Compare every ordered pair. Reference implementation; O(n²).
    Pairwise,
}

/// Graph construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Hamming radius, 1..=3. Larger radii build slower and use more memory
    /// but allow walks with larger `max_flips`.
    pub max_neighbor_distance: u8,
    pub strategy: BuildStrategy,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self { max_neighbor_distance: 2, strategy: BuildStrategy::Bucketed }
    }
}

impl GraphConfig {
    pub fn new(max_neighbor_distance: u8) -> Self {
        Self { max_neighbor_distance, ..Self::default() }
    }

    pub fn with_strategy(mut self, strategy: BuildStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_NEIGHBOR_DISTANCE).contains(&self.max_neighbor_distance) {
            return Err(Error::validation(
                "max_neighbor_distance",
                format!(
                    "must be in 1..={MAX_NEIGHBOR_DISTANCE}, got {}",
                    self.max_neighbor_distance
                ),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Graph
// ============================================================================

/// One adjacency entry. Ordered by distance, then id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Neighbor {
    pub distance: u8,
    pub id: TokenId,
}

/// Immutable neighbor graph. Share it behind an `Arc`; reads need no locks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborGraph {
    max_distance: u8,
    offsets: Vec<usize>,
    neighbors: Vec<Neighbor>,
    features: Vec<FeatureVector>,
    frequencies: Vec<u64>,
}

impl NeighborGraph {
    /// Assemble from per-token rows, each already sorted.
    fn from_rows(
        max_distance: u8,
        rows: Vec<Vec<Neighbor>>,
        features: Vec<FeatureVector>,
        frequencies: Vec<u64>,
    ) -> Self {
        let mut offsets = Vec::with_capacity(rows.len() + 1);
        let mut neighbors = Vec::with_capacity(rows.iter().map(Vec::len).sum());
        offsets.push(0);
        for row in rows {
            neighbors.extend(row);
            offsets.push(neighbors.len());
        }
        Self { max_distance, offsets, neighbors, features, frequencies }
    }

    /// The radius this graph was built with.
    pub fn max_neighbor_distance(&self) -> u8 {
        self.max_distance
    }

    pub fn token_count(&self) -> usize {
        self.features.len()
    }

    /// Undirected edge count.
    pub fn edge_count(&self) -> usize {
        self.neighbors.len() / 2
    }

    fn check(&self, id: TokenId) -> Result<usize> {
        let i = id.index();
        if i >= self.token_count() {
            return Err(Error::NotFound(format!(
                "token {id} (graph holds {})",
                self.token_count()
            )));
        }
        Ok(i)
    }

    /// Full row of `id`, sorted by `(distance, id)`.
    pub fn neighbors(&self, id: TokenId) -> Result<&[Neighbor]> {
        let i = self.check(id)?;
        Ok(&self.neighbors[self.offsets[i]..self.offsets[i + 1]])
    }

    /// Row prefix with `distance <= max_distance`.
    pub fn neighbors_within(&self, id: TokenId, max_distance: u8) -> Result<&[Neighbor]> {
        let row = self.neighbors(id)?;
        let end = row.partition_point(|n| n.distance <= max_distance);
        Ok(&row[..end])
    }

    pub fn degree(&self, id: TokenId) -> Result<usize> {
        Ok(self.neighbors(id)?.len())
    }

    pub fn is_isolated(&self, id: TokenId) -> Result<bool> {
        Ok(self.neighbors(id)?.is_empty())
    }

    /// Distance of the edge between `a` and `b`, if present.
    pub fn edge(&self, a: TokenId, b: TokenId) -> Result<Option<u8>> {
        Ok(self.neighbors(a)?.iter().find(|n| n.id == b).map(|n| n.distance))
    }

    pub fn features(&self, id: TokenId) -> Result<FeatureVector> {
        Ok(self.features[self.check(id)?])
    }

    pub fn frequency(&self, id: TokenId) -> Result<u64> {
        Ok(self.frequencies[self.check(id)?])
    }

    /// Ids of tokens with no neighbor at this graph's radius.
    pub fn isolated(&self) -> Vec<TokenId> {
        (0..self.token_count())
            .filter(|&i| self.offsets[i] == self.offsets[i + 1])
            .map(|i| TokenId(i as u32))
            .collect()
    }

    pub fn stats(&self) -> GraphStats {
        let n = self.token_count();
        let degrees = (0..n).map(|i| self.offsets[i + 1] - self.offsets[i]);
        let (min_degree, max_degree) = degrees
            .clone()
            .fold((usize::MAX, 0), |(lo, hi), d| (lo.min(d), hi.max(d)));
        let isolated = degrees.filter(|&d| d == 0).count();

        let mut edges_by_distance = [0usize; MAX_NEIGHBOR_DISTANCE as usize + 1];
        for nb in &self.neighbors {
            edges_by_distance[nb.distance as usize] += 1;
        }
        for count in &mut edges_by_distance {
            *count /= 2;
        }

        GraphStats {
            tokens: n,
            edges: self.edge_count(),
            isolated,
            min_degree: if n == 0 { 0 } else { min_degree },
            max_degree,
            mean_degree: if n == 0 { 0.0 } else { self.neighbors.len() as f64 / n as f64 },
            edges_by_distance,
            max_neighbor_distance: self.max_distance,
        }
    }
}

/// Summary numbers for logging and capacity planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub tokens: usize,
    pub edges: usize,
    pub isolated: usize,
    pub min_degree: usize,
    pub max_degree: usize,
    pub mean_degree: f64,
    /// Undirected edges at distance 0, 1, 2, 3.
    pub edges_by_distance: [usize; MAX_NEIGHBOR_DISTANCE as usize + 1],
    pub max_neighbor_distance: u8,
}
