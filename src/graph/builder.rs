//! Neighbor graph construction.
//!
//! ```text
//! corpus ─validate─▶ features[] ─bucket by signature─▶ buckets[4096]
//!        ─rayon: one row per token (probe sig ^ mask)─▶ rows ─▶ CSR graph
//! ```
//!
//! Rows are independent, so they are computed in parallel and merged in id
//! order. Construction is all-or-nothing: a cancelled build drops every row.

use std::time::Instant;

use rayon::prelude::*;
use tracing::{info, warn};

use super::{BuildStrategy, GraphConfig, Neighbor, NeighborGraph};
use crate::cancel::CancelToken;
use crate::corpus::{validate_corpus, CorpusProvider};
use crate::model::*;
use crate::{Error, Result};

/// Build with the default strategy.
///
/// Fails with a validation error if `max_neighbor_distance` is outside 1..=3
/// or any record is malformed. Both checks run before graph work begins.
pub fn build_graph<C: CorpusProvider + ?Sized>(
    corpus: &C,
    max_neighbor_distance: u8,
) -> Result<NeighborGraph> {
    build_graph_with(corpus, &GraphConfig::new(max_neighbor_distance))
}

pub fn build_graph_with<C: CorpusProvider + ?Sized>(
    corpus: &C,
    config: &GraphConfig,
) -> Result<NeighborGraph> {
    build_graph_with_cancel(corpus, config, &CancelToken::new())
}

/// Build, polling `cancel` once per row.
///
/// Returns [`Error::ConstructionCancelled`] if the token fires before the
/// last row is done.
pub fn build_graph_with_cancel<C: CorpusProvider + ?Sized>(
    corpus: &C,
    config: &GraphConfig,
    cancel: &CancelToken,
) -> Result<NeighborGraph> {
    config.validate()?;
    let records = validate_corpus(corpus)?;

    let started = Instant::now();
    let radius = config.max_neighbor_distance;
    info!(
        tokens = records.len(),
        max_neighbor_distance = radius,
        strategy = ?config.strategy,
        "building neighbor graph"
    );

    let features: Vec<FeatureVector> = records.iter().map(|r| r.features).collect();
    let frequencies: Vec<u64> = records.iter().map(|r| r.frequency).collect();
    drop(records);

    let rows = match config.strategy {
        BuildStrategy::Bucketed => bucketed_rows(&features, radius, cancel),
        BuildStrategy::Pairwise => pairwise_rows(&features, radius, cancel),
    };
    let rows = match rows {
        Ok(rows) => rows,
        Err(e) => {
            if matches!(e, Error::ConstructionCancelled) {
                warn!(elapsed_ms = started.elapsed().as_millis() as u64, "graph construction cancelled");
            }
            return Err(e);
        }
    };

    let graph = NeighborGraph::from_rows(radius, rows, features, frequencies);
    let stats = graph.stats();
    info!(
        tokens = stats.tokens,
        edges = stats.edges,
        isolated = stats.isolated,
        max_degree = stats.max_degree,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "neighbor graph built"
    );
    Ok(graph)
}

// ============================================================================
// Probe masks
// ============================================================================

/// Every 12-bit XOR mask with popcount ≤ `radius`, ordered by
/// `(popcount, value)`. 1 + 12 + 66 + 220 = 299 masks at radius 3.
pub fn probe_masks(radius: u8) -> Vec<u16> {
    let mut masks: Vec<u16> = (0..=FEATURE_MASK)
        .filter(|m| m.count_ones() <= radius as u32)
        .collect();
    masks.sort_by_key(|m| (m.count_ones(), *m));
    masks
}

// ============================================================================
// Row strategies
// ============================================================================

fn bucketed_rows(
    features: &[FeatureVector],
    radius: u8,
    cancel: &CancelToken,
) -> Result<Vec<Vec<Neighbor>>> {
    // signature → ids, ascending (pushed in id order)
    let mut buckets: Vec<Vec<u32>> = vec![Vec::new(); FEATURE_MASK as usize + 1];
    for (i, f) in features.iter().enumerate() {
        buckets[f.bits() as usize].push(i as u32);
    }
    let masks = probe_masks(radius);

    features
        .par_iter()
        .enumerate()
        .map(|(i, f)| {
            if cancel.is_cancelled() {
                return Err(Error::ConstructionCancelled);
            }
            let mut row = Vec::new();
            for &mask in &masks {
                let distance = mask.count_ones() as u8;
                for &j in &buckets[(f.bits() ^ mask) as usize] {
                    if j as usize != i {
                        row.push(Neighbor { distance, id: TokenId(j) });
                    }
                }
            }
            row.sort_unstable();
            Ok(row)
        })
        .collect()
}

fn pairwise_rows(
    features: &[FeatureVector],
    radius: u8,
    cancel: &CancelToken,
) -> Result<Vec<Vec<Neighbor>>> {
    features
        .par_iter()
        .enumerate()
        .map(|(i, a)| {
            if cancel.is_cancelled() {
                return Err(Error::ConstructionCancelled);
            }
            let mut row: Vec<Neighbor> = features
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .filter_map(|(j, b)| {
                    let distance = a.hamming(*b);
                    (distance <= radius as u32)
                        .then(|| Neighbor { distance: distance as u8, id: TokenId(j as u32) })
                })
                .collect();
            row.sort_unstable();
            Ok(row)
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
