//! End-to-end tests for the walk engine.
//!
//! Pinned paths, profile validation before any step, exhaustion, and path
//! properties (length, locality, determinism) over random corpora.

use phonospace::walk::cost::cost_parts;
use phonospace::{
    build_graph, cost, derive_seed, walk, walk_from, CostWeights, Error, Feature, FeatureVector,
    GraphConfig, MemoryCorpus, Phonospace, StartPolicy, TokenId, TokenRecord, WalkProfile,
    WalkTermination,
};
use proptest::prelude::*;

// ============================================================================
// Helper: the five-token corpus from the graph tests.
// ============================================================================

fn five_tokens() -> MemoryCorpus {
    let rows = [
        ("ka", 120, 0b0000_0001),
        ("ki", 80, 0b0000_0011),
        ("ku", 45, 0b0000_0101),
        ("ko", 30, 0b0000_0111),
        ("ke", 10, 0b1111_0000),
    ];
    MemoryCorpus::from_records(
        rows.iter()
            .map(|&(t, f, b)| TokenRecord::new(t, f, FeatureVector::from_bits(b).unwrap()))
            .collect(),
    )
    .unwrap()
}

// ============================================================================
// 2. Pinned path
// ============================================================================

#[test]
fn test_pinned_path_from_ka() {
    let corpus = five_tokens();
    let graph = build_graph(&corpus, 1).unwrap();
    let profile = WalkProfile::new(3, 1, 0.5);

    let result = walk(&graph, &corpus, "ka", &profile, 42).unwrap();

    // every step sits on the 4-cycle with two equal-cost choices
    assert_eq!(result.texts(), vec!["ka", "ku", "ko", "ki"]);
    assert_eq!(result.ids, vec![TokenId(0), TokenId(2), TokenId(3), TokenId(1)]);
    assert_eq!(result.termination, WalkTermination::Completed);
    assert_eq!(result.start, "ka");
    assert_eq!(result.seed, 42);
    assert_eq!(result.profile, profile);

    let flipped: Vec<_> = result.transitions.iter().map(|t| t.flipped.to_vec()).collect();
    assert_eq!(
        flipped,
        vec![vec![Feature::OnsetVoiced], vec![Feature::OnsetCluster], vec![Feature::OnsetVoiced]]
    );
    for t in &result.transitions {
        assert_eq!(t.distance, 1);
        assert_eq!(t.probability, 0.5);
        assert_eq!(t.cost, 1.0);
    }
}

#[test]
fn test_pinned_path_is_stable_across_handles() {
    let space = Phonospace::build(five_tokens(), &GraphConfig::new(1)).unwrap();
    let profile = WalkProfile::new(3, 1, 0.5);
    let a = space.walk_with("ka", &profile, 42).unwrap();
    let b = space.walk_with("ka", &profile, 42).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.text("-"), "ka-ku-ko-ki");
}

#[test]
fn test_pinned_batch_from_ka() {
    let space = Phonospace::build(five_tokens(), &GraphConfig::new(1)).unwrap();
    let profile = WalkProfile::new(3, 1, 0.5);

    let batch = space
        .walk_batch(&profile, 4, 2024u64, StartPolicy::Fixed("ka".into()))
        .unwrap();

    let seeds: Vec<u64> = batch.iter().map(|r| r.seed).collect();
    assert_eq!(
        seeds,
        vec![11487996472437173461, 1793612131670815442, 5507758030568793471, 2143266886397966425]
    );
    let paths: Vec<String> = batch.iter().map(|r| r.text("-")).collect();
    assert_eq!(paths, vec!["ka-ki-ka-ku", "ka-ki-ko-ku", "ka-ki-ko-ki", "ka-ki-ka-ku"]);
    for (i, result) in batch.iter().enumerate() {
        assert_eq!(result.seed, derive_seed(2024, i as u64));
    }
}

// ============================================================================
// 3. Profile wider than the graph
// ============================================================================

#[test]
fn test_max_flips_above_radius_rejected_before_walking() {
    let corpus = five_tokens();
    let graph = build_graph(&corpus, 1).unwrap();
    let profile = WalkProfile::new(3, 2, 0.5);

    let err = walk(&graph, &corpus, "ka", &profile, 42).unwrap_err();
    assert!(matches!(err, Error::Validation { field: "max_flips", .. }), "{err}");

    // rejected even when the start token does not exist
    let err = walk(&graph, &corpus, "zz", &profile, 42).unwrap_err();
    assert!(matches!(err, Error::Validation { .. }), "{err}");
}

#[test]
fn test_bad_temperature_rejected() {
    let corpus = five_tokens();
    let graph = build_graph(&corpus, 1).unwrap();
    for t in [0.0, -0.5, f64::NAN] {
        let err = walk(&graph, &corpus, "ka", &WalkProfile::new(3, 1, t), 1).unwrap_err();
        assert!(matches!(err, Error::Validation { field: "temperature", .. }));
    }
}

// ============================================================================
// 4. Exhaustion
// ============================================================================

#[test]
fn test_isolated_token_returns_single_token_path() {
    let corpus = five_tokens();
    let graph = build_graph(&corpus, 1).unwrap();
    let profile = WalkProfile::new(5, 1, 1.0);

    let first = walk(&graph, &corpus, "ke", &profile, 7).unwrap();
    assert_eq!(first.texts(), vec!["ke"]);
    assert_eq!(first.termination, WalkTermination::Exhausted { at_step: 0 });
    assert!(first.is_empty());

    for seed in [7, 8, 9] {
        let again = walk(&graph, &corpus, "ke", &profile, seed).unwrap();
        assert_eq!(again.path, first.path);
        assert_eq!(again.termination, first.termination);
    }

    let err = first.require_complete().unwrap_err();
    assert!(matches!(err, Error::WalkExhausted { at_step: 0, requested: 5, .. }));
}

// ============================================================================
// Cost model through the public surface
// ============================================================================

#[test]
fn test_frequency_bias_shifts_choice() {
    // hub with two neighbors at distance 1 that differ only in frequency
    let corpus = MemoryCorpus::from_records(vec![
        TokenRecord::new("hub", 1, FeatureVector::from_bits(0b000).unwrap()),
        TokenRecord::new("common", 100_000, FeatureVector::from_bits(0b001).unwrap()),
        TokenRecord::new("rare", 1, FeatureVector::from_bits(0b010).unwrap()),
    ])
    .unwrap();
    let graph = build_graph(&corpus, 1).unwrap();

    let common = WalkProfile::new(1, 1, 0.1).with_frequency_weight(5.0);
    let rare = WalkProfile::new(1, 1, 0.1).with_frequency_weight(-5.0);
    for seed in 0..20 {
        assert_eq!(walk(&graph, &corpus, "hub", &common, seed).unwrap().end().unwrap().text, "common");
        assert_eq!(walk(&graph, &corpus, "hub", &rare, seed).unwrap().end().unwrap().text, "rare");
    }
}

#[test]
fn test_transition_records_cost_terms() {
    let corpus = five_tokens();
    let graph = build_graph(&corpus, 1).unwrap();
    let weights = CostWeights::uniform(2.0).with_frequency_weight(0.5);
    let profile = WalkProfile::new(1, 1, 1.0).with_weights(weights);

    let result = walk(&graph, &corpus, "ku", &profile, 3).unwrap();
    let ku = &result.path[0];
    let next = &result.path[1];
    assert!(next.text == "ka" || next.text == "ko", "{}", next.text);
    assert_eq!(result.transitions[0].cost, cost(ku, next, &weights));
    let parts = cost_parts(ku.features, next.features, next.frequency, &weights);
    assert_eq!(parts.structural, 2.0);
    assert!((parts.frequency + 0.5 * (next.frequency as f64).ln()).abs() < 1e-12);
}

// ============================================================================
// Properties over random corpora
// ============================================================================

fn corpus_strategy() -> impl Strategy<Value = MemoryCorpus> {
    prop::collection::vec((0u16..128, 0u64..1000), 1..60).prop_map(|rows| {
        MemoryCorpus::from_records(
            rows.into_iter()
                .enumerate()
                .map(|(i, (b, f))| TokenRecord::new(format!("t{i}"), f, FeatureVector::from_bits(b).unwrap()))
                .collect(),
        )
        .unwrap()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_walks_are_local_and_sized(
        corpus in corpus_strategy(),
        radius in 1u8..=3,
        flips in 1u8..=3,
        steps in 0usize..25,
        temperature in 0.05f64..8.0,
        frequency_weight in -2.0f64..2.0,
        start in any::<prop::sample::Index>(),
        seed in any::<u64>(),
    ) {
        let graph = build_graph(&corpus, radius).unwrap();
        let profile = WalkProfile::new(steps, flips.min(radius), temperature)
            .with_frequency_weight(frequency_weight);
        let start = TokenId(start.index(corpus.len()) as u32);

        let result = walk_from(&graph, &corpus, start, &profile, seed).unwrap();

        prop_assert_eq!(result.path.len(), result.transitions.len() + 1);
        prop_assert_eq!(result.ids[0], start);
        match result.termination {
            WalkTermination::Completed => prop_assert_eq!(result.path.len(), steps + 1),
            WalkTermination::Exhausted { at_step } => {
                prop_assert_eq!(at_step, result.transitions.len());
                prop_assert!(at_step < steps);
                prop_assert!(graph.neighbors_within(*result.ids.last().unwrap(), profile.max_flips).unwrap().is_empty());
            }
        }
        for pair in result.path.windows(2) {
            prop_assert!(pair[0].features.hamming(pair[1].features) <= profile.max_flips as u32);
        }

        let again = walk_from(&graph, &corpus, start, &profile, seed).unwrap();
        prop_assert_eq!(result, again);
    }

    #[test]
    fn prop_zero_frequency_weight_ignores_frequency(
        current in 0u16..4096,
        candidate in 0u16..4096,
        freq_a in any::<u64>(),
        freq_b in any::<u64>(),
        flip_cost in 0.0f64..10.0,
        inertia in -3.0f64..3.0,
    ) {
        let weights = CostWeights::uniform(flip_cost).with_inertia(inertia);
        let cur = TokenRecord::new("cur", 1, FeatureVector::from_bits(current).unwrap());
        let a = TokenRecord::new("a", freq_a, FeatureVector::from_bits(candidate).unwrap());
        let b = TokenRecord::new("b", freq_b, FeatureVector::from_bits(candidate).unwrap());
        prop_assert_eq!(cost(&cur, &a, &weights), cost(&cur, &b, &weights));
    }
}
