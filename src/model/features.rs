//! # Feature Vectors: 12-bit structural signatures
//!
//! Every token carries exactly 12 independent boolean flags describing the
//! shape of the syllable. They are packed into the low 12 bits of a `u16`:
//!
//! ```text
//! bit:   11   10    9    8  |  7    6    5  |  4    3    2    1    0
//!       CVo  CNa  CCl  Cod  | Frt  Dph  Lng | ONa  OFr  OVo  OCl  Ons
//!       └──── coda ────────┘  └─ nucleus ──┘  └────── onset ─────────┘
//! ```
//!
//! Distance between two tokens is the Hamming distance of their signatures:
//! `(a ^ b).count_ones()`. The names are descriptive labels only; nothing in
//! the graph or walk engine interprets them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Number of structural flags per token.
pub const FEATURE_COUNT: usize = 12;

/// Mask covering the valid feature bits.
pub const FEATURE_MASK: u16 = (1 << FEATURE_COUNT) - 1;

// ============================================================================
// Feature names
// ============================================================================

/// One position in a [`FeatureVector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    HasOnset = 0,
    OnsetCluster = 1,
    OnsetVoiced = 2,
    OnsetFricative = 3,
    OnsetNasal = 4,
    LongNucleus = 5,
    Diphthong = 6,
    FrontVowel = 7,
    HasCoda = 8,
    CodaCluster = 9,
    CodaNasal = 10,
    CodaVoiced = 11,
}

impl Feature {
    /// All features in bit order.
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::HasOnset,
        Feature::OnsetCluster,
        Feature::OnsetVoiced,
        Feature::OnsetFricative,
        Feature::OnsetNasal,
        Feature::LongNucleus,
        Feature::Diphthong,
        Feature::FrontVowel,
        Feature::HasCoda,
        Feature::CodaCluster,
        Feature::CodaNasal,
        Feature::CodaVoiced,
    ];

    /// Bit position (0..12).
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Feature at a bit position, if in range.
    pub fn from_index(index: usize) -> Option<Feature> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Feature::HasOnset => "has_onset",
            Feature::OnsetCluster => "onset_cluster",
            Feature::OnsetVoiced => "onset_voiced",
            Feature::OnsetFricative => "onset_fricative",
            Feature::OnsetNasal => "onset_nasal",
            Feature::LongNucleus => "long_nucleus",
            Feature::Diphthong => "diphthong",
            Feature::FrontVowel => "front_vowel",
            Feature::HasCoda => "has_coda",
            Feature::CodaCluster => "coda_cluster",
            Feature::CodaNasal => "coda_nasal",
            Feature::CodaVoiced => "coda_voiced",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// FeatureVector
// ============================================================================

/// Packed 12-flag signature. Bits above [`FEATURE_MASK`] are always zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct FeatureVector(u16);

impl FeatureVector {
    pub const EMPTY: FeatureVector = FeatureVector(0);

    /// Build from raw bits. Fails if any bit above position 11 is set.
    pub fn from_bits(bits: u16) -> Result<Self> {
        if bits & !FEATURE_MASK != 0 {
            return Err(Error::validation(
                "features",
                format!("bits {bits:#06x} exceed the {FEATURE_COUNT}-flag mask"),
            ));
        }
        Ok(Self(bits))
    }

    /// Build from a bool slice in bit order. Fails unless exactly 12 flags.
    pub fn from_flags(flags: &[bool]) -> Result<Self> {
        if flags.len() != FEATURE_COUNT {
            return Err(Error::validation(
                "features",
                format!("expected {FEATURE_COUNT} flags, got {}", flags.len()),
            ));
        }
        let bits = flags
            .iter()
            .enumerate()
            .fold(0u16, |acc, (i, &on)| if on { acc | (1 << i) } else { acc });
        Ok(Self(bits))
    }

    /// Build from the set features.
    pub fn from_features(features: impl IntoIterator<Item = Feature>) -> Self {
        Self(features.into_iter().fold(0u16, |acc, f| acc | (1 << f.index())))
    }

    #[inline]
    pub fn bits(self) -> u16 {
        self.0
    }

    #[inline]
    pub fn get(self, feature: Feature) -> bool {
        self.0 & (1 << feature.index()) != 0
    }

    #[must_use]
    pub fn with(self, feature: Feature, on: bool) -> Self {
        let bit = 1 << feature.index();
        if on { Self(self.0 | bit) } else { Self(self.0 & !bit) }
    }

    /// Flags in bit order.
    pub fn flags(self) -> [bool; FEATURE_COUNT] {
        std::array::from_fn(|i| self.0 & (1 << i) != 0)
    }

    /// Number of set flags.
    #[inline]
    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Hamming distance: number of positions where the flags differ.
    #[inline]
    pub fn hamming(self, other: FeatureVector) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// The features that differ between `self` and `other`, in bit order.
    pub fn differing(self, other: FeatureVector) -> SmallVec<[Feature; 3]> {
        let mut diff = self.0 ^ other.0;
        let mut out = SmallVec::new();
        while diff != 0 {
            let i = diff.trailing_zeros() as usize;
            out.push(Feature::ALL[i]);
            diff &= diff - 1;
        }
        out
    }

    /// True if every feature set in `mask` is also set here.
    #[inline]
    pub fn contains(self, mask: FeatureVector) -> bool {
        self.0 & mask.0 == mask.0
    }

    /// True if no feature set in `mask` is set here.
    #[inline]
    pub fn disjoint(self, mask: FeatureVector) -> bool {
        self.0 & mask.0 == 0
    }
}

impl TryFrom<u16> for FeatureVector {
    type Error = Error;

    fn try_from(bits: u16) -> Result<Self> {
        Self::from_bits(bits)
    }
}

impl From<FeatureVector> for u16 {
    fn from(v: FeatureVector) -> u16 {
        v.0
    }
}

/// Formats as 12 `0`/`1` characters, bit 0 first.
impl fmt::Display for FeatureVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for on in self.flags() {
            f.write_str(if on { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// Parses the [`Display`](fmt::Display) form. Underscores and spaces are ignored.
impl FromStr for FeatureVector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let flags = s
            .chars()
            .filter(|c| *c != '_' && !c.is_whitespace())
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                other => Err(Error::validation(
                    "features",
                    format!("invalid flag character '{other}' in \"{s}\""),
                )),
            })
            .collect::<Result<Vec<bool>>>()?;
        Self::from_flags(&flags)
    }
}

// ============================================================================
// Tests
// ============================================================================
