//! # Walk Profiles
//!
//! A profile bundles everything a walk needs besides the graph, the start and
//! the seed: step count, distance budget, temperature and cost weights.
//!
//! | Preset | Name | Steps | Max flips | Temperature | Frequency weight |
//! |--------|------|-------|-----------|-------------|------------------|
//! | `Conservative` | `conservative` | 8 | 1 | 0.35 | +1.0 (common) |
//! | `Balanced` | `balanced` | 10 | 2 | 1.0 | 0.0 |
//! | `HighVariance` | `high-variance` | 12 | 2 | 2.5 | −0.75 (rare) |
//! | `Explorer` | `explorer` | 16 | 3 | 6.0 | 0.0 |
//!
//! Every preset charges 1.0 per flipped feature and has no inertia.
//!
//! `ProfileRegistry` maps names to profiles. It starts with the presets and
//! accepts custom entries, either as full `WalkProfile`s or as JSON:
//!
//! ```json
//! {
//!   "gentle": { "extends": "conservative", "steps": 20, "temperature": 0.2 },
//!   "wild":   { "extends": "explorer", "frequency_weight": -2.0 }
//! }
//! ```
//!
//! An `extends` naming another key of the same object always means that entry,
//! even when a registered profile has the same name. Unknown keys are rejected.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::graph::{NeighborGraph, MAX_NEIGHBOR_DISTANCE};
use crate::model::FEATURE_COUNT;
use crate::walk::cost::{validate_temperature, CostWeights};
use crate::{Error, Result};

// ============================================================================
// WalkProfile
// ============================================================================

/// Parameters for one walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkProfile {
    /// Registry name; `None` for ad hoc profiles.
    #[serde(default)]
    pub name: Option<String>,
    /// Number of transitions. A completed walk visits `steps + 1` tokens.
    pub steps: usize,
    /// Largest Hamming distance a single step may cover.
    pub max_flips: u8,
    /// Softmax temperature, > 0.
    pub temperature: f64,
    #[serde(default)]
    pub weights: CostWeights,
}

impl WalkProfile {
    /// Ad hoc profile with uniform flip costs and neutral frequency.
    pub fn new(steps: usize, max_flips: u8, temperature: f64) -> Self {
        Self { name: None, steps, max_flips, temperature, weights: CostWeights::default() }
    }

    pub fn with_weights(mut self, weights: CostWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_frequency_weight(mut self, weight: f64) -> Self {
        self.weights.frequency_weight = weight;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Label for logs: the registry name or `"custom"`.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("custom")
    }

    /// Checks that do not depend on a graph.
    pub fn validate(&self) -> Result<()> {
        validate_temperature(self.temperature)?;
        if !(1..=MAX_NEIGHBOR_DISTANCE).contains(&self.max_flips) {
            return Err(Error::validation(
                "max_flips",
                format!("must be in 1..={MAX_NEIGHBOR_DISTANCE}, got {}", self.max_flips),
            ));
        }
        self.weights.validate()
    }

    /// [`validate`](Self::validate) plus `max_flips <= graph radius`.
    pub fn validate_for(&self, graph: &NeighborGraph) -> Result<()> {
        self.validate()?;
        if self.max_flips > graph.max_neighbor_distance() {
            return Err(Error::validation(
                "max_flips",
                format!(
                    "profile '{}' needs max_flips {} but the graph was built with max_neighbor_distance {}",
                    self.label(),
                    self.max_flips,
                    graph.max_neighbor_distance()
                ),
            ));
        }
        Ok(())
    }
}

impl Default for WalkProfile {
    fn default() -> Self {
        Preset::Balanced.profile()
    }
}

// ============================================================================
// Presets
// ============================================================================

/// Built-in profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// Low temperature, one flip per step, favors common syllables.
    Conservative,
    /// Neutral frequency, moderate temperature.
    Balanced,
    /// Hot, favors rare syllables.
    HighVariance,
    /// Widest radius, flattest distribution.
    Explorer,
}

impl Preset {
    pub const ALL: [Preset; 4] =
        [Preset::Conservative, Preset::Balanced, Preset::HighVariance, Preset::Explorer];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Conservative => "conservative",
            Preset::Balanced => "balanced",
            Preset::HighVariance => "high-variance",
            Preset::Explorer => "explorer",
        }
    }

    pub fn profile(self) -> WalkProfile {
        let (steps, max_flips, temperature, frequency_weight) = match self {
            Preset::Conservative => (8, 1, 0.35, 1.0),
            Preset::Balanced => (10, 2, 1.0, 0.0),
            Preset::HighVariance => (12, 2, 2.5, -0.75),
            Preset::Explorer => (16, 3, 6.0, 0.0),
        };
        WalkProfile::new(steps, max_flips, temperature)
            .with_frequency_weight(frequency_weight)
            .named(self.name())
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Preset::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| Error::NotFound(format!("preset '{s}'")))
    }
}

// ============================================================================
// Overrides
// ============================================================================

/// Partial profile: every `Some` field replaces the base value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileOverrides {
    pub steps: Option<usize>,
    pub max_flips: Option<u8>,
    pub temperature: Option<f64>,
    pub frequency_weight: Option<f64>,
    pub inertia: Option<f64>,
    pub flip_costs: Option<[f64; FEATURE_COUNT]>,
}

impl ProfileOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply to `base`. The result is unnamed unless nothing was overridden.
    pub fn apply(&self, base: &WalkProfile) -> WalkProfile {
        if self.is_empty() {
            return base.clone();
        }
        let mut out = base.clone();
        out.name = None;
        if let Some(v) = self.steps { out.steps = v; }
        if let Some(v) = self.max_flips { out.max_flips = v; }
        if let Some(v) = self.temperature { out.temperature = v; }
        if let Some(v) = self.frequency_weight { out.weights.frequency_weight = v; }
        if let Some(v) = self.inertia { out.weights.inertia = v; }
        if let Some(v) = self.flip_costs { out.weights.flip_costs = v; }
        out
    }
}

/// One entry of a JSON profile file. Unknown keys are an error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ProfileSpec {
    /// Profile to start from; `balanced` when absent.
    extends: Option<String>,
    steps: Option<usize>,
    max_flips: Option<u8>,
    temperature: Option<f64>,
    frequency_weight: Option<f64>,
    inertia: Option<f64>,
    flip_costs: Option<[f64; FEATURE_COUNT]>,
}

impl ProfileSpec {
    fn overrides(&self) -> ProfileOverrides {
        ProfileOverrides {
            steps: self.steps,
            max_flips: self.max_flips,
            temperature: self.temperature,
            frequency_weight: self.frequency_weight,
            inertia: self.inertia,
            flip_costs: self.flip_costs,
        }
    }
}

// ============================================================================
// ProfileRegistry
// ============================================================================

/// Name → profile lookup.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: HashMap<String, WalkProfile>,
}

impl ProfileRegistry {
    /// Registry holding the four presets.
    pub fn new() -> Self {
        let profiles = Preset::ALL
            .into_iter()
            .map(|p| (p.name().to_string(), p.profile()))
            .collect();
        Self { profiles }
    }

    /// Registry with no entries.
    pub fn empty() -> Self {
        Self { profiles: HashMap::new() }
    }

    /// Look up a profile by name.
    pub fn get(&self, name: &str) -> Result<&WalkProfile> {
        self.profiles.get(name).ok_or_else(|| {
            Error::NotFound(format!("profile '{name}'. Available: {:?}", self.names()))
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// Register or replace a profile. Returns the replaced entry.
    pub fn register(&mut self, name: impl Into<String>, profile: WalkProfile) -> Result<Option<WalkProfile>> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::validation("name", "profile name must not be empty"));
        }
        profile.validate()?;
        let profile = profile.named(name.clone());
        tracing::debug!(profile = %name, "registered walk profile");
        Ok(self.profiles.insert(name, profile))
    }

    pub fn remove(&mut self, name: &str) -> Option<WalkProfile> {
        self.profiles.remove(name)
    }

    /// Named profile with overrides applied, validated.
    pub fn resolve(&self, name: &str, overrides: &ProfileOverrides) -> Result<WalkProfile> {
        let profile = overrides.apply(self.get(name)?);
        profile.validate()?;
        Ok(profile)
    }

    /// All names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Register every entry of a JSON object `name → {extends?, ...overrides}`.
    ///
    /// Entries may extend each other in any order. An `extends` naming a key
    /// of the same object resolves to that entry; other names (and an entry
    /// extending its own name) resolve against the registry as it was before
    /// the load. All-or-nothing on error. Returns the number registered.
    pub fn load_json(&mut self, json: &str) -> Result<usize> {
        self.load_json_names(json).map(|names| names.len())
    }

    /// [`load_json`](Self::load_json), returning the registered names sorted.
    pub fn load_json_names(&mut self, json: &str) -> Result<Vec<String>> {
        let specs: BTreeMap<String, ProfileSpec> = serde_json::from_str(json)?;
        let mut resolved = BTreeMap::new();
        for name in specs.keys() {
            self.resolve_spec(name, &specs, &mut resolved, &mut Vec::new())?;
        }

        let mut staged = self.clone();
        let mut names = Vec::with_capacity(resolved.len());
        for (name, profile) in resolved {
            staged.register(name, profile)?;
            names.push(name.to_string());
        }
        *self = staged;
        Ok(names)
    }

    /// Depth-first resolution of one JSON entry; `chain` holds the entries
    /// currently being resolved.
    fn resolve_spec<'a>(
        &self,
        name: &'a str,
        specs: &'a BTreeMap<String, ProfileSpec>,
        resolved: &mut BTreeMap<&'a str, WalkProfile>,
        chain: &mut Vec<&'a str>,
    ) -> Result<WalkProfile> {
        if let Some(done) = resolved.get(name) {
            return Ok(done.clone());
        }
        if chain.contains(&name) {
            chain.push(name);
            return Err(Error::NotFound(format!(
                "base profile for '{name}' (cyclic 'extends': {})",
                chain.join(" -> ")
            )));
        }
        let spec = specs
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("profile entry '{name}'")))?;

        chain.push(name);
        let base = match spec.extends.as_deref().unwrap_or(Preset::Balanced.name()) {
            base if base != name && specs.contains_key(base) => {
                self.resolve_spec(base, specs, resolved, chain)?
            }
            base => self
                .profiles
                .get(base)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("base profile '{base}' extended by '{name}'")))?,
        };
        chain.pop();

        let profile = spec.overrides().apply(&base);
        resolved.insert(name, profile.clone());
        Ok(profile)
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
