//! WalkResult: the path a walk produced, plus everything needed to replay it.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{Feature, TokenId, TokenRecord};
use crate::profile::WalkProfile;
use crate::{Error, Result};

/// How a walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WalkTermination {
    /// All requested steps were taken.
    Completed,
    /// The node reached after `at_step` transitions had no eligible neighbor.
    Exhausted { at_step: usize },
}

/// One transition `from → to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub from: TokenId,
    pub to: TokenId,
    /// Hamming distance between the two feature vectors.
    pub distance: u8,
    pub flipped: SmallVec<[Feature; 3]>,
    pub cost: f64,
    /// Probability the chosen candidate had under the softmax.
    pub probability: f64,
}

/// Result of one walk. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkResult {
    /// Tokens visited, start first. `profile.steps + 1` long when completed.
    pub path: Vec<TokenRecord>,
    pub ids: Vec<TokenId>,
    /// One entry per step taken; always `path.len() - 1` long.
    pub transitions: Vec<Transition>,
    pub profile: WalkProfile,
    pub start: String,
    pub seed: u64,
    pub termination: WalkTermination,
}

impl WalkResult {
    /// Number of transitions actually taken.
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.termination == WalkTermination::Completed
    }

    /// Last token visited; `None` only for a hand-built or deserialized empty path.
    pub fn end(&self) -> Option<&TokenRecord> {
        self.path.last()
    }

    /// Path texts in order.
    pub fn texts(&self) -> Vec<&str> {
        self.path.iter().map(|t| t.text.as_str()).collect()
    }

    /// Path texts joined with `sep`.
    pub fn text(&self, sep: &str) -> String {
        self.texts().join(sep)
    }

    /// Turn an exhausted walk into [`Error::WalkExhausted`].
    pub fn require_complete(self) -> Result<Self> {
        match self.termination {
            WalkTermination::Completed => Ok(self),
            WalkTermination::Exhausted { at_step } => Err(Error::WalkExhausted {
                token: self.end().map_or_else(|| self.start.clone(), |t| t.text.clone()),
                at_step,
                requested: self.profile.steps,
            }),
        }
    }
}
