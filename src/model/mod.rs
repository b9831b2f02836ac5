//! # Token Model
//!
//! Plain data that crosses every boundary: corpus ↔ graph ↔ walk ↔ caller.
//!
//! Design rule: no graph state, no RNG, no I/O here.

pub mod features;
pub mod token;
pub mod walk;

pub use features::{Feature, FeatureVector, FEATURE_COUNT, FEATURE_MASK};
pub use token::{RawRecord, TokenId, TokenRecord};
pub use walk::{Transition, WalkResult, WalkTermination};
