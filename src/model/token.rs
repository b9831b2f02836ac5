//! Token (syllable) record.

use serde::{Deserialize, Serialize};

use super::FeatureVector;
use crate::{Error, Result};

/// Dense token identifier: the record's position in its corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenId(pub u32);

impl TokenId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One syllable in the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenRecord {
    pub text: String,
    /// Occurrence count in the source corpus.
    pub frequency: u64,
    pub features: FeatureVector,
}

impl TokenRecord {
    pub fn new(text: impl Into<String>, frequency: u64, features: FeatureVector) -> Self {
        Self { text: text.into(), frequency, features }
    }

    /// `ln(frequency)`, with frequency 0 clamped to 1 so the result is 0.
    #[inline]
    pub fn log_frequency(&self) -> f64 {
        log_frequency(self.frequency)
    }

    pub fn validate(&self) -> Result<()> {
        if self.text.is_empty() {
            return Err(Error::validation("text", "token text must not be empty"));
        }
        Ok(())
    }
}

#[inline]
pub(crate) fn log_frequency(frequency: u64) -> f64 {
    (frequency.max(1) as f64).ln()
}

/// Unvalidated record as handed over by a loader or feature tagger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub text: String,
    pub frequency: i64,
    pub features: Vec<bool>,
}

impl TryFrom<RawRecord> for TokenRecord {
    type Error = Error;

    fn try_from(raw: RawRecord) -> Result<Self> {
        if raw.frequency < 0 {
            return Err(Error::validation(
                "frequency",
                format!("token '{}' has negative frequency {}", raw.text, raw.frequency),
            ));
        }
        let features = FeatureVector::from_flags(&raw.features).map_err(|e| match e {
            Error::Validation { field, message } => {
                Error::Validation { field, message: format!("token '{}': {message}", raw.text) }
            }
            other => other,
        })?;
        let record = TokenRecord::new(raw.text, raw.frequency as u64, features);
        record.validate()?;
        Ok(record)
    }
}
