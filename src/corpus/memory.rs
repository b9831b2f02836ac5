//! In-memory corpus provider.
//!
//! This is the reference implementation of `CorpusProvider`: a `Vec` of
//! records in id order plus a hashed text → id index.
//!
//! Use this provider for:
//! - Tests and fixtures
//! - Corpora small enough to load whole (the common case: tens of thousands
//!   of syllables fit comfortably)
//! - Snapshotting another provider via [`MemoryCorpus::snapshot`]

use hashbrown::HashMap;

use crate::model::*;
use crate::{Error, Result};
use super::CorpusProvider;

// ============================================================================
// MemoryCorpus
// ============================================================================

/// Immutable in-memory record store.
#[derive(Debug, Clone, Default)]
pub struct MemoryCorpus {
    records: Vec<TokenRecord>,
    /// text → id
    text_index: HashMap<String, TokenId>,
}

impl MemoryCorpus {
    /// Build from validated records. Duplicate or empty texts are rejected.
    pub fn from_records(records: Vec<TokenRecord>) -> Result<Self> {
        if records.len() > u32::MAX as usize {
            return Err(Error::validation(
                "corpus",
                format!("{} records exceed the u32 id space", records.len()),
            ));
        }

        let mut text_index = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            record.validate()?;
            if let Some(prev) = text_index.insert(record.text.clone(), TokenId(i as u32)) {
                return Err(Error::validation(
                    "text",
                    format!("duplicate token '{}' at #{i} (first seen at {prev})", record.text),
                ));
            }
        }

        tracing::debug!(records = records.len(), "memory corpus loaded");
        Ok(Self { records, text_index })
    }

    /// Validate raw records (frequency sign, flag count) and build.
    pub fn from_raw(raw: impl IntoIterator<Item = RawRecord>) -> Result<Self> {
        let records = raw
            .into_iter()
            .map(TokenRecord::try_from)
            .collect::<Result<Vec<_>>>()?;
        Self::from_records(records)
    }

    /// Parse a JSON array of [`RawRecord`]s:
    ///
    /// ```json
    /// [{"text": "ka", "frequency": 120, "features": [true, false, ...]}]
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: Vec<RawRecord> = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    /// Copy every record out of another provider.
    pub fn snapshot<C: CorpusProvider + ?Sized>(source: &C) -> Result<Self> {
        Self::from_records(source.scan()?)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Borrowing accessor; the trait method clones.
    pub fn get(&self, id: TokenId) -> Option<&TokenRecord> {
        self.records.get(id.index())
    }

    pub fn records(&self) -> &[TokenRecord] {
        &self.records
    }
}

// ============================================================================
// CorpusProvider impl
// ============================================================================

impl CorpusProvider for MemoryCorpus {
    fn record_count(&self) -> usize {
        self.records.len()
    }

    fn record_at(&self, id: TokenId) -> Result<Option<TokenRecord>> {
        Ok(self.records.get(id.index()).cloned())
    }

    fn index_of(&self, text: &str) -> Option<TokenId> {
        self.text_index.get(text).copied()
    }

    fn scan(&self) -> Result<Vec<TokenRecord>> {
        Ok(self.records.clone())
    }
}

// ============================================================================
// Tests
// ============================================================================
