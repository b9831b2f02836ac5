//! # Corpus Provider Trait
//!
//! This is THE contract between phonospace and whatever holds the records.
//! A flat serialized file, an indexed store, or a fixture in a test all look
//! the same to the graph builder and the walk engine.
//!
//! ## Implementations
//!
//! | Provider | Module | Description |
//! |----------|--------|-------------|
//! | `MemoryCorpus` | `memory` | Vec of records + hashed text index |

pub mod memory;

use crate::model::*;
use crate::{Error, Result};

pub use memory::MemoryCorpus;

// ============================================================================
// CorpusProvider Trait
// ============================================================================

/// Read-only access to a corpus of token records.
///
/// Ids are dense: every `TokenId(i)` with `i < record_count()` must resolve,
/// and `index_of(text)` must agree with `record_at`.
pub trait CorpusProvider: Send + Sync {
    /// Number of records.
    fn record_count(&self) -> usize;

    /// Record by dense id. `Ok(None)` when out of range.
    fn record_at(&self, id: TokenId) -> Result<Option<TokenRecord>>;

    /// Id of the record with exactly this text.
    fn index_of(&self, text: &str) -> Option<TokenId>;

    /// Every record in id order.
    ///
    /// Default: one `record_at` call per id.
    fn scan(&self) -> Result<Vec<TokenRecord>> {
        let mut out = Vec::with_capacity(self.record_count());
        for i in 0..self.record_count() {
            out.push(require_record(self, TokenId(i as u32))?);
        }
        Ok(out)
    }
}

impl<C: CorpusProvider + ?Sized> CorpusProvider for std::sync::Arc<C> {
    fn record_count(&self) -> usize {
        (**self).record_count()
    }

    fn record_at(&self, id: TokenId) -> Result<Option<TokenRecord>> {
        (**self).record_at(id)
    }

    fn index_of(&self, text: &str) -> Option<TokenId> {
        (**self).index_of(text)
    }

    fn scan(&self) -> Result<Vec<TokenRecord>> {
        (**self).scan()
    }
}

/// `record_at` that treats a missing id as [`Error::NotFound`].
pub fn require_record<C: CorpusProvider + ?Sized>(corpus: &C, id: TokenId) -> Result<TokenRecord> {
    corpus
        .record_at(id)?
        .ok_or_else(|| Error::NotFound(format!("token {id} (corpus holds {})", corpus.record_count())))
}

/// Resolve a start token by text.
pub fn resolve_text<C: CorpusProvider + ?Sized>(corpus: &C, text: &str) -> Result<TokenId> {
    corpus
        .index_of(text)
        .ok_or_else(|| Error::NotFound(format!("token '{text}'")))
}

// ============================================================================
// Validation
// ============================================================================

/// Load and check every record before any graph work starts.
///
/// Fails on empty text, ids that do not resolve, and text indexes that
/// disagree with the records (duplicates included).
pub fn validate_corpus<C: CorpusProvider + ?Sized>(corpus: &C) -> Result<Vec<TokenRecord>> {
    let count = corpus.record_count();
    if count > u32::MAX as usize {
        return Err(Error::validation(
            "corpus",
            format!("{count} records exceed the u32 id space"),
        ));
    }

    let records = corpus.scan()?;
    if records.len() != count {
        return Err(Error::validation(
            "corpus",
            format!("scan returned {} records, record_count() is {count}", records.len()),
        ));
    }

    for (i, record) in records.iter().enumerate() {
        record.validate().map_err(|e| match e {
            Error::Validation { field, message } => {
                Error::Validation { field, message: format!("record {i}: {message}") }
            }
            other => other,
        })?;
        match corpus.index_of(&record.text) {
            Some(TokenId(j)) if j as usize == i => {}
            Some(other) => {
                return Err(Error::validation(
                    "text",
                    format!("token '{}' at #{i} is indexed as {other} (duplicate text?)", record.text),
                ));
            }
            None => {
                return Err(Error::validation(
                    "text",
                    format!("token '{}' at #{i} is missing from the text index", record.text),
                ));
            }
        }
    }

    Ok(records)
}

// ============================================================================
// Search
// ============================================================================

/// Discovery query for callers picking start tokens.
pub enum TokenQuery<'a> {
    /// Text contains the needle.
    Substring(&'a str),
    /// Text starts with the needle.
    Prefix(&'a str),
    /// All `required` flags set and no `forbidden` flag set.
    Features { required: FeatureVector, forbidden: FeatureVector },
    /// Arbitrary predicate.
    Predicate(&'a (dyn Fn(&TokenRecord) -> bool + Sync)),
}

impl TokenQuery<'_> {
    pub fn matches(&self, record: &TokenRecord) -> bool {
        match self {
            TokenQuery::Substring(needle) => record.text.contains(needle),
            TokenQuery::Prefix(needle) => record.text.starts_with(needle),
            TokenQuery::Features { required, forbidden } => {
                record.features.contains(*required) && record.features.disjoint(*forbidden)
            }
            TokenQuery::Predicate(pred) => pred(record),
        }
    }
}

/// All records matching `query`, in id order.
pub fn search<C: CorpusProvider + ?Sized>(corpus: &C, query: &TokenQuery<'_>) -> Result<Vec<TokenRecord>> {
    Ok(corpus.scan()?.into_iter().filter(|r| query.matches(r)).collect())
}

/// Up to `limit` matches, most frequent first (ties by id).
pub fn search_limit<C: CorpusProvider + ?Sized>(
    corpus: &C,
    query: &TokenQuery<'_>,
    limit: usize,
) -> Result<Vec<TokenRecord>> {
    let mut hits = search(corpus, query)?;
    // stable sort keeps id order among equal frequencies
    hits.sort_by(|a, b| b.frequency.cmp(&a.frequency));
    hits.truncate(limit);
    Ok(hits)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn fv(bits: u16) -> FeatureVector {
        FeatureVector::from_bits(bits).unwrap()
    }

    fn corpus() -> MemoryCorpus {
        MemoryCorpus::from_records(vec![
            TokenRecord::new("ka", 50, fv(0b0001)),
            TokenRecord::new("kan", 10, fv(0b1_0000_0001)),
            TokenRecord::new("ta", 80, fv(0b0101)),
            TokenRecord::new("an", 10, fv(0b1_0000_0000)),
        ])
        .unwrap()
    }

    #[test]
    fn substring_and_prefix() {
        let c = corpus();
        let hits = search(&c, &TokenQuery::Substring("an")).unwrap();
        let texts: Vec<_> = hits.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["kan", "an"]);

        let hits = search(&c, &TokenQuery::Prefix("k")).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn feature_query() {
        let c = corpus();
        let q = TokenQuery::Features {
            required: FeatureVector::from_features([Feature::HasOnset]),
            forbidden: FeatureVector::from_features([Feature::HasCoda]),
        };
        let texts: Vec<_> = search(&c, &q).unwrap().into_iter().map(|r| r.text).collect();
        assert_eq!(texts, vec!["ka", "ta"]);
    }

    #[test]
    fn predicate_query() {
        let c = corpus();
        let pred = |r: &TokenRecord| r.frequency >= 50;
        let hits = search(&c, &TokenQuery::Predicate(&pred)).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn search_limit_orders_by_frequency() {
        let c = corpus();
        let pred = |_: &TokenRecord| true;
        let hits = search_limit(&c, &TokenQuery::Predicate(&pred), 3).unwrap();
        let texts: Vec<_> = hits.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["ta", "ka", "kan"]);
    }

    #[test]
    fn require_record_out_of_range() {
        let c = corpus();
        assert!(require_record(&c, TokenId(3)).is_ok());
        assert!(matches!(require_record(&c, TokenId(4)), Err(Error::NotFound(_))));
    }

    #[test]
    fn resolve_unknown_text() {
        let c = corpus();
        assert_eq!(resolve_text(&c, "ta").unwrap(), TokenId(2));
        assert!(matches!(resolve_text(&c, "zz"), Err(Error::NotFound(_))));
    }

    /// Provider whose text index disagrees with its records.
    struct Skewed(MemoryCorpus);

    impl CorpusProvider for Skewed {
        fn record_count(&self) -> usize { self.0.record_count() }
        fn record_at(&self, id: TokenId) -> Result<Option<TokenRecord>> { self.0.record_at(id) }
        fn index_of(&self, _text: &str) -> Option<TokenId> { Some(TokenId(0)) }
    }

    #[test]
    fn validate_catches_inconsistent_index() {
        assert!(validate_corpus(&corpus()).is_ok());
        let err = validate_corpus(&Skewed(corpus())).unwrap_err();
        assert!(matches!(err, Error::Validation { field: "text", .. }));
    }
}
