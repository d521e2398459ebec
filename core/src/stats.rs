//! Collection statistics and the index configuration fingerprint.

use crate::config::Alphabet;
use crate::index::InvertedIndex;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::HashSet;
use std::fmt;

/// Raw-token counters gathered before stop-word removal and stemming.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenStats {
    pub total_tokens: u64,
    pub distinct: HashSet<String>,
}

impl TokenStats {
    pub fn record(&mut self, tokens: &[String]) {
        self.total_tokens += tokens.len() as u64;
        for t in tokens {
            if !self.distinct.contains(t) {
                self.distinct.insert(t.clone());
            }
        }
    }

    pub fn absorb(&mut self, other: TokenStats) {
        self.total_tokens += other.total_tokens;
        self.distinct.extend(other.distinct);
    }
}

/// Summary figures for a built index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionStatistics {
    pub doc_count: usize,
    pub total_tokens: u64,
    pub distinct_tokens: usize,
    /// Mean length in characters of the distinct raw tokens.
    pub avg_token_length: f64,
    pub total_terms: u64,
    pub vocabulary_size: usize,
    pub avg_doc_length: f64,
    /// Mean length in characters of the vocabulary terms.
    pub avg_term_length: f64,
}

impl CollectionStatistics {
    pub fn from_index(index: &InvertedIndex) -> Self {
        let tokens = index.token_stats();
        let distinct_tokens = tokens.distinct.len();
        let token_chars: usize = tokens.distinct.iter().map(|t| t.chars().count()).sum();
        let vocabulary_size = index.vocabulary_size();
        let term_chars: usize = index.terms().map(|(t, _)| t.chars().count()).sum();
        Self {
            doc_count: index.doc_count(),
            total_tokens: tokens.total_tokens,
            distinct_tokens,
            avg_token_length: mean(token_chars as f64, distinct_tokens),
            total_terms: index.total_terms(),
            vocabulary_size,
            avg_doc_length: index.avg_doc_length(),
            avg_term_length: mean(term_chars as f64, vocabulary_size),
        }
    }
}

fn mean(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

/// Stable 64-bit identity of an index and the configuration that built it.
///
/// Covers the processing flags and the full content: every document id and
/// length in ordinal order, then every term in sorted order with its
/// postings. Collections that only share their shape hash differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub u64);

impl Fingerprint {
    pub fn of(index: &InvertedIndex) -> Self {
        let config = index.normalizer().config();
        let mut hasher = Sha1::new();
        hasher.update((index.doc_count() as u64).to_le_bytes());
        hasher.update(index.total_terms().to_le_bytes());
        hasher.update((index.vocabulary_size() as u64).to_le_bytes());
        hasher.update([config.stop_words_enabled() as u8, config.stemming as u8]);
        hasher.update(match config.alphabet {
            Alphabet::Ascii => [0u8],
            Alphabet::Unicode => [1u8],
        });
        for doc in index.docs() {
            update_str(&mut hasher, &doc.external_id);
            hasher.update(doc.length.to_le_bytes());
        }
        let mut terms: Vec<_> = index.terms().collect();
        terms.sort_unstable_by(|a, b| a.0.cmp(b.0));
        for (term, postings) in terms {
            update_str(&mut hasher, term);
            hasher.update((postings.len() as u64).to_le_bytes());
            for p in postings {
                hasher.update(p.doc.to_le_bytes());
                hasher.update(p.tf.to_le_bytes());
            }
        }
        let digest = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        Fingerprint(u64::from_be_bytes(head))
    }
}

// length-prefixed so adjacent strings cannot run together
fn update_str(hasher: &mut Sha1, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Normalizer, NormalizerConfig};

    fn sample(config: NormalizerConfig) -> InvertedIndex {
        let mut idx = InvertedIndex::new(Normalizer::new(config));
        idx.add_document("d1", "the cat sat").unwrap();
        idx.add_document("d2", "the dog sat on the mat").unwrap();
        idx
    }

    #[test]
    fn statistics_of_small_collection() {
        let stats = CollectionStatistics::from_index(&sample(NormalizerConfig::new()));
        assert_eq!(stats.doc_count, 2);
        assert_eq!(stats.total_tokens, 9);
        assert_eq!(stats.total_terms, 9);
        // the cat sat dog on mat
        assert_eq!(stats.distinct_tokens, 6);
        assert_eq!(stats.vocabulary_size, 6);
        assert!((stats.avg_doc_length - 4.5).abs() < 1e-12);
        assert!((stats.avg_term_length - 17.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn empty_index_statistics_are_zero() {
        let stats = CollectionStatistics::from_index(&InvertedIndex::default());
        assert_eq!(stats.doc_count, 0);
        assert_eq!(stats.avg_doc_length, 0.0);
        assert_eq!(stats.avg_token_length, 0.0);
    }

    #[test]
    fn fingerprint_is_stable_for_equal_builds() {
        let a = sample(NormalizerConfig::new());
        let b = sample(NormalizerConfig::new());
        assert_eq!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn fingerprint_tracks_processing_options() {
        let plain = Fingerprint::of(&sample(NormalizerConfig::new()));
        let stemmed = Fingerprint::of(&sample(NormalizerConfig::new().with_stemming(true)));
        assert_ne!(plain, stemmed);
    }

    #[test]
    fn fingerprint_tracks_document_count() {
        let mut idx = sample(NormalizerConfig::new());
        let before = Fingerprint::of(&idx);
        idx.add_document("d3", "").unwrap();
        assert_ne!(before, Fingerprint::of(&idx));
    }

    fn build(docs: &[(&str, &str)]) -> InvertedIndex {
        let mut idx = InvertedIndex::new(Normalizer::default());
        for (id, text) in docs {
            idx.add_document(*id, text).unwrap();
        }
        idx
    }

    #[test]
    fn fingerprint_tracks_content_not_just_shape() {
        // same doc count, term count and vocabulary size
        let a = build(&[("d1", "cat cat"), ("d2", "dog sat")]);
        let b = build(&[("d1", "fox ran"), ("d2", "owl owl")]);
        assert_eq!(a.vocabulary_size(), b.vocabulary_size());
        assert_eq!(a.total_terms(), b.total_terms());
        assert_ne!(Fingerprint::of(&a), Fingerprint::of(&b));

        let renamed = build(&[("d1", "cat cat"), ("d3", "dog sat")]);
        assert_ne!(Fingerprint::of(&a), Fingerprint::of(&renamed));
        let moved_tf = build(&[("d1", "cat dog"), ("d2", "cat sat")]);
        assert_ne!(Fingerprint::of(&a), Fingerprint::of(&moved_tf));
    }

    #[test]
    fn fingerprint_ignores_build_strategy() {
        let docs: Vec<(String, String)> = (0..40)
            .map(|i| (format!("d{i}"), format!("word{} shared term{}", i % 7, i % 3)))
            .collect();
        let normalizer = Normalizer::default();
        let parallel = InvertedIndex::build_parallel(&normalizer, &docs).unwrap();
        let mut sequential = InvertedIndex::new(normalizer);
        for (id, text) in &docs {
            sequential.add_document(id.clone(), text).unwrap();
        }
        assert_eq!(Fingerprint::of(&parallel), Fingerprint::of(&sequential));
    }
}
