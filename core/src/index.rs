//! Inverted index mapping terms to per-document term frequencies.
//!
//! Documents get an internal [`DocNum`] in insertion order. Every postings
//! list is kept sorted by that ordinal, which falls out of the append-only
//! build: a new document always has the largest ordinal so far.

use crate::stats::{Fingerprint, TokenStats};
use crate::tokenizer::Normalizer;
use crate::{DocNum, Error, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single entry in a term's postings list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc: DocNum,
    /// Number of times the term appears in this document.
    pub tf: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocEntry {
    pub external_id: String,
    /// Number of terms after normalization.
    pub length: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvertedIndex {
    normalizer: Normalizer,
    postings: HashMap<String, Vec<Posting>>,
    docs: Vec<DocEntry>,
    doc_lookup: HashMap<String, DocNum>,
    total_terms: u64,
    token_stats: TokenStats,
}

impl InvertedIndex {
    pub fn new(normalizer: Normalizer) -> Self {
        Self { normalizer, ..Self::default() }
    }

    /// Builds an index from in-memory documents across the rayon pool.
    ///
    /// Each worker indexes a contiguous slice into its own local index; the
    /// partial indexes are then merged in input order, so ordinals match a
    /// sequential build over the same input.
    pub fn build_parallel(normalizer: &Normalizer, docs: &[(String, String)]) -> Result<Self> {
        let chunk = (docs.len() / rayon::current_num_threads()).max(1);
        let parts: Vec<Result<InvertedIndex>> = docs
            .par_chunks(chunk)
            .map(|part| {
                let mut local = InvertedIndex::new(normalizer.clone());
                for (id, text) in part {
                    local.add_document(id.clone(), text)?;
                }
                Ok(local)
            })
            .collect();

        let mut merged = InvertedIndex::new(normalizer.clone());
        for part in parts {
            merged.merge(part?)?;
        }
        tracing::info!(
            num_docs = merged.doc_count(),
            vocabulary = merged.vocabulary_size(),
            "parallel build complete"
        );
        Ok(merged)
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Normalizes `text` and records its term frequencies under `doc_id`.
    ///
    /// Rejects an id that was already added instead of overwriting it.
    pub fn add_document(&mut self, doc_id: impl Into<String>, text: &str) -> Result<DocNum> {
        let doc_id = doc_id.into();
        if self.doc_lookup.contains_key(&doc_id) {
            return Err(Error::DuplicateDocument(doc_id));
        }

        let tokens = self.normalizer.tokenize(text);
        self.token_stats.record(&tokens);
        let terms = self.normalizer.process(tokens);
        let length = terms.len() as u32;

        let mut tf_counts: HashMap<String, u32> = HashMap::new();
        for term in terms {
            *tf_counts.entry(term).or_insert(0) += 1;
        }

        let doc = self.docs.len() as DocNum;
        for (term, tf) in tf_counts {
            self.postings.entry(term).or_default().push(Posting { doc, tf });
        }
        self.total_terms += length as u64;
        self.doc_lookup.insert(doc_id.clone(), doc);
        self.docs.push(DocEntry { external_id: doc_id, length });
        Ok(doc)
    }

    /// External ids of the documents containing `term`, sorted by id.
    pub fn get_postings(&self, term: &str) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .postings(term)
            .iter()
            .map(|p| self.docs[p.doc as usize].external_id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Raw postings for `term`, sorted by document ordinal. Empty if unseen.
    pub fn postings(&self, term: &str) -> &[Posting] {
        self.postings.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn document_frequency(&self, term: &str) -> usize {
        self.postings(term).len()
    }

    pub fn term_frequency(&self, term: &str, doc_id: &str) -> u32 {
        match self.doc_num(doc_id) {
            Some(doc) => tf_in(self.postings(term), doc),
            None => 0,
        }
    }

    pub fn vocabulary_size(&self) -> usize {
        self.postings.len()
    }

    pub fn terms(&self) -> impl Iterator<Item = (&str, &[Posting])> + '_ {
        self.postings.iter().map(|(t, p)| (t.as_str(), p.as_slice()))
    }

    pub fn doc_count(&self) -> usize {
        self.docs.len()
    }

    pub fn docs(&self) -> &[DocEntry] {
        &self.docs
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.docs.iter().map(|d| d.external_id.as_str())
    }

    pub fn doc_num(&self, doc_id: &str) -> Option<DocNum> {
        self.doc_lookup.get(doc_id).copied()
    }

    pub fn contains_document(&self, doc_id: &str) -> bool {
        self.doc_lookup.contains_key(doc_id)
    }

    pub fn document_length(&self, doc_id: &str) -> Option<u32> {
        self.doc_num(doc_id).map(|d| self.docs[d as usize].length)
    }

    /// Sum of all document lengths.
    pub fn total_terms(&self) -> u64 {
        self.total_terms
    }

    pub fn avg_doc_length(&self) -> f64 {
        if self.docs.is_empty() {
            return 0.0;
        }
        self.total_terms as f64 / self.docs.len() as f64
    }

    pub fn token_stats(&self) -> &TokenStats {
        &self.token_stats
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(self)
    }

    /// Drops every document and term and starts over under `normalizer`.
    pub fn reset(&mut self, normalizer: Normalizer) {
        *self = InvertedIndex::new(normalizer);
    }

    /// Appends a disjoint index built with the same normalizer configuration.
    ///
    /// The other index's documents are renumbered after this index's own.
    /// Nothing is modified if any document id already exists here.
    pub fn merge(&mut self, other: InvertedIndex) -> Result<()> {
        if self.normalizer != other.normalizer {
            return Err(Error::ConfigMismatch);
        }
        if let Some(dup) = other.docs.iter().find(|d| self.doc_lookup.contains_key(&d.external_id)) {
            return Err(Error::DuplicateDocument(dup.external_id.clone()));
        }

        let offset = self.docs.len() as DocNum;
        for (term, plist) in other.postings {
            self.postings
                .entry(term)
                .or_default()
                .extend(plist.into_iter().map(|p| Posting { doc: p.doc + offset, tf: p.tf }));
        }
        for entry in other.docs {
            let doc = self.docs.len() as DocNum;
            self.doc_lookup.insert(entry.external_id.clone(), doc);
            self.docs.push(entry);
        }
        self.total_terms += other.total_terms;
        self.token_stats.absorb(other.token_stats);
        Ok(())
    }
}

/// Term frequency of `doc` in a sorted postings list, 0 if absent.
pub(crate) fn tf_in(postings: &[Posting], doc: DocNum) -> u32 {
    postings
        .binary_search_by_key(&doc, |p| p.doc)
        .map(|i| postings[i].tf)
        .unwrap_or(0)
}
