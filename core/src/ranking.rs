//! Ranked retrieval over a built index.
//!
//! Queries are normalized with the index's own [`Normalizer`] and treated as a
//! set of terms: each distinct query term adds its document weight at most
//! once. Every document is scored (in parallel), documents with a strictly
//! positive score are kept, and a stable descending sort keeps ties in
//! insertion order so identical queries always produce identical output.

use crate::config::Bm25Params;
use crate::index::{tf_in, InvertedIndex, Posting};
use crate::norms::{DocNorms, NormCache};
use crate::weighting::{self, Scheme, Weighting};
use crate::{DocNum, Result};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDoc {
    pub doc_id: String,
    pub score: f64,
}

/// Query boundary: free text plus scheme selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default = "default_k1")]
    pub k1: f64,
    #[serde(default = "default_b")]
    pub b: f64,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_scheme() -> String {
    Scheme::Ltn.as_str().to_string()
}
fn default_k1() -> f64 {
    crate::config::BM25_K1
}
fn default_b() -> f64 {
    crate::config::BM25_B
}
fn default_top_k() -> usize {
    10
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            scheme: default_scheme(),
            k1: default_k1(),
            b: default_b(),
            top_k: default_top_k(),
        }
    }

    pub fn weighting(&self) -> Result<Weighting> {
        Weighting::parse(&self.scheme, Bm25Params { k1: self.k1, b: self.b })
    }
}

/// Read-only scorer over a shared index.
///
/// Cosine norms are loaded (or computed) the first time an ltc weight is
/// requested and kept for the lifetime of the ranker.
pub struct Ranker {
    index: Arc<InvertedIndex>,
    cache: Option<NormCache>,
    norms: Mutex<Option<Arc<DocNorms>>>,
}

impl Ranker {
    pub fn new(index: Arc<InvertedIndex>) -> Self {
        Self { index, cache: None, norms: Mutex::new(None) }
    }

    /// Persists cosine norms under `cache` instead of keeping them in memory only.
    pub fn with_norm_cache(mut self, cache: NormCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn index(&self) -> &InvertedIndex {
        &self.index
    }

    pub fn doc_norms(&self) -> Arc<DocNorms> {
        let mut slot = self.norms.lock();
        if let Some(norms) = slot.as_ref() {
            return Arc::clone(norms);
        }
        let norms = Arc::new(match &self.cache {
            Some(cache) => cache.load_or_compute(&self.index),
            None => DocNorms::compute(&self.index),
        });
        *slot = Some(Arc::clone(&norms));
        norms
    }

    /// Distinct normalized query terms, sorted.
    pub fn query_terms(&self, query: &str) -> Vec<String> {
        let mut terms = self.index.normalizer().normalize(query);
        terms.sort();
        terms.dedup();
        terms
    }

    pub fn search(&self, query: &str, scheme: Scheme, top_k: usize, params: Bm25Params) -> Result<Vec<ScoredDoc>> {
        Ok(self.search_with(query, Weighting::new(scheme, params), top_k))
    }

    pub fn execute(&self, request: &SearchRequest) -> Result<Vec<ScoredDoc>> {
        let weighting = request.weighting()?;
        Ok(self.search_with(&request.query, weighting, request.top_k))
    }

    pub fn search_with(&self, query: &str, weighting: Weighting, top_k: usize) -> Vec<ScoredDoc> {
        let terms = self.query_terms(query);
        let postings: Vec<&[Posting]> = terms
            .iter()
            .map(|t| self.index.postings(t))
            .filter(|p| !p.is_empty())
            .collect();
        tracing::debug!(query, ?terms, scheme = %weighting.scheme(), "search");
        if postings.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let ctx = self.context(weighting);
        let scores: Vec<f64> = (0..self.index.doc_count() as DocNum)
            .into_par_iter()
            .map(|doc| postings.iter().map(|p| ctx.weight(p, doc)).sum::<f64>())
            .collect();

        let mut hits: Vec<(DocNum, f64)> = scores
            .into_iter()
            .enumerate()
            .filter(|(_, score)| *score > 0.0)
            .map(|(doc, score)| (doc as DocNum, score))
            .collect();
        hits.sort_by(|a, b| b.1.total_cmp(&a.1));
        hits.truncate(top_k);

        let docs = self.index.docs();
        hits.into_iter()
            .map(|(doc, score)| ScoredDoc { doc_id: docs[doc as usize].external_id.clone(), score })
            .collect()
    }

    /// Weight of a single index term in a single document.
    ///
    /// Unknown terms and unknown documents weigh 0.
    pub fn term_weight(&self, term: &str, doc_id: &str, scheme: Scheme, params: Bm25Params) -> Result<f64> {
        let weighting = Weighting::new(scheme, params);
        let Some(doc) = self.index.doc_num(doc_id) else {
            return Ok(0.0);
        };
        let postings = self.index.postings(term);
        if postings.is_empty() {
            return Ok(0.0);
        }
        Ok(self.context(weighting).weight(postings, doc))
    }

    fn context(&self, weighting: Weighting) -> ScoringContext<'_> {
        let norms = match weighting {
            Weighting::Ltc => Some(self.doc_norms()),
            _ => None,
        };
        ScoringContext {
            index: &self.index,
            n: self.index.doc_count(),
            avg_doc_len: self.index.avg_doc_length(),
            norms,
            weighting,
        }
    }
}

struct ScoringContext<'a> {
    index: &'a InvertedIndex,
    n: usize,
    avg_doc_len: f64,
    norms: Option<Arc<DocNorms>>,
    weighting: Weighting,
}

impl ScoringContext<'_> {
    fn weight(&self, postings: &[Posting], doc: DocNum) -> f64 {
        let tf = tf_in(postings, doc);
        if tf == 0 {
            return 0.0;
        }
        let df = postings.len();
        match self.weighting {
            Weighting::Ltn => weighting::ltn(tf, df, self.n),
            Weighting::Ltc => {
                let norm = self.norms.as_ref().map(|n| n.get(doc)).unwrap_or(1.0);
                weighting::ltc(weighting::ltn(tf, df, self.n), norm)
            }
            Weighting::Bm25(params) => {
                let doc_len = self.index.docs()[doc as usize].length as f64;
                weighting::bm25(tf, df, self.n, doc_len, self.avg_doc_len, params)
            }
        }
    }
}
