//! Per-document cosine norms for the ltc scheme, with an on-disk cache.
//!
//! The whole table is computed in a single pass over the postings and
//! persisted under the index [`Fingerprint`]. A table is only reused when its
//! stored fingerprint and document count match the live index; anything else
//! (missing file, corrupt bytes, stale fingerprint) is a cache miss.

use crate::index::InvertedIndex;
use crate::stats::Fingerprint;
use crate::weighting;
use crate::{DocNum, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocNorms {
    fingerprint: Fingerprint,
    /// Indexed by [`DocNum`].
    norms: Vec<f64>,
}

impl DocNorms {
    /// `sqrt(sum of ltn(t, d)^2)` for every document; 1.0 for documents with
    /// no weighted terms.
    pub fn compute(index: &InvertedIndex) -> Self {
        let n = index.doc_count();
        let mut acc = vec![0.0f64; n];
        for (_, postings) in index.terms() {
            let idf = weighting::idf(postings.len(), n);
            if idf == 0.0 {
                continue;
            }
            for p in postings {
                let w = weighting::log_tf(p.tf) * idf;
                acc[p.doc as usize] += w * w;
            }
        }
        let norms = acc
            .into_iter()
            .map(|sq| if sq > 0.0 { sq.sqrt() } else { 1.0 })
            .collect();
        tracing::debug!(num_docs = n, "computed document norms");
        Self { fingerprint: index.fingerprint(), norms }
    }

    pub fn get(&self, doc: DocNum) -> f64 {
        self.norms.get(doc as usize).copied().unwrap_or(1.0)
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.norms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.norms.is_empty()
    }

    /// True if this table was produced from an index identical to `index`.
    pub fn matches(&self, index: &InvertedIndex) -> bool {
        self.fingerprint == index.fingerprint() && self.norms.len() == index.doc_count()
    }
}

/// Directory of persisted norm tables, one file per fingerprint.
#[derive(Debug, Clone)]
pub struct NormCache {
    dir: PathBuf,
}

impl NormCache {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, fingerprint: Fingerprint) -> PathBuf {
        self.dir.join(format!("doc_norms_{fingerprint}.bin"))
    }

    /// Returns the persisted table for `index`, recomputing and overwriting it
    /// on any miss. Never fails: I/O problems only produce warnings.
    pub fn load_or_compute(&self, index: &InvertedIndex) -> DocNorms {
        let fingerprint = index.fingerprint();
        match self.load(fingerprint) {
            Ok(norms) if norms.matches(index) => {
                tracing::info!(%fingerprint, "loaded document norms from cache");
                return norms;
            }
            Ok(_) => tracing::warn!(%fingerprint, "cached document norms are stale, recomputing"),
            Err(e) if e.is_not_found() => tracing::debug!(%fingerprint, "no cached document norms"),
            Err(e) => tracing::warn!(%fingerprint, error = %e, "unreadable norm cache, recomputing"),
        }

        let norms = DocNorms::compute(index);
        match self.store(&norms) {
            Ok(path) => tracing::info!(path = %path.display(), "saved document norms"),
            Err(e) => tracing::warn!(error = %e, "failed to save document norms"),
        }
        norms
    }

    pub fn load(&self, fingerprint: Fingerprint) -> Result<DocNorms> {
        let mut f = File::open(self.path_for(fingerprint))?;
        let mut buf = Vec::new();
        f.read_to_end(&mut buf)?;
        let norms = bincode::deserialize(&buf)?;
        Ok(norms)
    }

    /// Writes through a temporary file so readers never see a partial table.
    pub fn store(&self, norms: &DocNorms) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(norms.fingerprint);
        let tmp = path.with_extension("bin.tmp");
        let bytes = bincode::serialize(norms)?;
        let mut f = File::create(&tmp)?;
        f.write_all(&bytes)?;
        f.sync_all()?;
        fs::rename(&tmp, &path)?;
        Ok(path)
    }

    /// Removes the table for `fingerprint`; returns whether one existed.
    pub fn clear(&self, fingerprint: Fingerprint) -> Result<bool> {
        match fs::remove_file(self.path_for(fingerprint)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
