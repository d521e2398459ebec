use crate::norms::NormCache;
use crate::ranking::Ranker;
use crate::stats::Fingerprint;
use crate::{InvertedIndex, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u64,
    pub vocabulary_size: u64,
    pub fingerprint: Fingerprint,
    pub stop_words: bool,
    pub stemming: bool,
    pub created_at: String,
    pub version: u32,
}

impl MetaFile {
    pub fn describe(index: &InvertedIndex, created_at: impl Into<String>) -> Self {
        let config = index.normalizer().config();
        Self {
            num_docs: index.doc_count() as u64,
            vocabulary_size: index.vocabulary_size() as u64,
            fingerprint: index.fingerprint(),
            stop_words: config.stop_words_enabled(),
            stemming: config.stemming,
            created_at: created_at.into(),
            version: FORMAT_VERSION,
        }
    }
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn index(&self) -> PathBuf { self.root.join("index.bin") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn norm_cache_dir(&self) -> PathBuf { self.root.join("norm_cache") }

    pub fn norm_cache(&self) -> NormCache {
        NormCache::new(self.norm_cache_dir())
    }
}

pub fn save_index(paths: &IndexPaths, index: &InvertedIndex) -> Result<()> {
    create_dir_all(&paths.root)?;
    let f = File::create(paths.index())?;
    let mut w = BufWriter::new(f);
    bincode::serialize_into(&mut w, index)?;
    w.flush()?;
    Ok(())
}

pub fn load_index(paths: &IndexPaths) -> Result<InvertedIndex> {
    let f = File::open(paths.index())?;
    let index = bincode::deserialize_from(BufReader::new(f))?;
    Ok(index)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut w = BufWriter::new(File::create(paths.meta())?);
    serde_json::to_writer_pretty(&mut w, meta)?;
    w.flush()?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let f = File::open(paths.meta())?;
    Ok(serde_json::from_reader(BufReader::new(f))?)
}

/// Removes every persisted norm table under `paths`; returns how many.
pub fn clear_norm_cache(paths: &IndexPaths) -> Result<usize> {
    let dir = paths.norm_cache_dir();
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    let mut removed = 0;
    for entry in entries {
        let path = entry?.path();
        if path.is_file() {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Saves the index together with its metadata file.
///
/// Norm tables left by an earlier build in the same directory are dropped.
pub fn save_all(paths: &IndexPaths, index: &InvertedIndex, created_at: &str) -> Result<MetaFile> {
    let stale = clear_norm_cache(paths)?;
    if stale > 0 {
        tracing::info!(root = %paths.root.display(), removed = stale, "dropped norm tables of previous build");
    }
    save_index(paths, index)?;
    let meta = MetaFile::describe(index, created_at);
    save_meta(paths, &meta)?;
    Ok(meta)
}

/// Loads a persisted index and wraps it in a ranker backed by its norm cache.
pub fn load_ranker(paths: &IndexPaths) -> Result<Ranker> {
    let index = load_index(paths)?;
    tracing::info!(
        root = %paths.root.display(),
        num_docs = index.doc_count(),
        vocabulary = index.vocabulary_size(),
        "loaded index"
    );
    Ok(Ranker::new(Arc::new(index)).with_norm_cache(paths.norm_cache()))
}
