//! TREC run files: `<query_id> Q0 <doc_id> <rank> <score> <run_tag>`.

use crate::ranking::ScoredDoc;
use crate::weighting::Weighting;
use crate::Result;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct RunWriter<W: Write> {
    out: W,
    tag: String,
    suffix: Option<String>,
}

impl RunWriter<BufWriter<File>> {
    /// Opens `path` for appending, creating it if needed.
    pub fn append<P: AsRef<Path>>(path: P, tag: impl Into<String>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(BufWriter::new(f), tag))
    }
}

impl<W: Write> RunWriter<W> {
    pub fn new(out: W, tag: impl Into<String>) -> Self {
        Self { out, tag: tag.into(), suffix: None }
    }

    /// Extra trailing field after the run tag, e.g. an element path.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Writes one line per result, ranks starting at 1. Returns the line count.
    pub fn write_query(&mut self, query_id: &str, results: &[ScoredDoc]) -> Result<usize> {
        for (i, hit) in results.iter().enumerate() {
            write!(self.out, "{} Q0 {} {} {} {}", query_id, hit.doc_id, i + 1, hit.score, self.tag)?;
            if let Some(suffix) = &self.suffix {
                write!(self.out, " {suffix}")?;
            }
            writeln!(self.out)?;
        }
        Ok(results.len())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Conventional run file name:
/// `<team>_<run_id>_<scheme>_<stop|nostop>_<stem|nostem>[_k1<k1>_b<b>].txt`.
pub struct RunName<'a> {
    pub team: &'a str,
    pub run_id: usize,
    pub weighting: Weighting,
    pub stop_words: bool,
    pub stemming: bool,
}

impl fmt::Display for RunName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.team, self.run_id, self.weighting.scheme())?;
        f.write_str(if self.stop_words { "_stop" } else { "_nostop" })?;
        f.write_str(if self.stemming { "_stem" } else { "_nostem" })?;
        if let Weighting::Bm25(p) = self.weighting {
            write!(f, "_k1{}_b{}", p.k1, p.b)?;
        }
        f.write_str(".txt")
    }
}
