//! Reader for tagged collections: `<doc><docno>ID</docno>BODY</doc>` records.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use lazy_static::lazy_static;
use regex::Regex;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

lazy_static! {
    static ref DOC: Regex =
        Regex::new(r"(?is)<doc>\s*<docno>([^<]*)</docno>(.*?)</doc>").expect("valid regex");
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawDoc {
    pub doc_id: String,
    pub text: String,
}

/// Extracts every well-formed record; records with an empty docno are skipped.
pub fn parse_collection(content: &str) -> Vec<RawDoc> {
    let mut docs = Vec::new();
    for caps in DOC.captures_iter(content) {
        let doc_id = caps[1].trim();
        if doc_id.is_empty() {
            tracing::warn!(offset = caps.get(0).map(|m| m.start()).unwrap_or(0), "skipping record without docno");
            continue;
        }
        docs.push(RawDoc { doc_id: doc_id.to_string(), text: caps[2].trim().to_string() });
    }
    docs
}

/// Reads a collection file, gunzipping `*.gz`; invalid UTF-8 is replaced
/// rather than rejected.
pub fn read_collection(path: &Path) -> Result<Vec<RawDoc>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut bytes = Vec::new();
    if is_gzip(path) {
        GzDecoder::new(BufReader::new(file))
            .read_to_end(&mut bytes)
            .with_context(|| format!("decompressing {}", path.display()))?;
    } else {
        BufReader::new(file).read_to_end(&mut bytes)?;
    }
    let content = String::from_utf8_lossy(&bytes);
    let docs = parse_collection(&content);
    tracing::info!(path = %path.display(), docs = docs.len(), "read collection file");
    Ok(docs)
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// The file itself, or every regular file below a directory in sorted order.
pub fn discover(input: &Path) -> Vec<PathBuf> {
    if input.is_file() {
        return vec![input.to_path_buf()];
    }
    let mut files: Vec<PathBuf> = WalkDir::new(input)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    files
}

/// Query file lines: `<query_id> <free text>`. Blank lines and `#` comments are ignored.
pub fn parse_queries(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| {
            let (id, text) = l.split_once(char::is_whitespace)?;
            Some((id.to_string(), text.trim().to_string()))
        })
        .collect()
}
