//! Immutable configuration values for normalization and BM25 scoring.

use crate::tokenizer::StopWords;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// BM25 term-frequency saturation parameter.
pub const BM25_K1: f64 = 1.2;

/// BM25 document length normalization parameter.
pub const BM25_B: f64 = 0.75;

/// Characters that survive the filter step of normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Alphabet {
    /// `a`-`z` after case folding; everything else is a separator.
    #[default]
    Ascii,
    /// Any Unicode letter after NFKC normalization and case folding.
    Unicode,
}

impl Alphabet {
    pub fn as_str(&self) -> &'static str {
        match self {
            Alphabet::Ascii => "ascii",
            Alphabet::Unicode => "unicode",
        }
    }
}

impl fmt::Display for Alphabet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Alphabet {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ascii" => Ok(Alphabet::Ascii),
            "unicode" => Ok(Alphabet::Unicode),
            other => Err(format!("unknown alphabet: {other}")),
        }
    }
}

/// Everything that changes which terms a piece of text produces.
///
/// Bundled into a [`crate::Normalizer`] at construction time and never
/// toggled afterwards; the index fingerprint is derived from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    pub alphabet: Alphabet,
    pub stop_words: Option<StopWords>,
    pub stemming: bool,
}

impl NormalizerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alphabet(mut self, alphabet: Alphabet) -> Self {
        self.alphabet = alphabet;
        self
    }

    pub fn with_stop_words(mut self, stop_words: StopWords) -> Self {
        self.stop_words = Some(stop_words);
        self
    }

    pub fn with_stemming(mut self, stemming: bool) -> Self {
        self.stemming = stemming;
        self
    }

    pub fn stop_words_enabled(&self) -> bool {
        self.stop_words.is_some()
    }
}

/// Tunable BM25 parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: BM25_K1, b: BM25_B }
    }
}

impl Bm25Params {
    /// Builds validated parameters: `k1 >= 0` and `0 <= b <= 1`, both finite.
    pub fn new(k1: f64, b: f64) -> Result<Self> {
        let params = Self { k1, b };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.k1.is_finite() || self.k1 < 0.0 {
            return Err(Error::InvalidParameter { name: "k1", value: self.k1 });
        }
        if !self.b.is_finite() || !(0.0..=1.0).contains(&self.b) {
            return Err(Error::InvalidParameter { name: "b", value: self.b });
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
