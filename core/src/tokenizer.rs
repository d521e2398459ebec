use crate::config::{Alphabet, NormalizerConfig};
use crate::Result;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

/// Tokens this short are returned unchanged by the stemming step.
pub const MIN_STEM_LEN: usize = 3;

lazy_static! {
    static ref NON_ASCII_LETTER: Regex = Regex::new(r"[^a-z]+").expect("valid regex");
    static ref NON_LETTER: Regex = Regex::new(r"\P{L}+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref ENGLISH: Vec<&'static str> = vec![
        "a","about","above","after","again","against","all","am","an","and","any","are","as","at",
        "be","because","been","before","being","below","between","both","but","by",
        "can","cannot","could",
        "did","do","does","doing","down","during",
        "each","few","for","from","further",
        "had","has","have","having","he","her","here","hers","herself","him","himself","his","how",
        "i","if","in","into","is","it","its","itself",
        "me","more","most","my","myself",
        "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
        "same","she","should","so","some","such",
        "than","that","the","their","theirs","them","themselves","then","there","these","they","this","those","through","to","too",
        "under","until","up","very",
        "was","we","were","what","when","where","which","while","who","whom","why","with","would",
        "you","your","yours","yourself","yourselves"
    ];
}

/// Immutable stop-word set, always stored lower-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopWords {
    words: BTreeSet<String>,
}

impl StopWords {
    /// Built-in English list.
    pub fn english() -> Self {
        Self::from_words(ENGLISH.iter())
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self { words }
    }

    /// Reads a newline-delimited list; blank lines are ignored.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = Vec::new();
        for line in reader.lines() {
            lines.push(line?);
        }
        Ok(Self::from_words(lines))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = File::open(path.as_ref())?;
        let words = Self::from_reader(BufReader::new(f))?;
        tracing::debug!(path = %path.as_ref().display(), count = words.len(), "loaded stop words");
        Ok(words)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.words.contains(token)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Turns raw text into index terms.
///
/// The pipeline is fixed: case folding, character-class filtering, whitespace
/// split, optional stop-word removal, optional stemming. Documents and queries
/// must go through the same instance (or an equal configuration), otherwise
/// their terms will not line up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Raw tokens: case-folded and filtered, before stop words and stemming.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let (folded, separators) = match self.config.alphabet {
            Alphabet::Ascii => (text.to_lowercase(), &*NON_ASCII_LETTER),
            Alphabet::Unicode => (text.nfkc().collect::<String>().to_lowercase(), &*NON_LETTER),
        };
        separators
            .split(&folded)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Applies the optional stop-word and stemming steps to raw tokens.
    pub fn process(&self, tokens: Vec<String>) -> Vec<String> {
        tokens
            .into_iter()
            .filter(|t| match &self.config.stop_words {
                Some(stop) => !stop.contains(t),
                None => true,
            })
            .map(|t| if self.config.stemming { stem(&t) } else { t })
            .collect()
    }

    pub fn normalize(&self, text: &str) -> Vec<String> {
        self.process(self.tokenize(text))
    }
}

/// Stems a single lower-case token; short tokens pass through untouched.
pub fn stem(token: &str) -> String {
    if token.chars().count() < MIN_STEM_LEN {
        return token.to_string();
    }
    STEMMER.stem(token).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> Normalizer {
        Normalizer::default()
    }

    #[test]
    fn digits_and_punctuation_split_tokens() {
        let terms = plain().normalize("CO2 emissions, co-operation!");
        assert_eq!(terms, vec!["co", "emissions", "co", "operation"]);
    }

    #[test]
    fn ascii_alphabet_drops_accented_letters() {
        let terms = plain().normalize("café");
        assert_eq!(terms, vec!["caf"]);
    }

    #[test]
    fn unicode_alphabet_keeps_letters() {
        let n = Normalizer::new(NormalizerConfig::new().with_alphabet(Alphabet::Unicode));
        assert_eq!(n.normalize("Ünïcode 42x"), vec!["ünïcode", "x"]);
    }

    #[test]
    fn stop_words_are_case_insensitive() {
        let stop = StopWords::from_words(["The", "AND"]);
        let n = Normalizer::new(NormalizerConfig::new().with_stop_words(stop));
        assert_eq!(n.normalize("The cat and THE dog"), vec!["cat", "dog"]);
    }

    #[test]
    fn stemming_reduces_inflections() {
        let n = Normalizer::new(NormalizerConfig::new().with_stemming(true));
        assert_eq!(n.normalize("running cats"), vec!["run", "cat"]);
    }

    #[test]
    fn short_tokens_are_not_stemmed() {
        assert_eq!(stem("as"), "as");
        assert_eq!(stem("is"), "is");
    }

    #[test]
    fn empty_text_yields_no_terms() {
        assert!(plain().normalize("123 !!! ---").is_empty());
        assert!(plain().normalize("").is_empty());
    }

    #[test]
    fn stop_words_from_reader_skip_blank_lines() {
        let input = "the\n\n  A \nof\n";
        let stop = StopWords::from_reader(input.as_bytes()).unwrap();
        assert_eq!(stop.len(), 3);
        assert!(stop.contains("a"));
        assert!(stop.contains("the"));
    }
}
