pub mod config;
pub mod error;
pub mod index;
pub mod norms;
pub mod persist;
pub mod ranking;
pub mod run;
pub mod stats;
pub mod tokenizer;
pub mod weighting;

pub use config::{Alphabet, Bm25Params, NormalizerConfig};
pub use error::{Error, Result};
pub use index::{DocEntry, InvertedIndex, Posting};
pub use norms::{DocNorms, NormCache};
pub use ranking::{Ranker, ScoredDoc, SearchRequest};
pub use stats::{CollectionStatistics, Fingerprint};
pub use tokenizer::{Normalizer, StopWords};
pub use weighting::{Scheme, Weighting};

/// Internal document ordinal, assigned in insertion order.
pub type DocNum = u32;
