//! SMART ltn / ltc and BM25 term weights.
//!
//! All functions are pure and return 0 for every degenerate input (absent
//! term, non-discriminating term, empty document, zero denominator) instead
//! of failing.

use crate::config::Bm25Params;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Log tf, idf, no normalization.
    Ltn,
    /// Log tf, idf, cosine normalization.
    Ltc,
    Bm25,
}

impl Scheme {
    pub const ALL: [Scheme; 3] = [Scheme::Ltn, Scheme::Ltc, Scheme::Bm25];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Ltn => "ltn",
            Scheme::Ltc => "ltc",
            Scheme::Bm25 => "bm25",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ltn" => Ok(Scheme::Ltn),
            "ltc" => Ok(Scheme::Ltc),
            "bm25" => Ok(Scheme::Bm25),
            _ => Err(Error::UnknownScheme(s.to_string())),
        }
    }
}

/// A scheme together with the parameters it needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Weighting {
    Ltn,
    Ltc,
    Bm25(Bm25Params),
}

impl Weighting {
    /// Pairs `scheme` with `params`; the params only matter for BM25.
    pub fn new(scheme: Scheme, params: Bm25Params) -> Self {
        match scheme {
            Scheme::Ltn => Weighting::Ltn,
            Scheme::Ltc => Weighting::Ltc,
            Scheme::Bm25 => Weighting::Bm25(params),
        }
    }

    /// Only the scheme name can fail; out-of-range BM25 params score 0.
    pub fn parse(name: &str, params: Bm25Params) -> Result<Self> {
        Ok(Self::new(name.parse()?, params))
    }

    pub fn scheme(&self) -> Scheme {
        match self {
            Weighting::Ltn => Scheme::Ltn,
            Weighting::Ltc => Scheme::Ltc,
            Weighting::Bm25(_) => Scheme::Bm25,
        }
    }
}

/// `1 + log10(tf)`, or 0 when the term is absent.
pub fn log_tf(tf: u32) -> f64 {
    if tf == 0 {
        0.0
    } else {
        1.0 + (tf as f64).log10()
    }
}

/// `log10(N / df)`; 0 when `df == 0` or the term is in every document.
pub fn idf(df: usize, n: usize) -> f64 {
    if df == 0 || df >= n {
        0.0
    } else {
        (n as f64 / df as f64).log10()
    }
}

pub fn ltn(tf: u32, df: usize, n: usize) -> f64 {
    log_tf(tf) * idf(df, n)
}

/// Divides an ltn weight by the document's cosine norm.
pub fn ltc(ltn_weight: f64, norm: f64) -> f64 {
    if norm > 0.0 && norm.is_finite() {
        ltn_weight / norm
    } else {
        0.0
    }
}

/// `log10((N - df + 0.5) / (df + 0.5))`, floored at 0.
pub fn bm25_idf(df: usize, n: usize) -> f64 {
    if df == 0 || df > n {
        return 0.0;
    }
    let (n, df) = (n as f64, df as f64);
    ((n - df + 0.5) / (df + 0.5)).log10().max(0.0)
}

/// BM25 contribution of one term; 0 when `params` fall outside
/// `k1 >= 0`, `0 <= b <= 1`.
pub fn bm25(tf: u32, df: usize, n: usize, doc_len: f64, avg_doc_len: f64, params: Bm25Params) -> f64 {
    if tf == 0 || avg_doc_len <= 0.0 || !params.is_valid() {
        return 0.0;
    }
    let idf = bm25_idf(df, n);
    if idf == 0.0 {
        return 0.0;
    }
    let Bm25Params { k1, b } = params;
    let tf = tf as f64;
    let denom = tf + k1 * (1.0 - b + b * (doc_len / avg_doc_len));
    if denom <= 0.0 {
        return 0.0;
    }
    let w = idf * (tf * (k1 + 1.0)) / denom;
    if w.is_finite() {
        w
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn ltn_matches_formula() {
        // tf = 10, df = 10, N = 1000 -> (1 + 1) * 2
        assert!((ltn(10, 10, 1000) - 4.0).abs() < EPS);
        assert!((ltn(1, 1, 2) - 2f64.log10()).abs() < EPS);
    }

    #[test]
    fn ltn_zero_cases() {
        assert_eq!(ltn(0, 3, 10), 0.0);
        assert_eq!(ltn(5, 0, 10), 0.0);
        assert_eq!(ltn(5, 10, 10), 0.0);
        assert_eq!(ltn(5, 12, 10), 0.0);
    }

    #[test]
    fn ltc_divides_by_norm() {
        assert!((ltc(2.0, 4.0) - 0.5).abs() < EPS);
        assert_eq!(ltc(2.0, 0.0), 0.0);
        assert_eq!(ltc(2.0, f64::NAN), 0.0);
    }

    #[test]
    fn bm25_matches_formula() {
        let p = Bm25Params::default();
        let (tf, df, n, dl, avg) = (3u32, 2usize, 10usize, 8.0, 10.0);
        let idf = ((10.0 - 2.0 + 0.5) / (2.0 + 0.5f64)).log10();
        let expected = idf * (3.0 * 2.2) / (3.0 + 1.2 * (1.0 - 0.75 + 0.75 * 0.8));
        assert!((bm25(tf, df, n, dl, avg, p) - expected).abs() < EPS);
    }

    #[test]
    fn bm25_common_terms_do_not_go_negative() {
        let p = Bm25Params::default();
        assert_eq!(bm25(4, 9, 10, 5.0, 5.0, p), 0.0);
        assert_eq!(bm25_idf(10, 10), 0.0);
    }

    #[test]
    fn bm25_degenerate_inputs_are_zero() {
        let p = Bm25Params::default();
        assert_eq!(bm25(0, 1, 10, 5.0, 5.0, p), 0.0);
        assert_eq!(bm25(1, 1, 10, 5.0, 0.0, p), 0.0);
        assert_eq!(bm25(1, 0, 10, 5.0, 5.0, p), 0.0);
    }

    #[test]
    fn bm25_is_monotone_in_tf() {
        for &(k1, b) in &[(1.2, 0.75), (0.0, 0.0), (2.0, 1.0), (0.5, 0.3)] {
            let p = Bm25Params { k1, b };
            let mut prev = 0.0;
            for tf in 1..200 {
                let w = bm25(tf, 3, 100, 40.0, 25.0, p);
                assert!(w >= prev, "k1={k1} b={b} tf={tf}: {w} < {prev}");
                prev = w;
            }
        }
    }

    #[test]
    fn scheme_names_round_trip() {
        for s in Scheme::ALL {
            assert_eq!(s.as_str().parse::<Scheme>().unwrap(), s);
        }
        assert_eq!(" BM25 ".parse::<Scheme>().unwrap(), Scheme::Bm25);
        assert!(matches!("lnc".parse::<Scheme>(), Err(Error::UnknownScheme(ref s)) if s == "lnc"));
    }

    #[test]
    fn degenerate_bm25_params_score_zero() {
        for &(k1, b) in &[(-1.0, 0.75), (1.2, 1.5), (1.2, -0.1), (f64::NAN, 0.5), (1.2, f64::INFINITY)] {
            assert_eq!(bm25(3, 2, 10, 8.0, 10.0, Bm25Params { k1, b }), 0.0, "k1={k1} b={b}");
        }
        assert!(bm25(3, 2, 10, 8.0, 10.0, Bm25Params { k1: 0.0, b: 1.0 }) > 0.0);
    }

    #[test]
    fn only_the_scheme_name_can_fail_to_parse() {
        let bad = Bm25Params { k1: -1.0, b: 2.0 };
        assert_eq!(Weighting::parse("bm25", bad).unwrap(), Weighting::Bm25(bad));
        assert_eq!(Weighting::new(Scheme::Ltc, bad), Weighting::Ltc);
        assert!(matches!(Weighting::parse("cosine", Bm25Params::default()), Err(Error::UnknownScheme(_))));
    }
}
