//! Smoothed document language models.
//!
//! A term's belief in a document is the log of its smoothed probability under the document's
//! language model, interpolated with the collection model `Pc = ttf / T`.

use serde::{Deserialize, Serialize};

use super::{norm, Score, NEG_INFINITY};
use crate::postings::{CollectionStatistics, TermStatistics};

pub const DEFAULT_MU: f64 = 2000.0;
pub const DEFAULT_LAMBDA: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "kebab-case")]
pub enum LanguageModel {
    /// Bayesian smoothing with a Dirichlet prior of strength `mu`.
    Dirichlet { mu: f64 },
    /// Linear interpolation with the collection model, weighted by `lambda`.
    JelinekMercer { lambda: f64 },
}

impl Default for LanguageModel {
    fn default() -> Self {
        Self::dirichlet()
    }
}

impl LanguageModel {
    pub fn dirichlet() -> Self {
        Self::Dirichlet { mu: DEFAULT_MU }
    }

    /// `mu` is clamped to `>= 0`.
    pub fn dirichlet_with_mu(mu: f64) -> Self {
        Self::Dirichlet { mu: mu.max(0.0) }
    }

    pub fn jelinek_mercer() -> Self {
        Self::JelinekMercer {
            lambda: DEFAULT_LAMBDA,
        }
    }

    /// `lambda` is clamped to `[0, 1]`.
    pub fn jelinek_mercer_with_lambda(lambda: f64) -> Self {
        Self::JelinekMercer {
            lambda: lambda.clamp(0.0, 1.0),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Dirichlet { .. } => "dirichlet",
            Self::JelinekMercer { .. } => "jelinek-mercer",
        }
    }

    /// Log-probability of a term occurring `freq` times in a document of `doc_len` tokens.
    pub fn score(&self, freq: f64, doc_len: f64, collection_probability: f64) -> Score {
        let probability = match *self {
            Self::Dirichlet { mu } => {
                let denominator = doc_len + mu;
                if denominator <= 0.0 {
                    return NEG_INFINITY;
                }
                (freq + mu * collection_probability) / denominator
            }
            Self::JelinekMercer { lambda } => {
                let document = if doc_len > 0.0 { freq / doc_len } else { 0.0 };
                (1.0 - lambda) * document + lambda * collection_probability
            }
        };
        if probability > 0.0 {
            probability.ln()
        } else {
            NEG_INFINITY
        }
    }

    /// Score of a document that does not contain the term.
    pub fn smoothing_score(&self, doc_len: f64, collection_probability: f64) -> Score {
        self.score(0.0, doc_len, collection_probability)
    }
}

/// Background probability of a term in a field.
///
/// A term that never occurs is counted as occurring once, so a missing query term lowers a
/// conjunction instead of zeroing it.
pub fn collection_probability(total_term_freq: u64, field_tokens: u64) -> f64 {
    let total_term_freq = total_term_freq.max(1) as f64;
    let field_tokens = field_tokens.max(1) as f64;
    (total_term_freq / field_tokens).min(1.0)
}

/// A language model bound to one term's collection statistics, scoring by quantized length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermWeight {
    model: LanguageModel,
    collection_probability: f64,
}

impl TermWeight {
    pub fn new(
        model: LanguageModel,
        collection: &CollectionStatistics,
        term: &TermStatistics,
    ) -> Self {
        Self {
            model,
            collection_probability: collection_probability(
                term.total_term_freq,
                collection.sum_total_term_freq,
            ),
        }
    }

    pub fn collection_probability(&self) -> f64 {
        self.collection_probability
    }

    pub fn score(&self, freq: u32, norm: u8) -> Score {
        let doc_len = norm::decode_length(norm) as f64;
        self.model
            .score(freq as f64, doc_len, self.collection_probability)
    }

    pub fn smoothing_score(&self, norm: u8) -> Score {
        self.score(0, norm)
    }
}
