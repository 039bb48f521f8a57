//! Belief computation: language-model term scoring, document-length quantization and the
//! log-domain combination formulas shared by every operator.

pub mod combine;
pub mod language_model;
pub mod norm;

/// A natural-log probability. Beliefs live in `(-inf, 0]`; BAND's constant belief is the only
/// value allowed above zero.
pub type Score = f64;

/// Log-belief of a document that is certainly not relevant.
pub const NEG_INFINITY: Score = f64::NEG_INFINITY;
