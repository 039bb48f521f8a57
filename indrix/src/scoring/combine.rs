//! Belief combination rules.
//!
//! Every rule consumes `(weight, log-belief)` pairs and returns a log-belief. Probabilities
//! derived from beliefs are clamped to `[0, 1]` and zero-weight children are skipped, so no rule
//! produces NaN for finite weights.

use super::{Score, NEG_INFINITY};

/// Probability behind a log-belief, clamped to `[0, 1]`.
pub fn probability(score: Score) -> f64 {
    score.exp().min(1.0)
}

/// Weighted arithmetic mean in the log domain: `Σ w·s / Σ w`.
///
/// Returns `-inf` when the weights sum to zero.
pub fn weighted_and(scores: impl IntoIterator<Item = (f64, Score)>) -> Score {
    let mut weighted = 0.0;
    let mut total_weight = 0.0;
    for (weight, score) in scores {
        if weight == 0.0 {
            continue;
        }
        weighted += weight * score;
        total_weight += weight;
    }
    if total_weight == 0.0 {
        return NEG_INFINITY;
    }
    let combined = weighted / total_weight;
    if combined.is_nan() {
        NEG_INFINITY
    } else {
        combined
    }
}

/// Weighted mean in the probability domain: `ln(Σ w·exp(s) / Σ w)`.
///
/// Returns `-inf` when the weights sum to zero.
pub fn weighted_sum(scores: impl IntoIterator<Item = (f64, Score)>) -> Score {
    let mut weighted = 0.0;
    let mut total_weight = 0.0;
    for (weight, score) in scores {
        if weight == 0.0 {
            continue;
        }
        weighted += weight * probability(score);
        total_weight += weight;
    }
    if total_weight == 0.0 {
        return NEG_INFINITY;
    }
    let mean = weighted / total_weight;
    if mean > 0.0 {
        mean.min(1.0).ln()
    } else {
        NEG_INFINITY
    }
}

/// Noisy-or: `ln(1 - Π(1 - exp(s)))`.
pub fn or(scores: impl IntoIterator<Item = Score>) -> Score {
    let miss: f64 = scores
        .into_iter()
        .map(|score| 1.0 - probability(score))
        .product();
    if miss >= 1.0 {
        NEG_INFINITY
    } else {
        (-miss).ln_1p()
    }
}

pub fn max(scores: impl IntoIterator<Item = Score>) -> Score {
    scores.into_iter().fold(NEG_INFINITY, f64::max)
}

/// `ln(1 - exp(s))`. Negating certainty yields `-inf`; negating `-inf` yields certainty.
pub fn not(score: Score) -> Score {
    if score >= 0.0 {
        NEG_INFINITY
    } else {
        (-score.exp()).ln_1p()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_and_is_weighted_log_mean() {
        let score = weighted_and([(1.0, -1.0), (3.0, -3.0)]);
        assert!(approx_eq(score, (-1.0 - 9.0) / 4.0));
    }

    #[test]
    fn test_and_zero_weights() {
        assert_eq!(weighted_and([(0.0, -1.0), (0.0, -2.0)]), NEG_INFINITY);
        assert_eq!(weighted_and(std::iter::empty()), NEG_INFINITY);
        // zero weight on an impossible child does not poison the mean
        assert!(approx_eq(
            weighted_and([(0.0, NEG_INFINITY), (1.0, -2.0)]),
            -2.0
        ));
    }

    #[test]
    fn test_wsum_is_probability_mean() {
        let score = weighted_sum([(2.0, 0.5f64.ln()), (1.0, 0.2f64.ln())]);
        assert!(approx_eq(score, (1.2f64 / 3.0).ln()));
    }

    #[test]
    fn test_wsum_zero_weights() {
        assert_eq!(weighted_sum([(0.0, -0.1)]), NEG_INFINITY);
    }

    #[test]
    fn test_wsum_clamps_band_belief() {
        // a BAND child scores 1.0, above certainty
        assert!(approx_eq(weighted_sum([(1.0, 1.0)]), 0.0));
    }

    #[test]
    fn test_or_noisy_or() {
        let score = or([0.5f64.ln(), 0.5f64.ln()]);
        assert!(approx_eq(score, 0.75f64.ln()));
        assert_eq!(or(std::iter::empty()), NEG_INFINITY);
        assert_eq!(or([NEG_INFINITY]), NEG_INFINITY);
        assert_eq!(or([0.0, -3.0]), 0.0);
    }

    #[test]
    fn test_max() {
        assert_eq!(max([-3.0, -1.0, -2.0]), -1.0);
        assert_eq!(max(std::iter::empty()), NEG_INFINITY);
    }

    #[test]
    fn test_not() {
        assert!(approx_eq(not(0.25f64.ln()), 0.75f64.ln()));
        assert_eq!(not(0.0), NEG_INFINITY);
        assert_eq!(not(1.0), NEG_INFINITY);
        assert_eq!(not(NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_double_negation_recovers_belief() {
        for p in [0.01f64, 0.3, 0.5, 0.9] {
            let x = p.ln();
            assert!(approx_eq(not(not(x)), x), "p = {}", p);
        }
    }

    #[test]
    fn test_double_negation_is_lossy_at_certainty() {
        // p = 1 negates to -inf, which negates back to 0 rather than the input
        assert_eq!(not(not(0.0)), 0.0);
        assert_eq!(not(0.0), NEG_INFINITY);
        // a BAND belief of 1.0 cannot be recovered at all
        assert_eq!(not(not(1.0)), 0.0);
        assert_ne!(not(not(1.0)), 1.0);
    }
}
