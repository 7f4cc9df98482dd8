//! Score normalization and confidence classification.
//!
//! Pure functions over the score vector of a result set. The fixed French
//! messages are part of the API contract.

use super::types::{ConfidenceMetrics, ScoreStats};

/// Scores below this are considered irrelevant.
pub const MIN_RELEVANCE: f32 = 0.3;
/// Average score above this marks a highly confident result set.
pub const HIGH_CONFIDENCE: f32 = 0.7;

pub const MSG_OFF_DOMAIN: &str = "Requête probablement hors du domaine de connaissances";
pub const MSG_MEDIUM: &str = "Pertinence moyenne: résultats disponibles mais peu spécifiques";
pub const MSG_GOOD: &str = "Bonne pertinence: résultats généralement pertinents";
pub const MSG_HIGH: &str = "Haute pertinence: résultats fiables trouvés";

/// Min-max normalization to `[0, 1]`.
///
/// When every score is identical the spread is undefined; everything maps
/// to `0.5`.
pub fn normalize_scores(scores: &[f32]) -> Vec<f32> {
    let Some(&first) = scores.first() else {
        return vec![];
    };
    let (min, max) = scores.iter().fold((first, first), |(lo, hi), &s| {
        (lo.min(s), hi.max(s))
    });
    if max == min {
        return vec![0.5; scores.len()];
    }
    scores.iter().map(|&s| (s - min) / (max - min)).collect()
}

/// Summary statistics of a score vector.
pub fn score_stats(scores: &[f32]) -> ScoreStats {
    if scores.is_empty() {
        return ScoreStats::default();
    }
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    let avg = sorted.iter().sum::<f32>() / sorted.len() as f32;
    let median = if sorted.len() % 2 == 1 {
        sorted[sorted.len() / 2]
    } else {
        (sorted[sorted.len() / 2 - 1] + sorted[sorted.len() / 2]) / 2.0
    };

    ScoreStats {
        min,
        max,
        avg,
        median,
    }
}

/// Classifies a result set from its top scores.
///
/// Decision order: no score or `max < MIN_RELEVANCE` ⇒ off-domain (0.1),
/// `avg < MIN_RELEVANCE` ⇒ medium (0.4), `avg < HIGH_CONFIDENCE` ⇒ good
/// (0.7), else high (0.9).
pub fn evaluate_confidence(scores: &[f32]) -> ConfidenceMetrics {
    let stats = score_stats(scores);

    let (level, message) = if scores.is_empty() || stats.max < MIN_RELEVANCE {
        (0.1, MSG_OFF_DOMAIN)
    } else if stats.avg < MIN_RELEVANCE {
        (0.4, MSG_MEDIUM)
    } else if stats.avg < HIGH_CONFIDENCE {
        (0.7, MSG_GOOD)
    } else {
        (0.9, MSG_HIGH)
    };

    ConfidenceMetrics {
        level,
        message: message.to_string(),
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_maps_to_unit_interval() {
        let normalized = normalize_scores(&[-2.0, 0.0, 2.0]);
        assert_eq!(normalized, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn normalize_equal_scores_falls_back_to_half() {
        assert_eq!(normalize_scores(&[3.0, 3.0, 3.0]), vec![0.5, 0.5, 0.5]);
    }

    #[test]
    fn normalize_empty_is_empty() {
        assert!(normalize_scores(&[]).is_empty());
    }

    #[test]
    fn normalize_is_idempotent_on_normalized_input() {
        let scores = [0.0, 0.25, 0.75, 1.0];
        let once = normalize_scores(&scores);
        let twice = normalize_scores(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn stats_computes_all_four_values() {
        let stats = score_stats(&[0.1, 0.5, 0.9, 0.3]);
        assert_eq!(stats.min, 0.1);
        assert_eq!(stats.max, 0.9);
        assert!((stats.avg - 0.45).abs() < 1e-6);
        assert!((stats.median - 0.4).abs() < 1e-6);
    }

    #[test]
    fn low_max_is_off_domain() {
        let confidence = evaluate_confidence(&[0.05, 0.1, 0.2]);
        assert_eq!(confidence.level, 0.1);
        assert_eq!(confidence.message, MSG_OFF_DOMAIN);
    }

    #[test]
    fn low_average_is_medium() {
        // max above the threshold but a weak average.
        let confidence = evaluate_confidence(&[0.9, 0.05, 0.0, 0.0]);
        assert_eq!(confidence.level, 0.4);
        assert_eq!(confidence.message, MSG_MEDIUM);
    }

    #[test]
    fn mid_average_is_good() {
        let confidence = evaluate_confidence(&[0.6, 0.5, 0.4]);
        assert_eq!(confidence.level, 0.7);
        assert_eq!(confidence.message, MSG_GOOD);
    }

    #[test]
    fn high_average_is_high() {
        let confidence = evaluate_confidence(&[0.9, 0.8, 0.85]);
        assert_eq!(confidence.level, 0.9);
        assert_eq!(confidence.message, MSG_HIGH);
    }

    #[test]
    fn empty_scores_are_off_domain() {
        let confidence = evaluate_confidence(&[]);
        assert_eq!(confidence.level, 0.1);
        assert_eq!(confidence.stats, ScoreStats::default());
    }

    #[test]
    fn boundary_values_follow_strict_order() {
        // avg exactly at MIN_RELEVANCE is not "medium" anymore.
        let confidence = evaluate_confidence(&[0.3, 0.3]);
        assert_eq!(confidence.level, 0.7);
        // avg exactly at HIGH_CONFIDENCE is "high".
        let confidence = evaluate_confidence(&[0.7, 0.7]);
        assert_eq!(confidence.level, 0.9);
    }
}
