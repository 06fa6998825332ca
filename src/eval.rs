//! Scores a produced labeling against ground truth. Foreground is the
//! positive class.

use crate::error::{Error, Result};
use crate::Labeling;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scores {
    pub precision: f64,
    pub recall: f64,
    pub f_measure: f64,
}

/// Precision, recall and their harmonic mean. Ratios with a zero
/// denominator score 0.0 rather than poisoning the result with NaN.
pub fn score(result: &Labeling, truth: &Labeling) -> Result<Scores> {
    if (result.width(), result.height()) != (truth.width(), truth.height()) {
        return Err(Error::DimensionMismatch {
            expected_width: truth.width(),
            expected_height: truth.height(),
            actual_width: result.width(),
            actual_height: result.height(),
        });
    }

    let mut true_positives = 0u64;
    let mut false_positives = 0u64;
    let mut false_negatives = 0u64;
    for y in 0..result.height() {
        for x in 0..result.width() {
            match (result.get(x, y), truth.get(x, y)) {
                (true, true) => true_positives += 1,
                (true, false) => false_positives += 1,
                (false, true) => false_negatives += 1,
                (false, false) => {}
            }
        }
    }

    let precision = ratio(true_positives, true_positives + false_positives);
    let recall = ratio(true_positives, true_positives + false_negatives);
    let f_measure = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    Ok(Scores {
        precision,
        recall,
        f_measure,
    })
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labeling(bits: &[bool]) -> Labeling {
        Labeling::from_raw(bits.len() as u32, 1, bits.to_vec())
    }

    #[test]
    fn identical_labelings_score_one() {
        let l = labeling(&[true, false, true, true]);
        let scores = score(&l, &l).unwrap();
        assert_eq!(scores.precision, 1.0);
        assert_eq!(scores.recall, 1.0);
        assert_eq!(scores.f_measure, 1.0);
    }

    #[test]
    fn disjoint_labelings_score_zero() {
        let result = labeling(&[false, false, false]);
        let truth = labeling(&[true, true, true]);
        assert_eq!(score(&result, &truth).unwrap().f_measure, 0.0);
        let flipped = score(&truth, &result).unwrap();
        assert_eq!(flipped.f_measure, 0.0);
    }

    #[test]
    fn half_overlap() {
        let result = labeling(&[true, true, false, false]);
        let truth = labeling(&[true, false, true, false]);
        let scores = score(&result, &truth).unwrap();
        assert_eq!(scores.precision, 0.5);
        assert_eq!(scores.recall, 0.5);
        assert_eq!(scores.f_measure, 0.5);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let result = Labeling::new(3, 2);
        let truth = Labeling::new(2, 3);
        assert!(matches!(
            score(&result, &truth),
            Err(Error::DimensionMismatch { .. })
        ));
    }
}
