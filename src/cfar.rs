//! Cell-averaging CFAR over a one-dimensional power profile.
//!
//! For every cell under test the noise floor is the mean of `training_cells`
//! samples on each side, separated from the cell by `guard_cells` so target
//! energy leaking into its neighbours does not inflate the estimate. Cells
//! too close to either end for a full window are skipped, never padded.

use serde::{Deserialize, Serialize};

use crate::error::{RadarError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CfarDetector {
    /// Cells on each side of the cell under test left out of the estimate.
    pub guard_cells: usize,
    /// Cells on each side averaged into the noise floor.
    pub training_cells: usize,
    pub threshold_factor: f64,
}

impl Default for CfarDetector {
    fn default() -> Self {
        Self {
            guard_cells: 5,
            training_cells: 15,
            threshold_factor: 1.8,
        }
    }
}

impl CfarDetector {
    pub fn new(guard_cells: usize, training_cells: usize, threshold_factor: f64) -> Self {
        Self {
            guard_cells,
            training_cells,
            threshold_factor,
        }
    }

    /// Detector whose factor yields `pfa` false alarms per cell on
    /// exponentially distributed noise power.
    pub fn with_false_alarm_rate(guard_cells: usize, training_cells: usize, pfa: f64) -> Result<Self> {
        let threshold_factor = threshold_for_pfa(pfa, 2 * training_cells)?;
        Ok(Self::new(guard_cells, training_cells, threshold_factor))
    }

    /// Shortest profile with at least one testable cell, or `None` when the
    /// window does not fit in `usize`.
    pub fn min_profile_len(&self) -> Option<usize> {
        window_len(self.guard_cells, self.training_cells)
    }

    pub fn validate(&self) -> Result<()> {
        if self.threshold_factor.is_finite() && self.threshold_factor > 0.0 {
            Ok(())
        } else {
            Err(RadarError::InvalidParameter {
                name: "threshold_factor",
                value: self.threshold_factor,
            })
        }
    }

    pub fn detect(&self, power_profile: &[f64]) -> Vec<usize> {
        cfar_detect(
            power_profile,
            self.guard_cells,
            self.training_cells,
            self.threshold_factor,
        )
    }

    /// [`detect`](Self::detect) followed by [`group_detections`].
    pub fn detect_peaks(&self, power_profile: &[f64]) -> Vec<usize> {
        group_detections(&self.detect(power_profile), power_profile)
    }
}

/// `2 * (guard + training) + 1`
fn window_len(guard_cells: usize, training_cells: usize) -> Option<usize> {
    guard_cells
        .checked_add(training_cells)?
        .checked_mul(2)?
        .checked_add(1)
}

/// Ascending indices of the cells whose power exceeds `threshold_factor`
/// times the mean of their training cells.
pub fn cfar_detect(
    power_profile: &[f64],
    guard_cells: usize,
    training_cells: usize,
    threshold_factor: f64,
) -> Vec<usize> {
    let n = power_profile.len();
    // an empty training window has no mean to compare against
    if training_cells == 0 {
        return vec![];
    }
    match window_len(guard_cells, training_cells) {
        Some(window) if window <= n => {}
        _ => return vec![],
    }
    let reach = guard_cells + training_cells;

    (reach..n - reach)
        .filter(|&i| {
            let leading = &power_profile[i - reach..i - guard_cells];
            let trailing = &power_profile[i + guard_cells + 1..=i + reach];
            let noise_floor = (leading.iter().sum::<f64>() + trailing.iter().sum::<f64>())
                / (leading.len() + trailing.len()) as f64;
            power_profile[i] > threshold_factor * noise_floor
        })
        .collect()
}

/// Collapses every run of adjacent detections into its strongest cell.
///
/// A windowed target occupies a main lobe several bins wide and CFAR flags
/// each of them; grouping leaves one index per target.
pub fn group_detections(detections: &[usize], power_profile: &[f64]) -> Vec<usize> {
    detections
        .chunk_by(|a, b| *b == *a + 1)
        .filter_map(|run| {
            run.iter()
                .copied()
                .max_by(|&a, &b| power_profile[a].total_cmp(&power_profile[b]))
        })
        .collect()
}

/// CA-CFAR factor `M·(pfa^(-1/M) − 1)` for `total_training_cells = M`.
pub fn threshold_for_pfa(pfa: f64, total_training_cells: usize) -> Result<f64> {
    if !(pfa > 0.0 && pfa < 1.0) {
        return Err(RadarError::InvalidParameter {
            name: "pfa",
            value: pfa,
        });
    }
    if total_training_cells == 0 {
        return Err(RadarError::InvalidParameter {
            name: "training_cells",
            value: 0.0,
        });
    }
    let m = total_training_cells as f64;
    Ok(m * (pfa.powf(-1.0 / m) - 1.0))
}

/// Inverse of [`threshold_for_pfa`]: `(1 + α/M)^(-M)`.
pub fn expected_false_alarm_rate(threshold_factor: f64, total_training_cells: usize) -> f64 {
    let m = total_training_cells as f64;
    (1.0 + threshold_factor / m).powf(-m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use rand_distr::Exp1;

    fn exponential_noise(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.sample::<f64, _>(Exp1)).collect()
    }

    #[test]
    fn test_cfar_detects_peak() {
        let mut power = vec![1.0; 30];
        power[15] = 10.0;
        assert_eq!(cfar_detect(&power, 2, 4, 1.5), vec![15]);
    }

    #[test]
    fn test_cfar_flat_profile() {
        let power = vec![3.0; 50];
        assert!(cfar_detect(&power, 2, 4, 1.5).is_empty());
    }

    #[test]
    fn test_cfar_short_profile_is_empty() {
        let detector = CfarDetector::new(2, 4, 1.5);
        assert_eq!(detector.min_profile_len(), Some(13));
        let mut power = vec![1.0; 12];
        power[6] = 100.0;
        assert!(detector.detect(&power).is_empty());
        assert!(detector.detect(&[]).is_empty());

        power.push(1.0);
        assert_eq!(detector.detect(&power), vec![6]);
    }

    #[test]
    fn test_cfar_edges_skipped() {
        let mut power = vec![1.0; 40];
        power[0] = 50.0;
        power[5] = 50.0;
        power[34] = 50.0;
        power[39] = 50.0;
        assert!(cfar_detect(&power, 2, 4, 1.5).is_empty());
    }

    #[test]
    fn test_cfar_oversized_window_is_empty() {
        let mut power = vec![1.0; 64];
        power[32] = 100.0;
        assert!(cfar_detect(&power, usize::MAX / 2, 1, 1.5).is_empty());
        assert!(cfar_detect(&power, usize::MAX, 1, 1.5).is_empty());
        assert!(cfar_detect(&power, 1, usize::MAX, 1.5).is_empty());
        assert!(cfar_detect(&power, usize::MAX / 4, usize::MAX / 4, 1.5).is_empty());

        let detector = CfarDetector::new(usize::MAX, 1, 1.5);
        assert_eq!(detector.min_profile_len(), None);
        assert!(detector.detect(&power).is_empty());
        assert!(detector.detect_peaks(&power).is_empty());
    }

    #[test]
    fn test_detector_validation() {
        assert!(CfarDetector::default().validate().is_ok());
        assert!(CfarDetector::new(2, 8, f64::NAN).validate().is_err());
        assert!(CfarDetector::new(2, 8, -1.5).validate().is_err());
        assert!(CfarDetector::new(2, 8, 0.0).validate().is_err());
        assert!(CfarDetector::new(2, 8, f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_cfar_zero_training_cells() {
        let mut power = vec![1.0; 20];
        power[10] = 5.0;
        assert!(cfar_detect(&power, 3, 0, 1.5).is_empty());
    }

    #[test]
    fn test_cfar_guard_hides_main_lobe() {
        // a three-bin wide target must not raise the estimate for its own centre
        let mut power = vec![1.0; 40];
        power[19] = 8.0;
        power[20] = 10.0;
        power[21] = 8.0;
        assert_eq!(cfar_detect(&power, 1, 6, 3.0), vec![19, 20, 21]);
        assert_eq!(CfarDetector::new(1, 6, 3.0).detect_peaks(&power), vec![20]);
    }

    #[test]
    fn test_cfar_adapts_to_noise_level() {
        let mut power = vec![1.0; 20];
        power.extend(vec![5.0; 20]);
        power[10] = 4.0;
        power[30] = 20.0;
        assert_eq!(cfar_detect(&power, 2, 4, 2.0), vec![10, 30]);
    }

    #[test]
    fn test_cfar_monotonic_in_threshold() {
        let mut power = exponential_noise(500, 3);
        power[100] = 30.0;
        power[250] = 12.0;
        power[400] = 6.0;
        let mut previous = usize::MAX;
        for step in 0..40 {
            let factor = 1.0 + step as f64 * 0.25;
            let count = cfar_detect(&power, 3, 12, factor).len();
            assert!(count <= previous, "factor {factor}: {count} > {previous}");
            previous = count;
        }
    }

    #[test]
    fn test_cfar_scale_invariant() {
        let mut power: Vec<f64> = (0..200)
            .map(|i| 1.0 + 0.5 * f64::sin(i as f64 * 0.3))
            .collect();
        power[60] = 20.0;
        power[61] = 9.0;
        power[140] = 6.0;
        let reference = cfar_detect(&power, 2, 8, 1.5);
        assert!(!reference.is_empty());
        for scale in [1024.0, 0.125, 1.0 / 65536.0] {
            let scaled: Vec<f64> = power.iter().map(|p| p * scale).collect();
            assert_eq!(cfar_detect(&scaled, 2, 8, 1.5), reference);
        }
    }

    #[test]
    fn test_false_alarm_rate_on_exponential_noise() {
        let detector = CfarDetector::with_false_alarm_rate(2, 16, 0.01).unwrap();
        let power = exponential_noise(4000, 11);
        let evaluated = power.len() + 1 - detector.min_profile_len().unwrap();
        let rate = detector.detect(&power).len() as f64 / evaluated as f64;
        assert!(rate > 0.004 && rate < 0.02, "false alarm rate {rate}");
    }

    #[test]
    fn test_threshold_for_pfa() {
        let alpha = threshold_for_pfa(1e-3, 16).unwrap();
        assert_relative_eq!(alpha, 8.6388, max_relative = 1e-4);
        assert_relative_eq!(expected_false_alarm_rate(alpha, 16), 1e-3, max_relative = 1e-9);
        assert!(threshold_for_pfa(0.0, 16).is_err());
        assert!(threshold_for_pfa(1.0, 16).is_err());
        assert!(threshold_for_pfa(0.1, 0).is_err());
    }

    #[test]
    fn test_group_detections() {
        let power: Vec<f64> = (0..20).map(|i| (i % 7) as f64).collect();
        assert_eq!(group_detections(&[], &power), Vec::<usize>::new());
        assert_eq!(group_detections(&[3], &power), vec![3]);
        assert_eq!(group_detections(&[2, 3, 4, 5, 9, 10, 15], &power), vec![5, 10, 15]);
    }

    #[test]
    fn test_detector_deserializes_with_defaults() {
        let detector: CfarDetector = serde_json::from_str(r#"{"threshold_factor": 2.5}"#).unwrap();
        assert_eq!(detector.guard_cells, 5);
        assert_eq!(detector.training_cells, 15);
        assert_eq!(detector.threshold_factor, 2.5);
    }
}
