use serde::{Deserialize, Serialize};

use log::info;

use crate::cfar::CfarDetector;
use crate::chirp::NoiseModel;
use crate::error::{RadarError, Result};
use crate::params::{validate_targets, RadarParameters, TargetState};

/// Everything a simulation run needs, loadable from JSON. Missing sections
/// fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarConfig {
    pub radar: RadarParameters,
    pub noise: NoiseModel,
    pub cfar: CfarDetector,
    pub targets: Vec<TargetState>,
    /// Time between sweep frames (s).
    pub frame_interval_s: f64,
    /// Chirps per range-Doppler map.
    pub num_chirps: usize,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            radar: RadarParameters::default(),
            noise: NoiseModel::default(),
            cfar: CfarDetector::default(),
            targets: vec![
                TargetState::new(15.0, 5.0, 1.0),
                TargetState::new(45.0, -10.0, 0.5),
                TargetState::new(80.0, 0.0, 2.0),
                TargetState::new(25.0, 8.0, 0.8),
                TargetState::new(60.0, -5.0, 1.2),
            ],
            frame_interval_s: 0.1,
            num_chirps: 32,
        }
    }
}

impl RadarConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        info!(
            "loaded config: {} targets, {} samples per chirp, R_max {:.1} m, V_max {:.1} m/s",
            config.targets.len(),
            config.radar.num_samples(),
            config.radar.max_range(),
            config.radar.max_velocity()
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.noise.validate()?;
        self.cfar.validate()?;
        validate_targets(&self.targets)?;
        if !(self.frame_interval_s.is_finite() && self.frame_interval_s > 0.0) {
            return Err(RadarError::InvalidParameter {
                name: "frame_interval_s",
                value: self.frame_interval_s,
            });
        }
        if self.num_chirps == 0 {
            return Err(RadarError::NoChirps);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default() {
        let config = RadarConfig::from_json("{}").unwrap();
        assert_eq!(config, RadarConfig::default());
        assert_eq!(config.targets.len(), 5);
    }

    #[test]
    fn test_partial_config() {
        let config = RadarConfig::from_json(
            r#"{
                "radar": {"bandwidth_hz": 200e6, "chirp_duration_s": 50e-6, "carrier_hz": 24e9, "sample_rate_hz": 10e6},
                "noise": {"power": 0.0},
                "cfar": {"guard_cells": 2, "training_cells": 8, "threshold_factor": 1.5},
                "targets": [{"range_m": 12.0, "velocity_mps": 1.0, "rcs": 1.0}]
            }"#,
        )
        .unwrap();
        assert_eq!(config.radar.num_samples(), 500);
        assert_eq!(config.noise.power, 0.0);
        assert_eq!(config.noise.seed, 0);
        assert_eq!(config.cfar, CfarDetector::new(2, 8, 1.5));
        assert_eq!(config.targets, vec![TargetState::new(12.0, 1.0, 1.0)]);
        assert_eq!(config.num_chirps, 32);
    }

    #[test]
    fn test_invalid_configs() {
        assert!(matches!(
            RadarConfig::from_json("not json"),
            Err(RadarError::Config(_))
        ));
        assert!(matches!(
            RadarConfig::from_json(r#"{"targets": [{"range_m": -3.0, "velocity_mps": 0.0, "rcs": 1.0}]}"#),
            Err(RadarError::InvalidTarget { index: 0, .. })
        ));
        assert!(matches!(
            RadarConfig::from_json(r#"{"noise": {"power": -1.0}}"#),
            Err(RadarError::InvalidNoisePower(_))
        ));
        assert!(RadarConfig::from_json(r#"{"num_chirps": 0}"#).is_err());
        assert!(matches!(
            RadarConfig::from_json(r#"{"cfar": {"threshold_factor": -1.8}}"#),
            Err(RadarError::InvalidParameter {
                name: "threshold_factor",
                ..
            })
        ));
        let mut config = RadarConfig::default();
        config.cfar.threshold_factor = f64::NAN;
        assert!(config.validate().is_err());
        assert!(RadarConfig::from_json(r#"{"frame_interval_s": 0.0}"#).is_err());
        assert!(RadarConfig::from_json(
            r#"{"radar": {"bandwidth_hz": 0.0, "chirp_duration_s": 50e-6, "carrier_hz": 24e9, "sample_rate_hz": 2e6}}"#
        )
        .is_err());
    }
}
