use std::f64::consts::PI;

use itertools::zip_eq;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;
use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};

use log::debug;

use crate::error::{RadarError, Result};
use crate::params::{validate_targets, RadarParameters, TargetState, SPEED_OF_LIGHT};

/// Added to `range²` so a reflector at zero range stays finite.
pub const RANGE_EPSILON: f64 = 1e-6;

/// Complex circular Gaussian receiver noise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseModel {
    /// Total variance, split evenly between I and Q.
    pub power: f64,
    pub seed: u64,
}

impl Default for NoiseModel {
    fn default() -> Self {
        Self {
            power: 0.01,
            seed: 0,
        }
    }
}

impl NoiseModel {
    pub fn disabled() -> Self {
        Self {
            power: 0.0,
            seed: 0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.power.is_finite() && self.power >= 0.0 {
            Ok(())
        } else {
            Err(RadarError::InvalidNoisePower(self.power))
        }
    }
}

pub struct ChirpSynthesizer {
    params: RadarParameters,
    noise: NoiseModel,
}

impl ChirpSynthesizer {
    pub fn new(params: RadarParameters, noise: NoiseModel) -> Result<Self> {
        noise.validate()?;
        Ok(Self { params, noise })
    }

    pub fn params(&self) -> &RadarParameters {
        &self.params
    }

    pub fn noise(&self) -> &NoiseModel {
        &self.noise
    }

    /// `2π(fc·t + B/(2T)·t²)`
    fn phase(&self, t: f64) -> f64 {
        let half_slope = self.params.chirp_slope() / 2.0;
        2.0 * PI * (self.params.carrier() * t + half_slope * t * t)
    }

    pub fn synthesize_chirp(&self) -> Vec<Complex64> {
        self.params
            .time_axis()
            .map(|t| Complex64::cis(self.phase(t)))
            .collect()
    }

    /// Transmit chirp and noisy echo, with noise drawn from the model's own seed.
    pub fn simulate_targets(
        &self,
        targets: &[TargetState],
    ) -> Result<(Vec<Complex64>, Vec<Complex64>)> {
        self.simulate_targets_seeded(targets, self.noise.seed)
    }

    pub fn simulate_targets_seeded(
        &self,
        targets: &[TargetState],
        seed: u64,
    ) -> Result<(Vec<Complex64>, Vec<Complex64>)> {
        validate_targets(targets)?;

        let tx = self.synthesize_chirp();
        let mut rx = vec![Complex64::ZERO; tx.len()];

        for target in targets {
            let attenuation = target.rcs.sqrt() / (target.range_m * target.range_m + RANGE_EPSILON);
            // delay grows during the chirp, which is what puts Doppler into the phase
            for (sample, t) in zip_eq(rx.iter_mut(), self.params.time_axis()) {
                let delay = 2.0 * (target.range_m + target.velocity_mps * t) / SPEED_OF_LIGHT;
                *sample += Complex64::from_polar(attenuation, self.phase(t - delay));
            }
        }
        self.add_noise(&mut rx, seed);

        debug!(
            "simulated {} targets over {} samples (seed {})",
            targets.len(),
            rx.len(),
            seed
        );
        Ok((tx, rx))
    }

    fn add_noise(&self, samples: &mut [Complex64], seed: u64) {
        if self.noise.power == 0.0 {
            return;
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let scale = (self.noise.power / 2.0).sqrt();
        for x in samples {
            let re: f64 = rng.sample(StandardNormal);
            let im: f64 = rng.sample(StandardNormal);
            *x += Complex64::new(re, im) * scale;
        }
    }
}

pub fn synthesize_chirp(params: &RadarParameters) -> Vec<Complex64> {
    ChirpSynthesizer {
        params: *params,
        noise: NoiseModel::disabled(),
    }
    .synthesize_chirp()
}

pub fn simulate_targets(
    params: &RadarParameters,
    targets: &[TargetState],
    noise: NoiseModel,
) -> Result<(Vec<Complex64>, Vec<Complex64>)> {
    ChirpSynthesizer::new(*params, noise)?.simulate_targets(targets)
}

#[cfg(test)]
pub(crate) fn mean_power(samples: &[Complex64]) -> f64 {
    samples.iter().map(|x| x.norm_sqr()).sum::<f64>() / samples.len() as f64
}
