//! Radar configuration and target state.
//!
//! [`RadarParameters`] holds the four independent settings of an FMCW chirp.
//! Everything else (sample count, wavelength, unambiguous range and velocity,
//! resolution) is derived on demand so it can never drift out of sync.

use serde::{Deserialize, Serialize};

use crate::error::{RadarError, Result};

/// Speed of light used throughout the simulation (m/s).
pub const SPEED_OF_LIGHT: f64 = 3e8;

/// Upper bound on `T * fs`, keeping every per-chirp buffer allocatable.
pub const MAX_SAMPLES_PER_CHIRP: usize = 1 << 24;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRadarParameters")]
pub struct RadarParameters {
    bandwidth_hz: f64,
    chirp_duration_s: f64,
    carrier_hz: f64,
    sample_rate_hz: f64,
}

#[derive(Deserialize)]
struct RawRadarParameters {
    bandwidth_hz: f64,
    chirp_duration_s: f64,
    carrier_hz: f64,
    sample_rate_hz: f64,
}

impl TryFrom<RawRadarParameters> for RadarParameters {
    type Error = RadarError;

    fn try_from(raw: RawRadarParameters) -> Result<Self> {
        Self::new(
            raw.bandwidth_hz,
            raw.chirp_duration_s,
            raw.carrier_hz,
            raw.sample_rate_hz,
        )
    }
}

impl Default for RadarParameters {
    /// 24 GHz K-band radar with a 200 MHz / 200 µs chirp sampled at 2 MHz
    /// (400 samples, 150 m unambiguous range).
    fn default() -> Self {
        Self {
            bandwidth_hz: 200e6,
            chirp_duration_s: 200e-6,
            carrier_hz: 24e9,
            sample_rate_hz: 2e6,
        }
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(RadarError::InvalidParameter { name, value })
    }
}

impl RadarParameters {
    pub fn new(
        bandwidth_hz: f64,
        chirp_duration_s: f64,
        carrier_hz: f64,
        sample_rate_hz: f64,
    ) -> Result<Self> {
        check_positive("bandwidth_hz", bandwidth_hz)?;
        check_positive("chirp_duration_s", chirp_duration_s)?;
        check_positive("carrier_hz", carrier_hz)?;
        check_positive("sample_rate_hz", sample_rate_hz)?;

        let samples = chirp_duration_s * sample_rate_hz;
        if !(samples.is_finite() && samples <= MAX_SAMPLES_PER_CHIRP as f64) {
            return Err(RadarError::InvalidParameter {
                name: "chirp_duration_s * sample_rate_hz",
                value: samples,
            });
        }
        let params = Self {
            bandwidth_hz,
            chirp_duration_s,
            carrier_hz,
            sample_rate_hz,
        };
        // the Hann window needs N - 1 > 0
        if params.num_samples() < 2 {
            return Err(RadarError::InvalidParameter {
                name: "chirp_duration_s * sample_rate_hz",
                value: chirp_duration_s * sample_rate_hz,
            });
        }
        Ok(params)
    }

    /// Same radar with a 50 µs chirp: 100 samples, 37.5 m unambiguous range.
    pub fn short_chirp() -> Self {
        Self {
            chirp_duration_s: 50e-6,
            ..Self::default()
        }
    }

    pub fn with_bandwidth(&self, bandwidth_hz: f64) -> Result<Self> {
        Self::new(
            bandwidth_hz,
            self.chirp_duration_s,
            self.carrier_hz,
            self.sample_rate_hz,
        )
    }

    pub fn with_chirp_duration(&self, chirp_duration_s: f64) -> Result<Self> {
        Self::new(
            self.bandwidth_hz,
            chirp_duration_s,
            self.carrier_hz,
            self.sample_rate_hz,
        )
    }

    pub fn with_carrier(&self, carrier_hz: f64) -> Result<Self> {
        Self::new(
            self.bandwidth_hz,
            self.chirp_duration_s,
            carrier_hz,
            self.sample_rate_hz,
        )
    }

    pub fn with_sample_rate(&self, sample_rate_hz: f64) -> Result<Self> {
        Self::new(
            self.bandwidth_hz,
            self.chirp_duration_s,
            self.carrier_hz,
            sample_rate_hz,
        )
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth_hz
    }
    pub fn chirp_duration(&self) -> f64 {
        self.chirp_duration_s
    }
    pub fn carrier(&self) -> f64 {
        self.carrier_hz
    }
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate_hz
    }

    /// `floor(T * fs)`
    pub fn num_samples(&self) -> usize {
        // small bias absorbs representation error in products like 50e-6 * 2e6
        (self.chirp_duration_s * self.sample_rate_hz + 1e-9).floor() as usize
    }

    pub fn wavelength(&self) -> f64 {
        SPEED_OF_LIGHT / self.carrier_hz
    }

    /// Frequency sweep rate B / T in Hz/s.
    pub fn chirp_slope(&self) -> f64 {
        self.bandwidth_hz / self.chirp_duration_s
    }

    /// Largest range whose beat frequency stays below half the sample rate.
    pub fn max_range(&self) -> f64 {
        SPEED_OF_LIGHT * self.chirp_duration_s * self.sample_rate_hz / (4.0 * self.bandwidth_hz)
    }

    /// Largest radial speed whose chirp-to-chirp phase step stays below π.
    pub fn max_velocity(&self) -> f64 {
        self.wavelength() / (4.0 * self.chirp_duration_s)
    }

    pub fn range_resolution(&self) -> f64 {
        SPEED_OF_LIGHT / (2.0 * self.bandwidth_hz)
    }

    /// Distance covered by one FFT bin of an `N`-sample chirp.
    pub fn range_bin_spacing(&self) -> f64 {
        self.range_resolution() * (self.sample_rate_hz / self.num_samples() as f64)
            * self.chirp_duration_s
    }

    /// Velocity covered by one Doppler bin of a `num_chirps` long train.
    pub fn velocity_resolution(&self, num_chirps: usize) -> f64 {
        self.wavelength() / (2.0 * num_chirps as f64 * self.chirp_duration_s)
    }

    /// Sample instants `n / fs` of one chirp.
    pub fn time_axis(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.num_samples()).map(|n| n as f64 / self.sample_rate_hz)
    }
}

/// A point reflector seen by the radar during one chirp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetState {
    pub range_m: f64,
    /// Radial velocity, positive when receding.
    pub velocity_mps: f64,
    pub rcs: f64,
}

impl TargetState {
    pub fn new(range_m: f64, velocity_mps: f64, rcs: f64) -> Self {
        Self {
            range_m,
            velocity_mps,
            rcs,
        }
    }

    /// Negative ranges are rejected rather than clamped.
    pub fn validate(&self, index: usize) -> Result<()> {
        let reason = if !self.range_m.is_finite() {
            "range is not finite"
        } else if self.range_m < 0.0 {
            "range is negative"
        } else if !self.velocity_mps.is_finite() {
            "velocity is not finite"
        } else if !(self.rcs.is_finite() && self.rcs > 0.0) {
            "rcs must be positive"
        } else {
            return Ok(());
        };
        Err(RadarError::InvalidTarget { index, reason })
    }
}

pub fn validate_targets(targets: &[TargetState]) -> Result<()> {
    targets
        .iter()
        .enumerate()
        .try_for_each(|(index, target)| target.validate(index))
}
