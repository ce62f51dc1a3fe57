use std::{f64::consts::PI, sync::Arc};

use itertools::izip;
use realfft::{RealFftPlanner, RealToComplex};
use rustfft::{num_complex::Complex64, Fft, FftPlanner};

use crate::error::{RadarError, Result};
use crate::params::RadarParameters;

/// Floor added to magnitudes before taking logs for display.
const DB_FLOOR: f64 = 1e-10;

/// Symmetric Hann taper `0.5 * (1 - cos(2πn / (N - 1)))`.
pub fn hann_window(n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| 0.5 * (1.0 - f64::cos(2.0 * PI * i as f64 / (n - 1) as f64)))
        .collect()
}

/// Beat spectrum of one chirp together with the range of every bin.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeSpectrum {
    pub spectrum: Vec<Complex64>,
    pub range_bins: Vec<f64>,
    /// Bins `[0, unambiguous)` map to positive range without aliasing.
    unambiguous: usize,
}

impl RangeSpectrum {
    pub fn len(&self) -> usize {
        self.spectrum.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectrum.is_empty()
    }

    pub fn unambiguous_len(&self) -> usize {
        self.unambiguous
    }

    /// `|X|²` over the non-aliased half, the input CFAR expects.
    pub fn power_profile(&self) -> Vec<f64> {
        self.spectrum[..self.unambiguous]
            .iter()
            .map(|x| x.norm_sqr())
            .collect()
    }

    pub fn magnitude_db(&self) -> Vec<f64> {
        self.spectrum[..self.unambiguous]
            .iter()
            .map(|x| 20.0 * (x.norm() + DB_FLOOR).log10())
            .collect()
    }

    pub fn range_axis(&self) -> &[f64] {
        &self.range_bins[..self.unambiguous]
    }

    pub fn range_of(&self, bin: usize) -> f64 {
        self.range_bins[bin]
    }

    /// Strongest bin of the non-aliased half.
    pub fn peak_bin(&self) -> Option<usize> {
        self.spectrum[..self.unambiguous]
            .iter()
            .map(|x| x.norm_sqr())
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(bin, _)| bin)
    }
}

/*
    tx ---+
          +--> tx * conj(rx) --> hann --> fft --> spectrum
    rx ---+
*/
#[derive(Clone)]
pub struct RangeProcessor {
    input_length: usize,
    bin_spacing: f64,
    window: Vec<f64>,
    fft_plan: Arc<dyn Fft<f64>>,
    real_fft_plan: Arc<dyn RealToComplex<f64>>,
    fft_buffer: Vec<Complex64>,
    fft_scratch: Vec<Complex64>,
    real_buffer: Vec<f64>,
    real_scratch: Vec<Complex64>,
}

impl RangeProcessor {
    pub fn new(params: &RadarParameters) -> Self {
        Self::with_length(params, params.num_samples())
    }

    /// Processor for chirps of `input_length` samples, which need not be
    /// `params.num_samples()`. `input_length` must be non-zero.
    pub(crate) fn with_length(params: &RadarParameters, input_length: usize) -> Self {
        let mut complex_planner = FftPlanner::new();
        let mut real_planner = RealFftPlanner::new();
        let fft_plan = complex_planner.plan_fft_forward(input_length);
        let real_fft_plan = real_planner.plan_fft_forward(input_length);

        let bin_spacing = params.range_resolution()
            * (params.sample_rate() / input_length as f64)
            * params.chirp_duration();

        Self {
            input_length,
            bin_spacing,
            window: hann_window(input_length),
            fft_buffer: vec![Complex64::ZERO; input_length],
            fft_scratch: vec![Complex64::ZERO; fft_plan.get_inplace_scratch_len()],
            real_buffer: vec![0.0; input_length],
            real_scratch: real_fft_plan.make_scratch_vec(),
            fft_plan,
            real_fft_plan,
        }
    }

    pub fn input_length(&self) -> usize {
        self.input_length
    }

    pub fn bin_spacing(&self) -> f64 {
        self.bin_spacing
    }

    fn check_lengths(&self, tx: &[Complex64], rx: &[Complex64]) -> Result<()> {
        if tx.len() != rx.len() {
            return Err(RadarError::LengthMismatch {
                tx: tx.len(),
                rx: rx.len(),
            });
        }
        if tx.is_empty() {
            return Err(RadarError::EmptyWaveform);
        }
        if tx.len() != self.input_length {
            return Err(RadarError::WrongLength {
                expected: self.input_length,
                actual: tx.len(),
            });
        }
        Ok(())
    }

    fn range_bins(&self, n: usize) -> Vec<f64> {
        (0..n).map(|k| k as f64 * self.bin_spacing).collect()
    }

    /// Deramps `rx` against `tx` and transforms the windowed beat signal.
    pub fn range_fft(&mut self, tx: &[Complex64], rx: &[Complex64]) -> Result<RangeSpectrum> {
        self.check_lengths(tx, rx)?;

        for (out, t, r, w) in izip!(&mut self.fft_buffer, tx, rx, &self.window) {
            *out = t * r.conj() * *w;
        }
        self.fft_plan
            .process_with_scratch(&mut self.fft_buffer, &mut self.fft_scratch);

        Ok(RangeSpectrum {
            spectrum: self.fft_buffer.clone(),
            range_bins: self.range_bins(self.input_length),
            unambiguous: self.input_length / 2,
        })
    }

    /// Same chain for a radar that digitizes only the in-phase channel of
    /// the beat signal. Returns the `N/2 + 1` single-sided bins.
    pub fn real_range_fft(
        &mut self,
        tx: &[Complex64],
        rx: &[Complex64],
    ) -> Result<RangeSpectrum> {
        self.check_lengths(tx, rx)?;

        for (out, t, r, w) in izip!(&mut self.real_buffer, tx, rx, &self.window) {
            *out = (t * r.conj()).re * *w;
        }
        let mut spectrum = self.real_fft_plan.make_output_vec();
        self.real_fft_plan.process_with_scratch(
            &mut self.real_buffer,
            &mut spectrum,
            &mut self.real_scratch,
        )?;

        Ok(RangeSpectrum {
            range_bins: self.range_bins(spectrum.len()),
            spectrum,
            unambiguous: self.input_length / 2,
        })
    }
}

pub fn range_fft(
    params: &RadarParameters,
    tx: &[Complex64],
    rx: &[Complex64],
) -> Result<RangeSpectrum> {
    if tx.len() != rx.len() {
        return Err(RadarError::LengthMismatch {
            tx: tx.len(),
            rx: rx.len(),
        });
    }
    if tx.is_empty() {
        return Err(RadarError::EmptyWaveform);
    }
    RangeProcessor::with_length(params, tx.len()).range_fft(tx, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chirp::{simulate_targets, NoiseModel};
    use crate::params::TargetState;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn single_target_spectrum(params: &RadarParameters, range_m: f64) -> RangeSpectrum {
        let (tx, rx) = simulate_targets(
            params,
            &[TargetState::new(range_m, 0.0, 1.0)],
            NoiseModel::disabled(),
        )
        .unwrap();
        range_fft(params, &tx, &rx).unwrap()
    }

    #[test]
    fn test_hann_window() {
        let w = hann_window(5);
        assert_eq!(w.len(), 5);
        assert_abs_diff_eq!(w[0], 0.0);
        assert_abs_diff_eq!(w[2], 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(w[4], 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(w[1], w[3], epsilon = 1e-15);
        assert_eq!(hann_window(1), vec![1.0]);
        assert!(hann_window(0).is_empty());
    }

    #[test]
    fn test_range_bins_follow_resolution() {
        let params = RadarParameters::short_chirp();
        let spectrum = single_target_spectrum(&params, 10.0);
        assert_eq!(spectrum.len(), 100);
        assert_eq!(spectrum.range_bins.len(), 100);
        assert_eq!(spectrum.unambiguous_len(), 50);
        assert_eq!(spectrum.power_profile().len(), 50);
        assert_relative_eq!(spectrum.range_of(40), 30.0, max_relative = 1e-12);
        assert_relative_eq!(
            *spectrum.range_axis().last().unwrap(),
            49.0 * params.range_resolution(),
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_range_round_trip() {
        let params = RadarParameters::default();
        for range_m in [3.0, 15.0, 20.3, 44.9, 80.0, 123.4, 140.0] {
            let spectrum = single_target_spectrum(&params, range_m);
            let peak = spectrum.peak_bin().unwrap();
            let measured = spectrum.range_of(peak);
            assert!(
                (measured - range_m).abs() <= params.range_resolution(),
                "target at {range_m} m measured at {measured} m"
            );
        }
    }

    #[test]
    fn test_real_adc_round_trip() {
        let params = RadarParameters::default();
        let (tx, rx) = simulate_targets(
            &params,
            &[TargetState::new(52.0, 0.0, 1.0)],
            NoiseModel::disabled(),
        )
        .unwrap();
        let mut processor = RangeProcessor::new(&params);
        let spectrum = processor.real_range_fft(&tx, &rx).unwrap();
        assert_eq!(spectrum.len(), 201);
        assert_eq!(spectrum.unambiguous_len(), 200);
        let measured = spectrum.range_of(spectrum.peak_bin().unwrap());
        assert!((measured - 52.0).abs() <= params.range_resolution());
    }

    #[test]
    fn test_processor_is_reusable() {
        let params = RadarParameters::default();
        let (tx, rx) = simulate_targets(
            &params,
            &[TargetState::new(33.0, 2.0, 1.0)],
            NoiseModel::default(),
        )
        .unwrap();
        let mut processor = RangeProcessor::new(&params);
        let first = processor.range_fft(&tx, &rx).unwrap();
        let second = processor.range_fft(&tx, &rx).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, range_fft(&params, &tx, &rx).unwrap());
    }

    #[test]
    fn test_rejects_bad_lengths() {
        let params = RadarParameters::short_chirp();
        let tx = vec![Complex64::ZERO; 100];
        let short = vec![Complex64::ZERO; 99];
        assert!(matches!(
            range_fft(&params, &tx, &short),
            Err(RadarError::LengthMismatch { tx: 100, rx: 99 })
        ));
        assert!(matches!(
            range_fft(&params, &[], &[]),
            Err(RadarError::EmptyWaveform)
        ));
        let mut processor = RangeProcessor::new(&params);
        assert!(matches!(
            processor.range_fft(&short, &short),
            Err(RadarError::WrongLength {
                expected: 100,
                actual: 99
            })
        ));
    }
}
