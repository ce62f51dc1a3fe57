use std::iter::zip;

use itertools::zip_eq;
use ndarray::{Array2, ArrayBase, Axis, Ix1};
use rustfft::{num_complex::Complex64, FftPlanner};

#[allow(unused_imports)]
use log::debug;

use crate::chirp::{ChirpSynthesizer, NoiseModel};
use crate::error::{RadarError, Result};
use crate::params::{validate_targets, RadarParameters, TargetState};
use crate::range::RangeProcessor;

trait CopyInto<A> {
    fn copy_into(&self, destination: A);
}
impl<A, D> CopyInto<&mut [A]> for ArrayBase<D, Ix1>
where
    A: Copy,
    D: ndarray::Data<Elem = A>,
{
    fn copy_into(&self, destination: &mut [A]) {
        for (dst, x) in zip_eq(destination, self) {
            *dst = *x;
        }
    }
}

/// Rotates `input` so the zero-frequency bin lands at `len / 2`.
#[inline]
fn fftshift_into<'a, A: 'a + Copy, I: IntoIterator<Item = &'a mut A>>(input: &[A], output: I) {
    let mut output = output.into_iter();
    let n = input.len();
    let split_idx = if n % 2 == 0 { n / 2 } else { n / 2 + 1 };
    for (x, out) in zip(&input[split_idx..], &mut output) {
        *out = *x
    }
    for (x, out) in zip_eq(&input[..split_idx], &mut output) {
        *out = *x
    }
}

pub const RANGE_AXIS: Axis = Axis(0);
pub const CHIRP_AXIS: Axis = Axis(1);

/// Complex range-Doppler matrix indexed `[range_bin][doppler_bin]`, with the
/// Doppler axis shifted so zero velocity sits at `num_chirps / 2`.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeDopplerMap {
    data: Array2<Complex64>,
    range_bin_spacing: f64,
    velocity_resolution: f64,
}

impl RangeDopplerMap {
    pub fn data(&self) -> &Array2<Complex64> {
        &self.data
    }

    pub fn into_data(self) -> Array2<Complex64> {
        self.data
    }

    pub fn num_range_bins(&self) -> usize {
        self.data.len_of(RANGE_AXIS)
    }

    pub fn num_chirps(&self) -> usize {
        self.data.len_of(CHIRP_AXIS)
    }

    pub fn range_of(&self, range_bin: usize) -> f64 {
        range_bin as f64 * self.range_bin_spacing
    }

    /// Radial velocity of a Doppler bin, positive when receding.
    pub fn velocity_of(&self, doppler_bin: usize) -> f64 {
        let zero = (self.num_chirps() / 2) as f64;
        (doppler_bin as f64 - zero) * self.velocity_resolution
    }

    pub fn velocity_resolution(&self) -> f64 {
        self.velocity_resolution
    }

    pub fn power_db(&self) -> Array2<f64> {
        self.data.mapv(|x| 20.0 * (x.norm() + 1e-10).log10())
    }

    /// `(range_bin, doppler_bin)` of the strongest cell.
    pub fn peak(&self) -> Option<(usize, usize)> {
        self.data
            .indexed_iter()
            .max_by(|a, b| a.1.norm_sqr().total_cmp(&b.1.norm_sqr()))
            .map(|(index, _)| index)
    }
}

/*
    for each chirp k:
        targets + v·k·T ----> synthesizer ----> range_fft ----> column k
    for each range row:
        row ----> slow-time fft ----> fftshift ----> row
*/
pub struct DopplerProcessor {
    synthesizer: ChirpSynthesizer,
    range: RangeProcessor,
    range_bin_count: usize,
    planner: FftPlanner<f64>,
}

impl DopplerProcessor {
    /// Keeps the unambiguous half of every chirp's range spectrum.
    pub fn new(params: RadarParameters, noise: NoiseModel) -> Result<Self> {
        Self::with_range_bins(params, noise, params.num_samples() / 2)
    }

    pub fn with_range_bins(
        params: RadarParameters,
        noise: NoiseModel,
        range_bin_count: usize,
    ) -> Result<Self> {
        let available = params.num_samples();
        if range_bin_count > available {
            return Err(RadarError::TooManyRangeBins {
                requested: range_bin_count,
                available,
            });
        }
        Ok(Self {
            synthesizer: ChirpSynthesizer::new(params, noise)?,
            range: RangeProcessor::new(&params),
            range_bin_count,
            planner: FftPlanner::new(),
        })
    }

    pub fn range_bin_count(&self) -> usize {
        self.range_bin_count
    }

    pub fn doppler_map(
        &mut self,
        targets: &[TargetState],
        num_chirps: usize,
    ) -> Result<RangeDopplerMap> {
        if num_chirps == 0 {
            return Err(RadarError::NoChirps);
        }
        validate_targets(targets)?;

        let columns = self.chirp_columns(targets, num_chirps)?;

        let mut data = Array2::zeros((self.range_bin_count, num_chirps));
        for (mut column, spectrum) in zip_eq(data.axis_iter_mut(CHIRP_AXIS), columns) {
            for (dst, x) in zip_eq(column.iter_mut(), spectrum) {
                *dst = x;
            }
        }

        let slow_time_fft_plan = self.planner.plan_fft_forward(num_chirps);
        let mut fft_buffer = vec![Complex64::ZERO; num_chirps];
        let mut fft_scratch = vec![Complex64::ZERO; slow_time_fft_plan.get_inplace_scratch_len()];
        for mut row in data.axis_iter_mut(RANGE_AXIS) {
            row.copy_into(&mut fft_buffer[..]);
            slow_time_fft_plan.process_with_scratch(&mut fft_buffer, &mut fft_scratch);
            fftshift_into(&fft_buffer, row.iter_mut());
        }

        let params = self.synthesizer.params();
        debug!(
            "range-Doppler map: {} range bins x {} chirps",
            self.range_bin_count, num_chirps
        );
        Ok(RangeDopplerMap {
            data,
            range_bin_spacing: self.range.bin_spacing(),
            velocity_resolution: params.velocity_resolution(num_chirps),
        })
    }

    #[cfg(not(feature = "parallel"))]
    fn chirp_columns(
        &mut self,
        targets: &[TargetState],
        num_chirps: usize,
    ) -> Result<Vec<Vec<Complex64>>> {
        (0..num_chirps)
            .map(|k| {
                chirp_column(
                    &self.synthesizer,
                    &mut self.range,
                    targets,
                    k,
                    self.range_bin_count,
                )
            })
            .collect()
    }

    /// Chirps are independent, so every worker synthesizes and transforms its
    /// own columns with a private copy of the range processor.
    #[cfg(feature = "parallel")]
    fn chirp_columns(
        &mut self,
        targets: &[TargetState],
        num_chirps: usize,
    ) -> Result<Vec<Vec<Complex64>>> {
        use rayon::prelude::*;

        let synthesizer = &self.synthesizer;
        let range = &self.range;
        let range_bin_count = self.range_bin_count;
        (0..num_chirps)
            .into_par_iter()
            .map_init(
                || range.clone(),
                |range, k| chirp_column(synthesizer, range, targets, k, range_bin_count),
            )
            .collect()
    }
}

/// First `range_bin_count` range bins of chirp `k`, with every target moved
/// by `v·k·T` and noise seeded per chirp.
fn chirp_column(
    synthesizer: &ChirpSynthesizer,
    range: &mut RangeProcessor,
    targets: &[TargetState],
    k: usize,
    range_bin_count: usize,
) -> Result<Vec<Complex64>> {
    let elapsed = k as f64 * synthesizer.params().chirp_duration();
    let moved: Vec<TargetState> = targets
        .iter()
        .map(|target| TargetState {
            range_m: target.range_m + target.velocity_mps * elapsed,
            ..*target
        })
        .collect();

    let seed = synthesizer.noise().seed.wrapping_add(k as u64);
    let (tx, rx) = synthesizer.simulate_targets_seeded(&moved, seed)?;
    let mut spectrum = range.range_fft(&tx, &rx)?.spectrum;
    spectrum.truncate(range_bin_count);
    Ok(spectrum)
}

pub fn doppler_map(
    params: &RadarParameters,
    targets: &[TargetState],
    num_chirps: usize,
    noise: NoiseModel,
) -> Result<RangeDopplerMap> {
    DopplerProcessor::new(*params, noise)?.doppler_map(targets, num_chirps)
}
