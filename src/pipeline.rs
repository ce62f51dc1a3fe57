use serde::Serialize;

#[allow(unused_imports)]
use log::debug;

use crate::cfar::{group_detections, CfarDetector};
use crate::chirp::{ChirpSynthesizer, NoiseModel};
use crate::config::RadarConfig;
use crate::error::Result;
use crate::params::{RadarParameters, TargetState};
use crate::range::{RangeProcessor, RangeSpectrum};

/// One target extracted from a range profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    pub bin: usize,
    pub range_m: f64,
    pub power: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionReport {
    pub spectrum: RangeSpectrum,
    /// Every bin CFAR flagged, ascending.
    pub flagged: Vec<usize>,
    /// One entry per run of adjacent flagged bins.
    pub detections: Vec<Detection>,
}

impl DetectionReport {
    pub fn ranges(&self) -> Vec<f64> {
        self.detections.iter().map(|d| d.range_m).collect()
    }
}

/*
    targets ----> synthesizer ----> range processor ----> cfar ----> grouping ----> detections
*/
pub struct RadarPipeline {
    synthesizer: ChirpSynthesizer,
    range: RangeProcessor,
    detector: CfarDetector,
}

impl RadarPipeline {
    pub fn new(params: RadarParameters, noise: NoiseModel, detector: CfarDetector) -> Result<Self> {
        detector.validate()?;
        Ok(Self {
            synthesizer: ChirpSynthesizer::new(params, noise)?,
            range: RangeProcessor::new(&params),
            detector,
        })
    }

    pub fn from_config(config: &RadarConfig) -> Result<Self> {
        Self::new(config.radar, config.noise, config.cfar)
    }

    pub fn params(&self) -> &RadarParameters {
        self.synthesizer.params()
    }

    pub fn noise(&self) -> &NoiseModel {
        self.synthesizer.noise()
    }

    pub fn detector(&self) -> &CfarDetector {
        &self.detector
    }

    pub fn process(&mut self, targets: &[TargetState]) -> Result<DetectionReport> {
        self.process_seeded(targets, self.synthesizer.noise().seed)
    }

    pub fn process_seeded(&mut self, targets: &[TargetState], seed: u64) -> Result<DetectionReport> {
        let (tx, rx) = self.synthesizer.simulate_targets_seeded(targets, seed)?;
        let spectrum = self.range.range_fft(&tx, &rx)?;

        let power = spectrum.power_profile();
        let flagged = self.detector.detect(&power);
        let detections = group_detections(&flagged, &power)
            .into_iter()
            .map(|bin| Detection {
                bin,
                range_m: spectrum.range_of(bin),
                power: power[bin],
            })
            .collect::<Vec<_>>();

        debug!(
            "{} targets -> {} flagged bins -> {} detections",
            targets.len(),
            flagged.len(),
            detections.len()
        );
        Ok(DetectionReport {
            spectrum,
            flagged,
            detections,
        })
    }
}
