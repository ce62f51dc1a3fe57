use wasm_bindgen::prelude::*;

pub mod cfar;
pub mod chirp;
pub mod config;
pub mod doppler;
pub mod error;
pub mod params;
pub mod pipeline;
pub mod range;
pub mod scene;

pub use cfar::{cfar_detect, group_detections, threshold_for_pfa, CfarDetector};
pub use chirp::{simulate_targets, synthesize_chirp, ChirpSynthesizer, NoiseModel};
pub use config::RadarConfig;
pub use doppler::{doppler_map, DopplerProcessor, RangeDopplerMap};
pub use error::RadarError;
pub use params::{RadarParameters, TargetState, SPEED_OF_LIGHT};
pub use pipeline::{Detection, DetectionReport, RadarPipeline};
pub use range::{range_fft, RangeProcessor, RangeSpectrum};
pub use scene::{Frame, Scene, Sweep};

/*
    scene ----> step(dt) ----> sweep ----> pipeline ----> last_frame ----> detected_ranges
                                                              |                range_profile_db
                                                              |
                  targets --------> doppler processor ----> range_doppler_db
*/
#[wasm_bindgen]
pub struct Radar {
    sweep: Sweep,
    doppler: DopplerProcessor,
    num_chirps: usize,
    last_frame: Option<Frame>,
}

impl Radar {
    pub fn from_config(config: &RadarConfig) -> error::Result<Self> {
        config.validate()?;
        Ok(Self {
            sweep: Sweep::from_config(config)?,
            doppler: DopplerProcessor::new(config.radar, config.noise)?,
            num_chirps: config.num_chirps,
            last_frame: None,
        })
    }

    pub fn params(&self) -> &RadarParameters {
        self.sweep.pipeline().params()
    }

    pub fn scene(&self) -> &Scene {
        self.sweep.scene()
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    /// Advances the scene by `dt` seconds and processes the new frame.
    pub fn advance(&mut self, dt: f64) -> error::Result<&Frame> {
        let frame = self.sweep.next_frame_after(dt)?;
        let frame: &Frame = self.last_frame.insert(frame);
        Ok(frame)
    }

    /// Range-Doppler map of the scene as it currently stands.
    pub fn current_doppler_map(&mut self, num_chirps: usize) -> error::Result<RangeDopplerMap> {
        self.doppler
            .doppler_map(self.sweep.scene().targets(), num_chirps)
    }
}

#[wasm_bindgen]
impl Radar {
    /// Builds a radar from a JSON config; `"{}"` gives the default scene.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<Radar, JsError> {
        #[cfg(target_arch = "wasm32")]
        {
            let _ = console_log::init_with_level(log::Level::Debug);
            console_error_panic_hook::set_once();
        }

        let config = RadarConfig::from_json(config_json)?;
        Ok(Self::from_config(&config)?)
    }

    /// Returns the number of detections in the new frame.
    pub fn step(&mut self, dt: f64) -> Result<usize, JsError> {
        Ok(self.advance(dt)?.report.detections.len())
    }

    pub fn detected_ranges(&self) -> Vec<f64> {
        self.last_frame
            .as_ref()
            .map(|frame| frame.report.ranges())
            .unwrap_or_default()
    }

    pub fn target_ranges(&self) -> Vec<f64> {
        self.scene().targets().iter().map(|t| t.range_m).collect()
    }

    pub fn range_profile_db(&self) -> Vec<f64> {
        self.last_frame
            .as_ref()
            .map(|frame| frame.report.spectrum.magnitude_db())
            .unwrap_or_default()
    }

    pub fn range_axis(&self) -> Vec<f64> {
        let spacing = self.params().range_bin_spacing();
        (0..self.params().num_samples() / 2)
            .map(|bin| bin as f64 * spacing)
            .collect()
    }

    /// Row-major `[range_bin][doppler_bin]` magnitudes in dB.
    pub fn range_doppler_db(&mut self, num_chirps: usize) -> Result<Vec<f64>, JsError> {
        let map = self.current_doppler_map(num_chirps)?;
        Ok(map.power_db().iter().copied().collect())
    }

    pub fn range_bin_count(&self) -> usize {
        self.doppler.range_bin_count()
    }

    /// Chirps per map requested by the config.
    pub fn num_chirps(&self) -> usize {
        self.num_chirps
    }

    pub fn max_range(&self) -> f64 {
        self.params().max_range()
    }

    pub fn max_velocity(&self) -> f64 {
        self.params().max_velocity()
    }

    pub fn range_resolution(&self) -> f64 {
        self.params().range_resolution()
    }
}
