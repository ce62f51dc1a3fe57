//! Moving targets and a frame-by-frame sweep over them.
//!
//! Between frames every target moves along its radial velocity. Targets that
//! come closer than the inner limit or drift past the outer one are turned
//! around, which keeps a long-running scene inside the unambiguous range.

use std::sync::atomic::{AtomicBool, Ordering};

use log::info;

use crate::config::RadarConfig;
use crate::error::{RadarError, Result};
use crate::params::{validate_targets, RadarParameters, TargetState};
use crate::pipeline::{DetectionReport, RadarPipeline};

pub const MIN_SCENE_RANGE_M: f64 = 5.0;
/// Outer turnaround point as a fraction of the unambiguous range.
pub const MAX_RANGE_FRACTION: f64 = 0.95;

#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    targets: Vec<TargetState>,
    min_range_m: f64,
    max_range_m: f64,
}

impl Scene {
    pub fn new(targets: Vec<TargetState>, min_range_m: f64, max_range_m: f64) -> Result<Self> {
        validate_targets(&targets)?;
        if !(min_range_m >= 0.0 && max_range_m > min_range_m && max_range_m.is_finite()) {
            return Err(RadarError::InvalidParameter {
                name: "max_range_m",
                value: max_range_m,
            });
        }
        Ok(Self {
            targets,
            min_range_m,
            max_range_m,
        })
    }

    /// Scene bounded by [`MIN_SCENE_RANGE_M`] and 95% of the radar's
    /// unambiguous range.
    pub fn for_radar(targets: Vec<TargetState>, params: &RadarParameters) -> Result<Self> {
        Self::new(
            targets,
            MIN_SCENE_RANGE_M,
            params.max_range() * MAX_RANGE_FRACTION,
        )
    }

    pub fn targets(&self) -> &[TargetState] {
        &self.targets
    }

    pub fn add_target(&mut self, target: TargetState) -> Result<()> {
        target.validate(self.targets.len())?;
        self.targets.push(target);
        Ok(())
    }

    pub fn advance(&mut self, dt: f64) {
        for target in &mut self.targets {
            target.range_m += target.velocity_mps * dt;
            if target.range_m < self.min_range_m {
                target.range_m = self.min_range_m;
                target.velocity_mps = target.velocity_mps.abs();
            } else if target.range_m > self.max_range_m {
                target.range_m = self.max_range_m;
                target.velocity_mps = -target.velocity_mps.abs();
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub index: u64,
    pub time_s: f64,
    /// Ground truth the frame was simulated from.
    pub targets: Vec<TargetState>,
    pub report: DetectionReport,
}

/// Runs the pipeline once per frame over a moving scene. Frame `i` draws its
/// noise from `seed + i`, so a sweep replays identically.
pub struct Sweep {
    pipeline: RadarPipeline,
    scene: Scene,
    frame_interval_s: f64,
    next_index: u64,
    elapsed_s: f64,
}

impl Sweep {
    pub fn new(pipeline: RadarPipeline, scene: Scene, frame_interval_s: f64) -> Result<Self> {
        if !(frame_interval_s.is_finite() && frame_interval_s > 0.0) {
            return Err(RadarError::InvalidParameter {
                name: "frame_interval_s",
                value: frame_interval_s,
            });
        }
        Ok(Self {
            pipeline,
            scene,
            frame_interval_s,
            next_index: 0,
            elapsed_s: 0.0,
        })
    }

    pub fn from_config(config: &RadarConfig) -> Result<Self> {
        let pipeline = RadarPipeline::from_config(config)?;
        let scene = Scene::for_radar(config.targets.clone(), &config.radar)?;
        Self::new(pipeline, scene, config.frame_interval_s)
    }

    pub fn pipeline(&self) -> &RadarPipeline {
        &self.pipeline
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// Moves the scene one frame interval forward and processes it.
    pub fn next_frame(&mut self) -> Result<Frame> {
        self.next_frame_after(self.frame_interval_s)
    }

    /// Same as [`next_frame`](Self::next_frame) with an explicit time step.
    pub fn next_frame_after(&mut self, dt: f64) -> Result<Frame> {
        if !(dt.is_finite() && dt >= 0.0) {
            return Err(RadarError::InvalidParameter {
                name: "dt",
                value: dt,
            });
        }
        self.scene.advance(dt);

        let index = self.next_index;
        let seed = self.pipeline.noise().seed.wrapping_add(index);
        let report = self.pipeline.process_seeded(self.scene.targets(), seed)?;
        self.next_index += 1;
        self.elapsed_s += dt;

        Ok(Frame {
            index,
            time_s: self.elapsed_s,
            targets: self.scene.targets().to_vec(),
            report,
        })
    }

    /// Produces frames until `stop` is raised or `max_frames` have run.
    /// Returns the number of frames processed.
    pub fn run<F>(&mut self, stop: &AtomicBool, max_frames: usize, mut on_frame: F) -> Result<usize>
    where
        F: FnMut(&Frame),
    {
        let mut count = 0;
        while count < max_frames && !stop.load(Ordering::Relaxed) {
            let frame = self.next_frame()?;
            on_frame(&frame);
            count += 1;
        }
        info!("sweep finished after {count} frames");
        Ok(count)
    }
}
