//! Bake configuration.
//!
//! [`BakeConfig`] is plain serde data so hosts can load it from JSON (or any
//! other serde format) next to their own settings.

use serde::{Deserialize, Serialize};

use crate::bake::DeformationFlags;
use crate::errors::{Result, SkelBakeError};
use crate::time::Interval;

const PLAYBACK_RATE_EPSILON: f64 = 1e-6;

/// Stage playback range and rates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackMetadata {
    pub start_time_code: f64,
    pub end_time_code: f64,
    pub time_codes_per_second: f64,
    pub frames_per_second: f64,
}

impl PlaybackMetadata {
    #[must_use]
    pub fn new(start_time_code: f64, end_time_code: f64, time_codes_per_second: f64, frames_per_second: f64) -> Self {
        Self {
            start_time_code,
            end_time_code,
            time_codes_per_second,
            frames_per_second,
        }
    }

    /// Frame times of the playback range that fall inside `interval`.
    ///
    /// One frame step is `|tcps / fps|` time codes. Empty when either rate is
    /// close to zero or the range is inverted.
    #[must_use]
    pub fn time_codes_in(&self, interval: &Interval) -> Vec<f64> {
        if self.time_codes_per_second.abs() < PLAYBACK_RATE_EPSILON
            || self.frames_per_second.abs() < PLAYBACK_RATE_EPSILON
            || self.end_time_code < self.start_time_code
        {
            return Vec::new();
        }

        let step = (self.time_codes_per_second / self.frames_per_second).abs();
        let count = ((self.end_time_code - self.start_time_code) / step) as usize + 1;

        (0..=count)
            .map(|i| self.start_time_code + step * i as f64)
            .filter(|&t| interval.contains(t))
            .collect()
    }
}

/// Options controlling a bake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BakeConfig {
    /// Closed time interval to sample.
    pub interval: Interval,
    /// Deformation paths allowed to run; others are masked off per target.
    pub deformation_flags: DeformationFlags,
    /// Recompute bounding extents whenever points are deformed.
    pub update_extents: bool,
    /// Only bake the target at this absolute prim path.
    pub target_path: Option<String>,
    /// Overrides the host's playback metadata when set.
    pub playback: Option<PlaybackMetadata>,
}

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            interval: Interval::default(),
            deformation_flags: DeformationFlags::all(),
            update_extents: true,
            target_path: None,
            playback: None,
        }
    }
}

impl BakeConfig {
    #[must_use]
    pub fn new(interval: Interval) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_deformation_flags(mut self, flags: DeformationFlags) -> Self {
        self.deformation_flags = flags;
        self
    }

    #[must_use]
    pub fn with_target_path(mut self, path: impl Into<String>) -> Self {
        self.target_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_playback(mut self, playback: PlaybackMetadata) -> Self {
        self.playback = Some(playback);
        self
    }

    pub fn validate(&self) -> Result<()> {
        let Interval { min, max } = self.interval;
        if !min.is_finite() || !max.is_finite() {
            return Err(SkelBakeError::InvalidConfig(format!(
                "interval [{min}, {max}] is not finite"
            )));
        }
        if min > max {
            return Err(SkelBakeError::InvalidConfig(format!(
                "interval start {min} is after end {max}"
            )));
        }
        if let Some(playback) = &self.playback {
            let values = [
                playback.start_time_code,
                playback.end_time_code,
                playback.time_codes_per_second,
                playback.frames_per_second,
            ];
            if values.iter().any(|v| !v.is_finite()) {
                return Err(SkelBakeError::InvalidConfig(
                    "playback metadata is not finite".to_string(),
                ));
            }
        }
        Ok(())
    }
}
