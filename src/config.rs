use crate::error::SettingsError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const MIN_FREQUENCY_SECS: f64 = 0.1;
pub const MAX_FREQUENCY_SECS: f64 = 60.0;
pub const MIN_DISTANCE_PX: i32 = 0;
pub const MAX_DISTANCE_PX: i32 = 100;
pub const MIN_IDLE_THRESHOLD_SECS: u64 = 1;
pub const MAX_IDLE_THRESHOLD_SECS: u64 = 3600;

/// Persisted settings. Field names double as the flat keys on disk.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Seconds between jitter checks.
    pub frequency: f64,
    /// Maximum displacement per axis, in pixels.
    pub distance: i32,
    /// Seconds without pointer movement before jittering begins.
    pub idle_threshold: u64,
    pub run_on_startup: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            frequency: 1.0,
            distance: 2,
            idle_threshold: 3,
            run_on_startup: false,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.frequency.is_finite()
            || self.frequency < MIN_FREQUENCY_SECS
            || self.frequency > MAX_FREQUENCY_SECS
        {
            return Err(SettingsError::Frequency {
                value: self.frequency,
                min: MIN_FREQUENCY_SECS,
                max: MAX_FREQUENCY_SECS,
            });
        }
        if !(MIN_DISTANCE_PX..=MAX_DISTANCE_PX).contains(&self.distance) {
            return Err(SettingsError::Distance {
                value: self.distance,
                min: MIN_DISTANCE_PX,
                max: MAX_DISTANCE_PX,
            });
        }
        if !(MIN_IDLE_THRESHOLD_SECS..=MAX_IDLE_THRESHOLD_SECS).contains(&self.idle_threshold) {
            return Err(SettingsError::IdleThreshold {
                value: self.idle_threshold,
                min: MIN_IDLE_THRESHOLD_SECS,
                max: MAX_IDLE_THRESHOLD_SECS,
            });
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.frequency)
    }

    pub fn threshold(&self) -> Duration {
        Duration::from_secs(self.idle_threshold)
    }

    /// Returns a copy with `update` applied, or the first validation error.
    /// `self` is left untouched either way.
    pub fn with_update(&self, update: &SettingsUpdate) -> Result<Settings, SettingsError> {
        let mut next = self.clone();
        if let Some(frequency) = update.frequency {
            next.frequency = frequency;
        }
        if let Some(distance) = update.distance {
            next.distance = distance;
        }
        if let Some(idle_threshold) = update.idle_threshold {
            next.idle_threshold = idle_threshold;
        }
        next.validate()?;
        Ok(next)
    }
}

/// Partial change to the three jitter parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SettingsUpdate {
    pub frequency: Option<f64>,
    pub distance: Option<i32>,
    pub idle_threshold: Option<u64>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.frequency.is_none() && self.distance.is_none() && self.idle_threshold.is_none()
    }

    /// Step the frequency by `delta` seconds, clamped to the valid range.
    pub fn nudge_frequency(current: &Settings, delta: f64) -> Self {
        // Round to tenths so repeated steps don't drift.
        let stepped = ((current.frequency + delta) * 10.0).round() / 10.0;
        Self {
            frequency: Some(stepped.clamp(MIN_FREQUENCY_SECS, MAX_FREQUENCY_SECS)),
            ..Self::default()
        }
    }

    pub fn nudge_distance(current: &Settings, delta: i32) -> Self {
        Self {
            distance: Some(
                current
                    .distance
                    .saturating_add(delta)
                    .clamp(MIN_DISTANCE_PX, MAX_DISTANCE_PX),
            ),
            ..Self::default()
        }
    }

    pub fn nudge_idle_threshold(current: &Settings, delta: i64) -> Self {
        let stepped = (current.idle_threshold as i64).saturating_add(delta);
        Self {
            idle_threshold: Some(
                stepped.clamp(MIN_IDLE_THRESHOLD_SECS as i64, MAX_IDLE_THRESHOLD_SECS as i64)
                    as u64,
            ),
            ..Self::default()
        }
    }
}
