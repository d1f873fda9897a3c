//! Engine settings
//!
//! Loaded from JSON (or defaulted), validated once at engine construction.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::STEP_RATE;
use crate::error::EngineError;

/// Tunable engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Seed for the world RNG
    pub seed: u64,
    /// Steps per second, used to turn worker time into a load fraction
    pub step_rate: f64,

    // === Collision index ===
    /// Side length of one grid cell
    pub collision_cell_size: f32,
    /// Cells per axis (the grid wraps around)
    pub collision_cell_count: usize,

    // === Interaction ===
    /// Maximum distance between a click and a ship's edge to target it
    pub click_range: f32,
    /// Radius around flotsam in which ships collect it
    pub pickup_radius: f32,

    // === Narrative pacing ===
    /// Steps between two requests for help
    pub grudge_cooldown_steps: u32,
    /// Average steps between random hails (0 disables hails)
    pub hail_period: u32,

    /// Weight of the newest sample in the smoothed load metric (0, 1]
    pub load_smoothing: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            step_rate: STEP_RATE,

            collision_cell_size: 256.0,
            collision_cell_count: 32,

            click_range: 50.0,
            pickup_radius: 5.0,

            grudge_cooldown_steps: 120,
            hail_period: 600,

            load_smoothing: 0.05,
        }
    }
}

impl EngineSettings {
    /// Parse settings from a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let settings = Self::from_json_str(&json)?;
        log::info!("Loaded engine settings from {}", path.as_ref().display());
        Ok(settings)
    }

    /// Serialize settings to pretty JSON
    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.step_rate > 0.0) {
            return Err(EngineError::InvalidSettings("step_rate must be positive"));
        }
        if !(self.collision_cell_size > 0.0) {
            return Err(EngineError::InvalidSettings(
                "collision_cell_size must be positive",
            ));
        }
        if self.collision_cell_count == 0 {
            return Err(EngineError::InvalidSettings(
                "collision_cell_count must be non-zero",
            ));
        }
        if self.click_range < 0.0 || self.pickup_radius < 0.0 {
            return Err(EngineError::InvalidSettings("ranges must not be negative"));
        }
        if !(self.load_smoothing > 0.0 && self.load_smoothing <= 1.0) {
            return Err(EngineError::InvalidSettings(
                "load_smoothing must be in (0, 1]",
            ));
        }
        Ok(())
    }

    /// Wall time budgeted for one step, in seconds
    pub fn step_seconds(&self) -> f64 {
        1.0 / self.step_rate
    }
}
