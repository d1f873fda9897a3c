//! Shipsim - a double-buffered step simulation engine
//!
//! Core modules:
//! - `sim`: Deterministic simulation (entities, movement, collisions, events)
//! - `engine`: Worker thread and tick-tock hand-off to the presenter
//! - `settings`: Tunable engine configuration
//! - `error`: Errors surfaced by the outer API

pub mod engine;
pub mod error;
pub mod settings;
pub mod sim;

pub use engine::Engine;
pub use error::EngineError;
pub use settings::EngineSettings;

use glam::Vec2;

/// Simulation configuration constants
pub mod consts {
    /// Default step rate (steps per second) used for the load metric
    pub const STEP_RATE: f64 = 60.0;

    /// Steps a ship spends leaving or entering hyperspace
    pub const HYPERSPACE_STEPS: u32 = 100;
    /// Distance from system center at which hyperspace arrivals appear
    pub const HYPERSPACE_ARRIVAL_DISTANCE: f32 = 2000.0;
    /// Zoom gained per step while launching or taking off
    pub const ZOOM_RATE: f32 = 0.02;

    /// Steps a destroyed ship burns before it is removed
    pub const EXPLOSION_STEPS: u32 = 60;
    /// Hull fraction below which a ship is disabled
    pub const DISABLED_HULL_FRACTION: f32 = 0.15;
    /// Speed multiplier applied to drifting (disabled) ships each step
    pub const DRIFT_DRAG: f32 = 0.99;

    /// Boarding requires the boarder to be this close (beyond radii)
    pub const BOARDING_RANGE: f32 = 5.0;
    /// Maximum relative speed at which boarding can happen
    pub const BOARDING_SPEED: f32 = 1.0;

    /// Steps of continuous scanning needed to complete a scan
    pub const SCAN_STEPS: u32 = 120;

    /// Asteroid field wraps inside a square of this side length
    pub const ASTEROID_WRAP: f32 = 4096.0;

    /// Steps the "hostiles appeared" alarm stays quiet after sounding
    pub const ALARM_COOLDOWN_STEPS: u32 = 180;

    /// Lifetime of flotsam in steps
    pub const FLOTSAM_LIFETIME: u32 = 3600;
    /// Flotsam velocity decay per step
    pub const FLOTSAM_DRAG: f32 = 0.995;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Convert polar (r, theta) to cartesian (x, y)
#[inline]
pub fn polar_to_cartesian(r: f32, theta: f32) -> Vec2 {
    Vec2::new(r * theta.cos(), r * theta.sin())
}

/// Convert cartesian (x, y) to polar (r, theta)
#[inline]
pub fn cartesian_to_polar(pos: Vec2) -> (f32, f32) {
    (pos.length(), pos.y.atan2(pos.x))
}
