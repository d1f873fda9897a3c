//! Per-step snapshot handed to the presenter
//!
//! The worker fills one [`Frame`] per step; the presenter reads it between
//! `wait()` and the next `advance()`. Nothing in here refers back into the
//! live world except by [`ShipId`].

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::body::{Body, SpriteId};
use super::events::ShipEvent;
use super::government::GovernmentId;
use super::registry::ShipId;
use super::system::SystemId;

/// What a drawable is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawKind {
    Planet,
    Asteroid,
    Flotsam,
    Ship(ShipId),
    Projectile,
    Visual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Drawable {
    pub kind: DrawKind,
    pub sprite: SpriteId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub facing: f32,
    pub zoom: f32,
    pub cloak: f32,
}

impl Drawable {
    pub fn from_body(kind: DrawKind, body: &Body) -> Self {
        Self {
            kind,
            sprite: body.sprite,
            position: body.position,
            velocity: body.velocity,
            facing: body.facing,
            zoom: body.zoom,
            cloak: 0.0,
        }
    }

    pub fn with_cloak(mut self, cloak: f32) -> Self {
        self.cloak = cloak;
        self
    }
}

/// Radar blip colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RadarKind {
    Player,
    Friendly,
    Unfriendly,
    Hostile,
    Inactive,
    Special,
    Blink,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadarBlip {
    pub kind: RadarKind,
    pub position: Vec2,
    pub size: f32,
}

/// Arrow toward a neighboring system
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadarPointer {
    pub kind: RadarKind,
    pub direction: Vec2,
}

/// Structured narrative messages; wording is up to the presenter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// A ship asks the player for help against an attacker's government
    PleaForHelp {
        from: ShipId,
        against: GovernmentId,
        heroic: bool,
    },
    /// A ship the player helped says thanks
    Thanks { from: ShipId },
    /// Idle chatter
    Hail { from: ShipId },
    /// A planet would not let the flagship land
    LandingRefused { planet: String },
}

/// Flagship readouts for the HUD
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagshipStatus {
    pub id: ShipId,
    pub hull: f32,
    pub shields: f32,
    pub energy: f32,
    pub heat: f32,
    pub fuel: f32,
    pub system: Option<SystemId>,
    pub landed_on: Option<usize>,
    pub target: Option<ShipId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Frame {
    /// Step this frame shows
    pub step: u64,
    /// View center and its velocity (the flagship's)
    pub center: Vec2,
    pub center_velocity: Vec2,
    pub system: Option<SystemId>,
    /// Back to front
    pub drawables: Vec<Drawable>,
    pub radar: Vec<RadarBlip>,
    pub pointers: Vec<RadarPointer>,
    pub events: Vec<ShipEvent>,
    pub messages: Vec<Message>,
    /// Hostile ships have just appeared
    pub hostiles_alarm: bool,
    pub flagship: Option<FlagshipStatus>,
    /// Smoothed fraction of the step period the worker spent computing
    pub load: f64,
}

impl Frame {
    /// Empty the frame for a new step, keeping allocations
    pub fn clear(&mut self, step: u64) {
        self.step = step;
        self.center = Vec2::ZERO;
        self.center_velocity = Vec2::ZERO;
        self.system = None;
        self.drawables.clear();
        self.radar.clear();
        self.pointers.clear();
        self.events.clear();
        self.messages.clear();
        self.hostiles_alarm = false;
        self.flagship = None;
    }

    pub fn add(&mut self, drawable: Drawable) {
        self.drawables.push(drawable);
    }

    pub fn add_blip(&mut self, kind: RadarKind, position: Vec2, size: f32) {
        self.radar.push(RadarBlip {
            kind,
            position,
            size,
        });
    }

    pub fn add_pointer(&mut self, kind: RadarKind, direction: Vec2) {
        self.pointers.push(RadarPointer {
            kind,
            direction: direction.normalize_or_zero(),
        });
    }

    /// Drawables of ships, in draw order
    pub fn ships(&self) -> impl Iterator<Item = (ShipId, &Drawable)> {
        self.drawables.iter().filter_map(|d| match d.kind {
            DrawKind::Ship(id) => Some((id, d)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_keeps_step_and_load() {
        let mut frame = Frame::default();
        frame.add(Drawable::from_body(DrawKind::Visual, &Body::default()));
        frame.add_blip(RadarKind::Hostile, Vec2::ZERO, 1.0);
        frame.hostiles_alarm = true;
        frame.load = 0.5;

        frame.clear(7);
        assert_eq!(frame.step, 7);
        assert!(frame.drawables.is_empty());
        assert!(frame.radar.is_empty());
        assert!(!frame.hostiles_alarm);
        assert_eq!(frame.load, 0.5);
    }

    #[test]
    fn test_pointer_is_normalized() {
        let mut frame = Frame::default();
        frame.add_pointer(RadarKind::Special, Vec2::new(30.0, 40.0));
        assert!((frame.pointers[0].direction.length() - 1.0).abs() < 1e-5);
    }
}
