//! Shared kinematic state and the collidable capability
//!
//! Everything that moves carries a [`Body`]. Anything that can sit in a
//! collision index implements [`Collidable`].

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::government::GovernmentId;
use crate::{normalize_angle, polar_to_cartesian};

/// Index into the presentation layer's sprite table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SpriteId(pub u32);

/// Position, velocity, facing and materialization of a moving object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Body {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Facing angle (radians, normalized to [-π, π))
    pub facing: f32,
    /// Collision radius
    pub radius: f32,
    /// 0 = not yet present, 1 = fully present (launch/landing/hyperspace)
    pub zoom: f32,
    pub sprite: SpriteId,
}

impl Default for Body {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            facing: 0.0,
            radius: 1.0,
            zoom: 1.0,
            sprite: SpriteId::default(),
        }
    }
}

impl Body {
    pub fn new(position: Vec2, velocity: Vec2, facing: f32, radius: f32) -> Self {
        Self {
            position,
            velocity,
            facing: normalize_angle(facing),
            radius,
            ..Default::default()
        }
    }

    /// Unit vector along the facing
    #[inline]
    pub fn unit(&self) -> Vec2 {
        polar_to_cartesian(1.0, self.facing)
    }

    /// Turn by `delta` radians
    #[inline]
    pub fn turn(&mut self, delta: f32) {
        self.facing = normalize_angle(self.facing + delta);
    }

    /// Fully materialized (eligible for collision)
    #[inline]
    pub fn is_present(&self) -> bool {
        self.zoom >= 1.0
    }
}

/// Capability shared by everything a collision index can hold
pub trait Collidable {
    fn position(&self) -> Vec2;
    fn velocity(&self) -> Vec2;
    fn facing(&self) -> f32;
    fn radius(&self) -> f32;
    /// Owning faction; `None` for neutral geometry such as asteroids
    fn government(&self) -> Option<GovernmentId>;
}

/// Fraction along `from -> from + path` at which a point first comes within
/// `radius` of `center`.
///
/// Returns `Some(0.0)` if the start is already inside, `None` if the segment
/// misses or only touches at or beyond its end (fraction >= 1).
pub fn sweep_circle(from: Vec2, path: Vec2, center: Vec2, radius: f32) -> Option<f32> {
    let offset = from - center;
    let c = offset.length_squared() - radius * radius;
    if c <= 0.0 {
        return Some(0.0);
    }

    let a = path.length_squared();
    if a <= f32::EPSILON {
        return None;
    }
    let b = 2.0 * offset.dot(path);
    // Moving away
    if b >= 0.0 {
        return None;
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }

    let t = (-b - disc.sqrt()) / (2.0 * a);
    (0.0..1.0).contains(&t).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_hits_circle_ahead() {
        let t = sweep_circle(Vec2::ZERO, Vec2::new(100.0, 0.0), Vec2::new(50.0, 0.0), 10.0)
            .expect("hit");
        assert!((t - 0.4).abs() < 1e-5);
    }

    #[test]
    fn test_sweep_start_inside_is_zero() {
        let t = sweep_circle(Vec2::new(1.0, 0.0), Vec2::new(10.0, 0.0), Vec2::ZERO, 5.0);
        assert_eq!(t, Some(0.0));
    }

    #[test]
    fn test_sweep_misses() {
        // Passes beside the circle
        assert!(sweep_circle(Vec2::ZERO, Vec2::new(100.0, 0.0), Vec2::new(50.0, 20.0), 10.0).is_none());
        // Circle beyond the end of the path
        assert!(sweep_circle(Vec2::ZERO, Vec2::new(30.0, 0.0), Vec2::new(50.0, 0.0), 10.0).is_none());
        // Circle behind the start
        assert!(sweep_circle(Vec2::ZERO, Vec2::new(30.0, 0.0), Vec2::new(-50.0, 0.0), 10.0).is_none());
    }

    #[test]
    fn test_body_turn_normalizes() {
        let mut body = Body::new(Vec2::ZERO, Vec2::ZERO, 3.0, 10.0);
        body.turn(1.0);
        assert!(body.facing < std::f32::consts::PI);
        assert!(body.facing >= -std::f32::consts::PI);
    }
}
