//! Transient visual effects (explosions, sparks, flashes)
//!
//! No gameplay effect: they move, age and expire.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::body::{Body, SpriteId};
use super::registry::Expire;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visual {
    pub body: Body,
    /// Total lifetime in steps
    pub lifetime: u32,
    /// Steps lived so far
    pub age: u32,
}

impl Visual {
    pub fn new(sprite: SpriteId, position: Vec2, velocity: Vec2, lifetime: u32) -> Self {
        let mut body = Body::new(position, velocity, 0.0, 0.0);
        body.sprite = sprite;
        Self {
            body,
            lifetime,
            age: 0,
        }
    }

    /// Advance one step
    pub fn step(&mut self) {
        self.body.position += self.body.velocity;
        self.age += 1;
    }

    /// 0 at birth, 1 at expiry
    pub fn progress(&self) -> f32 {
        if self.lifetime == 0 {
            1.0
        } else {
            (self.age as f32 / self.lifetime as f32).min(1.0)
        }
    }
}

impl Expire for Visual {
    fn should_be_removed(&self) -> bool {
        self.age >= self.lifetime
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visual_moves_and_expires() {
        let mut visual = Visual::new(SpriteId(3), Vec2::ZERO, Vec2::new(1.0, 0.0), 2);
        visual.step();
        assert!(!visual.should_be_removed());
        visual.step();
        assert!(visual.should_be_removed());
        assert_eq!(visual.body.position, Vec2::new(2.0, 0.0));
        assert_eq!(visual.progress(), 1.0);
    }
}
