//! Projectiles: fired by ships, destroyed on impact or expiry

use std::sync::Arc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::body::Body;
use super::government::GovernmentId;
use super::registry::{Expire, ShipId, ShipRegistry};
use super::visual::Visual;
use super::weapon::Weapon;
use crate::normalize_angle;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projectile {
    pub body: Body,
    pub weapon: Arc<Weapon>,
    /// Firing faction; `None` marks a detached explosion that always detonates
    pub government: Option<GovernmentId>,
    /// Ship that fired it (weak)
    pub source: Option<ShipId>,
    /// Locked target (weak). Cleared once the target is gone.
    pub target: Option<ShipId>,
    /// Steps of movement left. A projectile still collides on the step that
    /// brings this to 0 and expires on the following one.
    pub lifetime: u32,
    /// Detonated, shot down or expired
    #[serde(default)]
    dead: bool,
}

impl Projectile {
    /// A projectile leaving a hardpoint
    pub fn fire(
        weapon: Arc<Weapon>,
        government: GovernmentId,
        source: ShipId,
        target: Option<ShipId>,
        position: Vec2,
        inherited: Vec2,
        facing: f32,
    ) -> Self {
        let mut body = Body::new(position, Vec2::ZERO, facing, 0.0);
        body.velocity = inherited + body.unit() * weapon.velocity;
        body.sprite = weapon.sprite;
        Self {
            body,
            lifetime: weapon.lifetime.max(1),
            weapon,
            government: Some(government),
            source: Some(source),
            target,
            dead: false,
        }
    }

    /// A blast with no owner, riding the projectile channel so the collision
    /// phase applies its damage.
    pub fn explosion(weapon: Arc<Weapon>, position: Vec2, velocity: Vec2) -> Self {
        let mut body = Body::new(position, velocity, 0.0, 0.0);
        body.sprite = weapon.sprite;
        Self {
            body,
            lifetime: 1,
            weapon,
            government: None,
            source: None,
            target: None,
            dead: false,
        }
    }

    /// Advance one step: steer if homing, move, age
    pub fn step(&mut self, ships: &ShipRegistry, visuals: &mut Vec<Visual>) {
        if self.dead {
            return;
        }
        if self.lifetime == 0 {
            self.dead = true;
            if let Some(effect) = self.weapon.die_effect {
                visuals.push(Visual::new(
                    effect,
                    self.body.position,
                    self.body.velocity * 0.5,
                    self.weapon.effect_lifetime,
                ));
            }
            return;
        }

        // A target that vanished or left degrades to "no target"
        let target = self.target.and_then(|id| ships.get(id)).filter(|t| t.is_targetable());
        if target.is_none() {
            self.target = None;
        }

        if self.weapon.homing
            && let Some(target) = target
        {
            let to_target = target.body.position - self.body.position;
            let desired = to_target.y.atan2(to_target.x);
            let delta = normalize_angle(desired - self.body.facing);
            let turn = self.weapon.turn;
            self.body.turn(delta.clamp(-turn, turn));
            let speed = self.body.velocity.length();
            self.body.velocity = self.body.unit() * speed;
        }

        self.body.position += self.body.velocity;
        self.lifetime -= 1;
    }

    /// Detonate `fraction` of the way along this step's path
    pub fn explode(&mut self, fraction: f32, hit_velocity: Vec2, visuals: &mut Vec<Visual>) {
        if let Some(effect) = self.weapon.hit_effect {
            visuals.push(Visual::new(
                effect,
                self.hit_position(fraction),
                hit_velocity,
                self.weapon.effect_lifetime,
            ));
        }
        self.dead = true;
    }

    /// Point `fraction` of the way along this step's path
    pub fn hit_position(&self, fraction: f32) -> Vec2 {
        self.body.position + self.body.velocity * fraction
    }

    /// Destroy without an impact (shot down)
    pub fn kill(&mut self) {
        self.dead = true;
    }

    pub fn is_live(&self) -> bool {
        !self.dead
    }
}

impl Expire for Projectile {
    fn should_be_removed(&self) -> bool {
        self.dead
    }
}
