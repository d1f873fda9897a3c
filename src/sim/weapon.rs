//! Weapon descriptors and the hardpoints that carry them

use std::sync::Arc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::body::SpriteId;

/// Static description of a weapon, shared by every projectile it fires
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Weapon {
    pub name: String,
    pub sprite: SpriteId,
    /// Projectile speed (units per step); range for anti-missile systems
    pub velocity: f32,
    /// Projectile lifetime in steps
    pub lifetime: u32,
    /// Steps between shots
    pub reload: u32,

    // === Damage ===
    pub shield_damage: f32,
    pub hull_damage: f32,
    pub heat_damage: f32,
    /// Detonation damages everything within this radius
    pub blast_radius: f32,
    /// Detonate when an enemy (or the target) comes this close
    pub trigger_radius: f32,

    // === Behavior ===
    /// With a locked target, can only ever hit that target
    pub phasing: bool,
    /// Blast spares ships that are neither the target nor hostile
    pub safe: bool,
    /// Steers toward its target
    pub homing: bool,
    /// Homing turn rate (radians per step)
    pub turn: f32,
    /// How hard this is to shoot down (0 = not a missile)
    pub missile_strength: u32,
    /// Interception strength (0 = not an anti-missile system)
    pub anti_missile: u32,

    // === Cost of firing ===
    pub firing_energy: f32,
    pub firing_heat: f32,

    // === Effects ===
    pub hit_effect: Option<SpriteId>,
    pub die_effect: Option<SpriteId>,
    pub effect_lifetime: u32,
}

impl Default for Weapon {
    fn default() -> Self {
        Self {
            name: String::new(),
            sprite: SpriteId::default(),
            velocity: 10.0,
            lifetime: 60,
            reload: 10,
            shield_damage: 0.0,
            hull_damage: 0.0,
            heat_damage: 0.0,
            blast_radius: 0.0,
            trigger_radius: 0.0,
            phasing: false,
            safe: false,
            homing: false,
            turn: 0.0,
            missile_strength: 0,
            anti_missile: 0,
            firing_energy: 0.0,
            firing_heat: 0.0,
            hit_effect: None,
            die_effect: None,
            effect_lifetime: 20,
        }
    }
}

impl Weapon {
    pub fn is_anti_missile(&self) -> bool {
        self.anti_missile > 0
    }
}

/// A weapon mount on a ship
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hardpoint {
    pub weapon: Arc<Weapon>,
    /// Mount position relative to the ship, before rotation by its facing
    #[serde(default)]
    pub offset: Vec2,
    /// Firing angle relative to the ship's facing
    #[serde(default)]
    pub angle: f32,
    /// Steps until ready again
    #[serde(default)]
    pub reload: u32,
    /// Remaining rounds; `None` means unlimited
    #[serde(default)]
    pub ammo: Option<u32>,
}

impl Hardpoint {
    pub fn new(weapon: Arc<Weapon>) -> Self {
        Self {
            weapon,
            offset: Vec2::ZERO,
            angle: 0.0,
            reload: 0,
            ammo: None,
        }
    }

    pub fn with_ammo(mut self, ammo: u32) -> Self {
        self.ammo = Some(ammo);
        self
    }

    /// Loaded and not out of ammunition
    pub fn is_ready(&self) -> bool {
        self.reload == 0 && self.ammo != Some(0)
    }

    /// Count down the reload timer
    pub fn step(&mut self) {
        self.reload = self.reload.saturating_sub(1);
    }

    /// Consume one shot
    pub fn discharge(&mut self) {
        self.reload = self.weapon.reload;
        if let Some(ammo) = self.ammo.as_mut() {
            *ammo = ammo.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hardpoint_reload_and_ammo() {
        let weapon = Arc::new(Weapon {
            reload: 2,
            ..Default::default()
        });
        let mut hardpoint = Hardpoint::new(weapon).with_ammo(1);
        assert!(hardpoint.is_ready());

        hardpoint.discharge();
        assert!(!hardpoint.is_ready());
        hardpoint.step();
        hardpoint.step();
        // Reloaded, but out of ammo
        assert_eq!(hardpoint.reload, 0);
        assert!(!hardpoint.is_ready());
    }
}
