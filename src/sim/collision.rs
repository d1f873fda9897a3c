//! Collision resolution: projectile impacts, blasts, interception, pickup
//!
//! Runs once per step after every registry has moved and been pruned. All
//! hit comparisons share the 0..1 fraction-along-path scale, so ship,
//! asteroid and trigger-radius results compare directly; `1.0` means no hit.

use glam::Vec2;
use rand::Rng;

use super::asteroid::{AsteroidField, AsteroidRef};
use super::body::sweep_circle;
use super::events::{EventQueue, ShipEvent};
use super::flotsam::Flotsam;
use super::government::{GovernmentId, Politics};
use super::projectile::Projectile;
use super::registry::{ShipId, ShipRegistry, Spawns};
use super::spatial::CollisionSet;
use super::system::SystemId;

/// Closest thing a projectile's path meets this step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impact {
    /// 0 = at the start of the path; 1 = nothing hit
    pub fraction: f32,
    pub ship: Option<ShipId>,
    pub asteroid: Option<AsteroidRef>,
    pub velocity: Vec2,
}

impl Impact {
    pub const MISS: Impact = Impact {
        fraction: 1.0,
        ship: None,
        asteroid: None,
        velocity: Vec2::ZERO,
    };

    pub fn is_hit(&self) -> bool {
        self.fraction < 1.0
    }
}

/// What became of a projectile
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Miss,
    /// Detonated; `ship` is the body hit directly, if it was a ship
    Detonated { fraction: f32, ship: Option<ShipId> },
    /// Shot down by this ship's anti-missile system
    Intercepted(ShipId),
}

fn is_hostile(politics: &Politics, attacker: Option<GovernmentId>, other: Option<GovernmentId>) -> bool {
    match (attacker, other) {
        (Some(a), Some(b)) => politics.is_enemy(a, b),
        _ => false,
    }
}

/// Everything the collision phase reads or mutates, borrowed from the world
pub struct Resolver<'a, R: Rng> {
    pub ships: &'a mut ShipRegistry,
    /// Materialized ships with cloak < 1
    pub visible: &'a CollisionSet<ShipId>,
    /// Fully cloaked ships (reachable only by blasts)
    pub cloaked: &'a CollisionSet<ShipId>,
    pub asteroids: &'a mut AsteroidField,
    /// Ships with an anti-missile system ready this step
    pub anti_missile: &'a [ShipId],
    pub politics: &'a Politics,
    /// System the collision sets were built for
    pub system: Option<SystemId>,
    pub events: &'a mut EventQueue,
    pub spawns: &'a mut Spawns,
    pub rng: &'a mut R,
}

impl<R: Rng> Resolver<'_, R> {
    /// Find the closest hit along this step's path without side effects.
    pub fn find_impact(&self, projectile: &Projectile) -> Impact {
        let Some(gov) = projectile.government else {
            // Detached explosion: always goes off where it is
            return Impact {
                fraction: 0.0,
                ..Impact::MISS
            };
        };
        let weapon = &projectile.weapon;
        let from = projectile.body.position;
        let path = projectile.body.velocity;

        if weapon.phasing
            && let Some(id) = projectile.target
            && let Some(target) = self.ships.get(id)
        {
            let mut impact = Impact::MISS;
            if target.system == self.system && target.body.is_present() && target.cloak < 1.0
                && let Some(fraction) = sweep_circle(from, path, target.body.position, target.body.radius)
            {
                impact.fraction = fraction;
                impact.ship = Some(id);
                impact.velocity = target.body.velocity;
            }
            return impact;
        }

        let mut impact = Impact::MISS;
        let accepts = |key: ShipId, other: Option<GovernmentId>| {
            projectile.target == Some(key) || is_hostile(self.politics, Some(gov), other)
        };

        if weapon.trigger_radius > 0.0
            && self
                .visible
                .circle(from, weapon.trigger_radius)
                .iter()
                .any(|e| accepts(e.key, e.government))
        {
            impact.fraction = 0.0;
        }

        if impact.fraction > 0.0
            && let Some(hit) = self
                .visible
                .line(from, path, impact.fraction, |e| accepts(e.key, e.government))
        {
            impact.fraction = hit.fraction;
            impact.ship = Some(hit.key);
            impact.velocity = hit.velocity;
        }

        if !weapon.phasing
            && let Some(hit) = self.asteroids.collide(from, path)
            && hit.fraction < impact.fraction
        {
            impact.fraction = hit.fraction;
            impact.ship = None;
            impact.asteroid = Some(hit.which);
            impact.velocity = hit.velocity;
        }
        impact
    }

    /// Resolve one projectile against the world: detonate and apply damage,
    /// or give anti-missile systems a shot at it.
    pub fn resolve(&mut self, projectile: &mut Projectile) -> Outcome {
        if !projectile.is_live() {
            return Outcome::Miss;
        }
        let impact = self.find_impact(projectile);

        if impact.is_hit() {
            let hit_position = projectile.hit_position(impact.fraction);
            projectile.explode(impact.fraction, impact.velocity, &mut self.spawns.visuals);
            let weapon = projectile.weapon.clone();
            let gov = projectile.government;

            if weapon.blast_radius > 0.0 {
                let caught: Vec<(ShipId, Option<GovernmentId>)> = self
                    .visible
                    .circle(hit_position, weapon.blast_radius)
                    .into_iter()
                    .chain(self.cloaked.circle(hit_position, weapon.blast_radius))
                    .map(|e| (e.key, e.government))
                    .collect();
                for (id, other) in caught {
                    if weapon.safe
                        && projectile.target != Some(id)
                        && !is_hostile(self.politics, gov, other)
                    {
                        continue;
                    }
                    self.damage(id, projectile);
                }
            } else if let Some(id) = impact.ship {
                self.damage(id, projectile);
            }

            if let Some(which) = impact.asteroid {
                self.asteroids
                    .damage(which, &weapon, hit_position, &mut *self.spawns, &mut *self.rng);
            }
            return Outcome::Detonated {
                fraction: impact.fraction,
                ship: impact.ship,
            };
        }

        if projectile.weapon.missile_strength > 0 {
            for &id in self.anti_missile {
                let Some(ship) = self.ships.get_mut(id) else {
                    continue;
                };
                let eligible = projectile.target == Some(id)
                    || is_hostile(self.politics, projectile.government, Some(ship.government));
                if eligible && ship.fire_anti_missile(projectile, &mut self.spawns.visuals, &mut *self.rng) {
                    projectile.kill();
                    return Outcome::Intercepted(id);
                }
            }
        }
        Outcome::Miss
    }

    fn damage(&mut self, id: ShipId, projectile: &Projectile) {
        let Some(ship) = self.ships.get_mut(id) else {
            return;
        };
        let gov = projectile.government;
        let attacker_is_enemy = gov.is_none_or(|g| self.politics.is_enemy(g, ship.government));
        if let Some(kind) = ship.take_damage(&projectile.weapon, attacker_is_enemy) {
            self.events
                .push(ShipEvent::new(gov, None, id, ship.government, kind));
        }
    }
}

/// Hand flotsam to the first eligible ship within `radius`. Returns the
/// collector and the number of units moved.
pub fn collect(
    flotsam: &mut Flotsam,
    ships: &mut ShipRegistry,
    visible: &CollisionSet<ShipId>,
    radius: f32,
) -> Option<(ShipId, u32)> {
    if flotsam.count == 0 {
        return None;
    }
    let collector = visible
        .circle(flotsam.body.position, radius)
        .into_iter()
        .map(|e| e.key)
        .find(|&id| {
            flotsam.source != Some(id)
                && ships
                    .get(id)
                    .is_some_and(|s| !s.cannot_act() && s.cargo.free() >= flotsam.unit_size)
        })?;
    let ship = ships.get_mut(collector)?;
    let amount = flotsam.transfer_to(&mut ship.cargo);
    Some((collector, amount))
}
