//! Asteroid field: drifting rocks and mineable asteroids
//!
//! The field tiles space with period [`ASTEROID_WRAP`]; rocks that drift off
//! one edge reappear on the other. Mineable asteroids can be shot apart,
//! dropping their payload as flotsam.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::body::{Body, Collidable};
use super::flotsam::{Flotsam, Payload};
use super::government::GovernmentId;
use super::registry::{Expire, Spawns, prune};
use super::spatial::{CollisionSet, LineHit};
use super::system::AsteroidSpec;
use super::visual::Visual;
use super::weapon::Weapon;
use crate::consts::ASTEROID_WRAP;
use crate::polar_to_cartesian;

const ASTEROID_RADIUS: f32 = 16.0;
const MINABLE_RADIUS: f32 = 24.0;
const GRID_CELLS: usize = 16;

/// Which asteroid a query hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsteroidRef {
    Rock(usize),
    Minable(usize),
}

/// Closest asteroid on a swept path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AsteroidHit {
    pub which: AsteroidRef,
    pub fraction: f32,
    pub velocity: Vec2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asteroid {
    pub body: Body,
    /// Radians per step
    pub spin: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Minable {
    pub body: Body,
    pub spin: f32,
    pub hull: f32,
    pub payload: String,
    /// Tons dropped when broken
    pub yield_count: u32,
    broken: bool,
}

impl Minable {
    pub fn is_broken(&self) -> bool {
        self.broken
    }
}

impl Expire for Minable {
    fn should_be_removed(&self) -> bool {
        self.broken
    }
}

impl Collidable for Asteroid {
    fn position(&self) -> Vec2 {
        self.body.position
    }
    fn velocity(&self) -> Vec2 {
        self.body.velocity
    }
    fn facing(&self) -> f32 {
        self.body.facing
    }
    fn radius(&self) -> f32 {
        self.body.radius
    }
    fn government(&self) -> Option<GovernmentId> {
        None
    }
}

impl Collidable for Minable {
    fn position(&self) -> Vec2 {
        self.body.position
    }
    fn velocity(&self) -> Vec2 {
        self.body.velocity
    }
    fn facing(&self) -> f32 {
        self.body.facing
    }
    fn radius(&self) -> f32 {
        self.body.radius
    }
    fn government(&self) -> Option<GovernmentId> {
        None
    }
}

/// Map a coordinate into the field's tile, [-WRAP/2, WRAP/2)
fn wrap(v: Vec2) -> Vec2 {
    let half = ASTEROID_WRAP * 0.5;
    Vec2::new(
        (v.x + half).rem_euclid(ASTEROID_WRAP) - half,
        (v.y + half).rem_euclid(ASTEROID_WRAP) - half,
    )
}

#[derive(Debug, Clone)]
pub struct AsteroidField {
    pub rocks: Vec<Asteroid>,
    pub minables: Vec<Minable>,
    set: CollisionSet<AsteroidRef>,
}

impl Default for AsteroidField {
    fn default() -> Self {
        Self {
            rocks: Vec::new(),
            minables: Vec::new(),
            set: CollisionSet::new(ASTEROID_WRAP / GRID_CELLS as f32, GRID_CELLS),
        }
    }
}

impl AsteroidField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.rocks.clear();
        self.minables.clear();
        self.set.clear(0);
    }

    /// Scatter one belt's asteroids across the tile
    pub fn add<R: Rng>(&mut self, spec: &AsteroidSpec, rng: &mut R) {
        for _ in 0..spec.count {
            let position = Vec2::new(
                rng.random_range(-0.5..0.5) * ASTEROID_WRAP,
                rng.random_range(-0.5..0.5) * ASTEROID_WRAP,
            );
            let angle = rng.random::<f32>() * std::f32::consts::TAU;
            let speed = spec.energy * (0.5 + rng.random::<f32>());
            let spin = (rng.random::<f32>() - 0.5) * 0.05;

            match &spec.payload {
                Some(payload) => {
                    let mut body =
                        Body::new(position, polar_to_cartesian(speed, angle), angle, MINABLE_RADIUS);
                    body.sprite = spec.sprite;
                    self.minables.push(Minable {
                        body,
                        spin,
                        hull: spec.hull.max(1.0),
                        payload: payload.clone(),
                        yield_count: rng.random_range(2..6),
                        broken: false,
                    });
                }
                None => {
                    let mut body =
                        Body::new(position, polar_to_cartesian(speed, angle), angle, ASTEROID_RADIUS);
                    body.sprite = spec.sprite;
                    self.rocks.push(Asteroid { body, spin });
                }
            }
        }
    }

    /// Move every asteroid one step and rebuild the collision set
    pub fn step(&mut self, step: u64) {
        prune(&mut self.minables);
        for rock in &mut self.rocks {
            rock.body.position = wrap(rock.body.position + rock.body.velocity);
            rock.body.turn(rock.spin);
        }
        for minable in &mut self.minables {
            minable.body.position = wrap(minable.body.position + minable.body.velocity);
            minable.body.turn(minable.spin);
        }

        self.set.clear(step);
        for (i, rock) in self.rocks.iter().enumerate() {
            self.set.add(AsteroidRef::Rock(i), rock);
        }
        for (i, minable) in self.minables.iter().enumerate() {
            self.set.add(AsteroidRef::Minable(i), minable);
        }
        self.set.finish();
    }

    /// Closest asteroid hit along `from -> from + path`, if any. A path
    /// crossing the tile seam is also tested against the neighbouring copies
    /// of the field.
    pub fn collide(&self, from: Vec2, path: Vec2) -> Option<AsteroidHit> {
        let start = wrap(from);
        let end = start + path;
        let reach = Vec2::splat(MINABLE_RADIUS.max(ASTEROID_RADIUS));
        let (lo, hi) = (start.min(end) - reach, start.max(end) + reach);
        let half = ASTEROID_WRAP * 0.5;
        let solid = |key: AsteroidRef| match key {
            AsteroidRef::Rock(_) => true,
            AsteroidRef::Minable(i) => self.minables.get(i).is_some_and(|m| !m.is_broken()),
        };

        // The unshifted tile goes first so it wins ties
        let mut best: Option<LineHit<AsteroidRef>> = None;
        for dy in [0.0, -1.0, 1.0] {
            for dx in [0.0, -1.0, 1.0] {
                let shift = Vec2::new(dx, dy) * ASTEROID_WRAP;
                let (lo, hi) = (lo + shift, hi + shift);
                if hi.x < -half || lo.x >= half || hi.y < -half || lo.y >= half {
                    continue;
                }
                let limit = best.map_or(1.0, |b| b.fraction);
                if let Some(hit) = self.set.line(start + shift, path, limit, |e| solid(e.key)) {
                    best = Some(hit);
                }
            }
        }
        best.map(|hit| AsteroidHit {
            which: hit.key,
            fraction: hit.fraction,
            velocity: hit.velocity,
        })
    }

    /// Apply weapon damage. Plain rocks are indestructible; a mineable
    /// asteroid that breaks drops its payload.
    pub fn damage<R: Rng>(
        &mut self,
        which: AsteroidRef,
        weapon: &Weapon,
        at: Vec2,
        spawns: &mut Spawns,
        rng: &mut R,
    ) {
        let AsteroidRef::Minable(i) = which else {
            return;
        };
        let Some(minable) = self.minables.get_mut(i) else {
            return;
        };
        if minable.broken {
            return;
        }
        minable.hull -= weapon.hull_damage;
        if minable.hull > 0.0 {
            return;
        }

        minable.broken = true;
        let velocity = minable.body.velocity;
        for _ in 0..minable.yield_count {
            let scatter = polar_to_cartesian(
                rng.random::<f32>() * 2.0,
                rng.random::<f32>() * std::f32::consts::TAU,
            );
            spawns.flotsam.push(Flotsam::new(
                Payload::Commodity(minable.payload.clone()),
                1,
                at,
                velocity + scatter,
            ));
        }
        let effect = weapon.die_effect.or(weapon.hit_effect).unwrap_or_default();
        spawns.visuals.push(Visual::new(effect, at, velocity, 30));
        log::debug!("asteroid broken, {} {} dropped", minable.yield_count, minable.payload);
    }

    pub fn len(&self) -> usize {
        self.rocks.len() + self.minables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rocks.is_empty() && self.minables.is_empty()
    }
}
