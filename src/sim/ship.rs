//! Ships: the only entities with intent
//!
//! A ship advances its own physics and state in [`Ship::step`]. Anything it
//! creates (explosion visuals, dumped cargo, launched fighters, projectiles)
//! goes into the step's spawn batch, never into a registry being iterated.

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::body::{Body, Collidable, SpriteId};
use super::events::EventKind;
use super::flotsam::{Flotsam, Payload};
use super::government::GovernmentId;
use super::projectile::Projectile;
use super::registry::{Expire, ShipId, Spawns};
use super::system::{StarMap, SystemId};
use super::visual::Visual;
use super::weapon::{Hardpoint, Weapon};
use crate::consts::*;
use crate::{normalize_angle, polar_to_cartesian};

/// Behavioral flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Personality {
    /// Mission target (blinks on radar)
    pub target: bool,
    /// Travels with the player
    pub escort: bool,
    /// Never hails or asks for help
    pub mute: bool,
    /// Asks for help destroying attackers rather than for rescue
    pub heroic: bool,
    /// Does not follow the player
    pub uninterested: bool,
    /// Stays in place instead of taking off with the player
    pub staying: bool,
}

/// Which kind of bay a carried craft needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BayKind {
    Fighter,
    Drone,
}

/// A bay that may hold one carried craft
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bay {
    pub kind: BayKind,
    pub ship: Option<Box<Ship>>,
}

impl Bay {
    pub fn new(kind: BayKind) -> Self {
        Self { kind, ship: None }
    }
}

/// Static capabilities of a ship's hull and outfits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Attributes {
    pub max_hull: f32,
    pub max_shields: f32,
    pub shield_regen: f32,
    pub max_energy: f32,
    pub energy_regen: f32,
    /// Heat above this is an overheat
    pub max_heat: f32,
    pub heat_dissipation: f32,
    pub fuel_capacity: f32,
    pub jump_fuel: f32,
    /// Can jump to neighbors that are not linked
    pub jump_drive: bool,
    /// Acceleration per step at full throttle
    pub thrust: f32,
    /// Radians per step at full turn
    pub turn: f32,
    pub max_velocity: f32,
    /// Cloak gained or lost per step (0 = no cloaking device)
    pub cloak_rate: f32,
    /// Cargo tons
    pub cargo_space: u32,
    pub required_crew: u32,
    /// Cargo scanner range (0 = none)
    pub cargo_scan: f32,
    /// Outfit scanner range (0 = none)
    pub outfit_scan: f32,
    pub cost: f32,
    /// Bay kind this ship needs to be carried, if it can be
    pub carried_in: Option<BayKind>,
    pub explosion_effect: Option<SpriteId>,
    /// Damage dealt around the wreck when the explosion finishes
    pub explosion_weapon: Option<Arc<Weapon>>,
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            max_hull: 100.0,
            max_shields: 0.0,
            shield_regen: 0.0,
            max_energy: 100.0,
            energy_regen: 1.0,
            max_heat: 100.0,
            heat_dissipation: 1.0,
            fuel_capacity: 300.0,
            jump_fuel: 100.0,
            jump_drive: false,
            thrust: 0.2,
            turn: 0.05,
            max_velocity: 8.0,
            cloak_rate: 0.0,
            cargo_space: 0,
            required_crew: 1,
            cargo_scan: 0.0,
            outfit_scan: 0.0,
            cost: 1.0,
            carried_in: None,
            explosion_effect: None,
            explosion_weapon: None,
        }
    }
}

/// Cargo hold contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cargo {
    pub capacity: u32,
    used: u32,
    /// Commodity name -> tons
    pub commodities: BTreeMap<String, u32>,
    /// Outfit name -> (units, tons per unit)
    pub outfits: BTreeMap<String, (u32, u32)>,
}

impl Cargo {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    /// Free tons
    pub fn free(&self) -> u32 {
        self.capacity.saturating_sub(self.used)
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    /// Add `units` of a payload, each `unit_size` tons. Caller checks space.
    pub fn add(&mut self, payload: &Payload, units: u32, unit_size: u32) {
        match payload {
            Payload::Commodity(name) => {
                *self.commodities.entry(name.clone()).or_default() += units * unit_size;
            }
            Payload::Outfit(name) => {
                let entry = self.outfits.entry(name.clone()).or_insert((0, unit_size));
                entry.0 += units;
            }
        }
        self.used += units * unit_size;
    }

    /// Move as much as fits from `self` into `other`. Returns tons moved.
    pub fn transfer_all(&mut self, other: &mut Cargo) -> u32 {
        let mut moved = 0;
        let commodities = std::mem::take(&mut self.commodities);
        for (name, tons) in commodities {
            let amount = tons.min(other.free());
            if amount > 0 {
                other.add(&Payload::Commodity(name.clone()), amount, 1);
                moved += amount;
            }
            if tons > amount {
                self.commodities.insert(name, tons - amount);
            }
        }
        let outfits = std::mem::take(&mut self.outfits);
        for (name, (units, size)) in outfits {
            let amount = units.min(other.free() / size.max(1));
            if amount > 0 {
                other.add(&Payload::Outfit(name.clone()), amount, size);
                moved += amount * size;
            }
            if units > amount {
                self.outfits.insert(name, (units - amount, size));
            }
        }
        self.used = self.used.saturating_sub(moved);
        moved
    }

    /// Empty the hold into flotsam
    pub fn dump(&mut self) -> Vec<(Payload, u32, u32)> {
        let mut out: Vec<(Payload, u32, u32)> = std::mem::take(&mut self.commodities)
            .into_iter()
            .map(|(name, tons)| (Payload::Commodity(name), tons, 1))
            .collect();
        out.extend(
            std::mem::take(&mut self.outfits)
                .into_iter()
                .map(|(name, (units, size))| (Payload::Outfit(name), units, size)),
        );
        self.used = 0;
        out
    }
}

/// Intent for one step, produced by the pilot (or the player's keys)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Command {
    /// -1..1 (reverse..full ahead)
    pub thrust: f32,
    /// -1..1 (clockwise..counter-clockwise)
    pub turn: f32,
    pub fire: bool,
    pub launch: bool,
    pub board: bool,
    pub jump: bool,
    pub land: bool,
    pub cloak: bool,
    pub scan: bool,
    pub self_destruct: bool,
    /// Change the ship's target
    pub target: Option<ShipId>,
    /// Change the hyperspace destination
    pub target_system: Option<SystemId>,
    /// Change the planet to land on (index within the current system)
    pub target_planet: Option<usize>,
}

impl Command {
    /// Combine with another command: flags OR, nonzero axes and targets override
    pub fn merge(&mut self, other: &Command) {
        if other.thrust != 0.0 {
            self.thrust = other.thrust;
        }
        if other.turn != 0.0 {
            self.turn = other.turn;
        }
        self.fire |= other.fire;
        self.launch |= other.launch;
        self.board |= other.board;
        self.jump |= other.jump;
        self.land |= other.land;
        self.cloak |= other.cloak;
        self.scan |= other.scan;
        self.self_destruct |= other.self_destruct;
        if other.target.is_some() {
            self.target = other.target;
        }
        if other.target_system.is_some() {
            self.target_system = other.target_system;
        }
        if other.target_planet.is_some() {
            self.target_planet = other.target_planet;
        }
    }
}

/// Hyperspace travel state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hyperspace {
    #[default]
    None,
    /// Leaving the current system; `count` counts up to HYPERSPACE_STEPS
    Departing { to: SystemId, count: u32 },
    /// Arriving; `count` counts down to 0
    Arriving { count: u32 },
}

/// Progress of cargo and outfit scans against one target
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScanProgress {
    pub target: Option<ShipId>,
    pub cargo: u32,
    pub outfits: u32,
}

/// Scans that completed this step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub cargo: bool,
    pub outfits: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Ship {
    pub body: Body,
    pub name: String,
    pub model: String,
    pub government: GovernmentId,
    pub personality: Personality,
    pub attributes: Attributes,

    pub crew: u32,
    pub hull: f32,
    pub shields: f32,
    pub energy: f32,
    pub heat: f32,
    pub fuel: f32,
    /// 0 = visible, 1 = fully cloaked
    pub cloak: f32,
    pub cargo: Cargo,

    pub weapons: Vec<Hardpoint>,
    pub bays: Vec<Bay>,

    // Weak links, resolved through the registry
    pub parent: Option<ShipId>,
    pub target: Option<ShipId>,
    pub target_system: Option<SystemId>,
    pub target_planet: Option<usize>,

    /// System the ship is in
    pub system: Option<SystemId>,
    /// Belongs to the player's fleet
    pub is_yours: bool,

    #[serde(skip)]
    pub commands: Command,
    pub hyperspace: Hyperspace,
    /// Planet being landed on
    pub landing: Option<usize>,
    /// Planet landed on
    pub landed_on: Option<usize>,
    /// Steps spent exploding, once destroyed
    pub explosion: Option<u32>,
    #[serde(skip)]
    removed: bool,
    pub scan: ScanProgress,
}

impl Default for Ship {
    fn default() -> Self {
        Self::new("", "", GovernmentId(0), Attributes::default())
    }
}

impl Ship {
    /// A fully repaired ship of the given model
    pub fn new(name: &str, model: &str, government: GovernmentId, attributes: Attributes) -> Self {
        Self {
            body: Body {
                radius: 20.0,
                ..Default::default()
            },
            name: name.to_string(),
            model: model.to_string(),
            government,
            personality: Personality::default(),
            crew: attributes.required_crew,
            hull: attributes.max_hull,
            shields: attributes.max_shields,
            energy: attributes.max_energy,
            heat: 0.0,
            fuel: attributes.fuel_capacity,
            cloak: 0.0,
            cargo: Cargo::new(attributes.cargo_space),
            attributes,
            weapons: Vec::new(),
            bays: Vec::new(),
            parent: None,
            target: None,
            target_system: None,
            target_planet: None,
            system: None,
            is_yours: false,
            commands: Command::default(),
            hyperspace: Hyperspace::None,
            landing: None,
            landed_on: None,
            explosion: None,
            removed: false,
            scan: ScanProgress::default(),
        }
    }

    /// Restore hull, shields, energy, fuel and crew
    pub fn recharge(&mut self) {
        self.hull = self.attributes.max_hull;
        self.shields = self.attributes.max_shields;
        self.energy = self.attributes.max_energy;
        self.fuel = self.attributes.fuel_capacity;
        self.heat = 0.0;
        self.crew = self.crew.max(self.attributes.required_crew);
    }

    /// Put the ship somewhere, resetting transient travel state
    pub fn place(&mut self, position: Vec2, velocity: Vec2, facing: f32) {
        self.body.position = position;
        self.body.velocity = velocity;
        self.body.facing = normalize_angle(facing);
        self.hyperspace = Hyperspace::None;
        self.landing = None;
        self.landed_on = None;
    }

    // === State predicates ===

    pub fn is_destroyed(&self) -> bool {
        self.hull < 0.0 || self.explosion.is_some()
    }

    pub fn is_disabled(&self) -> bool {
        self.is_destroyed()
            || self.hull < self.attributes.max_hull * DISABLED_HULL_FRACTION
            || (self.crew == 0 && self.attributes.required_crew > 0)
    }

    pub fn is_overheated(&self) -> bool {
        self.heat > self.attributes.max_heat
    }

    pub fn is_hyperspacing(&self) -> bool {
        self.hyperspace != Hyperspace::None
    }

    pub fn is_entering_hyperspace(&self) -> bool {
        matches!(self.hyperspace, Hyperspace::Departing { .. })
    }

    pub fn is_landed(&self) -> bool {
        self.landed_on.is_some()
    }

    /// Disabled, overheated, or not fully in space
    pub fn cannot_act(&self) -> bool {
        self.is_disabled()
            || self.is_overheated()
            || !self.body.is_present()
            || self.is_hyperspacing()
            || self.landing.is_some()
            || self.is_landed()
    }

    /// Can be selected, scanned or homed in on
    pub fn is_targetable(&self) -> bool {
        self.body.is_present()
            && !self.is_destroyed()
            && self.cloak < 1.0
            && !self.is_hyperspacing()
            && !self.is_landed()
    }

    /// Value used to weigh fleets against each other
    pub fn strength(&self) -> f32 {
        (self.shields + self.hull.max(0.0)) * self.attributes.cost
    }

    pub fn bays_free(&self, kind: BayKind) -> usize {
        self.bays
            .iter()
            .filter(|bay| bay.kind == kind && bay.ship.is_none())
            .count()
    }

    /// Remove this ship at the next prune
    pub fn mark_removed(&mut self) {
        self.removed = true;
    }

    // === Per-step behavior ===

    /// Advance one step of physics and state.
    pub fn step<R: Rng>(&mut self, id: ShipId, map: &StarMap, spawns: &mut Spawns, rng: &mut R) {
        if self.removed {
            return;
        }

        if self.commands.self_destruct && !self.is_destroyed() {
            self.hull = -1.0;
        }
        if self.is_destroyed() {
            self.step_explosion(id, spawns, rng);
            return;
        }

        self.regenerate();

        match self.hyperspace {
            Hyperspace::Departing { to, count } => {
                self.step_departure(to, count + 1, map);
                return;
            }
            Hyperspace::Arriving { count } => {
                let count = count.saturating_sub(1);
                self.body.zoom = 1.0 - count as f32 / HYPERSPACE_STEPS as f32;
                self.body.velocity *= 0.98;
                self.body.position += self.body.velocity;
                self.hyperspace = if count == 0 {
                    Hyperspace::None
                } else {
                    Hyperspace::Arriving { count }
                };
                return;
            }
            Hyperspace::None => {}
        }

        if let Some(planet) = self.landing {
            self.body.zoom = (self.body.zoom - ZOOM_RATE).max(0.0);
            self.body.velocity *= 0.9;
            self.body.position += self.body.velocity;
            if self.body.zoom <= 0.0 {
                self.landing = None;
                self.landed_on = Some(planet);
                self.body.velocity = Vec2::ZERO;
            }
            return;
        }
        if self.landed_on.is_some() {
            if self.commands.thrust > 0.0 && !self.commands.land {
                // Take off
                self.landed_on = None;
            } else {
                return;
            }
        }

        if self.body.zoom < 1.0 {
            self.body.zoom = (self.body.zoom + ZOOM_RATE).min(1.0);
        }

        if self.is_disabled() {
            self.body.velocity *= DRIFT_DRAG;
            self.body.position += self.body.velocity;
            return;
        }

        self.apply_targets();
        if self.try_begin_jump(map) || self.try_begin_landing(map) {
            return;
        }

        let turn = self.commands.turn.clamp(-1.0, 1.0) * self.attributes.turn;
        self.body.turn(turn);
        let thrust = self.commands.thrust.clamp(-1.0, 1.0) * self.attributes.thrust;
        self.body.velocity += self.body.unit() * thrust;
        let max = self.attributes.max_velocity;
        if self.body.velocity.length() > max {
            self.body.velocity = self.body.velocity.normalize_or_zero() * max;
        }
        self.body.position += self.body.velocity;
    }

    fn regenerate(&mut self) {
        let a = &self.attributes;
        self.shields = (self.shields + a.shield_regen).min(a.max_shields);
        self.energy = (self.energy + a.energy_regen).min(a.max_energy);
        self.heat = (self.heat - a.heat_dissipation).max(0.0);

        if a.cloak_rate > 0.0 && self.commands.cloak && !self.is_disabled() {
            self.cloak = (self.cloak + a.cloak_rate).min(1.0);
        } else {
            self.cloak = (self.cloak - a.cloak_rate.max(0.05)).max(0.0);
        }
    }

    fn apply_targets(&mut self) {
        if let Some(target) = self.commands.target {
            self.target = Some(target);
        }
        if let Some(system) = self.commands.target_system {
            self.target_system = Some(system);
        }
        if let Some(planet) = self.commands.target_planet {
            self.target_planet = Some(planet);
        }
    }

    fn try_begin_jump(&mut self, map: &StarMap) -> bool {
        if !self.commands.jump || !self.body.is_present() {
            return false;
        }
        let (Some(from), Some(to)) = (self.system, self.target_system) else {
            return false;
        };
        if !map.can_travel(from, to, self.attributes.jump_drive)
            || self.fuel < self.attributes.jump_fuel
        {
            return false;
        }
        self.fuel -= self.attributes.jump_fuel;
        self.hyperspace = Hyperspace::Departing { to, count: 0 };
        true
    }

    fn try_begin_landing(&mut self, map: &StarMap) -> bool {
        if !self.commands.land {
            return false;
        }
        let Some(index) = self.target_planet else {
            return false;
        };
        let planet = self
            .system
            .and_then(|id| map.system(id))
            .and_then(|system| system.planets.get(index));
        match planet {
            Some(planet) if planet.position.distance(self.body.position) < planet.radius => {
                self.landing = Some(index);
                true
            }
            _ => false,
        }
    }

    fn step_departure(&mut self, to: SystemId, count: u32, map: &StarMap) {
        self.body.zoom = 1.0 - (count as f32 / HYPERSPACE_STEPS as f32).min(1.0);
        self.body.velocity += self.body.unit() * self.attributes.thrust * 2.0;
        self.body.position += self.body.velocity;
        if count < HYPERSPACE_STEPS {
            self.hyperspace = Hyperspace::Departing { to, count };
            return;
        }

        // Arrive from the direction of the system we left
        let direction = match (self.system.and_then(|s| map.system(s)), map.system(to)) {
            (Some(from), Some(dest)) => (dest.position - from.position).normalize_or_zero(),
            _ => self.body.unit(),
        };
        let direction = if direction == Vec2::ZERO {
            self.body.unit()
        } else {
            direction
        };
        self.system = Some(to);
        self.body.position = -direction * HYPERSPACE_ARRIVAL_DISTANCE;
        self.body.velocity = direction * self.attributes.max_velocity;
        self.body.facing = direction.y.atan2(direction.x);
        self.body.zoom = 0.0;
        self.hyperspace = Hyperspace::Arriving {
            count: HYPERSPACE_STEPS,
        };
        self.target_system = None;
    }

    fn step_explosion<R: Rng>(&mut self, id: ShipId, spawns: &mut Spawns, rng: &mut R) {
        let count = self.explosion.map_or(0, |c| c + 1);
        self.explosion = Some(count);
        self.body.position += self.body.velocity;

        let effect = self.attributes.explosion_effect;
        if let Some(effect) = effect
            && count % 4 == 0
        {
            let offset = polar_to_cartesian(
                rng.random::<f32>() * self.body.radius,
                rng.random::<f32>() * std::f32::consts::TAU,
            );
            spawns.visuals.push(Visual::new(
                effect,
                self.body.position + offset,
                self.body.velocity,
                30,
            ));
        }
        if count < EXPLOSION_STEPS {
            return;
        }

        if let Some(effect) = effect {
            for _ in 0..4 {
                let velocity =
                    polar_to_cartesian(rng.random::<f32>() * 2.0, rng.random::<f32>() * std::f32::consts::TAU);
                spawns.visuals.push(Visual::new(
                    effect,
                    self.body.position,
                    self.body.velocity + velocity,
                    45,
                ));
            }
        }
        for (payload, count, unit_size) in self.cargo.dump() {
            let scatter =
                polar_to_cartesian(rng.random::<f32>() * 1.5, rng.random::<f32>() * std::f32::consts::TAU);
            spawns.flotsam.push(
                Flotsam::new(payload, count, self.body.position, self.body.velocity + scatter)
                    .with_unit_size(unit_size)
                    .with_source(id),
            );
        }
        if let Some(weapon) = self.attributes.explosion_weapon.clone() {
            spawns.projectiles.push(Projectile::explosion(
                weapon,
                self.body.position,
                self.body.velocity,
            ));
        }
        self.removed = true;
    }

    /// Launch every carried craft if commanded. Launched craft start
    /// unmaterialized at the carrier's position.
    pub fn launch(&mut self, id: ShipId, out: &mut Vec<Ship>) {
        if !self.commands.launch || self.cannot_act() {
            return;
        }
        for bay in &mut self.bays {
            if let Some(mut craft) = bay.ship.take() {
                craft.place(self.body.position, self.body.velocity, self.body.facing);
                craft.body.zoom = 0.0;
                craft.parent = Some(id);
                craft.system = self.system;
                craft.government = self.government;
                craft.is_yours = self.is_yours;
                out.push(*craft);
            }
        }
    }

    /// Dock a craft in a free bay of the right kind. Hands it back if none fits.
    pub fn carry(&mut self, craft: Ship) -> Option<Ship> {
        let Some(kind) = craft.attributes.carried_in else {
            return Some(craft);
        };
        match self
            .bays
            .iter_mut()
            .find(|bay| bay.kind == kind && bay.ship.is_none())
        {
            Some(bay) => {
                bay.ship = Some(Box::new(craft));
                None
            }
            None => Some(craft),
        }
    }

    /// Fire every ready weapon if commanded.
    ///
    /// Returns true if at least one anti-missile system is ready this step.
    pub fn fire(&mut self, id: ShipId, projectiles: &mut Vec<Projectile>) -> bool {
        let can_fire = !self.cannot_act() && self.cloak <= 0.0;
        let mut has_anti_missile = false;
        let rotation = Vec2::from_angle(self.body.facing);

        for hardpoint in &mut self.weapons {
            hardpoint.step();
            if !can_fire || !hardpoint.is_ready() {
                continue;
            }
            let weapon = &hardpoint.weapon;
            if weapon.is_anti_missile() {
                has_anti_missile = true;
                continue;
            }
            if !self.commands.fire
                || self.energy < weapon.firing_energy
                || self.heat > self.attributes.max_heat
            {
                continue;
            }

            self.energy -= weapon.firing_energy;
            self.heat += weapon.firing_heat;
            projectiles.push(Projectile::fire(
                weapon.clone(),
                self.government,
                id,
                self.target,
                self.body.position + rotation.rotate(hardpoint.offset),
                self.body.velocity,
                self.body.facing + hardpoint.angle,
            ));
            hardpoint.discharge();
        }
        has_anti_missile
    }

    /// Try to shoot down a missile. Returns true on a kill.
    pub fn fire_anti_missile<R: Rng>(
        &mut self,
        projectile: &Projectile,
        visuals: &mut Vec<Visual>,
        rng: &mut R,
    ) -> bool {
        let strength = projectile.weapon.missile_strength;
        if strength == 0 || self.cannot_act() {
            return false;
        }
        for hardpoint in &mut self.weapons {
            let weapon = hardpoint.weapon.clone();
            if !weapon.is_anti_missile() || !hardpoint.is_ready() {
                continue;
            }
            if projectile.body.position.distance(self.body.position) > weapon.velocity
                || self.energy < weapon.firing_energy
            {
                continue;
            }

            self.energy -= weapon.firing_energy;
            self.heat += weapon.firing_heat;
            hardpoint.discharge();
            if let Some(effect) = weapon.hit_effect {
                visuals.push(Visual::new(
                    effect,
                    projectile.body.position,
                    projectile.body.velocity,
                    weapon.effect_lifetime,
                ));
            }
            if rng.random_range(0..weapon.anti_missile) > rng.random_range(0..strength) {
                return true;
            }
        }
        false
    }

    /// Apply a weapon's damage. Returns the state transition it caused, if
    /// any: destroyed, disabled, or (for a non-enemy attacker) provoked.
    pub fn take_damage(&mut self, weapon: &Weapon, attacker_is_enemy: bool) -> Option<EventKind> {
        let was_disabled = self.is_disabled();
        let was_destroyed = self.is_destroyed();

        let mut hull_fraction = 1.0;
        if self.shields > 0.0 && weapon.shield_damage > 0.0 {
            self.shields -= weapon.shield_damage;
            if self.shields < 0.0 {
                hull_fraction = -self.shields / weapon.shield_damage;
                self.shields = 0.0;
            } else {
                hull_fraction = 0.0;
            }
        }
        self.hull -= weapon.hull_damage * hull_fraction;
        self.heat += weapon.heat_damage;

        if !was_destroyed && self.is_destroyed() {
            Some(EventKind::Destroy)
        } else if !was_disabled && self.is_disabled() {
            Some(EventKind::Disable)
        } else if !attacker_is_enemy {
            Some(EventKind::Provoke)
        } else {
            None
        }
    }

    /// Advance scans against the current target. `target` is the target's id,
    /// position and whether it can be scanned.
    pub fn step_scan(&mut self, target: Option<(ShipId, Vec2, bool)>) -> ScanResult {
        let mut result = ScanResult::default();
        let Some((id, position, scannable)) = target else {
            self.scan = ScanProgress::default();
            return result;
        };
        if self.scan.target != Some(id) {
            self.scan = ScanProgress {
                target: Some(id),
                ..Default::default()
            };
        }
        if !self.commands.scan || !scannable || self.cannot_act() {
            return result;
        }

        let distance = position.distance(self.body.position);
        if self.attributes.cargo_scan > 0.0
            && distance <= self.attributes.cargo_scan
            && self.scan.cargo < SCAN_STEPS
        {
            self.scan.cargo += 1;
            result.cargo = self.scan.cargo == SCAN_STEPS;
        }
        if self.attributes.outfit_scan > 0.0
            && distance <= self.attributes.outfit_scan
            && self.scan.outfits < SCAN_STEPS
        {
            self.scan.outfits += 1;
            result.outfits = self.scan.outfits == SCAN_STEPS;
        }
        result
    }

    /// Bring a disabled friendly ship back to a flyable state
    pub fn assist(&mut self) {
        let floor = self.attributes.max_hull * DISABLED_HULL_FRACTION * 1.5;
        self.hull = self.hull.max(floor).min(self.attributes.max_hull);
        self.crew = self.crew.max(self.attributes.required_crew.min(1));
        self.energy = self.energy.max(self.attributes.max_energy * 0.1);
        self.fuel = self.fuel.max(self.attributes.jump_fuel.min(self.attributes.fuel_capacity));
    }
}

impl Collidable for Ship {
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
        Some(self.government)
    }
}

impl Expire for Ship {
    fn should_be_removed(&self) -> bool {
        self.removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::registry::ShipRegistry;
    use crate::sim::system::StarSystem;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn ids() -> (ShipRegistry, ShipId) {
        let mut registry = ShipRegistry::new();
        let id = registry.insert(Ship::default());
        (registry, id)
    }

    fn gun() -> Arc<Weapon> {
        Arc::new(Weapon {
            velocity: 10.0,
            reload: 5,
            hull_damage: 30.0,
            shield_damage: 30.0,
            firing_energy: 5.0,
            ..Default::default()
        })
    }

    #[test]
    fn test_thrust_and_speed_limit() {
        let (_, id) = ids();
        let map = StarMap::default();
        let mut rng = Pcg32::seed_from_u64(1);
        let mut spawns = Spawns::default();

        let mut ship = Ship::default();
        ship.commands.thrust = 1.0;
        for _ in 0..200 {
            ship.step(id, &map, &mut spawns, &mut rng);
        }
        assert!((ship.body.velocity.length() - ship.attributes.max_velocity).abs() < 1e-3);
        assert!(ship.body.position.x > 0.0);
    }

    #[test]
    fn test_fire_spawns_projectile_and_costs_energy() {
        let (_, id) = ids();
        let mut ship = Ship::default();
        ship.weapons.push(Hardpoint::new(gun()));
        ship.commands.fire = true;

        let mut projectiles = Vec::new();
        assert!(!ship.fire(id, &mut projectiles));
        assert_eq!(projectiles.len(), 1);
        assert_eq!(ship.energy, 95.0);

        // Reloading
        ship.fire(id, &mut projectiles);
        assert_eq!(projectiles.len(), 1);
    }

    #[test]
    fn test_anti_missile_readiness_reported() {
        let (_, id) = ids();
        let mut ship = Ship::default();
        ship.weapons.push(Hardpoint::new(Arc::new(Weapon {
            anti_missile: 10,
            velocity: 100.0,
            ..Default::default()
        })));
        let mut projectiles = Vec::new();
        assert!(ship.fire(id, &mut projectiles));
        assert!(projectiles.is_empty());
    }

    #[test]
    fn test_cloaked_ship_cannot_fire() {
        let (_, id) = ids();
        let mut ship = Ship::default();
        ship.weapons.push(Hardpoint::new(gun()));
        ship.commands.fire = true;
        ship.cloak = 0.5;
        let mut projectiles = Vec::new();
        ship.fire(id, &mut projectiles);
        assert!(projectiles.is_empty());
    }

    #[test]
    fn test_shields_absorb_before_hull() {
        let mut ship = Ship::new("A", "Test", GovernmentId(1), Attributes {
            max_shields: 40.0,
            ..Default::default()
        });
        assert_eq!(ship.take_damage(&gun(), true), None);
        assert_eq!(ship.hull, 100.0);
        assert_eq!(ship.shields, 10.0);

        // 10 of 30 absorbed: two thirds of hull damage goes through
        ship.take_damage(&gun(), true);
        assert_eq!(ship.shields, 0.0);
        assert!((ship.hull - 80.0).abs() < 1e-4);
    }

    #[test]
    fn test_damage_transitions() {
        let mut ship = Ship::default();
        let heavy = Weapon {
            hull_damage: 90.0,
            ..Default::default()
        };
        assert_eq!(ship.take_damage(&heavy, true), Some(EventKind::Disable));
        assert_eq!(ship.take_damage(&heavy, true), Some(EventKind::Destroy));
        // Already destroyed: nothing new from an enemy
        assert_eq!(ship.take_damage(&heavy, true), None);

        let mut friend = Ship::default();
        let light = Weapon {
            hull_damage: 1.0,
            ..Default::default()
        };
        assert_eq!(friend.take_damage(&light, false), Some(EventKind::Provoke));
    }

    #[test]
    fn test_explosion_finishes_and_dumps_cargo() {
        let (_, id) = ids();
        let map = StarMap::default();
        let mut rng = Pcg32::seed_from_u64(3);
        let mut spawns = Spawns::default();

        let mut ship = Ship::new("A", "Hauler", GovernmentId(1), Attributes {
            cargo_space: 10,
            explosion_weapon: Some(gun()),
            ..Default::default()
        });
        ship.cargo.add(&Payload::Commodity("Food".into()), 4, 1);
        ship.hull = -1.0;

        for _ in 0..EXPLOSION_STEPS {
            ship.step(id, &map, &mut spawns, &mut rng);
            assert!(!ship.should_be_removed());
        }
        ship.step(id, &map, &mut spawns, &mut rng);
        assert!(ship.should_be_removed());
        assert_eq!(spawns.flotsam.len(), 1);
        assert_eq!(spawns.flotsam[0].count, 4);
        assert_eq!(spawns.flotsam[0].source, Some(id));
        assert_eq!(spawns.projectiles.len(), 1);
        assert!(spawns.projectiles[0].government.is_none());
    }

    #[test]
    fn test_launch_moves_fighters_out_of_bays() {
        let (_, id) = ids();
        let mut carrier = Ship::default();
        carrier.bays.push(Bay::new(BayKind::Fighter));
        carrier.body.position = Vec2::new(50.0, 60.0);
        let fighter = Ship::new("F", "Fighter", GovernmentId(0), Attributes {
            carried_in: Some(BayKind::Fighter),
            ..Default::default()
        });
        assert!(carrier.carry(fighter).is_none());
        assert_eq!(carrier.bays_free(BayKind::Fighter), 0);

        carrier.commands.launch = true;
        let mut out = Vec::new();
        carrier.launch(id, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].parent, Some(id));
        assert_eq!(out[0].body.position, Vec2::new(50.0, 60.0));
        assert_eq!(out[0].body.zoom, 0.0);
        assert_eq!(carrier.bays_free(BayKind::Fighter), 1);
    }

    #[test]
    fn test_carry_rejects_wrong_bay() {
        let mut carrier = Ship::default();
        carrier.bays.push(Bay::new(BayKind::Drone));
        let fighter = Ship::new("F", "Fighter", GovernmentId(0), Attributes {
            carried_in: Some(BayKind::Fighter),
            ..Default::default()
        });
        assert!(carrier.carry(fighter).is_some());
    }

    #[test]
    fn test_hyperspace_jump_changes_system() {
        let (_, id) = ids();
        let mut map = StarMap::default();
        let a = map.add(StarSystem::new("A", Vec2::ZERO));
        let b = map.add(StarSystem::new("B", Vec2::new(100.0, 0.0)));
        map.link(a, b);
        let mut rng = Pcg32::seed_from_u64(5);
        let mut spawns = Spawns::default();

        let mut ship = Ship::default();
        ship.system = Some(a);
        ship.commands = Command {
            jump: true,
            target_system: Some(b),
            ..Default::default()
        };
        ship.step(id, &map, &mut spawns, &mut rng);
        assert!(ship.is_entering_hyperspace());
        assert_eq!(ship.fuel, 200.0);

        ship.commands = Command::default();
        for _ in 0..HYPERSPACE_STEPS {
            ship.step(id, &map, &mut spawns, &mut rng);
        }
        assert_eq!(ship.system, Some(b));
        assert_eq!(ship.body.zoom, 0.0);
        for _ in 0..HYPERSPACE_STEPS {
            ship.step(id, &map, &mut spawns, &mut rng);
        }
        assert!(!ship.is_hyperspacing());
        assert_eq!(ship.body.zoom, 1.0);
        // Arrived from the west, heading east
        assert!(ship.body.position.x < 0.0);
    }

    #[test]
    fn test_scan_completes_once() {
        let (mut registry, _) = ids();
        let target = registry.insert(Ship::default());
        let mut ship = Ship::new("S", "Scout", GovernmentId(0), Attributes {
            cargo_scan: 100.0,
            ..Default::default()
        });
        ship.commands.scan = true;

        let mut completions = 0;
        for _ in 0..SCAN_STEPS * 2 {
            if ship.step_scan(Some((target, Vec2::new(50.0, 0.0), true))).cargo {
                completions += 1;
            }
        }
        assert_eq!(completions, 1);
    }

    #[test]
    fn test_cargo_transfer_all_respects_space() {
        let mut from = Cargo::new(20);
        from.add(&Payload::Commodity("Food".into()), 8, 1);
        from.add(&Payload::Outfit("Laser".into()), 2, 3);
        let mut to = Cargo::new(10);

        let moved = from.transfer_all(&mut to);
        assert_eq!(moved, 8);
        assert_eq!(to.free(), 2);
        assert_eq!(from.used(), 6);
    }
}
