//! World state
//!
//! Everything one step reads and writes: the registries, the per-step
//! collision sets, the player's view of the world and the narrative
//! bookkeeping. Owned by the worker thread while the engine runs.

use std::collections::BTreeMap;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::asteroid::AsteroidField;
use super::events::EventQueue;
use super::flotsam::Flotsam;
use super::frame::Message;
use super::government::{GovernmentId, Politics};
use super::projectile::Projectile;
use super::registry::{ShipId, ShipRegistry, Spawns};
use super::ship::{Command, Hyperspace, Ship};
use super::spatial::CollisionSet;
use super::system::{FleetSpec, StarMap, SystemId};
use super::visual::Visual;
use crate::consts::*;
use crate::settings::EngineSettings;
use crate::{normalize_angle, polar_to_cartesian};

/// The player's side of the world
#[derive(Debug, Clone, Default)]
pub struct Player {
    pub flagship: Option<ShipId>,
    /// System being simulated and drawn
    pub system: Option<SystemId>,
    /// Planet the player is taking off from
    pub planet: Option<usize>,
    /// Selected escorts
    pub selected: Vec<ShipId>,
    /// Saved selection groups
    pub groups: BTreeMap<u8, Vec<ShipId>>,
}

impl Player {
    /// Select one ship, or add it to the selection
    pub fn select(&mut self, id: ShipId, add: bool) {
        if !add {
            self.selected.clear();
        }
        if !self.selected.contains(&id) {
            self.selected.push(id);
        }
    }

    /// Save (`control`) or recall a selection group
    pub fn select_group(&mut self, group: u8, add: bool, control: bool, ships: &ShipRegistry) {
        if control {
            self.groups.insert(group, self.selected.clone());
            return;
        }
        let Some(members) = self.groups.get(&group) else {
            return;
        };
        if !add {
            self.selected.clear();
        }
        for &id in members {
            if ships.contains(id) && !self.selected.contains(&id) {
                self.selected.push(id);
            }
        }
    }

    /// Drop references to ships that left the registry
    pub fn forget(&mut self, removed: &[ShipId]) {
        if removed.is_empty() {
            return;
        }
        if self.flagship.is_some_and(|id| removed.contains(&id)) {
            log::info!("flagship lost");
            self.flagship = None;
        }
        self.selected.retain(|id| !removed.contains(id));
        for members in self.groups.values_mut() {
            members.retain(|id| !removed.contains(id));
        }
    }
}

/// Complete simulation state
#[derive(Debug)]
pub struct World {
    pub settings: EngineSettings,
    pub map: StarMap,
    pub politics: Politics,
    pub player: Player,

    // === Registries ===
    pub ships: ShipRegistry,
    pub projectiles: Vec<Projectile>,
    pub flotsam: Vec<Flotsam>,
    pub visuals: Vec<Visual>,
    pub asteroids: AsteroidField,
    /// Objects created this step, appended after collisions
    pub spawns: Spawns,

    // === Collision sets, rebuilt every step ===
    pub(crate) visible: CollisionSet<ShipId>,
    pub(crate) cloaked: CollisionSet<ShipId>,
    /// Ships with an anti-missile system ready this step
    pub(crate) anti_missile: Vec<ShipId>,

    // === Output of the step in progress ===
    pub events: EventQueue,
    pub messages: Vec<Message>,

    // === Narrative bookkeeping ===
    /// Government -> ship that asked the player for help against it
    pub(crate) grudges: BTreeMap<GovernmentId, ShipId>,
    pub(crate) grudge_time: u32,
    /// Planets of the current system whose defense already launched
    pub(crate) defended: Vec<bool>,
    /// JUMP event still owed for the last system entry
    pub(crate) entering: bool,
    pub(crate) alarm_time: u32,
    pub(crate) had_hostiles: bool,

    // === Player input ===
    /// Latest flagship keys from the presenter
    pub(crate) keys: Command,
    /// Commands generated by clicks, applied to the flagship next step
    pub(crate) click_commands: Command,

    /// Steps computed so far
    pub step: u64,
    pub rng: Pcg32,
}

impl World {
    pub fn new(settings: EngineSettings, map: StarMap, politics: Politics) -> Self {
        let cell = settings.collision_cell_size;
        let cells = settings.collision_cell_count;
        Self {
            rng: Pcg32::seed_from_u64(settings.seed),
            settings,
            map,
            politics,
            player: Player::default(),
            ships: ShipRegistry::new(),
            projectiles: Vec::new(),
            flotsam: Vec::new(),
            visuals: Vec::new(),
            asteroids: AsteroidField::new(),
            spawns: Spawns::default(),
            visible: CollisionSet::new(cell, cells),
            cloaked: CollisionSet::new(cell, cells),
            anti_missile: Vec::new(),
            events: EventQueue::new(),
            messages: Vec::new(),
            grudges: BTreeMap::new(),
            grudge_time: 0,
            defended: Vec::new(),
            entering: false,
            alarm_time: 0,
            had_hostiles: false,
            keys: Command::default(),
            click_commands: Command::default(),
            step: 0,
        }
    }

    pub fn flagship(&self) -> Option<&Ship> {
        self.player.flagship.and_then(|id| self.ships.get(id))
    }

    /// Put the player's fleet and mission NPC groups into the world.
    ///
    /// The first player ship becomes the flagship. Each NPC group's first
    /// live ship leads the group; group leaders follow the flagship unless
    /// uninterested. Ships that fit into a bay of an earlier ship in the same
    /// group ride there instead of entering the registry.
    pub fn place(
        &mut self,
        player_ships: Vec<Ship>,
        npc_groups: Vec<Vec<Ship>>,
        system: SystemId,
        planet: Option<usize>,
    ) {
        self.ships.clear();
        self.player.system = Some(system);
        self.player.planet = planet;
        self.enter_system();
        let fleet_count = self.ships.len();

        let mut player_ships = dock_carried(player_ships);
        for ship in &mut player_ships {
            ship.is_yours = true;
            ship.government = self.politics.player();
            ship.system.get_or_insert(system);
        }
        let ids = self.ships.insert_fleet(player_ships);
        self.player.flagship = ids.first().copied();
        let flagship = self.player.flagship;

        for group in npc_groups {
            let mut group: Vec<Ship> = group.into_iter().filter(|s| !s.is_destroyed()).collect();
            for ship in &mut group {
                ship.crew = ship.crew.max(ship.attributes.required_crew);
                if !ship.is_disabled() {
                    ship.recharge();
                }
                ship.system.get_or_insert(system);
            }
            let group = dock_carried(group);
            let ids = self.ships.insert_fleet(group);
            if let Some(&leader) = ids.first()
                && let Some(ship) = self.ships.get_mut(leader)
                && !ship.personality.uninterested
            {
                ship.parent = flagship;
            }
        }

        let (origin, radius, planet_gov) = planet
            .and_then(|p| self.map.system(system).and_then(|s| s.planets.get(p)))
            .map_or((Vec2::ZERO, 0.0, None), |p| (p.position, p.radius, p.government));

        let ids: Vec<ShipId> = self.ships.ids()[fleet_count..].to_vec();
        for id in ids {
            let Some(ship) = self.ships.get_mut(id) else {
                continue;
            };
            let angle = self.rng.random::<f32>() * std::f32::consts::TAU;
            let here = ship.system == Some(system);
            let welcome = planet_gov.is_none_or(|g| !self.politics.is_enemy(g, ship.government))
                || self.politics.is_player(ship.government);
            let takes_off = here
                && planet.is_some()
                && !ship.is_disabled()
                && welcome
                && !ship.personality.staying;

            if takes_off {
                let position = origin + polar_to_cartesian(self.rng.random::<f32>() * radius, angle);
                ship.place(position, polar_to_cartesian(1.0, angle), angle);
                ship.body.zoom = 0.0;
            } else {
                let out = (self.rng.random::<f32>() + 1.0) * 400.0 + 2.0 * radius;
                let position = origin
                    + polar_to_cartesian(out, self.rng.random::<f32>() * std::f32::consts::TAU);
                let velocity = if ship.is_disabled() {
                    Vec2::ZERO
                } else {
                    polar_to_cartesian(self.rng.random::<f32>() * ship.attributes.max_velocity, angle)
                };
                ship.place(position, velocity, angle);
            }
        }
        self.player.planet = None;
        log::info!(
            "placed {} ships in system {:?} ({} from fleets)",
            self.ships.len(),
            system,
            fleet_count
        );
    }

    /// Reset the world around the player's current system.
    pub fn enter_system(&mut self) {
        let Some(id) = self.player.system else {
            return;
        };
        let Some(system) = self.map.system(id).cloned() else {
            log::warn!("entering unknown system {id:?}");
            return;
        };
        log::info!("entering the {} system", system.name);

        self.asteroids.clear();
        for belt in &system.asteroids {
            self.asteroids.add(belt, &mut self.rng);
        }

        // Five seconds' worth of fleets
        for _ in 0..5 {
            for fleet in &system.fleets {
                if self.rng.random_range(0..fleet.period.max(1)) < 60 {
                    let ships = self.instantiate(fleet, id);
                    let ids = self.ships.insert_fleet(ships);
                    for ship_id in ids {
                        if let Some(ship) = self.ships.get_mut(ship_id) {
                            let angle = self.rng.random::<f32>() * std::f32::consts::TAU;
                            let position = polar_to_cartesian(
                                self.rng.random_range(200.0..1500.0),
                                self.rng.random::<f32>() * std::f32::consts::TAU,
                            );
                            let speed = self.rng.random::<f32>() * ship.attributes.max_velocity;
                            ship.place(position, polar_to_cartesian(speed, angle), angle);
                        }
                    }
                }
            }
        }

        self.grudges.clear();
        self.projectiles.clear();
        self.visuals.clear();
        self.flotsam.clear();
        self.spawns.projectiles.clear();
        self.spawns.visuals.clear();
        self.spawns.flotsam.clear();
        self.defended = vec![false; system.planets.len()];
        self.entering = true;
    }

    /// Fresh copies of a fleet's ships, owned by its government
    pub(crate) fn instantiate(&self, fleet: &FleetSpec, system: SystemId) -> Vec<Ship> {
        fleet
            .ships
            .iter()
            .map(|template| {
                let mut ship = template.clone();
                ship.government = fleet.government;
                ship.system = Some(system);
                ship.is_yours = false;
                ship.recharge();
                ship
            })
            .collect()
    }

    /// Bring a fleet into `system`, either out of hyperspace along a random
    /// lane or taking off from a random planet.
    pub(crate) fn enter_fleet(&mut self, fleet: &FleetSpec, system: SystemId) -> Vec<Ship> {
        let mut ships = self.instantiate(fleet, system);
        let Some(here) = self.map.system(system) else {
            return ships;
        };

        let lanes = here.links.len();
        let planets = here.planets.len();
        let use_lane = lanes > 0 && (planets == 0 || self.rng.random_bool(0.5));
        if use_lane {
            let from = here.links[self.rng.random_range(0..lanes)];
            let direction = self
                .map
                .system(from)
                .map(|s| (here.position - s.position).normalize_or_zero())
                .filter(|d| *d != Vec2::ZERO)
                .unwrap_or(Vec2::X);
            let facing = direction.y.atan2(direction.x);
            for ship in &mut ships {
                let jitter = polar_to_cartesian(
                    self.rng.random::<f32>() * 200.0,
                    self.rng.random::<f32>() * std::f32::consts::TAU,
                );
                ship.place(
                    -direction * HYPERSPACE_ARRIVAL_DISTANCE + jitter,
                    direction * ship.attributes.max_velocity,
                    facing,
                );
                ship.body.zoom = 0.0;
                ship.hyperspace = Hyperspace::Arriving {
                    count: HYPERSPACE_STEPS,
                };
            }
        } else if planets > 0 {
            let planet = &here.planets[self.rng.random_range(0..planets)];
            let (origin, radius) = (planet.position, planet.radius);
            for ship in &mut ships {
                let angle = self.rng.random::<f32>() * std::f32::consts::TAU;
                let position = origin + polar_to_cartesian(self.rng.random::<f32>() * radius, angle);
                ship.place(position, polar_to_cartesian(1.0, angle), normalize_angle(angle));
                ship.body.zoom = 0.0;
            }
        }
        ships
    }

    /// Add ships mid-run (they enter the registry with the next append)
    pub fn add_ships(&mut self, ships: Vec<Ship>) {
        self.spawns.ships.extend(ships);
    }
}

/// Put carried craft into free bays of the ships before them. Returns the
/// ships that still need a place in the registry.
fn dock_carried(ships: Vec<Ship>) -> Vec<Ship> {
    let mut placed: Vec<Ship> = Vec::with_capacity(ships.len());
    'next: for ship in ships {
        let mut ship = ship;
        if ship.attributes.carried_in.is_some() && !ship.is_disabled() {
            for carrier in &mut placed {
                match carrier.carry(ship) {
                    None => continue 'next,
                    Some(back) => ship = back,
                }
            }
        }
        placed.push(ship);
    }
    placed
}
