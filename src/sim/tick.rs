//! Fixed timestep simulation tick
//!
//! Advances the world by one step and fills the frame the presenter will
//! read. Order matters: intents, planetary defense, ship movement, the other
//! registries, pruning, minor actions, collisions, then appending whatever
//! was spawned so it is drawn this step but only moves from the next one.

use glam::Vec2;
use rand::Rng;

use super::collision::{Outcome, Resolver, collect};
use super::events::{EventKind, ShipEvent};
use super::frame::{DrawKind, Drawable, FlagshipStatus, Frame, Message, RadarKind};
use super::government::GovernmentId;
use super::pilot::Pilot;
use super::registry::{Expire, ShipId, append, prune};
use super::ship::{Command, Ship};
use super::state::World;
use crate::consts::*;

/// Input queued by the presenter, applied once early in the next step
#[derive(Debug, Clone)]
pub enum Request {
    /// Click at a world position
    Click { point: Vec2, right: bool, shift: bool },
    /// Save (`control`) or recall (`shift` adds) a selection group
    SelectGroup { group: u8, shift: bool, control: bool },
    /// Current flagship keys
    Keys(Command),
    /// Ships joining the world
    AddShips(Vec<Ship>),
}

/// Advance the world by one step, writing the results into `frame`.
pub fn tick(world: &mut World, frame: &mut Frame, pilot: &mut dyn Pilot, requests: Vec<Request>) {
    frame.clear(world.step);

    let mut click = None;
    for request in requests {
        match request {
            Request::Click { point, right, shift } => click = Some((point, right, shift)),
            Request::SelectGroup { group, shift, control } => {
                world.player.select_group(group, shift, control, &world.ships);
            }
            Request::Keys(keys) => world.keys = keys,
            Request::AddShips(ships) => world.add_ships(ships),
        }
    }

    if world.player.system.is_none() {
        world.events.swap_out(&mut frame.events);
        frame.messages.append(&mut world.messages);
        world.step += 1;
        return;
    }

    decide(world, pilot);
    deploy_defense(world);
    move_ships(world, pilot);

    world.asteroids.step(world.step);
    for flotsam in &mut world.flotsam {
        flotsam.step();
    }
    for projectile in &mut world.projectiles {
        projectile.step(&world.ships, &mut world.spawns.visuals);
    }
    for visual in &mut world.visuals {
        visual.step();
    }

    let removed = world.ships.prune();
    world.player.forget(&removed);
    prune(&mut world.projectiles);
    prune(&mut world.flotsam);
    prune(&mut world.visuals);

    spawn_fleets(world);
    send_hails(world);
    if let Some((point, right, shift)) = click {
        handle_click(world, pilot, point, right, shift);
    }
    world.grudge_time = world.grudge_time.saturating_sub(1);

    fill_collision_sets(world);
    do_collisions(world);
    do_collection(world);
    do_scanning(world);

    // Detonated projectiles and emptied flotsam are gone before drawing
    prune(&mut world.projectiles);
    prune(&mut world.flotsam);

    append_spawns(world);
    check_arrival(world);
    draw(world, frame);

    world.step += 1;
}

// === Intents ===

fn decide(world: &mut World, pilot: &mut dyn Pilot) {
    let flagship = world.player.flagship;
    let mut commands: Vec<(ShipId, Command)> = Vec::with_capacity(world.ships.len());
    for (id, ship) in world.ships.iter() {
        let command = if Some(id) == flagship {
            let mut command = world.keys.clone();
            command.merge(&world.click_commands);
            command
        } else {
            pilot.decide(id, ship, &world.ships, &world.politics)
        };
        commands.push((id, command));
    }
    world.click_commands = Command::default();

    for (id, command) in commands {
        if let Some(ship) = world.ships.get_mut(id) {
            ship.commands = command;
        }
    }
}

// === Movement ===

fn deploy_defense(world: &mut World) {
    let Some(system_id) = world.player.system else {
        return;
    };
    let Some(system) = world.map.system(system_id) else {
        return;
    };

    let mut deploy = Vec::new();
    for (index, planet) in system.planets.iter().enumerate() {
        let (Some(fleet), Some(gov)) = (&planet.defense, planet.government) else {
            continue;
        };
        if world.defended.get(index).copied().unwrap_or(true) {
            continue;
        }
        let threatened = world.ships.iter().any(|(_, ship)| {
            ship.system == Some(system_id)
                && ship.is_targetable()
                && world.politics.is_enemy(gov, ship.government)
                && ship.body.position.distance(planet.position) <= planet.defense_range
        });
        if threatened {
            deploy.push((index, fleet.clone(), planet.position, planet.radius));
        }
    }

    for (index, fleet, origin, radius) in deploy {
        world.defended[index] = true;
        let mut ships = world.instantiate(&fleet, system_id);
        for ship in &mut ships {
            let angle = world.rng.random::<f32>() * std::f32::consts::TAU;
            let offset = crate::polar_to_cartesian(world.rng.random::<f32>() * radius, angle);
            ship.place(origin + offset, Vec2::ZERO, angle);
            ship.body.zoom = 0.0;
        }
        log::debug!("planet {index} launched {} defenders", ships.len());
        world.spawns.fleets.push(ships);
    }
}

fn move_ships(world: &mut World, pilot: &mut dyn Pilot) {
    let here = world.player.system;
    let ids = world.ships.ids().to_vec();
    for id in ids {
        let Some(ship) = world.ships.get_mut(id) else {
            continue;
        };
        let was_removed = ship.should_be_removed();
        ship.step(id, &world.map, &mut world.spawns, &mut world.rng);
        if !was_removed && ship.should_be_removed() {
            let gov = ship.government;
            log::debug!("ship {id:?} removed");
            world
                .events
                .push(ShipEvent::new(None, None, id, gov, EventKind::Destroy));
            continue;
        }

        if let Some((victim, kind, actor_gov, victim_gov)) = board(world, id) {
            world
                .events
                .push(ShipEvent::new(Some(actor_gov), Some(id), victim, victim_gov, kind));
        }

        let Some(ship) = world.ships.get_mut(id) else {
            continue;
        };
        if ship.system != here {
            continue;
        }
        ship.launch(id, &mut world.spawns.ships);
        if ship.fire(id, &mut world.spawns.projectiles) {
            world.anti_missile.push(id);
        }
    }

    // The flagship arrived somewhere new
    if let Some(flagship) = world.flagship()
        && flagship.system.is_some()
        && flagship.system != world.player.system
    {
        world.player.system = flagship.system;
        world.enter_system();
        pilot.clean();
    }
}

/// Resolve a boarding attempt. Returns the victim, the event kind and the
/// governments of both sides before any capture.
fn board(world: &mut World, id: ShipId) -> Option<(ShipId, EventKind, GovernmentId, GovernmentId)> {
    let ship = world.ships.get(id)?;
    if !ship.commands.board || ship.cannot_act() {
        return None;
    }
    let target = ship.target?;
    let [ship, victim] = world.ships.get_pair_mut(id, target)?;

    if !victim.is_disabled()
        || victim.is_destroyed()
        || victim.system != ship.system
        || !victim.body.is_present()
    {
        return None;
    }
    let gap = ship.body.position.distance(victim.body.position);
    let closing = (ship.body.velocity - victim.body.velocity).length();
    if gap > ship.body.radius + victim.body.radius + BOARDING_RANGE || closing > BOARDING_SPEED {
        return None;
    }

    let actor_gov = ship.government;
    let victim_gov = victim.government;
    ship.commands.board = false;
    let kind = if world.politics.is_enemy(actor_gov, victim_gov) {
        let plundered = victim.cargo.transfer_all(&mut ship.cargo);
        if ship.crew > victim.crew && ship.crew > 1 {
            ship.crew -= 1;
            victim.crew = 1;
            victim.government = actor_gov;
            victim.is_yours = ship.is_yours;
            victim.parent = Some(id);
            victim.target = None;
            log::debug!("ship {id:?} captured {target:?}");
        }
        log::debug!("ship {id:?} boarded {target:?}, {plundered} tons taken");
        ship.target = None;
        EventKind::Board
    } else {
        victim.assist();
        log::debug!("ship {id:?} assisted {target:?}");
        EventKind::Assist
    };
    Some((target, kind, actor_gov, victim_gov))
}

// === Minor actions ===

fn spawn_fleets(world: &mut World) {
    let Some(system_id) = world.player.system else {
        return;
    };
    let Some(fleets) = world.map.system(system_id).map(|s| s.fleets.clone()) else {
        return;
    };
    for fleet in &fleets {
        if fleet.period == 0 || world.rng.random_range(0..fleet.period) != 0 {
            continue;
        }
        let (mut allies, mut enemies) = (0.0, 0.0);
        for (_, ship) in world.ships.iter() {
            if ship.system != Some(system_id) || ship.is_destroyed() {
                continue;
            }
            if world.politics.is_enemy(fleet.government, ship.government) {
                enemies += ship.attributes.cost;
            } else {
                allies += ship.attributes.cost;
            }
        }
        if enemies > 0.0 && allies > 2.0 * enemies {
            continue;
        }
        let ships = world.enter_fleet(fleet, system_id);
        log::debug!("fleet of {} entering", ships.len());
        world.spawns.fleets.push(ships);
    }
}

fn send_hails(world: &mut World) {
    let period = world.settings.hail_period;
    if period == 0 || world.ships.is_empty() || world.rng.random_range(0..period) != 0 {
        return;
    }
    let ids = world.ships.ids();
    let id = ids[world.rng.random_range(0..ids.len())];
    let Some(ship) = world.ships.get(id) else {
        return;
    };
    if world.politics.is_player(ship.government)
        || ship.system != world.player.system
        || ship.is_disabled()
        || ship.crew == 0
        || ship.cloak >= 1.0
        || ship.personality.mute
    {
        return;
    }
    world.messages.push(Message::Hail { from: id });
}

fn handle_click(world: &mut World, pilot: &mut dyn Pilot, point: Vec2, right: bool, shift: bool) {
    let Some(flagship_id) = world.player.flagship else {
        return;
    };
    let Some(flagship) = world.ships.get(flagship_id) else {
        return;
    };
    let flagship_gov = flagship.government;
    let flagship_target = flagship.target;

    // Planets: first click selects, second lands
    if !right
        && flagship.body.is_present()
        && let Some(system) = world.player.system.and_then(|s| world.map.system(s))
    {
        for (index, planet) in system.planets.iter().enumerate() {
            if point.distance(planet.position) >= planet.radius {
                continue;
            }
            if flagship.target_planet == Some(index) {
                let refused = planet
                    .government
                    .is_some_and(|g| world.politics.is_enemy(g, flagship_gov));
                if refused {
                    world.messages.push(Message::LandingRefused {
                        planet: planet.name.clone(),
                    });
                } else {
                    world.click_commands.land = true;
                }
            } else {
                world.click_commands.target_planet = Some(index);
            }
        }
    }

    let mut range = world.settings.click_range;
    let mut clicked = None;
    for (id, ship) in world.ships.iter() {
        if id == flagship_id || ship.system != world.player.system || !ship.is_targetable() {
            continue;
        }
        let distance = (point.distance(ship.body.position) - ship.body.radius).max(0.0);
        if distance <= range {
            range = distance;
            clicked = Some((id, ship.government));
            if distance == 0.0 && world.politics.is_player_enemy(ship.government) {
                break;
            }
        }
    }

    match clicked {
        Some((id, _)) if right => pilot.issue_ship_target(id),
        Some((id, gov)) => {
            if flagship_target == Some(id) {
                world.click_commands.board = true;
            } else {
                if let Some(flagship) = world.ships.get_mut(flagship_id) {
                    flagship.target = Some(id);
                }
                if world.politics.is_player(gov) {
                    world.player.select(id, shift);
                }
            }
        }
        None if right => pilot.issue_move_target(point),
        None => {}
    }
}

// === Collisions ===

fn fill_collision_sets(world: &mut World) {
    world.visible.clear(world.step);
    world.cloaked.clear(world.step);
    for (id, ship) in world.ships.iter() {
        if ship.system != world.player.system || !ship.body.is_present() || ship.is_landed() {
            continue;
        }
        if ship.cloak < 1.0 {
            world.visible.add(id, ship);
        } else {
            world.cloaked.add(id, ship);
        }
    }
    world.visible.finish();
    world.cloaked.finish();
}

fn do_collisions(world: &mut World) {
    let mut hits: Vec<(ShipId, GovernmentId)> = Vec::new();
    {
        let mut resolver = Resolver {
            ships: &mut world.ships,
            visible: &world.visible,
            cloaked: &world.cloaked,
            asteroids: &mut world.asteroids,
            anti_missile: &world.anti_missile,
            politics: &world.politics,
            system: world.player.system,
            events: &mut world.events,
            spawns: &mut world.spawns,
            rng: &mut world.rng,
        };
        for projectile in &mut world.projectiles {
            if let Outcome::Detonated { ship: Some(id), .. } = resolver.resolve(projectile)
                && let Some(gov) = projectile.government
            {
                hits.push((id, gov));
            }
        }
    }
    world.anti_missile.clear();

    for (target, attacker) in hits {
        grudge(world, target, attacker);
    }
}

fn do_collection(world: &mut World) {
    let radius = world.settings.pickup_radius;
    for flotsam in &mut world.flotsam {
        if let Some((collector, amount)) = collect(flotsam, &mut world.ships, &world.visible, radius)
            && amount > 0
            && world.ships.get(collector).is_some_and(|s| s.is_yours)
        {
            log::debug!("ship {collector:?} picked up {amount} x {:?}", flotsam.payload);
        }
    }
}

fn do_scanning(world: &mut World) {
    let ids = world.ships.ids().to_vec();
    for id in ids {
        let Some(ship) = world.ships.get(id) else {
            continue;
        };
        let target = ship.target.and_then(|t| {
            world
                .ships
                .get(t)
                .map(|s| (t, s.body.position, s.is_targetable(), s.government))
        });
        let Some(ship) = world.ships.get_mut(id) else {
            continue;
        };
        let result = ship.step_scan(target.map(|(t, pos, ok, _)| (t, pos, ok)));
        let actor_gov = ship.government;
        if let Some((target, _, true, target_gov)) = target {
            if result.cargo {
                world.events.push(ShipEvent::new(
                    Some(actor_gov),
                    Some(id),
                    target,
                    target_gov,
                    EventKind::ScanCargo,
                ));
            }
            if result.outfits {
                world.events.push(ShipEvent::new(
                    Some(actor_gov),
                    Some(id),
                    target,
                    target_gov,
                    EventKind::ScanOutfits,
                ));
            }
        }
    }
}

/// Decide whether a ship hit by `attacker` asks the player for help, or
/// thanks them.
fn grudge(world: &mut World, target: ShipId, attacker: GovernmentId) {
    let Some(ship) = world.ships.get(target) else {
        return;
    };
    let target_gov = ship.government;

    if world.politics.is_player(attacker) {
        if let Some(&previous) = world.grudges.get(&target_gov)
            && world
                .ships
                .get(previous)
                .is_some_and(|p| p.system == world.player.system && !p.is_disabled())
        {
            world.grudges.remove(&target_gov);
            world.messages.push(Message::Thanks { from: previous });
        }
        return;
    }
    if world.grudge_time > 0 {
        return;
    }
    if let Some(&previous) = world.grudges.get(&attacker) {
        let still_asking = world
            .ships
            .get(previous)
            .is_none_or(|p| p.system == world.player.system && !p.is_disabled());
        if still_asking {
            return;
        }
    }

    if world.politics.is_player(target_gov)
        || !world.politics.is_player_enemy(attacker)
        || world.politics.is_player_enemy(target_gov)
        || ship.personality.mute
    {
        return;
    }

    let target_strength = ship.strength();
    let heroic = ship.personality.heroic;
    let attacker_strength: f32 = world
        .ships
        .iter()
        .filter(|(_, s)| s.government == attacker && s.target == Some(target))
        .map(|(_, s)| s.strength())
        .sum();
    if attacker_strength <= target_strength {
        return;
    }
    let ratio = attacker_strength / target_strength.max(f32::EPSILON) - 1.0;
    if world.rng.random::<f32>() * 10.0 > ratio {
        return;
    }

    world.grudges.insert(attacker, target);
    world.grudge_time = world.settings.grudge_cooldown_steps;
    world.messages.push(Message::PleaForHelp {
        from: target,
        against: attacker,
        heroic,
    });
}

// === End of step ===

fn append_spawns(world: &mut World) {
    let spawns = &mut world.spawns;
    world.ships.append(&mut spawns.ships);
    for fleet in spawns.fleets.drain(..) {
        world.ships.insert_fleet(fleet);
    }
    append(&mut world.projectiles, &mut spawns.projectiles);
    append(&mut world.flotsam, &mut spawns.flotsam);
    append(&mut world.visuals, &mut spawns.visuals);
}

/// Emit the JUMP event once the flagship is fully in its new system
fn check_arrival(world: &mut World) {
    if !world.entering {
        return;
    }
    let Some(id) = world.player.flagship else {
        return;
    };
    let Some(flagship) = world.ships.get(id) else {
        return;
    };
    if flagship.body.is_present() && !flagship.is_hyperspacing() {
        world.entering = false;
        let gov = flagship.government;
        world
            .events
            .push(ShipEvent::new(Some(gov), Some(id), id, gov, EventKind::Jump));
    }
}

fn radar_kind(world: &World, ship: &Ship) -> RadarKind {
    let step = world.step;
    if ship.personality.target && !ship.is_destroyed() {
        let count = (step / 6) % 7;
        if count == 0 || count == 2 {
            return RadarKind::Blink;
        }
    }
    if ship.is_disabled() || (ship.is_overheated() && (step / 20) % 2 == 1) {
        return RadarKind::Inactive;
    }
    let politics = &world.politics;
    if politics.is_player(ship.government)
        || (ship.personality.escort && !politics.is_player_enemy(ship.government))
    {
        return RadarKind::Player;
    }
    if !politics.is_player_enemy(ship.government) {
        return RadarKind::Friendly;
    }
    let targets_player = ship
        .target
        .and_then(|t| world.ships.get(t))
        .is_some_and(|t| politics.is_player(t.government));
    if targets_player {
        RadarKind::Hostile
    } else {
        RadarKind::Unfriendly
    }
}

fn draw(world: &mut World, frame: &mut Frame) {
    let here = world.player.system;
    let flagship_id = world.player.flagship;
    let flagship = world.flagship();

    frame.system = here;
    if let Some(flagship) = flagship {
        frame.center = flagship.body.position;
        frame.center_velocity = flagship.body.velocity;
    }

    // Stellar objects
    let system = here.and_then(|s| world.map.system(s));
    if let Some(system) = system {
        for planet in &system.planets {
            frame.add(Drawable {
                kind: DrawKind::Planet,
                sprite: planet.sprite,
                position: planet.position,
                velocity: Vec2::ZERO,
                facing: 0.0,
                zoom: 1.0,
                cloak: 0.0,
            });
            let refuses = planet
                .government
                .is_some_and(|g| world.politics.is_player_enemy(g));
            let kind = if refuses {
                RadarKind::Hostile
            } else {
                RadarKind::Friendly
            };
            frame.add_blip(kind, planet.position, (planet.radius * 0.03 + 0.5).max(2.0));
        }

        if let Some(flagship) = flagship {
            for (index, other) in world.map.systems.iter().enumerate() {
                let other_id = super::system::SystemId(index as u16);
                let reachable = system.is_linked(other_id)
                    || (flagship.attributes.jump_drive
                        && here.is_some_and(|h| world.map.can_travel(h, other_id, true)));
                if !reachable {
                    continue;
                }
                let kind = if flagship.target_system == Some(other_id) {
                    RadarKind::Special
                } else {
                    RadarKind::Inactive
                };
                frame.add_pointer(kind, other.position - system.position);
            }
        }
    }

    for rock in &world.asteroids.rocks {
        frame.add(Drawable::from_body(DrawKind::Asteroid, &rock.body));
    }
    for minable in &world.asteroids.minables {
        frame.add(Drawable::from_body(DrawKind::Asteroid, &minable.body));
    }
    for flotsam in &world.flotsam {
        frame.add(Drawable::from_body(DrawKind::Flotsam, &flotsam.body));
    }

    // Ships, flagship on top; radar and hostiles check alongside
    let mut has_hostiles = false;
    for (id, ship) in world.ships.iter() {
        if ship.system != here {
            continue;
        }
        if !ship.is_landed() && Some(id) != flagship_id {
            frame.add(Drawable::from_body(DrawKind::Ship(id), &ship.body).with_cloak(ship.cloak));
        }

        let is_player = world.politics.is_player(ship.government);
        if ship.cloak >= 1.0 && !is_player {
            continue;
        }
        let kind = if flagship.is_some_and(|f| f.target == Some(id)) {
            RadarKind::Special
        } else {
            radar_kind(world, ship)
        };
        frame.add_blip(kind, ship.body.position, (ship.body.radius * 4.0).sqrt() * 0.14 + 0.5);

        has_hostiles |= !ship.is_disabled()
            && world.politics.is_player_enemy(ship.government)
            && ship
                .target
                .and_then(|t| world.ships.get(t))
                .is_some_and(|t| world.politics.is_player(t.government));
    }
    if let (Some(id), Some(ship)) = (flagship_id, flagship)
        && !ship.is_landed()
    {
        frame.add(Drawable::from_body(DrawKind::Ship(id), &ship.body).with_cloak(ship.cloak));
    }

    for projectile in &world.projectiles {
        frame.add(Drawable::from_body(DrawKind::Projectile, &projectile.body));
        if projectile.weapon.missile_strength > 0 {
            let hostile = projectile
                .government
                .is_some_and(|g| world.politics.is_player_enemy(g));
            let kind = if hostile {
                RadarKind::Special
            } else {
                RadarKind::Inactive
            };
            frame.add_blip(kind, projectile.body.position, 1.0);
        } else if projectile.weapon.blast_radius > 0.0 {
            frame.add_blip(RadarKind::Special, projectile.body.position, 1.8);
        }
    }
    for visual in &world.visuals {
        frame.add(Drawable::from_body(DrawKind::Visual, &visual.body));
    }

    frame.flagship = flagship_id.zip(flagship).map(|(id, ship)| FlagshipStatus {
        id,
        hull: ship.hull,
        shields: ship.shields,
        energy: ship.energy,
        heat: ship.heat,
        fuel: ship.fuel,
        system: ship.system,
        landed_on: ship.landed_on,
        target: ship.target,
    });

    // Alarm
    if world.alarm_time > 0 {
        world.alarm_time -= 1;
    } else if has_hostiles && !world.had_hostiles {
        frame.hostiles_alarm = true;
        world.alarm_time = ALARM_COOLDOWN_STEPS;
        world.had_hostiles = true;
    } else if !has_hostiles {
        world.had_hostiles = false;
    }

    world.events.swap_out(&mut frame.events);
    frame.messages.append(&mut world.messages);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::settings::EngineSettings;
    use crate::sim::government::Politics;
    use crate::sim::pilot::Idle;
    use crate::sim::projectile::Projectile;
    use crate::sim::registry::ShipRegistry;
    use crate::sim::ship::Attributes;
    use crate::sim::system::{FleetSpec, Planet, StarMap, StarSystem};
    use crate::sim::weapon::{Hardpoint, Weapon};

    fn world() -> (World, ShipId, GovernmentId) {
        world_in(StarSystem::new("Sol", Vec2::ZERO))
    }

    fn world_in(system: StarSystem) -> (World, ShipId, GovernmentId) {
        let mut map = StarMap::default();
        let sol = map.add(system);
        let mut politics = Politics::new("Player");
        let pirates = politics.add("Pirate");
        politics.set_hostile(GovernmentId(0), pirates, true);

        let settings = EngineSettings {
            hail_period: 0,
            ..Default::default()
        };
        let mut world = World::new(settings, map, politics);
        let mut flagship = Ship::default();
        flagship.is_yours = true;
        flagship.system = Some(sol);
        let id = world.ships.insert(flagship);
        world.player.flagship = Some(id);
        world.player.system = Some(sol);
        world.enter_system();
        (world, id, pirates)
    }

    fn add_pirate(world: &mut World, pirates: GovernmentId, position: Vec2) -> ShipId {
        let mut pirate = Ship::new("Pirate", "Raider", pirates, Default::default());
        pirate.body.position = position;
        pirate.system = world.player.system;
        world.ships.insert(pirate)
    }

    fn run(world: &mut World, steps: usize, requests: impl Fn() -> Vec<Request>) -> Vec<ShipEvent> {
        let mut frame = Frame::default();
        let mut events = Vec::new();
        for _ in 0..steps {
            tick(world, &mut frame, &mut Idle, requests());
            events.extend(frame.events.iter().cloned());
        }
        events
    }

    #[test]
    fn test_frames_count_steps() {
        let (mut world, _, _) = world();
        let mut frame = Frame::default();
        tick(&mut world, &mut frame, &mut Idle, Vec::new());
        assert_eq!(frame.step, 0);
        tick(&mut world, &mut frame, &mut Idle, Vec::new());
        assert_eq!(frame.step, 1);
        assert_eq!(world.step, 2);
    }

    #[test]
    fn test_jump_reported_once_on_arrival() {
        let (mut world, flagship, _) = world();
        let events = run(&mut world, 3, Vec::new);
        let jumps: Vec<_> = events.iter().filter(|e| e.kind == EventKind::Jump).collect();
        assert_eq!(jumps.len(), 1);
        assert_eq!(jumps[0].target, flagship);
        assert_eq!(jumps[0].actor, Some(flagship));
    }

    #[test]
    fn test_new_projectile_drawn_before_it_moves() {
        let (mut world, flagship, _) = world();
        if let Some(ship) = world.ships.get_mut(flagship) {
            ship.weapons.push(Hardpoint::new(Arc::new(Weapon::default())));
        }
        let fire = || {
            vec![Request::Keys(Command {
                fire: true,
                ..Default::default()
            })]
        };

        let mut frame = Frame::default();
        tick(&mut world, &mut frame, &mut Idle, fire());
        assert_eq!(world.projectiles.len(), 1);
        assert_eq!(world.projectiles[0].body.position, Vec2::ZERO);
        assert!(
            frame
                .drawables
                .iter()
                .any(|d| d.kind == DrawKind::Projectile && d.position == Vec2::ZERO)
        );

        tick(&mut world, &mut frame, &mut Idle, Vec::new());
        assert!(world.projectiles[0].body.position.x > 0.0);
    }

    #[test]
    fn test_projectile_destroys_enemy() {
        let (mut world, flagship, pirates) = world();
        let pirate = add_pirate(&mut world, pirates, Vec2::new(80.0, 0.0));
        if let Some(ship) = world.ships.get_mut(pirate) {
            ship.shields = 0.0;
            ship.hull = 10.0;
        }
        let gun = Weapon {
            hull_damage: 50.0,
            ..Default::default()
        };
        if let Some(ship) = world.ships.get_mut(flagship) {
            ship.weapons.push(Hardpoint::new(Arc::new(gun)));
        }

        let events = run(&mut world, 20, || {
            vec![Request::Keys(Command {
                fire: true,
                ..Default::default()
            })]
        });
        assert!(events.iter().any(|e| {
            e.kind == EventKind::Destroy
                && e.target == pirate
                && e.actor_government == Some(GovernmentId(0))
        }));
        assert!(world.ships.get(pirate).is_some_and(Ship::is_destroyed));
    }

    #[test]
    fn test_wreck_removed_with_single_event() {
        let (mut world, _, pirates) = world();
        let pirate = add_pirate(&mut world, pirates, Vec2::new(500.0, 0.0));
        if let Some(ship) = world.ships.get_mut(pirate) {
            ship.hull = -1.0;
        }

        let events = run(&mut world, EXPLOSION_STEPS as usize + 5, Vec::new);
        let removals = events
            .iter()
            .filter(|e| e.kind == EventKind::Destroy && e.target == pirate && e.actor.is_none())
            .count();
        assert_eq!(removals, 1);
        assert!(!world.ships.contains(pirate));
    }

    #[test]
    fn test_boarding_disabled_enemy() {
        let (mut world, flagship, pirates) = world();
        let pirate = add_pirate(&mut world, pirates, Vec2::new(30.0, 0.0));
        if let Some(ship) = world.ships.get_mut(pirate) {
            ship.hull = 1.0;
        }
        if let Some(ship) = world.ships.get_mut(flagship) {
            ship.target = Some(pirate);
        }

        let events = run(&mut world, 1, || {
            vec![Request::Keys(Command {
                board: true,
                ..Default::default()
            })]
        });
        let board = events
            .iter()
            .find(|e| e.kind == EventKind::Board)
            .expect("board event");
        assert_eq!(board.actor, Some(flagship));
        assert_eq!(board.target, pirate);
        assert_eq!(board.target_government, pirates);
    }

    #[test]
    fn test_flagship_drawn_last_and_centered() {
        let (mut world, flagship, pirates) = world();
        add_pirate(&mut world, pirates, Vec2::new(300.0, 0.0));
        let mut frame = Frame::default();
        tick(&mut world, &mut frame, &mut Idle, Vec::new());

        let ships: Vec<_> = frame.ships().map(|(id, _)| id).collect();
        assert_eq!(ships.len(), 2);
        assert_eq!(ships.last(), Some(&flagship));
        assert_eq!(frame.center, Vec2::ZERO);
        assert_eq!(frame.flagship.as_ref().map(|f| f.id), Some(flagship));
    }

    #[test]
    fn test_hostiles_raise_alarm_once() {
        let (mut world, flagship, pirates) = world();
        let pirate = add_pirate(&mut world, pirates, Vec2::new(300.0, 0.0));
        if let Some(ship) = world.ships.get_mut(pirate) {
            ship.target = Some(flagship);
        }
        let mut frame = Frame::default();
        tick(&mut world, &mut frame, &mut Idle, Vec::new());
        assert!(frame.hostiles_alarm);
        tick(&mut world, &mut frame, &mut Idle, Vec::new());
        assert!(!frame.hostiles_alarm);
    }

    fn messages(world: &mut World, steps: usize, requests: impl Fn() -> Vec<Request>) -> Vec<Message> {
        let mut frame = Frame::default();
        let mut messages = Vec::new();
        for _ in 0..steps {
            tick(world, &mut frame, &mut Idle, requests());
            messages.append(&mut frame.messages);
        }
        messages
    }

    fn click(x: f32, y: f32, right: bool) -> Vec<Request> {
        vec![Request::Click {
            point: Vec2::new(x, y),
            right,
            shift: false,
        }]
    }

    /// Merchant at (100, 0) hunted by a much stronger pirate at (-300, 0)
    fn hunted_merchant(world: &mut World, pirates: GovernmentId) -> (ShipId, ShipId) {
        let guild = world.politics.add("Merchant");
        let mut merchant = Ship::new("Trader", "Hauler", guild, Attributes::default());
        merchant.body.position = Vec2::new(100.0, 0.0);
        merchant.system = world.player.system;
        let merchant = world.ships.insert(merchant);

        let heavy = Attributes {
            cost: 20.0,
            ..Default::default()
        };
        let mut pirate = Ship::new("Pirate", "Cruiser", pirates, heavy);
        pirate.body.position = Vec2::new(-300.0, 0.0);
        pirate.system = world.player.system;
        pirate.target = Some(merchant);
        let pirate = world.ships.insert(pirate);
        (merchant, pirate)
    }

    fn shot_at(world: &mut World, gov: GovernmentId, source: ShipId, target: ShipId, from: Vec2) {
        let weapon = Arc::new(Weapon {
            hull_damage: 1.0,
            ..Default::default()
        });
        world
            .projectiles
            .push(Projectile::fire(weapon, gov, source, Some(target), from, Vec2::ZERO, 0.0));
    }

    #[test]
    fn test_wreck_explosion_damages_bystander() {
        let (mut world, flagship, pirates) = world();
        let wreck = add_pirate(&mut world, pirates, Vec2::new(30.0, 0.0));
        if let Some(ship) = world.ships.get_mut(wreck) {
            ship.hull = -1.0;
            ship.attributes.explosion_weapon = Some(Arc::new(Weapon {
                blast_radius: 200.0,
                hull_damage: 30.0,
                ..Default::default()
            }));
        }

        run(&mut world, EXPLOSION_STEPS as usize + 10, Vec::new);
        let hull = world.ships.get(flagship).map(|s| s.hull);
        assert_eq!(hull, Some(70.0));
        assert!(world.projectiles.is_empty());
    }

    #[test]
    fn test_single_step_weapon_still_hits() {
        let (mut world, flagship, pirates) = world();
        let pirate = add_pirate(&mut world, pirates, Vec2::new(35.0, 0.0));
        let gun = Weapon {
            lifetime: 1,
            hull_damage: 5.0,
            ..Default::default()
        };
        if let Some(ship) = world.ships.get_mut(flagship) {
            ship.weapons.push(Hardpoint::new(Arc::new(gun)));
        }

        let mut frame = Frame::default();
        let fire = Command {
            fire: true,
            ..Default::default()
        };
        tick(&mut world, &mut frame, &mut Idle, vec![Request::Keys(fire)]);
        tick(&mut world, &mut frame, &mut Idle, vec![Request::Keys(Command::default())]);
        assert_eq!(world.ships.get(pirate).map(|s| s.hull), Some(95.0));
        assert!(world.projectiles.is_empty());
    }

    #[test]
    fn test_events_published_without_a_system() {
        let (mut world, flagship, _) = world();
        world.player.system = None;
        let gov = GovernmentId(0);
        world
            .events
            .push(ShipEvent::new(Some(gov), Some(flagship), flagship, gov, EventKind::Jump));
        world.messages.push(Message::Hail { from: flagship });

        let mut frame = Frame::default();
        tick(&mut world, &mut frame, &mut Idle, Vec::new());
        assert_eq!(frame.events.len(), 1);
        assert_eq!(frame.messages, vec![Message::Hail { from: flagship }]);
        assert!(world.events.is_empty());

        tick(&mut world, &mut frame, &mut Idle, Vec::new());
        assert!(frame.events.is_empty());
        assert!(frame.messages.is_empty());
    }

    #[test]
    fn test_planet_defense_launches_once() {
        let mut earth = Planet::new("Earth", Vec2::new(500.0, 0.0), 100.0);
        earth.government = Some(GovernmentId(1));
        earth.defense_range = 1000.0;
        earth.defense = Some(FleetSpec {
            government: GovernmentId(1),
            ships: vec![Ship::default(), Ship::default()],
            period: 0,
        });
        let mut sol = StarSystem::new("Sol", Vec2::ZERO);
        sol.planets.push(earth);
        let (mut world, _, pirates) = world_in(sol);

        run(&mut world, 1, Vec::new);
        assert_eq!(world.ships.len(), 3);
        assert!(world.defended[0]);
        let defenders: Vec<_> = world
            .ships
            .iter()
            .filter(|(_, s)| s.government == pirates)
            .map(|(_, s)| s.body.position.distance(Vec2::new(500.0, 0.0)))
            .collect();
        assert_eq!(defenders.len(), 2);
        assert!(defenders.iter().all(|d| *d <= 100.0));

        run(&mut world, 5, Vec::new);
        assert_eq!(world.ships.len(), 3);
    }

    #[test]
    fn test_fleet_enters_unless_allies_dominate() {
        let (mut world, _, pirates) = world();
        world.map.systems[0].fleets.push(FleetSpec {
            government: pirates,
            ships: vec![Ship::default()],
            period: 1,
        });

        // Pirate allies worth three times the player's flagship
        for x in [300.0, 400.0, 500.0] {
            add_pirate(&mut world, pirates, Vec2::new(x, 0.0));
        }
        run(&mut world, 1, Vec::new);
        assert_eq!(world.ships.len(), 4);

        let allies: Vec<ShipId> = world
            .ships
            .iter()
            .filter(|(_, s)| s.government == pirates)
            .map(|(id, _)| id)
            .collect();
        for id in allies.into_iter().skip(1) {
            if let Some(ship) = world.ships.get_mut(id) {
                ship.mark_removed();
            }
        }
        run(&mut world, 1, Vec::new);
        // One ally left, then one fleet appended
        assert_eq!(world.ships.len(), 3);
    }

    #[test]
    fn test_hail_from_neutral_ship() {
        let (mut world, flagship, _) = world();
        world.settings.hail_period = 1;
        let guild = world.politics.add("Merchant");
        let mut merchant = Ship::new("Trader", "Hauler", guild, Attributes::default());
        merchant.system = world.player.system;
        let merchant = world.ships.insert(merchant);

        let messages = messages(&mut world, 40, Vec::new);
        assert!(messages.contains(&Message::Hail { from: merchant }));
        assert!(!messages.contains(&Message::Hail { from: flagship }));
    }

    #[test]
    fn test_mute_ship_never_hails() {
        let (mut world, _, _) = world();
        world.settings.hail_period = 1;
        let guild = world.politics.add("Merchant");
        let mut merchant = Ship::new("Trader", "Hauler", guild, Attributes::default());
        merchant.system = world.player.system;
        merchant.personality.mute = true;
        world.ships.insert(merchant);

        let messages = messages(&mut world, 40, Vec::new);
        assert!(messages.is_empty());
    }

    #[test]
    fn test_planet_click_selects_then_lands() {
        let mut sol = StarSystem::new("Sol", Vec2::ZERO);
        sol.planets.push(Planet::new("Earth", Vec2::new(10.0, 0.0), 100.0));
        let (mut world, flagship, _) = world_in(sol);

        run(&mut world, 1, || click(10.0, 0.0, false));
        run(&mut world, 1, Vec::new);
        assert_eq!(world.ships.get(flagship).and_then(|s| s.target_planet), Some(0));

        run(&mut world, 1, || click(10.0, 0.0, false));
        assert!(world.click_commands.land);
        run(&mut world, 1, Vec::new);
        assert_eq!(world.ships.get(flagship).and_then(|s| s.landing), Some(0));
    }

    #[test]
    fn test_hostile_planet_refuses_landing() {
        let mut mars = Planet::new("Mars", Vec2::new(10.0, 0.0), 100.0);
        mars.government = Some(GovernmentId(1));
        let mut sol = StarSystem::new("Sol", Vec2::ZERO);
        sol.planets.push(mars);
        let (mut world, flagship, _) = world_in(sol);

        let messages = messages(&mut world, 3, || click(10.0, 0.0, false));
        assert_eq!(
            messages,
            vec![
                Message::LandingRefused {
                    planet: "Mars".into()
                };
                2
            ]
        );
        run(&mut world, 1, Vec::new);
        let ship = world.ships.get(flagship).expect("flagship");
        assert!(ship.landing.is_none() && !ship.is_landed());
    }

    #[test]
    fn test_ship_click_targets_then_boards() {
        let (mut world, flagship, pirates) = world();
        let pirate = add_pirate(&mut world, pirates, Vec2::new(30.0, 0.0));
        if let Some(ship) = world.ships.get_mut(pirate) {
            ship.hull = 1.0;
        }

        run(&mut world, 1, || click(30.0, 0.0, false));
        assert_eq!(world.ships.get(flagship).and_then(|s| s.target), Some(pirate));
        assert!(!world.click_commands.board);

        run(&mut world, 1, || click(30.0, 0.0, false));
        assert!(world.click_commands.board);
        let events = run(&mut world, 1, Vec::new);
        assert!(
            events
                .iter()
                .any(|e| e.kind == EventKind::Board && e.actor == Some(flagship) && e.target == pirate)
        );
    }

    #[derive(Default)]
    struct Orders {
        ships: Vec<ShipId>,
        moves: Vec<Vec2>,
    }

    impl Pilot for Orders {
        fn decide(
            &mut self,
            _: ShipId,
            _: &Ship,
            _: &ShipRegistry,
            _: &Politics,
        ) -> Command {
            Command::default()
        }

        fn issue_ship_target(&mut self, target: ShipId) {
            self.ships.push(target);
        }

        fn issue_move_target(&mut self, position: Vec2) {
            self.moves.push(position);
        }
    }

    #[test]
    fn test_right_click_orders_escorts() {
        let (mut world, flagship, pirates) = world();
        let pirate = add_pirate(&mut world, pirates, Vec2::new(300.0, 0.0));
        let mut orders = Orders::default();
        let mut frame = Frame::default();

        tick(&mut world, &mut frame, &mut orders, click(310.0, 0.0, true));
        tick(&mut world, &mut frame, &mut orders, click(-900.0, 40.0, true));
        assert_eq!(orders.ships, vec![pirate]);
        assert_eq!(orders.moves, vec![Vec2::new(-900.0, 40.0)]);
        // Escort orders leave the flagship's own target alone
        assert_eq!(world.ships.get(flagship).and_then(|s| s.target), None);
    }

    #[test]
    fn test_outgunned_ship_pleads_then_thanks() {
        let (mut world, flagship, pirates) = world();
        let (merchant, pirate) = hunted_merchant(&mut world, pirates);

        shot_at(&mut world, pirates, pirate, merchant, Vec2::new(65.0, 0.0));
        let pleas = messages(&mut world, 1, Vec::new);
        assert_eq!(
            pleas,
            vec![Message::PleaForHelp {
                from: merchant,
                against: pirates,
                heroic: false,
            }]
        );
        assert_eq!(world.grudges.get(&pirates), Some(&merchant));

        let player = GovernmentId(0);
        shot_at(&mut world, player, flagship, pirate, Vec2::new(-335.0, 0.0));
        let thanks = messages(&mut world, 1, Vec::new);
        assert_eq!(thanks, vec![Message::Thanks { from: merchant }]);
        assert!(world.grudges.is_empty());
    }

    #[test]
    fn test_pleas_wait_for_cooldown() {
        let (mut world, _, pirates) = world();
        let (merchant, pirate) = hunted_merchant(&mut world, pirates);

        shot_at(&mut world, pirates, pirate, merchant, Vec2::new(65.0, 0.0));
        assert_eq!(messages(&mut world, 1, Vec::new).len(), 1);
        assert!(world.grudge_time > 0);

        world.grudges.clear();
        shot_at(&mut world, pirates, pirate, merchant, Vec2::new(65.0, 0.0));
        assert!(messages(&mut world, 1, Vec::new).is_empty());

        world.grudge_time = 0;
        shot_at(&mut world, pirates, pirate, merchant, Vec2::new(65.0, 0.0));
        assert_eq!(messages(&mut world, 1, Vec::new).len(), 1);
    }

    #[test]
    fn test_scans_report_once_each() {
        let (mut world, flagship, _) = world();
        let guild = world.politics.add("Merchant");
        let mut merchant = Ship::new("Trader", "Hauler", guild, Attributes::default());
        merchant.body.position = Vec2::new(100.0, 0.0);
        merchant.system = world.player.system;
        let merchant = world.ships.insert(merchant);
        if let Some(ship) = world.ships.get_mut(flagship) {
            ship.attributes.cargo_scan = 200.0;
            ship.attributes.outfit_scan = 150.0;
            ship.target = Some(merchant);
        }

        let scan = || {
            vec![Request::Keys(Command {
                scan: true,
                ..Default::default()
            })]
        };
        let events = run(&mut world, SCAN_STEPS as usize + 10, scan);
        for kind in [EventKind::ScanCargo, EventKind::ScanOutfits] {
            let scans: Vec<_> = events.iter().filter(|e| e.kind == kind).collect();
            assert_eq!(scans.len(), 1);
            assert_eq!(scans[0].actor, Some(flagship));
            assert_eq!(scans[0].target, merchant);
            assert_eq!(scans[0].target_government, guild);
        }
    }
}
