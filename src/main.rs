//! Shipsim demo driver
//!
//! Builds a two-system map with a pirate fleet, runs the engine for a fixed
//! number of steps and logs what happens. Usage:
//!
//! ```text
//! shipsim [STEPS] [SETTINGS.json]
//! ```

use std::sync::Arc;

use glam::Vec2;

use shipsim::sim::system::AsteroidSpec;
use shipsim::sim::{
    Attributes, Command, FleetSpec, Hardpoint, Message, Planet, Politics, Ship, Skirmisher,
    StarMap, StarSystem, Weapon, World,
};
use shipsim::{Engine, EngineError, EngineSettings};

const DEFAULT_STEPS: u64 = 600;

fn main() {
    env_logger::init();
    log::info!("Shipsim (native) starting...");

    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), EngineError> {
    let mut args = std::env::args().skip(1);
    let steps = args
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_STEPS);
    let settings = match args.next() {
        Some(path) => EngineSettings::load(path)?,
        None => EngineSettings::default(),
    };

    let mut politics = Politics::new("Merchant Guild");
    let pirates = politics.add("Pirates");
    politics.set_hostile(politics.player(), pirates, true);

    let blaster = Arc::new(Weapon {
        name: "Blaster".into(),
        velocity: 12.0,
        lifetime: 50,
        reload: 12,
        shield_damage: 8.0,
        hull_damage: 6.0,
        firing_energy: 1.0,
        firing_heat: 2.0,
        ..Default::default()
    });
    let armed = |name: &str, government| {
        let attributes = Attributes {
            max_shields: 60.0,
            shield_regen: 0.1,
            cargo_space: 20,
            ..Default::default()
        };
        let mut ship = Ship::new(name, "Sparrow", government, attributes);
        ship.weapons.push(Hardpoint::new(Arc::clone(&blaster)));
        ship
    };

    let mut map = StarMap::default();
    let mut sol = StarSystem::new("Sol", Vec2::ZERO);
    sol.planets.push(Planet::new("Earth", Vec2::new(600.0, 0.0), 120.0));
    sol.asteroids.push(AsteroidSpec {
        sprite: Default::default(),
        count: 40,
        energy: 0.5,
        payload: Some("Iron".into()),
        hull: 30.0,
    });
    sol.fleets.push(FleetSpec {
        government: pirates,
        ships: vec![armed("Raider", pirates), armed("Raider", pirates)],
        period: 900,
    });
    let sol = map.add(sol);
    let alpha = map.add(StarSystem::new("Alpha Centauri", Vec2::new(300.0, 200.0)));
    map.link(sol, alpha);
    map.validate()?;

    let player = politics.player();
    let mut world = World::new(settings, map, politics);
    world.place(
        vec![armed("Constance", player), armed("Escort", player)],
        vec![vec![armed("Marauder", pirates)]],
        sol,
        Some(0),
    );

    let engine = Engine::new(world, Box::new(Skirmisher::new()))?;
    engine.set_keys(Command {
        thrust: 1.0,
        ..Default::default()
    });

    for _ in 0..steps {
        engine.wait();
        engine.advance();
        let frame = engine.frame();
        for event in &frame.events {
            log::info!(
                "step {}: {:?} {:?} -> {:?}",
                frame.step,
                event.kind,
                event.actor,
                event.target
            );
        }
        for message in &frame.messages {
            if let Message::PleaForHelp { from, .. } = message {
                log::info!("step {}: {from:?} asks for help", frame.step);
            }
        }
        if frame.hostiles_alarm {
            log::info!("step {}: hostiles in the area", frame.step);
        }
    }

    engine.wait();
    let load = engine.frame().load;
    let world = engine.shutdown()?;
    log::info!(
        "ran {} steps, {} ships left, load {:.1}%",
        world.step,
        world.ships.len(),
        load * 100.0
    );
    Ok(())
}
