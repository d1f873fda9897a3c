//! Static content: star systems, planets, asteroid belts and fleets
//!
//! Read-only during a step. Loaded from JSON or built in code.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::body::SpriteId;
use super::government::GovernmentId;
use super::ship::Ship;
use crate::error::EngineError;

/// Index of a system in the [`StarMap`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SystemId(pub u16);

/// Ships that enter together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSpec {
    pub government: GovernmentId,
    /// Ships in the fleet; the first is its flagship
    pub ships: Vec<Ship>,
    /// Average steps between arrivals (0 = never arrives on its own)
    #[serde(default)]
    pub period: u32,
}

impl FleetSpec {
    /// Sum of ship cost, used to weigh fleets against each other
    pub fn strength(&self) -> f32 {
        self.ships.iter().map(|ship| ship.attributes.cost).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Planet {
    pub name: String,
    pub position: Vec2,
    pub radius: f32,
    #[serde(default)]
    pub sprite: SpriteId,
    /// Owner; `None` for uninhabited bodies (never refuses landing)
    #[serde(default)]
    pub government: Option<GovernmentId>,
    /// Launched once per visit when a hostile ship comes within `defense_range`
    #[serde(default)]
    pub defense: Option<FleetSpec>,
    #[serde(default)]
    pub defense_range: f32,
}

impl Planet {
    pub fn new(name: &str, position: Vec2, radius: f32) -> Self {
        Self {
            name: name.to_string(),
            position,
            radius,
            sprite: SpriteId::default(),
            government: None,
            defense: None,
            defense_range: 0.0,
        }
    }
}

/// One asteroid belt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsteroidSpec {
    #[serde(default)]
    pub sprite: SpriteId,
    pub count: u32,
    /// Typical drift speed
    pub energy: f32,
    /// Mineable rocks carry this commodity; plain rocks carry none
    #[serde(default)]
    pub payload: Option<String>,
    /// Hull of mineable rocks
    #[serde(default)]
    pub hull: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StarSystem {
    pub name: String,
    /// Position on the galaxy map (used for arrival direction)
    pub position: Vec2,
    #[serde(default)]
    pub government: Option<GovernmentId>,
    #[serde(default)]
    pub planets: Vec<Planet>,
    #[serde(default)]
    pub asteroids: Vec<AsteroidSpec>,
    #[serde(default)]
    pub fleets: Vec<FleetSpec>,
    /// Hyperspace lanes
    #[serde(default)]
    pub links: Vec<SystemId>,
}

impl StarSystem {
    pub fn new(name: &str, position: Vec2) -> Self {
        Self {
            name: name.to_string(),
            position,
            government: None,
            planets: Vec::new(),
            asteroids: Vec::new(),
            fleets: Vec::new(),
            links: Vec::new(),
        }
    }

    pub fn is_linked(&self, to: SystemId) -> bool {
        self.links.contains(&to)
    }
}

/// Every system and the lanes between them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StarMap {
    pub systems: Vec<StarSystem>,
    /// Jump drives reach any system this close on the galaxy map
    #[serde(default = "default_jump_range")]
    pub jump_range: f32,
}

fn default_jump_range() -> f32 {
    100.0
}

impl Default for StarMap {
    fn default() -> Self {
        Self {
            systems: Vec::new(),
            jump_range: default_jump_range(),
        }
    }
}

impl StarMap {
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let map: StarMap = serde_json::from_str(json)?;
        map.validate()?;
        Ok(map)
    }

    /// Check that every link and government refers to something
    pub fn validate(&self) -> Result<(), EngineError> {
        let count = self.systems.len();
        for system in &self.systems {
            if system.links.iter().any(|link| link.0 as usize >= count) {
                return Err(EngineError::InvalidSettings("star map link to unknown system"));
            }
            if system.planets.iter().any(|planet| planet.radius <= 0.0) {
                return Err(EngineError::InvalidSettings("planet radius must be positive"));
            }
        }
        Ok(())
    }

    /// Add a system, returning its id
    pub fn add(&mut self, system: StarSystem) -> SystemId {
        self.systems.push(system);
        SystemId((self.systems.len() - 1) as u16)
    }

    /// Add a two-way hyperspace lane
    pub fn link(&mut self, a: SystemId, b: SystemId) {
        if a == b {
            return;
        }
        if let Some(system) = self.systems.get_mut(a.0 as usize)
            && !system.links.contains(&b)
        {
            system.links.push(b);
        }
        if let Some(system) = self.systems.get_mut(b.0 as usize)
            && !system.links.contains(&a)
        {
            system.links.push(a);
        }
    }

    pub fn system(&self, id: SystemId) -> Option<&StarSystem> {
        self.systems.get(id.0 as usize)
    }

    /// Whether a ship can jump from `from` to `to`
    pub fn can_travel(&self, from: SystemId, to: SystemId, jump_drive: bool) -> bool {
        let (Some(a), Some(b)) = (self.system(from), self.system(to)) else {
            return false;
        };
        if from == to {
            return false;
        }
        a.is_linked(to) || (jump_drive && a.position.distance(b.position) <= self.jump_range)
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}
