//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (registry insertion order)
//! - No threading, rendering or platform dependencies

pub mod asteroid;
pub mod body;
pub mod collision;
pub mod events;
pub mod flotsam;
pub mod frame;
pub mod government;
pub mod pilot;
pub mod projectile;
pub mod registry;
pub mod ship;
pub mod spatial;
pub mod state;
pub mod system;
pub mod tick;
pub mod visual;
pub mod weapon;

pub use body::{Body, SpriteId};
pub use events::{EventKind, ShipEvent};
pub use frame::{DrawKind, Drawable, Frame, Message, RadarKind};
pub use government::{GovernmentId, Politics};
pub use pilot::{Idle, Pilot, Skirmisher};
pub use registry::{ShipId, ShipRegistry};
pub use ship::{Attributes, Command, Ship};
pub use state::World;
pub use system::{FleetSpec, Planet, StarMap, StarSystem, SystemId};
pub use tick::{Request, tick};
pub use weapon::{Hardpoint, Weapon};
