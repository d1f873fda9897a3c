//! Flotsam: cargo or outfits floating in space, waiting to be picked up

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::body::{Body, SpriteId};
use super::registry::{Expire, ShipId};
use super::ship::Cargo;
use crate::consts::{FLOTSAM_DRAG, FLOTSAM_LIFETIME};

/// What a flotsam carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    Commodity(String),
    Outfit(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flotsam {
    pub body: Body,
    pub payload: Payload,
    /// Units remaining
    pub count: u32,
    /// Cargo tons per unit
    pub unit_size: u32,
    /// Ship that dropped it (weak); it cannot collect its own flotsam
    pub source: Option<ShipId>,
    pub age: u32,
    pub lifetime: u32,
}

impl Flotsam {
    pub fn new(payload: Payload, count: u32, position: Vec2, velocity: Vec2) -> Self {
        let mut body = Body::new(position, velocity, 0.0, 4.0);
        body.sprite = SpriteId::default();
        Self {
            body,
            payload,
            count,
            unit_size: 1,
            source: None,
            age: 0,
            lifetime: FLOTSAM_LIFETIME,
        }
    }

    pub fn with_source(mut self, source: ShipId) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_unit_size(mut self, unit_size: u32) -> Self {
        self.unit_size = unit_size.max(1);
        self
    }

    /// Drift one step
    pub fn step(&mut self) {
        self.body.position += self.body.velocity;
        self.body.velocity *= FLOTSAM_DRAG;
        self.age += 1;
    }

    /// Move as many whole units as fit into `cargo`. Returns units moved.
    pub fn transfer_to(&mut self, cargo: &mut Cargo) -> u32 {
        let fits = cargo.free() / self.unit_size;
        let amount = self.count.min(fits);
        if amount == 0 {
            return 0;
        }
        cargo.add(&self.payload, amount, self.unit_size);
        self.count -= amount;
        amount
    }
}

impl Expire for Flotsam {
    fn should_be_removed(&self) -> bool {
        self.count == 0 || self.age >= self.lifetime
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ore(count: u32) -> Flotsam {
        Flotsam::new(Payload::Commodity("Iron".into()), count, Vec2::ZERO, Vec2::ZERO)
    }

    #[test]
    fn test_transfer_is_min_of_count_and_space() {
        let mut cargo = Cargo::new(3);
        let mut flotsam = ore(5);
        assert_eq!(flotsam.transfer_to(&mut cargo), 3);
        assert_eq!(cargo.free(), 0);
        assert_eq!(flotsam.count, 2);
        assert!(!flotsam.should_be_removed());
    }

    #[test]
    fn test_full_transfer_empties_flotsam() {
        let mut cargo = Cargo::new(10);
        let mut flotsam = ore(4);
        assert_eq!(flotsam.transfer_to(&mut cargo), 4);
        assert_eq!(cargo.free(), 6);
        assert!(flotsam.should_be_removed());
    }

    #[test]
    fn test_no_space_moves_nothing() {
        let mut cargo = Cargo::new(1);
        let mut flotsam = ore(4).with_unit_size(2);
        assert_eq!(flotsam.transfer_to(&mut cargo), 0);
        assert_eq!(flotsam.count, 4);
    }

    #[test]
    fn test_flotsam_drifts_and_ages_out() {
        let mut flotsam = ore(1);
        flotsam.body.velocity = Vec2::new(2.0, 0.0);
        flotsam.lifetime = 2;
        flotsam.step();
        flotsam.step();
        assert!(flotsam.body.position.x > 3.9);
        assert!(flotsam.should_be_removed());
    }
}
