//! The decision-making collaborator
//!
//! A [`Pilot`] is asked once per ship per step for a [`Command`]. It sets
//! intent only; physics is applied by the ship itself.

use glam::Vec2;

use super::government::Politics;
use super::registry::{ShipId, ShipRegistry};
use super::ship::{Command, Ship};
use crate::normalize_angle;

pub trait Pilot: Send {
    /// Intent for `ship` this step
    fn decide(&mut self, id: ShipId, ship: &Ship, ships: &ShipRegistry, politics: &Politics) -> Command;

    /// The player ordered their escorts to attack `target`
    fn issue_ship_target(&mut self, _target: ShipId) {}

    /// The player ordered their escorts to move to `position`
    fn issue_move_target(&mut self, _position: Vec2) {}

    /// Forget everything tied to the previous system
    fn clean(&mut self) {}
}

/// Does nothing: every ship keeps its course
#[derive(Debug, Default, Clone, Copy)]
pub struct Idle;

impl Pilot for Idle {
    fn decide(&mut self, _: ShipId, _: &Ship, _: &ShipRegistry, _: &Politics) -> Command {
        Command::default()
    }
}

/// Turn toward the nearest enemy in the same system and fire once lined up.
/// Disabled enemies are boarded instead.
#[derive(Debug, Default, Clone)]
pub struct Skirmisher {
    /// Ship the player asked escorts to attack
    ordered_target: Option<ShipId>,
    move_target: Option<Vec2>,
}

impl Skirmisher {
    pub fn new() -> Self {
        Self::default()
    }

    fn nearest_enemy(ship: &Ship, ships: &ShipRegistry, politics: &Politics) -> Option<(ShipId, Vec2)> {
        ships
            .iter()
            .filter(|(_, other)| {
                other.system == ship.system
                    && other.is_targetable()
                    && politics.is_enemy(ship.government, other.government)
            })
            .map(|(id, other)| (id, other.body.position))
            .min_by(|a, b| {
                let da = a.1.distance_squared(ship.body.position);
                let db = b.1.distance_squared(ship.body.position);
                da.total_cmp(&db)
            })
    }

    fn steer(ship: &Ship, to: Vec2, command: &mut Command) -> f32 {
        let offset = to - ship.body.position;
        let desired = offset.y.atan2(offset.x);
        let delta = normalize_angle(desired - ship.body.facing);
        command.turn = (delta / ship.attributes.turn.max(1e-4)).clamp(-1.0, 1.0);
        delta.abs()
    }
}

impl Pilot for Skirmisher {
    fn decide(&mut self, _: ShipId, ship: &Ship, ships: &ShipRegistry, politics: &Politics) -> Command {
        let mut command = Command::default();
        if ship.cannot_act() {
            return command;
        }

        // Keep a disabled target: board it
        if let Some(target) = ship.target.and_then(|id| ships.get(id).map(|t| (id, t)))
            && target.1.is_disabled()
            && !target.1.is_destroyed()
        {
            let error = Self::steer(ship, target.1.body.position, &mut command);
            if error < 0.5 {
                let gap = target.1.body.position.distance(ship.body.position);
                let closing = (ship.body.velocity - target.1.body.velocity).length();
                command.thrust = if gap > 100.0 { 1.0 } else if closing > 0.5 { -1.0 } else { 0.2 };
            }
            command.board = true;
            return command;
        }

        let wanted = if ship.is_yours {
            self.ordered_target
                .filter(|id| ships.get(*id).is_some_and(Ship::is_targetable))
                .and_then(|id| ships.get(id).map(|t| (id, t.body.position)))
                .or_else(|| Self::nearest_enemy(ship, ships, politics))
        } else {
            Self::nearest_enemy(ship, ships, politics)
        };

        match wanted {
            Some((id, position)) => {
                if ship.target != Some(id) {
                    command.target = Some(id);
                }
                let error = Self::steer(ship, position, &mut command);
                let gap = position.distance(ship.body.position);
                command.thrust = if gap > 300.0 { 1.0 } else { 0.0 };
                command.fire = error < 0.2;
                command.launch = true;
                command.scan = true;
            }
            None => {
                if let Some(to) = self.move_target {
                    let error = Self::steer(ship, to, &mut command);
                    if error < 0.3 && to.distance(ship.body.position) > 50.0 {
                        command.thrust = 1.0;
                    }
                }
            }
        }
        command
    }

    fn issue_ship_target(&mut self, target: ShipId) {
        self.ordered_target = Some(target);
        self.move_target = None;
    }

    fn issue_move_target(&mut self, position: Vec2) {
        self.move_target = Some(position);
        self.ordered_target = None;
    }

    fn clean(&mut self) {
        self.ordered_target = None;
        self.move_target = None;
    }
}
