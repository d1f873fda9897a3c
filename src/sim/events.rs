//! Discrete occurrences produced during a step
//!
//! Events are collected while the worker computes a step and handed to the
//! frame at the end of it, so the presenter sees a complete list per step.

use serde::{Deserialize, Serialize};

use super::government::GovernmentId;
use super::registry::ShipId;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// The flagship finished arriving in a new system
    Jump,
    /// The target was destroyed (or finished exploding)
    Destroy,
    /// The target was disabled by damage
    Disable,
    /// A non-enemy target was damaged
    Provoke,
    /// The actor boarded a hostile target
    Board,
    /// The actor boarded a friendly target to help it
    Assist,
    /// The actor finished scanning the target's cargo
    ScanCargo,
    /// The actor finished scanning the target's outfits
    ScanOutfits,
}

/// Immutable record of one occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipEvent {
    /// Government responsible, if any (none for self-inflicted removal)
    pub actor_government: Option<GovernmentId>,
    /// Ship responsible, when it was a ship and not a projectile
    pub actor: Option<ShipId>,
    pub target: ShipId,
    pub target_government: GovernmentId,
    pub kind: EventKind,
}

impl ShipEvent {
    pub fn new(
        actor_government: Option<GovernmentId>,
        actor: Option<ShipId>,
        target: ShipId,
        target_government: GovernmentId,
        kind: EventKind,
    ) -> Self {
        Self {
            actor_government,
            actor,
            target,
            target_government,
            kind,
        }
    }
}

/// Events gathered during the step currently being computed
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    pending: Vec<ShipEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: ShipEvent) {
        log::debug!(
            "event {:?} target {:?} by {:?}",
            event.kind,
            event.target,
            event.actor_government
        );
        self.pending.push(event);
    }

    /// Events recorded so far this step
    pub fn pending(&self) -> &[ShipEvent] {
        &self.pending
    }

    /// Hand the finished list over, leaving the queue empty for the next step
    pub fn swap_out(&mut self, published: &mut Vec<ShipEvent>) {
        published.clear();
        std::mem::swap(&mut self.pending, published);
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
