//! Entity registries and their prune/append lifecycle
//!
//! Projectiles, flotsam and visuals are owned outright by plain vectors and
//! pruned by compacting in place. Ships live in a generational arena so that
//! parent/target/source links can hold a [`ShipId`] and see the ship vanish
//! instead of dangling; their registry order is kept in a separate list.

use slotmap::{SlotMap, new_key_type};

use super::flotsam::Flotsam;
use super::projectile::Projectile;
use super::ship::Ship;
use super::visual::Visual;

new_key_type! {
    /// Stable handle for a ship. Resolves to nothing once the ship is pruned.
    pub struct ShipId;
}

/// Anything a registry can drop at the end of its life
pub trait Expire {
    fn should_be_removed(&self) -> bool;
}

/// Remove expired objects, keeping the survivors in order.
///
/// One forward pass; each survivor moves at most once.
pub fn prune<T: Expire>(objects: &mut Vec<T>) -> usize {
    let before = objects.len();
    objects.retain(|object| !object.should_be_removed());
    before - objects.len()
}

/// Move a batch of newly spawned objects onto the end of a registry.
pub fn append<T>(objects: &mut Vec<T>, added: &mut Vec<T>) {
    objects.append(added);
}

/// Objects created during a step, appended to the registries once the step's
/// collision phase is over
#[derive(Debug, Default)]
pub struct Spawns {
    pub ships: Vec<Ship>,
    /// Fleets entering together; the first ship of each leads the rest
    pub fleets: Vec<Vec<Ship>>,
    pub projectiles: Vec<Projectile>,
    pub flotsam: Vec<Flotsam>,
    pub visuals: Vec<Visual>,
}

impl Spawns {
    pub fn is_empty(&self) -> bool {
        self.ships.is_empty()
            && self.fleets.is_empty()
            && self.projectiles.is_empty()
            && self.flotsam.is_empty()
            && self.visuals.is_empty()
    }
}

/// Ordered arena of the ships in play
#[derive(Debug, Clone, Default)]
pub struct ShipRegistry {
    ships: SlotMap<ShipId, Ship>,
    order: Vec<ShipId>,
}

impl ShipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a ship at the end of the registry order
    pub fn insert(&mut self, ship: Ship) -> ShipId {
        let id = self.ships.insert(ship);
        self.order.push(id);
        id
    }

    /// Move a batch of new ships in, clearing the batch
    pub fn append(&mut self, added: &mut Vec<Ship>) -> Vec<ShipId> {
        added.drain(..).map(|ship| self.insert(ship)).collect()
    }

    /// Insert a fleet; every ship after the first takes the first as parent
    pub fn insert_fleet(&mut self, fleet: Vec<Ship>) -> Vec<ShipId> {
        let mut ids = Vec::with_capacity(fleet.len());
        for mut ship in fleet {
            if let Some(&leader) = ids.first() {
                ship.parent = Some(leader);
            }
            ids.push(self.insert(ship));
        }
        ids
    }

    /// Unlink every ship that should be removed.
    ///
    /// Removed ids stop resolving; other ships' links to them become absent.
    pub fn prune(&mut self) -> Vec<ShipId> {
        let ships = &mut self.ships;
        let mut removed = Vec::new();
        self.order.retain(|&id| {
            let gone = ships.get(id).is_none_or(|ship| ship.should_be_removed());
            if gone {
                ships.remove(id);
                removed.push(id);
            }
            !gone
        });
        removed
    }

    /// Remove one ship immediately (used when a ship docks into a carrier)
    pub fn take(&mut self, id: ShipId) -> Option<Ship> {
        let ship = self.ships.remove(id)?;
        self.order.retain(|&other| other != id);
        Some(ship)
    }

    pub fn get(&self, id: ShipId) -> Option<&Ship> {
        self.ships.get(id)
    }

    pub fn get_mut(&mut self, id: ShipId) -> Option<&mut Ship> {
        self.ships.get_mut(id)
    }

    /// Two distinct ships at once
    pub fn get_pair_mut(&mut self, a: ShipId, b: ShipId) -> Option<[&mut Ship; 2]> {
        self.ships.get_disjoint_mut([a, b])
    }

    pub fn contains(&self, id: ShipId) -> bool {
        self.ships.contains_key(id)
    }

    /// Ship ids in registry order
    pub fn ids(&self) -> &[ShipId] {
        &self.order
    }

    /// Ships in registry order
    pub fn iter(&self) -> impl Iterator<Item = (ShipId, &Ship)> {
        self.order
            .iter()
            .filter_map(|&id| self.ships.get(id).map(|ship| (id, ship)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.ships.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Spark {
        id: u32,
        dead: bool,
    }

    impl Expire for Spark {
        fn should_be_removed(&self) -> bool {
            self.dead
        }
    }

    #[test]
    fn test_prune_keeps_order() {
        let mut sparks: Vec<Spark> = (0..6)
            .map(|id| Spark {
                id,
                dead: id % 2 == 1,
            })
            .collect();
        assert_eq!(prune(&mut sparks), 3);
        let ids: Vec<u32> = sparks.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![0, 2, 4]);
    }

    #[test]
    fn test_append_moves_and_clears() {
        let mut live = vec![Spark { id: 1, dead: false }];
        let mut added = vec![Spark { id: 2, dead: false }, Spark { id: 3, dead: false }];
        append(&mut live, &mut added);
        assert!(added.is_empty());
        assert_eq!(live.len(), 3);
        assert_eq!(live[2].id, 3);
    }

    #[test]
    fn test_ship_prune_unlinks_and_ids_go_stale() {
        let mut registry = ShipRegistry::new();
        let a = registry.insert(Ship::default());
        let b = registry.insert(Ship::default());
        let c = registry.insert(Ship::default());
        if let Some(ship) = registry.get_mut(b) {
            ship.mark_removed();
        }

        let removed = registry.prune();
        assert_eq!(removed, vec![b]);
        assert_eq!(registry.ids(), &[a, c]);
        // Weak link resolves to absent, not to another ship
        assert!(registry.get(b).is_none());

        // A new ship never reuses the stale handle
        let d = registry.insert(Ship::default());
        assert_ne!(d, b);
        assert!(registry.get(b).is_none());
    }

    #[test]
    fn test_fleet_members_follow_leader() {
        let mut registry = ShipRegistry::new();
        let ids = registry.insert_fleet(vec![Ship::default(), Ship::default(), Ship::default()]);
        assert_eq!(ids.len(), 3);
        assert_eq!(registry.get(ids[0]).and_then(|s| s.parent), None);
        assert_eq!(registry.get(ids[2]).and_then(|s| s.parent), Some(ids[0]));
    }

    #[test]
    fn test_pair_mut_rejects_same_id() {
        let mut registry = ShipRegistry::new();
        let a = registry.insert(Ship::default());
        let b = registry.insert(Ship::default());
        assert!(registry.get_pair_mut(a, b).is_some());
        assert!(registry.get_pair_mut(a, a).is_none());
    }

    proptest! {
        #[test]
        fn prop_prune_preserves_survivor_order(flags in prop::collection::vec(any::<bool>(), 0..64)) {
            let mut sparks: Vec<Spark> = flags
                .iter()
                .enumerate()
                .map(|(i, &dead)| Spark { id: i as u32, dead })
                .collect();
            let expected: Vec<u32> = sparks.iter().filter(|s| !s.dead).map(|s| s.id).collect();
            let removed = prune(&mut sparks);
            prop_assert_eq!(removed, flags.iter().filter(|&&d| d).count());
            prop_assert_eq!(sparks.iter().map(|s| s.id).collect::<Vec<_>>(), expected);
        }
    }
}
