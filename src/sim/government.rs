//! Governments (factions) and who is hostile to whom

use serde::{Deserialize, Serialize};

/// Index of a government in the [`Politics`] table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GovernmentId(pub u16);

/// A faction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Government {
    pub name: String,
}

/// Government table plus the symmetric hostility relation.
///
/// Read-only during a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Politics {
    governments: Vec<Government>,
    /// Row-major hostility matrix
    hostile: Vec<bool>,
    player: GovernmentId,
}

impl Politics {
    /// Create a table containing only the player's government
    pub fn new(player_name: &str) -> Self {
        Self {
            governments: vec![Government {
                name: player_name.to_string(),
            }],
            hostile: vec![false],
            player: GovernmentId(0),
        }
    }

    /// Add a government, returning its id
    pub fn add(&mut self, name: &str) -> GovernmentId {
        let old = self.governments.len();
        let new = old + 1;
        let mut hostile = vec![false; new * new];
        for a in 0..old {
            for b in 0..old {
                hostile[a * new + b] = self.hostile[a * old + b];
            }
        }
        self.hostile = hostile;
        self.governments.push(Government {
            name: name.to_string(),
        });
        GovernmentId(old as u16)
    }

    /// Mark two governments as enemies (or not)
    pub fn set_hostile(&mut self, a: GovernmentId, b: GovernmentId, hostile: bool) {
        if a == b {
            return;
        }
        let n = self.governments.len();
        let (a, b) = (a.0 as usize, b.0 as usize);
        if a < n && b < n {
            self.hostile[a * n + b] = hostile;
            self.hostile[b * n + a] = hostile;
        }
    }

    /// Whether `a` and `b` are at war. Unknown ids are never hostile.
    pub fn is_enemy(&self, a: GovernmentId, b: GovernmentId) -> bool {
        let n = self.governments.len();
        let (a, b) = (a.0 as usize, b.0 as usize);
        a < n && b < n && self.hostile[a * n + b]
    }

    /// Whether `gov` is hostile to the player
    pub fn is_player_enemy(&self, gov: GovernmentId) -> bool {
        self.is_enemy(self.player, gov)
    }

    pub fn player(&self) -> GovernmentId {
        self.player
    }

    pub fn is_player(&self, gov: GovernmentId) -> bool {
        gov == self.player
    }

    pub fn get(&self, gov: GovernmentId) -> Option<&Government> {
        self.governments.get(gov.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.governments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.governments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostility_is_symmetric() {
        let mut politics = Politics::new("Escort");
        let pirates = politics.add("Pirate");
        let merchants = politics.add("Merchant");
        politics.set_hostile(pirates, politics.player(), true);
        politics.set_hostile(pirates, merchants, true);

        assert!(politics.is_enemy(politics.player(), pirates));
        assert!(politics.is_enemy(merchants, pirates));
        assert!(!politics.is_enemy(merchants, politics.player()));
        assert!(politics.is_player_enemy(pirates));
    }

    #[test]
    fn test_adding_keeps_relations() {
        let mut politics = Politics::new("Escort");
        let pirates = politics.add("Pirate");
        politics.set_hostile(pirates, politics.player(), true);
        let later = politics.add("Republic");
        assert!(politics.is_player_enemy(pirates));
        assert!(!politics.is_enemy(later, pirates));
        assert_eq!(politics.get(later).map(|g| g.name.as_str()), Some("Republic"));
    }

    #[test]
    fn test_self_never_hostile() {
        let mut politics = Politics::new("Escort");
        let player = politics.player();
        politics.set_hostile(player, player, true);
        assert!(!politics.is_enemy(player, player));
    }
}
