use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies an agent (combat unit) owned by the engine.
    pub struct AgentId;
}

/// Index of a node inside one spatial graph. Equal to its position in the
/// graph's node list, so it is only meaningful together with a [`GridId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Opaque attribution for modifiers. Every modifier applied by one buff or
/// debuff instance shares a source, so the whole group can be removed at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModifierSource(pub u64);

/// Identifies a registered unit template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateId(pub u32);

/// The two sides of a fight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Player,
    Enemy,
}

impl Team {
    /// The opposing team.
    pub fn opponent(self) -> Team {
        match self {
            Team::Player => Team::Enemy,
            Team::Enemy => Team::Player,
        }
    }
}

/// Which graph of the board a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridId {
    /// The shared battlefield.
    Battle,
    /// A team's reserve bench.
    Bench(Team),
}

/// A fully qualified tile: grid plus node index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileRef {
    pub grid: GridId,
    pub node: NodeIndex,
}

impl TileRef {
    pub fn new(grid: GridId, node: NodeIndex) -> Self {
        Self { grid, node }
    }

    pub fn battle(node: NodeIndex) -> Self {
        Self::new(GridId::Battle, node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_index_ordering() {
        assert!(NodeIndex(0) < NodeIndex(1));
        assert_eq!(NodeIndex(7).as_usize(), 7);
    }

    #[test]
    fn opponent_is_symmetric() {
        assert_eq!(Team::Player.opponent(), Team::Enemy);
        assert_eq!(Team::Enemy.opponent(), Team::Player);
    }

    #[test]
    fn ids_are_hashable() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(TileRef::battle(NodeIndex(3)), "center");
        map.insert(TileRef::new(GridId::Bench(Team::Enemy), NodeIndex(3)), "bench");
        assert_eq!(map[&TileRef::battle(NodeIndex(3))], "center");
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn team_serializes_snake_case() {
        let json = serde_json::to_string(&GridId::Bench(Team::Player)).unwrap();
        assert_eq!(json, r#"{"bench":"player"}"#);
    }
}
