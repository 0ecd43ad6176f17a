//! Data models for recipes and crafting trees

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Units contributed by one bulk pack.
pub const PACK_SIZE: u64 = 64;

/// Currency item. Never looked up, always terminal, always priced at [`CURRENCY_PRICE`].
pub const CURRENCY_ID: &str = "SKYBLOCK_COIN";
pub const CURRENCY_NAME: &str = "Skyblock Coins";
pub const CURRENCY_PRICE: f64 = 1.0;

/// Canonical form of an item identifier.
pub fn normalize_item_id(id: &str) -> String {
    id.trim().to_uppercase()
}

/// How a [`RecipeInfo`] was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Record found with a usable recipe (or with none, making it terminal)
    Found,
    /// Record marks itself as a base/vanilla good
    Base,
    /// The fixed currency item
    Currency,
    /// Lookup returned "not found"
    NotFound,
    /// Record present but missing required fields
    Malformed,
    /// Lookup itself failed
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    #[serde(rename = "internalName")]
    pub item_id: String,
    #[serde(rename = "name")]
    pub display_name: String,
    /// Units consumed by one craft
    #[serde(rename = "quantity")]
    pub quantity: u64,
}

/// Normalized recipe for one item
#[derive(Debug, Clone)]
pub struct RecipeInfo {
    pub item_id: String,
    pub display_name: String,
    pub ingredients: Vec<Ingredient>,
    pub yield_per_craft: u64,
    pub resolution: Resolution,
}

impl RecipeInfo {
    /// Terminal recipe used for raw goods and for every degraded lookup.
    pub fn terminal(item_id: String, display_name: String, resolution: Resolution) -> Self {
        Self {
            item_id,
            display_name,
            ingredients: Vec::new(),
            yield_per_craft: 1,
            resolution,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.ingredients.is_empty()
    }

    pub fn is_base_good(&self) -> bool {
        matches!(self.resolution, Resolution::Base | Resolution::Currency)
    }
}

/// Summary row of the local recipe database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemEntry {
    pub id: String,
    pub display_name: String,
    pub vanilla: bool,
    pub craftable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// One occurrence of an item in a crafting tree.
///
/// Identical items in different branches get separate nodes, each with its
/// own owned/completed state. Field names on the wire match the snapshot
/// files written by earlier releases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CraftNode {
    #[serde(rename = "nodeId")]
    pub id: NodeId,
    #[serde(rename = "parentId", default)]
    pub parent_id: Option<NodeId>,
    #[serde(rename = "internalName")]
    pub item_id: String,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(rename = "quantityNeeded")]
    pub quantity_needed: u64,
    #[serde(rename = "quantityProducedPerCraft")]
    pub yield_per_craft: u64,
    #[serde(rename = "numCraftsRequired")]
    pub crafts_required: u64,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub children: Vec<CraftNode>,
    #[serde(rename = "currentQuantity", default)]
    pub owned: u64,
    #[serde(rename = "packsQuantity", default)]
    pub bulk_packs: u64,
    #[serde(default)]
    pub completed: bool,
    #[serde(rename = "isCollapsed", default)]
    pub collapsed: bool,
}

impl CraftNode {
    /// Create a childless node for `recipe`. Terminal recipes produce one
    /// unit per "craft" so the crafts invariant holds for leaves too.
    pub fn new(recipe: &RecipeInfo, quantity_needed: u64, parent_id: Option<NodeId>) -> Self {
        let yield_per_craft = recipe.yield_per_craft.max(1);
        Self {
            id: NodeId::new(),
            parent_id,
            item_id: recipe.item_id.clone(),
            display_name: recipe.display_name.clone(),
            quantity_needed,
            yield_per_craft,
            crafts_required: quantity_needed.div_ceil(yield_per_craft),
            ingredients: recipe.ingredients.clone(),
            children: Vec::new(),
            owned: 0,
            bulk_packs: 0,
            completed: false,
            collapsed: false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.ingredients.is_empty()
    }

    /// Owned units including bulk packs
    pub fn have(&self) -> u64 {
        self.owned
            .saturating_add(self.bulk_packs.saturating_mul(PACK_SIZE))
    }

    pub fn child_for(&self, item_id: &str) -> Option<&CraftNode> {
        self.children.iter().find(|c| c.item_id == item_id)
    }

    /// Depth-first pre-order walk over this node and its descendants.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a CraftNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_| count += 1);
        count
    }

    /// Mark this node and its whole subtree completed (or not).
    ///
    /// Completing fills `owned` up to the need and drops packs; reopening
    /// resets both to zero.
    pub fn set_completion(&mut self, completed: bool) {
        self.completed = completed;
        self.owned = if completed { self.quantity_needed } else { 0 };
        self.bulk_packs = 0;
        for child in &mut self.children {
            child.set_completion(completed);
        }
    }

    /// Set owned units, clamped at zero. No cascade.
    pub fn set_owned(&mut self, owned: i64) {
        self.owned = owned.max(0) as u64;
    }

    /// Set owned bulk packs, clamped at zero. No cascade.
    pub fn set_bulk_packs(&mut self, packs: i64) {
        self.bulk_packs = packs.max(0) as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(yield_per_craft: u64, ingredients: &[(&str, u64)]) -> RecipeInfo {
        RecipeInfo {
            item_id: "WIDGET".into(),
            display_name: "Widget".into(),
            ingredients: ingredients
                .iter()
                .map(|(id, q)| Ingredient {
                    item_id: id.to_string(),
                    display_name: id.to_string(),
                    quantity: *q,
                })
                .collect(),
            yield_per_craft,
            resolution: Resolution::Found,
        }
    }

    #[test]
    fn crafts_round_up() {
        let node = CraftNode::new(&recipe(4, &[("IRON", 1)]), 9, None);
        assert_eq!(node.crafts_required, 3);
        let node = CraftNode::new(&recipe(4, &[("IRON", 1)]), 8, None);
        assert_eq!(node.crafts_required, 2);
    }

    #[test]
    fn terminal_nodes_craft_one_per_unit() {
        let leaf = RecipeInfo::terminal("IRON".into(), "Iron".into(), Resolution::Found);
        let node = CraftNode::new(&leaf, 17, None);
        assert!(node.is_terminal());
        assert_eq!(node.yield_per_craft, 1);
        assert_eq!(node.crafts_required, 17);
    }

    #[test]
    fn have_counts_packs() {
        let mut node = CraftNode::new(&recipe(1, &[]), 200, None);
        node.owned = 5;
        node.bulk_packs = 2;
        assert_eq!(node.have(), 5 + 2 * PACK_SIZE);
    }

    #[test]
    fn completion_cascades_through_subtree() {
        let mut root = CraftNode::new(&recipe(1, &[("IRON", 2)]), 3, None);
        let mut child = CraftNode::new(&RecipeInfo::terminal("IRON".into(), "Iron".into(), Resolution::Found), 6, Some(root.id));
        child.bulk_packs = 2;
        root.children.push(child);

        root.set_completion(true);
        assert!(root.completed && root.children[0].completed);
        assert_eq!(root.owned, 3);
        assert_eq!(root.children[0].owned, 6);
        assert_eq!(root.children[0].bulk_packs, 0);

        root.set_completion(false);
        assert!(!root.children[0].completed);
        assert_eq!(root.children[0].owned, 0);
    }

    #[test]
    fn owned_and_packs_clamp_at_zero() {
        let mut node = CraftNode::new(&recipe(1, &[]), 3, None);
        node.set_owned(-4);
        node.set_bulk_packs(-1);
        assert_eq!((node.owned, node.bulk_packs), (0, 0));
        node.set_owned(7);
        node.set_bulk_packs(2);
        assert_eq!((node.owned, node.bulk_packs), (7, 2));
    }

    #[test]
    fn normalizes_ids() {
        assert_eq!(normalize_item_id("  enchanted_diamond "), "ENCHANTED_DIAMOND");
    }

    #[test]
    fn node_id_parses_back() {
        let id = NodeId::new();
        let parsed: NodeId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}
