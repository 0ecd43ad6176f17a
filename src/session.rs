//! Calculation session: the current tree, its index and user state
//!
//! All tree state lives here and is passed around explicitly. Every
//! operation runs to completion before the next, so no locking is needed.
//! A generation counter makes sure a build started before the latest
//! reset can never be installed.

use tracing::{debug, info};

use crate::calculator::{NetNeeds, compute_net_needs};
use crate::error::{CalcError, SnapshotError};
use crate::models::{CraftNode, NodeId, Resolution};
use crate::pricing::{CostReport, MarketData, PriceMode, price};
use crate::recipe::RecipeResolver;
use crate::snapshot::Snapshot;
use crate::source::RecipeSource;
use crate::tree::{BuiltTree, CraftTreeBuilder, NodeIndex};

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub label: String,
    pub quantity: u64,
}

#[derive(Debug, Default)]
pub struct Session {
    generation: u64,
    target: Option<Target>,
    root: Option<CraftNode>,
    index: NodeIndex,
    focus: Option<NodeId>,
    pub price_mode: PriceMode,
}

/// Parse a target quantity: a positive whole number.
pub fn parse_quantity(input: &str) -> Result<u64, CalcError> {
    match input.trim().parse::<i64>() {
        Ok(n) if n > 0 => Ok(n as u64),
        _ => Err(CalcError::InvalidQuantity(input.to_string())),
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    pub fn root(&self) -> Option<&CraftNode> {
        self.root.as_ref()
    }

    pub fn index(&self) -> &NodeIndex {
        &self.index
    }

    pub fn focus(&self) -> Option<NodeId> {
        self.focus
    }

    /// Drop the current tree and start a new generation. Builds tagged with
    /// an older generation are refused by [`Session::install`].
    pub fn begin_build(&mut self) -> u64 {
        self.target = None;
        self.root = None;
        self.index = NodeIndex::default();
        self.focus = None;
        self.generation += 1;
        self.generation
    }

    pub fn install(&mut self, target: Target, built: BuiltTree) -> Result<(), CalcError> {
        if built.generation != self.generation {
            return Err(CalcError::StaleBuild {
                build: built.generation,
                current: self.generation,
            });
        }
        self.target = Some(target);
        self.root = Some(built.root);
        self.index = built.index;
        self.focus = None;
        Ok(())
    }

    /// Validate the request, resolve the target and build its tree.
    ///
    /// Input errors are reported before any state changes. Once the target
    /// is being resolved the previous tree is already gone.
    pub async fn calculate<S: RecipeSource>(
        &mut self,
        resolver: &RecipeResolver<S>,
        item_name: &str,
        quantity: u64,
    ) -> Result<&CraftNode, CalcError> {
        let label = item_name.trim();
        if label.is_empty() {
            return Err(CalcError::EmptyItemName);
        }
        if quantity == 0 {
            return Err(CalcError::InvalidQuantity(quantity.to_string()));
        }

        let generation = self.begin_build();
        let target_id = resolver.names().resolve_target(label);
        debug!(input = label, item = %target_id, generation, "starting calculation");

        let recipe = resolver.resolve(&target_id).await;
        let found = !matches!(
            recipe.resolution,
            Resolution::NotFound | Resolution::Malformed | Resolution::Unavailable
        );
        if !found || recipe.item_id != target_id {
            return Err(CalcError::ItemNotFound(label.to_string()));
        }
        if recipe.is_terminal() && !recipe.is_base_good() {
            return Err(CalcError::NotCraftable(recipe.display_name));
        }

        let built = CraftTreeBuilder::new(resolver, generation)
            .build_from(&recipe, quantity)
            .await;
        self.install(
            Target {
                label: label.to_string(),
                quantity,
            },
            built,
        )?;
        self.root.as_ref().ok_or(CalcError::NoTree)
    }

    pub fn node(&self, id: NodeId) -> Result<&CraftNode, CalcError> {
        let root = self.root.as_ref().ok_or(CalcError::NoTree)?;
        self.index.get(root, id).ok_or(CalcError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut CraftNode, CalcError> {
        let root = self.root.as_mut().ok_or(CalcError::NoTree)?;
        self.index.get_mut(root, id).ok_or(CalcError::UnknownNode(id))
    }

    pub fn set_completion(&mut self, id: NodeId, completed: bool) -> Result<(), CalcError> {
        self.node_mut(id)?.set_completion(completed);
        Ok(())
    }

    /// Flip completion of a node and its subtree.
    pub fn toggle_completion(&mut self, id: NodeId) -> Result<bool, CalcError> {
        let node = self.node_mut(id)?;
        let completed = !node.completed;
        node.set_completion(completed);
        Ok(completed)
    }

    pub fn set_owned(&mut self, id: NodeId, owned: i64) -> Result<(), CalcError> {
        self.node_mut(id)?.set_owned(owned);
        Ok(())
    }

    pub fn set_bulk_packs(&mut self, id: NodeId, packs: i64) -> Result<(), CalcError> {
        self.node_mut(id)?.set_bulk_packs(packs);
        Ok(())
    }

    pub fn toggle_collapsed(&mut self, id: NodeId) -> Result<bool, CalcError> {
        let node = self.node_mut(id)?;
        node.collapsed = !node.collapsed;
        Ok(node.collapsed)
    }

    /// Focus net-need computation on one subtree; focusing the focused
    /// node again clears it. Returns the new focus.
    pub fn toggle_focus(&mut self, id: NodeId) -> Result<Option<NodeId>, CalcError> {
        self.node(id)?;
        self.focus = if self.focus == Some(id) { None } else { Some(id) };
        Ok(self.focus)
    }

    /// Net terminal requirements for the focused node, or the whole target.
    pub fn net_needs(&self) -> Result<NetNeeds, CalcError> {
        let root = self.root.as_ref().ok_or(CalcError::NoTree)?;
        if let Some(node) = self.focus.and_then(|id| self.index.get(root, id)) {
            return Ok(compute_net_needs(node, node.quantity_needed));
        }
        let quantity = self
            .target
            .as_ref()
            .map_or(root.quantity_needed, |t| t.quantity);
        Ok(compute_net_needs(root, quantity))
    }

    /// Price the current net requirements against `market`.
    pub fn price(&self, market: &MarketData) -> Result<CostReport, CalcError> {
        Ok(price(&self.net_needs()?, market, self.price_mode))
    }

    pub fn export_snapshot(&self) -> Result<Snapshot, CalcError> {
        let root = self.root.as_ref().ok_or(CalcError::NoTree)?;
        let target = self.target.as_ref().ok_or(CalcError::NoTree)?;
        Ok(Snapshot {
            item_name: target.label.clone(),
            item_quantity: target.quantity,
            craft_tree: root.clone(),
        })
    }

    /// Replace all state with a parsed snapshot. Also invalidates any build
    /// still in flight.
    pub fn load_snapshot(&mut self, snapshot: Snapshot) {
        self.generation += 1;
        self.index = NodeIndex::rebuild(&snapshot.craft_tree);
        self.target = Some(Target {
            label: snapshot.item_name,
            quantity: snapshot.item_quantity,
        });
        self.root = Some(snapshot.craft_tree);
        self.focus = None;
        info!(nodes = self.index.len(), "loaded snapshot");
    }

    /// Parse and load. Current state is untouched when parsing fails.
    pub fn import_snapshot(&mut self, json: &str) -> Result<(), SnapshotError> {
        let snapshot = Snapshot::from_json(json)?;
        self.load_snapshot(snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::DisplayNames;
    use crate::source::StaticRecipeSource;
    use serde_json::json;

    fn resolver() -> RecipeResolver<StaticRecipeSource> {
        let source = StaticRecipeSource::new()
            .with("A", json!({"internalname": "A", "displayname": "Alpha", "recipe": {"A1": "B:2", "A2": "C:1"}}))
            .with("C", json!({"internalname": "C", "recipe": {"A1": "B:3"}}))
            .with("B", json!({"internalname": "B", "vanilla": true}))
            .with("D", json!({"internalname": "D"}));
        RecipeResolver::new(source, DisplayNames::from_map([("Alpha", "A")]))
    }

    #[test]
    fn quantity_must_be_positive_number() {
        assert_eq!(parse_quantity(" 12 ").unwrap(), 12);
        assert!(matches!(parse_quantity("0"), Err(CalcError::InvalidQuantity(_))));
        assert!(matches!(parse_quantity("-3"), Err(CalcError::InvalidQuantity(_))));
        assert!(matches!(parse_quantity("lots"), Err(CalcError::InvalidQuantity(_))));
    }

    #[tokio::test]
    async fn calculate_by_display_name() {
        let resolver = resolver();
        let mut session = Session::new();
        let root = session.calculate(&resolver, "alpha", 5).await.unwrap();
        assert_eq!(root.item_id, "A");
        assert_eq!(session.net_needs().unwrap().quantity("B"), 25);
        assert_eq!(session.index().len(), 4);
        assert_eq!(session.target().unwrap().label, "alpha");
    }

    #[tokio::test]
    async fn input_errors_leave_state_alone() {
        let resolver = resolver();
        let mut session = Session::new();
        session.calculate(&resolver, "A", 1).await.unwrap();
        let generation = session.generation();

        assert!(matches!(session.calculate(&resolver, "  ", 1).await, Err(CalcError::EmptyItemName)));
        assert!(matches!(session.calculate(&resolver, "A", 0).await, Err(CalcError::InvalidQuantity(_))));
        assert_eq!(session.generation(), generation);
        assert!(session.root().is_some());
    }

    #[tokio::test]
    async fn rejects_unknown_and_uncraftable_targets() {
        let resolver = resolver();
        let mut session = Session::new();
        assert!(matches!(session.calculate(&resolver, "NOPE", 1).await, Err(CalcError::ItemNotFound(_))));
        assert!(matches!(session.calculate(&resolver, "D", 1).await, Err(CalcError::NotCraftable(_))));
        assert!(session.root().is_none());

        // base goods are a valid one-node tree
        let root = session.calculate(&resolver, "B", 3).await.unwrap();
        assert!(root.is_terminal());
    }

    #[tokio::test]
    async fn stale_builds_are_refused() {
        let resolver = resolver();
        let mut session = Session::new();
        let old = session.begin_build();
        let built = CraftTreeBuilder::new(&resolver, old).build("A", 1).await;
        session.begin_build();

        let target = Target { label: "A".into(), quantity: 1 };
        assert!(matches!(session.install(target, built), Err(CalcError::StaleBuild { .. })));
        assert!(session.root().is_none());
        assert!(session.index().is_empty());
    }

    #[tokio::test]
    async fn mutations_by_id_drive_net_needs() {
        let resolver = resolver();
        let mut session = Session::new();
        let root = session.calculate(&resolver, "A", 5).await.unwrap();
        let direct_b = root.children[0].id;
        let c = root.children[1].id;

        session.set_owned(direct_b, 9).unwrap();
        assert_eq!(session.net_needs().unwrap().quantity("B"), 16);

        session.set_bulk_packs(direct_b, -2).unwrap();
        assert_eq!(session.node(direct_b).unwrap().bulk_packs, 0);

        assert!(session.toggle_completion(c).unwrap());
        assert_eq!(session.net_needs().unwrap().quantity("B"), 1);
        assert!(!session.toggle_completion(c).unwrap());
        assert_eq!(session.net_needs().unwrap().quantity("B"), 16);

        assert!(session.toggle_collapsed(c).unwrap());
        assert!(matches!(session.set_owned(NodeId::new(), 1), Err(CalcError::UnknownNode(_))));
    }

    #[tokio::test]
    async fn focus_limits_needs_to_subtree() {
        let resolver = resolver();
        let mut session = Session::new();
        let root = session.calculate(&resolver, "A", 5).await.unwrap();
        let c = root.children[1].id;

        assert_eq!(session.toggle_focus(c).unwrap(), Some(c));
        assert_eq!(session.net_needs().unwrap().quantity("B"), 15);
        assert_eq!(session.toggle_focus(c).unwrap(), None);
        assert_eq!(session.net_needs().unwrap().quantity("B"), 25);
    }

    #[tokio::test]
    async fn failed_import_keeps_current_tree() {
        let resolver = resolver();
        let mut session = Session::new();
        session.calculate(&resolver, "A", 2).await.unwrap();
        let before = session.export_snapshot().unwrap();

        assert!(session.import_snapshot(r#"{"itemName": "A"}"#).is_err());
        assert_eq!(session.export_snapshot().unwrap(), before);
    }

    #[test]
    fn empty_session_has_no_tree() {
        let session = Session::new();
        assert!(matches!(session.net_needs(), Err(CalcError::NoTree)));
        assert!(matches!(session.export_snapshot(), Err(CalcError::NoTree)));
    }
}
