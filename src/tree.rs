//! Crafting tree construction and the node index

use std::cell::RefCell;
use std::collections::HashMap;

use futures::FutureExt;
use futures::future::{LocalBoxFuture, join_all};
use tracing::{debug, info, warn};

use crate::models::{CraftNode, NodeId, RecipeInfo, normalize_item_id};
use crate::recipe::RecipeResolver;
use crate::source::RecipeSource;

/// Guard against runaway recursion in bad recipe data.
pub const MAX_DEPTH: usize = 64;

/// Node id -> child-index path from the root.
///
/// The tree owns its nodes; the index only records where each one lives, so
/// it stays valid for as long as the tree shape does.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NodeIndex {
    paths: HashMap<NodeId, Vec<usize>>,
}

impl NodeIndex {
    /// Index every node of `root` by a full traversal.
    pub fn rebuild(root: &CraftNode) -> Self {
        let mut index = Self::default();
        index.register_subtree(root, &mut Vec::new());
        index
    }

    fn register_subtree(&mut self, node: &CraftNode, path: &mut Vec<usize>) {
        if self.paths.insert(node.id, path.clone()).is_some() {
            warn!(node = %node.id, "duplicate node id, keeping the later node");
        }
        for (i, child) in node.children.iter().enumerate() {
            path.push(i);
            self.register_subtree(child, path);
            path.pop();
        }
    }

    pub fn insert(&mut self, id: NodeId, path: Vec<usize>) {
        self.paths.insert(id, path);
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.paths.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.paths.keys().copied()
    }

    pub fn get<'a>(&self, root: &'a CraftNode, id: NodeId) -> Option<&'a CraftNode> {
        let path = self.paths.get(&id)?;
        let mut node = root;
        for &i in path {
            node = node.children.get(i)?;
        }
        (node.id == id).then_some(node)
    }

    pub fn get_mut<'a>(&self, root: &'a mut CraftNode, id: NodeId) -> Option<&'a mut CraftNode> {
        let path = self.paths.get(&id)?;
        let mut node = root;
        for &i in path {
            node = node.children.get_mut(i)?;
        }
        (node.id == id).then_some(node)
    }
}

/// Result of one build, tagged with the generation it was started under.
#[derive(Debug, Clone)]
pub struct BuiltTree {
    pub root: CraftNode,
    pub index: NodeIndex,
    pub generation: u64,
}

/// Expands an item into a full [`CraftNode`] tree.
///
/// Each node costs one resolver round trip. Sibling subtrees are resolved
/// concurrently and reassembled in ingredient order.
pub struct CraftTreeBuilder<'a, S> {
    resolver: &'a RecipeResolver<S>,
    index: RefCell<NodeIndex>,
    generation: u64,
}

impl<'a, S: RecipeSource> CraftTreeBuilder<'a, S> {
    pub fn new(resolver: &'a RecipeResolver<S>, generation: u64) -> Self {
        Self {
            resolver,
            index: RefCell::new(NodeIndex::default()),
            generation,
        }
    }

    pub async fn build(self, item_id: &str, quantity_needed: u64) -> BuiltTree {
        self.build_under(item_id, quantity_needed, None).await
    }

    /// Build a tree whose root records `parent_id` as its parent, for
    /// grafting under an existing node.
    pub async fn build_under(
        self,
        item_id: &str,
        quantity_needed: u64,
        parent_id: Option<NodeId>,
    ) -> BuiltTree {
        let root = self
            .build_node(item_id.to_string(), quantity_needed, parent_id, Vec::new())
            .await;
        let index = self.index.into_inner();
        info!(
            item = %root.item_id,
            quantity = quantity_needed,
            nodes = index.len(),
            "built crafting tree"
        );
        BuiltTree {
            root,
            index,
            generation: self.generation,
        }
    }

    /// Build the subtree rooted at an already-resolved recipe.
    pub async fn build_from(self, recipe: &RecipeInfo, quantity_needed: u64) -> BuiltTree {
        let root = self.expand(recipe, quantity_needed, None, Vec::new()).await;
        BuiltTree {
            root,
            index: self.index.into_inner(),
            generation: self.generation,
        }
    }

    fn build_node<'b>(
        &'b self,
        item_id: String,
        quantity_needed: u64,
        parent_id: Option<NodeId>,
        path: Vec<usize>,
    ) -> LocalBoxFuture<'b, CraftNode> {
        async move {
            let mut recipe = self.resolver.resolve(&item_id).await;
            // Parents find children by the ingredient id, so keep it even
            // when the record names itself differently.
            let requested = normalize_item_id(&item_id);
            if recipe.item_id != requested {
                debug!(requested = %requested, record = %recipe.item_id, "record id differs from lookup id");
                recipe.item_id = requested;
            }
            self.expand(&recipe, quantity_needed, parent_id, path).await
        }
        .boxed_local()
    }

    async fn expand(
        &self,
        recipe: &RecipeInfo,
        quantity_needed: u64,
        parent_id: Option<NodeId>,
        path: Vec<usize>,
    ) -> CraftNode {
        let mut node = CraftNode::new(recipe, quantity_needed, parent_id);
        if path.len() >= MAX_DEPTH && !node.is_terminal() {
            warn!(item = %node.item_id, depth = path.len(), "depth limit reached, treating as terminal");
            node.ingredients.clear();
            node.yield_per_craft = 1;
            node.crafts_required = quantity_needed;
        }
        // Registered before recursing so an abandoned build still indexes
        // everything it created.
        self.index.borrow_mut().insert(node.id, path.clone());

        let children = node.ingredients.iter().enumerate().map(|(i, ingredient)| {
            let mut child_path = path.clone();
            child_path.push(i);
            self.build_node(
                ingredient.item_id.clone(),
                ingredient.quantity.saturating_mul(node.crafts_required),
                Some(node.id),
                child_path,
            )
        });
        let children = join_all(children).await;
        node.children = children;
        node
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
            .with("A", json!({"internalname": "A", "recipe": {"A1": "B:2", "A2": "C:1"}}))
            .with("C", json!({"internalname": "C", "recipes": [{"inputs": ["B:3"], "count": 2}]}))
            .with("B", json!({"internalname": "B", "vanilla": true}));
        RecipeResolver::new(source, DisplayNames::default())
    }

    #[tokio::test]
    async fn propagates_quantities_with_ceil() {
        let resolver = resolver();
        let built = CraftTreeBuilder::new(&resolver, 1).build("a", 5).await;
        let root = &built.root;

        assert_eq!(root.crafts_required, 5);
        assert_eq!(root.children.len(), 2);
        let b = &root.children[0];
        let c = &root.children[1];
        assert_eq!((b.item_id.as_str(), b.quantity_needed), ("B", 10));
        assert_eq!((c.item_id.as_str(), c.quantity_needed), ("C", 5));
        assert_eq!(c.yield_per_craft, 2);
        assert_eq!(c.crafts_required, 3);
        assert_eq!(c.children[0].quantity_needed, 9);
        assert!(c.children[0].is_terminal());
    }

    #[tokio::test]
    async fn links_parents_and_indexes_every_node() {
        let resolver = resolver();
        let built = CraftTreeBuilder::new(&resolver, 7).build("A", 1).await;
        assert_eq!(built.generation, 7);
        assert_eq!(built.index.len(), built.root.node_count());

        let root = &built.root;
        assert_eq!(root.parent_id, None);
        assert_eq!(root.children[1].parent_id, Some(root.id));
        assert_eq!(root.children[1].children[0].parent_id, Some(root.children[1].id));

        root.walk(&mut |node| {
            assert_eq!(built.index.get(root, node.id).map(|n| n.id), Some(node.id));
        });
    }

    #[tokio::test]
    async fn repeated_items_get_separate_nodes() {
        let resolver = resolver();
        let built = CraftTreeBuilder::new(&resolver, 1).build("A", 1).await;
        let mut b_nodes = Vec::new();
        built.root.walk(&mut |node| {
            if node.item_id == "B" {
                b_nodes.push(node.id);
            }
        });
        assert_eq!(b_nodes.len(), 2);
        assert_ne!(b_nodes[0], b_nodes[1]);
    }

    #[tokio::test]
    async fn index_rebuild_matches_build_index() {
        let resolver = resolver();
        let built = CraftTreeBuilder::new(&resolver, 1).build("A", 3).await;
        assert_eq!(NodeIndex::rebuild(&built.root), built.index);
    }

    #[tokio::test]
    async fn subtree_root_keeps_given_parent() {
        let resolver = resolver();
        let parent = NodeId::new();
        let built = CraftTreeBuilder::new(&resolver, 1).build_under("C", 4, Some(parent)).await;
        assert_eq!(built.root.parent_id, Some(parent));
        assert_eq!(built.root.children[0].parent_id, Some(built.root.id));
        assert_eq!(built.root.children[0].quantity_needed, 6);
    }

    #[tokio::test]
    async fn self_referencing_recipe_stops_at_depth_cap() {
        let source = StaticRecipeSource::new()
            .with("LOOP", json!({"internalname": "LOOP", "recipe": {"A1": "LOOP:1"}}));
        let resolver = RecipeResolver::new(source, DisplayNames::default());
        let built = CraftTreeBuilder::new(&resolver, 1).build("LOOP", 1).await;
        assert_eq!(built.root.node_count(), MAX_DEPTH + 1);
        let mut leaves = 0;
        built.root.walk(&mut |node| {
            if node.children.is_empty() {
                assert!(node.is_terminal());
                leaves += 1;
            }
        });
        assert_eq!(leaves, 1);
    }

    #[tokio::test]
    async fn children_keep_the_ingredient_id() {
        let source = StaticRecipeSource::new()
            .with("KIT", json!({"internalname": "KIT", "recipe": {"A1": "OLD_NAME:3"}}))
            .with("OLD_NAME", json!({"internalname": "NEW_NAME", "vanilla": true}));
        let resolver = RecipeResolver::new(source, DisplayNames::default());
        let built = CraftTreeBuilder::new(&resolver, 1).build("KIT", 2).await;
        assert_eq!(built.root.children[0].item_id, "OLD_NAME");

        let needs = crate::calculator::compute_net_needs(&built.root, 2);
        assert!(needs.gaps.is_empty());
        assert_eq!(needs.quantity("OLD_NAME"), 6);
    }

    #[tokio::test]
    async fn huge_quantities_saturate() {
        let source = StaticRecipeSource::new()
            .with("BLOCK", json!({"internalname": "BLOCK", "recipe": {"A1": "GEM:160"}}))
            .with("GEM", json!({"internalname": "GEM", "vanilla": true}));
        let resolver = RecipeResolver::new(source, DisplayNames::default());
        let built = CraftTreeBuilder::new(&resolver, 1)
            .build("BLOCK", 1_000_000_000_000_000_000)
            .await;
        assert_eq!(built.root.children[0].quantity_needed, u64::MAX);
        assert_eq!(built.root.children[0].crafts_required, u64::MAX);
    }

    #[tokio::test]
    async fn get_mut_reaches_nested_nodes() {
        let resolver = resolver();
        let mut built = CraftTreeBuilder::new(&resolver, 1).build("A", 1).await;
        let nested = built.root.children[1].children[0].id;
        built.index.get_mut(&mut built.root, nested).unwrap().owned = 4;
        assert_eq!(built.root.children[1].children[0].owned, 4);
        assert!(built.index.get(&built.root, NodeId::new()).is_none());
    }
}
