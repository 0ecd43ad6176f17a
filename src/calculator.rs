//! Net requirement calculation over a crafting tree

use std::collections::BTreeMap;

use tracing::warn;

use crate::models::{CraftNode, NodeId};

/// Outstanding quantity of one terminal item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetNeed {
    pub display_name: String,
    pub quantity: u64,
}

impl NetNeed {
    /// Split into (full orders of `cap` units, remainder).
    pub fn buy_orders(&self, cap: u64) -> (u64, u64) {
        if cap == 0 {
            return (0, self.quantity);
        }
        (self.quantity / cap, self.quantity % cap)
    }
}

/// An ingredient with no matching child node. Only reachable through
/// externally edited snapshots; its quantity is left out of the totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildGap {
    pub parent: NodeId,
    pub parent_item: String,
    pub ingredient: String,
    pub quantity: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetNeeds {
    /// Terminal item id -> outstanding need, merged across all occurrences
    pub items: BTreeMap<String, NetNeed>,
    pub gaps: Vec<ChildGap>,
}

impl NetNeeds {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn quantity(&self, item_id: &str) -> u64 {
        self.items.get(item_id).map_or(0, |need| need.quantity)
    }

    fn add(&mut self, node: &CraftNode, quantity: u64) {
        let need = self
            .items
            .entry(node.item_id.clone())
            .or_insert_with(|| NetNeed {
                display_name: node.display_name.clone(),
                quantity: 0,
            });
        need.quantity = need.quantity.saturating_add(quantity);
    }
}

/// Terminal items still required to produce `quantity_required` of `root`.
///
/// Quantities saturate at `u64::MAX` instead of overflowing. Pure and recomputed from scratch on every call. Completed nodes prune
/// their subtree; owned units and bulk packs are subtracted before crafts
/// are derived for the children.
pub fn compute_net_needs(root: &CraftNode, quantity_required: u64) -> NetNeeds {
    let mut needs = NetNeeds::default();
    collect_net_needs(root, quantity_required, &mut needs);
    needs
}

fn collect_net_needs(node: &CraftNode, required: u64, needs: &mut NetNeeds) {
    if node.completed {
        return;
    }

    let net_out = required.saturating_sub(node.have());
    if net_out == 0 {
        return;
    }

    if node.is_terminal() {
        needs.add(node, net_out);
        return;
    }

    let crafts = net_out.div_ceil(node.yield_per_craft.max(1));
    for ingredient in &node.ingredients {
        let child_required = ingredient.quantity.saturating_mul(crafts);
        match node.child_for(&ingredient.item_id) {
            Some(child) => collect_net_needs(child, child_required, needs),
            None => {
                warn!(
                    node = %node.id,
                    ingredient = %ingredient.item_id,
                    quantity = child_required,
                    "ingredient has no child node"
                );
                needs.gaps.push(ChildGap {
                    parent: node.id,
                    parent_item: node.item_id.clone(),
                    ingredient: ingredient.item_id.clone(),
                    quantity: child_required,
                });
            }
        }
    }
}

/// Format a crafting tree as a readable string
pub fn format_tree(node: &CraftNode, indent: usize) -> String {
    let mut output = String::new();
    let prefix = "  ".repeat(indent);
    let mark = if node.completed { "[x]" } else { "[ ]" };

    output.push_str(&format!(
        "{}{} {} (need {}",
        prefix, mark, node.display_name, node.quantity_needed
    ));
    if !node.is_terminal() {
        output.push_str(&format!(
            ", crafts {}, yield {}",
            node.crafts_required, node.yield_per_craft
        ));
    }
    output.push(')');
    if node.owned > 0 || node.bulk_packs > 0 {
        output.push_str(&format!(" have {} + {} packs", node.owned, node.bulk_packs));
    }
    output.push_str(&format!("  {}\n", node.id));

    if node.collapsed {
        if !node.children.is_empty() {
            output.push_str(&format!("{}  ... {} hidden\n", prefix, node.children.len()));
        }
        return output;
    }

    for child in &node.children {
        output.push_str(&format_tree(child, indent + 1));
    }

    output
}
