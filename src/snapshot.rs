//! Snapshot export and import of a calculation in progress

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::models::CraftNode;

/// `{itemName, itemQuantity, craftTree}` as written by `--save`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub item_name: String,
    pub item_quantity: u64,
    pub craft_tree: CraftNode,
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate. All three top-level fields are required.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        if snapshot.item_name.trim().is_empty() {
            return Err(SnapshotError::MissingItemName);
        }
        if snapshot.item_quantity == 0 {
            return Err(SnapshotError::InvalidQuantity);
        }
        Ok(snapshot)
    }

    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Default file name for a target label.
    pub fn file_name(&self) -> String {
        let slug: String = self
            .item_name
            .trim()
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect();
        format!("crafting_state_{}.json", slug.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree_json() -> serde_json::Value {
        json!({
            "nodeId": "6f1c1a8e-3f0c-4b7e-9a55-0d1b2c3d4e5f",
            "parentId": null,
            "name": "Enchanted Iron",
            "internalName": "ENCHANTED_IRON",
            "quantityNeeded": 2,
            "quantityProducedPerCraft": 1,
            "numCraftsRequired": 2,
            "ingredients": [{"name": "Iron Ingot", "internalName": "IRON_INGOT", "quantity": 160}],
            "children": [{
                "nodeId": "0a4d2f7e-1111-4c2a-8e3b-5f6a7b8c9d0e",
                "parentId": "6f1c1a8e-3f0c-4b7e-9a55-0d1b2c3d4e5f",
                "name": "Iron Ingot",
                "internalName": "IRON_INGOT",
                "quantityNeeded": 320,
                "quantityProducedPerCraft": 1,
                "numCraftsRequired": 320,
                "ingredients": [],
                "children": [],
                "completed": false,
                "isCollapsed": false,
                "currentQuantity": 100,
                "packsQuantity": 1
            }],
            "completed": false,
            "isCollapsed": true,
            "currentQuantity": 0,
            "packsQuantity": 0
        })
    }

    #[test]
    fn reads_existing_state_files() {
        let text = json!({"itemName": "Enchanted Iron", "itemQuantity": 2, "craftTree": tree_json()}).to_string();
        let snapshot = Snapshot::from_json(&text).unwrap();
        assert_eq!(snapshot.item_quantity, 2);
        assert!(snapshot.craft_tree.collapsed);
        let child = &snapshot.craft_tree.children[0];
        assert_eq!((child.owned, child.bulk_packs), (100, 1));
        assert_eq!(child.parent_id, Some(snapshot.craft_tree.id));
    }

    #[test]
    fn rejects_incomplete_payloads() {
        for payload in [
            json!({"itemQuantity": 2, "craftTree": tree_json()}),
            json!({"itemName": "Enchanted Iron", "craftTree": tree_json()}),
            json!({"itemName": "Enchanted Iron", "itemQuantity": 2}),
            json!({"itemName": "Enchanted Iron", "itemQuantity": "two", "craftTree": tree_json()}),
        ] {
            assert!(matches!(
                Snapshot::from_json(&payload.to_string()),
                Err(SnapshotError::Format(_))
            ));
        }
        let blank = json!({"itemName": " ", "itemQuantity": 2, "craftTree": tree_json()});
        assert!(matches!(Snapshot::from_json(&blank.to_string()), Err(SnapshotError::MissingItemName)));
        let zero = json!({"itemName": "x", "itemQuantity": 0, "craftTree": tree_json()});
        assert!(matches!(Snapshot::from_json(&zero.to_string()), Err(SnapshotError::InvalidQuantity)));
        assert!(Snapshot::from_json("not json").is_err());
    }

    #[test]
    fn file_name_is_slugged() {
        let text = json!({"itemName": "Enchanted Iron", "itemQuantity": 2, "craftTree": tree_json()}).to_string();
        let snapshot = Snapshot::from_json(&text).unwrap();
        assert_eq!(snapshot.file_name(), "crafting_state_enchanted_iron.json");
    }
}
