//! Crafting requirement calculator for Hypixel SkyBlock items.
//!
//! Expands an item into its full crafting tree, tracks what the player
//! already owns or has finished, reduces the tree to the raw materials still
//! needed, and prices those against the bazaar and auction feeds.

pub mod calculator;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod models;
pub mod names;
pub mod pricing;
pub mod recipe;
pub mod session;
pub mod snapshot;
pub mod source;
pub mod tree;

pub use calculator::{NetNeeds, compute_net_needs, format_tree};
pub use error::{CalcError, SnapshotError, SourceError};
pub use models::{CraftNode, NodeId, RecipeInfo, Resolution};
pub use names::DisplayNames;
pub use pricing::{CostReport, MarketData, PriceMode};
pub use recipe::RecipeResolver;
pub use session::Session;
pub use snapshot::Snapshot;
pub use source::RecipeSource;
