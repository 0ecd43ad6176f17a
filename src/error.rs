use thiserror::Error;

use crate::models::NodeId;

/// Failure of an external data collaborator (recipe lookup or price feed).
///
/// These never abort a calculation; callers log them and degrade.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// User-visible failure that aborts the requested operation.
#[derive(Error, Debug)]
pub enum CalcError {
    #[error("please enter an item name")]
    EmptyItemName,

    #[error("invalid quantity {0:?}: expected a positive whole number")]
    InvalidQuantity(String),

    #[error("recipe for \"{0}\" not found; use a recognized display name or internal id")]
    ItemNotFound(String),

    #[error("\"{0}\" is not craftable or its recipe is unknown")]
    NotCraftable(String),

    #[error("build {build} was superseded by build {current}")]
    StaleBuild { build: u64, current: u64 },

    #[error("no crafting tree; calculate an item or load a snapshot first")]
    NoTree,

    #[error("unknown node {0}")]
    UnknownNode(NodeId),
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("invalid snapshot: {0}")]
    Format(#[from] serde_json::Error),

    #[error("invalid snapshot: missing item name")]
    MissingItemName,

    #[error("invalid snapshot: item quantity must be positive")]
    InvalidQuantity,

    #[error("snapshot I/O: {0}")]
    Io(#[from] std::io::Error),
}
