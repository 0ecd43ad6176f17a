//! Optional TOML configuration
//!
//! Every key has a default, so a missing file or a partial one is fine.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::pricing::PriceMode;

/// Largest quantity a single buy order may cover.
pub const BUY_ORDER_MAX: u64 = 71680;

pub const DEFAULT_RECIPES_URL: &str =
    "https://raw.githubusercontent.com/NotEnoughUpdates/NotEnoughUpdates-REPO/master/items/";
pub const DEFAULT_FLAT_FEED_URL: &str = "https://hysky.de/api/bazaar";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of per-item recipe records, `{base}{ID}.json`
    pub recipes_url: String,
    /// `{display name: internal id}` JSON file
    pub display_names: Option<PathBuf>,
    pub flat_feed_url: String,
    pub listings_url: Option<String>,
    pub price_mode: PriceMode,
    pub buy_order_max: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recipes_url: DEFAULT_RECIPES_URL.to_string(),
            display_names: None,
            flat_feed_url: DEFAULT_FLAT_FEED_URL.to_string(),
            listings_url: None,
            price_mode: PriceMode::default(),
            buy_order_max: BUY_ORDER_MAX,
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse config")
    }

    /// Load `path` if given and present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }
}
