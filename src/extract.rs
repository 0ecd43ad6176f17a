//! Recipe repository import
//!
//! Walks a checkout of per-item JSON records (`items/*.json`) and loads
//! every valid record into the local database.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::db;
use crate::models::{ItemEntry, normalize_item_id};
use crate::names::clean_display_name;
use crate::recipe::{RecipeRecord, extract_ingredients};

/// Find all item record files under `dir`
pub fn find_record_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    files
}

/// Derive the database row for one raw record.
///
/// Returns `None` for JSON that is not an item record.
pub fn parse_record(content: &str) -> Option<ItemEntry> {
    let record: RecipeRecord = match serde_json::from_str(content) {
        Ok(record) => record,
        Err(err) => {
            debug!(error = %err, "not an item record");
            return None;
        }
    };

    let id = normalize_item_id(&record.internalname);
    if id.is_empty() {
        return None;
    }

    let display_name = clean_display_name(record.displayname.as_deref().unwrap_or(&id));
    let craftable = !record.vanilla && extract_ingredients(&record).is_some();
    Some(ItemEntry {
        id,
        display_name,
        vanilla: record.vanilla,
        craftable,
    })
}

/// Read one record file and derive its database row.
pub fn parse_record_file(path: &Path) -> Result<Option<(ItemEntry, String)>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let entry = parse_record(&content);
    if entry.is_none() {
        debug!(path = %path.display(), "skipping file");
    }
    Ok(entry.map(|entry| (entry, content)))
}

/// Import every record under `dir` into the database
pub fn import_to_database(conn: &Connection, dir: &Path) -> Result<ImportStats> {
    let mut stats = ImportStats::default();

    info!(dir = %dir.display(), "scanning for item records");
    let files = find_record_files(dir);
    info!(files = files.len(), "found record files");

    let tx = conn.unchecked_transaction()?;
    for path in &files {
        match parse_record_file(path) {
            Ok(Some((entry, record))) => {
                db::upsert_item(&tx, &entry, &record)?;
                stats.items += 1;
                if entry.craftable {
                    stats.craftable += 1;
                }
                if entry.vanilla {
                    stats.vanilla += 1;
                }
            }
            Ok(None) => stats.skipped += 1,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to import record");
                stats.errors += 1;
            }
        }
    }
    tx.commit()?;

    Ok(stats)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub items: usize,
    pub craftable: usize,
    pub vanilla: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl std::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Imported {} items ({} craftable, {} vanilla). Skipped: {}, Errors: {}",
            self.items, self.craftable, self.vanilla, self.skipped, self.errors
        )
    }
}
