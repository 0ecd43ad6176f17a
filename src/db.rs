//! Local recipe database schema and operations

use std::collections::BTreeMap;

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;

use crate::error::SourceError;
use crate::models::ItemEntry;
use crate::source::RecipeSource;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One raw recipe record per canonical item id
        CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            vanilla INTEGER NOT NULL DEFAULT 0,
            craftable INTEGER NOT NULL DEFAULT 0,
            record TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_items_craftable ON items(craftable);
        "#,
    )?;
    Ok(())
}

/// Insert or replace an item and its raw record
pub fn upsert_item(conn: &Connection, item: &ItemEntry, record: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO items (id, display_name, vanilla, craftable, record)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (&item.id, &item.display_name, item.vanilla, item.craftable, record),
    )?;
    Ok(())
}

/// Clear all imported data (for re-import)
pub fn clear_items(conn: &Connection) -> Result<()> {
    conn.execute_batch("DELETE FROM items;")?;
    Ok(())
}

/// Raw JSON record for an item, if present
pub fn get_record(conn: &Connection, id: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row("SELECT record FROM items WHERE id = ?1", [id], |row| row.get(0))
        .optional()
}

/// List all items in the database
pub fn list_items(conn: &Connection) -> Result<Vec<ItemEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, display_name, vanilla, craftable FROM items ORDER BY display_name, id",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(ItemEntry {
            id: row.get(0)?,
            display_name: row.get(1)?,
            vanilla: row.get(2)?,
            craftable: row.get(3)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Display name -> id for every craftable item
pub fn display_name_map(conn: &Connection) -> Result<BTreeMap<String, String>> {
    let mut stmt =
        conn.prepare("SELECT display_name, id FROM items WHERE craftable = 1 ORDER BY display_name")?;

    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

    let mut results = BTreeMap::new();
    for row in rows {
        let (name, id) = row?;
        results.insert(name, id);
    }
    Ok(results)
}

/// Recipe lookup backed by the local database
pub struct SqliteRecipeSource<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteRecipeSource<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl RecipeSource for SqliteRecipeSource<'_> {
    async fn fetch(&self, item_id: &str) -> Result<Option<Value>, SourceError> {
        match get_record(self.conn, item_id)? {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }
}
