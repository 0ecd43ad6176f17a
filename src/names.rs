//! Display-name index
//!
//! Maps human-readable item names to canonical ids and back. Built from a
//! JSON object of `{ "display name": "INTERNAL_ID" }`, the same file the
//! `display-names` command writes.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::normalize_item_id;

static FORMATTING_CODES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("§[0-9a-fklmnor]").expect("static pattern"));

/// Default cap on search results
pub const SEARCH_LIMIT: usize = 100;

/// Strip formatting codes and surrounding whitespace from a display name.
pub fn clean_display_name(name: &str) -> String {
    FORMATTING_CODES.replace_all(name, "").trim().to_string()
}

#[derive(Debug, Default, Clone)]
pub struct DisplayNames {
    /// cleaned lower-case display name -> internal id
    by_name: HashMap<String, String>,
    /// internal id -> cleaned display name
    by_id: HashMap<String, String>,
}

impl DisplayNames {
    pub fn from_map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut names = Self::default();
        for (display, id) in entries {
            let cleaned = clean_display_name(display.as_ref());
            let id = id.into();
            names.by_name.insert(cleaned.to_lowercase(), id.clone());
            names.by_id.insert(id, cleaned);
        }
        names
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: HashMap<String, String> = serde_json::from_str(json)?;
        Ok(Self::from_map(raw))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Internal id for a display name, ignoring case and formatting codes.
    pub fn lookup(&self, input: &str) -> Option<&str> {
        self.by_name
            .get(&clean_display_name(input).to_lowercase())
            .map(String::as_str)
    }

    pub fn display_name(&self, item_id: &str) -> Option<&str> {
        self.by_id
            .get(item_id)
            .or_else(|| self.by_id.get(&normalize_item_id(item_id)))
            .map(String::as_str)
    }

    /// Best-effort label: known display name, else the cleaned raw id.
    pub fn label_for(&self, item_id: &str) -> String {
        match self.display_name(item_id) {
            Some(name) => name.to_string(),
            None => clean_display_name(item_id),
        }
    }

    /// Canonical id for user input: a known display name wins, otherwise the
    /// input is taken as an internal id.
    pub fn resolve_target(&self, input: &str) -> String {
        match self.lookup(input) {
            Some(id) => normalize_item_id(id),
            None => normalize_item_id(input),
        }
    }

    /// Display names containing `fragment`, sorted, at most `limit`.
    pub fn search(&self, fragment: &str, limit: usize) -> Vec<&str> {
        let needle = fragment.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let mut hits: Vec<&str> = self
            .by_id
            .values()
            .filter(|name| name.to_lowercase().contains(&needle))
            .map(String::as_str)
            .collect();
        hits.sort_unstable();
        hits.truncate(limit);
        hits
    }

    /// Longest common prefix of every display name starting with `prefix`,
    /// or `None` when nothing matches or the prefix would not grow.
    pub fn complete(&self, prefix: &str) -> Option<String> {
        let needle = prefix.trim().to_lowercase();
        let mut matches: Vec<&str> = self
            .by_id
            .values()
            .filter(|name| name.to_lowercase().starts_with(&needle))
            .map(String::as_str)
            .collect();
        matches.sort_unstable();

        let (first, rest) = matches.split_first()?;
        let mut common: &str = first;
        for name in rest {
            let len = common
                .char_indices()
                .zip(name.chars())
                .take_while(|((_, a), b)| a == b)
                .last()
                .map_or(0, |((i, a), _)| i + a.len_utf8());
            common = &common[..len];
        }

        let extends = common.chars().count() > needle.chars().count();
        (extends && common.to_lowercase().starts_with(&needle)).then(|| common.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DisplayNames {
        DisplayNames::from_map([
            ("§5Enchanted Diamond", "ENCHANTED_DIAMOND"),
            ("§5Enchanted Diamond Block", "ENCHANTED_DIAMOND_BLOCK"),
            ("§9Enchanted Gold", "ENCHANTED_GOLD"),
            ("Hyperion", "HYPERION"),
        ])
    }

    #[test]
    fn strips_formatting_codes() {
        assert_eq!(clean_display_name(" §6§lGolden Apple§r "), "Golden Apple");
        assert_eq!(clean_display_name("§zKeep"), "§zKeep");
    }

    #[test]
    fn looks_up_by_display_name() {
        let names = sample();
        assert_eq!(names.lookup("enchanted diamond"), Some("ENCHANTED_DIAMOND"));
        assert_eq!(names.lookup("ENCHANTED GOLD"), Some("ENCHANTED_GOLD"));
        assert_eq!(names.lookup("missing"), None);
        assert_eq!(names.display_name("HYPERION"), Some("Hyperion"));
    }

    #[test]
    fn resolve_target_falls_back_to_normalized_input() {
        let names = sample();
        assert_eq!(names.resolve_target("Hyperion"), "HYPERION");
        assert_eq!(names.resolve_target(" wither_blade "), "WITHER_BLADE");
    }

    #[test]
    fn label_falls_back_to_cleaned_id() {
        let names = sample();
        assert_eq!(names.label_for("ENCHANTED_GOLD"), "Enchanted Gold");
        assert_eq!(names.label_for("§aRAW_FISH"), "RAW_FISH");
    }

    #[test]
    fn search_is_sorted_and_capped() {
        let names = sample();
        assert_eq!(
            names.search("enchanted", 10),
            vec!["Enchanted Diamond", "Enchanted Diamond Block", "Enchanted Gold"]
        );
        assert_eq!(names.search("ench", 1), vec!["Enchanted Diamond"]);
        assert!(names.search("  ", 10).is_empty());
    }

    #[test]
    fn completes_common_prefix() {
        let names = sample();
        assert_eq!(names.complete("enchanted d").as_deref(), Some("Enchanted Diamond"));
        assert_eq!(names.complete("ench").as_deref(), Some("Enchanted "));
        assert_eq!(names.complete("zzz"), None);
        // nothing to add beyond what was typed
        assert_eq!(names.complete("enchanted diamond"), None);
        assert_eq!(names.complete("Hyperion"), None);
        assert_eq!(names.complete("hyper").as_deref(), Some("Hyperion"));
    }

    #[test]
    fn parses_json_map() {
        let names = DisplayNames::from_json(r#"{"§fStick": "STICK"}"#).unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names.lookup("stick"), Some("STICK"));
    }
}
