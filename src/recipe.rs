//! Recipe record parsing and normalization

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{
    CURRENCY_ID, CURRENCY_NAME, Ingredient, RecipeInfo, Resolution, normalize_item_id,
};
use crate::names::{DisplayNames, clean_display_name};
use crate::source::RecipeSource;

/// Crafting grid slots in reading order.
pub const GRID_SLOTS: [&str; 9] = ["A1", "A2", "A3", "B1", "B2", "B3", "C1", "C2", "C3"];

/// Raw per-item record as served by the recipe repository.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeRecord {
    pub internalname: String,
    #[serde(default)]
    pub displayname: Option<String>,
    #[serde(default)]
    pub vanilla: bool,
    #[serde(default)]
    pub recipes: Vec<Option<RecipeVariant>>,
    #[serde(default)]
    pub recipe: Option<BTreeMap<String, Option<String>>>,
}

/// One entry of `recipes`: either a flat `inputs` list or a 3x3 grid.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeVariant {
    #[serde(default)]
    pub inputs: Option<Vec<String>>,
    #[serde(default)]
    pub count: Option<f64>,
    #[serde(flatten)]
    pub slots: HashMap<String, Value>,
}

impl RecipeVariant {
    fn yield_per_craft(&self) -> u64 {
        match self.count {
            Some(count) if count >= 1.0 => count as u64,
            _ => 1,
        }
    }

    fn tokens(&self) -> Vec<&str> {
        if let Some(inputs) = &self.inputs {
            return inputs.iter().map(String::as_str).collect();
        }
        GRID_SLOTS
            .iter()
            .filter_map(|slot| self.slots.get(*slot).and_then(Value::as_str))
            .collect()
    }
}

/// Ingredient ids with summed per-craft quantities, in first-seen order.
#[derive(Debug, Default, PartialEq, Eq)]
struct IngredientTally(Vec<(String, u64)>);

impl IngredientTally {
    fn add_token(&mut self, token: &str) {
        if let Some((id, quantity)) = parse_token(token) {
            match self.0.iter_mut().find(|(existing, _)| *existing == id) {
                Some((_, total)) => *total += quantity,
                None => self.0.push((id, quantity)),
            }
        }
    }

    fn from_tokens<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Self {
        let mut tally = Self::default();
        for token in tokens {
            tally.add_token(token);
        }
        tally
    }
}

/// Parse an `ID:QTY` token. The id is the first colon segment and the
/// quantity the leading digits of the last one; anything between is metadata.
pub fn parse_token(token: &str) -> Option<(String, u64)> {
    let (id, _) = token.split_once(':')?;
    let id = id.trim();
    if id.is_empty() {
        return None;
    }
    let last = token.rsplit(':').next()?.trim_start();
    let digits: &str = &last[..last.bytes().take_while(u8::is_ascii_digit).count()];
    let quantity: u64 = digits.parse().ok()?;
    (quantity > 0).then(|| (normalize_item_id(id), quantity))
}

/// Ingredients and yield of the first usable recipe shape in `record`.
///
/// Variants are tried in order; the single slot map is used only when no
/// variant has any usable ingredient.
pub fn extract_ingredients(record: &RecipeRecord) -> Option<(Vec<(String, u64)>, u64)> {
    for variant in record.recipes.iter().flatten() {
        let tally = IngredientTally::from_tokens(variant.tokens());
        if !tally.0.is_empty() {
            return Some((tally.0, variant.yield_per_craft()));
        }
    }

    let slots = record.recipe.as_ref()?;
    let tally = IngredientTally::from_tokens(slots.values().flatten().map(String::as_str));
    (!tally.0.is_empty()).then_some((tally.0, 1))
}

/// Turns item ids into [`RecipeInfo`]s. Never fails: misses, malformed
/// records and lookup errors all come back as terminal recipes, tagged with
/// the [`Resolution`] that produced them.
pub struct RecipeResolver<S> {
    source: S,
    names: DisplayNames,
}

impl<S: RecipeSource> RecipeResolver<S> {
    pub fn new(source: S, names: DisplayNames) -> Self {
        Self { source, names }
    }

    pub fn names(&self) -> &DisplayNames {
        &self.names
    }

    pub async fn resolve(&self, item_id: &str) -> RecipeInfo {
        let id = normalize_item_id(item_id);
        if id == CURRENCY_ID {
            return RecipeInfo::terminal(id, CURRENCY_NAME.to_string(), Resolution::Currency);
        }

        match self.source.fetch(&id).await {
            Ok(Some(value)) => self.normalize(&id, value),
            Ok(None) => {
                warn!(item = %id, "recipe not found");
                self.fallback(id, Resolution::NotFound)
            }
            Err(err) => {
                warn!(item = %id, error = %err, "recipe lookup failed");
                self.fallback(id, Resolution::Unavailable)
            }
        }
    }

    fn fallback(&self, id: String, resolution: Resolution) -> RecipeInfo {
        let label = self.names.label_for(&id);
        RecipeInfo::terminal(id, label, resolution)
    }

    fn normalize(&self, requested: &str, value: Value) -> RecipeInfo {
        let record: RecipeRecord = match serde_json::from_value(value) {
            Ok(record) => record,
            Err(err) => {
                warn!(item = %requested, error = %err, "malformed recipe record");
                return self.fallback(requested.to_string(), Resolution::Malformed);
            }
        };

        let id = normalize_item_id(&record.internalname);
        let label = match self.names.display_name(&id) {
            Some(name) => name.to_string(),
            None => clean_display_name(record.displayname.as_deref().unwrap_or(requested)),
        };

        if record.vanilla {
            debug!(item = %id, "base good");
            return RecipeInfo::terminal(id, label, Resolution::Base);
        }

        let Some((tally, yield_per_craft)) = extract_ingredients(&record) else {
            debug!(item = %id, "no usable recipe");
            return RecipeInfo::terminal(id, label, Resolution::Found);
        };

        let ingredients = tally
            .into_iter()
            .map(|(item_id, quantity)| Ingredient {
                display_name: self.names.label_for(&item_id),
                item_id,
                quantity,
            })
            .collect();

        debug!(item = %id, yield_per_craft, "resolved recipe");
        RecipeInfo {
            item_id: id,
            display_name: label,
            ingredients,
            yield_per_craft,
            resolution: Resolution::Found,
        }
    }
}
