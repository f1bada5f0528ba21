use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::error::{AdminError, Result};
use crate::recipe::{FeaturedSelection, RecipeRecord};

pub const RECIPES_FILE: &str = "recipes.json";
pub const FEATURED_FILE: &str = "featured.json";

/// Parses an exported collection.
///
/// Only the root is checked: it must be a JSON array. Elements are taken as
/// they are, so `["not", "a", "recipe"]` imports fine and fails later, when
/// one of its entries is opened as a recipe.
pub fn import_from(raw: &str) -> Result<Vec<RecipeRecord>> {
    let value: Value = serde_json::from_str(raw).map_err(|e| AdminError::Parse(e.to_string()))?;
    match value {
        Value::Array(items) => Ok(items.into_iter().map(RecipeRecord::from).collect()),
        other => Err(AdminError::Parse(format!(
            "JSON must be an array, found {}",
            kind(&other)
        ))),
    }
}

pub fn import_bytes(raw: &[u8]) -> Result<Vec<RecipeRecord>> {
    let text = std::str::from_utf8(raw).map_err(|e| AdminError::Parse(e.to_string()))?;
    import_from(text)
}

pub fn import_file(path: &Path) -> Result<Vec<RecipeRecord>> {
    import_from(&fs::read_to_string(path)?)
}

pub fn export_to(records: &[RecipeRecord]) -> Result<String> {
    Ok(serde_json::to_string_pretty(records)?)
}

pub fn export_featured(featured: &FeaturedSelection) -> Result<String> {
    Ok(serde_json::to_string_pretty(featured)?)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
