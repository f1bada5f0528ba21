use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{AdminError, Result};

/// Stable identifier handed out when a recipe enters the collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeId(String);

impl RecipeId {
    pub fn generate() -> Self {
        RecipeId(format!("{:016x}", rand::random::<u64>()))
    }
}

impl From<&str> for RecipeId {
    fn from(id: &str) -> Self {
        RecipeId(id.to_string())
    }
}

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ingredient {
    pub amount: String,
    pub unit: String,
    pub name: String,
}

impl Ingredient {
    pub fn new(amount: &str, unit: &str, name: &str) -> Self {
        Ingredient {
            amount: amount.to_string(),
            unit: unit.to_string(),
            name: name.to_string(),
        }
    }

    /// Reads `amount; unit; name`, filling the fields left to right.
    pub fn from_row(row: &str) -> Self {
        let mut parts = row.splitn(3, ';').map(str::trim);
        let amount = parts.next().unwrap_or_default();
        let unit = parts.next().unwrap_or_default();
        let name = parts.next().unwrap_or_default();
        Ingredient::new(amount, unit, name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngredientGroup {
    pub group: String,
    pub items: Vec<Ingredient>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Step {
    pub time: String,
    pub needed: Vec<Ingredient>,
    pub substeps: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NutritionFacts {
    pub kcal: String,
    pub protein: String,
    pub carbs: String,
    pub fat: String,
    pub fiber: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Recipe {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RecipeId>,
    pub title: String,
    pub subtitle: String,
    pub category: String,
    pub preparation_time: String,
    pub cook_time: String,
    pub portion: String,
    pub difficulty: String,
    pub ingredients: Vec<IngredientGroup>,
    pub steps: Vec<Step>,
    pub tips: String,
    pub nutrition: NutritionFacts,
    /// `data:` URL of the picture, empty when there is none.
    pub image: String,
}

impl Recipe {
    pub fn has_image(&self) -> bool {
        !self.image.is_empty()
    }
}

/// Editor's pick, exported on its own as `featured.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeaturedSelection {
    pub recipe_index: usize,
    pub additional_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_id: Option<RecipeId>,
}

/// One element of the persisted collection, kept as the JSON it was read from.
///
/// Imports only check that the root is an array, so an element may be any
/// JSON value. Typed access through [`RecipeRecord::to_recipe`] is where a
/// malformed element is finally rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeRecord(Value);

impl RecipeRecord {
    pub fn from_recipe(recipe: &Recipe) -> Result<Self> {
        Ok(RecipeRecord(serde_json::to_value(recipe)?))
    }

    pub fn to_recipe(&self) -> Result<Recipe> {
        if !self.0.is_object() {
            return Err(AdminError::Shape(format!("expected an object, found {}", self.0)));
        }
        serde_json::from_value(self.0.clone()).map_err(|e| AdminError::Shape(e.to_string()))
    }

    /// String field of the record, `None` when missing or not a string.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.text("title")
    }

    pub fn id(&self) -> Option<RecipeId> {
        self.text("id").map(RecipeId::from)
    }

    /// Gives object records without an id a fresh one. Returns whether an id was added.
    pub fn ensure_id(&mut self) -> bool {
        match &mut self.0 {
            Value::Object(map) if !map.get("id").is_some_and(Value::is_string) => {
                map.insert(
                    "id".to_string(),
                    Value::String(RecipeId::generate().to_string()),
                );
                true
            }
            _ => false,
        }
    }
}

impl From<Value> for RecipeRecord {
    fn from(value: Value) -> Self {
        RecipeRecord(value)
    }
}
