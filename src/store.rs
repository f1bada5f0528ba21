use serde_json::Value;

use crate::db::KeyValueStore;
use crate::error::{AdminError, Result};
use crate::recipe::{FeaturedSelection, Recipe, RecipeId, RecipeRecord};
use crate::transfer;

pub const RECIPES_KEY: &str = "vt_recipes";
pub const FEATURED_KEY: &str = "vt_featured";

const NOT_AVAILABLE: &str = "N/A";

/// What the featured screen shows about the current pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeaturedPreview {
    pub title: String,
    pub time: String,
    pub portion: String,
    pub difficulty: String,
    pub additional_text: String,
}

/// Owns the recipe collection and the featured selection for one session.
pub struct RecipeStore {
    backend: Box<dyn KeyValueStore>,
    records: Vec<RecipeRecord>,
    featured: FeaturedSelection,
}

impl RecipeStore {
    /// Loads whatever the backend holds. Unreadable data counts as no data.
    pub fn open(backend: Box<dyn KeyValueStore>) -> Result<Self> {
        let mut store = RecipeStore {
            backend,
            records: Vec::new(),
            featured: FeaturedSelection::default(),
        };
        match store.load() {
            Ok(Some(mut records)) => {
                let mut assigned = 0;
                for record in &mut records {
                    if record.ensure_id() {
                        assigned += 1;
                    }
                }
                if assigned > 0 {
                    log::info!("Assigned ids to {} stored recipes", assigned);
                    store.save(&records)?;
                }
                store.records = records;
                match store.load_featured() {
                    Ok(Some(featured)) => store.featured = featured,
                    Ok(None) => (),
                    Err(e @ AdminError::StorageRead { .. }) => log::warn!("{}", e),
                    Err(e) => return Err(e),
                }
            }
            Ok(None) => log::info!("No stored recipes, starting empty"),
            Err(e @ AdminError::StorageRead { .. }) => log::warn!("{}", e),
            Err(e) => return Err(e),
        }
        log::info!("Loaded {} recipes", store.records.len());
        Ok(store)
    }

    /// Reads the persisted collection. Absent and empty both yield `None`.
    pub fn load(&self) -> Result<Option<Vec<RecipeRecord>>> {
        let raw = match self.backend.get(RECIPES_KEY)? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        let unreadable = |reason: String| AdminError::StorageRead {
            key: RECIPES_KEY.to_string(),
            reason,
        };
        let value: Value = serde_json::from_str(&raw).map_err(|e| unreadable(e.to_string()))?;
        let items = match value {
            Value::Array(items) => items,
            _ => return Err(unreadable("not an array".to_string())),
        };
        if items.is_empty() {
            return Ok(None);
        }
        Ok(Some(items.into_iter().map(RecipeRecord::from).collect()))
    }

    pub fn save(&self, records: &[RecipeRecord]) -> Result<()> {
        self.backend.set(RECIPES_KEY, &serde_json::to_string(records)?)
    }

    pub fn load_featured(&self) -> Result<Option<FeaturedSelection>> {
        match self.backend.get(FEATURED_KEY)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| AdminError::StorageRead {
                    key: FEATURED_KEY.to_string(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    pub fn save_featured(&self, featured: &FeaturedSelection) -> Result<()> {
        self.backend.set(FEATURED_KEY, &serde_json::to_string(featured)?)
    }

    /// Writes `records` through and only then takes them as the collection.
    fn commit(&mut self, records: Vec<RecipeRecord>) -> Result<()> {
        self.save(&records)?;
        self.records = records;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[RecipeRecord] {
        &self.records
    }

    pub fn record(&self, index: usize) -> Result<&RecipeRecord> {
        self.records.get(index).ok_or(AdminError::IndexOutOfRange {
            index,
            len: self.records.len(),
        })
    }

    pub fn recipe(&self, index: usize) -> Result<Recipe> {
        self.record(index)?.to_recipe()
    }

    /// Appends a new recipe and returns its position.
    pub fn add(&mut self, mut recipe: Recipe) -> Result<usize> {
        if recipe.id.is_none() {
            recipe.id = Some(RecipeId::generate());
        }
        let mut records = self.records.clone();
        records.push(RecipeRecord::from_recipe(&recipe)?);
        self.commit(records)?;
        let index = self.records.len() - 1;
        log::debug!("Added recipe {:?} at {}", recipe.title, index);
        Ok(index)
    }

    /// Fails when the record at `index` no longer carries `id`.
    pub fn check_unchanged(&self, index: usize, id: Option<&RecipeId>) -> Result<()> {
        let current = self.record(index)?.id();
        match id {
            Some(id) if current.as_ref() != Some(id) => Err(AdminError::RecordChanged { index }),
            _ => Ok(()),
        }
    }

    /// Replaces the record at `index` in full. The old id carries over when
    /// `recipe` has none, and a different id is refused.
    pub fn replace(&mut self, index: usize, mut recipe: Recipe) -> Result<()> {
        self.check_unchanged(index, recipe.id.as_ref())?;
        if recipe.id.is_none() {
            recipe.id = self.records[index].id();
        }
        let mut records = self.records.clone();
        records[index] = RecipeRecord::from_recipe(&recipe)?;
        self.commit(records)?;
        log::debug!("Replaced recipe at {} with {:?}", index, recipe.title);
        Ok(())
    }

    /// Removes the record at `index`; later records move up by one.
    ///
    /// A featured selection stored by position only is left as it is and may
    /// now name a different recipe.
    pub fn delete(&mut self, index: usize) -> Result<RecipeRecord> {
        self.record(index)?;
        let mut records = self.records.clone();
        let removed = records.remove(index);
        self.commit(records)?;
        log::debug!("Deleted recipe at {}", index);
        Ok(removed)
    }

    /// Swaps in an imported collection.
    pub fn replace_all(&mut self, mut records: Vec<RecipeRecord>) -> Result<()> {
        for record in &mut records {
            record.ensure_id();
        }
        self.commit(records)?;
        log::info!("Imported {} recipes", self.records.len());
        Ok(())
    }

    /// Case-insensitive title search. An empty term matches nothing.
    pub fn search(&self, term: &str) -> Vec<(usize, String)> {
        let term = term.to_lowercase();
        if term.is_empty() {
            return Vec::new();
        }
        self.records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| {
                let title = r.title()?;
                title
                    .to_lowercase()
                    .contains(&term)
                    .then(|| (i, title.to_string()))
            })
            .collect()
    }

    pub fn export(&self) -> Result<String> {
        transfer::export_to(&self.records)
    }

    pub fn featured(&self) -> &FeaturedSelection {
        &self.featured
    }

    pub fn select_featured(&mut self, index: usize, additional_text: &str) -> Result<()> {
        if self.records.is_empty() {
            return Err(AdminError::MissingSelection("the collection is empty".to_string()));
        }
        let record = self.records.get(index).ok_or_else(|| {
            AdminError::MissingSelection(format!(
                "position {} is past the last recipe ({})",
                index.saturating_add(1),
                self.records.len()
            ))
        })?;
        self.featured = FeaturedSelection {
            recipe_index: index,
            additional_text: additional_text.to_string(),
            recipe_id: record.id(),
        };
        self.save_featured(&self.featured)?;
        log::debug!("Featured recipe at {}", index);
        Ok(())
    }

    /// Current position of the featured recipe.
    ///
    /// Selections carrying an id follow that recipe; older selections that
    /// only know a position are taken at face value.
    pub fn resolve_featured(&self) -> Result<usize> {
        if self.records.is_empty() {
            return Err(AdminError::MissingSelection("the collection is empty".to_string()));
        }
        match &self.featured.recipe_id {
            Some(id) => self
                .records
                .iter()
                .position(|r| r.id().as_ref() == Some(id))
                .ok_or_else(|| {
                    AdminError::MissingSelection(format!("recipe {} no longer exists", id))
                }),
            None if self.featured.recipe_index < self.records.len() => {
                Ok(self.featured.recipe_index)
            }
            None => Err(AdminError::MissingSelection(format!(
                "position {} is past the last recipe ({})",
                self.featured.recipe_index.saturating_add(1),
                self.records.len()
            ))),
        }
    }

    /// `featured.json` content, with the position brought up to date.
    pub fn export_featured(&self) -> Result<String> {
        let mut featured = self.featured.clone();
        featured.recipe_index = self.resolve_featured()?;
        transfer::export_featured(&featured)
    }

    pub fn featured_preview(&self) -> Result<FeaturedPreview> {
        let record = &self.records[self.resolve_featured()?];
        let text = |field: &str| record.text(field).filter(|s| !s.is_empty());
        Ok(FeaturedPreview {
            title: record.title().unwrap_or_default().to_string(),
            time: text("cookTime")
                .or_else(|| text("preparationTime"))
                .unwrap_or(NOT_AVAILABLE)
                .to_string(),
            portion: text("portion").unwrap_or(NOT_AVAILABLE).to_string(),
            difficulty: text("difficulty").unwrap_or(NOT_AVAILABLE).to_string(),
            additional_text: self.featured.additional_text.clone(),
        })
    }
}
