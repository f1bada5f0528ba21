use std::str::FromStr;

use crate::error::{self, AdminError};
use crate::form::FormTree;
use crate::recipe::{IngredientGroup, NutritionFacts, Recipe, Step};

/// Scalar inputs of the recipe form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Subtitle,
    Category,
    PreparationTime,
    CookTime,
    Portion,
    Difficulty,
    Tips,
    Kcal,
    Protein,
    Carbs,
    Fat,
    Fiber,
}

impl Field {
    pub const ALL: [Field; 13] = [
        Field::Title,
        Field::Subtitle,
        Field::Category,
        Field::PreparationTime,
        Field::CookTime,
        Field::Portion,
        Field::Difficulty,
        Field::Tips,
        Field::Kcal,
        Field::Protein,
        Field::Carbs,
        Field::Fat,
        Field::Fiber,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Subtitle => "subtitle",
            Field::Category => "category",
            Field::PreparationTime => "preparation-time",
            Field::CookTime => "cook-time",
            Field::Portion => "portion",
            Field::Difficulty => "difficulty",
            Field::Tips => "tips",
            Field::Kcal => "kcal",
            Field::Protein => "protein",
            Field::Carbs => "carbs",
            Field::Fat => "fat",
            Field::Fiber => "fiber",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Field::Title => "Title",
            Field::Subtitle => "Subtitle",
            Field::Category => "Category",
            Field::PreparationTime => "Preparation time",
            Field::CookTime => "Cook time",
            Field::Portion => "Portions",
            Field::Difficulty => "Difficulty",
            Field::Tips => "Tips",
            Field::Kcal => "kcal",
            Field::Protein => "Protein",
            Field::Carbs => "Carbs",
            Field::Fat => "Fat",
            Field::Fiber => "Fiber",
        }
    }
}

impl FromStr for Field {
    type Err = AdminError;

    /// Accepts the form name (`cook-time`) as well as the JSON key (`cookTime`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        Field::ALL
            .into_iter()
            .find(|f| f.name().replace('-', "") == key)
            .ok_or_else(|| AdminError::UnknownField(s.to_string()))
    }
}

/// Element ids of the scalar inputs of one form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormLayout {
    pub title: String,
    pub subtitle: String,
    pub category: String,
    pub preparation_time: String,
    pub cook_time: String,
    pub portion: String,
    pub difficulty: String,
    pub tips: String,
    pub kcal: String,
    pub protein: String,
    pub carbs: String,
    pub fat: String,
    pub fiber: String,
}

impl FormLayout {
    pub fn with_prefix(prefix: &str) -> Self {
        let id = |field: Field| format!("{}{}", prefix, field.name());
        FormLayout {
            title: id(Field::Title),
            subtitle: id(Field::Subtitle),
            category: id(Field::Category),
            preparation_time: id(Field::PreparationTime),
            cook_time: id(Field::CookTime),
            portion: id(Field::Portion),
            difficulty: id(Field::Difficulty),
            tips: id(Field::Tips),
            kcal: id(Field::Kcal),
            protein: id(Field::Protein),
            carbs: id(Field::Carbs),
            fat: id(Field::Fat),
            fiber: id(Field::Fiber),
        }
    }

    pub fn create() -> Self {
        Self::with_prefix("")
    }

    pub fn edit() -> Self {
        Self::with_prefix("edit-")
    }

    pub fn element_id(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Subtitle => &self.subtitle,
            Field::Category => &self.category,
            Field::PreparationTime => &self.preparation_time,
            Field::CookTime => &self.cook_time,
            Field::Portion => &self.portion,
            Field::Difficulty => &self.difficulty,
            Field::Tips => &self.tips,
            Field::Kcal => &self.kcal,
            Field::Protein => &self.protein,
            Field::Carbs => &self.carbs,
            Field::Fat => &self.fat,
            Field::Fiber => &self.fiber,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecipeMapper {
    layout: FormLayout,
}

impl RecipeMapper {
    pub fn new(layout: FormLayout) -> Self {
        RecipeMapper { layout }
    }

    pub fn create() -> Self {
        Self::new(FormLayout::create())
    }

    pub fn edit() -> Self {
        Self::new(FormLayout::edit())
    }

    pub fn field<'a>(&self, form: &'a FormTree, field: Field) -> &'a str {
        form.input(self.layout.element_id(field))
    }

    pub fn set_field(&self, form: &mut FormTree, field: Field, value: &str) {
        form.set_input(self.layout.element_id(field), value);
    }

    /// Reads the form back into a recipe, in tree order. Blank inputs stay blank.
    pub fn read(&self, form: &FormTree) -> Recipe {
        let text = |field| self.field(form, field).to_string();

        let ingredients = form
            .groups()
            .iter()
            .map(|group| IngredientGroup {
                group: group.name.clone(),
                items: group.rows.iter().map(|r| r.ingredient.clone()).collect(),
            })
            .collect();

        let steps = form
            .steps()
            .iter()
            .map(|step| Step {
                time: step.time.clone(),
                needed: step.needed.iter().map(|r| r.ingredient.clone()).collect(),
                substeps: step.substeps.iter().map(|s| s.text.clone()).collect(),
            })
            .collect();

        Recipe {
            id: form.record_id().cloned(),
            title: text(Field::Title),
            subtitle: text(Field::Subtitle),
            category: text(Field::Category),
            preparation_time: text(Field::PreparationTime),
            cook_time: text(Field::CookTime),
            portion: text(Field::Portion),
            difficulty: text(Field::Difficulty),
            ingredients,
            steps,
            tips: text(Field::Tips),
            nutrition: NutritionFacts {
                kcal: text(Field::Kcal),
                protein: text(Field::Protein),
                carbs: text(Field::Carbs),
                fat: text(Field::Fat),
                fiber: text(Field::Fiber),
            },
            image: form.image().to_string(),
        }
    }

    /// Rebuilds the form from `recipe`, discarding whatever it held before.
    pub fn populate(&self, form: &mut FormTree, recipe: &Recipe) -> error::Result<()> {
        form.reset();
        let scalars = [
            (Field::Title, &recipe.title),
            (Field::Subtitle, &recipe.subtitle),
            (Field::Category, &recipe.category),
            (Field::PreparationTime, &recipe.preparation_time),
            (Field::CookTime, &recipe.cook_time),
            (Field::Portion, &recipe.portion),
            (Field::Difficulty, &recipe.difficulty),
            (Field::Tips, &recipe.tips),
            (Field::Kcal, &recipe.nutrition.kcal),
            (Field::Protein, &recipe.nutrition.protein),
            (Field::Carbs, &recipe.nutrition.carbs),
            (Field::Fat, &recipe.nutrition.fat),
            (Field::Fiber, &recipe.nutrition.fiber),
        ];
        for (field, value) in scalars {
            self.set_field(form, field, value);
        }
        form.set_record_id(recipe.id.clone());
        form.set_image(recipe.image.clone());

        for group in &recipe.ingredients {
            let block = form.add_group(&group.group);
            for item in &group.items {
                form.add_ingredient(block, item.clone())?;
            }
        }
        for step in &recipe.steps {
            let block = form.add_step(&step.time);
            for item in &step.needed {
                form.add_needed(block, item.clone())?;
            }
            for text in &step.substeps {
                form.add_substep(block, text)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::{Ingredient, RecipeId};

    fn sample() -> Recipe {
        Recipe {
            id: Some(RecipeId::from("0011223344556677")),
            title: "Shakshuka".to_string(),
            subtitle: "Eggs in tomato sauce".to_string(),
            category: "Breakfast".to_string(),
            preparation_time: "10 min".to_string(),
            cook_time: "20 min".to_string(),
            portion: "2".to_string(),
            difficulty: "easy".to_string(),
            ingredients: vec![
                IngredientGroup {
                    group: "Sauce".to_string(),
                    items: vec![
                        Ingredient::new("400", "g", "tomatoes"),
                        Ingredient::new("1", "", "onion"),
                    ],
                },
                IngredientGroup {
                    group: "Topping".to_string(),
                    items: vec![Ingredient::new("4", "pcs", "eggs")],
                },
                IngredientGroup::default(),
            ],
            steps: vec![
                Step {
                    time: "5 min".to_string(),
                    needed: vec![Ingredient::new("1", "", "onion")],
                    substeps: vec!["Dice the onion.".to_string(), "Sweat it.".to_string()],
                },
                Step {
                    time: "15 min".to_string(),
                    needed: vec![],
                    substeps: vec!["Crack in the eggs.".to_string()],
                },
            ],
            tips: "Serve with bread.".to_string(),
            nutrition: NutritionFacts {
                kcal: "420".to_string(),
                protein: "20 g".to_string(),
                carbs: "18 g".to_string(),
                fat: "25 g".to_string(),
                fiber: "5 g".to_string(),
            },
            image: "data:image/png;base64,AAAA".to_string(),
        }
    }

    #[test]
    fn test_populate_then_read_round_trips() {
        let mapper = RecipeMapper::edit();
        let mut form = FormTree::new();
        let recipe = sample();
        mapper.populate(&mut form, &recipe).unwrap();
        assert_eq!(mapper.read(&form), recipe);
    }

    #[test]
    fn test_round_trip_of_empty_recipe() {
        let mapper = RecipeMapper::create();
        let mut form = FormTree::new();
        mapper.populate(&mut form, &Recipe::default()).unwrap();
        assert_eq!(mapper.read(&form), Recipe::default());
    }

    #[test]
    fn test_blank_form_reads_as_empty_strings() {
        let mapper = RecipeMapper::create();
        let mut form = FormTree::new();
        let group = form.add_group("");
        form.add_ingredient(group, Ingredient::default()).unwrap();
        let step = form.add_step("");
        form.add_substep(step, "").unwrap();

        let recipe = mapper.read(&form);
        assert_eq!(recipe.title, "");
        assert_eq!(recipe.ingredients[0].items, vec![Ingredient::default()]);
        assert_eq!(recipe.steps[0].substeps, vec![String::new()]);
    }

    #[test]
    fn test_add_then_remove_is_identity() {
        let mapper = RecipeMapper::edit();
        let mut form = FormTree::new();
        let recipe = sample();
        mapper.populate(&mut form, &recipe).unwrap();

        let group = form.groups()[0].id;
        let step = form.steps()[1].id;

        let row = form.add_ingredient(group, Ingredient::default()).unwrap();
        form.remove(row).unwrap();
        let needed = form.add_needed(step, Ingredient::default()).unwrap();
        form.remove(needed).unwrap();
        let substep = form.add_substep(step, "").unwrap();
        form.remove(substep).unwrap();
        let new_step = form.add_step("");
        form.remove(new_step).unwrap();
        let new_group = form.add_group("");
        form.remove(new_group).unwrap();

        assert_eq!(mapper.read(&form), recipe);
    }

    #[test]
    fn test_layouts_agree_on_same_data() {
        let recipe = sample();
        let create = RecipeMapper::create();
        let edit = RecipeMapper::edit();
        let mut create_form = FormTree::new();
        let mut edit_form = FormTree::new();
        create.populate(&mut create_form, &recipe).unwrap();
        edit.populate(&mut edit_form, &recipe).unwrap();

        assert_eq!(create_form.input("title"), "Shakshuka");
        assert_eq!(edit_form.input("edit-title"), "Shakshuka");
        assert_eq!(edit_form.input("title"), "");
        assert_eq!(create.read(&create_form), edit.read(&edit_form));
    }

    #[test]
    fn test_field_names() {
        assert_eq!("cookTime".parse::<Field>().unwrap(), Field::CookTime);
        assert_eq!("preparation-time".parse::<Field>().unwrap(), Field::PreparationTime);
        assert_eq!("KCAL".parse::<Field>().unwrap(), Field::Kcal);
        assert!("colour".parse::<Field>().is_err());
        assert_eq!(FormLayout::edit().element_id(Field::Fiber), "edit-fiber");
    }
}
