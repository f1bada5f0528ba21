use std::fmt::Write;

use crate::form::{FormTree, IngredientRow};
use crate::mapper::{Field, RecipeMapper};
use crate::recipe::{Ingredient, RecipeRecord};
use crate::store::FeaturedPreview;

static SPECIAL_CHARACTERS: [char; 18] = [
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Longest message Telegram accepts, in UTF-16 code units.
pub const MESSAGE_LIMIT: usize = 4096;

/// Cuts `text` into messages of at most `limit` UTF-16 units, breaking
/// between lines where it can.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut size = 0;
    for line in text.split_inclusive('\n') {
        let line_size: usize = line.chars().map(char::len_utf16).sum();
        if size + line_size > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            size = 0;
        }
        for c in line.chars() {
            if size + c.len_utf16() > limit {
                chunks.push(std::mem::take(&mut current));
                size = 0;
            }
            current.push(c);
            size += c.len_utf16();
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if SPECIAL_CHARACTERS.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c)
    }
    escaped
}

pub fn render_list(records: &[RecipeRecord]) -> String {
    if records.is_empty() {
        return "No recipes yet. Send a recipes.json file to import one, or start with /new."
            .to_string();
    }
    let mut out = String::new();
    for (i, record) in records.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {} ({})",
            i + 1,
            record.title().unwrap_or_default(),
            record.text("category").unwrap_or_default()
        );
    }
    out
}

pub fn render_search(hits: &[(usize, String)]) -> String {
    if hits.is_empty() {
        return "No matching recipe.".to_string();
    }
    let mut out = String::new();
    for (i, title) in hits {
        let _ = writeln!(out, "/edit {} {}", i + 1, title);
    }
    out
}

fn ingredient_line(row: &IngredientRow) -> String {
    let Ingredient { amount, unit, name } = &row.ingredient;
    let parts: Vec<&str> = [amount, unit, name]
        .into_iter()
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .collect();
    format!("{} {}", row.id, parts.join(" "))
}

/// Text projection of a form, with the `#n` handles commands refer to.
pub fn render_form(form: &FormTree, mapper: &RecipeMapper) -> String {
    let mut out = String::new();
    for field in Field::ALL {
        let _ = writeln!(out, "{}: {}", field.label(), mapper.field(form, field));
    }
    let image = if form.image().is_empty() { "none" } else { "attached" };
    let _ = writeln!(out, "Image: {}", image);

    let _ = writeln!(out, "\nIngredients:");
    for group in form.groups() {
        let _ = writeln!(out, "{} {} {}", group.id, group.label, group.name);
        for row in &group.rows {
            let _ = writeln!(out, "    {}", ingredient_line(row));
        }
    }

    let _ = writeln!(out, "\nSteps:");
    for step in form.steps() {
        let _ = writeln!(out, "{} {} ({})", step.id, step.label, step.time);
        for row in &step.needed {
            let _ = writeln!(out, "    needs {}", ingredient_line(row));
        }
        for substep in &step.substeps {
            let _ = writeln!(out, "    {} {}", substep.id, substep.text);
        }
    }
    out
}

pub fn render_preview(preview: &FeaturedPreview) -> String {
    let mut out = format!(
        "*{}*\nTime: {}\nPortions: {}\nDifficulty: {}",
        escape_markdown(&preview.title),
        escape_markdown(&preview.time),
        escape_markdown(&preview.portion),
        escape_markdown(&preview.difficulty),
    );
    if !preview.additional_text.is_empty() {
        out.push_str("\n\n");
        out.push_str(&escape_markdown(&preview.additional_text));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("Mac & Cheese (v2)!"), "Mac & Cheese \\(v2\\)\\!");
    }

    #[test]
    fn test_render_list() {
        let records = vec![
            RecipeRecord::from(json!({"title": "Soup", "category": "Starter"})),
            RecipeRecord::from(json!("odd entry")),
        ];
        assert_eq!(render_list(&records), "1. Soup (Starter)\n2.  ()\n");
        assert!(render_list(&[]).starts_with("No recipes yet"));
    }

    #[test]
    fn test_render_search() {
        let hits = vec![(2, "Tomato Soup".to_string())];
        assert_eq!(render_search(&hits), "/edit 3 Tomato Soup\n");
        assert_eq!(render_search(&[]), "No matching recipe.");
    }

    #[test]
    fn test_render_form_shows_handles() {
        let mapper = RecipeMapper::create();
        let mut form = FormTree::new();
        mapper.set_field(&mut form, Field::Title, "Pesto");
        let group = form.add_group("Sauce");
        form.add_ingredient(group, Ingredient::new("50", "g", "basil"))
            .unwrap();
        let step = form.add_step("5 min");
        form.add_substep(step, "Blend.").unwrap();

        let text = render_form(&form, &mapper);
        assert!(text.starts_with("Title: Pesto\n"));
        assert!(text.contains("Image: none"));
        assert!(text.contains("#1 Group 1 Sauce"));
        assert!(text.contains("    #2 50 g basil"));
        assert!(text.contains("#3 Step 1 (5 min)"));
        assert!(text.contains("    #4 Blend."));
    }

    #[test]
    fn test_split_message_keeps_short_text_whole() {
        assert_eq!(split_message("a\nb\n", 10), vec!["a\nb\n"]);
        assert!(split_message("", 10).is_empty());
    }

    #[test]
    fn test_split_message_breaks_between_lines() {
        assert_eq!(
            split_message("1234\n5678\n90\n", 6),
            vec!["1234\n", "5678\n", "90\n"]
        );
    }

    #[test]
    fn test_long_form_fits_message_limit() {
        let mapper = RecipeMapper::edit();
        let mut form = FormTree::new();
        mapper.set_field(&mut form, Field::Title, "Feast");
        mapper.set_field(&mut form, Field::Tips, &"salt to taste ".repeat(600));
        let group = form.add_group("Everything");
        for i in 0..200 {
            form.add_ingredient(group, Ingredient::new(&i.to_string(), "g", "flour"))
                .unwrap();
        }
        let text = render_form(&form, &mapper);
        assert!(text.len() > MESSAGE_LIMIT);

        let chunks = split_message(&text, MESSAGE_LIMIT);
        assert!(chunks.len() > 1);
        assert!(chunks
            .iter()
            .all(|c| c.encode_utf16().count() <= MESSAGE_LIMIT));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_split_message_counts_utf16_units() {
        let tomato = "\u{1F345}";
        let chunks = split_message(&tomato.repeat(5), 4);
        assert_eq!(chunks, vec![tomato.repeat(2), tomato.repeat(2), tomato.repeat(1)]);
    }

    #[test]
    fn test_render_preview() {
        let preview = FeaturedPreview {
            title: "Pie".to_string(),
            time: "N/A".to_string(),
            portion: "4".to_string(),
            difficulty: "easy".to_string(),
            additional_text: String::new(),
        };
        assert_eq!(
            render_preview(&preview),
            "*Pie*\nTime: N/A\nPortions: 4\nDifficulty: easy"
        );
    }
}
