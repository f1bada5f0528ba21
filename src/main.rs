use dotenv::dotenv;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::*;
use teloxide::net::Download;
use teloxide::types::{Document, FileMeta, InputFile, ParseMode, PhotoSize};
use teloxide::{prelude::*, utils::command::BotCommands};

mod config;
mod db;
mod error;
mod form;
mod image;
mod mapper;
mod recipe;
mod store;
mod transfer;
mod view;

use config::Config;
use db::{KeyValueStore, MemoryStore, SqliteStore};
use form::{FormTree, NodeId};
use mapper::{Field, RecipeMapper};
use recipe::Ingredient;
use store::RecipeStore;

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type AdminDialogue = Dialogue<State, InMemStorage<State>>;
type SharedStore = Arc<Mutex<RecipeStore>>;

const NO_FORM: &str = "No form is open. Start one with /new or /edit <n>.";

#[derive(BotCommands, Clone)]
#[command(
    rename_rule = "lowercase",
    description = "These commands are supported:"
)]
enum Command {
    #[command(description = "Display this text.")]
    Help,
    #[command(description = "List all recipes.")]
    List,
    #[command(description = "Find recipes by title: /search <text>.")]
    Search(String),
    #[command(description = "Start writing a new recipe.")]
    New,
    #[command(description = "Open a recipe for editing: /edit <position>.")]
    Edit(String),
    #[command(description = "Set a field of the open form: /set <field> <value>.")]
    Set(String),
    #[command(description = "Add an ingredient group: /group [name].")]
    Group(String),
    #[command(description = "Add an ingredient: /ingredient <group#> [amount; unit; name].")]
    Ingredient(String),
    #[command(description = "Add a step: /step [time].")]
    Step(String),
    #[command(description = "Add an ingredient a step needs: /needed <step#> [amount; unit; name].")]
    Needed(String),
    #[command(description = "Add a substep: /substep <step#> [text].")]
    Substep(String),
    #[command(description = "Change a group, step, row or substep: /fill <#> <value>.")]
    Fill(String),
    #[command(description = "Remove a group, step, row or substep: /remove <#>.")]
    Remove(String),
    #[command(description = "Show the open form.")]
    Show,
    #[command(description = "Save the open form.")]
    Save,
    #[command(description = "Delete the recipe being edited: /delete yes.")]
    Delete(String),
    #[command(description = "Close the open form without saving.")]
    Cancel,
    #[command(description = "Download all recipes as recipes.json.")]
    Export,
    #[command(description = "Explain how to import recipes.json.")]
    Import,
    #[command(description = "Pick the featured recipe: /featured <position> [text].")]
    Featured(String),
    #[command(description = "Preview the featured recipe.")]
    Preview,
}

#[derive(Clone, Default)]
pub enum State {
    #[default]
    Menu,
    Create(FormTree),
    Edit {
        index: usize,
        form: FormTree,
    },
}

impl State {
    fn form_mut(&mut self) -> Option<(&mut FormTree, RecipeMapper)> {
        match self {
            State::Create(form) => Some((form, RecipeMapper::create())),
            State::Edit { form, .. } => Some((form, RecipeMapper::edit())),
            State::Menu => None,
        }
    }
}

#[tokio::main]
async fn main() {
    // Load all env variables from .env file.
    dotenv().ok();
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();
    log::info!("Starting recipe admin bot...");

    let config = Config::from_env();
    log::debug!("{:?}", config);
    let store = match open_store(&config) {
        Ok(store) => store,
        Err(e) => panic!("Failed to open the recipe store with error {}", e),
    };

    let bot = Bot::from_env();

    let commands = teloxide::filter_command::<Command, _>()
        .branch(dptree::case![Command::Help].endpoint(help))
        .branch(dptree::case![Command::List].endpoint(list))
        .branch(dptree::case![Command::Search(term)].endpoint(search))
        .branch(dptree::case![Command::New].endpoint(new_recipe))
        .branch(dptree::case![Command::Edit(position)].endpoint(edit_recipe))
        .branch(dptree::case![Command::Set(arg)].endpoint(set_field))
        .branch(dptree::case![Command::Group(arg)].endpoint(add_group))
        .branch(dptree::case![Command::Ingredient(arg)].endpoint(add_ingredient))
        .branch(dptree::case![Command::Step(arg)].endpoint(add_step))
        .branch(dptree::case![Command::Needed(arg)].endpoint(add_needed))
        .branch(dptree::case![Command::Substep(arg)].endpoint(add_substep))
        .branch(dptree::case![Command::Fill(arg)].endpoint(fill_node))
        .branch(dptree::case![Command::Remove(arg)].endpoint(remove_node))
        .branch(dptree::case![Command::Show].endpoint(show_form))
        .branch(dptree::case![Command::Save].endpoint(save_form))
        .branch(dptree::case![Command::Delete(arg)].endpoint(delete_recipe))
        .branch(dptree::case![Command::Cancel].endpoint(cancel))
        .branch(dptree::case![Command::Export].endpoint(export))
        .branch(dptree::case![Command::Import].endpoint(import_help))
        .branch(dptree::case![Command::Featured(arg)].endpoint(select_featured))
        .branch(dptree::case![Command::Preview].endpoint(preview));

    let handler = Update::filter_message()
        .enter_dialogue::<Message, InMemStorage<State>, State>()
        .branch(commands)
        .branch(Message::filter_document().endpoint(receive_document))
        .branch(Message::filter_photo().endpoint(receive_photo));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![
            Arc::new(Mutex::new(store)),
            InMemStorage::<State>::new()
        ])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn open_store(config: &Config) -> error::Result<RecipeStore> {
    let backend: Box<dyn KeyValueStore> = if config.in_memory {
        log::info!("Keeping recipes in memory only");
        Box::new(MemoryStore::new())
    } else {
        Box::new(SqliteStore::open(&config.db_path)?)
    };
    let mut store = RecipeStore::open(backend)?;
    if let Some(seed) = &config.seed {
        if store.is_empty() {
            log::info!("Seeding recipes from {:?}", seed);
            store.replace_all(transfer::import_file(seed)?)?;
        }
    }
    Ok(store)
}

fn lock(store: &SharedStore) -> MutexGuard<'_, RecipeStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn reply(bot: &Bot, msg: &Message, text: impl Into<String>) -> HandlerResult {
    for chunk in view::split_message(&text.into(), view::MESSAGE_LIMIT) {
        bot.send_message(msg.chat.id, chunk).await?;
    }
    Ok(())
}

/// Splits `head rest` on the first whitespace.
fn split_first(arg: &str) -> (&str, &str) {
    let arg = arg.trim();
    match arg.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (arg, ""),
    }
}

/// Turns the 1-based position shown by /list into an index.
fn parse_position(arg: &str) -> Result<usize, String> {
    match arg.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n - 1),
        _ => Err(format!("`{}` is not a recipe position, see /list.", arg.trim())),
    }
}

async fn download(
    bot: &Bot,
    file: &FileMeta,
) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
    let file = bot.get_file(file.id.clone()).await?;
    let mut raw = Vec::new();
    bot.download_file(&file.path, &mut raw).await?;
    log::debug!("Downloaded {} bytes from {}", raw.len(), file.path);
    Ok(raw)
}

async fn help(bot: Bot, msg: Message) -> HandlerResult {
    reply(&bot, &msg, Command::descriptions().to_string()).await
}

async fn list(bot: Bot, store: SharedStore, msg: Message) -> HandlerResult {
    let text = view::render_list(lock(&store).records());
    reply(&bot, &msg, text).await
}

async fn search(bot: Bot, store: SharedStore, msg: Message, term: String) -> HandlerResult {
    let hits = lock(&store).search(term.trim());
    reply(&bot, &msg, view::render_search(&hits)).await
}

async fn new_recipe(bot: Bot, dialogue: AdminDialogue, msg: Message) -> HandlerResult {
    let form = FormTree::new();
    let text = view::render_form(&form, &RecipeMapper::create());
    dialogue.update(State::Create(form)).await?;
    reply(&bot, &msg, text).await
}

async fn edit_recipe(
    bot: Bot,
    dialogue: AdminDialogue,
    store: SharedStore,
    msg: Message,
    position: String,
) -> HandlerResult {
    let index = match parse_position(&position) {
        Ok(index) => index,
        Err(text) => return reply(&bot, &msg, text).await,
    };
    let recipe = lock(&store).recipe(index);
    let recipe = match recipe {
        Ok(recipe) => recipe,
        Err(e) => return reply(&bot, &msg, e.to_string()).await,
    };

    let mapper = RecipeMapper::edit();
    let mut form = FormTree::new();
    if let Err(e) = mapper.populate(&mut form, &recipe) {
        return reply(&bot, &msg, e.to_string()).await;
    }
    let text = view::render_form(&form, &mapper);
    dialogue.update(State::Edit { index, form }).await?;
    reply(&bot, &msg, text).await?;

    if recipe.has_image() {
        match image::decode_data_url(&recipe.image) {
            Some((_, bytes)) => {
                bot.send_photo(msg.chat.id, InputFile::memory(bytes)).await?;
            }
            None => log::warn!("Recipe at {} has an unreadable image", index),
        }
    }
    Ok(())
}

/// Applies `op` to the open form and answers with the re-rendered form.
async fn update_form<F>(
    bot: &Bot,
    dialogue: &AdminDialogue,
    msg: &Message,
    mut state: State,
    op: F,
) -> HandlerResult
where
    F: FnOnce(&mut FormTree, &RecipeMapper) -> error::Result<()>,
{
    let text = match state.form_mut() {
        Some((form, mapper)) => match op(form, &mapper) {
            Ok(()) => view::render_form(form, &mapper),
            Err(e) => e.to_string(),
        },
        None => NO_FORM.to_string(),
    };
    dialogue.update(state).await?;
    reply(bot, msg, text).await
}

async fn set_field(
    bot: Bot,
    dialogue: AdminDialogue,
    msg: Message,
    state: State,
    arg: String,
) -> HandlerResult {
    update_form(&bot, &dialogue, &msg, state, |form, mapper| {
        let (name, value) = split_first(&arg);
        let field: Field = name.parse()?;
        mapper.set_field(form, field, value);
        Ok(())
    })
    .await
}

async fn add_group(
    bot: Bot,
    dialogue: AdminDialogue,
    msg: Message,
    state: State,
    arg: String,
) -> HandlerResult {
    update_form(&bot, &dialogue, &msg, state, |form, _| {
        form.add_group(arg.trim());
        Ok(())
    })
    .await
}

async fn add_ingredient(
    bot: Bot,
    dialogue: AdminDialogue,
    msg: Message,
    state: State,
    arg: String,
) -> HandlerResult {
    update_form(&bot, &dialogue, &msg, state, |form, _| {
        let (group, row) = split_first(&arg);
        form.add_ingredient(group.parse()?, Ingredient::from_row(row))?;
        Ok(())
    })
    .await
}

async fn add_step(
    bot: Bot,
    dialogue: AdminDialogue,
    msg: Message,
    state: State,
    arg: String,
) -> HandlerResult {
    update_form(&bot, &dialogue, &msg, state, |form, _| {
        form.add_step(arg.trim());
        Ok(())
    })
    .await
}

async fn add_needed(
    bot: Bot,
    dialogue: AdminDialogue,
    msg: Message,
    state: State,
    arg: String,
) -> HandlerResult {
    update_form(&bot, &dialogue, &msg, state, |form, _| {
        let (step, row) = split_first(&arg);
        form.add_needed(step.parse()?, Ingredient::from_row(row))?;
        Ok(())
    })
    .await
}

async fn add_substep(
    bot: Bot,
    dialogue: AdminDialogue,
    msg: Message,
    state: State,
    arg: String,
) -> HandlerResult {
    update_form(&bot, &dialogue, &msg, state, |form, _| {
        let (step, text) = split_first(&arg);
        form.add_substep(step.parse()?, text)?;
        Ok(())
    })
    .await
}

async fn fill_node(
    bot: Bot,
    dialogue: AdminDialogue,
    msg: Message,
    state: State,
    arg: String,
) -> HandlerResult {
    update_form(&bot, &dialogue, &msg, state, |form, _| {
        let (node, value) = split_first(&arg);
        form.fill(node.parse()?, value)
    })
    .await
}

async fn remove_node(
    bot: Bot,
    dialogue: AdminDialogue,
    msg: Message,
    state: State,
    arg: String,
) -> HandlerResult {
    update_form(&bot, &dialogue, &msg, state, |form, _| {
        form.remove(arg.parse::<NodeId>()?)
    })
    .await
}

async fn show_form(bot: Bot, dialogue: AdminDialogue, msg: Message, state: State) -> HandlerResult {
    update_form(&bot, &dialogue, &msg, state, |_, _| Ok(())).await
}

async fn save_form(
    bot: Bot,
    dialogue: AdminDialogue,
    store: SharedStore,
    msg: Message,
    state: State,
) -> HandlerResult {
    let (text, next) = match state {
        State::Create(form) => {
            let recipe = RecipeMapper::create().read(&form);
            let added = lock(&store).add(recipe);
            match added {
                Ok(index) => (
                    format!("Recipe added at position {}.", index + 1),
                    State::Create(FormTree::new()),
                ),
                Err(e) => (e.to_string(), State::Create(form)),
            }
        }
        State::Edit { index, form } => {
            let recipe = RecipeMapper::edit().read(&form);
            let saved = lock(&store).replace(index, recipe);
            match saved {
                Ok(()) => ("Changes saved.".to_string(), State::Menu),
                Err(e) => (e.to_string(), State::Edit { index, form }),
            }
        }
        State::Menu => (NO_FORM.to_string(), State::Menu),
    };
    dialogue.update(next).await?;
    reply(&bot, &msg, text).await
}

async fn delete_recipe(
    bot: Bot,
    dialogue: AdminDialogue,
    store: SharedStore,
    msg: Message,
    state: State,
    arg: String,
) -> HandlerResult {
    let (index, id) = match state {
        State::Edit { index, form } => (index, form.record_id().cloned()),
        _ => {
            let text = "Open a recipe with /edit <n> before deleting it.";
            return reply(&bot, &msg, text).await;
        }
    };
    if arg.trim() != "yes" {
        let text = "Really delete this recipe? Send /delete yes to confirm.";
        return reply(&bot, &msg, text).await;
    }
    let deleted = {
        let mut store = lock(&store);
        store
            .check_unchanged(index, id.as_ref())
            .and_then(|()| store.delete(index))
    };
    match deleted {
        Ok(_) => {
            dialogue.update(State::Menu).await?;
            reply(&bot, &msg, "Recipe deleted.").await
        }
        Err(e) => reply(&bot, &msg, e.to_string()).await,
    }
}

async fn cancel(bot: Bot, dialogue: AdminDialogue, msg: Message) -> HandlerResult {
    dialogue.update(State::Menu).await?;
    reply(&bot, &msg, "Form closed.").await
}

async fn export(bot: Bot, store: SharedStore, msg: Message) -> HandlerResult {
    let exported = lock(&store).export();
    match exported {
        Ok(json) => {
            bot.send_document(
                msg.chat.id,
                InputFile::memory(json.into_bytes()).file_name(transfer::RECIPES_FILE),
            )
            .await?;
            Ok(())
        }
        Err(e) => reply(&bot, &msg, e.to_string()).await,
    }
}

async fn import_help(bot: Bot, msg: Message) -> HandlerResult {
    reply(
        &bot,
        &msg,
        "Send a recipes.json file as a document. It replaces the current collection.",
    )
    .await
}

async fn select_featured(bot: Bot, store: SharedStore, msg: Message, arg: String) -> HandlerResult {
    let (position, text) = split_first(&arg);
    let index = match parse_position(position) {
        Ok(index) => index,
        Err(text) => return reply(&bot, &msg, text).await,
    };
    let exported = {
        let mut store = lock(&store);
        let text = if text.is_empty() {
            store.featured().additional_text.clone()
        } else {
            text.to_string()
        };
        store
            .select_featured(index, &text)
            .and_then(|()| store.export_featured())
    };
    match exported {
        Ok(json) => {
            bot.send_document(
                msg.chat.id,
                InputFile::memory(json.into_bytes()).file_name(transfer::FEATURED_FILE),
            )
            .await?;
            reply(&bot, &msg, "Featured recipe saved.").await
        }
        Err(e) => reply(&bot, &msg, e.to_string()).await,
    }
}

async fn preview(bot: Bot, store: SharedStore, msg: Message) -> HandlerResult {
    let preview = lock(&store).featured_preview();
    match preview {
        Ok(preview) => {
            bot.send_message(msg.chat.id, view::render_preview(&preview))
                .parse_mode(ParseMode::MarkdownV2)
                .await?;
            Ok(())
        }
        Err(e) => reply(&bot, &msg, e.to_string()).await,
    }
}

async fn receive_document(
    bot: Bot,
    dialogue: AdminDialogue,
    store: SharedStore,
    msg: Message,
    state: State,
    doc: Document,
) -> HandlerResult {
    let mime = doc
        .file_name
        .as_deref()
        .and_then(|name| image::image_mime(Path::new(name)));
    let raw = download(&bot, &doc.file).await?;

    if let Some(mime) = mime {
        let data_url = image::embed_image(&raw, mime);
        return update_form(&bot, &dialogue, &msg, state, move |form, _| {
            form.set_image(data_url);
            Ok(())
        })
        .await;
    }

    let imported = match transfer::import_bytes(&raw) {
        Ok(records) => {
            let mut store = lock(&store);
            store.replace_all(records).map(|()| store.len())
        }
        Err(e) => Err(e),
    };
    match imported {
        Ok(count) => {
            log::info!("Imported {} recipes from chat {}", count, msg.chat.id.0);
            let mut text = format!("Import successful, {} recipes loaded.", count);
            if !matches!(state, State::Menu) {
                dialogue.update(State::Menu).await?;
                text.push_str(" The open form was closed.");
            }
            reply(&bot, &msg, text).await
        }
        Err(e) => reply(&bot, &msg, e.to_string()).await,
    }
}

async fn receive_photo(
    bot: Bot,
    dialogue: AdminDialogue,
    msg: Message,
    state: State,
    photos: Vec<PhotoSize>,
) -> HandlerResult {
    let largest = match photos.last() {
        Some(photo) => photo,
        None => return Ok(()),
    };
    let raw = download(&bot, &largest.file).await?;
    let data_url = image::embed_image(&raw, image::JPEG);
    update_form(&bot, &dialogue, &msg, state, move |form, _| {
        form.set_image(data_url);
        Ok(())
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_first() {
        assert_eq!(split_first("  title  Tomato soup "), ("title", "Tomato soup"));
        assert_eq!(split_first("#3"), ("#3", ""));
        assert_eq!(split_first(""), ("", ""));
    }

    #[test]
    fn test_parse_position() {
        assert_eq!(parse_position("1"), Ok(0));
        assert_eq!(parse_position(" 12 "), Ok(11));
        assert!(parse_position("0").is_err());
        assert!(parse_position("soup").is_err());
    }

    #[test]
    fn test_state_form_uses_matching_layout() {
        let mut create = State::Create(FormTree::new());
        let (form, mapper) = create.form_mut().unwrap();
        mapper.set_field(form, Field::Title, "Soup");
        assert_eq!(form.input("title"), "Soup");

        let mut edit = State::Edit {
            index: 0,
            form: FormTree::new(),
        };
        let (form, mapper) = edit.form_mut().unwrap();
        mapper.set_field(form, Field::Title, "Soup");
        assert_eq!(form.input("edit-title"), "Soup");

        assert!(State::Menu.form_mut().is_none());
    }

    #[test]
    fn test_open_store_seeds_empty_collection() {
        let dir = tempfile::tempdir().unwrap();
        let seed = dir.path().join("seed.json");
        std::fs::write(&seed, r#"[{"title":"Seeded"}]"#).unwrap();
        let config = Config {
            db_path: dir.path().join("recipes.db"),
            in_memory: false,
            seed: Some(seed.clone()),
        };
        let store = open_store(&config).unwrap();
        assert_eq!(store.records()[0].title(), Some("Seeded"));
        drop(store);

        std::fs::write(&seed, r#"[{"title":"Other"}]"#).unwrap();
        let store = open_store(&config).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.records()[0].title(), Some("Seeded"));
    }
}
