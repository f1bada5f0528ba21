use crate::form::NodeId;

pub type Result<T> = std::result::Result<T, AdminError>;

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    /// Import payload is not JSON, or its root is not an array.
    #[error("import failed: {0}")]
    Parse(String),

    /// Persisted value exists but cannot be read back.
    #[error("stored value under `{key}` is unreadable: {reason}")]
    StorageRead { key: String, reason: String },

    #[error("no recipe to feature: {0}")]
    MissingSelection(String),

    /// Entry of the collection does not have the shape of a recipe.
    #[error("entry is not a recipe: {0}")]
    Shape(String),

    #[error("there is no recipe at position {} (collection has {len})", .index.saturating_add(1))]
    IndexOutOfRange { index: usize, len: usize },

    #[error("the recipe at position {} changed since it was opened, open it again with /edit", .index.saturating_add(1))]
    RecordChanged { index: usize },

    #[error("unknown field `{0}`")]
    UnknownField(String),

    #[error("no form element {0}")]
    UnknownNode(NodeId),

    #[error("`{0}` is not a form element number")]
    InvalidNode(String),

    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization failure: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
