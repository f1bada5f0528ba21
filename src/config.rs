use std::env;
use std::path::PathBuf;

const DEFAULT_DB_PATH: &str = "recipes.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// SQLite file holding the collection.
    pub db_path: PathBuf,
    /// Keep everything in process memory, nothing survives a restart.
    pub in_memory: bool,
    /// Collection imported at startup when nothing is stored yet.
    pub seed: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let in_memory = lookup("RECIPE_ADMIN_IN_MEMORY")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Config {
            db_path: lookup("RECIPE_ADMIN_DB")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            in_memory,
            seed: lookup("RECIPE_ADMIN_SEED")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.db_path, PathBuf::from("recipes.db"));
        assert!(!config.in_memory);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("RECIPE_ADMIN_DB", "/var/lib/recipes/admin.db"),
            ("RECIPE_ADMIN_IN_MEMORY", "True"),
            ("RECIPE_ADMIN_SEED", "assets/recipes.json"),
        ]);
        assert_eq!(config.db_path, PathBuf::from("/var/lib/recipes/admin.db"));
        assert!(config.in_memory);
        assert_eq!(config.seed, Some(PathBuf::from("assets/recipes.json")));
    }

    #[test]
    fn test_blank_values_fall_back() {
        let config = config(&[("RECIPE_ADMIN_DB", ""), ("RECIPE_ADMIN_IN_MEMORY", "0")]);
        assert_eq!(config.db_path, PathBuf::from("recipes.db"));
        assert!(!config.in_memory);
    }
}
