use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// A tracked brand entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityConfig {
    pub name: String,
    /// Short company description handed to the model as disambiguation context.
    #[serde(default)]
    pub description: Option<String>,
    /// Set when the name is also an ordinary word (e.g. "Realize").
    #[serde(default)]
    pub ambiguous: bool,
    /// Terms that must co-occur with an ambiguous name for a match.
    #[serde(default)]
    pub context_keywords: Vec<String>,
}

/// How the entity matcher decides that a post mentions an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchPolicy {
    /// Case-insensitive substring match is enough.
    Unambiguous,
    /// Capitalized whole-word mention plus at least one context keyword.
    Ambiguous { context_keywords: Vec<String> },
}

impl EntityConfig {
    #[must_use]
    pub fn policy(&self) -> MatchPolicy {
        if self.ambiguous {
            MatchPolicy::Ambiguous {
                context_keywords: self.context_keywords.clone(),
            }
        } else {
            MatchPolicy::Unambiguous
        }
    }
}

impl std::fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchPolicy::Unambiguous => write!(f, "unambiguous"),
            MatchPolicy::Ambiguous { context_keywords } => {
                write!(f, "ambiguous ({})", context_keywords.join(", "))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EntitiesFile {
    pub entities: Vec<EntityConfig>,
}

/// Load and validate the tracked entities from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_entities(path: &Path) -> Result<EntitiesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::EntitiesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let entities_file: EntitiesFile =
        serde_yaml::from_str(&content).map_err(ConfigError::EntitiesFileParse)?;

    validate_entities(&entities_file)?;

    Ok(entities_file)
}

fn validate_entities(entities_file: &EntitiesFile) -> Result<(), ConfigError> {
    if entities_file.entities.is_empty() {
        return Err(ConfigError::Validation(
            "at least one entity must be tracked".to_string(),
        ));
    }

    let mut seen_names = HashSet::new();

    for entity in &entities_file.entities {
        if entity.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "entity name must be non-empty".to_string(),
            ));
        }

        if !seen_names.insert(entity.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate entity name: '{}'",
                entity.name
            )));
        }

        if entity.ambiguous
            && entity
                .context_keywords
                .iter()
                .all(|kw| kw.trim().is_empty())
        {
            return Err(ConfigError::Validation(format!(
                "ambiguous entity '{}' needs at least one context keyword",
                entity.name
            )));
        }
    }

    Ok(())
}
