use crate::config::{ConfigurationError, SchemaConfig};
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// The data dictionary handed to the generator. Loaded once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaText(Arc<str>);

impl SchemaText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(Arc::from(text.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for SchemaText {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reads the schema description document and the optional hints document.
pub struct SchemaDescriptor {
    description_path: PathBuf,
    hints_path: Option<PathBuf>,
}

impl SchemaDescriptor {
    pub fn new(description_path: impl Into<PathBuf>, hints_path: Option<PathBuf>) -> Self {
        Self {
            description_path: description_path.into(),
            hints_path,
        }
    }

    pub fn from_config(config: &SchemaConfig) -> Self {
        Self::new(
            &config.description_path,
            config.hints_path.as_ref().map(PathBuf::from),
        )
    }

    pub fn describe(&self) -> Result<SchemaText, ConfigurationError> {
        let path = self.description_path.display().to_string();
        let description = std::fs::read_to_string(&self.description_path).map_err(|source| {
            ConfigurationError::SchemaUnavailable {
                path: path.clone(),
                source,
            }
        })?;

        if description.trim().is_empty() {
            return Err(ConfigurationError::EmptySchema(path));
        }

        let mut text = description.trim_end().to_string();
        if let Some(hints) = self.hints_path.as_deref().and_then(read_hints) {
            text.push_str("\n\n");
            text.push_str(hints.trim_end());
        }

        info!("Loaded schema description from {} ({} bytes)", path, text.len());
        Ok(SchemaText::new(text))
    }
}

fn read_hints(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(hints) if hints.trim().is_empty() => None,
        Ok(hints) => Some(hints),
        Err(e) => {
            warn!("Hints file {} not loaded ({}), continuing without hints", path.display(), e);
            None
        }
    }
}
