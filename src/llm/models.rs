use crate::db::executor::ExecutionError;
use serde::{Deserialize, Serialize};
use std::fmt;

// One request to the completion service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

// A single SQL statement extracted from a model response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedQuery(String);

impl GeneratedQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }

    pub fn sql(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GeneratedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// What the generator is told about the previous failed attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContext {
    pub failed_query: String,
    pub message: String,
}

impl From<&ExecutionError> for ErrorContext {
    fn from(err: &ExecutionError) -> Self {
        Self {
            failed_query: err.query.clone(),
            message: err.message.clone(),
        }
    }
}
