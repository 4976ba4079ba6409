//! Scripted stand-ins for the completion service, the generator and the executor.

use crate::db::executor::{ExecutionResult, QueryExecutor, QueryResult};
use crate::db::value::CellValue;
use crate::llm::{
    CompletionService, ErrorContext, GeneratedQuery, GeneratorError, Prompt, ServiceError,
    SqlGenerator,
};
use crate::schema::SchemaText;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;

/// A per-process path under the system temp directory.
pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("askretro-{}-{}", std::process::id(), name))
}

pub fn one_column(column: &str, value: &str) -> QueryResult {
    QueryResult {
        columns: vec![column.to_string()],
        rows: vec![vec![CellValue::Text(value.to_string())]],
    }
}

pub struct ScriptedCompletion {
    responses: Mutex<VecDeque<Result<String, ServiceError>>>,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedCompletion {
    pub fn new(responses: Vec<Result<String, ServiceError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, prompt: &Prompt) -> Result<String, ServiceError> {
        self.prompts.lock().unwrap().push(prompt.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("completion called more often than scripted")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorCall {
    pub question: String,
    pub prior_error: Option<ErrorContext>,
}

pub struct ScriptedGenerator {
    results: Mutex<VecDeque<Result<GeneratedQuery, GeneratorError>>>,
    calls: Mutex<Vec<GeneratorCall>>,
}

impl ScriptedGenerator {
    pub fn new(results: Vec<Result<GeneratedQuery, GeneratorError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_queries(queries: &[&str]) -> Self {
        Self::new(queries.iter().map(|q| Ok(GeneratedQuery::new(*q))).collect())
    }

    pub fn calls(&self) -> Vec<GeneratorCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SqlGenerator for ScriptedGenerator {
    async fn generate_sql(
        &self,
        question: &str,
        _schema: &SchemaText,
        prior_error: Option<&ErrorContext>,
    ) -> Result<GeneratedQuery, GeneratorError> {
        self.calls.lock().unwrap().push(GeneratorCall {
            question: question.to_string(),
            prior_error: prior_error.cloned(),
        });
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .expect("generator called more often than scripted")
    }
}

pub struct ScriptedExecutor {
    results: Mutex<VecDeque<ExecutionResult>>,
    executed: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new(results: Vec<ExecutionResult>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

impl QueryExecutor for ScriptedExecutor {
    fn execute(&self, query: &GeneratedQuery) -> ExecutionResult {
        self.executed.lock().unwrap().push(query.sql().to_string());
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .expect("executor called more often than scripted")
    }
}
