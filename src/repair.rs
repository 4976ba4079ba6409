//! The generate → execute → regenerate-with-error loop run once per question.
//!
//! Generation failures (the service failed, or no SQL could be extracted) end the cycle
//! immediately. Execution failures are fed back to the generator until `max_attempts`
//! executions have been made.

use crate::db::executor::{ExecutionError, QueryExecutor, QueryResult};
use crate::llm::{
    ErrorContext, GeneratedQuery, GenerationError, GeneratorError, ServiceError, SqlGenerator,
};
use crate::schema::SchemaText;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// One execution within a repair cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub number: u32,
    pub query: String,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Success {
    pub query: GeneratedQuery,
    pub result: QueryResult,
    pub attempts: Vec<AttemptRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// Every permitted execution failed; holds the last one.
    Exhausted(ExecutionError),
    Generation(GenerationError),
    Service(ServiceError),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Exhausted(err) => err.fmt(f),
            FailureReason::Generation(err) => err.fmt(f),
            FailureReason::Service(err) => err.fmt(f),
        }
    }
}

impl From<GeneratorError> for FailureReason {
    fn from(err: GeneratorError) -> Self {
        match err {
            GeneratorError::Service(e) => FailureReason::Service(e),
            GeneratorError::Generation(e) => FailureReason::Generation(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub reason: FailureReason,
    pub attempts: Vec<AttemptRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RepairOutcome {
    Succeeded(Success),
    Failed(Failure),
}

impl RepairOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RepairOutcome::Succeeded(_))
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            RepairOutcome::Succeeded(success) => &success.attempts,
            RepairOutcome::Failed(failure) => &failure.attempts,
        }
    }
}

enum RepairState {
    Generating,
    Executing(GeneratedQuery),
    RetryingWithContext(ExecutionError),
    Succeeded(GeneratedQuery, QueryResult),
    ExhaustedFailed(FailureReason),
}

pub struct RepairLoop {
    generator: Arc<dyn SqlGenerator>,
    executor: Arc<dyn QueryExecutor>,
    schema: SchemaText,
    max_attempts: u32,
}

impl RepairLoop {
    pub fn new(
        generator: Arc<dyn SqlGenerator>,
        executor: Arc<dyn QueryExecutor>,
        schema: SchemaText,
        max_attempts: u32,
    ) -> Self {
        Self {
            generator,
            executor,
            schema,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs one full repair cycle for `question`.
    pub async fn run(&self, question: &str) -> RepairOutcome {
        let mut state = RepairState::Generating;
        let mut attempt: u32 = 1;
        let mut history: Vec<AttemptRecord> = Vec::new();

        loop {
            state = match state {
                RepairState::Generating => {
                    info!("Generating SQL for question: {}", question);
                    match self.generator.generate_sql(question, &self.schema, None).await {
                        Ok(query) => RepairState::Executing(query),
                        Err(e) => {
                            error!("SQL generation failed: {}", e);
                            RepairState::ExhaustedFailed(e.into())
                        }
                    }
                }
                RepairState::Executing(query) => {
                    info!("Executing attempt {} of {}: {}", attempt, self.max_attempts, query);
                    let started_at = Utc::now();
                    let start_time = Instant::now();
                    let outcome = self.executor.execute(&query);
                    let elapsed_ms = start_time.elapsed().as_millis() as u64;

                    history.push(AttemptRecord {
                        number: attempt,
                        query: query.sql().to_string(),
                        error: outcome.as_ref().err().map(|e| e.message.clone()),
                        started_at,
                        elapsed_ms,
                    });

                    match outcome {
                        Ok(result) => RepairState::Succeeded(query, result),
                        Err(e) if attempt < self.max_attempts => {
                            warn!(
                                "Attempt {} of {} failed, retrying with error context: {}",
                                attempt, self.max_attempts, e.message
                            );
                            attempt += 1;
                            RepairState::RetryingWithContext(e)
                        }
                        Err(e) => {
                            error!("Giving up after {} attempts: {}", attempt, e.message);
                            RepairState::ExhaustedFailed(FailureReason::Exhausted(e))
                        }
                    }
                }
                RepairState::RetryingWithContext(failed) => {
                    let context = ErrorContext::from(&failed);
                    match self
                        .generator
                        .generate_sql(question, &self.schema, Some(&context))
                        .await
                    {
                        Ok(query) => RepairState::Executing(query),
                        Err(e) => {
                            error!("Corrected SQL generation failed: {}", e);
                            RepairState::ExhaustedFailed(e.into())
                        }
                    }
                }
                RepairState::Succeeded(query, result) => {
                    info!("Question answered after {} attempt(s)", history.len());
                    return RepairOutcome::Succeeded(Success {
                        query,
                        result,
                        attempts: history,
                    });
                }
                RepairState::ExhaustedFailed(reason) => {
                    return RepairOutcome::Failed(Failure {
                        reason,
                        attempts: history,
                    });
                }
            };
        }
    }
}
