use crate::llm::extract::extract_sql;
use crate::llm::{
    CompletionService, ErrorContext, GeneratedQuery, GeneratorError, Prompt, SqlGenerator,
};
use crate::schema::SchemaText;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Turns questions into SQL with one completion call per invocation.
pub struct QueryGenerator {
    completion: Arc<dyn CompletionService>,
    dialect: String,
}

impl QueryGenerator {
    pub fn new(completion: Arc<dyn CompletionService>, dialect: impl Into<String>) -> Self {
        Self {
            completion,
            dialect: dialect.into(),
        }
    }

    fn prepare_system_prompt(&self, schema: &SchemaText) -> String {
        format!(
            r#"### Instructions:
You are a SQL expert. Your task is to convert a question into a single valid {dialect} query, given a database schema.
Adhere to these rules:
- **Deliberately go through the question and database schema word by word** to appropriately answer the question
- **Use the exact spelling of table and column names as provided in the schema**
- **Use Table Aliases** to prevent ambiguity. For example, `SELECT t1.col1, t2.col1 FROM table1 t1 JOIN table2 t2 ON t1.id = t2.id`.
- When creating a ratio, always cast the numerator as float
- Only read data: write exactly one SELECT statement
- Only provide the SQL query and nothing else

### Database schema:
{schema}"#,
            dialect = self.dialect,
            schema = schema.as_str().trim_end(),
        )
    }

    fn prepare_question_prompt(&self, question: &str) -> String {
        format!(
            "Generate a {} query that answers the question `{}`.",
            self.dialect, question
        )
    }

    fn prepare_correction_prompt(&self, question: &str, prior: &ErrorContext) -> String {
        format!(
            r#"### Question:
{question}

### Previous query:
```sql
{query}
```

### Database error:
{message}

### Response:
The previous query failed when it ran against the {dialect} database. Using the schema, write a corrected query that answers the question and avoids the error above."#,
            question = question,
            query = prior.failed_query,
            message = prior.message,
            dialect = self.dialect,
        )
    }

    pub fn prepare_prompt(
        &self,
        question: &str,
        schema: &SchemaText,
        prior_error: Option<&ErrorContext>,
    ) -> Prompt {
        let user = match prior_error {
            Some(prior) => self.prepare_correction_prompt(question, prior),
            None => self.prepare_question_prompt(question),
        };
        Prompt {
            system: self.prepare_system_prompt(schema),
            user,
        }
    }
}

#[async_trait]
impl SqlGenerator for QueryGenerator {
    async fn generate_sql(
        &self,
        question: &str,
        schema: &SchemaText,
        prior_error: Option<&ErrorContext>,
    ) -> Result<GeneratedQuery, GeneratorError> {
        let prompt = self.prepare_prompt(question, schema, prior_error);
        if prior_error.is_some() {
            info!("Requesting corrected SQL for: {}", question);
        } else {
            info!("Requesting SQL for: {}", question);
        }
        debug!("Prompt user part: {}", prompt.user);

        let response = self.completion.complete(&prompt).await?;
        debug!("Raw completion: {}", response);

        let sql = extract_sql(&response)?;
        Ok(GeneratedQuery::new(sql))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{GenerationError, ServiceError};
    use crate::test_support::ScriptedCompletion;

    fn schema() -> SchemaText {
        SchemaText::new("players(name TEXT, hr INTEGER, year INTEGER)")
    }

    #[tokio::test]
    async fn first_prompt_carries_schema_and_question() {
        let completion = Arc::new(ScriptedCompletion::new(vec![Ok(
            "```sql\nSELECT name FROM players;\n```".to_string(),
        )]));
        let generator = QueryGenerator::new(completion.clone(), "DuckDB");

        let query = generator
            .generate_sql("Who hit the most home runs in 2018?", &schema(), None)
            .await
            .unwrap();
        assert_eq!(query.sql(), "SELECT name FROM players");

        let prompts = completion.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].system.contains("players(name TEXT, hr INTEGER, year INTEGER)"));
        assert!(prompts[0].system.contains("DuckDB"));
        assert!(prompts[0].user.contains("Who hit the most home runs in 2018?"));
        assert!(!prompts[0].user.contains("Database error"));
    }

    #[tokio::test]
    async fn correction_prompt_carries_failed_query_and_error() {
        let completion = Arc::new(ScriptedCompletion::new(vec![Ok(
            "SELECT name FROM players WHERE year = 2018".to_string(),
        )]));
        let generator = QueryGenerator::new(completion.clone(), "DuckDB");
        let prior = ErrorContext {
            failed_query: "SELECT nme FROM players".to_string(),
            message: "Binder Error: Referenced column \"nme\" not found".to_string(),
        };

        generator
            .generate_sql("Who played in 2018?", &schema(), Some(&prior))
            .await
            .unwrap();

        let prompt = &completion.prompts()[0];
        assert!(prompt.system.contains("players(name TEXT"));
        assert!(prompt.user.contains("Who played in 2018?"));
        assert!(prompt.user.contains("SELECT nme FROM players"));
        assert!(prompt.user.contains("Binder Error: Referenced column \"nme\" not found"));
    }

    #[tokio::test]
    async fn unparseable_response_is_a_generation_error() {
        let completion = Arc::new(ScriptedCompletion::new(vec![Ok(
            "I don't know which table holds that.".to_string(),
        )]));
        let generator = QueryGenerator::new(completion, "DuckDB");

        let err = generator.generate_sql("?", &schema(), None).await.unwrap_err();
        assert!(matches!(
            err,
            GeneratorError::Generation(GenerationError::NoStatement { .. })
        ));
    }

    #[tokio::test]
    async fn service_failures_pass_through() {
        let completion = Arc::new(ScriptedCompletion::new(vec![Err(
            ServiceError::ConnectionError("timed out".to_string()),
        )]));
        let generator = QueryGenerator::new(completion, "DuckDB");

        let err = generator.generate_sql("?", &schema(), None).await.unwrap_err();
        assert_eq!(
            err,
            GeneratorError::Service(ServiceError::ConnectionError("timed out".to_string()))
        );
    }
}
