use crate::config::{ConfigurationError, DatabaseConfig};
use crate::db::db_pool::DuckDBConnectionManager;
use crate::db::value::CellValue;
use crate::llm::GeneratedQuery;
use crate::llm::extract::leading_keyword;
use duckdb::Connection;
use duckdb::types::Value;
use r2d2::Pool;
use std::error::Error;
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Statements the executor is willing to run.
const READ_ONLY_KEYWORDS: &[&str] = &[
    "SELECT", "WITH", "VALUES", "FROM", "SHOW", "DESCRIBE", "EXPLAIN", "SUMMARIZE",
];

/// Rows fetched by a successful query, with column names in select-list order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// The value in `column` of row `row`, if both exist.
    #[cfg(test)]
    pub fn value(&self, row: usize, column: &str) -> Option<&CellValue> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Row `row` as (column name, value) pairs.
    pub fn record(&self, row: usize) -> Option<Vec<(&str, &CellValue)>> {
        self.rows.get(row).map(|values| {
            self.columns
                .iter()
                .map(String::as_str)
                .zip(values.iter())
                .collect()
        })
    }
}

/// The engine rejected a statement. Carries the exact statement and engine message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionError {
    pub query: String,
    pub message: String,
}

impl ExecutionError {
    pub fn new(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Database error: {}", self.message)
    }
}

impl Error for ExecutionError {}

pub type ExecutionResult = Result<QueryResult, ExecutionError>;

pub trait QueryExecutor: Send + Sync {
    fn execute(&self, query: &GeneratedQuery) -> ExecutionResult;
}

/// Runs statements against a DuckDB file through a single-connection pool.
pub struct DuckDbExecutor {
    pool: Pool<DuckDBConnectionManager>,
}

impl DuckDbExecutor {
    pub fn new(pool: Pool<DuckDBConnectionManager>) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &DatabaseConfig) -> Result<Self, ConfigurationError> {
        if !Path::new(&config.path).exists() {
            return Err(ConfigurationError::DatabaseMissing(config.path.clone()));
        }

        info!(
            "Opening DuckDB database {} (read-only: {})",
            config.path, config.read_only
        );
        let manager = DuckDBConnectionManager::new(config.path.clone(), config.read_only);
        // One connection: executions never overlap
        let pool = Pool::builder()
            .max_size(1)
            .connection_timeout(Duration::from_secs(config.connection_timeout_secs))
            .build(manager)
            .map_err(|e| ConfigurationError::Database(e.to_string()))?;

        Ok(Self::new(pool))
    }
}

impl QueryExecutor for DuckDbExecutor {
    fn execute(&self, query: &GeneratedQuery) -> ExecutionResult {
        let sql = query.sql();
        check_read_only(sql).map_err(|message| ExecutionError::new(sql, message))?;

        let conn = self
            .pool
            .get()
            .map_err(|e| ExecutionError::new(sql, format!("Connection unavailable: {}", e)))?;

        let start_time = Instant::now();
        match fetch_all(&conn, sql) {
            Ok(result) => {
                info!(
                    "Query executed successfully. Row count: {}, Execution time: {}ms",
                    result.row_count(),
                    start_time.elapsed().as_millis()
                );
                Ok(result)
            }
            Err(e) => {
                warn!("Query failed: {}", e);
                Err(ExecutionError::new(sql, e.to_string()))
            }
        }
    }
}

fn check_read_only(sql: &str) -> Result<(), String> {
    match leading_keyword(sql) {
        Some(keyword) if READ_ONLY_KEYWORDS.contains(&keyword.as_str()) => Ok(()),
        Some(keyword) => Err(format!(
            "Only read-only statements are permitted; {} statements are rejected",
            keyword
        )),
        None => Err("Statement is empty".to_string()),
    }
}

fn fetch_all(conn: &Connection, sql: &str) -> duckdb::Result<QueryResult> {
    debug!("Executing SQL: {}", sql);
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    let columns = rows
        .as_ref()
        .map(|stmt| stmt.column_names())
        .unwrap_or_default();

    let mut data = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            values.push(CellValue::from(row.get::<_, Value>(idx)?));
        }
        data.push(values);
    }

    Ok(QueryResult {
        columns,
        rows: data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::temp_path;
    use std::path::PathBuf;

    struct TestDatabase {
        path: PathBuf,
    }

    impl TestDatabase {
        fn seeded(name: &str) -> Self {
            let path = temp_path(name);
            remove_database(&path);

            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE players (name VARCHAR, hr INTEGER, year INTEGER, avg DOUBLE, debut DATE, hof BOOLEAN);
                 INSERT INTO players VALUES
                    ('Khris Davis', 48, 2018, 0.247, DATE '2014-04-02', false),
                    ('J.D. Martinez', 43, 2018, 0.330, DATE '2011-07-30', false),
                    ('Pete Alonso', 53, 2019, 0.260, NULL, NULL);",
            )
            .unwrap();
            drop(conn);

            Self { path }
        }

        fn executor(&self) -> DuckDbExecutor {
            DuckDbExecutor::from_config(&DatabaseConfig {
                path: self.path.to_string_lossy().to_string(),
                read_only: true,
                connection_timeout_secs: 5,
            })
            .unwrap()
        }
    }

    impl Drop for TestDatabase {
        fn drop(&mut self) {
            remove_database(&self.path);
        }
    }

    fn remove_database(path: &Path) {
        let _ = std::fs::remove_file(path);
        let _ = std::fs::remove_file(format!("{}.wal", path.display()));
    }

    fn run(executor: &DuckDbExecutor, sql: &str) -> ExecutionResult {
        executor.execute(&GeneratedQuery::new(sql))
    }

    #[test]
    fn rows_are_fetched_in_order_with_column_names() {
        let db = TestDatabase::seeded("exec-order.duckdb");
        let result = run(
            &db.executor(),
            "SELECT name, hr FROM players WHERE year = 2018 ORDER BY hr DESC",
        )
        .unwrap();

        assert_eq!(result.columns, vec!["name", "hr"]);
        assert_eq!(
            result.rows,
            vec![
                vec![CellValue::Text("Khris Davis".into()), CellValue::Integer(48)],
                vec![CellValue::Text("J.D. Martinez".into()), CellValue::Integer(43)],
            ]
        );
        assert_eq!(result.value(1, "name"), Some(&CellValue::Text("J.D. Martinez".into())));
        assert_eq!(
            result.record(0).unwrap(),
            vec![
                ("name", &CellValue::Text("Khris Davis".into())),
                ("hr", &CellValue::Integer(48)),
            ]
        );
    }

    #[test]
    fn engine_types_are_converted() {
        let db = TestDatabase::seeded("exec-types.duckdb");
        let result = run(
            &db.executor(),
            "SELECT debut, hof, avg, SUM(hr) OVER () AS total FROM players WHERE name = 'Khris Davis'",
        )
        .unwrap();

        assert_eq!(
            result.rows[0],
            vec![
                CellValue::Text("2014-04-02".into()),
                CellValue::Boolean(false),
                CellValue::Float(0.247),
                CellValue::Integer(48),
            ]
        );
    }

    #[test]
    fn nulls_and_empty_results() {
        let db = TestDatabase::seeded("exec-nulls.duckdb");
        let executor = db.executor();

        let result = run(&executor, "SELECT debut FROM players WHERE name = 'Pete Alonso'").unwrap();
        assert_eq!(result.rows, vec![vec![CellValue::Null]]);

        let empty = run(&executor, "SELECT name FROM players WHERE year = 1900").unwrap();
        assert_eq!(empty.columns, vec!["name"]);
        assert_eq!(empty.row_count(), 0);
    }

    #[test]
    fn engine_errors_carry_query_and_message() {
        let db = TestDatabase::seeded("exec-errors.duckdb");
        let sql = "SELECT nme FROM players";

        let err = run(&db.executor(), sql).unwrap_err();
        assert_eq!(err.query, sql);
        assert!(err.message.contains("nme"), "message was: {}", err.message);
    }

    #[test]
    fn syntax_errors_are_structured_failures() {
        let db = TestDatabase::seeded("exec-syntax.duckdb");
        let err = run(&db.executor(), "SELEC name FROM players").unwrap_err();
        assert_eq!(err.query, "SELEC name FROM players");
        assert!(!err.message.is_empty());
    }

    #[test]
    fn write_statements_are_rejected_before_reaching_the_engine() {
        let db = TestDatabase::seeded("exec-guard.duckdb");
        let executor = db.executor();

        let err = run(&executor, "DELETE FROM players").unwrap_err();
        assert_eq!(err.query, "DELETE FROM players");
        assert!(err.message.contains("read-only"));
        assert!(err.message.contains("DELETE"));

        let count = run(&executor, "SELECT COUNT(*) AS n FROM players").unwrap();
        assert_eq!(count.value(0, "n"), Some(&CellValue::Integer(3)));
    }

    #[test]
    fn read_only_connections_refuse_writes() {
        let db = TestDatabase::seeded("exec-readonly.duckdb");
        let executor = db.executor();

        let conn = executor.pool.get().unwrap();
        assert!(conn.execute_batch("CREATE TABLE scratch (id INTEGER)").is_err());
    }

    #[test]
    fn missing_database_is_a_configuration_error() {
        let err = DuckDbExecutor::from_config(&DatabaseConfig {
            path: temp_path("does-not-exist.duckdb").to_string_lossy().to_string(),
            read_only: true,
            connection_timeout_secs: 1,
        })
        .err()
        .unwrap();
        assert!(matches!(err, ConfigurationError::DatabaseMissing(_)));
    }

    #[test]
    fn read_only_guard_accepts_queries_only() {
        assert!(check_read_only("with t as (select 1) select * from t").is_ok());
        assert!(check_read_only("-- top hitters\nSELECT 1").is_ok());
        assert!(check_read_only("DROP TABLE players").is_err());
        assert!(check_read_only("   ").is_err());
    }
}
