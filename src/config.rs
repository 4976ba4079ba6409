use clap::Parser;
use config::{Config, File};
use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
    pub read_only: bool,
    pub connection_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "remote" or "ollama"
    pub model: String,
    pub api_url: Option<String>,
    pub api_key_env: String,
    pub api_key_file: String,
    pub timeout_secs: u64,
    pub temperature: f32,
}

impl LlmConfig {
    pub fn requires_credentials(&self) -> bool {
        self.backend != "ollama"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchemaConfig {
    pub description_path: String,
    pub hints_path: Option<String>,
    pub dialect: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RepairConfig {
    pub max_attempts: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub schema: SchemaConfig,
    pub repair: RepairConfig,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Ask questions about baseball history in plain English", long_about = None)]
pub struct CliArgs {
    /// Question to answer; starts an interactive session when omitted
    #[arg(value_name = "QUESTION")]
    pub question: Vec<String>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// DuckDB database file to query
    #[arg(long, value_name = "FILE")]
    pub database: Option<String>,

    /// Schema description document
    #[arg(long, value_name = "FILE")]
    pub schema: Option<String>,

    /// Hints document appended to the schema description
    #[arg(long, value_name = "FILE")]
    pub hints: Option<String>,

    /// LLM backend ("remote" or "ollama")
    #[arg(long)]
    pub backend: Option<String>,

    /// Model name
    #[arg(long)]
    pub model: Option<String>,

    /// Maximum execution attempts per question
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,
}

impl CliArgs {
    /// The positional words joined into one question, if any were given.
    pub fn question(&self) -> Option<String> {
        let question = self.question.join(" ");
        let question = question.trim();
        if question.is_empty() {
            None
        } else {
            Some(question.to_string())
        }
    }
}

#[derive(Debug)]
pub enum ConfigurationError {
    Load(config::ConfigError),
    InvalidSetting(String),
    MissingCredentials { env_var: String, file: String },
    SchemaUnavailable { path: String, source: std::io::Error },
    EmptySchema(String),
    DatabaseMissing(String),
    Database(String),
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::Load(err) => write!(f, "Failed to load configuration: {}", err),
            ConfigurationError::InvalidSetting(msg) => write!(f, "Invalid setting: {}", msg),
            ConfigurationError::MissingCredentials { env_var, file } => write!(
                f,
                "No API key found: set the {} environment variable or create '{}'",
                env_var, file
            ),
            ConfigurationError::SchemaUnavailable { path, source } => {
                write!(f, "Cannot read schema description '{}': {}", path, source)
            }
            ConfigurationError::EmptySchema(path) => {
                write!(f, "Schema description '{}' is empty", path)
            }
            ConfigurationError::DatabaseMissing(path) => {
                write!(f, "Database file '{}' does not exist", path)
            }
            ConfigurationError::Database(msg) => write!(f, "Database setup failed: {}", msg),
        }
    }
}

impl Error for ConfigurationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigurationError::Load(err) => Some(err),
            ConfigurationError::SchemaUnavailable { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(err: config::ConfigError) -> Self {
        ConfigurationError::Load(err)
    }
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigurationError> {
        // Start with default configuration
        let mut config_builder = Config::builder()
            .set_default("database.path", "retrosheet.duckdb")?
            .set_default("database.read_only", true)?
            .set_default("database.connection_timeout_secs", 10)?
            .set_default("llm.backend", "remote")?
            .set_default("llm.model", "gpt-4-turbo")?
            .set_default("llm.api_key_env", "OPENAI_API_KEY")?
            .set_default("llm.api_key_file", "OPEN_API_KEY.txt")?
            .set_default("llm.timeout_secs", 60)?
            .set_default("llm.temperature", 0.1)?
            .set_default("schema.description_path", "column_desc.txt")?
            .set_default("schema.hints_path", "hints.txt")?
            .set_default("schema.dialect", "DuckDB")?
            .set_default("repair.max_attempts", 3)?;

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "askretro.toml",
                "config/askretro.toml",
                "/etc/askretro/askretro.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Some(database) = &args.database {
            config.database.path = database.clone();
        }
        if let Some(schema) = &args.schema {
            config.schema.description_path = schema.clone();
        }
        if let Some(hints) = &args.hints {
            config.schema.hints_path = Some(hints.clone());
        }
        if let Some(backend) = &args.backend {
            config.llm.backend = backend.clone();
        }
        if let Some(model) = &args.model {
            config.llm.model = model.clone();
        }
        if let Some(max_attempts) = args.max_attempts {
            config.repair.max_attempts = max_attempts;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.repair.max_attempts == 0 {
            return Err(ConfigurationError::InvalidSetting(
                "repair.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.llm.timeout_secs == 0 {
            return Err(ConfigurationError::InvalidSetting(
                "llm.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolves the completion service API key from the process environment, falling back to
/// the configured key file.
pub fn resolve_api_key(llm: &LlmConfig) -> Result<String, ConfigurationError> {
    resolve_api_key_with(llm, |name| std::env::var(name).ok())
}

fn resolve_api_key_with<F>(llm: &LlmConfig, lookup: F) -> Result<String, ConfigurationError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = lookup(&llm.api_key_env) {
        let key = key.trim();
        if !key.is_empty() {
            tracing::debug!("Using API key from environment variable {}", llm.api_key_env);
            return Ok(key.to_string());
        }
    }

    match std::fs::read_to_string(&llm.api_key_file) {
        Ok(contents) if !contents.trim().is_empty() => {
            tracing::debug!("Using API key from file {}", llm.api_key_file);
            Ok(contents.trim().to_string())
        }
        Ok(_) => Err(missing_credentials(llm)),
        Err(e) => {
            tracing::debug!("API key file {} unavailable: {}", llm.api_key_file, e);
            Err(missing_credentials(llm))
        }
    }
}

fn missing_credentials(llm: &LlmConfig) -> ConfigurationError {
    ConfigurationError::MissingCredentials {
        env_var: llm.api_key_env.clone(),
        file: llm.api_key_file.clone(),
    }
}
