use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

mod config;
mod db;
mod llm;
mod repair;
mod schema;
mod session;
#[cfg(test)]
mod test_support;
mod util;

use crate::config::{AppConfig, CliArgs, resolve_api_key};
use crate::db::executor::DuckDbExecutor;
use crate::llm::LlmManager;
use crate::llm::generator::QueryGenerator;
use crate::repair::RepairLoop;
use crate::schema::SchemaDescriptor;
use crate::session::Session;
use crate::util::logging::init_tracing;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = CliArgs::parse();

    // Initialize logging
    init_tracing(args.verbose, args.log_json);

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Credentials come first: nothing else is worth loading without them
    let api_key = if config.llm.requires_credentials() {
        match resolve_api_key(&config.llm) {
            Ok(key) => Some(key),
            Err(e) => {
                error!("{}", e);
                return Err(e.into());
            }
        }
    } else {
        None
    };

    let schema = match SchemaDescriptor::from_config(&config.schema).describe() {
        Ok(schema) => schema,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };

    let executor = match DuckDbExecutor::from_config(&config.database) {
        Ok(executor) => executor,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };

    info!("Initializing LLM manager with backend: {}", config.llm.backend);
    let llm_manager = match LlmManager::new(&config.llm, api_key) {
        Ok(manager) => manager,
        Err(e) => {
            error!("Failed to initialize LLM backend: {}", e);
            return Err(e.into());
        }
    };
    let generator = QueryGenerator::new(Arc::new(llm_manager), config.schema.dialect.clone());

    let repair_loop = RepairLoop::new(
        Arc::new(generator),
        Arc::new(executor),
        schema,
        config.repair.max_attempts,
    );
    let mut session = Session::new(repair_loop, std::io::stdout());

    match args.question() {
        Some(question) => {
            session.run_single(&question).await?;
        }
        None => {
            println!("Ask a question about baseball history, or type 'quit' to leave.");
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            session.run_interactive(stdin).await?;
        }
    }

    Ok(())
}
