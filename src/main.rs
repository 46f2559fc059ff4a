//! Uroflow Report Server
//!
//! An MCP server for uroflowmetry records and PDF reports.

use rmcp::ServiceExt;
use tokio::io::{stdin, stdout};
use tracing::info;
use tracing_subscriber::EnvFilter;

use uroflow::build_info;
use uroflow::config::Settings;
use uroflow::db;
use uroflow::mcp::UroflowService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (output to stderr to not interfere with MCP stdio)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("uroflow=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    build_info::print_startup_banner();
    eprintln!("Starting MCP server on stdio...");

    let settings = Settings::from_env()?;
    eprintln!("Database path: {}", settings.database_path.display());

    // Ensure data directory exists
    if let Some(parent) = settings.database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if settings.persist_reports {
        std::fs::create_dir_all(&settings.report_dir)?;
        eprintln!("Report directory: {}", settings.report_dir.display());
    }

    eprintln!("Initializing database...");
    let database = db::Database::new(&settings.database_path)?;

    database.with_conn(|conn| {
        db::migrations::run_migrations(conn)?;
        let version = db::migrations::get_schema_version(conn)?;
        eprintln!("Database schema version: {}", version);
        Ok(())
    })?;

    let service = UroflowService::new(&settings, database);
    info!(persist_reports = settings.persist_reports, "Uroflow service ready");

    let server = service.serve((stdin(), stdout())).await?;
    server.waiting().await?;

    Ok(())
}
