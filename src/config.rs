//! Configuration management
//!
//! Environment-based settings for the database location and report persistence.

use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid boolean in {name}: {value}")]
    InvalidBool { name: &'static str, value: String },
}

/// Runtime settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// SQLite database file
    pub database_path: PathBuf,
    /// Directory generated reports are written to
    pub report_dir: PathBuf,
    /// Whether generated reports are also written to `report_dir`
    pub persist_reports: bool,
}

impl Settings {
    /// Load settings from environment variables
    pub fn from_env() -> Result<Self, SettingsError> {
        let database_path = env::var("UROFLOW_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_database_path());

        let report_dir = env::var("UROFLOW_REPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_report_dir(&database_path));

        let persist_reports = match env::var("UROFLOW_PERSIST_REPORTS") {
            Ok(value) => parse_bool("UROFLOW_PERSIST_REPORTS", &value)?,
            Err(_) => true,
        };

        Ok(Self {
            database_path,
            report_dir,
            persist_reports,
        })
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, SettingsError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SettingsError::InvalidBool {
            name,
            value: value.to_string(),
        }),
    }
}

/// `<project>/data/uroflow.db`, resolved from the executable location
pub fn default_database_path() -> PathBuf {
    let mut path = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."));

    // Go up from target/release or target/debug to project root
    if path.ends_with("release") || path.ends_with("debug") {
        if let Some(parent) = path.parent() {
            if let Some(grandparent) = parent.parent() {
                path = grandparent.to_path_buf();
            }
        }
    }

    path.push("data");
    path.push("uroflow.db");
    path
}

fn default_report_dir(database_path: &Path) -> PathBuf {
    database_path
        .parent()
        .map(|p| p.join("reports"))
        .unwrap_or_else(|| PathBuf::from("reports"))
}
