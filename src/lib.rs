//! Uroflow Report Server Library
//!
//! Patient and uroflowmetry measurement storage with PDF report generation.

pub mod build_info;
pub mod config;
pub mod db;
pub mod mcp;
pub mod models;
pub mod report;
pub mod tools;
