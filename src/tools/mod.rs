//! Tools module
//!
//! MCP tool implementations for the uroflowmetry report server.

pub mod measurements;
pub mod patients;
pub mod reports;
pub mod status;
