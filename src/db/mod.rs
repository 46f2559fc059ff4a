//! Database module
//!
//! SQLite connection pool and schema migrations for patients and measurements.

pub mod connection;
pub mod migrations;

pub use connection::{Database, DbError, DbResult};
