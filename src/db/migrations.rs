//! Database migrations
//!
//! Schema creation and migration logic.

use rusqlite::Connection;

use super::connection::DbResult;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// Run all migrations to bring the database up to the current schema version
pub fn run_migrations(conn: &Connection) -> DbResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (1)", [])?;
    }

    Ok(())
}

/// Migration v1: Initial schema
fn migrate_v1(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        -- ============================================
        -- PATIENTS
        -- Demographics printed in the report header
        -- ============================================
        CREATE TABLE patients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,               -- owning account, also the report key
            first_name TEXT,
            last_name TEXT,
            date_of_birth TEXT,                  -- ISO date: "1990-01-01"
            identity_number TEXT UNIQUE,         -- SSN-like identifier
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX idx_patients_user ON patients(user_id);

        -- ============================================
        -- MEASUREMENTS
        -- One uroflowmetry session per user and date
        -- ============================================
        CREATE TABLE measurements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            date INTEGER NOT NULL,

            -- Summary scalars, stored verbatim as supplied by the device
            total_volume TEXT,
            total_measure_time TEXT,
            max_flow_speed TEXT,
            flow_time TEXT,
            average_flow_speed TEXT,
            time_of_max_speed TEXT,

            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),

            UNIQUE(user_id, date)
        );

        CREATE INDEX idx_measurements_user ON measurements(user_id);

        -- ============================================
        -- MEASUREMENT SAMPLES
        -- Ordered (time, flow, volume) series, raw text
        -- ============================================
        CREATE TABLE measurement_samples (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            measurement_id INTEGER NOT NULL REFERENCES measurements(id) ON DELETE CASCADE,
            seq INTEGER NOT NULL,
            time TEXT NOT NULL,
            flow TEXT NOT NULL,
            volume TEXT NOT NULL,

            UNIQUE(measurement_id, seq)
        );

        CREATE INDEX idx_samples_measurement ON measurement_samples(measurement_id);
        "#,
    )?;

    Ok(())
}

/// Get the current schema version
pub fn get_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Check if the database needs migration
pub fn needs_migration(conn: &Connection) -> DbResult<bool> {
    let current = get_schema_version(conn)?;
    Ok(current < SCHEMA_VERSION)
}
