//! Measurement MCP Tools
//!
//! Tools for recording uroflowmetry sessions and their sample series.

use serde::Serialize;

use super::patients::DeleteResponse;
use crate::db::Database;
use crate::models::{MeasurementRecord, MeasurementSample, MeasurementSummary, MeasurementUpdate};

/// Response for add_measurement_data
#[derive(Debug, Serialize)]
pub struct AddMeasurementResponse {
    pub success: bool,
    pub id: i64,
    pub created: bool,
    pub appended: usize,
    pub sample_count: usize,
    pub message: String,
}

/// Measurement summary for listing
#[derive(Debug, Serialize)]
pub struct MeasurementListItem {
    pub id: i64,
    pub user_id: String,
    pub date: i64,
    pub sample_count: usize,
    #[serde(flatten)]
    pub summary: MeasurementSummary,
}

/// Response for list_measurements
#[derive(Debug, Serialize)]
pub struct ListMeasurementsResponse {
    pub measurements: Vec<MeasurementListItem>,
    pub total: usize,
}

impl From<MeasurementRecord> for MeasurementListItem {
    fn from(record: MeasurementRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            date: record.date,
            sample_count: record.samples.len(),
            summary: record.summary,
        }
    }
}

/// Append samples to the (user, date) session, creating it on first use
pub fn add_measurement_data(
    db: &Database,
    user_id: &str,
    date: i64,
    samples: &[MeasurementSample],
    summary: &MeasurementSummary,
) -> Result<AddMeasurementResponse, String> {
    if user_id.trim().is_empty() {
        return Err("user_id is required".to_string());
    }

    let mut conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let outcome = MeasurementRecord::append(&mut conn, user_id, date, samples, summary)
        .map_err(|e| format!("Failed to add measurement data: {}", e))?;

    let message = if outcome.created {
        format!("Measurement created with {} samples", outcome.appended)
    } else {
        format!("Appended {} samples", outcome.appended)
    };

    Ok(AddMeasurementResponse {
        success: true,
        id: outcome.record.id,
        created: outcome.created,
        appended: outcome.appended,
        sample_count: outcome.record.samples.len(),
        message,
    })
}

/// Get a measurement with all samples
pub fn get_measurement(db: &Database, id: i64) -> Result<Option<MeasurementRecord>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    MeasurementRecord::get_by_id(&conn, id).map_err(|e| format!("Failed to get measurement: {}", e))
}

/// List measurements, optionally for one user
pub fn list_measurements(db: &Database, user_id: Option<&str>) -> Result<ListMeasurementsResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let measurements: Vec<MeasurementListItem> = MeasurementRecord::list(&conn, user_id)
        .map_err(|e| format!("Failed to list measurements: {}", e))?
        .into_iter()
        .map(MeasurementListItem::from)
        .collect();

    let total = measurements.len();
    Ok(ListMeasurementsResponse { measurements, total })
}

/// Change the date, summary scalars or the whole sample series
pub fn update_measurement(
    db: &Database,
    id: i64,
    data: &MeasurementUpdate,
) -> Result<Option<MeasurementRecord>, String> {
    let mut conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    MeasurementRecord::update(&mut conn, id, data)
        .map_err(|e| format!("Failed to update measurement: {}", e))
}

/// Delete a measurement and its samples
pub fn delete_measurement(db: &Database, id: i64) -> Result<DeleteResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let deleted = MeasurementRecord::delete(&conn, id)
        .map_err(|e| format!("Failed to delete measurement: {}", e))?;
    if !deleted {
        return Err(format!("Measurement not found with id: {}", id));
    }

    Ok(DeleteResponse {
        success: true,
        deleted_id: id,
    })
}
