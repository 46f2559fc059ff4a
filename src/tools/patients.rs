//! Patient MCP Tools
//!
//! Tools for registering and maintaining patient demographics.

use serde::Serialize;

use crate::db::Database;
use crate::models::{MeasurementRecord, Patient, PatientCreate, PatientUpdate};

/// Response for add_patient
#[derive(Debug, Serialize)]
pub struct AddPatientResponse {
    pub success: bool,
    pub id: i64,
    pub message: String,
}

/// Patient summary for listing
#[derive(Debug, Serialize)]
pub struct PatientSummary {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub date_of_birth: Option<String>,
}

/// Measurement session attached to a patient detail
#[derive(Debug, Serialize)]
pub struct MeasurementBrief {
    pub id: i64,
    pub date: i64,
    pub sample_count: usize,
    pub max_flow_speed: Option<String>,
}

/// Full patient detail with their measurement sessions
#[derive(Debug, Serialize)]
pub struct PatientDetail {
    #[serde(flatten)]
    pub patient: Patient,
    pub measurements: Vec<MeasurementBrief>,
}

/// Response for list_patients
#[derive(Debug, Serialize)]
pub struct ListPatientsResponse {
    pub patients: Vec<PatientSummary>,
    pub total: usize,
}

/// Response for delete operations
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub deleted_id: i64,
}

impl From<&Patient> for PatientSummary {
    fn from(patient: &Patient) -> Self {
        let name = [patient.first_name.as_deref(), patient.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            id: patient.id,
            user_id: patient.user_id.clone(),
            name,
            date_of_birth: patient.date_of_birth.clone(),
        }
    }
}

fn require(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", field));
    }
    Ok(())
}

/// Register a patient under a user account
pub fn add_patient(db: &Database, data: PatientCreate) -> Result<AddPatientResponse, String> {
    require("user_id", &data.user_id)?;
    require("first_name", &data.first_name)?;
    require("last_name", &data.last_name)?;
    require("date_of_birth", &data.date_of_birth)?;
    require("identity_number", &data.identity_number)?;

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let existing = Patient::get_by_identity_number(&conn, &data.identity_number)
        .map_err(|e| format!("Database error: {}", e))?;
    if existing.is_some() {
        return Err("Patient with this identity number already exists".to_string());
    }

    let patient = Patient::create(&conn, &data)
        .map_err(|e| format!("Failed to add patient: {}", e))?;

    Ok(AddPatientResponse {
        success: true,
        id: patient.id,
        message: "Patient added successfully".to_string(),
    })
}

/// Get a patient with their measurement sessions
pub fn get_patient(db: &Database, id: i64) -> Result<Option<PatientDetail>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let Some(patient) = Patient::get_by_id(&conn, id)
        .map_err(|e| format!("Failed to get patient: {}", e))?
    else {
        return Ok(None);
    };

    let measurements = MeasurementRecord::list(&conn, Some(&patient.user_id))
        .map_err(|e| format!("Failed to get measurements: {}", e))?
        .into_iter()
        .map(|m| MeasurementBrief {
            id: m.id,
            date: m.date,
            sample_count: m.samples.len(),
            max_flow_speed: m.summary.max_flow_speed,
        })
        .collect();

    Ok(Some(PatientDetail {
        patient,
        measurements,
    }))
}

/// List patients, optionally for one user account
pub fn list_patients(db: &Database, user_id: Option<&str>) -> Result<ListPatientsResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let patients = Patient::list(&conn, user_id)
        .map_err(|e| format!("Failed to list patients: {}", e))?;

    let summaries: Vec<PatientSummary> = patients.iter().map(PatientSummary::from).collect();
    let total = summaries.len();

    Ok(ListPatientsResponse {
        patients: summaries,
        total,
    })
}

/// Update patient demographics
pub fn update_patient(db: &Database, id: i64, data: PatientUpdate) -> Result<Option<Patient>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    Patient::update(&conn, id, &data).map_err(|e| format!("Failed to update patient: {}", e))
}

/// Delete a patient
pub fn delete_patient(db: &Database, id: i64) -> Result<DeleteResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let deleted = Patient::delete(&conn, id)
        .map_err(|e| format!("Failed to delete patient: {}", e))?;
    if !deleted {
        return Err(format!("Patient not found with id: {}", id));
    }

    Ok(DeleteResponse {
        success: true,
        deleted_id: id,
    })
}
