//! Uroflow MCP Server Implementation
//!
//! Exposes patient, measurement and report tools over MCP.

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ResourceContents,
    ServerCapabilities, ServerInfo,
};
use rmcp::{schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::Settings;
use crate::db::Database;
use crate::models::{
    MeasurementSample, MeasurementSummary, MeasurementUpdate, PatientCreate, PatientUpdate,
};
use crate::report::{
    ChartRenderer, ChartStyle, DirectorySink, DocumentComposer, NullSink, PageSpec, ReportError,
    ReportService, ReportSink,
};
use crate::tools::measurements;
use crate::tools::patients;
use crate::tools::reports;
use crate::tools::status::StatusTracker;

/// Uroflow MCP Service
#[derive(Clone)]
pub struct UroflowService {
    status_tracker: Arc<Mutex<StatusTracker>>,
    database: Database,
    report_service: Arc<ReportService>,
    tool_router: ToolRouter<UroflowService>,
}

impl UroflowService {
    pub fn new(settings: &Settings, database: Database) -> Self {
        let sink: Arc<dyn ReportSink> = if settings.persist_reports {
            Arc::new(DirectorySink::new(&settings.report_dir))
        } else {
            Arc::new(NullSink)
        };

        let composer = DocumentComposer::new(
            ChartRenderer::new(ChartStyle::default()),
            PageSpec::default(),
        );
        let report_service = ReportService::with_database(database.clone(), composer).with_sink(sink);

        let report_dir = settings
            .persist_reports
            .then(|| settings.report_dir.clone());

        Self {
            status_tracker: Arc::new(Mutex::new(StatusTracker::new(
                settings.database_path.clone(),
                report_dir,
            ))),
            database,
            report_service: Arc::new(report_service),
            tool_router: Self::tool_router(),
        }
    }
}

// ============================================================================
// Patient Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddPatientParams {
    /// Owning user account; reports are requested by this ID
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    /// Date of birth in ISO format: YYYY-MM-DD
    pub date_of_birth: String,
    /// SSN-like identifier, unique across patients
    pub identity_number: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetPatientParams {
    /// Patient ID
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListPatientsParams {
    /// Only patients registered under this user (optional)
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdatePatientParams {
    /// Patient ID
    pub id: i64,
    pub user_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Date of birth in ISO format: YYYY-MM-DD
    pub date_of_birth: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeletePatientParams {
    /// Patient ID to delete
    pub id: i64,
}

// ============================================================================
// Measurement Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddMeasurementDataParams {
    pub user_id: String,
    /// Session date as an integer key (e.g. 20240315 or a Unix timestamp)
    pub date: i64,
    /// Samples to append: objects with time, flow and volume (numbers or numeric strings)
    #[serde(default)]
    pub samples: Vec<Value>,
    /// Device summary values, stored as given (optional)
    pub total_volume: Option<Value>,
    pub total_measure_time: Option<Value>,
    pub max_flow_speed: Option<Value>,
    pub flow_time: Option<Value>,
    pub average_flow_speed: Option<Value>,
    pub time_of_max_speed: Option<Value>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetMeasurementParams {
    /// Measurement ID
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListMeasurementsParams {
    /// Only measurements for this user (optional)
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateMeasurementParams {
    /// Measurement ID
    pub id: i64,
    /// New session date (optional)
    pub date: Option<i64>,
    /// Replacement sample series (optional; replaces all existing samples)
    pub samples: Option<Vec<Value>>,
    pub total_volume: Option<Value>,
    pub total_measure_time: Option<Value>,
    pub max_flow_speed: Option<Value>,
    pub flow_time: Option<Value>,
    pub average_flow_speed: Option<Value>,
    pub time_of_max_speed: Option<Value>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteMeasurementParams {
    /// Measurement ID to delete
    pub id: i64,
}

// ============================================================================
// Report Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GenerateReportParams {
    /// User whose measurement is reported
    pub user_id: Option<String>,
    /// Exact session date of the measurement
    pub date: Option<i64>,
}

// ============================================================================
// Conversion Helpers
// ============================================================================

fn parse_samples(values: Vec<Value>) -> Result<Vec<MeasurementSample>, McpError> {
    serde_json::from_value(Value::Array(values)).map_err(|e| {
        McpError::invalid_params(
            format!("samples must be objects with time, flow and volume: {}", e),
            None,
        )
    })
}

fn scalar_text(field: &str, value: Option<Value>) -> Result<Option<String>, McpError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(McpError::invalid_params(
            format!("{} must be a number or string, got {}", field, other),
            None,
        )),
    }
}

fn parse_summary(
    total_volume: Option<Value>,
    total_measure_time: Option<Value>,
    max_flow_speed: Option<Value>,
    flow_time: Option<Value>,
    average_flow_speed: Option<Value>,
    time_of_max_speed: Option<Value>,
) -> Result<MeasurementSummary, McpError> {
    Ok(MeasurementSummary {
        total_volume: scalar_text("total_volume", total_volume)?,
        total_measure_time: scalar_text("total_measure_time", total_measure_time)?,
        max_flow_speed: scalar_text("max_flow_speed", max_flow_speed)?,
        flow_time: scalar_text("flow_time", flow_time)?,
        average_flow_speed: scalar_text("average_flow_speed", average_flow_speed)?,
        time_of_max_speed: scalar_text("time_of_max_speed", time_of_max_speed)?,
    })
}

fn report_error(error: ReportError) -> McpError {
    match error {
        ReportError::Validation { field, .. } => McpError::invalid_params(
            error.to_string(),
            Some(serde_json::json!({ "field": field })),
        ),
        ReportError::NotFound(ref message) => McpError::resource_not_found(message.clone(), None),
        other => McpError::internal_error(format!("PDF generation failed: {}", other), None),
    }
}

/// JSON metadata followed by the PDF as an embedded blob resource
fn report_contents(response: &reports::GenerateReportResponse) -> Result<Vec<Content>, McpError> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;

    let pdf = ResourceContents::BlobResourceContents {
        uri: response.attachment_uri(),
        mime_type: Some(reports::PDF_CONTENT_TYPE.to_string()),
        blob: response.pdf_base64(),
        meta: None,
    };

    Ok(vec![Content::text(json), Content::resource(pdf)])
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[tool_router]
impl UroflowService {
    // --- Status ---

    #[tool(description = "Get the current status of the uroflow report server including build info, database and report storage, and process information")]
    async fn uroflow_status(&self) -> Result<CallToolResult, McpError> {
        let tracker = self.status_tracker.lock().await;
        let status = tracker.get_status();
        let json = serde_json::to_string_pretty(&status)
            .map_err(|e| McpError::internal_error(format!("Serialization error: {}", e), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    // --- Patients ---

    #[tool(description = "Register a patient under a user account. All fields are required; the identity number must be unique.")]
    fn add_patient(&self, Parameters(p): Parameters<AddPatientParams>) -> Result<CallToolResult, McpError> {
        let data = PatientCreate {
            user_id: p.user_id,
            first_name: p.first_name,
            last_name: p.last_name,
            date_of_birth: p.date_of_birth,
            identity_number: p.identity_number,
        };
        let result = patients::add_patient(&self.database, data).map_err(|e| McpError::invalid_params(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Get a patient with a summary of their measurement sessions")]
    fn get_patient(&self, Parameters(p): Parameters<GetPatientParams>) -> Result<CallToolResult, McpError> {
        let result = patients::get_patient(&self.database, p.id).map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Some(patient) => serde_json::to_string_pretty(&patient),
            None => Ok(format!(r#"{{"error": "Patient not found", "id": {}}}"#, p.id)),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "List patients, optionally only those registered under one user account")]
    fn list_patients(&self, Parameters(p): Parameters<ListPatientsParams>) -> Result<CallToolResult, McpError> {
        let result = patients::list_patients(&self.database, p.user_id.as_deref())
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Update a patient's user account, name or date of birth")]
    fn update_patient(&self, Parameters(p): Parameters<UpdatePatientParams>) -> Result<CallToolResult, McpError> {
        let data = PatientUpdate {
            user_id: p.user_id,
            first_name: p.first_name,
            last_name: p.last_name,
            date_of_birth: p.date_of_birth,
        };
        let result = patients::update_patient(&self.database, p.id, data).map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Some(patient) => serde_json::to_string_pretty(&patient),
            None => Ok(format!(r#"{{"error": "Patient not found", "id": {}}}"#, p.id)),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Delete a patient record (measurement sessions are kept)")]
    fn delete_patient(&self, Parameters(p): Parameters<DeletePatientParams>) -> Result<CallToolResult, McpError> {
        let result = patients::delete_patient(&self.database, p.id).map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    // --- Measurements ---

    #[tool(description = "Append flow/volume samples to a user's measurement session for a date, creating the session if it does not exist. Summary values replace stored ones when given.")]
    fn add_measurement_data(&self, Parameters(p): Parameters<AddMeasurementDataParams>) -> Result<CallToolResult, McpError> {
        let samples = parse_samples(p.samples)?;
        let summary = parse_summary(
            p.total_volume,
            p.total_measure_time,
            p.max_flow_speed,
            p.flow_time,
            p.average_flow_speed,
            p.time_of_max_speed,
        )?;
        let result = measurements::add_measurement_data(&self.database, &p.user_id, p.date, &samples, &summary)
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Get a measurement session with all samples and summary values")]
    fn get_measurement(&self, Parameters(p): Parameters<GetMeasurementParams>) -> Result<CallToolResult, McpError> {
        let result = measurements::get_measurement(&self.database, p.id).map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Some(record) => serde_json::to_string_pretty(&record),
            None => Ok(format!(r#"{{"error": "Measurement not found", "id": {}}}"#, p.id)),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "List measurement sessions, newest first, optionally for one user")]
    fn list_measurements(&self, Parameters(p): Parameters<ListMeasurementsParams>) -> Result<CallToolResult, McpError> {
        let result = measurements::list_measurements(&self.database, p.user_id.as_deref())
            .map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    #[tool(description = "Update a measurement session's date or summary values, or replace its samples")]
    fn update_measurement(&self, Parameters(p): Parameters<UpdateMeasurementParams>) -> Result<CallToolResult, McpError> {
        let samples = p.samples.map(parse_samples).transpose()?;
        let summary = parse_summary(
            p.total_volume,
            p.total_measure_time,
            p.max_flow_speed,
            p.flow_time,
            p.average_flow_speed,
            p.time_of_max_speed,
        )?;
        let data = MeasurementUpdate {
            date: p.date,
            samples,
            summary,
        };
        let result = measurements::update_measurement(&self.database, p.id, &data)
            .map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Some(record) => serde_json::to_string_pretty(&record),
            None => Ok(format!(r#"{{"error": "Measurement not found", "id": {}}}"#, p.id)),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Delete a measurement session and its samples")]
    fn delete_measurement(&self, Parameters(p): Parameters<DeleteMeasurementParams>) -> Result<CallToolResult, McpError> {
        let result = measurements::delete_measurement(&self.database, p.id).map_err(|e| McpError::internal_error(e, None))?;
        to_json(&result)
    }

    // --- Reports ---

    #[tool(description = "Generate the uroflowmetry PDF report for a user's measurement on an exact date. Returns JSON metadata (attachment name, content type, stored file path, size) and the PDF as an embedded application/pdf resource.")]
    async fn generate_report(&self, Parameters(p): Parameters<GenerateReportParams>) -> Result<CallToolResult, McpError> {
        let service = self.report_service.clone();
        let result = tokio::task::spawn_blocking(move || {
            reports::generate_report(&service, p.user_id.as_deref(), p.date)
        })
        .await
        .map_err(|e| McpError::internal_error(format!("Report task failed: {}", e), None))?
        .map_err(report_error)?;

        self.status_tracker.lock().await.record_report();
        Ok(CallToolResult::success(report_contents(&result)?))
    }
}

#[tool_handler]
impl ServerHandler for UroflowService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "uroflow".into(),
                version: crate::build_info::VERSION.into(),
                title: Some("Uroflow Report Server".into()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Uroflowmetry patient records and PDF reports. \
                 Patients: add/get/list/update/delete_patient (user_id links a patient to measurements). \
                 Measurements: add_measurement_data appends samples to the (user_id, date) session; \
                 get/list/update/delete_measurement. \
                 Reports: generate_report with user_id and the exact session date. \
                 Status: uroflow_status."
                    .into(),
            ),
        }
    }
}
