//! Report generation tools
//!
//! Request-level validation and response shaping around [`ReportService`].

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;

use crate::report::{ReportError, ReportResult, ReportService};

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct GenerateReportResponse {
    pub success: bool,
    pub user_id: String,
    pub date: i64,
    /// Download name offered to clients
    pub attachment_name: String,
    pub content_type: &'static str,
    /// Name the engine suggested, built from the patient's first name
    pub file_name: String,
    pub file_path: Option<String>,
    pub size_bytes: usize,
    pub max_flow: Option<f64>,
    pub max_flow_time: Option<f64>,
    pub message: String,
    /// The PDF itself, delivered as an attachment rather than in the JSON
    #[serde(skip)]
    pub pdf: Vec<u8>,
}

impl GenerateReportResponse {
    /// Resource URI the attachment is published under
    pub fn attachment_uri(&self) -> String {
        format!("uroflow://reports/{}", self.attachment_name)
    }

    /// The PDF as standard base64
    pub fn pdf_base64(&self) -> String {
        STANDARD.encode(&self.pdf)
    }
}

/// `Client-Report-{user_id}.pdf`
pub fn attachment_name(user_id: &str) -> String {
    format!("Client-Report-{}.pdf", user_id)
}

/// Validate the request fields and generate the report
pub fn generate_report(
    service: &ReportService,
    user_id: Option<&str>,
    date: Option<i64>,
) -> ReportResult<GenerateReportResponse> {
    let user_id = user_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ReportError::missing("user_id"))?;
    let date = date.ok_or_else(|| ReportError::missing("date"))?;

    let report = service.generate(user_id, date)?;
    let document = report.document;

    Ok(GenerateReportResponse {
        success: true,
        user_id: user_id.to_string(),
        date,
        attachment_name: attachment_name(user_id),
        content_type: PDF_CONTENT_TYPE,
        file_name: document.file_name,
        file_path: report.stored_path.map(|p| p.display().to_string()),
        size_bytes: document.bytes.len(),
        max_flow: document.max_flow.map(|m| m.flow),
        max_flow_time: document.max_flow.map(|m| m.time),
        message: format!(
            "Uroflowmetry report generated for user {} ({} bytes)",
            user_id,
            document.bytes.len()
        ),
        pdf: document.bytes,
    })
}
