//! Document composition
//!
//! Turns a patient and a measurement record into a draw plan positioned by
//! [`PageLayout`], then hands the plan to the PDF backend.

use chrono::NaiveDate;
use tracing::debug;

use super::chart::{ChartRenderer, MaxFlowPoint, RenderedChart};
use super::error::ReportResult;
use super::layout::{Anchor, PageLayout, PageSpec, Rect, Segment};
use super::pdf;
use crate::models::{MeasurementRecord, MeasurementSummary, PatientIdentity};

// ============================================================================
// Constants
// ============================================================================

pub const DOCUMENT_TITLE: &str = "UROFLOWMETRY";
pub const MISSING_VALUE: &str = "N/A";
pub const LICENSE_LINE: &str =
    " Urodoc Lite v2.43  (C) 2024, Right licenced to Advin Health Care";

const MARKER_HEADERS: [&str; 4] = ["Marker data", "Left", "Difference", "Right"];
const MARKER_ROW_LABELS: [&str; 3] = ["Time (sec):", "Volume (ml):", "Speed (ml/s):"];

const COLOR_BLACK: (u8, u8, u8) = (0, 0, 0);
const COLOR_STAMP: (u8, u8, u8) = (179, 179, 179);   // 70% gray
const COLOR_FOOTER: (u8, u8, u8) = (128, 128, 128);  // 50% gray

const TITLE_SIZE: f32 = 24.0;
const HEADING_SIZE: f32 = 14.0;
const BODY_SIZE: f32 = 12.0;

// ============================================================================
// Draw Plan
// ============================================================================

/// One drawing instruction in page coordinates
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text {
        text: String,
        at: Anchor,
        size: f32,
        bold: bool,
        color: (u8, u8, u8),
    },
    Line {
        segment: Segment,
        thickness: f32,
        color: (u8, u8, u8),
    },
    Circle {
        center: Anchor,
        radius: f32,
        thickness: f32,
        color: (u8, u8, u8),
    },
    /// The chart raster, scaled into `rect`
    Chart { rect: Rect },
}

fn text(text: impl Into<String>, at: Anchor, size: f32, bold: bool) -> DrawOp {
    DrawOp::Text {
        text: text.into(),
        at,
        size,
        bold,
        color: COLOR_BLACK,
    }
}

fn rule(segment: Segment) -> DrawOp {
    DrawOp::Line {
        segment,
        thickness: 1.0,
        color: COLOR_BLACK,
    }
}

/// Everything needed to serialize one report page
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedPage {
    pub chart: RenderedChart,
    pub layout: PageLayout,
    pub ops: Vec<DrawOp>,
}

impl PreparedPage {
    /// All text runs in draw order
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// A finished report
#[derive(Debug, Clone)]
pub struct ReportDocument {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub page: PageSpec,
    pub max_flow: Option<MaxFlowPoint>,
}

// ============================================================================
// Field Formatting
// ============================================================================

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn or_missing(value: &Option<String>) -> String {
    present(value).unwrap_or(MISSING_VALUE).to_string()
}

/// "First Last", or `N/A` when neither is known
pub fn patient_name(patient: &PatientIdentity) -> String {
    let parts: Vec<&str> = [&patient.first_name, &patient.last_name]
        .into_iter()
        .filter_map(present)
        .collect();

    if parts.is_empty() {
        MISSING_VALUE.to_string()
    } else {
        parts.join(" ")
    }
}

/// Dates are shown as month/day/year; anything unparseable is shown as stored
pub fn format_date_of_birth(value: &Option<String>) -> String {
    let Some(raw) = present(value) else {
        return MISSING_VALUE.to_string();
    };

    let date_part = raw.split('T').next().unwrap_or(raw);
    match NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
        Ok(date) => date.format("%-m/%-d/%Y").to_string(),
        Err(_) => raw.to_string(),
    }
}

/// `Client-Report-{first name}.pdf`, restricted to file-safe characters
pub fn suggested_file_name(patient: &PatientIdentity) -> String {
    let stem: String = present(&patient.first_name)
        .unwrap_or("unknown")
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("Client-Report-{}.pdf", stem)
}

/// Flow time as a number, falling back to the largest sample time
pub fn resolve_flow_time(record: &MeasurementRecord) -> f64 {
    let stated = present(&record.summary.flow_time)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite());

    stated.unwrap_or_else(|| {
        record
            .samples
            .iter()
            .filter_map(|s| s.time.to_finite())
            .fold(0.0, f64::max)
    })
}

// ============================================================================
// Composer
// ============================================================================

pub struct DocumentComposer {
    renderer: ChartRenderer,
    page: PageSpec,
}

impl DocumentComposer {
    pub fn new(renderer: ChartRenderer, page: PageSpec) -> Self {
        Self { renderer, page }
    }

    /// Render the chart, lay out the page and build the draw plan
    pub fn prepare(
        &self,
        patient: &PatientIdentity,
        record: &MeasurementRecord,
    ) -> ReportResult<PreparedPage> {
        let chart = self.renderer.render(&record.samples, resolve_flow_time(record))?;
        let layout = PageLayout::compute(&self.page, (chart.width, chart.height));
        let ops = build_draw_plan(&layout, patient, &record.summary);

        debug!(ops = ops.len(), chart = ?layout.chart, "Built draw plan");

        Ok(PreparedPage { chart, layout, ops })
    }

    /// Compose the report into PDF bytes
    pub fn compose(
        &self,
        patient: &PatientIdentity,
        record: &MeasurementRecord,
    ) -> ReportResult<ReportDocument> {
        let prepared = self.prepare(patient, record)?;
        let bytes = pdf::render_page(DOCUMENT_TITLE, &self.page, &prepared.ops, &prepared.chart)?;

        Ok(ReportDocument {
            bytes,
            file_name: suggested_file_name(patient),
            page: self.page,
            max_flow: prepared.chart.max_flow,
        })
    }
}

/// Build the ordered draw plan for one page
pub fn build_draw_plan(
    layout: &PageLayout,
    patient: &PatientIdentity,
    summary: &MeasurementSummary,
) -> Vec<DrawOp> {
    let mut ops = Vec::new();

    ops.extend(layout.border.iter().copied().map(rule));
    ops.push(text(DOCUMENT_TITLE, layout.title, TITLE_SIZE, true));

    // Header
    let header = [
        format!("Patient name: {}", patient_name(patient)),
        format!("DOB: {}", format_date_of_birth(&patient.date_of_birth)),
        format!("Identity: {}", or_missing(&patient.identity_number)),
    ];
    for (entry, at) in header.into_iter().zip(layout.header_cells.iter()) {
        ops.push(text(entry, *at, BODY_SIZE, false));
    }

    // Marker table: the data cells stay blank
    let table = &layout.marker_table;
    for (label, at) in MARKER_HEADERS.iter().zip(table.header_cells.iter()) {
        ops.push(text(*label, *at, BODY_SIZE, false));
    }
    for (label, cells) in MARKER_ROW_LABELS.iter().zip(table.rows.iter()) {
        if let Some(first) = cells.first() {
            ops.push(text(*label, *first, BODY_SIZE, false));
        }
    }
    ops.extend(table.grid.iter().copied().map(rule));

    ops.push(DrawOp::Chart { rect: layout.chart });
    ops.push(rule(layout.chart_rule));

    // Auto-evaluation summary
    let pairs = [
        ("Total volume:", &summary.total_volume, "Total measure time:", &summary.total_measure_time),
        ("Max. flow speed:", &summary.max_flow_speed, "Flow time:", &summary.flow_time),
        ("Average flow speed:", &summary.average_flow_speed, "Time of max. speed:", &summary.time_of_max_speed),
    ];
    ops.push(text("Auto-Evaluation Summary", layout.summary.heading, HEADING_SIZE, true));
    for ((left_label, left_value, right_label, right_value), slots) in
        pairs.iter().zip(layout.summary.rows.iter())
    {
        ops.push(text(*left_label, slots.left_label, BODY_SIZE, false));
        ops.push(text(or_missing(left_value), slots.left_value, BODY_SIZE, true));
        ops.push(text(*right_label, slots.right_label, BODY_SIZE, false));
        ops.push(text(or_missing(right_value), slots.right_value, BODY_SIZE, true));
    }
    ops.extend(layout.summary.frame.iter().copied().map(rule));

    // Footer
    let footer = &layout.footer;
    ops.push(text("Report", footer.heading, HEADING_SIZE, true));
    ops.push(rule(footer.rule));
    ops.push(DrawOp::Circle {
        center: footer.stamp_center,
        radius: footer.stamp_radius,
        thickness: 1.0,
        color: COLOR_STAMP,
    });
    ops.push(DrawOp::Text {
        text: "stamp".to_string(),
        at: footer.stamp_label,
        size: BODY_SIZE,
        bold: false,
        color: COLOR_STAMP,
    });
    ops.push(DrawOp::Line {
        segment: footer.signature,
        thickness: 0.5,
        color: COLOR_STAMP,
    });
    ops.push(DrawOp::Text {
        text: LICENSE_LINE.to_string(),
        at: footer.license,
        size: BODY_SIZE,
        bold: false,
        color: COLOR_FOOTER,
    });

    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MeasurementSample;
    use crate::report::chart::ChartStyle;

    fn composer() -> DocumentComposer {
        let renderer = ChartRenderer::new(ChartStyle {
            labels: false,
            ..Default::default()
        });
        DocumentComposer::new(renderer, PageSpec::default())
    }

    fn jane() -> PatientIdentity {
        PatientIdentity {
            first_name: Some("Jane".to_string()),
            last_name: Some("Doe".to_string()),
            date_of_birth: Some("1990-01-01".to_string()),
            identity_number: Some("123-45-6789".to_string()),
        }
    }

    fn record(samples: Vec<MeasurementSample>) -> MeasurementRecord {
        MeasurementRecord {
            id: 1,
            user_id: "user-1".to_string(),
            date: 20240101,
            summary: MeasurementSummary {
                total_volume: Some("40".to_string()),
                total_measure_time: Some("10".to_string()),
                max_flow_speed: Some("40".to_string()),
                flow_time: Some("10".to_string()),
                average_flow_speed: Some("20".to_string()),
                time_of_max_speed: Some("5".to_string()),
            },
            samples,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn happy_record() -> MeasurementRecord {
        record(vec![
            MeasurementSample::new(0.0, 0.0, 0.0),
            MeasurementSample::new(5.0, 40.0, 20.0),
            MeasurementSample::new(10.0, 0.0, 40.0),
        ])
    }

    #[test]
    fn test_happy_path_plan() {
        let prepared = composer().prepare(&jane(), &happy_record()).unwrap();
        let texts: Vec<&str> = prepared.texts().collect();

        assert_eq!(texts[0], "UROFLOWMETRY");
        assert!(texts.contains(&"Patient name: Jane Doe"));
        assert!(texts.contains(&"DOB: 1/1/1990"));
        assert!(texts.contains(&"Identity: 123-45-6789"));
        assert!(texts.contains(&"Auto-Evaluation Summary"));
        assert!(texts.contains(&"Time of max. speed:"));

        let max = prepared.chart.max_flow.unwrap();
        assert_eq!((max.time, max.flow), (5.0, 40.0));
    }

    #[test]
    fn test_summary_values_are_verbatim() {
        let mut rec = happy_record();
        rec.summary.average_flow_speed = Some("20.50".to_string());
        rec.summary.time_of_max_speed = None;

        let prepared = composer().prepare(&jane(), &rec).unwrap();
        let texts: Vec<&str> = prepared.texts().collect();
        assert!(texts.contains(&"20.50"));
        assert!(texts.contains(&"N/A"));
    }

    #[test]
    fn test_missing_date_of_birth_renders_placeholder() {
        let mut patient = jane();
        patient.date_of_birth = None;

        let prepared = composer().prepare(&patient, &happy_record()).unwrap();
        assert!(prepared.texts().any(|t| t == "DOB: N/A"));
    }

    #[test]
    fn test_missing_identity_fields() {
        let patient = PatientIdentity::default();
        assert_eq!(patient_name(&patient), "N/A");
        assert_eq!(suggested_file_name(&patient), "Client-Report-unknown.pdf");

        let prepared = composer().prepare(&patient, &happy_record()).unwrap();
        assert!(prepared.texts().any(|t| t == "Patient name: N/A"));
        assert!(prepared.texts().any(|t| t == "Identity: N/A"));
    }

    #[test]
    fn test_date_of_birth_formats() {
        assert_eq!(format_date_of_birth(&Some("1990-01-01".to_string())), "1/1/1990");
        assert_eq!(
            format_date_of_birth(&Some("1985-12-24T00:00:00.000Z".to_string())),
            "12/24/1985"
        );
        assert_eq!(format_date_of_birth(&Some("sometime".to_string())), "sometime");
        assert_eq!(format_date_of_birth(&Some("  ".to_string())), "N/A");
    }

    #[test]
    fn test_file_name_uses_first_name() {
        assert_eq!(suggested_file_name(&jane()), "Client-Report-Jane.pdf");

        let mut patient = jane();
        patient.first_name = Some("Ann/Marie".to_string());
        assert_eq!(suggested_file_name(&patient), "Client-Report-Ann_Marie.pdf");
    }

    #[test]
    fn test_flow_time_fallback() {
        let mut rec = happy_record();
        assert_eq!(resolve_flow_time(&rec), 10.0);

        rec.summary.flow_time = Some("soon".to_string());
        assert_eq!(resolve_flow_time(&rec), 10.0);

        rec.samples.clear();
        rec.summary.flow_time = None;
        assert_eq!(resolve_flow_time(&rec), 0.0);
    }

    #[test]
    fn test_marker_cells_stay_blank() {
        let prepared = composer().prepare(&jane(), &happy_record()).unwrap();
        let row_texts = prepared
            .texts()
            .filter(|t| MARKER_ROW_LABELS.contains(t))
            .count();
        assert_eq!(row_texts, 3);
        assert!(!prepared.texts().any(|t| t.is_empty()));
    }

    #[test]
    fn test_plan_order() {
        let prepared = composer().prepare(&jane(), &happy_record()).unwrap();
        let chart_index = prepared
            .ops
            .iter()
            .position(|op| matches!(op, DrawOp::Chart { .. }))
            .unwrap();
        let summary_index = prepared
            .ops
            .iter()
            .position(|op| matches!(op, DrawOp::Text { text, .. } if text == "Auto-Evaluation Summary"))
            .unwrap();

        assert!(matches!(prepared.ops[0], DrawOp::Line { .. }));
        assert!(chart_index < summary_index);
        assert!(matches!(prepared.ops.last(), Some(DrawOp::Text { text, .. }) if text == LICENSE_LINE));
    }

    #[test]
    fn test_prepare_is_deterministic() {
        let composer = composer();
        let first = composer.prepare(&jane(), &happy_record()).unwrap();
        let second = composer.prepare(&jane(), &happy_record()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_compose_produces_pdf() {
        let document = composer().compose(&jane(), &happy_record()).unwrap();
        assert!(document.bytes.starts_with(b"%PDF"));
        assert_eq!(document.file_name, "Client-Report-Jane.pdf");
        assert_eq!(document.page, PageSpec::default());
    }

    #[test]
    fn test_compose_empty_samples() {
        let document = composer().compose(&jane(), &record(Vec::new())).unwrap();
        assert!(document.bytes.starts_with(b"%PDF"));
        assert!(document.max_flow.is_none());
    }

    #[test]
    fn test_compose_with_huge_flow_time() {
        let mut huge = happy_record();
        huge.summary.flow_time = Some("1e300".to_string());

        let document = composer().compose(&jane(), &huge).unwrap();
        assert!(document.bytes.starts_with(b"%PDF"));
        assert_eq!(document.max_flow.map(|m| m.flow), Some(40.0));
    }
}
