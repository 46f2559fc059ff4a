//! Report service
//!
//! Entry point for report generation: looks up the patient and the
//! measurement, composes the document and passes it to the sink.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use super::composer::{DocumentComposer, ReportDocument};
use super::error::{ReportError, ReportResult};
use super::sink::{NullSink, ReportSink};
use crate::db::{Database, DbResult};
use crate::models::{MeasurementRecord, Patient, PatientIdentity};

/// Source of header demographics
pub trait PatientLookup: Send + Sync {
    fn find_patient_by_user_id(&self, user_id: &str) -> DbResult<Option<PatientIdentity>>;
}

/// Source of measurement sessions
pub trait MeasurementLookup: Send + Sync {
    fn find_measurement(&self, user_id: &str, date: i64) -> DbResult<Option<MeasurementRecord>>;
}

impl PatientLookup for Database {
    fn find_patient_by_user_id(&self, user_id: &str) -> DbResult<Option<PatientIdentity>> {
        self.with_conn(|conn| Ok(Patient::get_by_user_id(conn, user_id)?.map(|p| p.identity())))
    }
}

impl MeasurementLookup for Database {
    fn find_measurement(&self, user_id: &str, date: i64) -> DbResult<Option<MeasurementRecord>> {
        self.with_conn(|conn| MeasurementRecord::find(conn, user_id, date))
    }
}

/// A composed report and where the sink put it
#[derive(Debug, Clone)]
pub struct GeneratedReport {
    pub document: ReportDocument,
    pub stored_path: Option<PathBuf>,
}

pub struct ReportService {
    patients: Arc<dyn PatientLookup>,
    measurements: Arc<dyn MeasurementLookup>,
    composer: DocumentComposer,
    sink: Arc<dyn ReportSink>,
}

impl ReportService {
    pub fn new(
        patients: Arc<dyn PatientLookup>,
        measurements: Arc<dyn MeasurementLookup>,
        composer: DocumentComposer,
    ) -> Self {
        Self {
            patients,
            measurements,
            composer,
            sink: Arc::new(NullSink),
        }
    }

    /// Both lookups served by one database
    pub fn with_database(db: Database, composer: DocumentComposer) -> Self {
        let db = Arc::new(db);
        Self::new(db.clone(), db, composer)
    }

    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Generate the report for one user's measurement on `date`
    pub fn generate(&self, user_id: &str, date: i64) -> ReportResult<GeneratedReport> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(ReportError::missing("user_id"));
        }

        info!(user_id, date, "Generating uroflowmetry report");

        let record = self
            .measurements
            .find_measurement(user_id, date)?
            .ok_or_else(|| {
                ReportError::NotFound(format!(
                    "No measurement data for user {} on date {}",
                    user_id, date
                ))
            })?;

        let patient = self
            .patients
            .find_patient_by_user_id(user_id)?
            .ok_or_else(|| ReportError::NotFound(format!("No patient registered for user {}", user_id)))?;

        let document = self.composer.compose(&patient, &record)?;

        let stored_path = self
            .sink
            .store(&document.file_name, &document.bytes)
            .map_err(|e| {
                warn!(user_id, error = %e, "Report sink failed");
                ReportError::Storage(e)
            })?;

        info!(
            user_id,
            date,
            bytes = document.bytes.len(),
            file_name = %document.file_name,
            "Report generated"
        );

        Ok(GeneratedReport {
            document,
            stored_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::db::migrations::run_migrations;
    use crate::models::{MeasurementSample, MeasurementSummary, PatientCreate};
    use crate::report::chart::{ChartRenderer, ChartStyle};
    use crate::report::layout::PageSpec;

    /// Records every store call
    #[derive(Default)]
    struct RecordingSink {
        stored: Mutex<Vec<String>>,
    }

    impl ReportSink for RecordingSink {
        fn store(&self, file_name: &str, _bytes: &[u8]) -> std::io::Result<Option<PathBuf>> {
            self.stored.lock().unwrap().push(file_name.to_string());
            Ok(Some(PathBuf::from(file_name)))
        }
    }

    fn composer() -> DocumentComposer {
        let renderer = ChartRenderer::new(ChartStyle {
            labels: false,
            ..Default::default()
        });
        DocumentComposer::new(renderer, PageSpec::default())
    }

    fn seeded_db() -> Database {
        let db = Database::in_memory().unwrap();
        db.with_conn_mut(|conn| {
            run_migrations(conn)?;
            Patient::create(
                conn,
                &PatientCreate {
                    user_id: "user-1".to_string(),
                    first_name: "Jane".to_string(),
                    last_name: "Doe".to_string(),
                    date_of_birth: "1990-01-01".to_string(),
                    identity_number: "123-45-6789".to_string(),
                },
            )?;
            let samples = vec![
                MeasurementSample::new(0.0, 0.0, 0.0),
                MeasurementSample::new(5.0, 40.0, 20.0),
                MeasurementSample::new(10.0, 0.0, 40.0),
            ];
            let summary = MeasurementSummary {
                total_volume: Some("40".to_string()),
                total_measure_time: Some("10".to_string()),
                max_flow_speed: Some("40".to_string()),
                flow_time: Some("10".to_string()),
                average_flow_speed: Some("20".to_string()),
                time_of_max_speed: Some("5".to_string()),
            };
            MeasurementRecord::append(conn, "user-1", 999, &samples, &summary)?;
            MeasurementRecord::append(conn, "orphan", 1, &samples, &summary)?;
            Ok(())
        })
        .unwrap();
        db
    }

    fn service_with_sink(db: Database) -> (ReportService, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let service = ReportService::with_database(db, composer()).with_sink(sink.clone());
        (service, sink)
    }

    #[test]
    fn test_generate_happy_path() {
        let (service, sink) = service_with_sink(seeded_db());
        let report = service.generate("user-1", 999).unwrap();

        assert!(report.document.bytes.starts_with(b"%PDF"));
        assert_eq!(report.document.file_name, "Client-Report-Jane.pdf");
        let max = report.document.max_flow.unwrap();
        assert_eq!((max.time, max.flow), (5.0, 40.0));
        assert_eq!(report.stored_path, Some(PathBuf::from("Client-Report-Jane.pdf")));
        assert_eq!(sink.stored.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_record_is_not_found() {
        let (service, sink) = service_with_sink(seeded_db());
        let err = service.generate("X", 999).unwrap_err();

        assert!(matches!(err, ReportError::NotFound(_)));
        assert!(sink.stored.lock().unwrap().is_empty());
    }

    #[test]
    fn test_wrong_date_is_not_found() {
        let (service, _) = service_with_sink(seeded_db());
        assert!(matches!(
            service.generate("user-1", 1000),
            Err(ReportError::NotFound(_))
        ));
    }

    #[test]
    fn test_missing_patient_is_not_found() {
        let (service, sink) = service_with_sink(seeded_db());
        let err = service.generate("orphan", 1).unwrap_err();

        assert!(matches!(err, ReportError::NotFound(ref m) if m.contains("patient")));
        assert!(sink.stored.lock().unwrap().is_empty());
    }

    #[test]
    fn test_blank_user_id_is_rejected() {
        let (service, _) = service_with_sink(seeded_db());
        let err = service.generate("  ", 999).unwrap_err();
        assert!(matches!(err, ReportError::Validation { field: "user_id", .. }));
    }

    #[test]
    fn test_default_sink_stores_nothing() {
        let service = ReportService::with_database(seeded_db(), composer());
        let report = service.generate("user-1", 999).unwrap();
        assert!(report.stored_path.is_none());
    }
}
