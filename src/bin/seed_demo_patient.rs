//! Utility to load the demo patient and measurement into the database

use uroflow::config::Settings;
use uroflow::db::{migrations, Database};
use uroflow::models::{MeasurementRecord, MeasurementSample, MeasurementSummary, Patient, PatientCreate};

const DEMO_USER: &str = "demo-user";
const DEMO_DATE: i64 = 20240315;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    let db_path = settings.database_path;
    println!("Database path: {}", db_path.display());

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let database = Database::new(&db_path)?;

    database.with_conn(|conn| {
        migrations::run_migrations(conn)?;
        Ok(())
    })?;

    database.with_conn(|conn| {
        let patient = match Patient::get_by_identity_number(conn, "123-45-6789")? {
            Some(existing) => existing,
            None => Patient::create(
                conn,
                &PatientCreate {
                    user_id: DEMO_USER.to_string(),
                    first_name: "Jane".to_string(),
                    last_name: "Doe".to_string(),
                    date_of_birth: "1990-01-01".to_string(),
                    identity_number: "123-45-6789".to_string(),
                },
            )?,
        };
        println!("Patient:");
        println!("  ID: {}", patient.id);
        println!("  User: {}", patient.user_id);
        Ok(())
    })?;

    database.with_conn_mut(|conn| {
        if let Some(existing) = MeasurementRecord::find(conn, DEMO_USER, DEMO_DATE)? {
            println!("Measurement already present (id {}), leaving it untouched", existing.id);
            return Ok(());
        }

        let samples = [
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

        let outcome = MeasurementRecord::append(conn, DEMO_USER, DEMO_DATE, &samples, &summary)?;
        println!("Measurement:");
        println!("  ID: {}", outcome.record.id);
        println!("  Date: {}", outcome.record.date);
        println!("  Samples: {}", outcome.record.samples.len());
        Ok(())
    })?;

    println!("Generate the report with user_id={} date={}", DEMO_USER, DEMO_DATE);
    Ok(())
}
