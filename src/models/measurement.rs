//! Measurement model
//!
//! One uroflowmetry session per user and date: an ordered (time, flow, volume)
//! series plus the summary scalars reported by the device.

use std::fmt;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};

/// A raw sample reading: a JSON number or numeric text.
///
/// Device exports are not trusted to be numeric, so nothing is parsed on
/// the way in. Interpretation happens at render time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    Number(f64),
    Text(String),
}

impl SampleValue {
    /// Finite numeric value, if there is one
    pub fn to_finite(&self) -> Option<f64> {
        let value = match self {
            SampleValue::Number(n) => *n,
            SampleValue::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }

    /// Rebuild from a stored column, keeping numeric text as a number
    pub fn from_stored(raw: String) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => SampleValue::Number(n),
            _ => SampleValue::Text(raw),
        }
    }
}

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleValue::Number(n) => write!(f, "{}", n),
            SampleValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for SampleValue {
    fn from(value: f64) -> Self {
        SampleValue::Number(value)
    }
}

impl From<&str> for SampleValue {
    fn from(value: &str) -> Self {
        SampleValue::Text(value.to_string())
    }
}

/// One point of the flow/volume series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSample {
    pub time: SampleValue,
    pub flow: SampleValue,
    pub volume: SampleValue,
}

impl MeasurementSample {
    pub fn new(
        time: impl Into<SampleValue>,
        flow: impl Into<SampleValue>,
        volume: impl Into<SampleValue>,
    ) -> Self {
        Self {
            time: time.into(),
            flow: flow.into(),
            volume: volume.into(),
        }
    }
}

/// Device-computed statistics, kept as the text the device reported
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSummary {
    pub total_volume: Option<String>,
    pub total_measure_time: Option<String>,
    pub max_flow_speed: Option<String>,
    pub flow_time: Option<String>,
    pub average_flow_speed: Option<String>,
    pub time_of_max_speed: Option<String>,
}

impl MeasurementSummary {
    /// True if no scalar is set
    pub fn is_empty(&self) -> bool {
        self.total_volume.is_none()
            && self.total_measure_time.is_none()
            && self.max_flow_speed.is_none()
            && self.flow_time.is_none()
            && self.average_flow_speed.is_none()
            && self.time_of_max_speed.is_none()
    }
}

/// A stored measurement session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub id: i64,
    pub user_id: String,
    pub date: i64,
    #[serde(flatten)]
    pub summary: MeasurementSummary,
    pub samples: Vec<MeasurementSample>,
    pub created_at: String,
    pub updated_at: String,
}

/// Data for updating a measurement
#[derive(Debug, Clone, Default)]
pub struct MeasurementUpdate {
    pub date: Option<i64>,
    /// Replaces the whole series when set
    pub samples: Option<Vec<MeasurementSample>>,
    /// Only the scalars that are `Some` are overwritten
    pub summary: MeasurementSummary,
}

/// Outcome of appending samples
#[derive(Debug, Clone)]
pub struct AppendOutcome {
    pub record: MeasurementRecord,
    pub created: bool,
    pub appended: usize,
}

impl MeasurementRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            date: row.get("date")?,
            summary: MeasurementSummary {
                total_volume: row.get("total_volume")?,
                total_measure_time: row.get("total_measure_time")?,
                max_flow_speed: row.get("max_flow_speed")?,
                flow_time: row.get("flow_time")?,
                average_flow_speed: row.get("average_flow_speed")?,
                time_of_max_speed: row.get("time_of_max_speed")?,
            },
            samples: Vec::new(),
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn load_samples(conn: &Connection, measurement_id: i64) -> DbResult<Vec<MeasurementSample>> {
        let mut stmt = conn.prepare(
            "SELECT time, flow, volume FROM measurement_samples WHERE measurement_id = ?1 ORDER BY seq",
        )?;
        let samples = stmt
            .query_map([measurement_id], |row| {
                Ok(MeasurementSample {
                    time: SampleValue::from_stored(row.get(0)?),
                    flow: SampleValue::from_stored(row.get(1)?),
                    volume: SampleValue::from_stored(row.get(2)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(samples)
    }

    fn with_samples(conn: &Connection, mut record: Self) -> DbResult<Self> {
        record.samples = Self::load_samples(conn, record.id)?;
        Ok(record)
    }

    fn insert_samples(
        conn: &Connection,
        measurement_id: i64,
        first_seq: i64,
        samples: &[MeasurementSample],
    ) -> DbResult<()> {
        let mut stmt = conn.prepare(
            r#"
            INSERT INTO measurement_samples (measurement_id, seq, time, flow, volume)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )?;
        for (offset, sample) in samples.iter().enumerate() {
            stmt.execute(params![
                measurement_id,
                first_seq + offset as i64,
                sample.time.to_string(),
                sample.flow.to_string(),
                sample.volume.to_string(),
            ])?;
        }
        Ok(())
    }

    fn apply_summary(conn: &Connection, id: i64, summary: &MeasurementSummary) -> DbResult<()> {
        conn.execute(
            r#"
            UPDATE measurements SET
                total_volume = COALESCE(?1, total_volume),
                total_measure_time = COALESCE(?2, total_measure_time),
                max_flow_speed = COALESCE(?3, max_flow_speed),
                flow_time = COALESCE(?4, flow_time),
                average_flow_speed = COALESCE(?5, average_flow_speed),
                time_of_max_speed = COALESCE(?6, time_of_max_speed),
                updated_at = datetime('now')
            WHERE id = ?7
            "#,
            params![
                summary.total_volume,
                summary.total_measure_time,
                summary.max_flow_speed,
                summary.flow_time,
                summary.average_flow_speed,
                summary.time_of_max_speed,
                id,
            ],
        )?;
        Ok(())
    }

    /// Append samples to the session for (user, date), creating it if needed.
    ///
    /// Summary scalars that are set replace the stored ones.
    pub fn append(
        conn: &mut Connection,
        user_id: &str,
        date: i64,
        samples: &[MeasurementSample],
        summary: &MeasurementSummary,
    ) -> DbResult<AppendOutcome> {
        let tx = conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM measurements WHERE user_id = ?1 AND date = ?2",
                params![user_id, date],
                |row| row.get(0),
            )
            .optional()?;

        let (id, created) = match existing {
            Some(id) => (id, false),
            None => {
                tx.execute(
                    "INSERT INTO measurements (user_id, date) VALUES (?1, ?2)",
                    params![user_id, date],
                )?;
                (tx.last_insert_rowid(), true)
            }
        };

        let next_seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq) + 1, 0) FROM measurement_samples WHERE measurement_id = ?1",
            [id],
            |row| row.get(0),
        )?;

        Self::insert_samples(&tx, id, next_seq, samples)?;
        if !summary.is_empty() {
            Self::apply_summary(&tx, id, summary)?;
        }

        tx.commit()?;

        let record = Self::get_by_id(conn, id)?
            .ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))?;

        Ok(AppendOutcome {
            record,
            created,
            appended: samples.len(),
        })
    }

    /// Get a measurement by ID, samples included
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let record = conn
            .query_row("SELECT * FROM measurements WHERE id = ?1", [id], Self::from_row)
            .optional()?;

        record.map(|r| Self::with_samples(conn, r)).transpose()
    }

    /// Exact (user, date) lookup
    pub fn find(conn: &Connection, user_id: &str, date: i64) -> DbResult<Option<Self>> {
        let record = conn
            .query_row(
                "SELECT * FROM measurements WHERE user_id = ?1 AND date = ?2",
                params![user_id, date],
                Self::from_row,
            )
            .optional()?;

        record.map(|r| Self::with_samples(conn, r)).transpose()
    }

    /// List measurements, newest date first, optionally for one user
    pub fn list(conn: &Connection, user_id: Option<&str>) -> DbResult<Vec<Self>> {
        let headers = match user_id {
            Some(uid) => {
                let mut stmt =
                    conn.prepare("SELECT * FROM measurements WHERE user_id = ?1 ORDER BY date DESC")?;
                let rows = stmt
                    .query_map([uid], Self::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare("SELECT * FROM measurements ORDER BY user_id, date DESC")?;
                let rows = stmt
                    .query_map([], Self::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };

        headers
            .into_iter()
            .map(|r| Self::with_samples(conn, r))
            .collect()
    }

    /// Update date, summary scalars, or replace the sample series
    pub fn update(conn: &mut Connection, id: i64, data: &MeasurementUpdate) -> DbResult<Option<Self>> {
        let tx = conn.transaction()?;

        let exists: Option<i64> = tx
            .query_row("SELECT id FROM measurements WHERE id = ?1", [id], |row| row.get(0))
            .optional()?;
        if exists.is_none() {
            return Ok(None);
        }

        if let Some(date) = data.date {
            tx.execute(
                "UPDATE measurements SET date = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![date, id],
            )?;
        }

        if let Some(ref samples) = data.samples {
            tx.execute("DELETE FROM measurement_samples WHERE measurement_id = ?1", [id])?;
            Self::insert_samples(&tx, id, 0, samples)?;
        }

        if !data.summary.is_empty() {
            Self::apply_summary(&tx, id, &data.summary)?;
        }

        tx.commit()?;

        Self::get_by_id(conn, id)
    }

    /// Delete a measurement and its samples
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        conn.execute("DELETE FROM measurement_samples WHERE measurement_id = ?1", [id])?;
        let rows = conn.execute("DELETE FROM measurements WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn summary() -> MeasurementSummary {
        MeasurementSummary {
            total_volume: Some("40".to_string()),
            total_measure_time: Some("10".to_string()),
            max_flow_speed: Some("40".to_string()),
            flow_time: Some("10".to_string()),
            average_flow_speed: Some("20".to_string()),
            time_of_max_speed: Some("5".to_string()),
        }
    }

    #[test]
    fn test_sample_value_to_finite() {
        assert_eq!(SampleValue::Number(4.5).to_finite(), Some(4.5));
        assert_eq!(SampleValue::from(" 12 ").to_finite(), Some(12.0));
        assert_eq!(SampleValue::from("NaN").to_finite(), None);
        assert_eq!(SampleValue::from("Infinity").to_finite(), None);
        assert_eq!(SampleValue::from("inf").to_finite(), None);
        assert_eq!(SampleValue::from("abc").to_finite(), None);
        assert_eq!(SampleValue::Number(f64::NAN).to_finite(), None);
    }

    #[test]
    fn test_sample_value_deserializes_numbers_and_text() {
        let sample: MeasurementSample =
            serde_json::from_str(r#"{"time": 5, "flow": "NaN", "volume": "20"}"#).unwrap();
        assert_eq!(sample.time, SampleValue::Number(5.0));
        assert_eq!(sample.flow, SampleValue::Text("NaN".to_string()));
        assert_eq!(sample.volume.to_finite(), Some(20.0));
    }

    #[test]
    fn test_append_creates_then_extends() {
        let mut conn = setup();
        let first = vec![
            MeasurementSample::new(0.0, 0.0, 0.0),
            MeasurementSample::new(5.0, 40.0, 20.0),
        ];
        let outcome = MeasurementRecord::append(&mut conn, "user-1", 20240101, &first, &summary()).unwrap();
        assert!(outcome.created);
        assert_eq!(outcome.record.samples.len(), 2);

        let second = vec![MeasurementSample::new(10.0, 0.0, 40.0)];
        let outcome = MeasurementRecord::append(
            &mut conn,
            "user-1",
            20240101,
            &second,
            &MeasurementSummary::default(),
        )
        .unwrap();
        assert!(!outcome.created);
        assert_eq!(outcome.appended, 1);
        assert_eq!(outcome.record.samples.len(), 3);
        assert_eq!(outcome.record.samples[2].time, SampleValue::Number(10.0));
        // Summary survives an append that carries none
        assert_eq!(outcome.record.summary.flow_time.as_deref(), Some("10"));
    }

    #[test]
    fn test_malformed_sample_text_round_trips() {
        let mut conn = setup();
        let samples = vec![MeasurementSample::new(5.0, "NaN", 20.0)];
        MeasurementRecord::append(&mut conn, "user-1", 1, &samples, &summary()).unwrap();

        let record = MeasurementRecord::find(&conn, "user-1", 1).unwrap().unwrap();
        assert_eq!(record.samples[0].flow, SampleValue::Text("NaN".to_string()));
    }

    #[test]
    fn test_find_is_exact_on_date() {
        let mut conn = setup();
        MeasurementRecord::append(&mut conn, "user-1", 1, &[], &summary()).unwrap();

        assert!(MeasurementRecord::find(&conn, "user-1", 1).unwrap().is_some());
        assert!(MeasurementRecord::find(&conn, "user-1", 999).unwrap().is_none());
        assert!(MeasurementRecord::find(&conn, "X", 1).unwrap().is_none());
    }

    #[test]
    fn test_update_replaces_samples() {
        let mut conn = setup();
        let samples = vec![MeasurementSample::new(0.0, 1.0, 1.0)];
        let outcome = MeasurementRecord::append(&mut conn, "user-1", 1, &samples, &summary()).unwrap();

        let update = MeasurementUpdate {
            date: Some(2),
            samples: Some(vec![
                MeasurementSample::new(0.0, 2.0, 2.0),
                MeasurementSample::new(1.0, 3.0, 3.0),
            ]),
            summary: MeasurementSummary {
                flow_time: Some("12".to_string()),
                ..Default::default()
            },
        };
        let updated = MeasurementRecord::update(&mut conn, outcome.record.id, &update)
            .unwrap()
            .unwrap();
        assert_eq!(updated.date, 2);
        assert_eq!(updated.samples.len(), 2);
        assert_eq!(updated.summary.flow_time.as_deref(), Some("12"));
        assert_eq!(updated.summary.total_volume.as_deref(), Some("40"));

        assert!(MeasurementRecord::update(&mut conn, 9999, &update).unwrap().is_none());
    }

    #[test]
    fn test_delete_removes_samples() {
        let mut conn = setup();
        let samples = vec![MeasurementSample::new(0.0, 1.0, 1.0)];
        let outcome = MeasurementRecord::append(&mut conn, "user-1", 1, &samples, &summary()).unwrap();

        assert!(MeasurementRecord::delete(&conn, outcome.record.id).unwrap());
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM measurement_samples", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
