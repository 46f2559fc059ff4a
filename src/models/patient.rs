//! Patient model
//!
//! Demographics printed in the report header.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;

/// A patient record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub identity_number: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Data for creating a new patient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientCreate {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub identity_number: String,
}

/// Data for updating a patient
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientUpdate {
    pub user_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
}

/// The demographic subset the report header needs.
///
/// Every field is optional; the composer prints `N/A` for anything absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientIdentity {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub identity_number: Option<String>,
}

impl Patient {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            date_of_birth: row.get("date_of_birth")?,
            identity_number: row.get("identity_number")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Header fields for report generation
    pub fn identity(&self) -> PatientIdentity {
        PatientIdentity {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            date_of_birth: self.date_of_birth.clone(),
            identity_number: self.identity_number.clone(),
        }
    }

    /// Create a new patient
    pub fn create(conn: &Connection, data: &PatientCreate) -> DbResult<Self> {
        conn.execute(
            r#"
            INSERT INTO patients (user_id, first_name, last_name, date_of_birth, identity_number)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                data.user_id,
                data.first_name,
                data.last_name,
                data.date_of_birth,
                data.identity_number,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or_else(|| {
            crate::db::DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows)
        })
    }

    /// Get a patient by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM patients WHERE id = ?1")?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(patient) => Ok(Some(patient)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// First patient registered under a user account
    pub fn get_by_user_id(conn: &Connection, user_id: &str) -> DbResult<Option<Self>> {
        let mut stmt =
            conn.prepare("SELECT * FROM patients WHERE user_id = ?1 ORDER BY id LIMIT 1")?;

        let result = stmt.query_row([user_id], Self::from_row);
        match result {
            Ok(patient) => Ok(Some(patient)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Find a patient by identity number
    pub fn get_by_identity_number(conn: &Connection, identity_number: &str) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM patients WHERE identity_number = ?1")?;

        let result = stmt.query_row([identity_number], Self::from_row);
        match result {
            Ok(patient) => Ok(Some(patient)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List patients, optionally restricted to one user account
    pub fn list(conn: &Connection, user_id: Option<&str>) -> DbResult<Vec<Self>> {
        let patients = match user_id {
            Some(uid) => {
                let mut stmt =
                    conn.prepare("SELECT * FROM patients WHERE user_id = ?1 ORDER BY last_name, first_name")?;
                let rows = stmt
                    .query_map([uid], Self::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare("SELECT * FROM patients ORDER BY last_name, first_name")?;
                let rows = stmt
                    .query_map([], Self::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };

        Ok(patients)
    }

    /// Update a patient
    pub fn update(conn: &Connection, id: i64, data: &PatientUpdate) -> DbResult<Option<Self>> {
        let mut updates = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref user_id) = data.user_id {
            updates.push(format!("user_id = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(user_id.clone()));
        }
        if let Some(ref first_name) = data.first_name {
            updates.push(format!("first_name = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(first_name.clone()));
        }
        if let Some(ref last_name) = data.last_name {
            updates.push(format!("last_name = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(last_name.clone()));
        }
        if let Some(ref dob) = data.date_of_birth {
            updates.push(format!("date_of_birth = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(dob.clone()));
        }

        if updates.is_empty() {
            return Self::get_by_id(conn, id);
        }

        updates.push("updated_at = datetime('now')".to_string());

        let sql = format!(
            "UPDATE patients SET {} WHERE id = ?{}",
            updates.join(", "),
            params_vec.len() + 1
        );

        params_vec.push(Box::new(id));

        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        conn.execute(&sql, params_refs.as_slice())?;

        Self::get_by_id(conn, id)
    }

    /// Delete a patient
    pub fn delete(conn: &Connection, id: i64) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM patients WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }
}
