//! Data models
//!
//! Rust structs representing database entities.

mod measurement;
mod patient;

pub use measurement::{
    AppendOutcome, MeasurementRecord, MeasurementSample, MeasurementSummary, MeasurementUpdate,
    SampleValue,
};
pub use patient::{Patient, PatientCreate, PatientIdentity, PatientUpdate};
