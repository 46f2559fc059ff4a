//! Uroflowmetry report engine
//!
//! Chart rendering, page layout, document composition and the service that
//! ties them to stored patients and measurements.

pub mod chart;
pub mod composer;
pub mod error;
pub mod layout;
mod pdf;
pub mod service;
pub mod sink;

pub use chart::{ChartRenderer, ChartStyle, MaxFlowPoint, RenderedChart};
pub use composer::{DocumentComposer, DrawOp, PreparedPage, ReportDocument};
pub use error::{ReportError, ReportResult};
pub use layout::{PageLayout, PageSpec};
pub use service::{GeneratedReport, MeasurementLookup, PatientLookup, ReportService};
pub use sink::{DirectorySink, NullSink, ReportSink};
