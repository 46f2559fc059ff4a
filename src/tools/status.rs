//! Server status tool
//!
//! Runtime information about the report server: build, storage and process.

use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::build_info::BuildInfo;

/// Runtime status of the report server
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    /// Build information
    pub build_number: u64,
    pub build_timestamp: &'static str,
    pub version: &'static str,

    /// Storage information
    pub database_path: String,
    pub database_size_bytes: Option<u64>,
    pub report_dir: Option<String>,
    pub stored_report_count: Option<usize>,

    /// Process information
    pub uptime_seconds: u64,
    pub process_id: u32,
    pub memory_usage_bytes: u64,
    pub reports_generated: u64,
}

/// Collects runtime information for the status tool
pub struct StatusTracker {
    start_time: Instant,
    database_path: PathBuf,
    report_dir: Option<PathBuf>,
    reports_generated: u64,
}

impl StatusTracker {
    pub fn new(database_path: PathBuf, report_dir: Option<PathBuf>) -> Self {
        Self {
            start_time: Instant::now(),
            database_path,
            report_dir,
            reports_generated: 0,
        }
    }

    /// Count one successful generation
    pub fn record_report(&mut self) {
        self.reports_generated += 1;
    }

    pub fn get_status(&self) -> ServerStatus {
        let build_info = BuildInfo::current();

        let database_size_bytes = std::fs::metadata(&self.database_path)
            .ok()
            .map(|m| m.len());

        let stored_report_count = self.report_dir.as_ref().and_then(|dir| {
            std::fs::read_dir(dir).ok().map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.path().extension().is_some_and(|ext| ext == "pdf"))
                    .count()
            })
        });

        let pid = std::process::id();
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]));

        let memory_usage_bytes = sys
            .process(Pid::from_u32(pid))
            .map(|p| p.memory())
            .unwrap_or(0);

        ServerStatus {
            build_number: build_info.build_number,
            build_timestamp: build_info.build_timestamp,
            version: build_info.version,
            database_path: self.database_path.display().to_string(),
            database_size_bytes,
            report_dir: self.report_dir.as_ref().map(|d| d.display().to_string()),
            stored_report_count,
            uptime_seconds: self.start_time.elapsed().as_secs(),
            process_id: pid,
            memory_usage_bytes,
            reports_generated: self.reports_generated,
        }
    }
}
