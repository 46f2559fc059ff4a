//! Report persistence hooks

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{error, info};

/// Where a finished report goes besides the caller
pub trait ReportSink: Send + Sync {
    /// Store the bytes; returns the location if anything was written
    fn store(&self, file_name: &str, bytes: &[u8]) -> io::Result<Option<PathBuf>>;
}

/// Discards reports
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn store(&self, _file_name: &str, _bytes: &[u8]) -> io::Result<Option<PathBuf>> {
        Ok(None)
    }
}

/// A writer whose contents can be forced to stable storage
trait Durable: Write {
    fn sync(&self) -> io::Result<()>;
}

impl Durable for File {
    fn sync(&self) -> io::Result<()> {
        self.sync_all()
    }
}

fn write_synced<W: Durable>(writer: W, bytes: &[u8]) -> io::Result<()> {
    let mut writer = BufWriter::new(writer);
    writer.write_all(bytes)?;
    writer.flush()?;
    writer.get_ref().sync()
}

/// Writes reports into a directory, replacing same-named files.
///
/// Bytes go to a hidden staging file first and are renamed over the target
/// only once fully written, so an earlier report survives a failed write.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn staging_path(&self, file_name: &str) -> PathBuf {
        self.dir.join(format!(".{}.partial", file_name))
    }

    fn store_with<W, F>(&self, file_name: &str, bytes: &[u8], open: F) -> io::Result<Option<PathBuf>>
    where
        W: Durable,
        F: FnOnce(&Path) -> io::Result<W>,
    {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        let staging = self.staging_path(file_name);

        let written = open(&staging)
            .and_then(|writer| write_synced(writer, bytes))
            .and_then(|()| fs::rename(&staging, &path));

        if let Err(e) = written {
            error!(path = %path.display(), error = %e, "Failed to write report");
            let _ = fs::remove_file(&staging);
            return Err(e);
        }

        info!(path = %path.display(), bytes = bytes.len(), "Stored report");
        Ok(Some(path))
    }
}

impl ReportSink for DirectorySink {
    fn store(&self, file_name: &str, bytes: &[u8]) -> io::Result<Option<PathBuf>> {
        self.store_with(file_name, bytes, |p: &Path| File::create(p))
    }
}
