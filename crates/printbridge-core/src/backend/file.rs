//! The File Printer: writes the raw job to a path on disk.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use super::denylist::is_denied;
use super::{BackendError, BackendKind, OutputBackend};
use crate::buffer::ByteBuffer;

const DEFAULT_NAME: &str = "File Printer";

/// Writes jobs to a file.
///
/// The output path is validated when it is set, never at write time, so a
/// denied path can never reach the filesystem.
#[derive(Debug)]
pub struct FilePrinter {
    name: String,
    job_title: Option<String>,
    output_path: Option<PathBuf>,
}

impl FilePrinter {
    pub fn new() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            job_title: None,
            output_path: None,
        }
    }

    /// Sets where the next `print_raw` writes.
    ///
    /// # Errors
    ///
    /// [`BackendError::InvalidTarget`] if the file extension is on the
    /// denylist.  The previous path, if any, is kept.
    pub fn set_output_path(&mut self, path: impl Into<PathBuf>) -> Result<(), BackendError> {
        let path = path.into();
        if is_denied(&path) {
            return Err(BackendError::InvalidTarget(format!(
                "refusing to write file with denied extension: {}",
                path.display()
            )));
        }
        self.output_path = Some(path);
        Ok(())
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }
}

impl Default for FilePrinter {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputBackend for FilePrinter {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn job_title(&self) -> Option<&str> {
        self.job_title.as_deref()
    }

    fn set_job_title(&mut self, title: String) {
        self.job_title = Some(title);
    }

    /// Always `true`.  A missing output path is reported by `print_raw`.
    fn ready(&self) -> bool {
        true
    }

    /// Writes the materialized job, replacing any existing file.
    ///
    /// Filesystem failures are logged, not returned.
    fn print_raw(&mut self, job: &ByteBuffer) -> Result<(), BackendError> {
        let path = self
            .output_path
            .as_ref()
            .ok_or_else(|| BackendError::InvalidTarget("no output path set".to_string()))?;

        let bytes = job.materialize();
        match fs::write(path, &bytes) {
            Ok(()) => info!("wrote {} bytes to {}", bytes.len(), path.display()),
            Err(e) => error!("failed to write job to {}: {e}", path.display()),
        }
        Ok(())
    }

    fn print_alternate(&mut self, _job: &ByteBuffer) -> Result<(), BackendError> {
        warn!("alternate printing is not supported by the file printer");
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::File
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let printer = FilePrinter::new();
        assert_eq!(printer.name(), "File Printer");
        assert_eq!(printer.kind(), BackendKind::File);
        assert!(printer.output_path().is_none());
    }

    #[test]
    fn test_ready_without_output_path() {
        let printer = FilePrinter::new();

        assert!(printer.ready());
        assert!(printer.output_path().is_none());
    }

    #[test]
    fn test_denied_path_is_rejected_and_previous_kept() {
        // Arrange
        let mut printer = FilePrinter::new();
        printer.set_output_path("/tmp/label.txt").unwrap();

        // Act
        let result = printer.set_output_path("/tmp/run.EXE");

        // Assert
        assert!(matches!(result, Err(BackendError::InvalidTarget(_))));
        assert_eq!(printer.output_path(), Some(Path::new("/tmp/label.txt")));
    }

    #[test]
    fn test_print_without_path_is_invalid_target() {
        let mut printer = FilePrinter::new();
        let job = ByteBuffer::from_bytes(&b"data"[..]);

        let result = printer.print_raw(&job);

        assert!(matches!(result, Err(BackendError::InvalidTarget(_))));
    }

    #[test]
    fn test_print_raw_writes_job_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let mut printer = FilePrinter::new();
        printer.set_output_path(&path).unwrap();
        let mut job = ByteBuffer::new();
        job.append(&b"hel"[..]).append(&b"lo"[..]);

        printer.print_raw(&job).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"hello");
    }

    #[test]
    fn test_io_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.txt");
        let mut printer = FilePrinter::new();
        printer.set_output_path(&path).unwrap();

        let result = printer.print_raw(&ByteBuffer::from_bytes(&b"x"[..]));

        assert!(result.is_ok());
        assert!(!path.exists());
    }

    #[test]
    fn test_alternate_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alt.txt");
        let mut printer = FilePrinter::new();
        printer.set_output_path(&path).unwrap();

        printer
            .print_alternate(&ByteBuffer::from_bytes(&b"x"[..]))
            .unwrap();

        assert!(!path.exists());
    }
}
