//! The System Printer: submits raw jobs to an OS print queue.
//!
//! Both submission paths go through the CUPS `lp` command with `-o raw`, so
//! the job bytes reach the printer untouched:
//!
//! ```text
//! print_raw        job ──stdin──▶ lp -o raw [-d queue] [-t title]
//! print_alternate  job ──▶ spool file ──▶ lp -o raw [-d queue] [-t title] <file> ──▶ delete file
//! ```
//!
//! The alternate path exists for drivers that mangle jobs arriving on stdin.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::file::FilePrinter;
use super::{BackendError, BackendKind, OutputBackend};
use crate::buffer::ByteBuffer;

/// The spooler invoked when none is configured.
pub const DEFAULT_SPOOLER: &str = "lp";

/// Submits jobs to an OS print queue.
#[derive(Debug)]
pub struct SystemPrinter {
    name: String,
    job_title: Option<String>,
    /// `None` submits to the system default queue.
    queue: Option<String>,
    spooler: String,
    spool_dir: PathBuf,
}

impl SystemPrinter {
    pub fn new(queue: Option<String>) -> Self {
        let name = queue.clone().unwrap_or_else(|| "Default Printer".to_string());
        Self {
            name,
            job_title: None,
            queue,
            spooler: DEFAULT_SPOOLER.to_string(),
            spool_dir: std::env::temp_dir(),
        }
    }

    /// Uses `program` instead of `lp`.  It must accept `lp`'s options.
    pub fn with_spooler(mut self, program: impl Into<String>) -> Self {
        self.spooler = program.into();
        self
    }

    /// Directory for alternate-path spool files.  Defaults to the OS temp dir.
    pub fn with_spool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spool_dir = dir.into();
        self
    }

    pub fn spooler(&self) -> &str {
        &self.spooler
    }

    /// `lp -o raw [-d queue] [-t title]`, shared by both submission paths.
    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.spooler);
        cmd.arg("-o").arg("raw");
        if let Some(queue) = &self.queue {
            cmd.arg("-d").arg(queue);
        }
        if let Some(title) = &self.job_title {
            cmd.arg("-t").arg(title);
        }
        cmd
    }

    /// Runs `cmd`, optionally feeding `stdin`, and checks the exit status.
    fn run(&self, mut cmd: Command, stdin: Option<&[u8]>) -> Result<(), BackendError> {
        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            BackendError::Unavailable(format!("cannot start spooler '{}': {e}", self.spooler))
        })?;

        if let (Some(data), Some(mut pipe)) = (stdin, child.stdin.take()) {
            // A spooler that exits early closes its end; the exit status
            // below is what decides success.
            if let Err(e) = pipe.write_all(data) {
                if e.kind() != ErrorKind::BrokenPipe {
                    warn!("failed to stream job to spooler: {e}");
                }
            }
        }

        let output = child.wait_with_output().map_err(|e| {
            BackendError::Unavailable(format!("spooler '{}' did not finish: {e}", self.spooler))
        })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(BackendError::Unavailable(format!(
                "spooler '{}' exited with {}: {}",
                self.spooler,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    fn spool_path(&self) -> PathBuf {
        self.spool_dir.join(format!("printbridge-spool-{}", Uuid::new_v4()))
    }
}

impl OutputBackend for SystemPrinter {
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

    fn ready(&self) -> bool {
        true
    }

    fn print_raw(&mut self, job: &ByteBuffer) -> Result<(), BackendError> {
        let cmd = self.base_command();
        let bytes = job.materialize();
        self.run(cmd, Some(&bytes[..]))?;
        info!(
            "submitted {} bytes to queue {}",
            bytes.len(),
            self.queue.as_deref().unwrap_or("<default>")
        );
        Ok(())
    }

    fn print_alternate(&mut self, job: &ByteBuffer) -> Result<(), BackendError> {
        let spool = self.spool_path();
        let mut writer = FilePrinter::new();
        writer.set_output_path(&spool)?;
        writer.print_raw(job)?;

        let mut cmd = self.base_command();
        cmd.arg(&spool);
        let result = self.run(cmd, None);

        remove_spool(&spool);
        if result.is_ok() {
            info!(
                "submitted spool file to queue {}",
                self.queue.as_deref().unwrap_or("<default>")
            );
        }
        result
    }

    fn kind(&self) -> BackendKind {
        BackendKind::System
    }

    fn print_queue(&self) -> Option<&str> {
        self.queue.as_deref()
    }
}

fn remove_spool(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("removed spool file {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("failed to remove spool file {}: {e}", path.display()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> ByteBuffer {
        ByteBuffer::from_bytes(&b"^XA^FDhello^FS^XZ"[..])
    }

    #[test]
    fn test_name_defaults_to_queue() {
        let named = SystemPrinter::new(Some("zebra".to_string()));
        let default = SystemPrinter::new(None);

        assert_eq!(named.name(), "zebra");
        assert_eq!(named.print_queue(), Some("zebra"));
        assert_eq!(default.print_queue(), None);
        assert_eq!(default.spooler(), "lp");
    }

    #[test]
    fn test_missing_spooler_is_unavailable() {
        let mut printer =
            SystemPrinter::new(None).with_spooler("printbridge-no-such-spooler-binary");

        let result = printer.print_raw(&job());

        assert!(matches!(result, Err(BackendError::Unavailable(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_spooler_exit_is_ok() {
        let mut printer = SystemPrinter::new(Some("q".to_string())).with_spooler("true");
        assert!(printer.print_raw(&job()).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_spooler_exit_is_unavailable() {
        let mut printer = SystemPrinter::new(Some("q".to_string())).with_spooler("false");

        let result = printer.print_raw(&job());

        assert!(matches!(result, Err(BackendError::Unavailable(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_alternate_removes_spool_file_on_success_and_failure() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let mut ok = SystemPrinter::new(Some("q".to_string()))
            .with_spooler("true")
            .with_spool_dir(dir.path());
        let mut failing = SystemPrinter::new(Some("q".to_string()))
            .with_spooler("false")
            .with_spool_dir(dir.path());

        // Act
        let first = ok.print_alternate(&job());
        let second = failing.print_alternate(&job());

        // Assert
        assert!(first.is_ok());
        assert!(matches!(second, Err(BackendError::Unavailable(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    /// Writes a spooler stand-in that records its arguments, one per line.
    #[cfg(unix)]
    fn recording_spooler(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("record-lp");
        std::fs::write(
            &script,
            "#!/bin/sh\nprintf '%s\\n' \"$@\" > \"$(dirname \"$0\")/args.txt\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[test]
    fn test_alternate_path_passes_job_title() {
        // Arrange
        let bin = tempfile::tempdir().unwrap();
        let spool = tempfile::tempdir().unwrap();
        let mut printer = SystemPrinter::new(Some("zebra".to_string()))
            .with_spooler(recording_spooler(bin.path()).to_string_lossy())
            .with_spool_dir(spool.path());
        printer.set_job_title("Invoice 7".to_string());

        // Act
        printer.print_alternate(&job()).unwrap();

        // Assert
        let args = std::fs::read_to_string(bin.path().join("args.txt")).unwrap();
        let args: Vec<&str> = args.lines().collect();
        assert_eq!(&args[..6], ["-o", "raw", "-d", "zebra", "-t", "Invoice 7"]);
        assert_eq!(args.len(), 7, "spool file path comes last");
    }
}
