//! The debug sink: logs what would have been printed.

use tracing::info;

use super::{BackendError, BackendKind, OutputBackend};
use crate::buffer::ByteBuffer;

const DEFAULT_NAME: &str = "Debug Printer";

/// Accepts every job and logs its content instead of printing it.
#[derive(Debug)]
pub struct DebugSink {
    name: String,
    job_title: Option<String>,
    jobs_seen: usize,
}

impl DebugSink {
    pub fn new() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            job_title: None,
            jobs_seen: 0,
        }
    }

    /// How many jobs this sink has accepted, through either print path.
    pub fn jobs_seen(&self) -> usize {
        self.jobs_seen
    }

    fn log_job(&mut self, path: &str, job: &ByteBuffer) {
        let bytes = job.materialize();
        self.jobs_seen += 1;
        info!(
            title = self.job_title.as_deref().unwrap_or(""),
            "{path} ({} bytes): {}",
            bytes.len(),
            String::from_utf8_lossy(&bytes)
        );
    }
}

impl Default for DebugSink {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputBackend for DebugSink {
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
        self.log_job("print_raw", job);
        Ok(())
    }

    fn print_alternate(&mut self, job: &ByteBuffer) -> Result<(), BackendError> {
        self.log_job("print_alternate", job);
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Debug
    }
}
