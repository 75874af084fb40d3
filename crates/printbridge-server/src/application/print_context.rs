//! Per-session print state.

use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, info};
use uuid::Uuid;

use printbridge_core::backend::{FilePrinter, SystemPrinter};
use printbridge_core::{
    send_to_host, Backend, BackendError, BackendTarget, ByteBuffer, Charset, OutputBackend,
};

use super::CommandError;
use crate::domain::BridgeConfig;

/// Connect and write timeout for `printToHost`.
pub const HOST_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything one page has set up for printing: the job being assembled,
/// the selected backend and the options applied when the job is submitted.
///
/// A session creates its context on the first recognized command and keeps
/// it until the connection closes.
#[derive(Debug)]
pub struct PrintContext {
    id: Uuid,
    job: ByteBuffer,
    backend: Option<Backend>,
    charset: Charset,
    job_title: Option<String>,
    alternate: bool,
    spooler: String,
}

impl PrintContext {
    pub fn new(defaults: &BridgeConfig) -> Self {
        let backend = defaults
            .debug_sink_at_start
            .then(|| Backend::Debug(Default::default()));
        Self {
            id: Uuid::new_v4(),
            job: ByteBuffer::new(),
            backend,
            charset: defaults.default_charset,
            job_title: None,
            alternate: false,
            spooler: defaults.spooler.clone(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn job(&self) -> &ByteBuffer {
        &self.job
    }

    pub fn job_mut(&mut self) -> &mut ByteBuffer {
        &mut self.job
    }

    /// The selected backend, if any.
    pub fn backend(&self) -> Option<&Backend> {
        self.backend.as_ref()
    }

    /// Replaces the selected backend with a new one built for `target`.
    ///
    /// The previous backend releases whatever it holds first.  If building
    /// the new backend fails, the previous one stays selected.
    pub fn select(&mut self, target: BackendTarget) -> Result<(), CommandError> {
        if let Some(previous) = self.backend.as_mut() {
            previous.release();
        }
        let backend = match target {
            BackendTarget::System { queue } => {
                Backend::System(SystemPrinter::new(queue).with_spooler(self.spooler.as_str()))
            }
            other => Backend::new(other)?,
        };
        info!(
            "context {}: selected {} printer '{}'",
            self.id,
            backend.kind(),
            backend.name()
        );
        self.backend = Some(backend);
        Ok(())
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn set_charset(&mut self, charset: Charset) {
        self.charset = charset;
    }

    pub fn job_title(&self) -> Option<&str> {
        self.job_title.as_deref()
    }

    pub fn set_job_title(&mut self, title: String) {
        self.job_title = Some(title);
    }

    pub fn alternate(&self) -> bool {
        self.alternate
    }

    pub fn set_alternate(&mut self, alternate: bool) {
        self.alternate = alternate;
    }

    /// Appends `text` encoded in the context charset.
    pub fn append_text(&mut self, text: &str) {
        self.job.append_text(text, self.charset);
    }

    /// Sends the job to the selected backend and clears it.
    ///
    /// Uses the alternate path when `useAlternatePrinting true` was sent.
    ///
    /// # Errors
    ///
    /// [`CommandError::NoPrinter`] when nothing is selected; the job is kept
    /// so the page can select a printer and retry.  Backend failures are
    /// returned after the job has been cleared.
    pub fn submit(&mut self) -> Result<(), CommandError> {
        let alternate = self.alternate;
        self.print_selected(alternate)
    }

    /// Selects a File Printer on `path` and writes the job to it.
    ///
    /// # Errors
    ///
    /// [`BackendError::InvalidTarget`](printbridge_core::BackendError) for a
    /// denied extension.  Nothing is written and the previous backend stays
    /// selected.
    pub fn print_to_file(&mut self, path: &str) -> Result<(), CommandError> {
        let mut printer = FilePrinter::new();
        printer.set_output_path(path)?;

        if let Some(mut previous) = self.backend.replace(Backend::File(printer)) {
            previous.release();
        }
        info!("context {}: printing to file {path}", self.id);
        self.print_selected(false)
    }

    /// Sends the job over raw TCP to `host:port` and clears it.
    ///
    /// Does not change the selected backend.  Blocks until the send finishes,
    /// so inside a runtime this must run on a blocking-pool thread
    /// (`spawn_blocking`), never directly in an async task.
    pub fn print_to_host(&mut self, host: &str, port: u16) -> Result<(), CommandError> {
        if self.job.is_empty() {
            info!("context {}: no data to send to {host}:{port}", self.id);
            return Ok(());
        }
        let send = send_to_host(host, port, &self.job, HOST_TIMEOUT);
        let result = match Handle::try_current() {
            Ok(handle) => handle.block_on(send),
            Err(_) => tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| BackendError::Unavailable(format!("no runtime for raw print: {e}")))
                .and_then(|runtime| runtime.block_on(send)),
        };
        self.job.clear();
        result.map_err(CommandError::from)
    }

    /// Frees any resource the selected backend holds.
    pub fn release(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            debug!("context {}: releasing {} printer", self.id, backend.kind());
            backend.release();
        }
    }

    fn print_selected(&mut self, alternate: bool) -> Result<(), CommandError> {
        if self.job.is_empty() {
            info!("context {}: no data to print", self.id);
            return Ok(());
        }
        let backend = self.backend.as_mut().ok_or(CommandError::NoPrinter)?;
        if let Some(title) = &self.job_title {
            backend.set_job_title(title.clone());
        }

        let result = if alternate {
            backend.print_alternate(&self.job)
        } else {
            backend.print_raw(&self.job)
        };
        debug!(
            "context {}: submitted {} bytes to {}",
            self.id,
            self.job.len(),
            backend.kind()
        );
        self.job.clear();
        result.map_err(CommandError::from)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
