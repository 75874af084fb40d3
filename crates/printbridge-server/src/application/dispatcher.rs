//! The verb table: which commands exist and what each one does.
//!
//! Verbs fall into two groups:
//!
//! - **Handled** verbs map to a [`Handler`] that acts on the session's
//!   [`PrintContext`].
//! - **Accepted** verbs are part of the page API but have no effect here
//!   (format-specific rendering, serial ports, network queries).  They are
//!   recognized so that pages written against the full API keep working.
//!
//! Anything else is ignored by the session.

use std::collections::HashMap;

use tracing::info;

use printbridge_core::backend::DEFAULT_RAW_PORT;
use printbridge_core::{BackendTarget, OutputBackend, UsbTarget};

use super::payload::{base64_decode, hex_decode};
use super::print_context::PrintContext;
use super::CommandError;

/// A command implementation.  Receives the raw payload text.
pub type Handler = fn(&mut PrintContext, &str) -> Result<(), CommandError>;

/// What a recognized verb resolves to.
#[derive(Clone, Copy)]
pub enum Route {
    Handler(Handler),
    /// Recognized, does nothing.
    Accepted,
}

/// Verbs that are part of the page API but have no effect.
const ACCEPTED_VERBS: &[&str] = &[
    "findPrinters",
    "appendEPL",
    "appendESCP",
    "appendZPL",
    "appendEPCL",
    "appendEPCL2",
    "appendPS",
    "appendXML",
    "appendFile",
    "appendImage",
    "appendPDF",
    "appendHTML",
    "printHTML",
    "printHTML5Page",
    "printPS",
    "findNetworkInfo",
    "setLogPostScriptFeatures",
    "findPorts",
    "openPort",
    "closePort",
    "send",
];

/// Maps verbs to routes.  Built once at startup and shared by every session
/// through an `Arc`.
pub struct Dispatcher {
    routes: HashMap<&'static str, Route>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let mut routes = HashMap::new();

        // Readiness and printer selection
        routes.insert("qzReady", Route::Handler(qz_ready));
        routes.insert("useDefaultPrinter", Route::Handler(use_default_printer));
        routes.insert("findPrinter", Route::Handler(find_printer));
        routes.insert("useDebugPrinter", Route::Handler(use_debug_printer));
        routes.insert("findUsbPrinter", Route::Handler(find_usb_printer));

        // Job assembly
        routes.insert("append", Route::Handler(append));
        routes.insert("append64", Route::Handler(append64));
        routes.insert("appendHex", Route::Handler(append_hex));
        routes.insert("setEncoding", Route::Handler(set_encoding));
        routes.insert("setJobName", Route::Handler(set_job_name));
        routes.insert("useAlternatePrinting", Route::Handler(use_alternate_printing));
        routes.insert("clear", Route::Handler(clear));

        // Submission
        routes.insert("print", Route::Handler(print));
        routes.insert("printToFile", Route::Handler(print_to_file));
        routes.insert("printToHost", Route::Handler(print_to_host));

        for verb in ACCEPTED_VERBS {
            routes.insert(*verb, Route::Accepted);
        }

        Self { routes }
    }

    /// Looks up `verb`, case-sensitively.
    pub fn route(&self, verb: &str) -> Option<Route> {
        self.routes.get(verb).copied()
    }

    /// Number of recognized verbs.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────────

fn qz_ready(ctx: &mut PrintContext, _payload: &str) -> Result<(), CommandError> {
    match ctx.backend() {
        Some(backend) => info!(
            "context {}: {} printer '{}' ready={}",
            ctx.id(),
            backend.kind(),
            backend.name(),
            backend.ready()
        ),
        None => info!("context {}: ready, no printer selected", ctx.id()),
    }
    Ok(())
}

fn use_default_printer(ctx: &mut PrintContext, _payload: &str) -> Result<(), CommandError> {
    ctx.select(BackendTarget::System { queue: None })
}

fn find_printer(ctx: &mut PrintContext, payload: &str) -> Result<(), CommandError> {
    let queue = required(payload, "printer name")?;
    ctx.select(BackendTarget::System {
        queue: Some(queue.to_string()),
    })
}

fn use_debug_printer(ctx: &mut PrintContext, _payload: &str) -> Result<(), CommandError> {
    ctx.select(BackendTarget::Debug)
}

fn find_usb_printer(ctx: &mut PrintContext, payload: &str) -> Result<(), CommandError> {
    let target: UsbTarget = payload.parse()?;
    ctx.select(BackendTarget::Usb(target))
}

fn append(ctx: &mut PrintContext, payload: &str) -> Result<(), CommandError> {
    ctx.append_text(payload);
    Ok(())
}

fn append64(ctx: &mut PrintContext, payload: &str) -> Result<(), CommandError> {
    let bytes = base64_decode(payload)?;
    ctx.job_mut().append(bytes);
    Ok(())
}

fn append_hex(ctx: &mut PrintContext, payload: &str) -> Result<(), CommandError> {
    let bytes = hex_decode(payload)?;
    ctx.job_mut().append(bytes);
    Ok(())
}

fn set_encoding(ctx: &mut PrintContext, payload: &str) -> Result<(), CommandError> {
    ctx.set_charset(payload.trim().parse()?);
    Ok(())
}

fn set_job_name(ctx: &mut PrintContext, payload: &str) -> Result<(), CommandError> {
    ctx.set_job_title(payload.to_string());
    Ok(())
}

fn use_alternate_printing(ctx: &mut PrintContext, payload: &str) -> Result<(), CommandError> {
    let flag = payload.trim();
    let alternate = if flag.eq_ignore_ascii_case("true") {
        true
    } else if flag.eq_ignore_ascii_case("false") {
        false
    } else {
        return Err(CommandError::InvalidArgument(format!(
            "expected true or false, got '{flag}'"
        )));
    };
    ctx.set_alternate(alternate);
    info!("context {}: alternate printing set to {alternate}", ctx.id());
    Ok(())
}

fn clear(ctx: &mut PrintContext, _payload: &str) -> Result<(), CommandError> {
    ctx.job_mut().clear();
    Ok(())
}

fn print(ctx: &mut PrintContext, _payload: &str) -> Result<(), CommandError> {
    ctx.submit()
}

fn print_to_file(ctx: &mut PrintContext, payload: &str) -> Result<(), CommandError> {
    let path = required(payload, "file path")?;
    ctx.print_to_file(path)
}

fn print_to_host(ctx: &mut PrintContext, payload: &str) -> Result<(), CommandError> {
    let (host, port) = parse_host_port(required(payload, "host")?)?;
    ctx.print_to_host(host, port)
}

fn required<'a>(payload: &'a str, what: &str) -> Result<&'a str, CommandError> {
    let value = payload.trim();
    if value.is_empty() {
        return Err(CommandError::InvalidArgument(format!("missing {what}")));
    }
    Ok(value)
}

/// Splits `host[:port]`.  IPv6 literals need brackets: `[::1]:9100`.
fn parse_host_port(text: &str) -> Result<(&str, u16), CommandError> {
    let bad_port = |port: &str| CommandError::InvalidArgument(format!("bad port '{port}'"));

    if let Some(rest) = text.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| CommandError::InvalidArgument(format!("bad host '{text}'")))?;
        return match tail.strip_prefix(':') {
            Some(port) => Ok((host, port.parse().map_err(|_| bad_port(port))?)),
            None if tail.is_empty() => Ok((host, DEFAULT_RAW_PORT)),
            None => Err(CommandError::InvalidArgument(format!("bad host '{text}'"))),
        };
    }

    match text.split_once(':') {
        Some((host, port)) => Ok((host, port.parse().map_err(|_| bad_port(port))?)),
        None => Ok((text, DEFAULT_RAW_PORT)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
