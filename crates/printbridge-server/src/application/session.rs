//! One connected page.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::dispatcher::{Dispatcher, Route};
use super::print_context::PrintContext;
use crate::domain::{BridgeConfig, Command};

/// What `on_message` did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The frame had no space, so it was never looked up.
    NotDispatched,
    /// The verb is not in the table.
    Ignored,
    /// A recognized verb with no effect.
    Accepted,
    /// A handler ran.  It may have failed; failures are logged only.
    Handled,
}

/// Server-side state for one WebSocket connection.
///
/// Lifecycle, driven by the WebSocket task:
///
/// ```text
/// on_connect ──▶ on_message* ──▶ on_close
///                    │
///                    └─ on_error (logged, session stays open)
/// ```
///
/// The [`PrintContext`] does not exist until the first recognized verb
/// arrives and then lives until `on_close`.  Pages get no reply to any
/// command: results only show up in the log.
pub struct Session {
    peer: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    defaults: Arc<BridgeConfig>,
    context: Option<PrintContext>,
}

impl Session {
    pub fn new(peer: SocketAddr, dispatcher: Arc<Dispatcher>, defaults: Arc<BridgeConfig>) -> Self {
        Self {
            peer,
            dispatcher,
            defaults,
            context: None,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// The print context, once a recognized verb has created it.
    pub fn context(&self) -> Option<&PrintContext> {
        self.context.as_ref()
    }

    pub fn on_connect(&self) {
        info!("session {}: connected", self.peer);
    }

    /// Parses and routes one text frame.
    pub fn on_message(&mut self, text: &str) -> Dispatch {
        let Some(command) = Command::parse(text) else {
            return Dispatch::NotDispatched;
        };
        let Some(route) = self.dispatcher.route(command.verb) else {
            debug!("session {}: ignoring unknown verb '{}'", self.peer, command.verb);
            return Dispatch::Ignored;
        };

        let peer = self.peer;
        let defaults = &self.defaults;
        let context = self.context.get_or_insert_with(|| {
            let context = PrintContext::new(defaults);
            info!("session {peer}: created print context {}", context.id());
            context
        });

        match route {
            Route::Accepted => {
                debug!("session {peer}: '{}' accepted, nothing to do", command.verb);
                Dispatch::Accepted
            }
            Route::Handler(handler) => {
                debug!("session {peer}: {} ({} payload bytes)", command.verb, command.payload.len());
                if let Err(e) = handler(context, command.payload) {
                    warn!("session {peer}: {} failed: {e}", command.verb);
                }
                Dispatch::Handled
            }
        }
    }

    pub fn on_error(&self, error: &dyn std::error::Error) {
        warn!("session {}: connection error: {error}", self.peer);
    }

    /// Releases the backend and drops the print context.
    pub fn on_close(&mut self) {
        if let Some(mut context) = self.context.take() {
            context.release();
            debug!("session {}: dropped print context {}", self.peer, context.id());
        }
        info!("session {}: closed", self.peer);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
