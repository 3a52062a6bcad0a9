//! Uncaught-error interception.
//!
//! Handlers run as an explicit ordered [`HandlerChain`]. [`install_panic_hook`]
//! places a chain in front of whatever panic hook is currently registered:
//! the chain runs first, then the previous hook is always called with the
//! original panic info, whether or not any handler failed.

use std::fmt;
use std::panic::{self, PanicHookInfo};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::recovery::RecoveryError;

/// An uncaught error as seen by handlers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEvent {
    /// Panic payload or error display text
    pub message: String,
    /// `file:line:column` for panics
    pub location: Option<String>,
    /// Whether the process is expected to go down after handlers run
    pub is_fatal: bool,
    /// Name of the thread that raised the error, if it has one
    pub thread: Option<String>,
}

impl ErrorEvent {
    pub fn new(message: impl Into<String>, is_fatal: bool) -> Self {
        Self {
            message: message.into(),
            location: None,
            is_fatal,
            thread: std::thread::current().name().map(str::to_string),
        }
    }

    /// Build an event from the info handed to a panic hook
    pub fn from_panic(info: &PanicHookInfo<'_>) -> Self {
        let payload = info.payload();
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Box<dyn Any>".to_string()
        };

        let mut event = Self::new(message, true);
        event.location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()));
        event
    }

    /// Build an event for an error the application reports itself
    pub fn from_error(error: &(dyn std::error::Error + 'static), is_fatal: bool) -> Self {
        let mut message = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::new(message, is_fatal)
    }
}

impl fmt::Display for ErrorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} at {}", self.message, location),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error(transparent)]
    Recovery(#[from] RecoveryError),
    #[error("{0}")]
    Other(String),
}

/// A single link in the chain
pub type ErrorHandler = Arc<dyn Fn(&ErrorEvent) -> Result<(), HandlerError> + Send + Sync>;

/// Ordered list of error handlers, each called with the same event
#[derive(Clone, Default)]
pub struct HandlerChain {
    handlers: Vec<(String, ErrorHandler)>,
}

impl HandlerChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler; it runs after every handler already in the chain
    pub fn push<F>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&ErrorEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.handlers.push((name.into(), Arc::new(handler)));
        self
    }

    /// Append an already shared handler
    pub fn push_shared(&mut self, name: impl Into<String>, handler: ErrorHandler) -> &mut Self {
        self.handlers.push((name.into(), handler));
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handler names in invocation order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|(name, _)| name.as_str())
    }

    /// Run every handler in order. A failing handler is logged and the rest
    /// still run; returns how many failed.
    pub fn dispatch(&self, event: &ErrorEvent) -> usize {
        let mut failures = 0;
        for (name, handler) in &self.handlers {
            if let Err(e) = handler(event) {
                failures += 1;
                tracing::warn!(handler = %name, error = %e, "Error handler failed");
            }
        }
        failures
    }

    /// Report an application error through the chain without panicking
    pub fn report_error(&self, error: &(dyn std::error::Error + 'static), is_fatal: bool) -> usize {
        let event = ErrorEvent::from_error(error, is_fatal);
        tracing::debug!(error = %event, is_fatal, "Reporting error to handler chain");
        self.dispatch(&event)
    }
}

impl fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerChain")
            .field("handlers", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

/// Install a panic hook that runs `chain` and then the previously installed hook.
///
/// Call once, early in `main()`. Handlers must not panic: a panic inside a
/// panic hook aborts the process.
pub fn install_panic_hook(chain: HandlerChain) {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let event = ErrorEvent::from_panic(panic_info);
        let failures = chain.dispatch(&event);
        if failures > 0 {
            tracing::debug!(failures, "Continuing to previous panic hook after handler failures");
        }

        // Always hand the panic to whoever was registered before us
        original_hook(panic_info);
    }));
}
