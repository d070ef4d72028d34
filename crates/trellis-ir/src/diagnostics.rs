//! Located diagnostics attached to the IR.
//!
//! Diagnostics are collected by the [`DiagnosticEngine`] owned by
//! [`IrContext`]. Every diagnostic is also logged through `tracing`, and an
//! optional handler can observe them as they are emitted.

use std::cell::RefCell;
use std::fmt;

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::context::IrContext;
use crate::location::Location;
use crate::refs::OpRef;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Severity {
    Error,
    Warning,
    Remark,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Remark => "remark",
        })
    }
}

/// A message anchored at a location, optionally naming the operation it is
/// about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub location: Location,
    pub op: Option<OpRef>,
    pub message: String,
}

type Handler = Box<dyn Fn(&Diagnostic)>;

/// Collects diagnostics emitted while verifying or analyzing IR.
#[derive(Default)]
pub struct DiagnosticEngine {
    emitted: RefCell<Vec<Diagnostic>>,
    handler: Option<Handler>,
}

impl DiagnosticEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a handler invoked for every subsequent diagnostic.
    pub fn set_handler(&mut self, handler: impl Fn(&Diagnostic) + 'static) {
        self.handler = Some(Box::new(handler));
    }

    pub fn emit(&self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => error!(op = ?diagnostic.op, "{}", diagnostic.message),
            Severity::Warning => warn!(op = ?diagnostic.op, "{}", diagnostic.message),
            Severity::Remark => debug!(op = ?diagnostic.op, "{}", diagnostic.message),
        }
        if let Some(handler) = &self.handler {
            handler(&diagnostic);
        }
        self.emitted.borrow_mut().push(diagnostic);
    }

    /// Snapshot of everything emitted so far.
    pub fn emitted(&self) -> Vec<Diagnostic> {
        self.emitted.borrow().clone()
    }

    pub fn has_errors(&self) -> bool {
        self.emitted
            .borrow()
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Remove and return all collected diagnostics.
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.emitted.borrow_mut())
    }
}

impl IrContext {
    fn emit_on_op(&self, op: OpRef, severity: Severity, message: impl Into<String>) {
        self.diagnostics.emit(Diagnostic {
            severity,
            location: self.op(op).location,
            op: Some(op),
            message: message.into(),
        });
    }

    pub fn emit_error(&self, op: OpRef, message: impl Into<String>) {
        self.emit_on_op(op, Severity::Error, message);
    }

    pub fn emit_warning(&self, op: OpRef, message: impl Into<String>) {
        self.emit_on_op(op, Severity::Warning, message);
    }

    pub fn emit_remark(&self, op: OpRef, message: impl Into<String>) {
        self.emit_on_op(op, Severity::Remark, message);
    }
}
