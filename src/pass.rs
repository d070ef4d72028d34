//! The pass interface.
//!
//! A pass is a named, stateful transformation or analysis over IR. Function
//! passes run once per `func.func` in a module; module passes run once on
//! the module op itself. Failure is reported through
//! [`PassContext::signal_pass_failure`] rather than a return value, so a pass
//! can keep going and report several problems before the pipeline stops.

use trellis_ir::{IrContext, OpRef};

/// Granularity at which a pass is scheduled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassKind {
    /// Run once per `func.func` of the module.
    Function,
    /// Run once on the module op.
    Module,
}

/// Per-invocation state handed to [`Pass::run`].
#[derive(Debug, Default)]
pub struct PassContext {
    failed: bool,
}

impl PassContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the current invocation as failed. The pipeline stops after the
    /// pass finished running on every target.
    pub fn signal_pass_failure(&mut self) {
        self.failed = true;
    }

    pub fn failed(&self) -> bool {
        self.failed
    }
}

pub trait Pass {
    /// Stable identifier used by the pass registry.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn kind(&self) -> PassKind {
        PassKind::Function
    }

    /// Run on `target`, a `func.func` or the module depending on
    /// [`kind`](Pass::kind).
    fn run(&mut self, ctx: &mut IrContext, target: OpRef, pass_ctx: &mut PassContext);
}
