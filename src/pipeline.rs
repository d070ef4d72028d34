//! Pass pipeline.
//!
//! A [`PassManager`] owns an ordered list of passes and runs them over a
//! `core.module`:
//!
//! ```text
//! module
//!   │
//!   ├─► module pass ──────────────► module
//!   │
//!   └─► function pass ─► each func.func in the module
//!         │
//!         ▼
//!       [verify_each] ─► verify(module)
//! ```
//!
//! The pipeline stops at the first pass that signals failure, or at the first
//! pass after which the module no longer verifies.

use derive_more::{Display, Error, From};
use tracing::{debug, warn};
use trellis_ir::dialect::builtin::Module;
use trellis_ir::dialect::func::Func;
use trellis_ir::{DialectOp, IrContext, OpRef, VerifyError, verify};

use crate::pass::{Pass, PassContext, PassKind};
use crate::registry::{RegistryError, create_pass};

#[derive(Clone, Debug, PartialEq, Eq, Display, Error)]
#[display("pass `{pass}` failed on {} operation(s)", failed_ops.len())]
pub struct PassError {
    pub pass: &'static str,
    pub failed_ops: Vec<OpRef>,
}

#[derive(Clone, Debug, PartialEq, Eq, Display, Error, From)]
pub enum PipelineError {
    #[display("{_0}")]
    #[from]
    Pass(PassError),
    #[display("verification failed after `{after}`: {source}")]
    Verification {
        after: &'static str,
        source: VerifyError,
    },
    #[display("{_0}")]
    #[from]
    Registry(RegistryError),
}

#[derive(Clone, Copy, Debug)]
pub struct PassManagerConfig {
    /// Verify the module after every pass.
    pub verify_each: bool,
}

impl Default for PassManagerConfig {
    fn default() -> Self {
        Self { verify_each: true }
    }
}

#[derive(Default)]
pub struct PassManager {
    passes: Vec<Box<dyn Pass>>,
    config: PassManagerConfig,
}

impl PassManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PassManagerConfig) -> Self {
        Self {
            passes: Vec::new(),
            config,
        }
    }

    pub fn add_pass(&mut self, pass: impl Pass + 'static) -> &mut Self {
        self.passes.push(Box::new(pass));
        self
    }

    pub fn add_boxed_pass(&mut self, pass: Box<dyn Pass>) -> &mut Self {
        self.passes.push(pass);
        self
    }

    /// Build a pipeline from registered pass names, in order.
    pub fn from_names<'a>(
        names: impl IntoIterator<Item = &'a str>,
        config: PassManagerConfig,
    ) -> Result<Self, RegistryError> {
        let passes = names
            .into_iter()
            .map(create_pass)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { passes, config })
    }

    /// Names of the scheduled passes, in order.
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    pub fn run(&mut self, ctx: &mut IrContext, module: Module) -> Result<(), PipelineError> {
        for pass in &mut self.passes {
            let name = pass.name();
            let targets: Vec<OpRef> = match pass.kind() {
                PassKind::Module => vec![module.op_ref()],
                PassKind::Function => {
                    let ir: &IrContext = ctx;
                    module.ops(ir).filter(|&op| Func::matches(ir, op)).collect()
                }
            };
            debug!(pass = name, targets = targets.len(), "running pass");

            let mut failed_ops = Vec::new();
            for target in targets {
                let mut pass_ctx = PassContext::new();
                pass.run(ctx, target, &mut pass_ctx);
                if pass_ctx.failed() {
                    failed_ops.push(target);
                }
            }
            if !failed_ops.is_empty() {
                warn!(pass = name, failed = failed_ops.len(), "pass failed");
                return Err(PassError {
                    pass: name,
                    failed_ops,
                }
                .into());
            }

            if self.config.verify_each {
                verify(ctx, module.op_ref())
                    .map_err(|source| PipelineError::Verification { after: name, source })?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for PassManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassManager")
            .field("passes", &self.pass_names())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::{DcePass, VerifierPass};
    use crate::test_utils::{func_with_body, module_with, setup};
    use trellis_affine::dialect::std;
    use trellis_ir::dialect::func;

    struct FailOnFunc;

    impl Pass for FailOnFunc {
        fn name(&self) -> &'static str {
            "fail"
        }

        fn description(&self) -> &'static str {
            "fails on every function"
        }

        fn run(&mut self, _: &mut IrContext, _: OpRef, pass_ctx: &mut PassContext) {
            pass_ctx.signal_pass_failure();
        }
    }

    fn two_funcs(ctx: &mut IrContext) -> (Module, Vec<OpRef>) {
        let loc = crate::test_utils::location(ctx);
        let mut funcs = Vec::new();
        for _ in 0..2 {
            let f = func_with_body(ctx, loc, &[], &[]);
            let entry = f.entry_block(ctx);
            let dead = std::constant_index(ctx, loc, 3);
            ctx.push_op(entry, dead.op_ref());
            let ret = func::r#return(ctx, loc, []);
            ctx.push_op(entry, ret.op_ref());
            funcs.push(f.op_ref());
        }
        (module_with(ctx, loc, funcs.iter().copied()), funcs)
    }

    #[test]
    fn function_pass_runs_on_each_func() {
        let (mut ctx, _) = setup();
        let (module, funcs) = two_funcs(&mut ctx);
        let mut pm = PassManager::new();
        pm.add_pass(DcePass::default()).add_pass(VerifierPass);
        assert_eq!(pm.run(&mut ctx, module), Ok(()));
        for &f in &funcs {
            let entry = Func::wrap_unchecked(f).entry_block(&ctx);
            assert_eq!(ctx.num_ops(entry), 1);
        }
    }

    #[test]
    fn failures_are_aggregated_per_pass() {
        let (mut ctx, _) = setup();
        let (module, funcs) = two_funcs(&mut ctx);
        let mut pm = PassManager::new();
        pm.add_pass(FailOnFunc).add_pass(DcePass::default());
        let err = pm.run(&mut ctx, module).unwrap_err();
        assert_eq!(
            err,
            PipelineError::Pass(PassError {
                pass: "fail",
                failed_ops: funcs.clone(),
            })
        );
        assert_eq!(err.to_string(), "pass `fail` failed on 2 operation(s)");
        // The pipeline stopped before dce.
        let entry = Func::wrap_unchecked(funcs[0]).entry_block(&ctx);
        assert_eq!(ctx.num_ops(entry), 2);
    }
}
