use tracing::warn;
use trellis_ir::{IrContext, OpRef, verify};

use crate::pass::{Pass, PassContext, PassKind};

/// Runs the structural verifier on the whole module.
#[derive(Debug, Default)]
pub struct VerifierPass;

impl VerifierPass {
    pub const NAME: &'static str = "verify";
    pub const DESCRIPTION: &'static str = "Check operation invariants, dominance and use chains";
}

impl Pass for VerifierPass {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    fn kind(&self) -> PassKind {
        PassKind::Module
    }

    fn run(&mut self, ctx: &mut IrContext, target: OpRef, pass_ctx: &mut PassContext) {
        if let Err(err) = verify(ctx, target) {
            warn!(%err, "verification failed");
            pass_ctx.signal_pass_failure();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{func_with_body, module_with, setup};
    use trellis_affine::dialect::std;
    use trellis_ir::DialectOp;
    use trellis_ir::dialect::func;

    #[test]
    fn flags_use_before_def() {
        let (mut ctx, loc) = setup();
        let f = func_with_body(&mut ctx, loc, &[], &[]);
        let entry = f.entry_block(&ctx);
        let c = std::constant_int(&mut ctx, loc, 1, 32);
        let cv = c.result(&ctx);
        let add = std::addi(&mut ctx, loc, cv, cv);
        ctx.push_op(entry, add.op_ref());
        ctx.push_op(entry, c.op_ref());
        let ret = func::r#return(&mut ctx, loc, []);
        ctx.push_op(entry, ret.op_ref());
        let module = module_with(&mut ctx, loc, [f.op_ref()]);

        let mut pass_ctx = PassContext::new();
        VerifierPass.run(&mut ctx, module.op_ref(), &mut pass_ctx);
        assert!(pass_ctx.failed());
        assert!(ctx.diagnostics.has_errors());
    }

    #[test]
    fn accepts_well_formed_module() {
        let (mut ctx, loc) = setup();
        let f = func_with_body(&mut ctx, loc, &[], &[]);
        let entry = f.entry_block(&ctx);
        let ret = func::r#return(&mut ctx, loc, []);
        ctx.push_op(entry, ret.op_ref());
        let module = module_with(&mut ctx, loc, [f.op_ref()]);

        let mut pass_ctx = PassContext::new();
        VerifierPass.run(&mut ctx, module.op_ref(), &mut pass_ctx);
        assert!(!pass_ctx.failed());
        assert!(ctx.diagnostics.take().is_empty());
    }
}
