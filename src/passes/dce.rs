//! Dead code elimination.
//!
//! Removes operations that have no side effect and whose results are all
//! unused. Removal can expose more dead operations, so the sweep repeats
//! until nothing changes or the iteration bound is hit.

use tracing::{debug, trace};
use trellis_ir::{IrContext, OpRef, RegionRef, TerminatorStatus};

use crate::pass::{Pass, PassContext};

#[derive(Debug, Clone)]
pub struct DceConfig {
    /// Upper bound on sweeps before giving up on a fixpoint.
    pub max_iterations: usize,
    /// Also sweep regions nested inside surviving operations.
    pub recursive: bool,
}

impl Default for DceConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            recursive: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DceResult {
    pub removed_count: usize,
    pub iterations: usize,
    pub reached_fixpoint: bool,
}

pub fn eliminate_dead_code(ctx: &mut IrContext, root: OpRef) -> DceResult {
    eliminate_dead_code_with_config(ctx, root, &DceConfig::default())
}

pub fn eliminate_dead_code_with_config(
    ctx: &mut IrContext,
    root: OpRef,
    config: &DceConfig,
) -> DceResult {
    let mut result = DceResult::default();
    while result.iterations < config.max_iterations {
        result.iterations += 1;
        let mut removed = 0;
        for region in ctx.op_regions(root).to_vec() {
            removed += sweep_region(ctx, region, config.recursive);
        }
        result.removed_count += removed;
        if removed == 0 {
            result.reached_fixpoint = true;
            break;
        }
    }
    debug!(
        removed = result.removed_count,
        iterations = result.iterations,
        fixpoint = result.reached_fixpoint,
        "dce finished"
    );
    result
}

/// One backwards sweep over `region`. Users are visited before their
/// producers so a whole dead chain goes in a single sweep.
fn sweep_region(ctx: &mut IrContext, region: RegionRef, recursive: bool) -> usize {
    let mut removed = 0;
    for block in ctx.region_blocks(region).to_vec().into_iter().rev() {
        let ops: Vec<OpRef> = ctx.block_ops(block).rev().collect();
        for op in ops {
            if is_dead(ctx, op) {
                trace!(op = %ctx.op_name(op), "erasing dead op");
                ctx.erase_op(op);
                removed += 1;
            } else if recursive {
                for nested in ctx.op_regions(op).to_vec() {
                    removed += sweep_region(ctx, nested, recursive);
                }
            }
        }
    }
    removed
}

fn is_dead(ctx: &IrContext, op: OpRef) -> bool {
    ctx.has_no_side_effect(op)
        && ctx.terminator_status(op) != TerminatorStatus::Terminator
        && ctx.op_results(op).iter().all(|&v| !ctx.has_uses(v))
}

/// Pass wrapper around [`eliminate_dead_code_with_config`].
#[derive(Debug, Default)]
pub struct DcePass {
    pub config: DceConfig,
    pub last_result: Option<DceResult>,
}

impl DcePass {
    pub const NAME: &'static str = "dce";
    pub const DESCRIPTION: &'static str = "Remove side-effect free operations with unused results";
}

impl Pass for DcePass {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    fn run(&mut self, ctx: &mut IrContext, target: OpRef, _: &mut PassContext) {
        self.last_result = Some(eliminate_dead_code_with_config(ctx, target, &self.config));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{func_with_body, setup};
    use trellis_affine::dialect::std;
    use trellis_ir::DialectOp;
    use trellis_ir::dialect::func;

    #[test]
    fn removes_dead_chain_in_one_sweep() {
        let (mut ctx, loc) = setup();
        let i32_ty = ctx.types.integer(32);
        let f = func_with_body(&mut ctx, loc, &[], &[i32_ty]);
        let entry = f.entry_block(&ctx);

        let a = std::constant_int(&mut ctx, loc, 1, 32);
        let b = std::constant_int(&mut ctx, loc, 2, 32);
        let (av, bv) = (a.result(&ctx), b.result(&ctx));
        let dead = std::addi(&mut ctx, loc, av, bv);
        for op in [a.op_ref(), b.op_ref(), dead.op_ref()] {
            ctx.push_op(entry, op);
        }
        let ret = func::r#return(&mut ctx, loc, [av]);
        ctx.push_op(entry, ret.op_ref());

        let result = eliminate_dead_code(&mut ctx, f.op_ref());
        assert_eq!(result.removed_count, 2);
        assert!(result.reached_fixpoint);
        assert_eq!(result.iterations, 2);
        assert!(ctx.is_erased(dead.op_ref()));
        assert!(ctx.is_erased(b.op_ref()));
        assert!(!ctx.is_erased(a.op_ref()));
        assert_eq!(ctx.num_ops(entry), 2);
    }

    #[test]
    fn keeps_side_effects_and_terminators() {
        let (mut ctx, loc) = setup();
        let index = ctx.types.index();
        let f32_ty = ctx.types.float(32);
        let memref = ctx.types.memref(&[8], f32_ty, vec![]);
        let f = func_with_body(&mut ctx, loc, &[memref, index], &[]);
        let entry = f.entry_block(&ctx);
        let (m, i) = (ctx.block_arg(entry, 0), ctx.block_arg(entry, 1));

        let load = std::load(&mut ctx, loc, m, &[i]);
        let loaded = load.result(&ctx);
        let store = std::store(&mut ctx, loc, loaded, m, &[i]);
        ctx.push_op(entry, load.op_ref());
        ctx.push_op(entry, store.op_ref());
        let ret = func::r#return(&mut ctx, loc, []);
        ctx.push_op(entry, ret.op_ref());

        let result = eliminate_dead_code(&mut ctx, f.op_ref());
        assert_eq!(result.removed_count, 0);
        assert_eq!(result.iterations, 1);
        assert_eq!(ctx.num_ops(entry), 3);
    }

    #[test]
    fn nested_regions_follow_config() {
        let (mut ctx, loc) = setup();
        let f = func_with_body(&mut ctx, loc, &[], &[]);
        let entry = f.entry_block(&ctx);
        let l = trellis_affine::dialect::affine::for_constant(&mut ctx, loc, 0, 4, 1);
        let unused = std::constant_index(&mut ctx, loc, 7);
        l.push(&mut ctx, unused.op_ref());
        ctx.push_op(entry, l.op_ref());
        let ret = func::r#return(&mut ctx, loc, []);
        ctx.push_op(entry, ret.op_ref());

        let shallow = DceConfig {
            recursive: false,
            ..DceConfig::default()
        };
        let result = eliminate_dead_code_with_config(&mut ctx, f.op_ref(), &shallow);
        assert_eq!(result.removed_count, 0);

        let result = eliminate_dead_code(&mut ctx, f.op_ref());
        assert_eq!(result.removed_count, 1);
        assert!(ctx.is_erased(unused.op_ref()));
        assert!(!ctx.is_erased(l.op_ref()));
    }
}
