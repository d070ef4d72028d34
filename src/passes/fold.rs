//! Fold-driven simplification.
//!
//! Runs every operation's registered fold hook in post-order, so operands are
//! folded before their users. Constant results become `std.constant` ops
//! inserted before the folded operation. Side-effect free operations whose
//! results are left without uses are erased.

use smallvec::SmallVec;
use tracing::{debug, trace};
use trellis_affine::dialect::std::materialize_constant;
use trellis_ir::walk::collect_post_order;
use trellis_ir::{DialectOp, FoldOutcome, FoldResult, IrContext, OpRef, ValueRef, fold_op};

use crate::pass::{Pass, PassContext};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoldStats {
    /// Operations whose results were all replaced.
    pub folded: usize,
    /// Operations updated in place by their hook, or that keep some of
    /// their own results as replacements.
    pub in_place: usize,
    pub erased: usize,
    pub iterations: usize,
}

/// Fold everything nested in `root` until no hook makes progress, or at most
/// `max_iterations` sweeps.
pub fn fold_all(ctx: &mut IrContext, root: OpRef, max_iterations: usize) -> FoldStats {
    let mut stats = FoldStats::default();
    while stats.iterations < max_iterations {
        stats.iterations += 1;
        let mut changed = false;
        for op in collect_post_order(ctx, root) {
            if op == root || ctx.is_erased(op) {
                continue;
            }
            match fold_op(ctx, op) {
                FoldOutcome::NotFolded => {}
                FoldOutcome::InPlace => stats.in_place += 1,
                FoldOutcome::Replaced(results) => {
                    let Some(redirected) = replace_results(ctx, op, results) else {
                        continue;
                    };
                    changed |= redirected > 0;
                    if ctx.op_results(op).iter().any(|&v| ctx.has_uses(v)) {
                        stats.in_place += 1;
                        continue;
                    }
                    stats.folded += 1;
                    if ctx.has_no_side_effect(op) {
                        ctx.erase_op(op);
                        stats.erased += 1;
                        changed = true;
                    }
                }
            }
        }
        // In-place updates alone do not count as progress: a hook may keep
        // reporting them for an already canonical op.
        if !changed {
            break;
        }
    }
    debug!(
        folded = stats.folded,
        erased = stats.erased,
        iterations = stats.iterations,
        "fold finished"
    );
    stats
}

/// Redirect the uses of each result of `op` to its replacement and return
/// how many results were redirected.
///
/// A slot is skipped when its result has no uses or when the replacement is
/// one of `op`'s own results. Returns `None`, leaving the IR untouched, when
/// some constant cannot be materialized.
fn replace_results(
    ctx: &mut IrContext,
    op: OpRef,
    results: SmallVec<[FoldResult; 2]>,
) -> Option<usize> {
    let location = ctx.op(op).location;
    let block = ctx.op_block(op)?;
    let old: Vec<ValueRef> = ctx.op_results(op).to_vec();
    if old.len() != results.len() {
        return None;
    }

    let mut replacements = Vec::with_capacity(results.len());
    let mut materialized = Vec::new();
    for (&old_value, result) in old.iter().zip(results) {
        if !ctx.has_uses(old_value) {
            continue;
        }
        match result {
            FoldResult::Value(v) if old.contains(&v) => {}
            FoldResult::Value(v) => replacements.push((old_value, v)),
            FoldResult::Attribute(attr) => {
                let ty = ctx.value_ty(old_value);
                let Some(constant) = materialize_constant(ctx, location, attr, ty) else {
                    for c in materialized {
                        ctx.erase_op(c);
                    }
                    return None;
                };
                materialized.push(constant.op_ref());
                replacements.push((old_value, constant.result(ctx)));
            }
        }
    }

    for c in materialized {
        ctx.insert_op_before(block, op, c);
    }
    for &(old_value, new_value) in &replacements {
        ctx.replace_all_uses_with(old_value, new_value);
    }
    trace!(op = %ctx.op_name(op), redirected = replacements.len(), "folded");
    Some(replacements.len())
}

#[derive(Debug)]
pub struct FoldPass {
    pub max_iterations: usize,
    pub last_stats: Option<FoldStats>,
}

impl FoldPass {
    pub const NAME: &'static str = "fold";
    pub const DESCRIPTION: &'static str = "Fold operations and materialize constant results";
}

impl Default for FoldPass {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            last_stats: None,
        }
    }
}

impl Pass for FoldPass {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    fn run(&mut self, ctx: &mut IrContext, target: OpRef, _: &mut PassContext) {
        self.last_stats = Some(fold_all(ctx, target, self.max_iterations));
    }
}
