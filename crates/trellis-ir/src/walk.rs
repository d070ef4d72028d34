//! Recursive operation traversal utilities.
//!
//! Pre-order walks (`walk_*`) visit an op before its nested regions and can
//! skip children or stop early. Post-order walks (`walk_*_post`) visit every
//! nested op before the op that contains it.

use std::ops::ControlFlow;

use crate::context::IrContext;
use crate::ops::DialectOp;
use crate::refs::{BlockRef, OpRef, RegionRef};

/// Controls whether to descend into children during a walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkAction {
    /// Continue walking and descend into nested regions.
    Advance,
    /// Skip the nested regions of the current operation.
    Skip,
}

/// Walk all operations in a region recursively.
pub fn walk_region<B>(
    ctx: &IrContext,
    region: RegionRef,
    f: &mut dyn FnMut(OpRef) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()> {
    for &block in ctx.region_blocks(region) {
        walk_block(ctx, block, f)?;
    }
    ControlFlow::Continue(())
}

/// Walk all operations in a block recursively.
pub fn walk_block<B>(
    ctx: &IrContext,
    block: BlockRef,
    f: &mut dyn FnMut(OpRef) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()> {
    for op in ctx.block_ops(block) {
        walk_op(ctx, op, f)?;
    }
    ControlFlow::Continue(())
}

/// Walk an operation and its nested regions recursively.
pub fn walk_op<B>(
    ctx: &IrContext,
    op: OpRef,
    f: &mut dyn FnMut(OpRef) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()> {
    match f(op) {
        ControlFlow::Break(b) => return ControlFlow::Break(b),
        ControlFlow::Continue(WalkAction::Skip) => return ControlFlow::Continue(()),
        ControlFlow::Continue(WalkAction::Advance) => {}
    }
    for &region in ctx.op_regions(op) {
        walk_region(ctx, region, f)?;
    }
    ControlFlow::Continue(())
}

/// Walk operations of a specific dialect type in a region.
pub fn walk_typed<T, B>(
    ctx: &IrContext,
    region: RegionRef,
    f: &mut dyn FnMut(T) -> ControlFlow<B, WalkAction>,
) -> ControlFlow<B, ()>
where
    T: DialectOp,
{
    walk_region(ctx, region, &mut |op| {
        if let Ok(typed) = T::from_op(ctx, op) {
            f(typed)
        } else {
            ControlFlow::Continue(WalkAction::Advance)
        }
    })
}

/// Post-order walk of `op`'s subtree, `op` itself visited last.
pub fn walk_op_post(ctx: &IrContext, op: OpRef, f: &mut dyn FnMut(OpRef)) {
    for &region in ctx.op_regions(op) {
        walk_region_post(ctx, region, f);
    }
    f(op);
}

/// Post-order walk of every operation in a region.
pub fn walk_region_post(ctx: &IrContext, region: RegionRef, f: &mut dyn FnMut(OpRef)) {
    for &block in ctx.region_blocks(region) {
        for op in ctx.block_ops(block) {
            walk_op_post(ctx, op, f);
        }
    }
}

/// All operations of `op`'s subtree in post-order, `op` included.
///
/// Useful when the caller needs to mutate the IR while visiting.
pub fn collect_post_order(ctx: &IrContext, op: OpRef) -> Vec<OpRef> {
    let mut ops = Vec::new();
    walk_op_post(ctx, op, &mut |o| ops.push(o));
    ops
}
