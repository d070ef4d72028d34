//! Loop analysis report.
//!
//! Summarizes every `affine.for` nested in the target: its trip count map,
//! the constant trip count when known, the largest known divisor of the trip
//! count and whether the body can be vectorized. Each summary is also emitted
//! as a remark on the loop.

use std::convert::Infallible;
use std::ops::ControlFlow;

use tracing::debug;
use trellis_affine::{
    AffineFor, Contiguity, TripCountMap, constant_trip_count, is_vectorizable_loop_body,
    is_vectorizable_loop_body_along, largest_trip_count_divisor, trip_count_map,
};
use trellis_ir::walk::walk_typed;
use trellis_ir::{DialectOp, IrContext, OpRef, WalkAction};

use crate::pass::{Pass, PassContext};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopSummary {
    pub for_op: AffineFor,
    pub trip_count: Option<TripCountMap>,
    pub constant_trip_count: Option<u64>,
    pub trip_count_divisor: u64,
    pub vectorizable: Vectorizable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Vectorizable {
    No,
    /// The body passes the structural checks; contiguity was not asked for.
    Yes,
    /// The body passes and every access is contiguous along the payload.
    Along(Contiguity),
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LoopInfoConfig {
    /// Also require contiguous accesses when judging vectorizability.
    pub check_contiguity: bool,
}

/// Summaries of every `affine.for` under `root`, outer loops first.
pub fn analyze_loops(ctx: &IrContext, root: OpRef, config: LoopInfoConfig) -> Vec<LoopSummary> {
    let mut loops = Vec::new();
    for &region in ctx.op_regions(root) {
        let _ = walk_typed::<AffineFor, Infallible>(ctx, region, &mut |for_op| {
            loops.push(for_op);
            ControlFlow::Continue(WalkAction::Advance)
        });
    }
    loops
        .into_iter()
        .map(|for_op| summarize(ctx, for_op, config))
        .collect()
}

fn summarize(ctx: &IrContext, for_op: AffineFor, config: LoopInfoConfig) -> LoopSummary {
    let vectorizable = if config.check_contiguity {
        is_vectorizable_loop_body_along(ctx, for_op).map_or(Vectorizable::No, Vectorizable::Along)
    } else if is_vectorizable_loop_body(ctx, for_op) {
        Vectorizable::Yes
    } else {
        Vectorizable::No
    };
    LoopSummary {
        for_op,
        trip_count: trip_count_map(ctx, for_op),
        constant_trip_count: constant_trip_count(ctx, for_op),
        trip_count_divisor: largest_trip_count_divisor(ctx, for_op),
        vectorizable,
    }
}

impl LoopSummary {
    /// One-line description used for the remark.
    pub fn describe(&self) -> String {
        let trip_count = match (&self.constant_trip_count, &self.trip_count) {
            (Some(n), _) => n.to_string(),
            (None, Some(tc)) => tc.map.to_string(),
            (None, None) => "unknown".to_owned(),
        };
        let vectorizable = match self.vectorizable {
            Vectorizable::No => "no".to_owned(),
            Vectorizable::Yes => "yes".to_owned(),
            Vectorizable::Along(Contiguity::Invariant) => "invariant".to_owned(),
            Vectorizable::Along(Contiguity::Along(d)) => format!("along dim {d}"),
        };
        format!(
            "trip count: {trip_count}, divisor: {}, vectorizable: {vectorizable}",
            self.trip_count_divisor
        )
    }
}

#[derive(Debug, Default)]
pub struct LoopInfoPass {
    pub config: LoopInfoConfig,
    pub summaries: Vec<LoopSummary>,
}

impl LoopInfoPass {
    pub const NAME: &'static str = "affine-loop-info";
    pub const DESCRIPTION: &'static str = "Report trip counts and vectorizability of affine loops";
}

impl Pass for LoopInfoPass {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        Self::DESCRIPTION
    }

    fn run(&mut self, ctx: &mut IrContext, target: OpRef, _: &mut PassContext) {
        let summaries = analyze_loops(ctx, target, self.config);
        for summary in &summaries {
            ctx.emit_remark(summary.for_op.op_ref(), summary.describe());
        }
        debug!(loops = summaries.len(), "loop info collected");
        self.summaries.extend(summaries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{func_with_body, setup};
    use trellis_affine::dialect::{affine, std};
    use trellis_ir::dialect::func;

    #[test]
    fn nested_loops_are_reported_outer_first() {
        let (mut ctx, loc) = setup();
        let f32_ty = ctx.types.float(32);
        let memref = ctx.types.memref(&[16, 32], f32_ty, vec![]);
        let f = func_with_body(&mut ctx, loc, &[memref], &[]);
        let entry = f.entry_block(&ctx);
        let m = ctx.block_arg(entry, 0);

        let outer = affine::for_constant(&mut ctx, loc, 0, 16, 1);
        let inner = affine::for_constant(&mut ctx, loc, 0, 30, 4);
        let (i, j) = (outer.induction_var(&ctx).unwrap(), inner.induction_var(&ctx).unwrap());
        let load = std::load(&mut ctx, loc, m, &[i, j]);
        inner.push(&mut ctx, load.op_ref());
        outer.push(&mut ctx, inner.op_ref());
        ctx.push_op(entry, outer.op_ref());
        let ret = func::r#return(&mut ctx, loc, []);
        ctx.push_op(entry, ret.op_ref());

        let summaries = analyze_loops(&ctx, f.op_ref(), LoopInfoConfig { check_contiguity: true });
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].for_op, outer);
        assert_eq!(summaries[0].constant_trip_count, Some(16));
        assert_eq!(summaries[0].trip_count_divisor, 16);
        assert_eq!(
            summaries[0].vectorizable,
            Vectorizable::Along(Contiguity::Along(1))
        );
        assert_eq!(summaries[1].for_op, inner);
        assert_eq!(summaries[1].constant_trip_count, Some(8));
        assert_eq!(
            summaries[1].vectorizable,
            Vectorizable::Along(Contiguity::Along(0))
        );
        assert_eq!(
            summaries[1].describe(),
            "trip count: 8, divisor: 8, vectorizable: along dim 0"
        );
    }

    #[test]
    fn pass_emits_one_remark_per_loop() {
        let (mut ctx, loc) = setup();
        let f = func_with_body(&mut ctx, loc, &[], &[]);
        let entry = f.entry_block(&ctx);
        let l = affine::for_constant(&mut ctx, loc, 5, 3, 1);
        ctx.push_op(entry, l.op_ref());
        let ret = func::r#return(&mut ctx, loc, []);
        ctx.push_op(entry, ret.op_ref());

        let mut pass = LoopInfoPass::default();
        pass.run(&mut ctx, f.op_ref(), &mut PassContext::new());
        let diags = ctx.diagnostics.take();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].op, Some(l.op_ref()));
        insta::assert_snapshot!(diags[0].message, @"trip count: 0, divisor: 18446744073709551615, vectorizable: yes");
    }
}
