//! Analyses over `affine.for` loops.
//!
//! Trip counts are symbolic maps over the loop's bound operands, composed
//! through `affine.apply` chains. Memory access queries (invariance,
//! contiguity) and the vectorizability check look at load/store style ops via
//! their registered [`MemoryAccess`](trellis_ir::MemoryAccess) descriptor.

use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;

use tracing::{debug, trace};
use trellis_ir::affine::{ceil_div, gcd};
use trellis_ir::walk::{WalkAction, walk_region};
use trellis_ir::{AffineExpr, AffineMap, DialectOp, IrContext, OpRef, ValueRef};

use crate::affine_analysis::{
    AffineValueMap, canonicalize_map_and_operands, fully_compose_affine_map_and_operands,
    reachable_affine_apply_ops,
};
use crate::dialect::affine::{self, AffineFor, AffineIf, for_of_induction_var};

/// Symbolic trip count of a loop: one result per upper bound, the actual
/// count being the minimum over results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TripCountMap {
    pub map: AffineMap,
    pub operands: Vec<ValueRef>,
}

/// Trip count map of `for_op` without touching the IR.
///
/// Returns `None` when the lower bound map has more than one result or the
/// loop attributes are malformed.
pub fn trip_count_map(ctx: &IrContext, for_op: AffineFor) -> Option<TripCountMap> {
    let step = positive_step(ctx, for_op)?;
    if let (Some(lb), Some(ub)) = (
        for_op.constant_lower_bound(ctx),
        for_op.constant_upper_bound(ctx),
    ) {
        let count = ceil_div(ub.saturating_sub(lb).max(0), step);
        trace!(count, "constant trip count");
        return Some(TripCountMap {
            map: AffineMap::constant(count),
            operands: Vec::new(),
        });
    }

    let lb_map = for_op.lower_bound_map(ctx).ok()?;
    let ub_map = for_op.upper_bound_map(ctx).ok()?;
    if lb_map.num_results() != 1 {
        debug!("trip count unavailable: multi-result lower bound");
        return None;
    }
    let lb_ops = for_op.lower_bound_operands(ctx);
    let ub_ops = for_op.upper_bound_operands(ctx);
    if lb_ops.len() != lb_map.num_inputs() as usize || ub_ops.len() != ub_map.num_inputs() as usize
    {
        return None;
    }
    let (lnd, lns) = (lb_map.num_dims(), lb_map.num_symbols());
    let (und, uns) = (ub_map.num_dims(), ub_map.num_symbols());

    // Inputs: lb dims, ub dims, lb syms, ub syms.
    let lb_dims: Vec<AffineExpr> = (0..lnd).map(AffineExpr::dim).collect();
    let lb_syms: Vec<AffineExpr> = (0..lns).map(AffineExpr::symbol).collect();
    let ub_dims: Vec<AffineExpr> = (0..und).map(|d| AffineExpr::dim(lnd + d)).collect();
    let ub_syms: Vec<AffineExpr> = (0..uns).map(|s| AffineExpr::symbol(lns + s)).collect();
    let lb = lb_map.result(0).replace_dims_and_symbols(&lb_dims, &lb_syms);
    let results = ub_map.results().iter().map(|ub| {
        (ub.replace_dims_and_symbols(&ub_dims, &ub_syms) - lb.clone()).ceil_div(step)
    });
    let mut map = AffineMap::new(lnd + und, lns + uns, results.collect::<Vec<_>>());

    let (lb_dim_ops, lb_sym_ops) = lb_ops.split_at(lnd as usize);
    let (ub_dim_ops, ub_sym_ops) = ub_ops.split_at(und as usize);
    let mut operands: Vec<ValueRef> = lb_dim_ops
        .iter()
        .chain(ub_dim_ops)
        .chain(lb_sym_ops)
        .chain(ub_sym_ops)
        .copied()
        .collect();

    fully_compose_affine_map_and_operands(ctx, &mut map, &mut operands);
    canonicalize_map_and_operands(&mut map, &mut operands);
    trace!(%map, "symbolic trip count");
    Some(TripCountMap { map, operands })
}

/// Trip count map computed by first materializing each bound as an
/// `affine.apply` in front of the loop.
///
/// Apply ops that end up unused are erased again. Detached loops fall back to
/// [`trip_count_map`]. Not reentrant: the IR is mutated while this runs.
pub fn materialize_trip_count_map(ctx: &mut IrContext, for_op: AffineFor) -> Option<TripCountMap> {
    let Some(block) = ctx.op_block(for_op.op_ref()) else {
        return trip_count_map(ctx, for_op);
    };
    let step = positive_step(ctx, for_op)?;
    if for_op.has_constant_bounds(ctx) {
        return trip_count_map(ctx, for_op);
    }
    let lb_map = for_op.lower_bound_map(ctx).ok()?.clone();
    let ub_map = for_op.upper_bound_map(ctx).ok()?.clone();
    if lb_map.num_results() != 1 {
        debug!("trip count unavailable: multi-result lower bound");
        return None;
    }
    let lb_ops = for_op.lower_bound_operands(ctx).to_vec();
    let ub_ops = for_op.upper_bound_operands(ctx).to_vec();
    let location = ctx.op(for_op.op_ref()).location;

    let mut created = Vec::with_capacity(ub_map.num_results() + 1);
    let mut insert = |ctx: &mut IrContext, map: AffineMap, operands: &[ValueRef]| {
        let apply = affine::apply(ctx, location, map, operands);
        ctx.insert_op_before(block, for_op.op_ref(), apply.op_ref());
        created.push(apply);
        apply.result(ctx)
    };
    let mut operands: Vec<ValueRef> = (0..ub_map.num_results())
        .map(|i| insert(ctx, ub_map.sub_map([i]), &ub_ops))
        .collect();
    operands.push(insert(ctx, lb_map, &lb_ops));

    // (d_ub0, .., d_ubN, d_lb) -> ((d_ubi - d_lb) ceildiv step)
    let n = ub_map.num_results() as u32;
    let mut map = AffineMap::new(
        n + 1,
        0,
        (0..n)
            .map(|i| (AffineExpr::dim(i) - AffineExpr::dim(n)).ceil_div(step))
            .collect::<Vec<_>>(),
    );
    fully_compose_affine_map_and_operands(ctx, &mut map, &mut operands);
    canonicalize_map_and_operands(&mut map, &mut operands);

    for apply in created {
        let result = apply.result(ctx);
        if !ctx.has_uses(result) && !operands.contains(&result) {
            ctx.erase_op(apply.op_ref());
        }
    }
    trace!(%map, "materialized trip count");
    Some(TripCountMap { map, operands })
}

fn positive_step(ctx: &IrContext, for_op: AffineFor) -> Option<i64> {
    for_op.step(ctx).ok().filter(|&s| s > 0)
}

/// The trip count when every result of the trip count map is constant:
/// the minimum over results, clamped at zero.
pub fn constant_trip_count(ctx: &IrContext, for_op: AffineFor) -> Option<u64> {
    let tc = trip_count_map(ctx, for_op)?;
    let min = tc.map.constant_results()?.into_iter().min()?;
    Some(u64::try_from(min).unwrap_or(0))
}

/// Largest number known to divide the trip count.
///
/// A loop that runs zero times is divisible by anything and yields
/// `u64::MAX`. Returns `1` when no trip count map is available.
pub fn largest_trip_count_divisor(ctx: &IrContext, for_op: AffineFor) -> u64 {
    let Some(tc) = trip_count_map(ctx, for_op) else {
        return 1;
    };
    if tc.map.num_results() == 0 {
        return 1;
    }
    // u64::MAX stands for "divides anything" and is the identity of the gcd.
    let mut divisor = u64::MAX;
    for expr in tc.map.results() {
        let this = match expr.as_constant() {
            Some(c) if c <= 0 => u64::MAX,
            Some(c) => c.unsigned_abs(),
            None => match expr.largest_known_divisor() {
                0 => u64::MAX,
                d => d,
            },
        };
        divisor = match (divisor, this) {
            (u64::MAX, d) | (d, u64::MAX) => d,
            (a, b) => gcd(a, b),
        };
    }
    divisor
}

/// Whether `index` does not vary with the induction variable `iv`.
///
/// The index may be the result of at most one `affine.apply`; longer chains
/// are expected to be composed beforehand and are conservatively reported
/// as varying, with a remark on the first apply.
pub fn is_access_invariant(ctx: &IrContext, iv: ValueRef, index: ValueRef) -> bool {
    debug_assert!(
        for_of_induction_var(ctx, iv).is_some(),
        "is_access_invariant: not an induction variable"
    );
    let applies = reachable_affine_apply_ops(ctx, &[index]);
    match applies.as_slice() {
        [] => index != iv,
        [apply] => AffineValueMap::from_apply(ctx, *apply)
            .is_some_and(|vm| !vm.is_function_of(0, iv)),
        [first, ..] => {
            ctx.emit_remark(
                first.op_ref(),
                "CompositionAffineMapsPass must have been run: there should be at most one \
                 AffineApplyOp, returning false conservatively.",
            );
            false
        }
    }
}

/// The subset of `indices` invariant along `iv`.
pub fn invariant_accesses(
    ctx: &IrContext,
    iv: ValueRef,
    indices: &[ValueRef],
) -> HashSet<ValueRef> {
    indices
        .iter()
        .copied()
        .filter(|&index| is_access_invariant(ctx, iv, index))
        .collect()
}

/// How a memory access moves when the induction variable advances.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Contiguity {
    /// No index depends on the induction variable.
    Invariant,
    /// Exactly one index varies; the payload counts dimensions from the
    /// innermost (fastest varying) one.
    Along(usize),
}

/// Contiguity of the memory access `op` along `iv`, or `None` when more than
/// one index varies or the memref layout is not the identity.
///
/// Non-identity layouts additionally get an error diagnostic on `op`.
pub fn is_contiguous_access(ctx: &IrContext, iv: ValueRef, op: OpRef) -> Option<Contiguity> {
    let access = ctx.memory_access(op)?;
    let memref_ty = ctx.value_ty(access.memref(ctx, op));
    let layout = ctx.types.memref_layout(memref_ty);
    if layout.len() > 1 || layout.first().is_some_and(|m| !m.is_identity()) {
        ctx.emit_error(op, "NYI: non-trivial layoutMap");
        return None;
    }
    let indices = access.indices(ctx, op);
    let mut varying = None;
    for (pos, &index) in indices.iter().enumerate() {
        if is_access_invariant(ctx, iv, index) {
            continue;
        }
        if varying.is_some() {
            return None;
        }
        varying = Some(indices.len() - (pos + 1));
    }
    Some(varying.map_or(Contiguity::Invariant, Contiguity::Along))
}

/// Memory accesses of a loop body, or `None` when something in the body
/// rules out vectorization.
fn vectorizable_accesses(ctx: &IrContext, for_op: AffineFor) -> Option<Vec<OpRef>> {
    let mut accesses = Vec::new();
    let vetoed = walk_region(ctx, for_op.body(ctx)?, &mut |op| {
        if AffineIf::matches(ctx, op) {
            trace!("vectorization vetoed by conditional");
            return ControlFlow::Break(());
        }
        if !ctx.op_regions(op).is_empty() && !AffineFor::matches(ctx, op) {
            trace!(op = %ctx.op_name(op), "vectorization vetoed by region op");
            return ControlFlow::Break(());
        }
        if let Some(access) = ctx.memory_access(op) {
            if access.vector_transfer {
                return ControlFlow::Break(());
            }
            let memref_ty = ctx.value_ty(access.memref(ctx, op));
            let elem = ctx.types.element_type_or_self(memref_ty);
            if ctx.types.is_vector(elem) {
                return ControlFlow::Break(());
            }
            accesses.push(op);
        }
        ControlFlow::Continue(WalkAction::Advance)
    });
    vetoed.is_continue().then_some(accesses)
}

/// Whether the body of `for_op` can be vectorized along its induction
/// variable.
pub fn is_vectorizable_loop_body(ctx: &IrContext, for_op: AffineFor) -> bool {
    vectorizable_accesses(ctx, for_op).is_some()
}

/// Like [`is_vectorizable_loop_body`], additionally requiring `allowed` to
/// accept every memory access of the body.
pub fn is_vectorizable_loop_body_with(
    ctx: &IrContext,
    for_op: AffineFor,
    mut allowed: impl FnMut(&IrContext, AffineFor, OpRef) -> bool,
) -> bool {
    vectorizable_accesses(ctx, for_op)
        .is_some_and(|accesses| accesses.into_iter().all(|op| allowed(ctx, for_op, op)))
}

/// Like [`is_vectorizable_loop_body`], additionally requiring every access
/// to be contiguous along the same memref dimension.
///
/// Returns that dimension, or [`Contiguity::Invariant`] when no access
/// varies.
pub fn is_vectorizable_loop_body_along(ctx: &IrContext, for_op: AffineFor) -> Option<Contiguity> {
    let accesses = vectorizable_accesses(ctx, for_op)?;
    let iv = for_op.induction_var(ctx)?;
    let mut dim = Contiguity::Invariant;
    for op in accesses {
        match (is_contiguous_access(ctx, iv, op)?, dim) {
            (Contiguity::Invariant, _) => {}
            (Contiguity::Along(d), Contiguity::Along(prev)) if d != prev => return None,
            (along, _) => dim = along,
        }
    }
    Some(dim)
}

/// Whether shifting the ops of the loop body by `shifts` (one entry per op,
/// in body order) keeps every SSA def before its uses within the body.
///
/// A def and each in-body user must be shifted by the same amount. Uses
/// outside the body are unconstrained.
///
/// # Panics
///
/// Panics if `shifts` does not have one entry per body op.
pub fn is_shift_valid(ctx: &IrContext, for_op: AffineFor, shifts: &[u64]) -> bool {
    let body = for_op.body_block(ctx);
    let num_ops = body.map_or(0, |b| ctx.num_ops(b));
    assert_eq!(
        shifts.len(),
        num_ops,
        "is_shift_valid: {} shifts for a body of {num_ops} ops",
        shifts.len(),
    );
    let Some(body) = body else {
        return true;
    };
    let mut shift_of: HashMap<OpRef, u64> = HashMap::new();
    for (op, &shift) in ctx.block_ops(body).rev().zip(shifts.iter().rev()) {
        shift_of.insert(op, shift);
        for &result in ctx.op_results(op) {
            for user in ctx.users(result) {
                // Users nested below the body are represented by their
                // ancestor in it.
                let Some(ancestor) = ctx.find_ancestor_op_in_block(body, user) else {
                    continue;
                };
                if shift_of.get(&ancestor).is_some_and(|&s| s != shift) {
                    return false;
                }
            }
        }
    }
    true
}
