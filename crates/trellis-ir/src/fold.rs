//! Fold hooks and their normalized outcome.

use smallvec::SmallVec;

use crate::context::IrContext;
use crate::refs::{OpRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::Attribute;

/// Replacement for one result of a folded operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FoldResult {
    /// An existing SSA value.
    Value(ValueRef),
    /// A constant that the caller may materialize.
    Attribute(Attribute),
}

/// Fold hook for single-result kinds.
///
/// The slice holds one entry per operand: the constant it is known to
/// carry, if any. Returns `None` to decline. Returning the op's own result
/// means the op was updated in place.
pub type SingleFoldFn = fn(&mut IrContext, OpRef, &[Option<Attribute>]) -> Option<FoldResult>;

/// Fold hook for kinds with any number of results.
///
/// Returns `true` when folded. On success `results` is either empty (updated
/// in place) or holds one replacement per result.
pub type MultiFoldFn =
    fn(&mut IrContext, OpRef, &[Option<Attribute>], &mut SmallVec<[FoldResult; 2]>) -> bool;

#[derive(Clone, Copy, Debug)]
pub enum FoldHook {
    Single(SingleFoldFn),
    Multi(MultiFoldFn),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FoldOutcome {
    NotFolded,
    /// The operation was modified in place and stays.
    InPlace,
    /// One replacement per result.
    Replaced(SmallVec<[FoldResult; 2]>),
}

/// Constant carried by `v`: the `value` attribute of a constant-like
/// defining op.
pub fn constant_operand(ctx: &IrContext, v: ValueRef) -> Option<Attribute> {
    let def = ctx.defining_op(v)?;
    if !ctx.is_constant_like(def) {
        return None;
    }
    ctx.op_attr(def, Symbol::new("value")).cloned()
}

/// Run the registered fold hook of `op`, if any.
pub fn fold_op(ctx: &mut IrContext, op: OpRef) -> FoldOutcome {
    let Some(hook) = ctx.descriptor(op).and_then(|d| d.fold) else {
        return FoldOutcome::NotFolded;
    };
    let constants: SmallVec<[Option<Attribute>; 4]> = ctx
        .op_operands(op)
        .iter()
        .map(|&v| constant_operand(ctx, v))
        .collect();
    match hook {
        FoldHook::Single(fold) => match fold(ctx, op, &constants) {
            None => FoldOutcome::NotFolded,
            Some(FoldResult::Value(v)) if ctx.op_results(op).first() == Some(&v) => {
                FoldOutcome::InPlace
            }
            Some(result) => FoldOutcome::Replaced(SmallVec::from_elem(result, 1)),
        },
        FoldHook::Multi(fold) => {
            let mut results = SmallVec::new();
            if !fold(ctx, op, &constants, &mut results) {
                FoldOutcome::NotFolded
            } else if results.is_empty() {
                FoldOutcome::InPlace
            } else {
                debug_assert_eq!(results.len(), ctx.op_results(op).len());
                FoldOutcome::Replaced(results)
            }
        }
    }
}
