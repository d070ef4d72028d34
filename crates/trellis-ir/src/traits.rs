//! Operation traits: the declarative vocabulary used to describe op kinds.
//!
//! A kind lists its traits in an [`OpDescriptor`](crate::OpDescriptor).
//! Structural traits check operand/result counts and types; property traits
//! (commutative, side-effect free, terminator, isolated) are additionally
//! folded into an [`OpProperties`] bitset for constant-time queries.

use bitflags::bitflags;

use crate::context::IrContext;
use crate::refs::{OpRef, RegionRef, TypeRef};

bitflags! {
    /// Aggregated boolean properties of an op kind.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct OpProperties: u8 {
        const COMMUTATIVE = 1 << 0;
        const NO_SIDE_EFFECT = 1 << 1;
        const TERMINATOR = 1 << 2;
        const ISOLATED_FROM_ABOVE = 1 << 3;
        const CONSTANT_LIKE = 1 << 4;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpTrait {
    ZeroOperands,
    OneOperand,
    NOperands(u32),
    AtLeastNOperands(u32),
    VariadicOperands,
    ZeroResults,
    OneResult,
    NResults(u32),
    AtLeastNResults(u32),
    VariadicResults,
    IsTerminator,
    IsolatedFromAbove,
    Commutative,
    NoSideEffect,
    /// The op materializes the constant held in its `value` attribute.
    ConstantLike,
    SameOperandsAndResultType,
    SameOperandsAndResultShape,
    SameOperandsAndResultElementType,
    SameTypeOperands,
    OperandsAreFloatLike,
    OperandsAreIntegerLike,
    ResultsAreBoolLike,
    ResultsAreFloatLike,
    ResultsAreIntegerLike,
}

impl OpTrait {
    /// Property bit contributed by this trait, if any.
    pub fn property(self) -> OpProperties {
        match self {
            OpTrait::Commutative => OpProperties::COMMUTATIVE,
            OpTrait::NoSideEffect => OpProperties::NO_SIDE_EFFECT,
            OpTrait::IsTerminator => OpProperties::TERMINATOR,
            OpTrait::IsolatedFromAbove => OpProperties::ISOLATED_FROM_ABOVE,
            OpTrait::ConstantLike => OpProperties::CONSTANT_LIKE,
            _ => OpProperties::empty(),
        }
    }

    /// Check `op` against this trait, returning the violation message.
    pub fn verify(self, ctx: &IrContext, op: OpRef) -> Result<(), String> {
        let num_operands = ctx.op_operands(op).len() as u32;
        let num_results = ctx.op_results(op).len() as u32;
        match self {
            OpTrait::ZeroOperands => check(num_operands == 0, || "requires zero operands".into()),
            OpTrait::OneOperand => check(num_operands == 1, || "requires a single operand".into()),
            OpTrait::NOperands(n) => check(num_operands == n, || {
                format!("expected {n} operands, but found {num_operands}")
            }),
            OpTrait::AtLeastNOperands(n) => check(num_operands >= n, || {
                format!("expected {n} or more operands, but found {num_operands}")
            }),
            OpTrait::ZeroResults => check(num_results == 0, || "requires zero results".into()),
            OpTrait::OneResult => check(num_results == 1, || "requires one result".into()),
            OpTrait::NResults(n) => check(num_results == n, || {
                format!("expected {n} results, but found {num_results}")
            }),
            OpTrait::AtLeastNResults(n) => check(num_results >= n, || {
                format!("expected {n} or more results, but found {num_results}")
            }),
            OpTrait::VariadicOperands
            | OpTrait::VariadicResults
            | OpTrait::Commutative
            | OpTrait::NoSideEffect => Ok(()),
            OpTrait::ConstantLike => check(num_operands == 0 && num_results == 1, || {
                "constant-like op requires zero operands and one result".into()
            }),
            OpTrait::IsTerminator => verify_is_terminator(ctx, op),
            OpTrait::IsolatedFromAbove => verify_isolated_from_above(ctx, op),
            OpTrait::SameOperandsAndResultType => {
                let mut tys = operand_and_result_types(ctx, op);
                let first = tys.next();
                check(tys.all(|t| Some(t) == first), || {
                    "requires the same type for all operands and results".into()
                })
            }
            OpTrait::SameOperandsAndResultShape => {
                let mut shapes = operand_and_result_types(ctx, op).map(|t| ctx.types.shape(t));
                let first = shapes.next();
                check(shapes.all(|s| Some(s) == first), || {
                    "requires the same shape for all operands and results".into()
                })
            }
            OpTrait::SameOperandsAndResultElementType => {
                let mut elems =
                    operand_and_result_types(ctx, op).map(|t| ctx.types.element_type_or_self(t));
                let first = elems.next();
                check(elems.all(|e| Some(e) == first), || {
                    "requires the same element type for all operands and results".into()
                })
            }
            OpTrait::SameTypeOperands => {
                let mut tys = ctx.op_operands(op).iter().map(|&v| ctx.value_ty(v));
                let first = tys.next();
                check(tys.all(|t| Some(t) == first), || {
                    "requires all operands to have the same type".into()
                })
            }
            OpTrait::OperandsAreFloatLike => check(
                ctx.op_operands(op)
                    .iter()
                    .all(|&v| ctx.types.is_float_like(ctx.value_ty(v))),
                || "requires a float type".into(),
            ),
            OpTrait::OperandsAreIntegerLike => check(
                ctx.op_operands(op)
                    .iter()
                    .all(|&v| ctx.types.is_integer_like(ctx.value_ty(v))),
                || "requires an integer or index type".into(),
            ),
            OpTrait::ResultsAreBoolLike => check(
                ctx.op_result_types(op)
                    .iter()
                    .all(|&t| ctx.types.is_bool_like(t)),
                || "requires a bool result type".into(),
            ),
            OpTrait::ResultsAreFloatLike => check(
                ctx.op_result_types(op)
                    .iter()
                    .all(|&t| ctx.types.is_float_like(t)),
                || "requires a floating point type".into(),
            ),
            OpTrait::ResultsAreIntegerLike => check(
                ctx.op_result_types(op)
                    .iter()
                    .all(|&t| ctx.types.is_integer_like(t)),
                || "requires an integer or index type".into(),
            ),
        }
    }
}

fn check(ok: bool, message: impl FnOnce() -> String) -> Result<(), String> {
    if ok { Ok(()) } else { Err(message()) }
}

fn operand_and_result_types(ctx: &IrContext, op: OpRef) -> impl Iterator<Item = TypeRef> + '_ {
    ctx.op_operands(op)
        .iter()
        .map(|&v| ctx.value_ty(v))
        .chain(ctx.op_result_types(op).iter().copied())
}

fn verify_is_terminator(ctx: &IrContext, op: OpRef) -> Result<(), String> {
    match ctx.op_block(op) {
        Some(block) if ctx.last_op(block) != Some(op) => {
            Err("must be the last operation in the parent block".into())
        }
        _ => Ok(()),
    }
}

/// Whether `region` is `ancestor` or nested somewhere inside it.
pub(crate) fn region_is_within(ctx: &IrContext, mut region: RegionRef, ancestor: RegionRef) -> bool {
    loop {
        if region == ancestor {
            return true;
        }
        let Some(parent) = ctx.region_op(region).and_then(|op| ctx.parent_region(op)) else {
            return false;
        };
        region = parent;
    }
}

fn verify_isolated_from_above(ctx: &IrContext, op: OpRef) -> Result<(), String> {
    let mut worklist: Vec<OpRef> = Vec::new();
    for &region in ctx.op_regions(op) {
        for &block in ctx.region_blocks(region) {
            worklist.extend(ctx.block_ops(block));
        }
    }
    while let Some(inner) = worklist.pop() {
        for &operand in ctx.op_operands(inner) {
            let defined_inside = ctx
                .value_block(operand)
                .and_then(|b| ctx.block_region(b))
                .is_some_and(|r| ctx.op_regions(op).iter().any(|&own| region_is_within(ctx, r, own)));
            if !defined_inside {
                return Err("using value defined outside the region".into());
            }
        }
        for &region in ctx.op_regions(inner) {
            for &block in ctx.region_blocks(region) {
                worklist.extend(ctx.block_ops(block));
            }
        }
    }
    Ok(())
}
