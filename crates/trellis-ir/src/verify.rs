//! Operation and whole-IR verification.
//!
//! `IrContext::verify_invariants` checks a single op against its registered
//! traits and custom verifier. [`verify`] walks a subtree and additionally
//! checks block structure, successor placement, SSA dominance of operands
//! and use-chain consistency. Every failure is emitted as an error
//! diagnostic on the offending op and returned as a [`VerifyError`].

use std::collections::HashSet;
use std::convert::Infallible;
use std::ops::ControlFlow;

use derive_more::{Display, Error};

use crate::context::IrContext;
use crate::dominance::DominanceInfo;
use crate::location::Location;
use crate::refs::{BlockRef, OpRef, ValueRef};
use crate::registry::TerminatorStatus;
use crate::walk::{WalkAction, walk_op};

/// A verification failure located at an operation.
#[derive(Clone, Debug, PartialEq, Eq, Display, Error)]
#[display("'{op_name}' op {message}")]
pub struct VerifyError {
    pub op: OpRef,
    pub op_name: String,
    pub location: Location,
    pub message: String,
}

impl VerifyError {
    /// Build an error for `op` without emitting it.
    pub fn new(ctx: &IrContext, op: OpRef, message: impl Into<String>) -> Self {
        Self {
            op,
            op_name: ctx.op_name(op),
            location: ctx.op(op).location,
            message: message.into(),
        }
    }
}

impl IrContext {
    /// Emit an error diagnostic on `op` and return it as a `VerifyError`.
    pub fn emit_op_error(&self, op: OpRef, message: impl Into<String>) -> VerifyError {
        let err = VerifyError::new(self, op, message);
        self.emit_error(op, err.to_string());
        err
    }

    fn report(&self, err: VerifyError) -> VerifyError {
        self.emit_error(err.op, err.to_string());
        err
    }

    /// Check `op` against every trait of its kind in declaration order, then
    /// run the kind's custom verifier. Stops at the first violation.
    ///
    /// Unregistered kinds verify trivially. Never mutates the IR.
    pub fn verify_invariants(&self, op: OpRef) -> Result<(), VerifyError> {
        let Some(desc) = self.descriptor(op) else {
            return Ok(());
        };
        for t in &desc.traits {
            if let Err(message) = t.verify(self, op) {
                return Err(self.emit_op_error(op, message));
            }
        }
        if let Some(verifier) = desc.verifier {
            verifier(self, op).map_err(|err| self.report(err))?;
        }
        Ok(())
    }
}

/// Verify `root` and everything nested in it.
pub fn verify(ctx: &IrContext, root: OpRef) -> Result<(), VerifyError> {
    let dom = DominanceInfo::compute(ctx, root);
    let walked = walk_op::<VerifyError>(ctx, root, &mut |op| match verify_op(ctx, &dom, op) {
        Ok(()) => ControlFlow::Continue(WalkAction::Advance),
        Err(err) => ControlFlow::Break(err),
    });
    if let ControlFlow::Break(err) = walked {
        return Err(err);
    }
    if let Some(message) = validate_use_chains(ctx, root).into_iter().next() {
        return Err(ctx.emit_op_error(root, message));
    }
    Ok(())
}

fn verify_op(ctx: &IrContext, dom: &DominanceInfo, op: OpRef) -> Result<(), VerifyError> {
    for (i, &operand) in ctx.op_operands(op).iter().enumerate() {
        if ctx.defining_op(operand).is_some_and(|def| ctx.is_erased(def)) {
            return Err(ctx.emit_op_error(op, format!("operand #{i} refers to an erased value")));
        }
    }

    if !ctx.op_successors(op).is_empty() {
        let parent = ctx.parent_region(op);
        for (i, &succ) in ctx.op_successors(op).iter().enumerate() {
            if ctx.block_region(succ) != parent {
                return Err(
                    ctx.emit_op_error(op, "reference to block defined in another region")
                );
            }
            let forwarded = ctx.successor_operands(op, i).len();
            let expected = ctx.block_args(succ).len();
            if forwarded != expected {
                return Err(ctx.emit_op_error(
                    op,
                    format!(
                        "branch has {forwarded} operands for successor #{i}, \
                         but target block has {expected}"
                    ),
                ));
            }
        }
    }

    ctx.verify_invariants(op)?;

    for &region in ctx.op_regions(op) {
        for &block in ctx.region_blocks(region) {
            verify_block(ctx, op, block)?;
        }
    }

    // Values used inside isolated ops are checked by IsolatedFromAbove.
    if ctx.op_block(op).is_some() {
        for (i, &operand) in ctx.op_operands(op).iter().enumerate() {
            if !dom.properly_dominates_value(ctx, operand, op) {
                return Err(
                    ctx.emit_op_error(op, format!("operand #{i} does not dominate this use"))
                );
            }
        }
    }
    Ok(())
}

fn verify_block(ctx: &IrContext, parent: OpRef, block: BlockRef) -> Result<(), VerifyError> {
    let Some(last) = ctx.last_op(block) else {
        return Err(ctx.emit_op_error(parent, "empty block: expect at least a terminator"));
    };
    for op in ctx.block_ops(block) {
        if op != last && ctx.terminator_status(op) == TerminatorStatus::Terminator {
            return Err(ctx.emit_op_error(op, "must be the last operation in the parent block"));
        }
    }
    if ctx.terminator_status(last) == TerminatorStatus::NonTerminator {
        return Err(ctx.emit_op_error(last, "block with no terminator"));
    }
    Ok(())
}

/// Check that the use-chains below `root` match the actual operands.
///
/// Checks two directions:
/// 1. For every operand of every op, there must be a corresponding entry in `uses(operand)`.
/// 2. For every use recorded on a value defined below `root`, the referenced
///    op's operand must point back.
pub fn validate_use_chains(ctx: &IrContext, root: OpRef) -> Vec<String> {
    let mut errors = Vec::new();
    let mut actual_uses: HashSet<(ValueRef, OpRef, u32)> = HashSet::new();
    let mut defined: HashSet<ValueRef> = HashSet::new();

    let _ = walk_op::<Infallible>(ctx, root, &mut |op| {
        for (idx, &operand) in ctx.op_operands(op).iter().enumerate() {
            actual_uses.insert((operand, op, idx as u32));
        }
        defined.extend(ctx.op_results(op));
        for &region in ctx.op_regions(op) {
            for &block in ctx.region_blocks(region) {
                defined.extend(ctx.block_args(block));
            }
        }
        ControlFlow::Continue(WalkAction::Advance)
    });

    // Direction 1: actual operand → use-chain entry must exist
    for &(val, op, idx) in &actual_uses {
        let found = ctx
            .uses(val)
            .iter()
            .any(|u| u.user == op && u.operand_index == idx);
        if !found {
            errors.push(format!(
                "operand #{idx} of {} ({op}) uses {val} but no use-chain entry exists",
                ctx.op_name(op),
            ));
        }
    }

    // Direction 2: use-chain entry → actual operand must exist
    for &val in &defined {
        for u in ctx.uses(val) {
            let points_back = ctx
                .op_operands(u.user)
                .get(u.operand_index as usize)
                .is_some_and(|&v| v == val);
            if !points_back {
                errors.push(format!(
                    "use-chain entry for {val} claims use by {} operand #{}, \
                     but no such operand exists",
                    u.user, u.operand_index,
                ));
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{BlockData, OperationDataBuilder, RegionData};
    use crate::diagnostics::Severity;
    use crate::location::Span;
    use crate::registry::OpDescriptor;
    use crate::symbol::Symbol;
    use crate::traits::OpTrait;

    fn setup() -> (IrContext, Location) {
        let mut ctx = IrContext::new();
        ctx.registry.register(
            OpDescriptor::new(Symbol::new("test"), Symbol::new("value"))
                .with_traits([OpTrait::ZeroOperands, OpTrait::OneResult]),
        );
        ctx.registry.register(
            OpDescriptor::new(Symbol::new("test"), Symbol::new("use"))
                .with_traits([OpTrait::OneOperand, OpTrait::ZeroResults]),
        );
        ctx.registry.register(
            OpDescriptor::new(Symbol::new("test"), Symbol::new("ret"))
                .with_traits([OpTrait::ZeroResults, OpTrait::IsTerminator]),
        );
        let path = ctx.paths.intern("verify.mlir".to_owned());
        (ctx, Location::new(path, Span::default()))
    }

    fn op(ctx: &mut IrContext, loc: Location, name: &'static str, operands: &[ValueRef]) -> OpRef {
        let i32_ty = ctx.types.integer(32);
        let mut builder = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new(name))
            .operands(operands.iter().copied());
        if name == "value" {
            builder = builder.result(i32_ty);
        }
        let data = builder.build(ctx);
        ctx.create_op(data)
    }

    fn holder(ctx: &mut IrContext, loc: Location, blocks: &[BlockRef]) -> OpRef {
        let region = ctx.create_region(RegionData::new(loc, blocks.iter().copied()));
        let data = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new("holder"))
            .region(region)
            .build(ctx);
        ctx.create_op(data)
    }

    #[test]
    fn well_formed_block_verifies() {
        let (mut ctx, loc) = setup();
        let block = ctx.create_block(BlockData::new(loc, []));
        let v = op(&mut ctx, loc, "value", &[]);
        let val = ctx.op_result(v, 0);
        let u = op(&mut ctx, loc, "use", &[val]);
        let r = op(&mut ctx, loc, "ret", &[]);
        for o in [v, u, r] {
            ctx.push_op(block, o);
        }
        let root = holder(&mut ctx, loc, &[block]);
        assert_eq!(verify(&ctx, root), Ok(()));
        assert!(ctx.diagnostics.emitted().is_empty());
    }

    #[test]
    fn trait_violation_is_reported_and_returned() {
        let (mut ctx, loc) = setup();
        let v = op(&mut ctx, loc, "value", &[]);
        let val = ctx.op_result(v, 0);
        let bad = op(&mut ctx, loc, "use", &[val, val]);

        let err = ctx.verify_invariants(bad).unwrap_err();
        assert_eq!(err.to_string(), "'test.use' op requires a single operand");
        let diags = ctx.diagnostics.emitted();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, Severity::Error);
        assert_eq!(diags[0].op, Some(bad));
    }

    #[test]
    fn custom_verifier_runs_after_traits() {
        fn reject(ctx: &IrContext, op: OpRef) -> Result<(), VerifyError> {
            Err(VerifyError::new(ctx, op, "custom failure"))
        }
        let (mut ctx, loc) = setup();
        ctx.registry.register(
            OpDescriptor::new(Symbol::new("test"), Symbol::new("picky"))
                .with_traits([OpTrait::ZeroOperands])
                .with_verifier(reject),
        );
        let picky = op(&mut ctx, loc, "picky", &[]);
        let err = ctx.verify_invariants(picky).unwrap_err();
        assert_eq!(err.message, "custom failure");
        assert!(ctx.diagnostics.has_errors());
    }

    #[test]
    fn unregistered_ops_verify_trivially() {
        let (mut ctx, loc) = setup();
        let mystery = op(&mut ctx, loc, "mystery", &[]);
        assert_eq!(ctx.verify_invariants(mystery), Ok(()));
    }

    #[test]
    fn missing_terminator_is_rejected() {
        let (mut ctx, loc) = setup();
        let block = ctx.create_block(BlockData::new(loc, []));
        let v = op(&mut ctx, loc, "value", &[]);
        ctx.push_op(block, v);
        let root = holder(&mut ctx, loc, &[block]);
        let err = verify(&ctx, root).unwrap_err();
        assert_eq!(err.message, "block with no terminator");
        assert_eq!(err.op, v);
    }

    #[test]
    fn empty_block_is_rejected() {
        let (mut ctx, loc) = setup();
        let block = ctx.create_block(BlockData::new(loc, []));
        let root = holder(&mut ctx, loc, &[block]);
        let err = verify(&ctx, root).unwrap_err();
        assert_eq!(err.message, "empty block: expect at least a terminator");
    }

    #[test]
    fn use_before_def_is_rejected() {
        let (mut ctx, loc) = setup();
        let block = ctx.create_block(BlockData::new(loc, []));
        let v = op(&mut ctx, loc, "value", &[]);
        let val = ctx.op_result(v, 0);
        let u = op(&mut ctx, loc, "use", &[val]);
        let r = op(&mut ctx, loc, "ret", &[]);
        for o in [u, v, r] {
            ctx.push_op(block, o);
        }
        let root = holder(&mut ctx, loc, &[block]);
        let err = verify(&ctx, root).unwrap_err();
        assert_eq!(err.op, u);
        assert_eq!(err.message, "operand #0 does not dominate this use");
    }

    #[test]
    fn terminator_in_the_middle_is_rejected() {
        let (mut ctx, loc) = setup();
        let block = ctx.create_block(BlockData::new(loc, []));
        let r1 = op(&mut ctx, loc, "ret", &[]);
        let r2 = op(&mut ctx, loc, "ret", &[]);
        ctx.push_op(block, r1);
        ctx.push_op(block, r2);
        let root = holder(&mut ctx, loc, &[block]);
        let err = verify(&ctx, root).unwrap_err();
        assert_eq!(err.op, r1);
        assert_eq!(err.message, "must be the last operation in the parent block");
    }

    #[test]
    fn use_chains_are_consistent_after_edits() {
        let (mut ctx, loc) = setup();
        let block = ctx.create_block(BlockData::new(loc, []));
        let a = op(&mut ctx, loc, "value", &[]);
        let b = op(&mut ctx, loc, "value", &[]);
        let (va, vb) = (ctx.op_result(a, 0), ctx.op_result(b, 0));
        let u = op(&mut ctx, loc, "use", &[va]);
        for o in [a, b, u] {
            ctx.push_op(block, o);
        }
        ctx.replace_all_uses_with(va, vb);
        let root = holder(&mut ctx, loc, &[block]);
        assert!(validate_use_chains(&ctx, root).is_empty());
    }
}
