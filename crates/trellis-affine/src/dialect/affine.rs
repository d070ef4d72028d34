//! `affine` dialect: counted loops, affine conditionals and `affine.apply`.
//!
//! `affine.for` stores its bounds as two affine maps. Its operand list holds
//! the lower-bound map inputs followed by the upper-bound map inputs. The
//! body is a single block whose only argument is the induction variable.

use smallvec::SmallVec;
use tracing::warn;
use trellis_ir::ops::ConversionError;
use trellis_ir::{
    AffineExpr, AffineMap, Attribute, BlockArgData, BlockData, BlockRef, DialectOp, FoldHook,
    FoldResult, IrContext, Location, OpDescriptor, OpRef, OpRegistry, OpTrait,
    OperationDataBuilder, RegionData, RegionRef, Symbol, ValueDef, ValueRef, VerifyError,
    define_op, symbols,
};


symbols! {
    AFFINE => "affine",
    FOR => "for",
    IF => "if",
    APPLY => "apply",
    TERMINATOR => "terminator",
    ATTR_LOWER_BOUND => "lower_bound",
    ATTR_UPPER_BOUND => "upper_bound",
    ATTR_STEP => "step",
    ATTR_MAP => "map",
    ATTR_CONDITION => "condition",
}

define_op! {
    /// `affine.for`: counted loop with affine bounds and a constant step.
    pub struct AffineFor = "affine"."for";
}

define_op! {
    /// `affine.if`: executes its then region when every condition result is
    /// non-negative, the optional else region otherwise.
    pub struct AffineIf = "affine"."if";
}

define_op! {
    /// `affine.apply`: evaluates a single-result affine map.
    pub struct AffineApply = "affine"."apply";
}

define_op! {
    /// `affine.terminator`: implicit terminator of loop and conditional bodies.
    pub struct AffineTerminator = "affine"."terminator";
}

pub(crate) fn register(registry: &mut OpRegistry) {
    registry.register(
        OpDescriptor::new(AFFINE(), FOR())
            .with_traits([OpTrait::VariadicOperands, OpTrait::ZeroResults])
            .with_verifier(verify_for),
    );
    registry.register(
        OpDescriptor::new(AFFINE(), IF())
            .with_traits([OpTrait::VariadicOperands, OpTrait::ZeroResults])
            .with_verifier(verify_if),
    );
    registry.register(
        OpDescriptor::new(AFFINE(), APPLY())
            .with_traits([
                OpTrait::VariadicOperands,
                OpTrait::OneResult,
                OpTrait::NoSideEffect,
            ])
            .with_verifier(verify_apply)
            .with_fold(FoldHook::Single(fold_apply)),
    );
    registry.register(
        OpDescriptor::new(AFFINE(), TERMINATOR())
            .with_traits([
                OpTrait::ZeroOperands,
                OpTrait::ZeroResults,
                OpTrait::IsTerminator,
                OpTrait::NoSideEffect,
            ])
            .with_verifier(verify_terminator),
    );
}

fn map_attr<'a>(
    ctx: &'a IrContext,
    op: OpRef,
    key: Symbol,
    name: &'static str,
) -> Result<&'a AffineMap, ConversionError> {
    match ctx.op_attr(op, key) {
        Some(Attribute::AffineMap(map)) => Ok(map),
        Some(_) => Err(ConversionError::WrongAttributeType(name)),
        None => Err(ConversionError::MissingAttribute(name)),
    }
}

fn verify_for(ctx: &IrContext, op: OpRef) -> Result<(), VerifyError> {
    let for_op = AffineFor::wrap_unchecked(op);
    let err = |msg: String| VerifyError::new(ctx, op, msg);
    let lb = for_op.lower_bound_map(ctx).map_err(|e| err(e.to_string()))?;
    let ub = for_op.upper_bound_map(ctx).map_err(|e| err(e.to_string()))?;
    match for_op.step(ctx) {
        Ok(step) if step > 0 => {}
        _ => {
            return Err(err(
                "expected step to be representable as a positive signed integer".into(),
            ));
        }
    }
    let expected = (lb.num_inputs() + ub.num_inputs()) as usize;
    if ctx.op_operands(op).len() != expected {
        return Err(err(format!(
            "expected {expected} bound operands, but found {}",
            ctx.op_operands(op).len()
        )));
    }
    if lb.num_results() == 0 || ub.num_results() == 0 {
        return Err(err("bound maps must have at least one result".into()));
    }
    let regions = ctx.op_regions(op);
    let body_ok = regions.len() == 1
        && ctx.region_blocks(regions[0]).len() == 1
        && match ctx.block_args(ctx.region_blocks(regions[0])[0]) {
            [iv] => ctx.types.is_index(ctx.value_ty(*iv)),
            _ => false,
        };
    if !body_ok {
        return Err(err(
            "expected body to have a single block with one index argument".into(),
        ));
    }
    Ok(())
}

fn verify_if(ctx: &IrContext, op: OpRef) -> Result<(), VerifyError> {
    let cond = map_attr(ctx, op, ATTR_CONDITION(), "condition")
        .map_err(|e| VerifyError::new(ctx, op, e.to_string()))?;
    if ctx.op_operands(op).len() != cond.num_inputs() as usize {
        return Err(VerifyError::new(
            ctx,
            op,
            "operand count and condition map dimension and symbol count must match",
        ));
    }
    if ctx.op_regions(op).len() != 2 {
        return Err(VerifyError::new(
            ctx,
            op,
            "expected then and else regions",
        ));
    }
    Ok(())
}

fn verify_apply(ctx: &IrContext, op: OpRef) -> Result<(), VerifyError> {
    let map = map_attr(ctx, op, ATTR_MAP(), "map")
        .map_err(|e| VerifyError::new(ctx, op, e.to_string()))?;
    if map.num_results() != 1 {
        return Err(VerifyError::new(ctx, op, "mapping must produce one value"));
    }
    if ctx.op_operands(op).len() != map.num_inputs() as usize {
        return Err(VerifyError::new(
            ctx,
            op,
            "operand count and affine map dimension and symbol count must match",
        ));
    }
    let index = ctx.op_results(op)[0];
    if !ctx.types.is_index(ctx.value_ty(index)) {
        return Err(VerifyError::new(ctx, op, "result must be of index type"));
    }
    Ok(())
}

fn verify_terminator(ctx: &IrContext, op: OpRef) -> Result<(), VerifyError> {
    match ctx.parent_op(op) {
        Some(parent) if AffineFor::matches(ctx, parent) || AffineIf::matches(ctx, parent) => {
            Ok(())
        }
        _ => Err(VerifyError::new(
            ctx,
            op,
            "expects parent op to be 'affine.for' or 'affine.if'",
        )),
    }
}

/// `d_i` folds to operand `i`; a map over constant operands folds to its value.
fn fold_apply(
    ctx: &mut IrContext,
    op: OpRef,
    constants: &[Option<Attribute>],
) -> Option<FoldResult> {
    let map = map_attr(ctx, op, ATTR_MAP(), "map").ok()?;
    let expr = map.results().first()?;
    let operands = ctx.op_operands(op);
    if operands.len() != map.num_inputs() as usize {
        return None;
    }
    match expr {
        AffineExpr::Dim(d) => {
            return operands.get(*d as usize).copied().map(FoldResult::Value);
        }
        AffineExpr::Symbol(s) => {
            let pos = map.num_dims() + s;
            return operands.get(pos as usize).copied().map(FoldResult::Value);
        }
        AffineExpr::Constant(c) => return Some(FoldResult::Attribute((*c).into())),
        AffineExpr::Binary { .. } => {}
    }
    let values: Option<SmallVec<[i64; 4]>> = constants
        .iter()
        .map(|c| c.as_ref().and_then(Attribute::as_int))
        .collect();
    let values = values?;
    let (dims, syms) = values.split_at(map.num_dims() as usize);
    expr.evaluate(dims, syms)
        .map(|v| FoldResult::Attribute(v.into()))
}

// ============================================================================
// Constructors
// ============================================================================

/// Append an `affine.terminator` to `block`.
fn push_terminator(ctx: &mut IrContext, location: Location, block: BlockRef) {
    let data = OperationDataBuilder::new(location, AFFINE(), TERMINATOR()).build(ctx);
    let term = ctx.create_op(data);
    ctx.push_op(block, term);
}

/// Create a detached `affine.for` with an empty body (terminator only).
pub fn for_loop(
    ctx: &mut IrContext,
    location: Location,
    lb_operands: &[ValueRef],
    lb_map: AffineMap,
    ub_operands: &[ValueRef],
    ub_map: AffineMap,
    step: i64,
) -> AffineFor {
    let index = ctx.types.index();
    let body = ctx.create_block(BlockData::new(location, [BlockArgData::new(index)]));
    push_terminator(ctx, location, body);
    let region = ctx.create_region(RegionData::new(location, [body]));
    let data = OperationDataBuilder::new(location, AFFINE(), FOR())
        .operands(lb_operands.iter().chain(ub_operands).copied())
        .attr(ATTR_LOWER_BOUND(), Attribute::AffineMap(lb_map))
        .attr(ATTR_UPPER_BOUND(), Attribute::AffineMap(ub_map))
        .attr(ATTR_STEP(), Attribute::from(step))
        .region(region)
        .build(ctx);
    AffineFor::wrap_unchecked(ctx.create_op(data))
}

/// `affine.for %i = lb to ub step step` with constant bounds.
pub fn for_constant(ctx: &mut IrContext, location: Location, lb: i64, ub: i64, step: i64) -> AffineFor {
    for_loop(
        ctx,
        location,
        &[],
        AffineMap::constant(lb),
        &[],
        AffineMap::constant(ub),
        step,
    )
}

/// Create a detached `affine.if`. The then region gets a terminated block;
/// the else region gets one only when `with_else` is set.
pub fn if_op(
    ctx: &mut IrContext,
    location: Location,
    condition: AffineMap,
    operands: &[ValueRef],
    with_else: bool,
) -> AffineIf {
    let then_block = ctx.create_block(BlockData::new(location, []));
    push_terminator(ctx, location, then_block);
    let then_region = ctx.create_region(RegionData::new(location, [then_block]));
    let else_blocks: SmallVec<[BlockRef; 1]> = if with_else {
        let block = ctx.create_block(BlockData::new(location, []));
        push_terminator(ctx, location, block);
        smallvec::smallvec![block]
    } else {
        SmallVec::new()
    };
    let else_region = ctx.create_region(RegionData::new(location, else_blocks));
    let data = OperationDataBuilder::new(location, AFFINE(), IF())
        .operands(operands.iter().copied())
        .attr(ATTR_CONDITION(), Attribute::AffineMap(condition))
        .region(then_region)
        .region(else_region)
        .build(ctx);
    AffineIf::wrap_unchecked(ctx.create_op(data))
}

/// Create a detached `affine.apply` of a single-result map.
pub fn apply(
    ctx: &mut IrContext,
    location: Location,
    map: AffineMap,
    operands: &[ValueRef],
) -> AffineApply {
    let index = ctx.types.index();
    let data = OperationDataBuilder::new(location, AFFINE(), APPLY())
        .operands(operands.iter().copied())
        .attr(ATTR_MAP(), Attribute::AffineMap(map))
        .result(index)
        .build(ctx);
    AffineApply::wrap_unchecked(ctx.create_op(data))
}

/// Insert `op` into `block` before its terminator, or at the end when the
/// block is not terminated yet.
fn push_before_terminator(ctx: &mut IrContext, block: BlockRef, op: OpRef) {
    match ctx.last_op(block) {
        Some(term) if AffineTerminator::matches(ctx, term) => ctx.insert_op_before(block, term, op),
        _ => ctx.push_op(block, op),
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl AffineFor {
    pub fn lower_bound_map<'a>(&self, ctx: &'a IrContext) -> Result<&'a AffineMap, ConversionError> {
        map_attr(ctx, self.0, ATTR_LOWER_BOUND(), "lower_bound")
    }

    pub fn upper_bound_map<'a>(&self, ctx: &'a IrContext) -> Result<&'a AffineMap, ConversionError> {
        map_attr(ctx, self.0, ATTR_UPPER_BOUND(), "upper_bound")
    }

    pub fn step(&self, ctx: &IrContext) -> Result<i64, ConversionError> {
        match ctx.op_attr(self.0, ATTR_STEP()) {
            Some(attr) => attr
                .as_int()
                .ok_or(ConversionError::WrongAttributeType("step")),
            None => Err(ConversionError::MissingAttribute("step")),
        }
    }

    fn num_lower_bound_operands(&self, ctx: &IrContext) -> usize {
        let n = self
            .lower_bound_map(ctx)
            .map_or(0, |m| m.num_inputs() as usize);
        n.min(ctx.op_operands(self.0).len())
    }

    pub fn lower_bound_operands<'a>(&self, ctx: &'a IrContext) -> &'a [ValueRef] {
        &ctx.op_operands(self.0)[..self.num_lower_bound_operands(ctx)]
    }

    pub fn upper_bound_operands<'a>(&self, ctx: &'a IrContext) -> &'a [ValueRef] {
        &ctx.op_operands(self.0)[self.num_lower_bound_operands(ctx)..]
    }

    pub fn constant_lower_bound(&self, ctx: &IrContext) -> Option<i64> {
        self.lower_bound_map(ctx).ok()?.single_constant()
    }

    pub fn constant_upper_bound(&self, ctx: &IrContext) -> Option<i64> {
        self.upper_bound_map(ctx).ok()?.single_constant()
    }

    pub fn has_constant_bounds(&self, ctx: &IrContext) -> bool {
        self.constant_lower_bound(ctx).is_some() && self.constant_upper_bound(ctx).is_some()
    }

    /// `None` for a malformed loop without a body region.
    pub fn body(&self, ctx: &IrContext) -> Option<RegionRef> {
        ctx.op_regions(self.0).first().copied()
    }

    pub fn body_block(&self, ctx: &IrContext) -> Option<BlockRef> {
        ctx.entry_block(self.body(ctx)?)
    }

    pub fn induction_var(&self, ctx: &IrContext) -> Option<ValueRef> {
        ctx.block_args(self.body_block(ctx)?).first().copied()
    }

    /// Insert `op` at the end of the body, before the terminator.
    ///
    /// Does nothing on a loop without a body block.
    pub fn push(&self, ctx: &mut IrContext, op: OpRef) {
        match self.body_block(ctx) {
            Some(block) => push_before_terminator(ctx, block, op),
            None => warn!(op = %ctx.op_name(op), "affine.for has no body to push into"),
        }
    }
}

/// The loop whose induction variable is `v`, if any.
pub fn for_of_induction_var(ctx: &IrContext, v: ValueRef) -> Option<AffineFor> {
    let ValueDef::BlockArg(block, 0) = ctx.value_def(v) else {
        return None;
    };
    let owner = ctx.block_parent_op(block)?;
    let for_op = AffineFor::from_op(ctx, owner).ok()?;
    (for_op.body_block(ctx) == Some(block)).then_some(for_op)
}

impl AffineIf {
    pub fn condition<'a>(&self, ctx: &'a IrContext) -> Result<&'a AffineMap, ConversionError> {
        map_attr(ctx, self.0, ATTR_CONDITION(), "condition")
    }

    pub fn then_block(&self, ctx: &IrContext) -> Option<BlockRef> {
        ctx.entry_block(*ctx.op_regions(self.0).first()?)
    }

    pub fn else_block(&self, ctx: &IrContext) -> Option<BlockRef> {
        let region = *ctx.op_regions(self.0).get(1)?;
        ctx.entry_block(region)
    }

    pub fn push_then(&self, ctx: &mut IrContext, op: OpRef) {
        match self.then_block(ctx) {
            Some(block) => push_before_terminator(ctx, block, op),
            None => warn!(op = %ctx.op_name(op), "affine.if has no then block to push into"),
        }
    }
}

impl AffineApply {
    pub fn map<'a>(&self, ctx: &'a IrContext) -> Result<&'a AffineMap, ConversionError> {
        map_attr(ctx, self.0, ATTR_MAP(), "map")
    }

    pub fn result(&self, ctx: &IrContext) -> ValueRef {
        ctx.op_result(self.0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::std as std_dialect;
    use trellis_ir::{FoldOutcome, Span, fold_op, verify};

    fn setup() -> (IrContext, Location) {
        let mut ctx = IrContext::new();
        crate::register_dialects(&mut ctx.registry);
        let path = ctx.paths.intern("affine.mlir".to_owned());
        (ctx, Location::new(path, Span::default()))
    }

    #[test]
    fn constant_loop_accessors() {
        let (mut ctx, loc) = setup();
        let l = for_constant(&mut ctx, loc, 0, 10, 2);
        assert_eq!(l.constant_lower_bound(&ctx), Some(0));
        assert_eq!(l.constant_upper_bound(&ctx), Some(10));
        assert_eq!(l.step(&ctx), Ok(2));
        assert!(l.has_constant_bounds(&ctx));
        let iv = l.induction_var(&ctx).unwrap();
        assert_eq!(for_of_induction_var(&ctx, iv), Some(l));
        assert_eq!(verify(&ctx, l.op_ref()), Ok(()));
    }

    #[test]
    fn bound_operands_are_split_by_map_inputs() {
        let (mut ctx, loc) = setup();
        let outer = for_constant(&mut ctx, loc, 0, 8, 1);
        let i = outer.induction_var(&ctx).unwrap();
        // for %j = %i to %i + 4
        let ub = AffineMap::new(1, 0, [AffineExpr::dim(0) + 4]);
        let inner = for_loop(&mut ctx, loc, &[i], AffineMap::identity(1), &[i], ub, 1);
        outer.push(&mut ctx, inner.op_ref());

        assert_eq!(inner.lower_bound_operands(&ctx), &[i]);
        assert_eq!(inner.upper_bound_operands(&ctx), &[i]);
        assert!(!inner.has_constant_bounds(&ctx));
        assert_eq!(verify(&ctx, outer.op_ref()), Ok(()));
    }

    #[test]
    fn non_positive_step_is_rejected() {
        let (mut ctx, loc) = setup();
        let l = for_constant(&mut ctx, loc, 0, 10, 0);
        let err = ctx.verify_invariants(l.op_ref()).unwrap_err();
        assert_eq!(
            err.message,
            "expected step to be representable as a positive signed integer"
        );
    }

    #[test]
    fn apply_folds_constant_and_identity_maps() {
        let (mut ctx, loc) = setup();
        let l = for_constant(&mut ctx, loc, 0, 4, 1);
        let iv = l.induction_var(&ctx).unwrap();

        let ident = apply(&mut ctx, loc, AffineMap::identity(1), &[iv]);
        l.push(&mut ctx, ident.op_ref());
        assert_eq!(
            fold_op(&mut ctx, ident.op_ref()),
            FoldOutcome::Replaced(smallvec::smallvec![FoldResult::Value(iv)])
        );

        let c4 = std_dialect::constant_index(&mut ctx, loc, 4);
        let c4v = ctx.op_result(c4.op_ref(), 0);
        let scaled = apply(
            &mut ctx,
            loc,
            AffineMap::new(1, 0, [AffineExpr::dim(0) * 3 + 1]),
            &[c4v],
        );
        assert_eq!(
            fold_op(&mut ctx, scaled.op_ref()),
            FoldOutcome::Replaced(smallvec::smallvec![FoldResult::Attribute(13i64.into())])
        );
    }

    #[test]
    fn terminator_needs_affine_parent() {
        let (mut ctx, loc) = setup();
        let data = OperationDataBuilder::new(loc, AFFINE(), TERMINATOR()).build(&mut ctx);
        let term = ctx.create_op(data);
        assert!(ctx.verify_invariants(term).is_err());
    }

    #[test]
    fn if_regions() {
        let (mut ctx, loc) = setup();
        let l = for_constant(&mut ctx, loc, 0, 4, 1);
        let iv = l.induction_var(&ctx).unwrap();
        let cond = AffineMap::new(1, 0, [AffineExpr::dim(0) - 2]);
        let branch = if_op(&mut ctx, loc, cond, &[iv], false);
        l.push(&mut ctx, branch.op_ref());
        assert!(branch.else_block(&ctx).is_none());
        assert_eq!(verify(&ctx, l.op_ref()), Ok(()));
    }

    #[test]
    fn malformed_ops_do_not_panic() {
        let (mut ctx, loc) = setup();
        let data = OperationDataBuilder::new(loc, AFFINE(), FOR()).build(&mut ctx);
        let bodiless = AffineFor::wrap_unchecked(ctx.create_op(data));
        assert_eq!(bodiless.body(&ctx), None);
        assert_eq!(bodiless.body_block(&ctx), None);
        assert_eq!(bodiless.induction_var(&ctx), None);
        let c = std_dialect::constant_index(&mut ctx, loc, 1);
        bodiless.push(&mut ctx, c.op_ref());
        assert_eq!(ctx.op_block(c.op_ref()), None);
        assert!(!crate::is_vectorizable_loop_body(&ctx, bodiless));

        // Two map inputs but a single operand.
        let cv = ctx.op_result(c.op_ref(), 0);
        let short = apply(
            &mut ctx,
            loc,
            AffineMap::new(2, 0, [AffineExpr::dim(0) + AffineExpr::dim(1)]),
            &[cv],
        );
        assert_eq!(fold_op(&mut ctx, short.op_ref()), FoldOutcome::NotFolded);
        assert!(ctx.verify_invariants(short.op_ref()).is_err());
    }
}
