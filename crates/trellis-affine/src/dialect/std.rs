//! `std` dialect: constants, scalar arithmetic, memory access and branches.

use std::fmt;

use trellis_ir::asm::{
    OpAsmParser, ParseError, parse_binary_op, parse_cast_op, print_binary_op, print_cast_op,
};
use trellis_ir::printer::OpAsmPrinter;
use trellis_ir::{
    Attribute, BlockRef, DialectOp, FoldHook, FoldResult, IrContext, Location, MemoryAccess,
    OpDescriptor, OpRef, OpRegistry, OpTrait, OperationDataBuilder, Symbol, TypeRef, ValueRef,
    VerifyError, define_op, symbols,
};

symbols! {
    STD => "std",
    CONSTANT => "constant",
    ADDI => "addi",
    SUBI => "subi",
    MULI => "muli",
    ADDF => "addf",
    MULF => "mulf",
    CMPI => "cmpi",
    INDEX_CAST => "index_cast",
    LOAD => "load",
    STORE => "store",
    BR => "br",
    COND_BR => "cond_br",
    ATTR_VALUE => "value",
    ATTR_PREDICATE => "predicate",
}

define_op! {
    /// `std.constant`: materializes its `value` attribute.
    pub struct Constant = "std"."constant";
}

define_op! {
    pub struct AddI = "std"."addi";
}

define_op! {
    pub struct SubI = "std"."subi";
}

define_op! {
    pub struct MulI = "std"."muli";
}

define_op! {
    pub struct AddF = "std"."addf";
}

define_op! {
    pub struct MulF = "std"."mulf";
}

define_op! {
    /// `std.cmpi`: integer comparison producing an `i1`.
    pub struct CmpI = "std"."cmpi";
}

define_op! {
    /// `std.index_cast`: converts between `index` and a fixed-width integer.
    pub struct IndexCast = "std"."index_cast";
}

define_op! {
    /// `std.load %memref[%i, %j]`.
    pub struct Load = "std"."load";
}

define_op! {
    /// `std.store %value, %memref[%i, %j]`.
    pub struct Store = "std"."store";
}

define_op! {
    pub struct Br = "std"."br";
}

define_op! {
    /// `std.cond_br %cond, ^then(..), ^else(..)`.
    pub struct CondBr = "std"."cond_br";
}

/// Integer comparison predicates of `std.cmpi`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, derive_more::Display)]
pub enum CmpIPredicate {
    #[display("eq")]
    Eq,
    #[display("ne")]
    Ne,
    #[display("slt")]
    Slt,
    #[display("sle")]
    Sle,
    #[display("sgt")]
    Sgt,
    #[display("sge")]
    Sge,
}

impl CmpIPredicate {
    const ALL: [CmpIPredicate; 6] = [
        CmpIPredicate::Eq,
        CmpIPredicate::Ne,
        CmpIPredicate::Slt,
        CmpIPredicate::Sle,
        CmpIPredicate::Sgt,
        CmpIPredicate::Sge,
    ];

    pub fn from_symbol(sym: Symbol) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| sym.with_str(|s| s == p.to_string()))
    }

    pub fn symbol(self) -> Symbol {
        Symbol::from_dynamic(&self.to_string())
    }

    pub fn evaluate(self, lhs: i64, rhs: i64) -> bool {
        match self {
            CmpIPredicate::Eq => lhs == rhs,
            CmpIPredicate::Ne => lhs != rhs,
            CmpIPredicate::Slt => lhs < rhs,
            CmpIPredicate::Sle => lhs <= rhs,
            CmpIPredicate::Sgt => lhs > rhs,
            CmpIPredicate::Sge => lhs >= rhs,
        }
    }
}

pub(crate) fn register(registry: &mut OpRegistry) {
    registry.register(
        OpDescriptor::new(STD(), CONSTANT())
            .with_traits([
                OpTrait::ZeroOperands,
                OpTrait::OneResult,
                OpTrait::NoSideEffect,
                OpTrait::ConstantLike,
            ])
            .with_verifier(verify_constant)
            .with_asm(parse_constant, print_constant),
    );

    let int_binary = [
        OpTrait::NOperands(2),
        OpTrait::OneResult,
        OpTrait::SameOperandsAndResultType,
        OpTrait::OperandsAreIntegerLike,
        OpTrait::NoSideEffect,
    ];
    registry.register(
        OpDescriptor::new(STD(), ADDI())
            .with_traits(int_binary.into_iter().chain([OpTrait::Commutative]))
            .with_fold(FoldHook::Single(fold_addi))
            .with_asm(parse_binary_op, print_binary_op),
    );
    registry.register(
        OpDescriptor::new(STD(), SUBI())
            .with_traits(int_binary)
            .with_fold(FoldHook::Single(fold_subi))
            .with_asm(parse_binary_op, print_binary_op),
    );
    registry.register(
        OpDescriptor::new(STD(), MULI())
            .with_traits(int_binary.into_iter().chain([OpTrait::Commutative]))
            .with_fold(FoldHook::Single(fold_muli))
            .with_asm(parse_binary_op, print_binary_op),
    );

    for name in [ADDF(), MULF()] {
        registry.register(
            OpDescriptor::new(STD(), name)
                .with_traits([
                    OpTrait::NOperands(2),
                    OpTrait::OneResult,
                    OpTrait::SameOperandsAndResultType,
                    OpTrait::OperandsAreFloatLike,
                    OpTrait::Commutative,
                    OpTrait::NoSideEffect,
                ])
                .with_asm(parse_binary_op, print_binary_op),
        );
    }

    registry.register(
        OpDescriptor::new(STD(), CMPI())
            .with_traits([
                OpTrait::NOperands(2),
                OpTrait::OneResult,
                OpTrait::SameTypeOperands,
                OpTrait::OperandsAreIntegerLike,
                OpTrait::ResultsAreBoolLike,
                OpTrait::NoSideEffect,
            ])
            .with_verifier(verify_cmpi)
            .with_fold(FoldHook::Single(fold_cmpi)),
    );
    registry.register(
        OpDescriptor::new(STD(), INDEX_CAST())
            .with_traits([OpTrait::OneOperand, OpTrait::OneResult, OpTrait::NoSideEffect])
            .with_verifier(verify_index_cast)
            .with_asm(parse_cast_op, print_cast_op),
    );
    registry.register(
        OpDescriptor::new(STD(), LOAD())
            .with_traits([OpTrait::AtLeastNOperands(1), OpTrait::OneResult])
            .with_verifier(verify_load)
            .with_memory_access(MemoryAccess::read(0)),
    );
    registry.register(
        OpDescriptor::new(STD(), STORE())
            .with_traits([OpTrait::AtLeastNOperands(2), OpTrait::ZeroResults])
            .with_verifier(verify_store)
            .with_memory_access(MemoryAccess::write(1)),
    );
    registry.register(
        OpDescriptor::new(STD(), BR())
            .with_traits([
                OpTrait::VariadicOperands,
                OpTrait::ZeroResults,
                OpTrait::IsTerminator,
            ])
            .with_verifier(verify_br),
    );
    registry.register(
        OpDescriptor::new(STD(), COND_BR())
            .with_traits([
                OpTrait::AtLeastNOperands(1),
                OpTrait::ZeroResults,
                OpTrait::IsTerminator,
            ])
            .with_verifier(verify_cond_br),
    );
}

// ============================================================================
// Constants
// ============================================================================

fn verify_constant(ctx: &IrContext, op: OpRef) -> Result<(), VerifyError> {
    let ty = ctx.op_result_types(op)[0];
    match ctx.op_attr(op, ATTR_VALUE()) {
        None => Err(VerifyError::new(ctx, op, "requires a 'value' attribute")),
        Some(Attribute::IntBits(_)) if ctx.types.is_integer_like(ty) => Ok(()),
        Some(Attribute::Bool(_)) if ctx.types.is_bool_like(ty) => Ok(()),
        Some(Attribute::FloatBits(_)) if ctx.types.is_float_like(ty) => Ok(()),
        Some(_) => Err(VerifyError::new(
            ctx,
            op,
            "requires attribute's type to match op's return type",
        )),
    }
}

fn parse_constant(
    parser: &mut dyn OpAsmParser,
    builder: &mut OperationDataBuilder,
) -> Result<(), ParseError> {
    let value = parser.parse_attribute()?;
    parser.parse_optional_attr_dict(builder)?;
    parser.parse_punct(':')?;
    let ty = parser.parse_type()?;
    builder.insert_attr(ATTR_VALUE(), value);
    builder.push_result(ty);
    Ok(())
}

fn print_constant(p: &mut OpAsmPrinter<'_, '_>, op: OpRef) -> fmt::Result {
    let ctx = p.ctx();
    if let Some(value) = ctx.op_attr(op, ATTR_VALUE()) {
        p.write_str(" ")?;
        p.print_attribute(value)?;
    }
    p.print_optional_attr_dict(op, &[ATTR_VALUE()])?;
    p.write_str(" : ")?;
    p.print_type(ctx.op_result_types(op)[0])
}

/// Create a detached `std.constant` of type `ty`.
pub fn constant(ctx: &mut IrContext, location: Location, value: Attribute, ty: TypeRef) -> Constant {
    let data = OperationDataBuilder::new(location, STD(), CONSTANT())
        .attr(ATTR_VALUE(), value)
        .result(ty)
        .build(ctx);
    Constant::wrap_unchecked(ctx.create_op(data))
}

pub fn constant_int(ctx: &mut IrContext, location: Location, value: i64, width: u32) -> Constant {
    let ty = ctx.types.integer(width);
    constant(ctx, location, value.into(), ty)
}

pub fn constant_index(ctx: &mut IrContext, location: Location, value: i64) -> Constant {
    let ty = ctx.types.index();
    constant(ctx, location, value.into(), ty)
}

impl Constant {
    pub fn value<'a>(&self, ctx: &'a IrContext) -> Option<&'a Attribute> {
        ctx.op_attr(self.0, ATTR_VALUE())
    }

    pub fn result(&self, ctx: &IrContext) -> ValueRef {
        ctx.op_result(self.0, 0)
    }
}

/// The integer value of `v` when it is produced by a `std.constant`.
pub fn constant_int_value(ctx: &IrContext, v: ValueRef) -> Option<i64> {
    let def = ctx.defining_op(v)?;
    Constant::from_op(ctx, def).ok()?.value(ctx)?.as_int()
}

/// Materialize a folded attribute as a `std.constant` of type `ty`.
///
/// Returns `None` for attributes that cannot be held by a constant.
pub fn materialize_constant(
    ctx: &mut IrContext,
    location: Location,
    value: Attribute,
    ty: TypeRef,
) -> Option<Constant> {
    match value {
        Attribute::IntBits(_) | Attribute::Bool(_) | Attribute::FloatBits(_) => {
            Some(constant(ctx, location, value, ty))
        }
        _ => None,
    }
}

// ============================================================================
// Integer arithmetic folds
// ============================================================================

type IntOperands = (ValueRef, ValueRef, Option<i64>, Option<i64>);

fn int_operands(
    ctx: &IrContext,
    op: OpRef,
    constants: &[Option<Attribute>],
) -> Option<IntOperands> {
    let (&[lhs, rhs], [a, b]) = (ctx.op_operands(op), constants) else {
        return None;
    };
    let int = |c: &Option<Attribute>| c.as_ref().and_then(Attribute::as_int);
    Some((lhs, rhs, int(a), int(b)))
}

fn fold_addi(
    ctx: &mut IrContext,
    op: OpRef,
    constants: &[Option<Attribute>],
) -> Option<FoldResult> {
    match int_operands(ctx, op, constants)? {
        (_, _, Some(a), Some(b)) => Some(FoldResult::Attribute(a.wrapping_add(b).into())),
        (x, _, _, Some(0)) | (_, x, Some(0), _) => Some(FoldResult::Value(x)),
        _ => None,
    }
}

fn fold_subi(
    ctx: &mut IrContext,
    op: OpRef,
    constants: &[Option<Attribute>],
) -> Option<FoldResult> {
    match int_operands(ctx, op, constants)? {
        (_, _, Some(a), Some(b)) => Some(FoldResult::Attribute(a.wrapping_sub(b).into())),
        (x, _, _, Some(0)) => Some(FoldResult::Value(x)),
        (x, y, _, _) if x == y => Some(FoldResult::Attribute(0i64.into())),
        _ => None,
    }
}

fn fold_muli(
    ctx: &mut IrContext,
    op: OpRef,
    constants: &[Option<Attribute>],
) -> Option<FoldResult> {
    match int_operands(ctx, op, constants)? {
        (_, _, Some(a), Some(b)) => Some(FoldResult::Attribute(a.wrapping_mul(b).into())),
        (_, _, _, Some(0)) | (_, _, Some(0), _) => Some(FoldResult::Attribute(0i64.into())),
        (x, _, _, Some(1)) | (_, x, Some(1), _) => Some(FoldResult::Value(x)),
        _ => None,
    }
}

// ============================================================================
// Comparison and casts
// ============================================================================

fn verify_cmpi(ctx: &IrContext, op: OpRef) -> Result<(), VerifyError> {
    match ctx.op_attr(op, ATTR_PREDICATE()).and_then(Attribute::as_symbol) {
        Some(sym) if CmpIPredicate::from_symbol(sym).is_some() => Ok(()),
        _ => Err(VerifyError::new(
            ctx,
            op,
            "requires a 'predicate' attribute naming an integer comparison",
        )),
    }
}

fn fold_cmpi(
    ctx: &mut IrContext,
    op: OpRef,
    constants: &[Option<Attribute>],
) -> Option<FoldResult> {
    let predicate = CmpI::wrap_unchecked(op).predicate(ctx)?;
    let (x, y, lhs, rhs) = int_operands(ctx, op, constants)?;
    match (lhs, rhs) {
        (Some(a), Some(b)) => Some(FoldResult::Attribute(Attribute::Bool(
            predicate.evaluate(a, b),
        ))),
        _ if x == y => Some(FoldResult::Attribute(Attribute::Bool(
            predicate.evaluate(0, 0),
        ))),
        _ => None,
    }
}

/// Create a detached `std.cmpi` producing an `i1`.
pub fn cmpi(
    ctx: &mut IrContext,
    location: Location,
    predicate: CmpIPredicate,
    lhs: ValueRef,
    rhs: ValueRef,
) -> CmpI {
    let i1 = ctx.types.integer(1);
    let data = OperationDataBuilder::new(location, STD(), CMPI())
        .operands([lhs, rhs])
        .attr(ATTR_PREDICATE(), Attribute::Symbol(predicate.symbol()))
        .result(i1)
        .build(ctx);
    CmpI::wrap_unchecked(ctx.create_op(data))
}

impl CmpI {
    pub fn predicate(&self, ctx: &IrContext) -> Option<CmpIPredicate> {
        ctx.op_attr(self.0, ATTR_PREDICATE())
            .and_then(Attribute::as_symbol)
            .and_then(CmpIPredicate::from_symbol)
    }
}

fn verify_index_cast(ctx: &IrContext, op: OpRef) -> Result<(), VerifyError> {
    let from = ctx.value_ty(ctx.op_operand(op, 0));
    let to = ctx.op_result_types(op)[0];
    let types = &ctx.types;
    let ok = (types.is_index(from) && types.is_integer(to))
        || (types.is_integer(from) && types.is_index(to));
    if ok {
        Ok(())
    } else {
        Err(VerifyError::new(
            ctx,
            op,
            "operand and result must be an index and an integer type",
        ))
    }
}

// ============================================================================
// Binary op constructors
// ============================================================================

fn binary(
    ctx: &mut IrContext,
    location: Location,
    name: Symbol,
    lhs: ValueRef,
    rhs: ValueRef,
) -> OpRef {
    let ty = ctx.value_ty(lhs);
    let data = OperationDataBuilder::new(location, STD(), name)
        .operands([lhs, rhs])
        .result(ty)
        .build(ctx);
    ctx.create_op(data)
}

pub fn addi(ctx: &mut IrContext, location: Location, lhs: ValueRef, rhs: ValueRef) -> AddI {
    AddI::wrap_unchecked(binary(ctx, location, ADDI(), lhs, rhs))
}

pub fn subi(ctx: &mut IrContext, location: Location, lhs: ValueRef, rhs: ValueRef) -> SubI {
    SubI::wrap_unchecked(binary(ctx, location, SUBI(), lhs, rhs))
}

pub fn muli(ctx: &mut IrContext, location: Location, lhs: ValueRef, rhs: ValueRef) -> MulI {
    MulI::wrap_unchecked(binary(ctx, location, MULI(), lhs, rhs))
}

pub fn addf(ctx: &mut IrContext, location: Location, lhs: ValueRef, rhs: ValueRef) -> AddF {
    AddF::wrap_unchecked(binary(ctx, location, ADDF(), lhs, rhs))
}

pub fn mulf(ctx: &mut IrContext, location: Location, lhs: ValueRef, rhs: ValueRef) -> MulF {
    MulF::wrap_unchecked(binary(ctx, location, MULF(), lhs, rhs))
}

pub fn index_cast(ctx: &mut IrContext, location: Location, value: ValueRef, to: TypeRef) -> IndexCast {
    let data = OperationDataBuilder::new(location, STD(), INDEX_CAST())
        .operand(value)
        .result(to)
        .build(ctx);
    IndexCast::wrap_unchecked(ctx.create_op(data))
}

// ============================================================================
// Memory
// ============================================================================

/// Shared checks of loads and stores: `memref` is a memref whose rank matches
/// the number of `indices`, all of which are `index` typed.
fn verify_access(
    ctx: &IrContext,
    op: OpRef,
    memref: ValueRef,
    indices: &[ValueRef],
) -> Result<TypeRef, VerifyError> {
    let memref_ty = ctx.value_ty(memref);
    if !ctx.types.is_memref(memref_ty) {
        return Err(VerifyError::new(ctx, op, "expected a memref operand"));
    }
    let rank = ctx.types.shape(memref_ty).map_or(0, |s| s.len());
    if rank != indices.len() {
        return Err(VerifyError::new(
            ctx,
            op,
            format!(
                "incorrect number of indices: expected {rank}, found {}",
                indices.len()
            ),
        ));
    }
    if indices.iter().any(|&i| !ctx.types.is_index(ctx.value_ty(i))) {
        return Err(VerifyError::new(ctx, op, "index to load must have 'index' type"));
    }
    ctx.types
        .element_type(memref_ty)
        .ok_or_else(|| VerifyError::new(ctx, op, "memref has no element type"))
}

fn verify_load(ctx: &IrContext, op: OpRef) -> Result<(), VerifyError> {
    let access = MemoryAccess::read(0);
    let elem = verify_access(ctx, op, access.memref(ctx, op), access.indices(ctx, op))?;
    if ctx.op_result_types(op)[0] != elem {
        return Err(VerifyError::new(
            ctx,
            op,
            "result type must match element type of memref",
        ));
    }
    Ok(())
}

fn verify_store(ctx: &IrContext, op: OpRef) -> Result<(), VerifyError> {
    let access = MemoryAccess::write(1);
    let elem = verify_access(ctx, op, access.memref(ctx, op), access.indices(ctx, op))?;
    if ctx.value_ty(ctx.op_operand(op, 0)) != elem {
        return Err(VerifyError::new(
            ctx,
            op,
            "value type must match element type of memref",
        ));
    }
    Ok(())
}

pub fn load(ctx: &mut IrContext, location: Location, memref: ValueRef, indices: &[ValueRef]) -> Load {
    let memref_ty = ctx.value_ty(memref);
    let elem = ctx.types.element_type_or_self(memref_ty);
    let data = OperationDataBuilder::new(location, STD(), LOAD())
        .operand(memref)
        .operands(indices.iter().copied())
        .result(elem)
        .build(ctx);
    Load::wrap_unchecked(ctx.create_op(data))
}

pub fn store(
    ctx: &mut IrContext,
    location: Location,
    value: ValueRef,
    memref: ValueRef,
    indices: &[ValueRef],
) -> Store {
    let data = OperationDataBuilder::new(location, STD(), STORE())
        .operands([value, memref])
        .operands(indices.iter().copied())
        .build(ctx);
    Store::wrap_unchecked(ctx.create_op(data))
}

impl Load {
    pub fn memref(&self, ctx: &IrContext) -> ValueRef {
        ctx.op_operand(self.0, 0)
    }

    pub fn indices<'a>(&self, ctx: &'a IrContext) -> &'a [ValueRef] {
        &ctx.op_operands(self.0)[1..]
    }

    pub fn result(&self, ctx: &IrContext) -> ValueRef {
        ctx.op_result(self.0, 0)
    }
}

impl Store {
    pub fn value(&self, ctx: &IrContext) -> ValueRef {
        ctx.op_operand(self.0, 0)
    }

    pub fn memref(&self, ctx: &IrContext) -> ValueRef {
        ctx.op_operand(self.0, 1)
    }

    pub fn indices<'a>(&self, ctx: &'a IrContext) -> &'a [ValueRef] {
        &ctx.op_operands(self.0)[2..]
    }
}

// ============================================================================
// Branches
// ============================================================================

fn check_forwarded_types(ctx: &IrContext, op: OpRef) -> Result<(), VerifyError> {
    for (i, &succ) in ctx.op_successors(op).iter().enumerate() {
        let forwarded = ctx.successor_operands(op, i);
        let args = ctx.block_args(succ);
        let mismatch = forwarded
            .iter()
            .zip(args)
            .any(|(&v, &arg)| ctx.value_ty(v) != ctx.value_ty(arg));
        if mismatch {
            return Err(VerifyError::new(
                ctx,
                op,
                format!("type mismatch for bb argument #{i}"),
            ));
        }
    }
    Ok(())
}

fn verify_br(ctx: &IrContext, op: OpRef) -> Result<(), VerifyError> {
    if ctx.op_successors(op).len() != 1 {
        return Err(VerifyError::new(ctx, op, "requires exactly one successor"));
    }
    check_forwarded_types(ctx, op)
}

fn verify_cond_br(ctx: &IrContext, op: OpRef) -> Result<(), VerifyError> {
    if ctx.op_successors(op).len() != 2 {
        return Err(VerifyError::new(ctx, op, "requires exactly two successors"));
    }
    if ctx.non_successor_operands(op).len() != 1 {
        return Err(VerifyError::new(ctx, op, "requires a single condition operand"));
    }
    let cond_ty = ctx.value_ty(ctx.op_operand(op, 0));
    if ctx.types.integer_width(cond_ty) != Some(1) {
        return Err(VerifyError::new(ctx, op, "condition must be of type i1"));
    }
    check_forwarded_types(ctx, op)
}

pub fn br(
    ctx: &mut IrContext,
    location: Location,
    dest: BlockRef,
    operands: impl IntoIterator<Item = ValueRef>,
) -> Br {
    let data = OperationDataBuilder::new(location, STD(), BR())
        .successor_with_operands(dest, operands)
        .build(ctx);
    Br::wrap_unchecked(ctx.create_op(data))
}

pub fn cond_br(
    ctx: &mut IrContext,
    location: Location,
    condition: ValueRef,
    then_dest: (BlockRef, &[ValueRef]),
    else_dest: (BlockRef, &[ValueRef]),
) -> CondBr {
    let data = OperationDataBuilder::new(location, STD(), COND_BR())
        .operand(condition)
        .successor_with_operands(then_dest.0, then_dest.1.iter().copied())
        .successor_with_operands(else_dest.0, else_dest.1.iter().copied())
        .build(ctx);
    CondBr::wrap_unchecked(ctx.create_op(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;
    use trellis_ir::asm::{TokenCursor, parse_operation};
    use trellis_ir::printer::print_op;
    use trellis_ir::dialect::func;
    use trellis_ir::{BlockArgData, BlockData, FoldOutcome, RegionData, Span, fold_op};

    fn setup() -> (IrContext, Location) {
        let mut ctx = IrContext::new();
        crate::register_dialects(&mut ctx.registry);
        let path = ctx.paths.intern("std.mlir".to_owned());
        (ctx, Location::new(path, Span::default()))
    }

    fn folded(ctx: &mut IrContext, op: OpRef) -> Option<FoldResult> {
        match fold_op(ctx, op) {
            FoldOutcome::Replaced(mut results) => results.pop(),
            _ => None,
        }
    }

    #[test]
    fn integer_folds() {
        let (mut ctx, loc) = setup();
        let block = ctx.create_block(BlockData::new(loc, []));
        let i32_ty = ctx.types.integer(32);
        let x = ctx.add_block_arg(block, i32_ty);
        let c0 = constant_int(&mut ctx, loc, 0, 32).result(&ctx);
        let c1 = constant_int(&mut ctx, loc, 1, 32).result(&ctx);
        let c6 = constant_int(&mut ctx, loc, 6, 32).result(&ctx);
        let c7 = constant_int(&mut ctx, loc, 7, 32).result(&ctx);

        let sum = addi(&mut ctx, loc, c6, c7).op_ref();
        assert_eq!(folded(&mut ctx, sum), Some(FoldResult::Attribute(13i64.into())));
        let plus_zero = addi(&mut ctx, loc, c0, x).op_ref();
        assert_eq!(folded(&mut ctx, plus_zero), Some(FoldResult::Value(x)));
        let minus_self = subi(&mut ctx, loc, x, x).op_ref();
        assert_eq!(folded(&mut ctx, minus_self), Some(FoldResult::Attribute(0i64.into())));
        let times_one = muli(&mut ctx, loc, x, c1).op_ref();
        assert_eq!(folded(&mut ctx, times_one), Some(FoldResult::Value(x)));
        let times_zero = muli(&mut ctx, loc, x, c0).op_ref();
        assert_eq!(folded(&mut ctx, times_zero), Some(FoldResult::Attribute(0i64.into())));
        let opaque = muli(&mut ctx, loc, x, c6).op_ref();
        assert_eq!(fold_op(&mut ctx, opaque), FoldOutcome::NotFolded);
        let c6_op = ctx.defining_op(c6).unwrap();
        assert!(ctx.is_constant_like(c6_op));
        assert!(!ctx.is_constant_like(opaque));
    }

    #[test]
    fn cmpi_folds_on_constants() {
        let (mut ctx, loc) = setup();
        let a = constant_int(&mut ctx, loc, 3, 32).result(&ctx);
        let b = constant_int(&mut ctx, loc, 5, 32).result(&ctx);
        let lt = cmpi(&mut ctx, loc, CmpIPredicate::Slt, a, b);
        assert_eq!(lt.predicate(&ctx), Some(CmpIPredicate::Slt));
        assert_eq!(
            folded(&mut ctx, lt.op_ref()),
            Some(FoldResult::Attribute(Attribute::Bool(true)))
        );
        assert_eq!(ctx.verify_invariants(lt.op_ref()), Ok(()));
    }

    #[test]
    fn binary_traits_reject_mixed_types() {
        let (mut ctx, loc) = setup();
        let a = constant_int(&mut ctx, loc, 1, 32).result(&ctx);
        let b = constant_int(&mut ctx, loc, 1, 64).result(&ctx);
        let sum = addi(&mut ctx, loc, a, b);
        assert!(ctx.verify_invariants(sum.op_ref()).is_err());
        assert!(ctx.is_commutative(sum.op_ref()));
    }

    #[test]
    fn load_checks_rank_and_element_type() {
        let (mut ctx, loc) = setup();
        let f32_ty = ctx.types.float(32);
        let index = ctx.types.index();
        let memref_ty = ctx.types.memref(&[4, 8], f32_ty, Vec::new());
        let block = ctx.create_block(BlockData::new(
            loc,
            [
                BlockArgData::new(memref_ty),
                BlockArgData::new(index),
                BlockArgData::new(index),
            ],
        ));
        let args = ctx.block_args(block).to_vec();

        let good = load(&mut ctx, loc, args[0], &args[1..]);
        assert_eq!(ctx.verify_invariants(good.op_ref()), Ok(()));
        assert_eq!(good.indices(&ctx), &args[1..]);

        let short = load(&mut ctx, loc, args[0], &args[1..2]);
        let err = ctx.verify_invariants(short.op_ref()).unwrap_err();
        assert_eq!(err.message, "incorrect number of indices: expected 2, found 1");

        let value = good.result(&ctx);
        let st = store(&mut ctx, loc, value, args[0], &args[1..]);
        assert_eq!(ctx.verify_invariants(st.op_ref()), Ok(()));
        let access = ctx.memory_access(st.op_ref()).unwrap();
        assert_eq!(access.memref(&ctx, st.op_ref()), args[0]);
        assert_eq!(access.indices(&ctx, st.op_ref()), &args[1..]);
    }

    #[test]
    fn cond_br_needs_i1_condition() {
        let (mut ctx, loc) = setup();
        let i32_ty = ctx.types.integer(32);
        let entry = ctx.create_block(BlockData::new(loc, [BlockArgData::new(i32_ty)]));
        let exit = ctx.create_block(BlockData::new(loc, []));
        let _region = ctx.create_region(RegionData::new(loc, [entry, exit]));
        let arg = ctx.block_arg(entry, 0);
        let branch = cond_br(&mut ctx, loc, arg, (exit, &[]), (exit, &[]));
        ctx.push_op(entry, branch.op_ref());
        let err = ctx.verify_invariants(branch.op_ref()).unwrap_err();
        assert_eq!(err.message, "condition must be of type i1");
    }

    #[test]
    fn constant_and_binary_asm() {
        let (mut ctx, loc) = setup();
        let i32_ty = ctx.types.integer(32);
        let f = func::func(&mut ctx, loc, Symbol::new("f"), &[], &[i32_ty]);

        let (c, sum) = {
            let mut cursor = TokenCursor::from_text(
                &mut ctx,
                "%c = std.constant 42 : i32 %s = std.addi %c, %c : i32",
            )
            .unwrap();
            let c = parse_operation(&mut cursor, loc).unwrap();
            let sum = parse_operation(&mut cursor, loc).unwrap();
            assert!(cursor.is_at_end());
            (c, sum)
        };
        let entry = f.entry_block(&ctx);
        ctx.push_op(entry, c);
        ctx.push_op(entry, sum);
        let sum_value = ctx.op_result(sum, 0);
        let ret = func::r#return(&mut ctx, loc, [sum_value]);
        ctx.push_op(entry, ret.op_ref());

        assert_eq!(constant_int_value(&ctx, ctx.op_result(c, 0)), Some(42));
        assert_eq!(trellis_ir::verify(&ctx, f.op_ref()), Ok(()));
        assert_snapshot!(print_op(&ctx, f.op_ref()), @r"
        func.func @f() -> i32 {
          %0 = std.constant 42 : i32
          %1 = std.addi %0, %0 : i32
          func.return %1
        }
        ");
    }
}
