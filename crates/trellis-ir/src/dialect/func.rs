//! `func` dialect: functions and returns.

use crate::context::{BlockArgData, BlockData, IrContext, OperationDataBuilder, RegionData};
use crate::define_op;
use crate::location::Location;
use crate::ops::DialectOp;
use crate::refs::{BlockRef, OpRef, RegionRef, TypeRef, ValueRef};
use crate::registry::{OpDescriptor, OpRegistry};
use crate::symbol::Symbol;
use crate::symbols;
use crate::traits::OpTrait;
use crate::types::Attribute;
use crate::verify::VerifyError;

symbols! {
    FUNC => "func",
    RETURN => "return",
    ATTR_SYM_NAME => "sym_name",
    ATTR_TYPE => "type",
}

define_op! {
    /// `func.func`: an isolated function with a single body region whose
    /// entry block arguments are the parameters.
    pub struct Func = "func"."func";
}

define_op! {
    /// `func.return`: returns its operands from the enclosing function.
    pub struct Return = "func"."return";
}

pub(crate) fn register(registry: &mut OpRegistry) {
    registry.register(
        OpDescriptor::new(FUNC(), FUNC())
            .with_traits([
                OpTrait::ZeroOperands,
                OpTrait::ZeroResults,
                OpTrait::IsolatedFromAbove,
            ])
            .with_verifier(verify_func),
    );
    registry.register(
        OpDescriptor::new(FUNC(), RETURN())
            .with_traits([
                OpTrait::VariadicOperands,
                OpTrait::ZeroResults,
                OpTrait::IsTerminator,
            ])
            .with_verifier(verify_return),
    );
}

fn verify_func(ctx: &IrContext, op: OpRef) -> Result<(), VerifyError> {
    let func = Func::wrap_unchecked(op);
    let Some((inputs, _)) = func
        .function_type(ctx)
        .and_then(|ty| ctx.types.function_signature(ty))
    else {
        return Err(VerifyError::new(
            ctx,
            op,
            "requires a 'type' attribute of function type",
        ));
    };
    if func.sym_name(ctx).is_none() {
        return Err(VerifyError::new(ctx, op, "requires a 'sym_name' attribute"));
    }
    let Some(&body) = ctx.op_regions(op).first() else {
        return Err(VerifyError::new(ctx, op, "expected a body region"));
    };
    // External declarations have an empty body.
    let Some(entry) = ctx.entry_block(body) else {
        return Ok(());
    };
    let arg_types: Vec<TypeRef> = ctx
        .block_args(entry)
        .iter()
        .map(|&a| ctx.value_ty(a))
        .collect();
    if arg_types != inputs {
        return Err(VerifyError::new(
            ctx,
            op,
            "entry block argument types must match the function signature",
        ));
    }
    Ok(())
}

fn verify_return(ctx: &IrContext, op: OpRef) -> Result<(), VerifyError> {
    let Some(func) = ctx.parent_op(op).and_then(|p| Func::from_op(ctx, p).ok()) else {
        return Err(VerifyError::new(ctx, op, "expects parent op 'func.func'"));
    };
    let results = func
        .function_type(ctx)
        .and_then(|ty| ctx.types.function_signature(ty))
        .map(|(_, results)| results)
        .unwrap_or(&[]);
    let operands = ctx.op_operands(op);
    if operands.len() != results.len() {
        return Err(VerifyError::new(
            ctx,
            op,
            format!(
                "has {} operands, but enclosing function returns {}",
                operands.len(),
                results.len()
            ),
        ));
    }
    for (i, (&v, &expected)) in operands.iter().zip(results).enumerate() {
        if ctx.value_ty(v) != expected {
            return Err(VerifyError::new(
                ctx,
                op,
                format!("type of return operand {i} doesn't match function result type"),
            ));
        }
    }
    Ok(())
}

/// Create a detached function with an entry block taking `inputs`.
///
/// The body is left without a terminator; append a `func.return` once the
/// body is built.
pub fn func(
    ctx: &mut IrContext,
    location: Location,
    name: Symbol,
    inputs: &[TypeRef],
    results: &[TypeRef],
) -> Func {
    let func_ty = ctx.types.function(inputs, results);
    let entry = ctx.create_block(BlockData::new(
        location,
        inputs.iter().map(|&ty| BlockArgData::new(ty)),
    ));
    let body = ctx.create_region(RegionData::new(location, [entry]));
    let data = OperationDataBuilder::new(location, FUNC(), FUNC())
        .attr(ATTR_SYM_NAME(), Attribute::Symbol(name))
        .attr(ATTR_TYPE(), Attribute::Type(func_ty))
        .region(body)
        .build(ctx);
    Func::wrap_unchecked(ctx.create_op(data))
}

/// Create a detached `func.return`.
pub fn r#return(
    ctx: &mut IrContext,
    location: Location,
    values: impl IntoIterator<Item = ValueRef>,
) -> Return {
    let data = OperationDataBuilder::new(location, FUNC(), RETURN())
        .operands(values)
        .build(ctx);
    Return::wrap_unchecked(ctx.create_op(data))
}

impl Func {
    pub fn sym_name(&self, ctx: &IrContext) -> Option<Symbol> {
        ctx.op_attr(self.0, ATTR_SYM_NAME())
            .and_then(Attribute::as_symbol)
    }

    pub fn function_type(&self, ctx: &IrContext) -> Option<TypeRef> {
        ctx.op_attr(self.0, ATTR_TYPE()).and_then(Attribute::as_type)
    }

    pub fn body(&self, ctx: &IrContext) -> RegionRef {
        ctx.op_regions(self.0)[0]
    }

    pub fn entry_block(&self, ctx: &IrContext) -> BlockRef {
        ctx.region_blocks(self.body(ctx))[0]
    }

    pub fn arguments<'a>(&self, ctx: &'a IrContext) -> &'a [ValueRef] {
        ctx.block_args(self.entry_block(ctx))
    }
}

impl Return {
    pub fn values<'a>(&self, ctx: &'a IrContext) -> &'a [ValueRef] {
        ctx.op_operands(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Span;
    use crate::verify::verify;

    fn loc(ctx: &mut IrContext) -> Location {
        let path = ctx.paths.intern("func.mlir".to_owned());
        Location::new(path, Span::default())
    }

    #[test]
    fn identity_function_verifies() {
        let mut ctx = IrContext::new();
        let loc = loc(&mut ctx);
        let i32_ty = ctx.types.integer(32);
        let f = func(&mut ctx, loc, Symbol::new("id"), &[i32_ty], &[i32_ty]);
        let arg = f.arguments(&ctx)[0];
        let ret = r#return(&mut ctx, loc, [arg]);
        let entry = f.entry_block(&ctx);
        ctx.push_op(entry, ret.op_ref());

        assert_eq!(f.sym_name(&ctx), Some(Symbol::new("id")));
        assert_eq!(ret.values(&ctx), &[arg]);
        assert_eq!(verify(&ctx, f.op_ref()), Ok(()));
    }

    #[test]
    fn return_arity_mismatch() {
        let mut ctx = IrContext::new();
        let loc = loc(&mut ctx);
        let i32_ty = ctx.types.integer(32);
        let f = func(&mut ctx, loc, Symbol::new("f"), &[i32_ty], &[i32_ty]);
        let ret = r#return(&mut ctx, loc, []);
        let entry = f.entry_block(&ctx);
        ctx.push_op(entry, ret.op_ref());

        let err = verify(&ctx, f.op_ref()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "'func.return' op has 0 operands, but enclosing function returns 1"
        );
        assert!(ctx.diagnostics.has_errors());
    }

    #[test]
    fn return_type_mismatch() {
        let mut ctx = IrContext::new();
        let loc = loc(&mut ctx);
        let i32_ty = ctx.types.integer(32);
        let f32_ty = ctx.types.float(32);
        let f = func(&mut ctx, loc, Symbol::new("f"), &[i32_ty], &[f32_ty]);
        let arg = f.arguments(&ctx)[0];
        let ret = r#return(&mut ctx, loc, [arg]);
        let entry = f.entry_block(&ctx);
        ctx.push_op(entry, ret.op_ref());

        let err = verify(&ctx, f.op_ref()).unwrap_err();
        assert_eq!(
            err.message,
            "type of return operand 0 doesn't match function result type"
        );
    }

    #[test]
    fn return_outside_function() {
        let mut ctx = IrContext::new();
        let loc = loc(&mut ctx);
        let ret = r#return(&mut ctx, loc, []);
        let err = ctx.verify_invariants(ret.op_ref()).unwrap_err();
        assert_eq!(err.message, "expects parent op 'func.func'");
    }
}
