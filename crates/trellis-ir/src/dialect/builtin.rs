//! `core` dialect: the top-level module and its terminator.

use crate::context::{BlockData, IrContext, OperationDataBuilder, RegionData};
use crate::define_op;
use crate::location::Location;
use crate::ops::DialectOp;
use crate::refs::{BlockRef, OpRef, RegionRef};
use crate::registry::{OpDescriptor, OpRegistry};
use crate::symbol::Symbol;
use crate::symbols;
use crate::traits::OpTrait;
use crate::types::Attribute;
use crate::verify::VerifyError;

symbols! {
    CORE => "core",
    MODULE => "module",
    MODULE_TERMINATOR => "module_terminator",
    ATTR_SYM_NAME => "sym_name",
}

define_op! {
    /// `core.module`: a named, isolated, single-block container.
    pub struct Module = "core"."module";
}

define_op! {
    /// `core.module_terminator`: implicit last op of a module body.
    pub struct ModuleTerminator = "core"."module_terminator";
}

pub(crate) fn register(registry: &mut OpRegistry) {
    registry.register(
        OpDescriptor::new(CORE(), MODULE())
            .with_traits([
                OpTrait::ZeroOperands,
                OpTrait::ZeroResults,
                OpTrait::IsolatedFromAbove,
            ])
            .with_verifier(verify_module),
    );
    registry.register(
        OpDescriptor::new(CORE(), MODULE_TERMINATOR())
            .with_traits([
                OpTrait::ZeroOperands,
                OpTrait::ZeroResults,
                OpTrait::IsTerminator,
                OpTrait::NoSideEffect,
            ])
            .with_verifier(verify_module_terminator),
    );
}

fn verify_module(ctx: &IrContext, op: OpRef) -> Result<(), VerifyError> {
    let regions = ctx.op_regions(op);
    if regions.len() != 1 || ctx.region_blocks(regions[0]).len() != 1 {
        return Err(VerifyError::new(
            ctx,
            op,
            "expected body region to have a single block",
        ));
    }
    if !ctx.block_args(ctx.region_blocks(regions[0])[0]).is_empty() {
        return Err(VerifyError::new(
            ctx,
            op,
            "expected body block to have no arguments",
        ));
    }
    Ok(())
}

fn verify_module_terminator(ctx: &IrContext, op: OpRef) -> Result<(), VerifyError> {
    match ctx.parent_op(op) {
        Some(parent) if Module::matches(ctx, parent) => Ok(()),
        _ => Err(VerifyError::new(ctx, op, "expects parent op 'core.module'")),
    }
}

/// Create a detached module whose body holds only its terminator.
pub fn module(ctx: &mut IrContext, location: Location, name: Symbol) -> Module {
    let block = ctx.create_block(BlockData::new(location, []));
    let terminator = OperationDataBuilder::new(location, CORE(), MODULE_TERMINATOR())
        .build(ctx);
    let terminator = ctx.create_op(terminator);
    ctx.push_op(block, terminator);
    let body = ctx.create_region(RegionData::new(location, [block]));

    let data = OperationDataBuilder::new(location, CORE(), MODULE())
        .attr(ATTR_SYM_NAME(), Attribute::Symbol(name))
        .region(body)
        .build(ctx);
    Module::wrap_unchecked(ctx.create_op(data))
}

impl Module {
    pub fn sym_name(&self, ctx: &IrContext) -> Option<Symbol> {
        ctx.op_attr(self.0, ATTR_SYM_NAME())
            .and_then(Attribute::as_symbol)
    }

    pub fn body(&self, ctx: &IrContext) -> RegionRef {
        ctx.op_regions(self.0)[0]
    }

    pub fn body_block(&self, ctx: &IrContext) -> BlockRef {
        ctx.region_blocks(self.body(ctx))[0]
    }

    /// Append `op` to the body, keeping the terminator last.
    pub fn push(&self, ctx: &mut IrContext, op: OpRef) {
        let block = self.body_block(ctx);
        match ctx.last_op(block) {
            Some(term) if ModuleTerminator::matches(ctx, term) => {
                ctx.insert_op_before(block, term, op)
            }
            _ => ctx.push_op(block, op),
        }
    }

    /// Body ops without the terminator.
    pub fn ops<'a>(self, ctx: &'a IrContext) -> impl Iterator<Item = OpRef> + 'a {
        ctx.block_ops(self.body_block(ctx))
            .filter(move |&op| !ModuleTerminator::matches(ctx, op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Span;
    use crate::verify::verify;

    fn loc(ctx: &mut IrContext) -> Location {
        let path = ctx.paths.intern("builtin.mlir".to_owned());
        Location::new(path, Span::default())
    }

    #[test]
    fn new_module_verifies() {
        let mut ctx = IrContext::new();
        let loc = loc(&mut ctx);
        let m = module(&mut ctx, loc, Symbol::new("m"));
        assert_eq!(m.sym_name(&ctx), Some(Symbol::new("m")));
        assert!(ctx.is_isolated_from_above(m.op_ref()));
        assert_eq!(verify(&ctx, m.op_ref()), Ok(()));
    }

    #[test]
    fn push_keeps_terminator_last() {
        let mut ctx = IrContext::new();
        let loc = loc(&mut ctx);
        let m = module(&mut ctx, loc, Symbol::new("m"));
        let inner = module(&mut ctx, loc, Symbol::new("inner"));
        m.push(&mut ctx, inner.op_ref());

        let block = m.body_block(&ctx);
        let last = ctx.last_op(block).unwrap();
        assert!(ModuleTerminator::matches(&ctx, last));
        assert_eq!(m.ops(&ctx).collect::<Vec<_>>(), vec![inner.op_ref()]);
        assert_eq!(verify(&ctx, m.op_ref()), Ok(()));
    }

    #[test]
    fn second_block_is_rejected() {
        let mut ctx = IrContext::new();
        let loc = loc(&mut ctx);
        let m = module(&mut ctx, loc, Symbol::new("m"));
        let extra = ctx.create_block(BlockData::new(loc, []));
        let body = m.body(&ctx);
        ctx.push_block(body, extra);

        let err = ctx.verify_invariants(m.op_ref()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "'core.module' op expected body region to have a single block"
        );
    }
}
