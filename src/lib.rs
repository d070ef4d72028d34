//! Trellis: an SSA IR kernel with affine loop analyses and a pass pipeline.
//!
//! The IR itself lives in `trellis-ir` and the affine dialects and analyses
//! in `trellis-affine`. This crate ties them together: [`new_context`]
//! builds a context with every dialect registered, [`pass`] defines the pass
//! interface, [`registry`] looks passes up by name and [`pipeline`] runs them
//! over a module.

pub mod pass;
pub mod passes;
pub mod pipeline;
pub mod registry;

pub use pass::{Pass, PassContext, PassKind};
pub use pipeline::{PassError, PassManager, PassManagerConfig, PipelineError};
pub use registry::{
    PassInfo, RegistryError, create_pass, initialize_pass_registry, register_pass,
    registered_passes, teardown_pass_registry,
};

pub use trellis_affine as affine;
pub use trellis_ir as ir;

use trellis_ir::IrContext;

/// A context with the builtin, `func`, `affine`, `std` and `vector` dialects
/// registered.
pub fn new_context() -> IrContext {
    let mut ctx = IrContext::new();
    trellis_affine::register_dialects(&mut ctx.registry);
    ctx
}

#[cfg(test)]
pub(crate) mod test_utils {
    use trellis_ir::dialect::builtin::{self, Module};
    use trellis_ir::dialect::func::{self, Func};
    use trellis_ir::{IrContext, Location, OpRef, Span, Symbol, TypeRef};

    pub fn location(ctx: &mut IrContext) -> Location {
        let path = ctx.paths.intern("test.mlir".to_owned());
        Location::new(path, Span::default())
    }

    pub fn setup() -> (IrContext, Location) {
        let mut ctx = crate::new_context();
        let loc = location(&mut ctx);
        (ctx, loc)
    }

    /// A detached `func.func @f` with an empty entry block.
    pub fn func_with_body(
        ctx: &mut IrContext,
        loc: Location,
        inputs: &[TypeRef],
        results: &[TypeRef],
    ) -> Func {
        func::func(ctx, loc, Symbol::new("f"), inputs, results)
    }

    pub fn module_with(
        ctx: &mut IrContext,
        loc: Location,
        ops: impl IntoIterator<Item = OpRef>,
    ) -> Module {
        let module = builtin::module(ctx, loc, Symbol::new("m"));
        for op in ops {
            module.push(ctx, op);
        }
        module
    }
}
