//! Dialects every context knows about: `core` and `func`.

pub mod builtin;
pub mod func;

use crate::registry::OpRegistry;

/// Register the `core` and `func` op kinds. Called by `IrContext::new`.
pub fn register_builtin_dialects(registry: &mut OpRegistry) {
    builtin::register(registry);
    func::register(registry);
}
