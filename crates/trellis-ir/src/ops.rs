//! Typed operation wrappers.
//!
//! A [`DialectOp`] is a `Copy` newtype around [`OpRef`] that has been checked
//! to be of one particular kind. Wrappers are declared with [`define_op!`].

use derive_more::Display;

use crate::context::IrContext;
use crate::refs::OpRef;
use crate::symbol::Symbol;

/// Error when viewing an operation as a dialect-specific type.
#[derive(Debug, Clone, PartialEq, Eq, Display, derive_more::Error)]
pub enum ConversionError {
    /// Operation name doesn't match expected dialect.operation.
    #[display("expected operation {expected}, found {actual}")]
    WrongOperation {
        expected: &'static str,
        actual: String,
    },
    #[display("missing attribute `{_0}`")]
    MissingAttribute(#[error(not(source))] &'static str),
    #[display("attribute `{_0}` has the wrong kind")]
    WrongAttributeType(#[error(not(source))] &'static str),
    #[display("missing region")]
    MissingRegion,
}

/// Trait for typed operation wrappers.
pub trait DialectOp: Sized + Copy {
    const DIALECT_NAME: &'static str;
    const OP_NAME: &'static str;
    /// `dialect.name`.
    const FULL_NAME: &'static str;

    fn wrap_unchecked(op: OpRef) -> Self;
    fn op_ref(&self) -> OpRef;

    fn matches(ctx: &IrContext, op: OpRef) -> bool {
        ctx.op_is(
            op,
            Symbol::new(Self::DIALECT_NAME),
            Symbol::new(Self::OP_NAME),
        )
    }

    fn from_op(ctx: &IrContext, op: OpRef) -> Result<Self, ConversionError> {
        if Self::matches(ctx, op) {
            Ok(Self::wrap_unchecked(op))
        } else {
            Err(ConversionError::WrongOperation {
                expected: Self::FULL_NAME,
                actual: ctx.op_name(op),
            })
        }
    }
}

/// Declare a typed wrapper for one op kind.
///
/// # Example
/// ```
/// use trellis_ir::{define_op, DialectOp};
///
/// define_op! {
///     /// `test.noop`
///     pub struct NoopOp = "test"."noop";
/// }
///
/// assert_eq!(NoopOp::FULL_NAME, "test.noop");
/// ```
#[macro_export]
macro_rules! define_op {
    ($(#[$meta:meta])* $vis:vis struct $name:ident = $dialect:literal . $op:literal;) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        $vis struct $name($crate::OpRef);

        impl $crate::DialectOp for $name {
            const DIALECT_NAME: &'static str = $dialect;
            const OP_NAME: &'static str = $op;
            const FULL_NAME: &'static str = concat!($dialect, ".", $op);

            fn wrap_unchecked(op: $crate::OpRef) -> Self {
                Self(op)
            }

            fn op_ref(&self) -> $crate::OpRef {
                self.0
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::OperationDataBuilder;
    use crate::location::{Location, Span};

    define_op! {
        struct SampleOp = "test"."sample";
    }

    #[test]
    fn from_op_checks_kind() {
        let mut ctx = IrContext::new();
        let path = ctx.paths.intern("ops.mlir".to_owned());
        let loc = Location::new(path, Span::default());
        let sample = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new("sample"))
            .build(&mut ctx);
        let sample = ctx.create_op(sample);
        let other = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new("other"))
            .build(&mut ctx);
        let other = ctx.create_op(other);

        assert_eq!(SampleOp::from_op(&ctx, sample).map(|p| p.op_ref()), Ok(sample));
        let err = SampleOp::from_op(&ctx, other).unwrap_err();
        assert_eq!(err.to_string(), "expected operation test.sample, found test.other");
    }
}
