//! Trellis IR kernel.
//!
//! An arena-allocated graph of operations, blocks and regions with SSA
//! use-chains, plus the machinery that reasons about it: op kinds described
//! by registered trait lists, a verifier, dominance and post-dominance
//! analysis, and pure affine expression/map math used by loop analyses.
//!
//! All entities live in an [`IrContext`] and are addressed by `u32` handles
//! (`cranelift-entity`). The context is single-threaded.

// === IR graph ===
pub mod context;
pub mod location;
pub mod refs;
pub mod symbol;
pub mod types;
pub mod walk;

// === Op kinds ===
pub mod dialect;
pub mod fold;
pub mod ops;
pub mod registry;
pub mod traits;

// === Analyses and verification ===
pub mod affine;
pub mod diagnostics;
pub mod dominance;
pub mod verify;

// === Text form ===
pub mod asm;
pub mod printer;

// Re-export smallvec for use in macros and external crates
pub use smallvec;

pub use affine::{AffineExpr, AffineMap};
pub use context::{
    BlockArgData, BlockData, IrContext, OperationData, OperationDataBuilder, RegionData, Use,
    ValueData,
};
pub use diagnostics::{Diagnostic, DiagnosticEngine, Severity};
pub use dominance::{DominanceInfo, PostDominanceInfo};
pub use fold::{FoldHook, FoldOutcome, FoldResult, constant_operand, fold_op};
pub use location::{Location, Span};
pub use ops::{ConversionError, DialectOp};
pub use refs::{BlockRef, OpRef, PathRef, RegionRef, TypeRef, ValueDef, ValueRef};
pub use registry::{
    AccessKind, MemoryAccess, OpDescriptor, OpRegistry, TerminatorStatus, VerifyFn,
};
pub use symbol::Symbol;
pub use traits::{OpProperties, OpTrait};
pub use types::{Attribute, PathInterner, TypeData, TypeDataBuilder, TypeInterner};
pub use verify::{VerifyError, verify};
pub use walk::WalkAction;
