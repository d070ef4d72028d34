//! Affine loop dialects and analyses for trellis IR.
//!
//! Provides the `affine`, `std` and `vector` dialects and the analyses built
//! on them: trip counts, access invariance and contiguity, vectorizability
//! and shift validity of `affine.for` bodies.

pub mod affine_analysis;
pub mod dialect;
pub mod loop_analysis;

pub use affine_analysis::{
    AffineValueMap, canonicalize_map_and_operands, fully_compose_affine_map_and_operands,
    reachable_affine_apply_ops,
};
pub use dialect::affine::{AffineApply, AffineFor, AffineIf, AffineTerminator};
pub use loop_analysis::{
    Contiguity, TripCountMap, constant_trip_count, invariant_accesses, is_access_invariant,
    is_contiguous_access, is_shift_valid, is_vectorizable_loop_body,
    is_vectorizable_loop_body_along, is_vectorizable_loop_body_with, largest_trip_count_divisor,
    materialize_trip_count_map, trip_count_map,
};

use trellis_ir::OpRegistry;

/// Register the `affine`, `std` and `vector` dialects.
pub fn register_dialects(registry: &mut OpRegistry) {
    dialect::affine::register(registry);
    dialect::std::register(registry);
    dialect::vector::register(registry);
    tracing::debug!(ops = registry.len(), "registered affine dialects");
}
