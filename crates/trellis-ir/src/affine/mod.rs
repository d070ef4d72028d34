//! Affine expression and map math.
//!
//! Pure value types with no reference to the IR graph; maps are stored in
//! operation attributes via [`crate::Attribute::AffineMap`].

mod expr;
mod map;

pub use expr::{
    AffineBinaryOp, AffineExpr, ceil_div, checked_ceil_div, checked_floor_div, floor_div, gcd,
    mod_floor,
};
pub use map::AffineMap;
