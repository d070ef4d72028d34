//! Affine expressions over dimension and symbol identifiers.
//!
//! Expressions are immutable trees. The arithmetic constructors (`+`, `*`,
//! [`AffineExpr::floor_div`], ...) apply local folding so that constants end
//! up on the right-hand side and trivially foldable subtrees never appear.
//! [`AffineExpr::simplify`] performs a deeper canonicalization through a
//! flattened linear form.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// Binary operator kinds of affine expressions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AffineBinaryOp {
    Add,
    Mul,
    Mod,
    FloorDiv,
    CeilDiv,
}

impl AffineBinaryOp {
    fn keyword(self) -> &'static str {
        match self {
            AffineBinaryOp::Add => "+",
            AffineBinaryOp::Mul => "*",
            AffineBinaryOp::Mod => "mod",
            AffineBinaryOp::FloorDiv => "floordiv",
            AffineBinaryOp::CeilDiv => "ceildiv",
        }
    }
}

/// An affine (or semi-affine) expression.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AffineExpr {
    /// Dimension identifier `dN`.
    Dim(u32),
    /// Symbol identifier `sN`.
    Symbol(u32),
    Constant(i64),
    Binary {
        op: AffineBinaryOp,
        lhs: Box<AffineExpr>,
        rhs: Box<AffineExpr>,
    },
}

/// Floor division rounding towards negative infinity.
///
/// `i64::MIN / -1` wraps; a zero divisor panics.
pub fn floor_div(lhs: i64, rhs: i64) -> i64 {
    let q = lhs.wrapping_div(rhs);
    if lhs.wrapping_rem(rhs) != 0 && ((lhs < 0) != (rhs < 0)) {
        q - 1
    } else {
        q
    }
}

/// Ceiling division rounding towards positive infinity.
pub fn ceil_div(lhs: i64, rhs: i64) -> i64 {
    let q = lhs.wrapping_div(rhs);
    if lhs.wrapping_rem(rhs) != 0 && ((lhs < 0) == (rhs < 0)) {
        q + 1
    } else {
        q
    }
}

/// [`floor_div`] returning `None` on a zero divisor or overflow.
pub fn checked_floor_div(lhs: i64, rhs: i64) -> Option<i64> {
    lhs.checked_div(rhs)?;
    Some(floor_div(lhs, rhs))
}

/// [`ceil_div`] returning `None` on a zero divisor or overflow.
pub fn checked_ceil_div(lhs: i64, rhs: i64) -> Option<i64> {
    lhs.checked_div(rhs)?;
    Some(ceil_div(lhs, rhs))
}

/// Modulo whose result is always non-negative for a positive divisor.
pub fn mod_floor(lhs: i64, rhs: i64) -> i64 {
    let r = lhs.wrapping_rem(rhs);
    if r < 0 { r.wrapping_add(rhs.wrapping_abs()) } else { r }
}

/// Greatest common divisor; `gcd(0, x) == x`.
pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

impl AffineExpr {
    pub const fn dim(pos: u32) -> Self {
        AffineExpr::Dim(pos)
    }

    pub const fn symbol(pos: u32) -> Self {
        AffineExpr::Symbol(pos)
    }

    pub const fn constant(value: i64) -> Self {
        AffineExpr::Constant(value)
    }

    fn binary(op: AffineBinaryOp, lhs: AffineExpr, rhs: AffineExpr) -> Self {
        AffineExpr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// The value of a constant expression.
    pub fn as_constant(&self) -> Option<i64> {
        match self {
            AffineExpr::Constant(c) => Some(*c),
            _ => None,
        }
    }

    /// True when no dimension identifier occurs in the expression.
    pub fn is_symbolic_or_constant(&self) -> bool {
        match self {
            AffineExpr::Dim(_) => false,
            AffineExpr::Symbol(_) | AffineExpr::Constant(_) => true,
            AffineExpr::Binary { lhs, rhs, .. } => {
                lhs.is_symbolic_or_constant() && rhs.is_symbolic_or_constant()
            }
        }
    }

    /// True when multiplications have a constant factor and divisions/modulo a
    /// constant right-hand side.
    pub fn is_pure_affine(&self) -> bool {
        match self {
            AffineExpr::Dim(_) | AffineExpr::Symbol(_) | AffineExpr::Constant(_) => true,
            AffineExpr::Binary { op, lhs, rhs } => {
                let operands_affine = lhs.is_pure_affine() && rhs.is_pure_affine();
                match op {
                    AffineBinaryOp::Add => operands_affine,
                    AffineBinaryOp::Mul => {
                        operands_affine
                            && (lhs.as_constant().is_some() || rhs.as_constant().is_some())
                    }
                    AffineBinaryOp::Mod | AffineBinaryOp::FloorDiv | AffineBinaryOp::CeilDiv => {
                        operands_affine && rhs.as_constant().is_some()
                    }
                }
            }
        }
    }

    pub fn floor_div(self, rhs: impl Into<AffineExpr>) -> Self {
        let rhs = rhs.into();
        if let Some(c) = rhs.as_constant()
            && c != 0
        {
            if let Some(l) = self.as_constant()
                && let Some(q) = checked_floor_div(l, c)
            {
                return AffineExpr::Constant(q);
            }
            if c == 1 {
                return self;
            }
            if let Some((inner, factor)) = self.as_scaled()
                && factor.checked_rem(c) == Some(0)
                && let Some(q) = factor.checked_div(c)
            {
                return inner.clone() * q;
            }
        }
        Self::binary(AffineBinaryOp::FloorDiv, self, rhs)
    }

    pub fn ceil_div(self, rhs: impl Into<AffineExpr>) -> Self {
        let rhs = rhs.into();
        if let Some(c) = rhs.as_constant()
            && c != 0
        {
            if let Some(l) = self.as_constant()
                && let Some(q) = checked_ceil_div(l, c)
            {
                return AffineExpr::Constant(q);
            }
            if c == 1 {
                return self;
            }
            if let Some((inner, factor)) = self.as_scaled()
                && factor.checked_rem(c) == Some(0)
                && let Some(q) = factor.checked_div(c)
            {
                return inner.clone() * q;
            }
        }
        Self::binary(AffineBinaryOp::CeilDiv, self, rhs)
    }

    pub fn modulo(self, rhs: impl Into<AffineExpr>) -> Self {
        let rhs = rhs.into();
        if let Some(c) = rhs.as_constant()
            && c > 0
        {
            if let Some(l) = self.as_constant() {
                return AffineExpr::Constant(mod_floor(l, c));
            }
            if c == 1 {
                return AffineExpr::Constant(0);
            }
            if let Some((_, factor)) = self.as_scaled()
                && factor.checked_rem(c) == Some(0)
            {
                return AffineExpr::Constant(0);
            }
        }
        Self::binary(AffineBinaryOp::Mod, self, rhs)
    }

    /// Matches `x * c` with a constant `c`.
    fn as_scaled(&self) -> Option<(&AffineExpr, i64)> {
        match self {
            AffineExpr::Binary {
                op: AffineBinaryOp::Mul,
                lhs,
                rhs,
            } => rhs.as_constant().map(|c| (lhs.as_ref(), c)),
            _ => None,
        }
    }

    fn simplify_add(lhs: AffineExpr, rhs: AffineExpr) -> AffineExpr {
        match (lhs.as_constant(), rhs.as_constant()) {
            (Some(l), Some(r)) => {
                if let Some(sum) = l.checked_add(r) {
                    return AffineExpr::Constant(sum);
                }
            }
            (Some(_), None) => return Self::simplify_add(rhs, lhs),
            (None, Some(0)) => return lhs,
            (None, Some(r)) => {
                if let AffineExpr::Binary {
                    op: AffineBinaryOp::Add,
                    lhs: inner,
                    rhs: inner_rhs,
                } = &lhs
                    && let Some(l) = inner_rhs.as_constant()
                    && let Some(sum) = l.checked_add(r)
                {
                    return Self::simplify_add(inner.as_ref().clone(), AffineExpr::Constant(sum));
                }
            }
            (None, None) => {}
        }
        Self::binary(AffineBinaryOp::Add, lhs, rhs)
    }

    fn simplify_mul(lhs: AffineExpr, rhs: AffineExpr) -> AffineExpr {
        match (lhs.as_constant(), rhs.as_constant()) {
            (Some(l), Some(r)) => {
                if let Some(product) = l.checked_mul(r) {
                    return AffineExpr::Constant(product);
                }
            }
            (Some(_), None) => return Self::simplify_mul(rhs, lhs),
            (None, Some(0)) => return AffineExpr::Constant(0),
            (None, Some(1)) => return lhs,
            (None, Some(r)) => {
                if let Some((inner, factor)) = lhs.as_scaled()
                    && let Some(product) = factor.checked_mul(r)
                {
                    return Self::simplify_mul(inner.clone(), AffineExpr::Constant(product));
                }
            }
            (None, None) => {}
        }
        Self::binary(AffineBinaryOp::Mul, lhs, rhs)
    }

    /// Whether dimension `pos` occurs in the expression.
    pub fn is_function_of_dim(&self, pos: u32) -> bool {
        match self {
            AffineExpr::Dim(d) => *d == pos,
            AffineExpr::Symbol(_) | AffineExpr::Constant(_) => false,
            AffineExpr::Binary { lhs, rhs, .. } => {
                lhs.is_function_of_dim(pos) || rhs.is_function_of_dim(pos)
            }
        }
    }

    /// Whether symbol `pos` occurs in the expression.
    pub fn is_function_of_symbol(&self, pos: u32) -> bool {
        match self {
            AffineExpr::Symbol(s) => *s == pos,
            AffineExpr::Dim(_) | AffineExpr::Constant(_) => false,
            AffineExpr::Binary { lhs, rhs, .. } => {
                lhs.is_function_of_symbol(pos) || rhs.is_function_of_symbol(pos)
            }
        }
    }

    /// Largest integer known to divide every value of the expression.
    ///
    /// A result of `0` means the expression is identically zero.
    pub fn largest_known_divisor(&self) -> u64 {
        match self {
            AffineExpr::Dim(_) | AffineExpr::Symbol(_) => 1,
            AffineExpr::Constant(c) => c.unsigned_abs(),
            AffineExpr::Binary { op, lhs, rhs } => match op {
                AffineBinaryOp::Mul => lhs
                    .largest_known_divisor()
                    .saturating_mul(rhs.largest_known_divisor()),
                AffineBinaryOp::Add | AffineBinaryOp::Mod => {
                    gcd(lhs.largest_known_divisor(), rhs.largest_known_divisor())
                }
                AffineBinaryOp::FloorDiv | AffineBinaryOp::CeilDiv => match rhs.as_constant() {
                    Some(c) if c > 0 => {
                        let divisor = lhs.largest_known_divisor();
                        match divisor.checked_rem(c.unsigned_abs()) {
                            Some(0) => divisor / c.unsigned_abs(),
                            _ => 1,
                        }
                    }
                    _ => 1,
                },
            },
        }
    }

    /// Substitute dimensions and symbols by position.
    ///
    /// Identifiers beyond the replacement slices are kept as-is. The result is
    /// rebuilt through the folding constructors.
    pub fn replace_dims_and_symbols(&self, dims: &[AffineExpr], syms: &[AffineExpr]) -> Self {
        match self {
            AffineExpr::Dim(d) => dims.get(*d as usize).cloned().unwrap_or(AffineExpr::Dim(*d)),
            AffineExpr::Symbol(s) => syms
                .get(*s as usize)
                .cloned()
                .unwrap_or(AffineExpr::Symbol(*s)),
            AffineExpr::Constant(_) => self.clone(),
            AffineExpr::Binary { op, lhs, rhs } => {
                let lhs = lhs.replace_dims_and_symbols(dims, syms);
                let rhs = rhs.replace_dims_and_symbols(dims, syms);
                match op {
                    AffineBinaryOp::Add => lhs + rhs,
                    AffineBinaryOp::Mul => lhs * rhs,
                    AffineBinaryOp::Mod => lhs.modulo(rhs),
                    AffineBinaryOp::FloorDiv => lhs.floor_div(rhs),
                    AffineBinaryOp::CeilDiv => lhs.ceil_div(rhs),
                }
            }
        }
    }

    /// Evaluate with concrete dimension and symbol values.
    ///
    /// Returns `None` on out-of-range identifiers, division by zero or overflow.
    pub fn evaluate(&self, dims: &[i64], syms: &[i64]) -> Option<i64> {
        match self {
            AffineExpr::Dim(d) => dims.get(*d as usize).copied(),
            AffineExpr::Symbol(s) => syms.get(*s as usize).copied(),
            AffineExpr::Constant(c) => Some(*c),
            AffineExpr::Binary { op, lhs, rhs } => {
                let l = lhs.evaluate(dims, syms)?;
                let r = rhs.evaluate(dims, syms)?;
                match op {
                    AffineBinaryOp::Add => l.checked_add(r),
                    AffineBinaryOp::Mul => l.checked_mul(r),
                    AffineBinaryOp::Mod if r > 0 => Some(mod_floor(l, r)),
                    AffineBinaryOp::FloorDiv => checked_floor_div(l, r),
                    AffineBinaryOp::CeilDiv => checked_ceil_div(l, r),
                    AffineBinaryOp::Mod => None,
                }
            }
        }
    }

    /// Canonicalize through a flattened linear form.
    ///
    /// Like terms are merged, dimensions come first (ascending), then
    /// symbols, then non-linear terms, then the constant. Divisions and
    /// modulo by a constant that divides every coefficient are resolved.
    pub fn simplify(&self) -> Self {
        Linear::flatten(self).into_expr()
    }
}

impl From<i64> for AffineExpr {
    fn from(value: i64) -> Self {
        AffineExpr::Constant(value)
    }
}

impl Add for AffineExpr {
    type Output = AffineExpr;

    fn add(self, rhs: AffineExpr) -> AffineExpr {
        AffineExpr::simplify_add(self, rhs)
    }
}

impl Add<i64> for AffineExpr {
    type Output = AffineExpr;

    fn add(self, rhs: i64) -> AffineExpr {
        AffineExpr::simplify_add(self, AffineExpr::Constant(rhs))
    }
}

impl Mul for AffineExpr {
    type Output = AffineExpr;

    fn mul(self, rhs: AffineExpr) -> AffineExpr {
        AffineExpr::simplify_mul(self, rhs)
    }
}

impl Mul<i64> for AffineExpr {
    type Output = AffineExpr;

    fn mul(self, rhs: i64) -> AffineExpr {
        AffineExpr::simplify_mul(self, AffineExpr::Constant(rhs))
    }
}

impl Neg for AffineExpr {
    type Output = AffineExpr;

    fn neg(self) -> AffineExpr {
        self * -1
    }
}

impl Sub for AffineExpr {
    type Output = AffineExpr;

    fn sub(self, rhs: AffineExpr) -> AffineExpr {
        self + (-rhs)
    }
}

impl Sub<i64> for AffineExpr {
    type Output = AffineExpr;

    fn sub(self, rhs: i64) -> AffineExpr {
        match rhs.checked_neg() {
            Some(neg) => self + neg,
            None => self - AffineExpr::Constant(rhs),
        }
    }
}

impl fmt::Display for AffineExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AffineExpr::Dim(d) => write!(f, "d{d}"),
            AffineExpr::Symbol(s) => write!(f, "s{s}"),
            AffineExpr::Constant(c) => write!(f, "{c}"),
            AffineExpr::Binary {
                op: AffineBinaryOp::Add,
                lhs,
                rhs,
            } => {
                write!(f, "{lhs}")?;
                if let Some(c) = rhs.as_constant()
                    && c < 0
                {
                    return write!(f, " - {}", c.unsigned_abs());
                }
                if let Some((negated, -1)) = rhs.as_scaled() {
                    f.write_str(" - ")?;
                    return write_operand(f, negated, matches!(negated, AffineExpr::Binary { .. }));
                }
                f.write_str(" + ")?;
                write_operand(
                    f,
                    rhs,
                    matches!(
                        rhs.as_ref(),
                        AffineExpr::Binary {
                            op: AffineBinaryOp::Add,
                            ..
                        }
                    ),
                )
            }
            AffineExpr::Binary { op, lhs, rhs } => {
                write_operand(
                    f,
                    lhs,
                    matches!(
                        lhs.as_ref(),
                        AffineExpr::Binary {
                            op: AffineBinaryOp::Add,
                            ..
                        }
                    ),
                )?;
                write!(f, " {} ", op.keyword())?;
                write_operand(f, rhs, matches!(rhs.as_ref(), AffineExpr::Binary { .. }))
            }
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &AffineExpr, parens: bool) -> fmt::Result {
    if parens {
        write!(f, "({expr})")
    } else {
        write!(f, "{expr}")
    }
}

// ============================================================================
// Linear form
// ============================================================================

/// `sum(coeff * id) + sum(coeff * term) + constant`, where terms are
/// non-linear subexpressions kept opaque.
#[derive(Clone, Debug, Default)]
struct Linear {
    dims: BTreeMap<u32, i64>,
    syms: BTreeMap<u32, i64>,
    terms: Vec<(AffineExpr, i64)>,
    constant: i64,
}

impl Linear {
    fn constant(value: i64) -> Self {
        Linear {
            constant: value,
            ..Default::default()
        }
    }

    fn opaque(expr: AffineExpr) -> Self {
        Linear {
            terms: vec![(expr, 1)],
            ..Default::default()
        }
    }

    fn as_constant(&self) -> Option<i64> {
        (self.dims.is_empty() && self.syms.is_empty() && self.terms.is_empty())
            .then_some(self.constant)
    }

    fn flatten(expr: &AffineExpr) -> Self {
        match expr {
            AffineExpr::Dim(d) => Linear {
                dims: BTreeMap::from([(*d, 1)]),
                ..Default::default()
            },
            AffineExpr::Symbol(s) => Linear {
                syms: BTreeMap::from([(*s, 1)]),
                ..Default::default()
            },
            AffineExpr::Constant(c) => Linear::constant(*c),
            AffineExpr::Binary { op, lhs, rhs } => {
                let lhs = Linear::flatten(lhs);
                let rhs = Linear::flatten(rhs);
                match op {
                    AffineBinaryOp::Add => lhs.add(rhs),
                    AffineBinaryOp::Mul => match (lhs.as_constant(), rhs.as_constant()) {
                        (_, Some(c)) => lhs.scale(c),
                        (Some(c), None) => rhs.scale(c),
                        (None, None) => Linear::opaque(lhs.into_expr() * rhs.into_expr()),
                    },
                    AffineBinaryOp::FloorDiv | AffineBinaryOp::CeilDiv | AffineBinaryOp::Mod => {
                        Linear::divide(*op, lhs, rhs)
                    }
                }
            }
        }
    }

    fn divide(op: AffineBinaryOp, lhs: Linear, rhs: Linear) -> Linear {
        let Some(c) = rhs.as_constant().filter(|c| *c > 0) else {
            let lhs = lhs.into_expr();
            let rhs = rhs.into_expr();
            return Linear::opaque(match op {
                AffineBinaryOp::FloorDiv => lhs.floor_div(rhs),
                AffineBinaryOp::CeilDiv => lhs.ceil_div(rhs),
                _ => lhs.modulo(rhs),
            });
        };
        if let Some(value) = lhs.as_constant() {
            return Linear::constant(match op {
                AffineBinaryOp::FloorDiv => floor_div(value, c),
                AffineBinaryOp::CeilDiv => ceil_div(value, c),
                _ => mod_floor(value, c),
            });
        }
        if lhs.content_gcd() % c.unsigned_abs() == 0 {
            return match op {
                AffineBinaryOp::Mod => Linear::constant(0),
                _ => lhs.div_exact(c),
            };
        }
        let lhs = lhs.into_expr();
        Linear::opaque(match op {
            AffineBinaryOp::FloorDiv => lhs.floor_div(c),
            AffineBinaryOp::CeilDiv => lhs.ceil_div(c),
            _ => lhs.modulo(c),
        })
    }

    fn add(mut self, other: Linear) -> Self {
        for (d, c) in other.dims {
            let coeff = self.dims.entry(d).or_default();
            *coeff = coeff.wrapping_add(c);
        }
        for (s, c) in other.syms {
            let coeff = self.syms.entry(s).or_default();
            *coeff = coeff.wrapping_add(c);
        }
        for (term, c) in other.terms {
            match self.terms.iter_mut().find(|(t, _)| *t == term) {
                Some((_, existing)) => *existing = existing.wrapping_add(c),
                None => self.terms.push((term, c)),
            }
        }
        self.constant = self.constant.wrapping_add(other.constant);
        self.prune()
    }

    fn scale(mut self, factor: i64) -> Self {
        self.dims.values_mut().for_each(|c| *c = c.wrapping_mul(factor));
        self.syms.values_mut().for_each(|c| *c = c.wrapping_mul(factor));
        self.terms
            .iter_mut()
            .for_each(|(_, c)| *c = c.wrapping_mul(factor));
        self.constant = self.constant.wrapping_mul(factor);
        self.prune()
    }

    fn prune(mut self) -> Self {
        self.dims.retain(|_, c| *c != 0);
        self.syms.retain(|_, c| *c != 0);
        self.terms.retain(|(_, c)| *c != 0);
        self
    }

    fn content_gcd(&self) -> u64 {
        self.dims
            .values()
            .chain(self.syms.values())
            .chain(self.terms.iter().map(|(_, c)| c))
            .chain(std::iter::once(&self.constant))
            .fold(0, |acc, c| gcd(acc, c.unsigned_abs()))
    }

    fn div_exact(mut self, divisor: i64) -> Self {
        self.dims.values_mut().for_each(|c| *c /= divisor);
        self.syms.values_mut().for_each(|c| *c /= divisor);
        self.terms.iter_mut().for_each(|(_, c)| *c /= divisor);
        self.constant /= divisor;
        self
    }

    fn into_expr(self) -> AffineExpr {
        let ids = self
            .dims
            .into_iter()
            .map(|(d, c)| (AffineExpr::Dim(d), c))
            .chain(self.syms.into_iter().map(|(s, c)| (AffineExpr::Symbol(s), c)))
            .chain(self.terms);
        let mut acc: Option<AffineExpr> = None;
        for (expr, coeff) in ids {
            let term = expr * coeff;
            acc = Some(match acc {
                Some(prev) => prev + term,
                None => term,
            });
        }
        match acc {
            Some(expr) => expr + self.constant,
            None => AffineExpr::Constant(self.constant),
        }
    }
}
