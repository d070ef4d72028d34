//! Multi-result affine maps `(d0, ..)[s0, ..] -> (e0, ..)`.

use std::fmt;

use smallvec::SmallVec;

use super::expr::AffineExpr;

/// An affine map from `num_dims` dimensions and `num_symbols` symbols to a
/// list of result expressions.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AffineMap {
    num_dims: u32,
    num_symbols: u32,
    results: SmallVec<[AffineExpr; 2]>,
}

impl AffineMap {
    pub fn new(
        num_dims: u32,
        num_symbols: u32,
        results: impl IntoIterator<Item = AffineExpr>,
    ) -> Self {
        Self {
            num_dims,
            num_symbols,
            results: results.into_iter().collect(),
        }
    }

    /// `() -> (value)`.
    pub fn constant(value: i64) -> Self {
        Self::new(0, 0, [AffineExpr::Constant(value)])
    }

    /// `(d0, .., dn-1) -> (d0, .., dn-1)`.
    pub fn identity(num_dims: u32) -> Self {
        Self::new(num_dims, 0, (0..num_dims).map(AffineExpr::Dim))
    }

    pub fn num_dims(&self) -> u32 {
        self.num_dims
    }

    pub fn num_symbols(&self) -> u32 {
        self.num_symbols
    }

    /// Number of operands the map consumes: dimensions then symbols.
    pub fn num_inputs(&self) -> u32 {
        self.num_dims + self.num_symbols
    }

    pub fn num_results(&self) -> usize {
        self.results.len()
    }

    pub fn results(&self) -> &[AffineExpr] {
        &self.results
    }

    pub fn result(&self, idx: usize) -> &AffineExpr {
        &self.results[idx]
    }

    pub fn is_identity(&self) -> bool {
        self.num_symbols == 0
            && self.results.len() == self.num_dims as usize
            && self
                .results
                .iter()
                .enumerate()
                .all(|(i, r)| *r == AffineExpr::Dim(i as u32))
    }

    /// The value of a single-result constant map.
    pub fn single_constant(&self) -> Option<i64> {
        match self.results.as_slice() {
            [only] => only.as_constant(),
            _ => None,
        }
    }

    /// All results as constants, if every result is constant.
    pub fn constant_results(&self) -> Option<SmallVec<[i64; 2]>> {
        self.results.iter().map(AffineExpr::as_constant).collect()
    }

    /// Map with the same inputs restricted to the results at `positions`.
    pub fn sub_map(&self, positions: impl IntoIterator<Item = usize>) -> Self {
        Self::new(
            self.num_dims,
            self.num_symbols,
            positions.into_iter().map(|p| self.results[p].clone()),
        )
    }

    /// Whether result `result` depends on input `input` (dims first, then symbols).
    pub fn is_function_of_input(&self, result: usize, input: u32) -> bool {
        let expr = &self.results[result];
        if input < self.num_dims {
            expr.is_function_of_dim(input)
        } else {
            expr.is_function_of_symbol(input - self.num_dims)
        }
    }

    /// Substitute every result's identifiers and reset the input counts.
    pub fn replace_dims_and_symbols(
        &self,
        dims: &[AffineExpr],
        syms: &[AffineExpr],
        num_dims: u32,
        num_symbols: u32,
    ) -> Self {
        Self::new(
            num_dims,
            num_symbols,
            self.results
                .iter()
                .map(|r| r.replace_dims_and_symbols(dims, syms)),
        )
    }

    /// `self ∘ inner`: feed `inner`'s results into `self`'s dimensions.
    ///
    /// The composed map takes `inner`'s dimensions, followed by `self`'s
    /// symbols and then `inner`'s symbols.
    ///
    /// # Panics
    ///
    /// Panics if `inner` does not produce exactly `self.num_dims()` results.
    pub fn compose(&self, inner: &AffineMap) -> Self {
        assert_eq!(
            inner.num_results(),
            self.num_dims as usize,
            "compose: inner map produces {} results but outer map has {} dimensions",
            inner.num_results(),
            self.num_dims,
        );
        let inner_dims: Vec<AffineExpr> = (0..inner.num_dims).map(AffineExpr::Dim).collect();
        let shifted_syms: Vec<AffineExpr> = (0..inner.num_symbols)
            .map(|s| AffineExpr::Symbol(s + self.num_symbols))
            .collect();
        let dim_replacements: Vec<AffineExpr> = inner
            .results
            .iter()
            .map(|r| r.replace_dims_and_symbols(&inner_dims, &shifted_syms))
            .collect();
        self.replace_dims_and_symbols(
            &dim_replacements,
            &[],
            inner.num_dims,
            self.num_symbols + inner.num_symbols,
        )
    }

    /// Simplify every result expression.
    pub fn simplify(&self) -> Self {
        Self::new(
            self.num_dims,
            self.num_symbols,
            self.results.iter().map(AffineExpr::simplify),
        )
    }

    /// Evaluate all results with concrete inputs.
    pub fn evaluate(&self, dims: &[i64], syms: &[i64]) -> Option<SmallVec<[i64; 2]>> {
        self.results.iter().map(|r| r.evaluate(dims, syms)).collect()
    }
}

impl fmt::Display for AffineMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for d in 0..self.num_dims {
            if d > 0 {
                f.write_str(", ")?;
            }
            write!(f, "d{d}")?;
        }
        f.write_str(")")?;
        if self.num_symbols > 0 {
            f.write_str("[")?;
            for s in 0..self.num_symbols {
                if s > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "s{s}")?;
            }
            f.write_str("]")?;
        }
        f.write_str(" -> (")?;
        for (i, r) in self.results.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{r}")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(pos: u32) -> AffineExpr {
        AffineExpr::dim(pos)
    }

    fn s(pos: u32) -> AffineExpr {
        AffineExpr::symbol(pos)
    }

    #[test]
    fn identity_and_constant_maps() {
        assert!(AffineMap::identity(2).is_identity());
        assert!(!AffineMap::new(2, 0, [d(1), d(0)]).is_identity());
        assert!(!AffineMap::new(1, 1, [d(0)]).is_identity());
        assert_eq!(AffineMap::constant(7).single_constant(), Some(7));
        assert_eq!(AffineMap::identity(1).single_constant(), None);
    }

    #[test]
    fn display_matches_textual_form() {
        let map = AffineMap::new(2, 1, [d(0) + s(0), d(1)]);
        assert_eq!(map.to_string(), "(d0, d1)[s0] -> (d0 + s0, d1)");
        assert_eq!(AffineMap::constant(4).to_string(), "() -> (4)");
    }

    #[test]
    fn compose_substitutes_inner_results() {
        // (d0) -> (d0 * 2)  ∘  (d0)[s0] -> (d0 + s0)
        let outer = AffineMap::new(1, 0, [d(0) * 2]);
        let inner = AffineMap::new(1, 1, [d(0) + s(0)]);
        let composed = outer.compose(&inner);
        assert_eq!(composed.num_dims(), 1);
        assert_eq!(composed.num_symbols(), 1);
        assert_eq!(composed.evaluate(&[3], &[4]).unwrap().as_slice(), &[14]);
    }

    #[test]
    fn compose_keeps_outer_symbols_first() {
        let outer = AffineMap::new(1, 1, [d(0) + s(0)]);
        let inner = AffineMap::new(1, 1, [d(0) * s(0)]);
        let composed = outer.compose(&inner);
        // d0 * s1 + s0
        assert_eq!(composed.evaluate(&[2], &[10, 3]).unwrap().as_slice(), &[16]);
    }

    #[test]
    fn input_dependence() {
        let map = AffineMap::new(2, 1, [d(1) + s(0)]);
        assert!(!map.is_function_of_input(0, 0));
        assert!(map.is_function_of_input(0, 1));
        assert!(map.is_function_of_input(0, 2));
    }

    #[test]
    fn constant_results_requires_all_constant() {
        let map = AffineMap::new(0, 0, [AffineExpr::constant(3), AffineExpr::constant(5)]);
        assert_eq!(map.constant_results().unwrap().as_slice(), &[3, 5]);
        let map = AffineMap::new(1, 0, [AffineExpr::constant(3), d(0)]);
        assert!(map.constant_results().is_none());
    }
}
