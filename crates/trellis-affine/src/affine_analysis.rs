//! Affine maps paired with the SSA values feeding their inputs.
//!
//! Index computations are often spread over chains of `affine.apply` ops.
//! [`fully_compose_affine_map_and_operands`] folds such chains into the map
//! that consumes them so that analyses see one closed-form expression per
//! result over loop induction variables and symbols.

use std::collections::HashSet;

use trellis_ir::{AffineExpr, AffineMap, DialectOp, IrContext, ValueRef};

use crate::dialect::affine::AffineApply;

/// `affine.apply` ops reachable from `operands` through apply-defined values,
/// in discovery order.
pub fn reachable_affine_apply_ops(ctx: &IrContext, operands: &[ValueRef]) -> Vec<AffineApply> {
    let mut found = Vec::new();
    let mut seen = HashSet::new();
    let mut worklist: Vec<ValueRef> = operands.iter().rev().copied().collect();
    while let Some(v) = worklist.pop() {
        let Some(apply) = defining_apply(ctx, v) else {
            continue;
        };
        if !seen.insert(apply) {
            continue;
        }
        found.push(apply);
        worklist.extend(ctx.op_operands(apply.op_ref()).iter().rev().copied());
    }
    found
}

fn defining_apply(ctx: &IrContext, v: ValueRef) -> Option<AffineApply> {
    let def = ctx.defining_op(v)?;
    AffineApply::from_op(ctx, def).ok()
}

/// A multi-result affine map with its dimension and symbol operands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AffineValueMap {
    map: AffineMap,
    operands: Vec<ValueRef>,
}

impl AffineValueMap {
    /// # Panics
    ///
    /// Panics if `operands` does not match the map's input count.
    pub fn new(map: AffineMap, operands: Vec<ValueRef>) -> Self {
        assert_eq!(
            operands.len(),
            map.num_inputs() as usize,
            "AffineValueMap::new: {} operands for a map with {} inputs",
            operands.len(),
            map.num_inputs(),
        );
        Self { map, operands }
    }

    /// The map and operands of an `affine.apply`.
    pub fn from_apply(ctx: &IrContext, apply: AffineApply) -> Option<Self> {
        let map = apply.map(ctx).ok()?.clone();
        let operands = ctx.op_operands(apply.op_ref()).to_vec();
        (operands.len() == map.num_inputs() as usize).then_some(Self { map, operands })
    }

    pub fn map(&self) -> &AffineMap {
        &self.map
    }

    pub fn operands(&self) -> &[ValueRef] {
        &self.operands
    }

    pub fn num_results(&self) -> usize {
        self.map.num_results()
    }

    /// Whether result `idx` depends on `value` through any of its inputs.
    pub fn is_function_of(&self, idx: usize, value: ValueRef) -> bool {
        self.operands
            .iter()
            .enumerate()
            .any(|(pos, &v)| v == value && self.map.is_function_of_input(idx, pos as u32))
    }

    /// Compose all operand-defining `affine.apply` chains into the map and
    /// canonicalize the result.
    pub fn compose_applies(&mut self, ctx: &IrContext) {
        fully_compose_affine_map_and_operands(ctx, &mut self.map, &mut self.operands);
    }

    pub fn into_parts(self) -> (AffineMap, Vec<ValueRef>) {
        (self.map, self.operands)
    }
}

/// Substitute apply-defined operands by the apply's expression until no
/// operand is produced by a well-formed `affine.apply`.
///
/// The apply's own dimensions and symbols are appended as new inputs. The
/// result is simplified and canonicalized.
pub fn fully_compose_affine_map_and_operands(
    ctx: &IrContext,
    map: &mut AffineMap,
    operands: &mut Vec<ValueRef>,
) {
    canonicalize_map_and_operands(map, operands);
    loop {
        let next = operands.iter().enumerate().find_map(|(pos, &v)| {
            let inner = AffineValueMap::from_apply(ctx, defining_apply(ctx, v)?)?;
            (inner.num_results() == 1).then_some((pos, inner))
        });
        let Some((pos, inner)) = next else {
            break;
        };
        compose_operand(map, operands, pos, &inner);
        canonicalize_map_and_operands(map, operands);
    }
    *map = map.simplify();
}

/// Replace input `pos` of `map` by the single result of `inner`.
fn compose_operand(
    map: &mut AffineMap,
    operands: &mut Vec<ValueRef>,
    pos: usize,
    inner: &AffineValueMap,
) {
    let nd = map.num_dims();
    let ns = map.num_symbols();
    let ind = inner.map.num_dims();
    let ins = inner.map.num_symbols();

    let inner_dims: Vec<AffineExpr> = (0..ind).map(|d| AffineExpr::dim(nd + d)).collect();
    let inner_syms: Vec<AffineExpr> = (0..ins).map(|s| AffineExpr::symbol(ns + s)).collect();
    let replacement = inner
        .map
        .result(0)
        .replace_dims_and_symbols(&inner_dims, &inner_syms);

    let dims: Vec<AffineExpr> = (0..nd)
        .map(|d| {
            if d as usize == pos {
                replacement.clone()
            } else {
                AffineExpr::dim(d)
            }
        })
        .collect();
    let syms: Vec<AffineExpr> = (0..ns)
        .map(|s| {
            if (nd + s) as usize == pos {
                replacement.clone()
            } else {
                AffineExpr::symbol(s)
            }
        })
        .collect();
    *map = map.replace_dims_and_symbols(&dims, &syms, nd + ind, ns + ins);

    let (inner_dim_ops, inner_sym_ops) = inner.operands.split_at(ind as usize);
    let (dim_ops, sym_ops) = operands.split_at(nd as usize);
    let mut composed = Vec::with_capacity(operands.len() + inner.operands.len());
    composed.extend_from_slice(dim_ops);
    composed.extend_from_slice(inner_dim_ops);
    composed.extend_from_slice(sym_ops);
    composed.extend_from_slice(inner_sym_ops);
    *operands = composed;
}

/// Merge duplicate operands and drop inputs no result refers to.
///
/// Dimensions and symbols are handled separately: a value used both as a
/// dimension and as a symbol keeps both positions.
pub fn canonicalize_map_and_operands(map: &mut AffineMap, operands: &mut Vec<ValueRef>) {
    let nd = map.num_dims();
    let ns = map.num_symbols();
    debug_assert_eq!(operands.len(), (nd + ns) as usize);

    let mut new_operands = Vec::with_capacity(operands.len());

    let mut dims = Vec::with_capacity(nd as usize);
    let mut kept_dims: Vec<ValueRef> = Vec::new();
    for d in 0..nd {
        let used = map.results().iter().any(|r| r.is_function_of_dim(d));
        let v = operands[d as usize];
        let expr = match kept_dims.iter().position(|&k| k == v) {
            Some(existing) => AffineExpr::dim(existing as u32),
            None if used => {
                kept_dims.push(v);
                AffineExpr::dim(kept_dims.len() as u32 - 1)
            }
            // Unused: any placeholder works since nothing refers to it.
            None => AffineExpr::constant(0),
        };
        dims.push(expr);
    }

    let mut syms = Vec::with_capacity(ns as usize);
    let mut kept_syms: Vec<ValueRef> = Vec::new();
    for s in 0..ns {
        let used = map.results().iter().any(|r| r.is_function_of_symbol(s));
        let v = operands[(nd + s) as usize];
        let expr = match kept_syms.iter().position(|&k| k == v) {
            Some(existing) => AffineExpr::symbol(existing as u32),
            None if used => {
                kept_syms.push(v);
                AffineExpr::symbol(kept_syms.len() as u32 - 1)
            }
            None => AffineExpr::constant(0),
        };
        syms.push(expr);
    }

    *map = map.replace_dims_and_symbols(
        &dims,
        &syms,
        kept_dims.len() as u32,
        kept_syms.len() as u32,
    );
    new_operands.extend(kept_dims);
    new_operands.extend(kept_syms);
    *operands = new_operands;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::affine::{apply, for_constant};
    use trellis_ir::{BlockArgData, BlockData, Location, Span};

    fn setup() -> (IrContext, Location) {
        let mut ctx = IrContext::new();
        crate::register_dialects(&mut ctx.registry);
        let path = ctx.paths.intern("compose.mlir".to_owned());
        (ctx, Location::new(path, Span::default()))
    }

    #[test]
    fn canonicalize_dedups_and_prunes() {
        let (mut ctx, loc) = setup();
        let index = ctx.types.index();
        let block = ctx.create_block(BlockData::new(
            loc,
            [BlockArgData::new(index), BlockArgData::new(index)],
        ));
        let (a, b) = (ctx.block_arg(block, 0), ctx.block_arg(block, 1));

        // (d0, d1, d2)[s0] -> (d0 + d2 + s0) over (%a, %b, %a)[%b]
        let mut map = AffineMap::new(
            3,
            1,
            [AffineExpr::dim(0) + AffineExpr::dim(2) + AffineExpr::symbol(0)],
        );
        let mut operands = vec![a, b, a, b];
        canonicalize_map_and_operands(&mut map, &mut operands);

        assert_eq!(operands, vec![a, b]);
        assert_eq!(map.num_dims(), 1);
        assert_eq!(map.num_symbols(), 1);
        assert_eq!(map.evaluate(&[3], &[10]).unwrap().as_slice(), &[16]);
    }

    #[test]
    fn apply_chain_composes_into_consumer() {
        let (mut ctx, loc) = setup();
        let l = for_constant(&mut ctx, loc, 0, 16, 1);
        let iv = l.induction_var(&ctx).unwrap();

        // %x = apply (d0) -> (d0 * 2)(%iv); %y = apply (d0) -> (d0 + 3)(%x)
        let x = apply(&mut ctx, loc, AffineMap::new(1, 0, [AffineExpr::dim(0) * 2]), &[iv]);
        l.push(&mut ctx, x.op_ref());
        let xv = x.result(&ctx);
        let y = apply(&mut ctx, loc, AffineMap::new(1, 0, [AffineExpr::dim(0) + 3]), &[xv]);
        l.push(&mut ctx, y.op_ref());
        let yv = y.result(&ctx);

        let found = reachable_affine_apply_ops(&ctx, &[yv]);
        assert_eq!(found, vec![y, x]);

        let mut vm = AffineValueMap::new(AffineMap::identity(1), vec![yv]);
        vm.compose_applies(&ctx);
        assert_eq!(vm.operands(), &[iv]);
        assert_eq!(vm.map().evaluate(&[5], &[]).unwrap().as_slice(), &[13]);
        assert!(vm.is_function_of(0, iv));
    }

    #[test]
    fn non_apply_operands_stay() {
        let (mut ctx, loc) = setup();
        let index = ctx.types.index();
        let block = ctx.create_block(BlockData::new(loc, [BlockArgData::new(index)]));
        let a = ctx.block_arg(block, 0);
        let mut map = AffineMap::new(0, 1, [AffineExpr::symbol(0) * 4]);
        let mut operands = vec![a];
        fully_compose_affine_map_and_operands(&ctx, &mut map, &mut operands);
        assert_eq!(operands, vec![a]);
        assert_eq!(map.num_symbols(), 1);
        assert_eq!(map.evaluate(&[], &[2]).unwrap().as_slice(), &[8]);
        assert!(reachable_affine_apply_ops(&ctx, &[a]).is_empty());
    }
}
