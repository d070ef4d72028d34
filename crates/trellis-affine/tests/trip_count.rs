use proptest::prelude::*;
use trellis_affine::dialect::affine;
use trellis_affine::{
    constant_trip_count, largest_trip_count_divisor, materialize_trip_count_map, trip_count_map,
};
use trellis_ir::dialect::func;
use trellis_ir::{AffineExpr, AffineMap, DialectOp, IrContext, Location, Span, Symbol, ValueRef};

fn context() -> (IrContext, Location) {
    let mut ctx = IrContext::new();
    trellis_affine::register_dialects(&mut ctx.registry);
    let path = ctx.paths.intern("trip_count.mlir".to_owned());
    (ctx, Location::new(path, Span::default()))
}

fn iterations(lb: i64, ub: i64, step: i64) -> u64 {
    (lb..ub).step_by(step as usize).count() as u64
}

/// Evaluate a trip count map with each operand bound through `value_of`.
fn evaluate(map: &AffineMap, operands: &[ValueRef], value_of: impl Fn(ValueRef) -> i64) -> Vec<i64> {
    let values: Vec<i64> = operands.iter().map(|&v| value_of(v)).collect();
    let (dims, syms) = values.split_at(map.num_dims() as usize);
    map.evaluate(dims, syms).unwrap().to_vec()
}

proptest! {
    #[test]
    fn constant_bounds_match_iteration(lb in -64i64..64, ub in -64i64..64, step in 1i64..9) {
        let (mut ctx, loc) = context();
        let l = affine::for_constant(&mut ctx, loc, lb, ub, step);
        let expected = iterations(lb, ub, step);
        prop_assert_eq!(constant_trip_count(&ctx, l), Some(expected));

        let divisor = largest_trip_count_divisor(&ctx, l);
        if expected == 0 {
            prop_assert_eq!(divisor, u64::MAX);
        } else {
            prop_assert_eq!(divisor, expected);
        }
    }

    #[test]
    fn symbolic_bounds_match_iteration(
        start in -32i64..32,
        extent in 0i64..128,
        step in 1i64..9,
    ) {
        let (mut ctx, loc) = context();
        let index = ctx.types.index();
        let f = func::func(&mut ctx, loc, Symbol::new("f"), &[index, index], &[]);
        let entry = f.entry_block(&ctx);
        let (lo, hi) = (ctx.block_arg(entry, 0), ctx.block_arg(entry, 1));

        let sym = AffineMap::new(0, 1, [AffineExpr::symbol(0)]);
        let l = affine::for_loop(&mut ctx, loc, &[lo], sym.clone(), &[hi], sym, step);
        ctx.push_op(entry, l.op_ref());

        let value_of = |v: ValueRef| if v == lo { start } else { start + extent };
        let expected = iterations(start, start + extent, step) as i64;

        let pure = trip_count_map(&ctx, l).unwrap();
        prop_assert_eq!(evaluate(&pure.map, &pure.operands, value_of), vec![expected]);

        let materialized = materialize_trip_count_map(&mut ctx, l).unwrap();
        prop_assert_eq!(
            evaluate(&materialized.map, &materialized.operands, value_of),
            vec![expected]
        );
        // Composition folded the bound applies away again.
        prop_assert_eq!(ctx.num_ops(entry), 1);
    }
}

#[test]
fn multi_result_upper_bound_takes_the_minimum() {
    let (mut ctx, loc) = context();
    let l = affine::for_loop(
        &mut ctx,
        loc,
        &[],
        AffineMap::constant(0),
        &[],
        AffineMap::new(0, 0, [AffineExpr::constant(10), AffineExpr::constant(7)]),
        2,
    );
    let tc = trip_count_map(&ctx, l).unwrap();
    assert_eq!(tc.map.num_results(), 2);
    assert_eq!(constant_trip_count(&ctx, l), Some(4));
    assert_eq!(largest_trip_count_divisor(&ctx, l), 1);
}
