//! Text printer for the IR.
//!
//! Ops whose kind registers a print hook are printed in their custom form;
//! everything else uses the generic form:
//!
//! ```text
//! core.module @name {
//!   func.func @main(%0: i32) -> i32 {
//!     %1 = std.constant 42 : i32
//!     %2 = std.addi %0, %1 : i32
//!     func.return %2
//!   }
//! }
//! ```
//!
//! Builtin `core` types print in their short form (`i32`, `index`,
//! `vector<4x8xf32>`, `memref<?x16xf32>`); other types print as
//! `dialect.name(params) {attrs}`.

use std::collections::HashMap;
use std::fmt;
use std::fmt::Write;

use crate::context::IrContext;
use crate::refs::{BlockRef, OpRef, RegionRef, TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::{Attribute, DYNAMIC_DIM};
use crate::symbols;

symbols! {
    CORE => "core",
    MODULE => "module",
    MODULE_TERMINATOR => "module_terminator",
    FUNC => "func",
    SYM_NAME => "sym_name",
    TYPE => "type",
}

/// Custom print hook of an op kind.
///
/// The framework prints the result names and the op name; the hook writes
/// the remainder of the line, starting with a leading space when it prints
/// anything.
pub type PrintFn = fn(&mut OpAsmPrinter<'_, '_>, OpRef) -> fmt::Result;

/// Print state for value numbering and block labeling.
struct PrintState<'a> {
    ctx: &'a IrContext,
    value_names: HashMap<ValueRef, String>,
    block_labels: HashMap<BlockRef, String>,
    next_value_num: usize,
    next_block_num: usize,
}

impl<'a> PrintState<'a> {
    fn new(ctx: &'a IrContext) -> Self {
        Self {
            ctx,
            value_names: HashMap::new(),
            block_labels: HashMap::new(),
            next_value_num: 0,
            next_block_num: 0,
        }
    }

    fn assign_value_name(&mut self, v: ValueRef) -> String {
        let name = format!("%{}", self.next_value_num);
        self.next_value_num += 1;
        self.value_names.insert(v, name.clone());
        name
    }

    fn get_value_name(&self, v: ValueRef) -> &str {
        self.value_names.get(&v).map(|s| s.as_str()).unwrap_or("%?")
    }

    fn assign_block_label(&mut self, b: BlockRef) {
        let label = format!("^bb{}", self.next_block_num);
        self.next_block_num += 1;
        self.block_labels.insert(b, label);
    }

    fn get_block_label(&self, b: BlockRef) -> &str {
        self.block_labels
            .get(&b)
            .map(|s| s.as_str())
            .unwrap_or("^bb?")
    }

    fn reset_numbering(&mut self) {
        self.next_value_num = 0;
        self.next_block_num = 0;
        self.value_names.clear();
        self.block_labels.clear();
    }
}

/// Printer handed to custom print hooks.
pub struct OpAsmPrinter<'s, 'a> {
    state: &'s mut PrintState<'a>,
    out: &'s mut dyn Write,
}

impl<'a> OpAsmPrinter<'_, 'a> {
    pub fn ctx(&self) -> &'a IrContext {
        self.state.ctx
    }

    pub fn write_str(&mut self, s: &str) -> fmt::Result {
        self.out.write_str(s)
    }

    pub fn print_operand(&mut self, v: ValueRef) -> fmt::Result {
        self.out.write_str(self.state.get_value_name(v))
    }

    /// Comma separated operand names.
    pub fn print_operands(&mut self, vs: &[ValueRef]) -> fmt::Result {
        for (i, &v) in vs.iter().enumerate() {
            if i > 0 {
                self.out.write_str(", ")?;
            }
            self.print_operand(v)?;
        }
        Ok(())
    }

    pub fn print_type(&mut self, ty: TypeRef) -> fmt::Result {
        write_type(self.state.ctx, self.out, ty)
    }

    pub fn print_attribute(&mut self, attr: &Attribute) -> fmt::Result {
        write_attribute(self.state.ctx, self.out, attr)
    }

    /// ` {k = v, ...}` for every attribute of `op` not listed in `elided`.
    pub fn print_optional_attr_dict(&mut self, op: OpRef, elided: &[Symbol]) -> fmt::Result {
        let ctx = self.state.ctx;
        let mut first = true;
        for (key, val) in ctx.op(op).attributes.iter() {
            if elided.contains(key) {
                continue;
            }
            self.out.write_str(if first { " {" } else { ", " })?;
            first = false;
            write!(self.out, "{key} = ")?;
            write_attribute(ctx, self.out, val)?;
        }
        if !first {
            self.out.write_char('}')?;
        }
        Ok(())
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Print an operation as IR text.
pub fn print_op(ctx: &IrContext, op: OpRef) -> String {
    let mut state = PrintState::new(ctx);
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = print_operation(&mut state, &mut out, op, 0);
    out
}

/// Print a type as IR text.
pub fn print_type(ctx: &IrContext, ty: TypeRef) -> String {
    let mut out = String::new();
    let _ = write_type(ctx, &mut out, ty);
    out
}

/// Print an attribute as IR text.
pub fn print_attribute(ctx: &IrContext, attr: &Attribute) -> String {
    let mut out = String::new();
    let _ = write_attribute(ctx, &mut out, attr);
    out
}

/// Print a module (root operation with nested functions) as IR text.
pub fn print_module(ctx: &IrContext, root: OpRef) -> String {
    let mut state = PrintState::new(ctx);
    let mut out = String::new();
    let _ = print_module_op(&mut state, &mut out, root, 0);
    out
}

// ============================================================================
// Type printing
// ============================================================================

fn write_type(ctx: &IrContext, f: &mut dyn Write, ty: TypeRef) -> fmt::Result {
    let types = &ctx.types;
    let data = types.get(ty);
    if data.dialect == CORE() {
        if types.integer_width(ty).is_some() || types.is_float(ty) || types.is_index(ty) {
            return write!(f, "{}", data.name);
        }
        if let Some(shape) = types.shape(ty) {
            let elem = types.element_type_or_self(ty);
            write!(f, "{}<", data.name)?;
            for &dim in &shape {
                if dim == DYNAMIC_DIM {
                    f.write_str("?x")?;
                } else {
                    write!(f, "{dim}x")?;
                }
            }
            write_type(ctx, f, elem)?;
            for map in types.memref_layout(ty) {
                write!(f, ", {map}")?;
            }
            return f.write_char('>');
        }
        if let Some((inputs, results)) = types.function_signature(ty) {
            write_type_list(ctx, f, inputs, true)?;
            f.write_str(" -> ")?;
            return write_type_list(ctx, f, results, results.len() != 1);
        }
    }

    write!(f, "{}.{}", data.dialect, data.name)?;
    if !data.params.is_empty() {
        write_type_list(ctx, f, &data.params, true)?;
    } else if !data.attrs.is_empty() {
        // Empty parens signal that attrs follow
        f.write_str("()")?;
    }
    if !data.attrs.is_empty() {
        f.write_str(" {")?;
        for (i, (key, val)) in data.attrs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key} = ")?;
            write_attribute(ctx, f, val)?;
        }
        f.write_char('}')?;
    }
    Ok(())
}

fn write_type_list(
    ctx: &IrContext,
    f: &mut dyn Write,
    tys: &[TypeRef],
    parens: bool,
) -> fmt::Result {
    if parens {
        f.write_char('(')?;
    }
    for (i, &ty) in tys.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_type(ctx, f, ty)?;
    }
    if parens {
        f.write_char(')')?;
    }
    Ok(())
}

// ============================================================================
// Attribute printing
// ============================================================================

fn write_attribute(ctx: &IrContext, f: &mut dyn Write, attr: &Attribute) -> fmt::Result {
    match attr {
        Attribute::Unit => f.write_str("unit"),
        Attribute::Bool(b) => write!(f, "{b}"),
        Attribute::IntBits(_) => write!(f, "{}", attr.as_int().unwrap_or_default()),
        Attribute::FloatBits(bits) => {
            let v = f64::from_bits(*bits);
            let s = format!("{v}");
            f.write_str(&s)?;
            // Keep a decimal point on finite whole numbers
            if v.is_finite() && !s.contains('.') && !s.contains('e') && !s.contains('E') {
                f.write_str(".0")?;
            }
            Ok(())
        }
        Attribute::String(s) => {
            f.write_char('"')?;
            write_escaped_string(f, s)?;
            f.write_char('"')
        }
        Attribute::Symbol(sym) => write_symbol(f, *sym),
        Attribute::Type(ty) => write_type(ctx, f, *ty),
        Attribute::List(list) => {
            f.write_char('[')?;
            for (i, item) in list.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_attribute(ctx, f, item)?;
            }
            f.write_char(']')
        }
        Attribute::Location(loc) => {
            let path_str = ctx.paths.get(loc.path);
            f.write_str("loc(\"")?;
            write_escaped_string(f, path_str)?;
            write!(f, "\" {}:{})", loc.span.start, loc.span.end)
        }
        Attribute::AffineMap(map) => write!(f, "affine_map<{map}>"),
    }
}

fn write_escaped_string(f: &mut dyn Write, s: &str) -> fmt::Result {
    for ch in s.chars() {
        match ch {
            '\\' => f.write_str("\\\\")?,
            '"' => f.write_str("\\\"")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            '\0' => f.write_str("\\0")?,
            c if c.is_control() => write!(f, "\\x{:02x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

fn write_symbol(f: &mut dyn Write, sym: Symbol) -> fmt::Result {
    sym.with_str(|s| {
        let needs_quoting = s.is_empty() || !s.chars().all(|c| c.is_alphanumeric() || c == '_');
        if needs_quoting {
            f.write_str("@\"")?;
            write_escaped_string(f, s)?;
            f.write_char('"')
        } else {
            write!(f, "@{s}")
        }
    })
}

// ============================================================================
// Operation printing
// ============================================================================

fn print_operation(
    state: &mut PrintState<'_>,
    f: &mut dyn Write,
    op: OpRef,
    indent: usize,
) -> fmt::Result {
    let ctx = state.ctx;
    if ctx.op_is(op, CORE(), MODULE()) {
        return print_module_op(state, f, op, indent);
    }
    if ctx.op_is(op, FUNC(), FUNC()) {
        return print_func_op(state, f, op, indent);
    }

    let indent_str = " ".repeat(indent);
    f.write_str(&indent_str)?;
    print_result_names(state, f, op)?;
    let data = ctx.op(op);
    write!(f, "{}.{}", data.dialect, data.name)?;

    match ctx.descriptor(op).and_then(|d| d.print) {
        Some(hook) => {
            let mut printer = OpAsmPrinter {
                state: &mut *state,
                out: &mut *f,
            };
            hook(&mut printer, op)?;
        }
        None => print_generic_body(state, f, op)?,
    }

    for &region in ctx.op_regions(op) {
        f.write_str(" {\n")?;
        print_region(state, f, region, indent + 2)?;
        write!(f, "{indent_str}}}")?;
    }

    f.write_char('\n')
}

fn print_result_names(state: &mut PrintState<'_>, f: &mut dyn Write, op: OpRef) -> fmt::Result {
    let results = state.ctx.op_results(op);
    if results.is_empty() {
        return Ok(());
    }
    for (i, &v) in results.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        let name = state.assign_value_name(v);
        f.write_str(&name)?;
    }
    f.write_str(" = ")
}

/// Operands, successors, attributes and result types in generic form.
fn print_generic_body(state: &mut PrintState<'_>, f: &mut dyn Write, op: OpRef) -> fmt::Result {
    let ctx = state.ctx;

    let operands = ctx.non_successor_operands(op);
    if !operands.is_empty() {
        f.write_char(' ')?;
        for (i, &v) in operands.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(state.get_value_name(v))?;
        }
    }

    let successors = ctx.op_successors(op);
    if !successors.is_empty() {
        f.write_str(" [")?;
        for (i, &b) in successors.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(state.get_block_label(b))?;
            let forwarded = ctx.successor_operands(op, i);
            if !forwarded.is_empty() {
                f.write_char('(')?;
                for (j, &v) in forwarded.iter().enumerate() {
                    if j > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(state.get_value_name(v))?;
                }
                f.write_char(')')?;
            }
        }
        f.write_char(']')?;
    }

    let attrs = &ctx.op(op).attributes;
    if !attrs.is_empty() {
        f.write_str(" {")?;
        for (i, (key, val)) in attrs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key} = ")?;
            write_attribute(ctx, f, val)?;
        }
        f.write_char('}')?;
    }

    let result_types = ctx.op_result_types(op);
    if !result_types.is_empty() {
        f.write_str(" : ")?;
        write_type_list(ctx, f, result_types, false)?;
    }
    Ok(())
}

// ============================================================================
// Region / Block printing
// ============================================================================

fn print_region(
    state: &mut PrintState<'_>,
    f: &mut dyn Write,
    region: RegionRef,
    indent: usize,
) -> fmt::Result {
    let ctx = state.ctx;
    let blocks = ctx.region_blocks(region);

    // Pre-assign block labels so forward branches resolve
    for &block in blocks {
        state.assign_block_label(block);
    }

    let can_elide_label = blocks.len() == 1 && ctx.block_args(blocks[0]).is_empty();

    for (i, &block) in blocks.iter().enumerate() {
        if !can_elide_label {
            print_block_header(state, f, block, indent)?;
        }
        for op in ctx.block_ops(block) {
            print_operation(state, f, op, indent + 2)?;
        }
        if i + 1 < blocks.len() {
            f.write_char('\n')?;
        }
    }

    Ok(())
}

/// `^bbN(%a: ty, ...):` on its own line.
fn print_block_header(
    state: &mut PrintState<'_>,
    f: &mut dyn Write,
    block: BlockRef,
    indent: usize,
) -> fmt::Result {
    let indent_str = " ".repeat(indent);
    let label = state.get_block_label(block).to_owned();
    write!(f, "{indent_str}{label}")?;
    let args = state.ctx.block_args(block);
    if !args.is_empty() {
        print_arg_list(state, f, args)?;
    }
    f.write_str(":\n")
}

fn print_arg_list(state: &mut PrintState<'_>, f: &mut dyn Write, args: &[ValueRef]) -> fmt::Result {
    f.write_char('(')?;
    for (i, &arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        let name = state.assign_value_name(arg);
        write!(f, "{name}: ")?;
        write_type(state.ctx, f, state.ctx.value_ty(arg))?;
    }
    f.write_char(')')
}

// ============================================================================
// Special operation printers
// ============================================================================

fn print_module_op(
    state: &mut PrintState<'_>,
    f: &mut dyn Write,
    op: OpRef,
    indent: usize,
) -> fmt::Result {
    let ctx = state.ctx;
    let indent_str = " ".repeat(indent);
    write!(f, "{indent_str}core.module")?;

    if let Some(Attribute::Symbol(name)) = ctx.op_attr(op, SYM_NAME()) {
        f.write_char(' ')?;
        write_symbol(f, *name)?;
    }

    let Some(&region) = ctx.op_regions(op).first() else {
        return f.write_char('\n');
    };

    f.write_str(" {\n")?;
    for &block in ctx.region_blocks(region) {
        for child in ctx.block_ops(block) {
            if ctx.op_is(child, CORE(), MODULE_TERMINATOR()) {
                continue;
            }
            // Each top-level op numbers its values from zero
            state.reset_numbering();
            print_operation(state, f, child, indent + 2)?;
        }
    }
    state.reset_numbering();
    writeln!(f, "{indent_str}}}")
}

fn print_func_op(
    state: &mut PrintState<'_>,
    f: &mut dyn Write,
    op: OpRef,
    indent: usize,
) -> fmt::Result {
    let ctx = state.ctx;
    let indent_str = " ".repeat(indent);
    write!(f, "{indent_str}func.func")?;

    if let Some(Attribute::Symbol(name)) = ctx.op_attr(op, SYM_NAME()) {
        f.write_char(' ')?;
        write_symbol(f, *name)?;
    }

    let signature = ctx
        .op_attr(op, TYPE())
        .and_then(Attribute::as_type)
        .and_then(|ty| ctx.types.function_signature(ty));
    let blocks = ctx
        .op_regions(op)
        .first()
        .map(|&r| ctx.region_blocks(r))
        .unwrap_or(&[]);

    // Entry block args double as the parameter list
    match blocks.first() {
        Some(&entry) => print_arg_list(state, f, ctx.block_args(entry))?,
        None => {
            let inputs = signature.map(|(inputs, _)| inputs).unwrap_or(&[]);
            write_type_list(ctx, f, inputs, true)?;
        }
    }

    if let Some((_, results)) = signature
        && !results.is_empty()
    {
        f.write_str(" -> ")?;
        write_type_list(ctx, f, results, results.len() != 1)?;
    }

    if blocks.is_empty() {
        return f.write_char('\n');
    }

    f.write_str(" {\n")?;
    for &block in blocks {
        state.assign_block_label(block);
    }
    for (i, &block) in blocks.iter().enumerate() {
        if i > 0 {
            print_block_header(state, f, block, indent)?;
        }
        for child in ctx.block_ops(block) {
            print_operation(state, f, child, indent + 2)?;
        }
    }
    writeln!(f, "{indent_str}}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affine::{AffineExpr, AffineMap};
    use crate::context::{BlockArgData, BlockData, OperationDataBuilder, RegionData};
    use crate::dialect::{builtin, func};
    use crate::location::{Location, Span};
    use crate::ops::DialectOp;
    use crate::registry::OpDescriptor;
    use insta::assert_snapshot;

    fn test_location(ctx: &mut IrContext) -> Location {
        let path = ctx.paths.intern("printer.mlir".to_owned());
        Location::new(path, Span::new(0, 0))
    }

    fn constant(ctx: &mut IrContext, loc: Location, value: i64) -> OpRef {
        let i32_ty = ctx.types.integer(32);
        let data = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new("const"))
            .result(i32_ty)
            .attr("value", Attribute::from(value))
            .build(ctx);
        ctx.create_op(data)
    }

    #[test]
    fn builtin_types_print_short_form() {
        let mut ctx = IrContext::new();
        let f32_ty = ctx.types.float(32);
        let i1 = ctx.types.integer(1);
        let index = ctx.types.index();
        let vector = ctx.types.vector(&[4, 8], f32_ty);
        let memref = ctx.types.memref(&[DYNAMIC_DIM, 16], f32_ty, vec![]);
        let func_ty = ctx.types.function(&[index, f32_ty], &[i1]);

        assert_eq!(print_type(&ctx, f32_ty), "f32");
        assert_eq!(print_type(&ctx, index), "index");
        assert_eq!(print_type(&ctx, vector), "vector<4x8xf32>");
        assert_eq!(print_type(&ctx, memref), "memref<?x16xf32>");
        assert_eq!(print_type(&ctx, func_ty), "(index, f32) -> i1");
    }

    #[test]
    fn memref_layout_is_printed() {
        let mut ctx = IrContext::new();
        let f32_ty = ctx.types.float(32);
        let transpose = AffineMap::new(2, 0, [AffineExpr::dim(1), AffineExpr::dim(0)]);
        let memref = ctx.types.memref(&[4, 4], f32_ty, vec![transpose]);
        assert_eq!(
            print_type(&ctx, memref),
            "memref<4x4xf32, (d0, d1) -> (d1, d0)>"
        );
    }

    #[test]
    fn custom_dialect_type_prints_generic_form() {
        let mut ctx = IrContext::new();
        let i32_ty = ctx.types.integer(32);
        let pair = ctx.types.intern(
            crate::types::TypeDataBuilder::new(Symbol::new("test"), Symbol::new("pair"))
                .params([i32_ty, i32_ty])
                .build(),
        );
        assert_eq!(print_type(&ctx, pair), "test.pair(i32, i32)");
    }

    #[test]
    fn generic_op_form() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let c = constant(&mut ctx, loc, 42);
        assert_snapshot!(print_op(&ctx, c), @"%0 = test.const {value = 42} : i32");
    }

    #[test]
    fn attributes() {
        let ctx = IrContext::new();
        let map = AffineMap::new(1, 1, [AffineExpr::dim(0) + AffineExpr::symbol(0)]);
        assert_eq!(print_attribute(&ctx, &Attribute::Bool(true)), "true");
        assert_eq!(print_attribute(&ctx, &Attribute::from(-3i64)), "-3");
        assert_eq!(
            print_attribute(&ctx, &Attribute::FloatBits(42.0f64.to_bits())),
            "42.0"
        );
        assert_eq!(
            print_attribute(&ctx, &Attribute::FloatBits(f64::INFINITY.to_bits())),
            "inf"
        );
        assert_eq!(
            print_attribute(&ctx, &Attribute::String("a\nb".to_owned())),
            r#""a\nb""#
        );
        assert_eq!(
            print_attribute(&ctx, &Attribute::Symbol(Symbol::from_dynamic("a::b"))),
            r#"@"a::b""#
        );
        assert_eq!(
            print_attribute(&ctx, &Attribute::AffineMap(map)),
            "affine_map<(d0)[s0] -> (d0 + s0)>"
        );
    }

    #[test]
    fn branch_successors_and_block_args() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let i32_ty = ctx.types.integer(32);

        let entry = ctx.create_block(BlockData::new(loc, []));
        let exit = ctx.create_block(BlockData::new(loc, [BlockArgData::new(i32_ty)]));
        let c = constant(&mut ctx, loc, 7);
        ctx.push_op(entry, c);
        let v = ctx.op_result(c, 0);
        let br = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new("br"))
            .successor_with_operands(exit, [v])
            .build(&mut ctx);
        let br = ctx.create_op(br);
        ctx.push_op(entry, br);
        let region = ctx.create_region(RegionData::new(loc, [entry, exit]));
        let holder = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new("holder"))
            .region(region)
            .build(&mut ctx);
        let holder = ctx.create_op(holder);

        assert_snapshot!(print_op(&ctx, holder), @r"
        test.holder {
          ^bb0:
            %0 = test.const {value = 7} : i32
            test.br [^bb1(%0)]

          ^bb1(%1: i32):
        }
        ");
    }

    fn print_value_hook(p: &mut OpAsmPrinter<'_, '_>, op: OpRef) -> fmt::Result {
        let value = p.ctx().op_attr(op, Symbol::new("value")).cloned();
        if let Some(value) = value {
            p.write_str(" ")?;
            p.print_attribute(&value)?;
        }
        p.print_optional_attr_dict(op, &[Symbol::new("value")])?;
        p.write_str(" : ")?;
        let ty = p.ctx().op_result_types(op)[0];
        p.print_type(ty)
    }

    fn parse_nothing(
        _: &mut dyn crate::asm::OpAsmParser,
        _: &mut OperationDataBuilder,
    ) -> Result<(), crate::asm::ParseError> {
        Ok(())
    }

    #[test]
    fn registered_print_hook_is_used() {
        let mut ctx = IrContext::new();
        ctx.registry.register(
            OpDescriptor::new(Symbol::new("test"), Symbol::new("const"))
                .with_asm(parse_nothing, print_value_hook),
        );
        let loc = test_location(&mut ctx);
        let c = constant(&mut ctx, loc, 5);
        ctx.set_op_attr(c, "tag", Attribute::Unit);
        assert_snapshot!(print_op(&ctx, c), @"%0 = test.const 5 {tag = unit} : i32");
    }

    #[test]
    fn module_with_function() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let i32_ty = ctx.types.integer(32);

        let module = builtin::module(&mut ctx, loc, Symbol::new("m"));
        let f = func::func(&mut ctx, loc, Symbol::new("id"), &[i32_ty], &[i32_ty]);
        let entry = f.entry_block(&ctx);
        let arg = ctx.block_arg(entry, 0);
        let ret = func::r#return(&mut ctx, loc, [arg]);
        ctx.push_op(entry, ret.op_ref());
        module.push(&mut ctx, f.op_ref());

        assert_snapshot!(print_module(&ctx, module.op_ref()), @r"
        core.module @m {
          func.func @id(%0: i32) -> i32 {
            func.return %0
          }
        }
        ");
    }
}
