//! Custom assembly parsing hooks.
//!
//! Op kinds that want a custom textual form register a [`ParseFn`] and a
//! [`PrintFn`](crate::printer::PrintFn). Parse hooks read from an
//! [`OpAsmParser`]; [`TokenCursor`] implements it over a pre-lexed token
//! stream. Only the shapes hooks need are lexed: identifiers, `%values`,
//! integers and single-character punctuation.

use std::collections::HashMap;
use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use derive_more::Display;
use smallvec::SmallVec;
use tracing::trace;

use crate::context::{IrContext, OperationDataBuilder};
use crate::location::Location;
use crate::printer::OpAsmPrinter;
use crate::refs::{OpRef, TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::{Attribute, TypeInterner};

/// Custom parse hook of an op kind.
///
/// Called after the result names and the op name were consumed; fills in
/// operands, result types and attributes.
pub type ParseFn = fn(&mut dyn OpAsmParser, &mut OperationDataBuilder) -> Result<(), ParseError>;

#[derive(Debug, Clone, PartialEq, Eq, Display, derive_more::Error)]
pub enum ParseError {
    #[display("unexpected end of input")]
    UnexpectedEof,
    #[display("expected {expected}, found `{found}`")]
    Unexpected {
        expected: &'static str,
        found: String,
    },
    #[display("unexpected character `{_0}`")]
    UnexpectedChar(#[error(not(source))] char),
    #[display("use of undefined value %{_0}")]
    UndefinedValue(#[error(not(source))] String),
    #[display("unknown type `{_0}`")]
    UnknownType(#[error(not(source))] String),
    #[display("operation `{_0}` has no custom assembly form")]
    UnknownOperation(#[error(not(source))] String),
    #[display("operation defines {found} results but {expected} names were given")]
    ResultCount { expected: usize, found: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Token {
    /// Bare identifier; may contain `.` and `_`.
    #[display("{_0}")]
    Ident(String),
    /// SSA value reference, stored without the leading `%`.
    #[display("%{_0}")]
    Value(String),
    #[display("{_0}")]
    Integer(i64),
    #[display("{_0}")]
    Punct(char),
}

const PUNCTUATION: &[char] = &[',', ':', '(', ')', '[', ']', '{', '}', '=', '<', '>'];

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$'
}

fn take_while(chars: &mut Peekable<CharIndices<'_>>, from: usize, pred: fn(char) -> bool) -> usize {
    let mut end = from;
    while let Some(&(i, c)) = chars.peek() {
        if !pred(c) {
            break;
        }
        end = i + c.len_utf8();
        chars.next();
    }
    end
}

/// Split `text` into tokens.
pub fn tokenize(text: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if PUNCTUATION.contains(&c) {
            chars.next();
            tokens.push(Token::Punct(c));
            continue;
        }

        if c == '%' {
            chars.next();
            let end = take_while(&mut chars, start + 1, is_ident_char);
            if end == start + 1 {
                return Err(ParseError::UnexpectedChar('%'));
            }
            tokens.push(Token::Value(text[start + 1..end].to_owned()));
        } else if c.is_ascii_digit() || c == '-' {
            chars.next();
            let end = take_while(&mut chars, start + 1, |c| c.is_ascii_digit());
            let value = text[start..end]
                .parse()
                .map_err(|_| ParseError::UnexpectedChar(c))?;
            tokens.push(Token::Integer(value));
        } else if c.is_ascii_alphabetic() || c == '_' {
            let end = take_while(&mut chars, start, is_ident_char);
            tokens.push(Token::Ident(text[start..end].to_owned()));
        } else {
            return Err(ParseError::UnexpectedChar(c));
        }
    }
    Ok(tokens)
}

fn unexpected(expected: &'static str, found: Option<Token>) -> ParseError {
    match found {
        Some(tok) => ParseError::Unexpected {
            expected,
            found: tok.to_string(),
        },
        None => ParseError::UnexpectedEof,
    }
}

/// Parser interface handed to parse hooks.
pub trait OpAsmParser {
    fn next_token(&mut self) -> Option<Token>;
    fn peek_token(&self) -> Option<&Token>;
    /// Resolve a value name (without `%`) defined earlier in the input.
    fn lookup_value(&self, name: &str) -> Option<ValueRef>;
    fn types(&mut self) -> &mut TypeInterner;
    fn value_type(&self, v: ValueRef) -> TypeRef;

    fn parse_operand(&mut self) -> Result<ValueRef, ParseError> {
        match self.next_token() {
            Some(Token::Value(name)) => self
                .lookup_value(&name)
                .ok_or(ParseError::UndefinedValue(name)),
            other => Err(unexpected("operand", other)),
        }
    }

    /// One or more comma separated operands.
    fn parse_operand_list(&mut self) -> Result<SmallVec<[ValueRef; 4]>, ParseError> {
        let mut operands = SmallVec::new();
        operands.push(self.parse_operand()?);
        while self.parse_optional_punct(',') {
            operands.push(self.parse_operand()?);
        }
        Ok(operands)
    }

    fn parse_punct(&mut self, expected: char) -> Result<(), ParseError> {
        match self.next_token() {
            Some(Token::Punct(c)) if c == expected => Ok(()),
            other => Err(unexpected("punctuation", other)),
        }
    }

    fn parse_optional_punct(&mut self, expected: char) -> bool {
        if self.peek_token() == Some(&Token::Punct(expected)) {
            self.next_token();
            true
        } else {
            false
        }
    }

    fn parse_keyword(&mut self, keyword: &'static str) -> Result<(), ParseError> {
        match self.next_token() {
            Some(Token::Ident(s)) if s == keyword => Ok(()),
            other => Err(unexpected(keyword, other)),
        }
    }

    fn parse_integer(&mut self) -> Result<i64, ParseError> {
        match self.next_token() {
            Some(Token::Integer(v)) => Ok(v),
            other => Err(unexpected("integer", other)),
        }
    }

    /// Builtin scalar types: `iN`, `index`, `f16`, `f32`, `f64`, optionally
    /// prefixed with `core.`.
    fn parse_type(&mut self) -> Result<TypeRef, ParseError> {
        let name = match self.next_token() {
            Some(Token::Ident(name)) => name,
            other => return Err(unexpected("type", other)),
        };
        let short = name.strip_prefix("core.").unwrap_or(&name);
        let types = self.types();
        match short {
            "index" => Ok(types.index()),
            "f16" => Ok(types.float(16)),
            "f32" => Ok(types.float(32)),
            "f64" => Ok(types.float(64)),
            _ => match short.strip_prefix('i').map(str::parse::<u32>) {
                Some(Ok(width)) if width > 0 => Ok(types.integer(width)),
                _ => Err(ParseError::UnknownType(name)),
            },
        }
    }

    /// Integers, `true`/`false`, `unit` and builtin types.
    fn parse_attribute(&mut self) -> Result<Attribute, ParseError> {
        match self.peek_token() {
            Some(Token::Integer(_)) => self.parse_integer().map(Attribute::from),
            Some(Token::Ident(s)) if s == "true" || s == "false" || s == "unit" => {
                let value = match self.next_token() {
                    Some(Token::Ident(s)) if s == "true" => Attribute::Bool(true),
                    Some(Token::Ident(s)) if s == "false" => Attribute::Bool(false),
                    _ => Attribute::Unit,
                };
                Ok(value)
            }
            Some(Token::Ident(_)) => self.parse_type().map(Attribute::Type),
            _ => Err(unexpected("attribute", self.next_token())),
        }
    }

    /// `{key = value, ...}` if present.
    fn parse_optional_attr_dict(
        &mut self,
        builder: &mut OperationDataBuilder,
    ) -> Result<(), ParseError> {
        if !self.parse_optional_punct('{') {
            return Ok(());
        }
        if self.parse_optional_punct('}') {
            return Ok(());
        }
        loop {
            let key = match self.next_token() {
                Some(Token::Ident(key)) => key,
                other => return Err(unexpected("attribute name", other)),
            };
            self.parse_punct('=')?;
            let value = self.parse_attribute()?;
            builder.insert_attr(Symbol::from_dynamic(&key), value);
            if !self.parse_optional_punct(',') {
                break;
            }
        }
        self.parse_punct('}')
    }
}

/// [`OpAsmParser`] over a token vector with a scope of named values.
pub struct TokenCursor<'c> {
    ctx: &'c mut IrContext,
    tokens: Vec<Token>,
    pos: usize,
    values: HashMap<String, ValueRef>,
}

impl<'c> TokenCursor<'c> {
    pub fn new(ctx: &'c mut IrContext, tokens: Vec<Token>) -> Self {
        Self {
            ctx,
            tokens,
            pos: 0,
            values: HashMap::new(),
        }
    }

    /// Tokenize `text` and wrap it.
    pub fn from_text(ctx: &'c mut IrContext, text: &str) -> Result<Self, ParseError> {
        Ok(Self::new(ctx, tokenize(text)?))
    }

    /// Bind `name` (without `%`) to `value` for later lookups.
    pub fn define_value(&mut self, name: impl Into<String>, value: ValueRef) {
        self.values.insert(name.into(), value);
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn ctx(&mut self) -> &mut IrContext {
        self.ctx
    }
}

impl OpAsmParser for TokenCursor<'_> {
    fn next_token(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn peek_token(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn lookup_value(&self, name: &str) -> Option<ValueRef> {
        self.values.get(name).copied()
    }

    fn types(&mut self) -> &mut TypeInterner {
        &mut self.ctx.types
    }

    fn value_type(&self, v: ValueRef) -> TypeRef {
        self.ctx.value_ty(v)
    }
}

/// Parse one operation in custom form:
/// `[%r0, %r1 =] dialect.name <hook-specific tail>`.
///
/// The op kind must have a registered parse hook. The created op is not
/// attached to any block; its results are bound to the given names.
pub fn parse_operation(
    cursor: &mut TokenCursor<'_>,
    location: Location,
) -> Result<OpRef, ParseError> {
    let mut result_names = Vec::new();
    while let Some(Token::Value(_)) = cursor.peek_token() {
        if let Some(Token::Value(name)) = cursor.next_token() {
            result_names.push(name);
        }
        if !cursor.parse_optional_punct(',') {
            cursor.parse_punct('=')?;
            break;
        }
    }

    let full_name = match cursor.next_token() {
        Some(Token::Ident(name)) => name,
        other => return Err(unexpected("operation name", other)),
    };
    let Some((dialect, name)) = full_name.split_once('.') else {
        return Err(ParseError::UnknownOperation(full_name));
    };
    let dialect = Symbol::from_dynamic(dialect);
    let name = Symbol::from_dynamic(name);
    let hook = cursor
        .ctx
        .registry
        .get(dialect, name)
        .and_then(|d| d.parse)
        .ok_or_else(|| ParseError::UnknownOperation(full_name.clone()))?;

    let mut builder = OperationDataBuilder::new(location, dialect, name);
    hook(&mut *cursor, &mut builder)?;
    let data = builder.build(cursor.ctx);
    let op = cursor.ctx.create_op(data);

    let results = cursor.ctx.op_results(op).to_vec();
    if !result_names.is_empty() && result_names.len() != results.len() {
        return Err(ParseError::ResultCount {
            expected: result_names.len(),
            found: results.len(),
        });
    }
    for (name, value) in result_names.into_iter().zip(results) {
        cursor.define_value(name, value);
    }
    trace!("parsed {full_name}");
    Ok(op)
}

// ============================================================================
// Shared hooks
// ============================================================================

/// `%lhs, %rhs {attrs} : type`, result typed like the operands.
pub fn parse_binary_op(
    parser: &mut dyn OpAsmParser,
    builder: &mut OperationDataBuilder,
) -> Result<(), ParseError> {
    let lhs = parser.parse_operand()?;
    parser.parse_punct(',')?;
    let rhs = parser.parse_operand()?;
    parser.parse_optional_attr_dict(builder)?;
    parser.parse_punct(':')?;
    let ty = parser.parse_type()?;
    builder.push_operand(lhs);
    builder.push_operand(rhs);
    builder.push_result(ty);
    Ok(())
}

pub fn print_binary_op(p: &mut OpAsmPrinter<'_, '_>, op: OpRef) -> fmt::Result {
    let ctx = p.ctx();
    p.write_str(" ")?;
    p.print_operands(ctx.op_operands(op))?;
    p.print_optional_attr_dict(op, &[])?;
    p.write_str(" : ")?;
    match ctx.op_result_types(op).first() {
        Some(&ty) => p.print_type(ty),
        None => Ok(()),
    }
}

/// `%operand {attrs} : from to result`.
pub fn parse_cast_op(
    parser: &mut dyn OpAsmParser,
    builder: &mut OperationDataBuilder,
) -> Result<(), ParseError> {
    let operand = parser.parse_operand()?;
    parser.parse_optional_attr_dict(builder)?;
    parser.parse_punct(':')?;
    let _from = parser.parse_type()?;
    parser.parse_keyword("to")?;
    let to = parser.parse_type()?;
    builder.push_operand(operand);
    builder.push_result(to);
    Ok(())
}

pub fn print_cast_op(p: &mut OpAsmPrinter<'_, '_>, op: OpRef) -> fmt::Result {
    let ctx = p.ctx();
    let operand = ctx.op_operand(op, 0);
    p.write_str(" ")?;
    p.print_operand(operand)?;
    p.print_optional_attr_dict(op, &[])?;
    p.write_str(" : ")?;
    p.print_type(ctx.value_ty(operand))?;
    p.write_str(" to ")?;
    match ctx.op_result_types(op).first() {
        Some(&ty) => p.print_type(ty),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{BlockArgData, BlockData};
    use crate::location::Span;
    use crate::printer::print_op;
    use crate::registry::OpDescriptor;

    fn setup() -> (IrContext, Location) {
        let mut ctx = IrContext::new();
        ctx.registry.register(
            OpDescriptor::new(Symbol::new("test"), Symbol::new("add"))
                .with_asm(parse_binary_op, print_binary_op),
        );
        ctx.registry.register(
            OpDescriptor::new(Symbol::new("test"), Symbol::new("cast"))
                .with_asm(parse_cast_op, print_cast_op),
        );
        let path = ctx.paths.intern("asm.mlir".to_owned());
        (ctx, Location::new(path, Span::default()))
    }

    #[test]
    fn tokenizer_shapes() {
        let tokens = tokenize("%0 = test.add %a1, %b : i32 {n = -4}").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Value("0".into()),
                Token::Punct('='),
                Token::Ident("test.add".into()),
                Token::Value("a1".into()),
                Token::Punct(','),
                Token::Value("b".into()),
                Token::Punct(':'),
                Token::Ident("i32".into()),
                Token::Punct('{'),
                Token::Ident("n".into()),
                Token::Punct('='),
                Token::Integer(-4),
                Token::Punct('}'),
            ]
        );
        assert_eq!(tokenize("a ; b"), Err(ParseError::UnexpectedChar(';')));
    }

    #[test]
    fn binary_op_round_trips_through_hooks() {
        let (mut ctx, loc) = setup();
        let i32_ty = ctx.types.integer(32);
        let block = ctx.create_block(BlockData::new(
            loc,
            [BlockArgData::new(i32_ty), BlockArgData::new(i32_ty)],
        ));
        let a = ctx.block_arg(block, 0);
        let b = ctx.block_arg(block, 1);

        let mut cursor = TokenCursor::from_text(&mut ctx, "%sum = test.add %a, %b : i32").unwrap();
        cursor.define_value("a", a);
        cursor.define_value("b", b);
        let op = parse_operation(&mut cursor, loc).unwrap();
        assert!(cursor.is_at_end());
        let sum = cursor.lookup_value("sum");
        assert_eq!(sum, Some(ctx.op_result(op, 0)));

        assert_eq!(ctx.op_operands(op), &[a, b]);
        assert_eq!(ctx.op_result_types(op), &[i32_ty]);
        // Operands are not in the printer's scope
        assert_eq!(print_op(&ctx, op), "%0 = test.add %?, %? : i32\n");
    }

    #[test]
    fn cast_op_hook() {
        let (mut ctx, loc) = setup();
        let i32_ty = ctx.types.integer(32);
        let block = ctx.create_block(BlockData::new(loc, [BlockArgData::new(i32_ty)]));
        let a = ctx.block_arg(block, 0);

        let mut cursor = TokenCursor::from_text(&mut ctx, "%i = test.cast %a : i32 to index").unwrap();
        cursor.define_value("a", a);
        let op = parse_operation(&mut cursor, loc).unwrap();
        let index = ctx.types.index();
        assert_eq!(ctx.op_result_types(op), &[index]);
    }

    #[test]
    fn errors() {
        let (mut ctx, loc) = setup();
        let mut cursor = TokenCursor::from_text(&mut ctx, "%x = test.add %a, %b : i32").unwrap();
        assert_eq!(
            parse_operation(&mut cursor, loc),
            Err(ParseError::UndefinedValue("a".into()))
        );

        let mut cursor = TokenCursor::from_text(&mut ctx, "test.nothing").unwrap();
        let err = parse_operation(&mut cursor, loc).unwrap_err();
        assert_eq!(
            err.to_string(),
            "operation `test.nothing` has no custom assembly form"
        );

        let mut cursor = TokenCursor::from_text(&mut ctx, "i7x").unwrap();
        assert_eq!(cursor.parse_type(), Err(ParseError::UnknownType("i7x".into())));
    }

    #[test]
    fn attr_dict() {
        let (mut ctx, loc) = setup();
        let mut cursor = TokenCursor::from_text(&mut ctx, "{n = 3, flag = true, ty = f32}").unwrap();
        let mut builder = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new("x"));
        cursor.parse_optional_attr_dict(&mut builder).unwrap();
        let data = builder.build(cursor.ctx());
        let f32_ty = ctx.types.float(32);
        assert_eq!(data.attributes.get(&Symbol::new("n")), Some(&Attribute::from(3i64)));
        assert_eq!(
            data.attributes.get(&Symbol::new("flag")),
            Some(&Attribute::Bool(true))
        );
        assert_eq!(
            data.attributes.get(&Symbol::new("ty")),
            Some(&Attribute::Type(f32_ty))
        );
    }
}
