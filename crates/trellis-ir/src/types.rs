//! Type interning, path interning and attribute values.

use std::collections::BTreeMap;
use std::collections::HashMap;

use cranelift_entity::PrimaryMap;
use smallvec::SmallVec;

use crate::affine::AffineMap;
use crate::location::Location;
use crate::refs::{PathRef, TypeRef};
use crate::symbol::Symbol;
use crate::symbols;

symbols! {
    CORE => "core",
    INDEX => "index",
    VECTOR => "vector",
    TENSOR => "tensor",
    MEMREF => "memref",
    FUNC => "func",
    ATTR_WIDTH => "width",
    ATTR_SHAPE => "shape",
    ATTR_LAYOUT => "layout",
    ATTR_NUM_INPUTS => "num_inputs",
}

/// Marker for a dynamic dimension in a shaped type.
pub const DYNAMIC_DIM: i64 = -1;

// ============================================================================
// Attribute
// ============================================================================

/// IR attribute values.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// Unit/nil value.
    Unit,
    Bool(bool),
    /// Integer constant stored as raw bits (signless).
    IntBits(u64),
    /// Float constant stored as raw bits.
    FloatBits(u64),
    String(String),
    Type(TypeRef),
    /// Single interned symbol.
    Symbol(Symbol),
    /// List of attributes.
    List(Vec<Attribute>),
    /// Full source location.
    Location(Location),
    AffineMap(AffineMap),
}

impl Attribute {
    /// Integer payload reinterpreted as a signed value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Attribute::IntBits(bits) => Some(i64::from_ne_bytes(bits.to_ne_bytes())),
            _ => None,
        }
    }

    pub fn as_affine_map(&self) -> Option<&AffineMap> {
        match self {
            Attribute::AffineMap(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<TypeRef> {
        match self {
            Attribute::Type(ty) => Some(*ty),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<Symbol> {
        match self {
            Attribute::Symbol(sym) => Some(*sym),
            _ => None,
        }
    }
}

impl From<i64> for Attribute {
    fn from(value: i64) -> Self {
        Attribute::IntBits(u64::from_ne_bytes(value.to_ne_bytes()))
    }
}

impl From<u64> for Attribute {
    fn from(value: u64) -> Self {
        Attribute::IntBits(value)
    }
}

impl From<bool> for Attribute {
    fn from(value: bool) -> Self {
        Attribute::Bool(value)
    }
}

impl From<Vec<Attribute>> for Attribute {
    fn from(value: Vec<Attribute>) -> Self {
        Attribute::List(value)
    }
}

impl From<Symbol> for Attribute {
    fn from(value: Symbol) -> Self {
        Attribute::Symbol(value)
    }
}

impl From<String> for Attribute {
    fn from(value: String) -> Self {
        Attribute::String(value)
    }
}

impl From<&str> for Attribute {
    fn from(value: &str) -> Self {
        Attribute::String(value.to_string())
    }
}

impl From<Location> for Attribute {
    fn from(value: Location) -> Self {
        Attribute::Location(value)
    }
}

impl From<AffineMap> for Attribute {
    fn from(value: AffineMap) -> Self {
        Attribute::AffineMap(value)
    }
}

impl From<TypeRef> for Attribute {
    fn from(value: TypeRef) -> Self {
        Attribute::Type(value)
    }
}

// ============================================================================
// TypeData
// ============================================================================

/// Data for a single interned type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeData {
    pub dialect: Symbol,
    pub name: Symbol,
    pub params: SmallVec<[TypeRef; 4]>,
    pub attrs: BTreeMap<Symbol, Attribute>,
}

/// Builder for constructing `TypeData` with a fluent API.
pub struct TypeDataBuilder {
    dialect: Symbol,
    name: Symbol,
    params: SmallVec<[TypeRef; 4]>,
    attrs: BTreeMap<Symbol, Attribute>,
}

impl TypeDataBuilder {
    pub fn new(dialect: Symbol, name: Symbol) -> Self {
        Self {
            dialect,
            name,
            params: SmallVec::new(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn param(mut self, ty: TypeRef) -> Self {
        self.params.push(ty);
        self
    }

    pub fn params(mut self, tys: impl IntoIterator<Item = TypeRef>) -> Self {
        self.params.extend(tys);
        self
    }

    pub fn attr(mut self, key: impl Into<Symbol>, val: Attribute) -> Self {
        self.attrs.insert(key.into(), val);
        self
    }

    pub fn build(self) -> TypeData {
        TypeData {
            dialect: self.dialect,
            name: self.name,
            params: self.params,
            attrs: self.attrs,
        }
    }
}

fn shape_attr(shape: &[i64]) -> Attribute {
    Attribute::List(shape.iter().map(|&d| Attribute::from(d)).collect())
}

// ============================================================================
// TypeInterner
// ============================================================================

/// Deduplicating type interner. Same `TypeData` always yields the same `TypeRef`.
///
/// Besides raw interning it knows the builtin `core` types: signless
/// integers, `index`, floats, `vector`, `tensor`, `memref` and function
/// types.
pub struct TypeInterner {
    types: PrimaryMap<TypeRef, TypeData>,
    dedup: HashMap<TypeData, TypeRef>,
}

impl TypeInterner {
    pub fn new() -> Self {
        Self {
            types: PrimaryMap::new(),
            dedup: HashMap::default(),
        }
    }

    /// Intern a type, returning an existing ref if the data matches.
    pub fn intern(&mut self, data: TypeData) -> TypeRef {
        if let Some(&existing) = self.dedup.get(&data) {
            return existing;
        }
        let r = self.types.push(data.clone());
        self.dedup.insert(data, r);
        r
    }

    /// Look up type data by reference.
    pub fn get(&self, r: TypeRef) -> &TypeData {
        &self.types[r]
    }

    /// Check if this type matches the given dialect and name.
    pub fn is_dialect(&self, r: TypeRef, dialect: Symbol, name: Symbol) -> bool {
        let data = &self.types[r];
        data.dialect == dialect && data.name == name
    }

    // === builtin constructors ===

    /// Signless integer `iN`.
    pub fn integer(&mut self, width: u32) -> TypeRef {
        let name = Symbol::from_dynamic(&format!("i{width}"));
        self.intern(
            TypeDataBuilder::new(CORE(), name)
                .attr(ATTR_WIDTH(), Attribute::from(u64::from(width)))
                .build(),
        )
    }

    pub fn index(&mut self) -> TypeRef {
        self.intern(TypeDataBuilder::new(CORE(), INDEX()).build())
    }

    /// IEEE float `fN` (16, 32 or 64 bits).
    pub fn float(&mut self, width: u32) -> TypeRef {
        let name = Symbol::from_dynamic(&format!("f{width}"));
        self.intern(
            TypeDataBuilder::new(CORE(), name)
                .attr(ATTR_WIDTH(), Attribute::from(u64::from(width)))
                .build(),
        )
    }

    pub fn vector(&mut self, shape: &[i64], elem: TypeRef) -> TypeRef {
        self.intern(
            TypeDataBuilder::new(CORE(), VECTOR())
                .param(elem)
                .attr(ATTR_SHAPE(), shape_attr(shape))
                .build(),
        )
    }

    pub fn tensor(&mut self, shape: &[i64], elem: TypeRef) -> TypeRef {
        self.intern(
            TypeDataBuilder::new(CORE(), TENSOR())
                .param(elem)
                .attr(ATTR_SHAPE(), shape_attr(shape))
                .build(),
        )
    }

    /// `memref<shape x elem, layout...>`. An empty layout list means the
    /// identity layout.
    pub fn memref(&mut self, shape: &[i64], elem: TypeRef, layout: Vec<AffineMap>) -> TypeRef {
        let mut builder = TypeDataBuilder::new(CORE(), MEMREF())
            .param(elem)
            .attr(ATTR_SHAPE(), shape_attr(shape));
        if !layout.is_empty() {
            builder = builder.attr(
                ATTR_LAYOUT(),
                Attribute::List(layout.into_iter().map(Attribute::AffineMap).collect()),
            );
        }
        self.intern(builder.build())
    }

    /// `func(inputs) -> results`; params hold inputs followed by results.
    pub fn function(&mut self, inputs: &[TypeRef], results: &[TypeRef]) -> TypeRef {
        self.intern(
            TypeDataBuilder::new(CORE(), FUNC())
                .params(inputs.iter().chain(results).copied())
                .attr(ATTR_NUM_INPUTS(), Attribute::from(inputs.len() as u64))
                .build(),
        )
    }

    // === builtin queries ===

    fn is_core(&self, r: TypeRef, name: Symbol) -> bool {
        self.is_dialect(r, CORE(), name)
    }

    /// Bit width of an `iN` type.
    pub fn integer_width(&self, r: TypeRef) -> Option<u32> {
        let data = &self.types[r];
        if data.dialect != CORE() || !data.name.with_str(|s| s.starts_with('i')) {
            return None;
        }
        data.attrs
            .get(&ATTR_WIDTH())
            .and_then(Attribute::as_int)
            .and_then(|w| u32::try_from(w).ok())
    }

    pub fn is_integer(&self, r: TypeRef) -> bool {
        self.integer_width(r).is_some()
    }

    pub fn is_index(&self, r: TypeRef) -> bool {
        self.is_core(r, INDEX())
    }

    pub fn is_float(&self, r: TypeRef) -> bool {
        let data = &self.types[r];
        data.dialect == CORE()
            && data.attrs.contains_key(&ATTR_WIDTH())
            && data.name.with_str(|s| s.starts_with('f'))
    }

    pub fn is_vector(&self, r: TypeRef) -> bool {
        self.is_core(r, VECTOR())
    }

    pub fn is_memref(&self, r: TypeRef) -> bool {
        self.is_core(r, MEMREF())
    }

    pub fn is_function(&self, r: TypeRef) -> bool {
        self.is_core(r, FUNC())
    }

    /// Vector, tensor or memref.
    pub fn is_shaped(&self, r: TypeRef) -> bool {
        self.is_vector(r) || self.is_core(r, TENSOR()) || self.is_memref(r)
    }

    /// Element type of a shaped type.
    pub fn element_type(&self, r: TypeRef) -> Option<TypeRef> {
        if self.is_shaped(r) {
            self.types[r].params.first().copied()
        } else {
            None
        }
    }

    /// Element type for shaped types, the type itself otherwise.
    pub fn element_type_or_self(&self, r: TypeRef) -> TypeRef {
        self.element_type(r).unwrap_or(r)
    }

    pub fn shape(&self, r: TypeRef) -> Option<SmallVec<[i64; 4]>> {
        if !self.is_shaped(r) {
            return None;
        }
        match self.types[r].attrs.get(&ATTR_SHAPE()) {
            Some(Attribute::List(dims)) => dims.iter().map(Attribute::as_int).collect(),
            _ => None,
        }
    }

    /// Layout maps of a memref; empty for the identity layout.
    pub fn memref_layout(&self, r: TypeRef) -> Vec<AffineMap> {
        match self.types[r].attrs.get(&ATTR_LAYOUT()) {
            Some(Attribute::List(maps)) if self.is_memref(r) => maps
                .iter()
                .filter_map(Attribute::as_affine_map)
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Integer or index, or a shaped container of one.
    pub fn is_integer_like(&self, r: TypeRef) -> bool {
        let elem = self.element_type_or_self(r);
        self.is_integer(elem) || self.is_index(elem)
    }

    pub fn is_float_like(&self, r: TypeRef) -> bool {
        self.is_float(self.element_type_or_self(r))
    }

    /// `i1`, or a shaped container of `i1`.
    pub fn is_bool_like(&self, r: TypeRef) -> bool {
        self.integer_width(self.element_type_or_self(r)) == Some(1)
    }

    /// `(inputs, results)` of a function type.
    pub fn function_signature(&self, r: TypeRef) -> Option<(&[TypeRef], &[TypeRef])> {
        if !self.is_function(r) {
            return None;
        }
        let data = &self.types[r];
        let num_inputs = data.attrs.get(&ATTR_NUM_INPUTS())?.as_int()? as usize;
        if num_inputs > data.params.len() {
            return None;
        }
        Some(data.params.split_at(num_inputs))
    }
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// PathInterner
// ============================================================================

/// Deduplicating path (URI string) interner.
pub struct PathInterner {
    paths: PrimaryMap<PathRef, String>,
    dedup: HashMap<String, PathRef>,
}

impl PathInterner {
    pub fn new() -> Self {
        Self {
            paths: PrimaryMap::new(),
            dedup: HashMap::default(),
        }
    }

    /// Intern a path string, returning an existing ref if the string matches.
    pub fn intern(&mut self, path: String) -> PathRef {
        if let Some(&existing) = self.dedup.get(&path) {
            return existing;
        }
        let r = self.paths.push(path.clone());
        self.dedup.insert(path, r);
        r
    }

    /// Look up path string by reference.
    pub fn get(&self, r: PathRef) -> &str {
        &self.paths[r]
    }
}

impl Default for PathInterner {
    fn default() -> Self {
        Self::new()
    }
}
