//! Operation descriptors and the per-context registry of op kinds.
//!
//! Each kind is identified by `(dialect, name)` and described by an
//! [`OpDescriptor`]: its ordered trait list, the aggregated property bits,
//! and optional hooks for verification, folding, assembly and memory
//! access.

use std::collections::HashMap;

use smallvec::SmallVec;
use tracing::debug;

use crate::asm::ParseFn;
use crate::context::IrContext;
use crate::fold::FoldHook;
use crate::printer::PrintFn;
use crate::refs::{OpRef, ValueRef};
use crate::symbol::Symbol;
use crate::traits::{OpProperties, OpTrait};
use crate::verify::VerifyError;

/// Custom verifier run after all traits succeeded.
pub type VerifyFn = fn(&IrContext, OpRef) -> Result<(), VerifyError>;

/// Whether an op is known to terminate its block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminatorStatus {
    Terminator,
    NonTerminator,
    /// The op kind is not registered.
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

/// Describes how an op kind touches memory: which operand is the memref and
/// where the trailing index operands start.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryAccess {
    pub kind: AccessKind,
    pub memref_operand: u32,
    pub first_index_operand: u32,
    /// Already a vector transfer rather than a scalar access.
    pub vector_transfer: bool,
}

impl MemoryAccess {
    pub const fn read(memref_operand: u32) -> Self {
        Self {
            kind: AccessKind::Read,
            memref_operand,
            first_index_operand: memref_operand + 1,
            vector_transfer: false,
        }
    }

    pub const fn write(memref_operand: u32) -> Self {
        Self {
            kind: AccessKind::Write,
            memref_operand,
            first_index_operand: memref_operand + 1,
            vector_transfer: false,
        }
    }

    pub const fn transfer(self) -> Self {
        Self {
            vector_transfer: true,
            ..self
        }
    }

    pub fn memref(&self, ctx: &IrContext, op: OpRef) -> ValueRef {
        ctx.op_operand(op, self.memref_operand)
    }

    pub fn indices<'a>(&self, ctx: &'a IrContext, op: OpRef) -> &'a [ValueRef] {
        let operands = ctx.op_operands(op);
        operands
            .get(self.first_index_operand as usize..)
            .unwrap_or(&[])
    }
}

/// Capability descriptor of one op kind.
#[derive(Clone, Debug)]
pub struct OpDescriptor {
    pub dialect: Symbol,
    pub name: Symbol,
    pub traits: SmallVec<[OpTrait; 8]>,
    pub properties: OpProperties,
    pub verifier: Option<VerifyFn>,
    pub fold: Option<FoldHook>,
    pub parse: Option<ParseFn>,
    pub print: Option<PrintFn>,
    pub memory_access: Option<MemoryAccess>,
}

impl OpDescriptor {
    pub fn new(dialect: Symbol, name: Symbol) -> Self {
        Self {
            dialect,
            name,
            traits: SmallVec::new(),
            properties: OpProperties::empty(),
            verifier: None,
            fold: None,
            parse: None,
            print: None,
            memory_access: None,
        }
    }

    /// Append traits in declaration order.
    pub fn with_traits(mut self, traits: impl IntoIterator<Item = OpTrait>) -> Self {
        for t in traits {
            self.properties |= t.property();
            self.traits.push(t);
        }
        self
    }

    pub fn with_verifier(mut self, verifier: VerifyFn) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_fold(mut self, fold: FoldHook) -> Self {
        self.fold = Some(fold);
        self
    }

    pub fn with_asm(mut self, parse: ParseFn, print: PrintFn) -> Self {
        self.parse = Some(parse);
        self.print = Some(print);
        self
    }

    pub fn with_memory_access(mut self, access: MemoryAccess) -> Self {
        self.memory_access = Some(access);
        self
    }
}

/// Registered op kinds keyed by `(dialect, name)`.
#[derive(Default)]
pub struct OpRegistry {
    descriptors: HashMap<(Symbol, Symbol), OpDescriptor>,
}

impl OpRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kind, replacing any previous descriptor of the same name.
    pub fn register(&mut self, descriptor: OpDescriptor) {
        debug!(
            "registering op kind {}.{}",
            descriptor.dialect, descriptor.name
        );
        self.descriptors
            .insert((descriptor.dialect, descriptor.name), descriptor);
    }

    pub fn get(&self, dialect: Symbol, name: Symbol) -> Option<&OpDescriptor> {
        self.descriptors.get(&(dialect, name))
    }

    pub fn contains(&self, dialect: Symbol, name: Symbol) -> bool {
        self.descriptors.contains_key(&(dialect, name))
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl IrContext {
    /// Descriptor of `op`'s kind, if registered.
    pub fn descriptor(&self, op: OpRef) -> Option<&OpDescriptor> {
        let data = self.op(op);
        self.registry.get(data.dialect, data.name)
    }

    /// Aggregated properties; empty for unregistered kinds.
    pub fn op_properties(&self, op: OpRef) -> OpProperties {
        self.descriptor(op)
            .map_or(OpProperties::empty(), |d| d.properties)
    }

    pub fn is_commutative(&self, op: OpRef) -> bool {
        self.op_properties(op).contains(OpProperties::COMMUTATIVE)
    }

    pub fn has_no_side_effect(&self, op: OpRef) -> bool {
        self.op_properties(op).contains(OpProperties::NO_SIDE_EFFECT)
    }

    pub fn is_constant_like(&self, op: OpRef) -> bool {
        self.op_properties(op).contains(OpProperties::CONSTANT_LIKE)
    }

    pub fn is_isolated_from_above(&self, op: OpRef) -> bool {
        self.op_properties(op)
            .contains(OpProperties::ISOLATED_FROM_ABOVE)
    }

    pub fn terminator_status(&self, op: OpRef) -> TerminatorStatus {
        match self.descriptor(op) {
            None => TerminatorStatus::Unknown,
            Some(d) if d.properties.contains(OpProperties::TERMINATOR) => {
                TerminatorStatus::Terminator
            }
            Some(_) => TerminatorStatus::NonTerminator,
        }
    }

    pub fn memory_access(&self, op: OpRef) -> Option<MemoryAccess> {
        self.descriptor(op).and_then(|d| d.memory_access)
    }
}
