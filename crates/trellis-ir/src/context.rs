//! IrContext: arena-based mutable IR storage.
//!
//! All IR entities (operations, values, blocks, regions) are stored in
//! `PrimaryMap`s owned by `IrContext`. Entity lists (operands, results)
//! use `EntityList + ListPool` for compact 4-byte per-field storage.
//!
//! Operations inside a block form an intrusive doubly linked list, so
//! insertion, removal and relocation are O(1). Each operation also carries
//! an order index that makes `is_before_in_block` O(1) amortized; the
//! indices of a block are recomputed lazily once an insertion finds no gap
//! between its neighbours.

use std::cell::Cell;
use std::collections::BTreeMap;

use cranelift_entity::{EntityList, ListPool, PrimaryMap, SecondaryMap};
use smallvec::SmallVec;
use tracing::trace;

use crate::diagnostics::DiagnosticEngine;
use crate::location::Location;
use crate::refs::*;
use crate::registry::OpRegistry;
use crate::symbol::Symbol;
use crate::types::*;

/// Gap left between the order indices of neighbouring operations.
const ORDER_STRIDE: u32 = 5;

// ============================================================================
// Use-chain
// ============================================================================

/// A single use of a value: which operation uses it, at which operand index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Use {
    pub user: OpRef,
    pub operand_index: u32,
}

// ============================================================================
// Entity data types
// ============================================================================

/// Data for a single operation in the arena.
///
/// Successor operands are stored at the tail of `operands`;
/// `successor_operand_counts[i]` is the size of the group forwarded to
/// `successors[i]`.
pub struct OperationData {
    pub location: Location,
    pub dialect: Symbol,
    pub name: Symbol,
    pub operands: EntityList<ValueRef>,
    pub results: EntityList<TypeRef>,
    pub attributes: BTreeMap<Symbol, Attribute>,
    pub regions: SmallVec<[RegionRef; 4]>,
    pub successors: SmallVec<[BlockRef; 4]>,
    pub successor_operand_counts: SmallVec<[u32; 2]>,
    parent_block: Option<BlockRef>,
    prev: Option<OpRef>,
    next: Option<OpRef>,
    order: Cell<u32>,
    erased: bool,
}

/// Data for a single SSA value.
pub struct ValueData {
    pub def: ValueDef,
    pub ty: TypeRef,
}

/// Data for a block argument (type + optional attributes).
#[derive(Clone, Debug)]
pub struct BlockArgData {
    pub ty: TypeRef,
    pub attrs: BTreeMap<Symbol, Attribute>,
}

impl BlockArgData {
    pub fn new(ty: TypeRef) -> Self {
        Self {
            ty,
            attrs: BTreeMap::new(),
        }
    }
}

/// Data for a basic block.
pub struct BlockData {
    pub location: Location,
    pub args: Vec<BlockArgData>,
    parent_region: Option<RegionRef>,
    first_op: Option<OpRef>,
    last_op: Option<OpRef>,
    len: u32,
    order_valid: Cell<bool>,
    erased: bool,
}

impl BlockData {
    pub fn new(location: Location, args: impl IntoIterator<Item = BlockArgData>) -> Self {
        Self {
            location,
            args: args.into_iter().collect(),
            parent_region: None,
            first_op: None,
            last_op: None,
            len: 0,
            order_valid: Cell::new(true),
            erased: false,
        }
    }
}

/// Data for a region (list of blocks).
pub struct RegionData {
    pub location: Location,
    blocks: SmallVec<[BlockRef; 4]>,
    parent_op: Option<OpRef>,
    erased: bool,
}

impl RegionData {
    pub fn new(location: Location, blocks: impl IntoIterator<Item = BlockRef>) -> Self {
        Self {
            location,
            blocks: blocks.into_iter().collect(),
            parent_op: None,
            erased: false,
        }
    }
}

// ============================================================================
// IrContext
// ============================================================================

/// Arena-based mutable IR context.
///
/// Owns all IR entities and provides methods for creating, querying,
/// and mutating them. Use-chains are automatically maintained.
///
/// The context also owns the operation registry and the diagnostic sink.
/// It uses interior mutability for lazily recomputed order indices and is
/// therefore not `Sync`.
pub struct IrContext {
    ops: PrimaryMap<OpRef, OperationData>,
    values: PrimaryMap<ValueRef, ValueData>,
    blocks: PrimaryMap<BlockRef, BlockData>,
    regions: PrimaryMap<RegionRef, RegionData>,

    /// Use-chain: for each value, the list of operations that use it.
    uses: SecondaryMap<ValueRef, SmallVec<[Use; 2]>>,

    /// Type and path interners.
    pub types: TypeInterner,
    pub paths: PathInterner,

    /// Registered operation kinds.
    pub registry: OpRegistry,
    /// Sink for errors, warnings and remarks.
    pub diagnostics: DiagnosticEngine,

    /// Backing pools for EntityList storage.
    value_pool: ListPool<ValueRef>,
    type_pool: ListPool<TypeRef>,

    /// Mapping from operation to its result ValueRefs.
    result_values: SecondaryMap<OpRef, EntityList<ValueRef>>,
    /// Mapping from block to its argument ValueRefs.
    block_arg_values: SecondaryMap<BlockRef, EntityList<ValueRef>>,
}

impl IrContext {
    /// Create a new IR context with the builtin `core` and `func` dialects
    /// registered.
    pub fn new() -> Self {
        let mut ctx = Self {
            ops: PrimaryMap::new(),
            values: PrimaryMap::new(),
            blocks: PrimaryMap::new(),
            regions: PrimaryMap::new(),
            uses: SecondaryMap::new(),
            types: TypeInterner::new(),
            paths: PathInterner::new(),
            registry: OpRegistry::new(),
            diagnostics: DiagnosticEngine::new(),
            value_pool: ListPool::new(),
            type_pool: ListPool::new(),
            result_values: SecondaryMap::new(),
            block_arg_values: SecondaryMap::new(),
        };
        crate::dialect::register_builtin_dialects(&mut ctx.registry);
        ctx
    }

    // ========================================================================
    // Operation
    // ========================================================================

    /// Create a new operation and allocate result values for it.
    ///
    /// The operation's operands are registered in the use-chain. The new
    /// operation is detached; use `push_op` or `insert_op_before` to attach
    /// it to a block. No verification happens here.
    ///
    /// # Panics
    ///
    /// Panics if any region in `data.regions` already belongs to another
    /// operation.
    pub fn create_op(&mut self, data: OperationData) -> OpRef {
        let operand_slice: SmallVec<[ValueRef; 8]> =
            data.operands.as_slice(&self.value_pool).into();
        let result_types: SmallVec<[TypeRef; 4]> = data.results.as_slice(&self.type_pool).into();
        let regions: SmallVec<[RegionRef; 4]> = data.regions.clone();

        let op = self.ops.push(data);

        // Back-link owned regions to this operation
        for &r in &regions {
            if let Some(existing) = self.regions[r].parent_op {
                panic!(
                    "create_op: region {r} already belongs to operation {existing}; \
                     cannot reassign to {op}",
                );
            }
            self.regions[r].parent_op = Some(op);
        }

        for (idx, &val) in operand_slice.iter().enumerate() {
            self.uses[val].push(Use {
                user: op,
                operand_index: idx as u32,
            });
        }

        let mut result_value_list = EntityList::new();
        for (idx, &ty) in result_types.iter().enumerate() {
            let v = self.values.push(ValueData {
                def: ValueDef::OpResult(op, idx as u32),
                ty,
            });
            result_value_list.push(v, &mut self.value_pool);
        }
        self.result_values[op] = result_value_list;

        op
    }

    /// Get immutable reference to operation data.
    pub fn op(&self, op: OpRef) -> &OperationData {
        &self.ops[op]
    }

    /// Get mutable reference to operation data.
    ///
    /// **Warning**: Modifying operands directly will desync the use-chain.
    /// Prefer `set_operand`, `replace_all_uses_with` or re-creating the
    /// operation.
    pub fn op_mut(&mut self, op: OpRef) -> &mut OperationData {
        &mut self.ops[op]
    }

    /// `dialect.name` of an operation.
    pub fn op_name(&self, op: OpRef) -> String {
        let data = &self.ops[op];
        format!("{}.{}", data.dialect, data.name)
    }

    /// Whether the operation is of the given kind.
    pub fn op_is(&self, op: OpRef, dialect: Symbol, name: Symbol) -> bool {
        let data = &self.ops[op];
        data.dialect == dialect && data.name == name
    }

    /// Get the operands of an operation as a slice.
    pub fn op_operands(&self, op: OpRef) -> &[ValueRef] {
        self.ops[op].operands.as_slice(&self.value_pool)
    }

    pub fn op_operand(&self, op: OpRef, index: u32) -> ValueRef {
        self.op_operands(op)[index as usize]
    }

    /// Operands not forwarded to any successor.
    pub fn non_successor_operands(&self, op: OpRef) -> &[ValueRef] {
        let forwarded: u32 = self.ops[op].successor_operand_counts.iter().sum();
        let operands = self.op_operands(op);
        &operands[..operands.len() - forwarded as usize]
    }

    /// Operands forwarded to the `index`-th successor.
    pub fn successor_operands(&self, op: OpRef, index: usize) -> &[ValueRef] {
        let data = &self.ops[op];
        let forwarded: u32 = data.successor_operand_counts.iter().sum();
        let operands = self.op_operands(op);
        let mut start = operands.len() - forwarded as usize;
        for &count in &data.successor_operand_counts[..index] {
            start += count as usize;
        }
        let len = data.successor_operand_counts[index] as usize;
        &operands[start..start + len]
    }

    /// Point operand slot `index` of `op` at `value`, keeping use-chains in sync.
    pub fn set_operand(&mut self, op: OpRef, index: u32, value: ValueRef) {
        let slice = self.ops[op].operands.as_mut_slice(&mut self.value_pool);
        let old = slice[index as usize];
        if old == value {
            return;
        }
        slice[index as usize] = value;
        self.uses[old].retain(|u| !(u.user == op && u.operand_index == index));
        self.uses[value].push(Use {
            user: op,
            operand_index: index,
        });
    }

    /// Replace every operand of `op` that refers to `from` with `to`.
    pub fn replace_uses_of_with(&mut self, op: OpRef, from: ValueRef, to: ValueRef) {
        let hits: SmallVec<[u32; 4]> = self
            .op_operands(op)
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v == from)
            .map(|(i, _)| i as u32)
            .collect();
        for idx in hits {
            self.set_operand(op, idx, to);
        }
    }

    /// Get the result types of an operation as a slice.
    pub fn op_result_types(&self, op: OpRef) -> &[TypeRef] {
        self.ops[op].results.as_slice(&self.type_pool)
    }

    /// Get the i-th result value of an operation.
    pub fn op_result(&self, op: OpRef, index: u32) -> ValueRef {
        self.result_values[op].as_slice(&self.value_pool)[index as usize]
    }

    /// Get all result values of an operation.
    pub fn op_results(&self, op: OpRef) -> &[ValueRef] {
        self.result_values[op].as_slice(&self.value_pool)
    }

    pub fn op_regions(&self, op: OpRef) -> &[RegionRef] {
        &self.ops[op].regions
    }

    pub fn op_successors(&self, op: OpRef) -> &[BlockRef] {
        &self.ops[op].successors
    }

    pub fn op_attr(&self, op: OpRef, key: Symbol) -> Option<&Attribute> {
        self.ops[op].attributes.get(&key)
    }

    pub fn set_op_attr(&mut self, op: OpRef, key: impl Into<Symbol>, val: Attribute) {
        self.ops[op].attributes.insert(key.into(), val);
    }

    pub fn remove_op_attr(&mut self, op: OpRef, key: Symbol) -> Option<Attribute> {
        self.ops[op].attributes.remove(&key)
    }

    /// Block containing the operation, if attached.
    pub fn op_block(&self, op: OpRef) -> Option<BlockRef> {
        self.ops[op].parent_block
    }

    /// Region containing the operation's block.
    pub fn parent_region(&self, op: OpRef) -> Option<RegionRef> {
        self.ops[op]
            .parent_block
            .and_then(|b| self.blocks[b].parent_region)
    }

    /// Operation owning the region that contains this operation.
    pub fn parent_op(&self, op: OpRef) -> Option<OpRef> {
        self.parent_region(op).and_then(|r| self.regions[r].parent_op)
    }

    pub fn is_erased(&self, op: OpRef) -> bool {
        self.ops[op].erased
    }

    /// Whether no result of `op` has any use.
    pub fn use_empty(&self, op: OpRef) -> bool {
        self.op_results(op).iter().all(|&v| self.uses[v].is_empty())
    }

    pub fn next_op(&self, op: OpRef) -> Option<OpRef> {
        self.ops[op].next
    }

    pub fn prev_op(&self, op: OpRef) -> Option<OpRef> {
        self.ops[op].prev
    }

    /// Detach an operation from its block (if any), drop all references
    /// held by it and its nested operations, and destroy it together with
    /// everything it owns.
    ///
    /// # Panics
    ///
    /// Panics if any result value of the operation still has uses,
    /// as that would leave dangling references.
    pub fn erase_op(&mut self, op: OpRef) {
        assert!(
            !self.ops[op].erased,
            "erase_op: operation {op} is already erased"
        );
        for &val in self.op_results(op) {
            assert!(
                self.uses[val].is_empty(),
                "erase_op: result value {val} still has {} use(s); \
                 replace all uses before erasing the operation",
                self.uses[val].len()
            );
        }
        if let Some(block) = self.ops[op].parent_block {
            self.unlink_op(block, op);
        }
        self.drop_all_references(op);
        self.destroy_op(op);
    }

    /// Drop every operand and successor edge held by `op` and by all
    /// operations nested in its regions.
    ///
    /// Afterwards the operations hold no operands, so their values can only
    /// be kept alive by users outside the subtree.
    pub fn drop_all_references(&mut self, op: OpRef) {
        self.drop_op_references(op);
        let regions = self.ops[op].regions.clone();
        for region in regions {
            let blocks = self.regions[region].blocks.clone();
            for block in blocks {
                let nested: SmallVec<[OpRef; 8]> = self.block_ops(block).collect();
                for inner in nested {
                    self.drop_all_references(inner);
                }
            }
        }
    }

    fn drop_op_references(&mut self, op: OpRef) {
        let operands: SmallVec<[ValueRef; 8]> = self.op_operands(op).into();
        for (idx, &val) in operands.iter().enumerate() {
            self.uses[val].retain(|u| !(u.user == op && u.operand_index == idx as u32));
        }
        self.ops[op].operands.clear(&mut self.value_pool);
        self.ops[op].successors.clear();
        self.ops[op].successor_operand_counts.clear();
    }

    fn destroy_op(&mut self, op: OpRef) {
        let regions = self.ops[op].regions.clone();
        for region in regions {
            self.destroy_region(region);
        }
        let data = &mut self.ops[op];
        data.erased = true;
        data.parent_block = None;
        data.prev = None;
        data.next = None;
    }

    fn destroy_region(&mut self, region: RegionRef) {
        let blocks = std::mem::take(&mut self.regions[region].blocks);
        for block in blocks {
            self.destroy_block(block);
        }
        self.regions[region].erased = true;
    }

    fn destroy_block(&mut self, block: BlockRef) {
        let ops: SmallVec<[OpRef; 8]> = self.block_ops(block).collect();
        for op in ops {
            self.destroy_op(op);
        }
        let data = &mut self.blocks[block];
        data.first_op = None;
        data.last_op = None;
        data.len = 0;
        data.parent_region = None;
        data.erased = true;
    }

    /// Move `op` immediately before `target`, possibly into another block.
    pub fn move_op_before(&mut self, op: OpRef, target: OpRef) {
        assert!(op != target, "move_op_before: cannot move {op} before itself");
        let Some(block) = self.ops[target].parent_block else {
            panic!("move_op_before: target operation {target} is not in a block");
        };
        if let Some(old) = self.ops[op].parent_block {
            self.unlink_op(old, op);
        }
        self.link_op(block, op, Some(target));
    }

    /// Move `op` to the end of `block`.
    pub fn move_op_to_end(&mut self, op: OpRef, block: BlockRef) {
        if let Some(old) = self.ops[op].parent_block {
            self.unlink_op(old, op);
        }
        self.link_op(block, op, None);
    }

    /// Whether `a` comes before `b` in their common block.
    ///
    /// # Panics
    ///
    /// Panics if the operations are not in the same block.
    pub fn is_before_in_block(&self, a: OpRef, b: OpRef) -> bool {
        let Some(block) = self.ops[a]
            .parent_block
            .filter(|&blk| self.ops[b].parent_block == Some(blk))
        else {
            panic!("is_before_in_block: {a} and {b} are not in the same block");
        };
        if !self.blocks[block].order_valid.get() {
            self.recompute_order(block);
        }
        self.ops[a].order.get() < self.ops[b].order.get()
    }

    /// The ancestor of `op` (possibly `op` itself) that lives directly in
    /// `block`.
    pub fn find_ancestor_op_in_block(&self, block: BlockRef, op: OpRef) -> Option<OpRef> {
        let mut current = op;
        loop {
            let parent = self.ops[current].parent_block?;
            if parent == block {
                return Some(current);
            }
            current = self.block_parent_op(parent)?;
        }
    }

    // ========================================================================
    // Value
    // ========================================================================

    /// Get immutable reference to value data.
    pub fn value(&self, v: ValueRef) -> &ValueData {
        &self.values[v]
    }

    /// Get the type of a value.
    pub fn value_ty(&self, v: ValueRef) -> TypeRef {
        self.values[v].ty
    }

    /// Get the definition of a value.
    pub fn value_def(&self, v: ValueRef) -> ValueDef {
        self.values[v].def
    }

    /// Operation producing `v`, or `None` for block arguments.
    pub fn defining_op(&self, v: ValueRef) -> Option<OpRef> {
        self.values[v].def.op()
    }

    /// Block that owns `v`: the argument's block or the defining op's block.
    pub fn value_block(&self, v: ValueRef) -> Option<BlockRef> {
        match self.values[v].def {
            ValueDef::OpResult(op, _) => self.ops[op].parent_block,
            ValueDef::BlockArg(block, _) => Some(block),
        }
    }

    // ========================================================================
    // Block
    // ========================================================================

    /// Create a new block and allocate argument values for it.
    pub fn create_block(&mut self, data: BlockData) -> BlockRef {
        let arg_types: Vec<TypeRef> = data.args.iter().map(|a| a.ty).collect();
        let block = self.blocks.push(data);

        let mut arg_value_list = EntityList::new();
        for (idx, ty) in arg_types.into_iter().enumerate() {
            let v = self.values.push(ValueData {
                def: ValueDef::BlockArg(block, idx as u32),
                ty,
            });
            arg_value_list.push(v, &mut self.value_pool);
        }
        self.block_arg_values[block] = arg_value_list;

        block
    }

    /// Get immutable reference to block data.
    pub fn block(&self, b: BlockRef) -> &BlockData {
        &self.blocks[b]
    }

    /// Get mutable reference to block data.
    pub fn block_mut(&mut self, b: BlockRef) -> &mut BlockData {
        &mut self.blocks[b]
    }

    /// Get the i-th block argument value.
    pub fn block_arg(&self, b: BlockRef, index: u32) -> ValueRef {
        self.block_arg_values[b].as_slice(&self.value_pool)[index as usize]
    }

    /// Get all block argument values.
    pub fn block_args(&self, b: BlockRef) -> &[ValueRef] {
        self.block_arg_values[b].as_slice(&self.value_pool)
    }

    /// Append a new argument to a block.
    pub fn add_block_arg(&mut self, b: BlockRef, ty: TypeRef) -> ValueRef {
        let idx = self.blocks[b].args.len() as u32;
        self.blocks[b].args.push(BlockArgData::new(ty));
        let v = self.values.push(ValueData {
            def: ValueDef::BlockArg(b, idx),
            ty,
        });
        self.block_arg_values[b].push(v, &mut self.value_pool);
        v
    }

    /// Operations of a block in program order. Also iterates backwards.
    pub fn block_ops(&self, b: BlockRef) -> BlockOps<'_> {
        let data = &self.blocks[b];
        BlockOps {
            ctx: self,
            front: data.first_op,
            back: data.last_op,
            remaining: data.len as usize,
        }
    }

    pub fn first_op(&self, b: BlockRef) -> Option<OpRef> {
        self.blocks[b].first_op
    }

    pub fn last_op(&self, b: BlockRef) -> Option<OpRef> {
        self.blocks[b].last_op
    }

    pub fn num_ops(&self, b: BlockRef) -> usize {
        self.blocks[b].len as usize
    }

    pub fn block_region(&self, b: BlockRef) -> Option<RegionRef> {
        self.blocks[b].parent_region
    }

    /// Operation owning the region that contains the block.
    pub fn block_parent_op(&self, b: BlockRef) -> Option<OpRef> {
        self.blocks[b]
            .parent_region
            .and_then(|r| self.regions[r].parent_op)
    }

    /// Successors of the block's last operation.
    pub fn block_successors(&self, b: BlockRef) -> &[BlockRef] {
        match self.blocks[b].last_op {
            Some(op) => &self.ops[op].successors,
            None => &[],
        }
    }

    pub fn is_block_erased(&self, b: BlockRef) -> bool {
        self.blocks[b].erased
    }

    /// Append an operation to the end of a block.
    ///
    /// # Panics
    ///
    /// Panics if the operation already belongs to a block.
    pub fn push_op(&mut self, block: BlockRef, op: OpRef) {
        if let Some(existing) = self.ops[op].parent_block {
            panic!(
                "push_op: operation {op} already belongs to block {existing}; \
                 remove it from the old block first"
            );
        }
        self.link_op(block, op, None);
    }

    /// Insert an operation before `before` in the given block.
    ///
    /// # Panics
    ///
    /// Panics if the operation already belongs to a block, or if `before`
    /// is not in the block.
    pub fn insert_op_before(&mut self, block: BlockRef, before: OpRef, op: OpRef) {
        if let Some(existing) = self.ops[op].parent_block {
            panic!(
                "insert_op_before: operation {op} already belongs to block {existing}; \
                 remove it from the old block first"
            );
        }
        assert!(
            self.ops[before].parent_block == Some(block),
            "insert_op_before: {before} is not in block {block}"
        );
        self.link_op(block, op, Some(before));
    }

    /// Remove an operation from a block without destroying it.
    ///
    /// # Panics
    ///
    /// Panics if the operation is not in `block`.
    pub fn remove_op_from_block(&mut self, block: BlockRef, op: OpRef) {
        assert!(
            self.ops[op].parent_block == Some(block),
            "remove_op_from_block: {op} is not in block {block}"
        );
        self.unlink_op(block, op);
    }

    /// Detach a block from its region and destroy it along with its
    /// operations.
    ///
    /// # Panics
    ///
    /// Panics if a value defined in the block is still used from outside.
    pub fn erase_block(&mut self, block: BlockRef) {
        let ops: SmallVec<[OpRef; 8]> = self.block_ops(block).collect();
        for &op in &ops {
            self.drop_all_references(op);
        }
        let defined = self
            .block_args(block)
            .iter()
            .chain(ops.iter().flat_map(|&op| self.op_results(op)));
        for &val in defined {
            assert!(
                self.uses[val].is_empty(),
                "erase_block: value {val} still has {} use(s)",
                self.uses[val].len()
            );
        }
        if let Some(region) = self.blocks[block].parent_region {
            self.regions[region].blocks.retain(|b| *b != block);
        }
        self.destroy_block(block);
    }

    fn link_op(&mut self, block: BlockRef, op: OpRef, before: Option<OpRef>) {
        let prev = match before {
            Some(b) => self.ops[b].prev,
            None => self.blocks[block].last_op,
        };
        {
            let data = &mut self.ops[op];
            data.prev = prev;
            data.next = before;
            data.parent_block = Some(block);
        }
        match prev {
            Some(p) => self.ops[p].next = Some(op),
            None => self.blocks[block].first_op = Some(op),
        }
        match before {
            Some(n) => self.ops[n].prev = Some(op),
            None => self.blocks[block].last_op = Some(op),
        }
        self.blocks[block].len += 1;
        self.assign_order(block, op);
    }

    fn unlink_op(&mut self, block: BlockRef, op: OpRef) {
        let (prev, next) = (self.ops[op].prev, self.ops[op].next);
        match prev {
            Some(p) => self.ops[p].next = next,
            None => self.blocks[block].first_op = next,
        }
        match next {
            Some(n) => self.ops[n].prev = prev,
            None => self.blocks[block].last_op = prev,
        }
        let data = &mut self.ops[op];
        data.prev = None;
        data.next = None;
        data.parent_block = None;
        self.blocks[block].len -= 1;
    }

    fn assign_order(&mut self, block: BlockRef, op: OpRef) {
        if !self.blocks[block].order_valid.get() {
            return;
        }
        let prev_order = self.ops[op].prev.map_or(0, |p| self.ops[p].order.get());
        let order = match self.ops[op].next {
            None => prev_order.checked_add(ORDER_STRIDE),
            Some(next) => {
                let next_order = self.ops[next].order.get();
                (next_order.saturating_sub(prev_order) > 1)
                    .then(|| prev_order + (next_order - prev_order) / 2)
            }
        };
        match order {
            Some(order) => self.ops[op].order.set(order),
            None => {
                trace!(%block, %op, "no order gap left, invalidating block order");
                self.blocks[block].order_valid.set(false);
            }
        }
    }

    fn recompute_order(&self, block: BlockRef) {
        let mut order = 0u32;
        for op in self.block_ops(block) {
            order += ORDER_STRIDE;
            self.ops[op].order.set(order);
        }
        self.blocks[block].order_valid.set(true);
    }

    // ========================================================================
    // Region
    // ========================================================================

    /// Create a new region.
    ///
    /// # Panics
    ///
    /// Panics if any block in `data.blocks` already belongs to another region.
    pub fn create_region(&mut self, data: RegionData) -> RegionRef {
        let region = self.regions.push(data);

        let blocks: SmallVec<[BlockRef; 4]> = self.regions[region].blocks.clone();
        for &b in &blocks {
            if let Some(existing) = self.blocks[b].parent_region {
                panic!(
                    "create_region: block {b} already belongs to region {existing}; \
                     cannot reassign to {region}",
                );
            }
            self.blocks[b].parent_region = Some(region);
        }

        region
    }

    /// Get immutable reference to region data.
    pub fn region(&self, r: RegionRef) -> &RegionData {
        &self.regions[r]
    }

    pub fn region_blocks(&self, r: RegionRef) -> &[BlockRef] {
        &self.regions[r].blocks
    }

    /// Operation owning the region.
    pub fn region_op(&self, r: RegionRef) -> Option<OpRef> {
        self.regions[r].parent_op
    }

    /// The first block of the region.
    pub fn entry_block(&self, r: RegionRef) -> Option<BlockRef> {
        self.regions[r].blocks.first().copied()
    }

    pub fn is_region_erased(&self, r: RegionRef) -> bool {
        self.regions[r].erased
    }

    /// Append a block to a region.
    ///
    /// # Panics
    ///
    /// Panics if the block already belongs to a region.
    pub fn push_block(&mut self, region: RegionRef, block: BlockRef) {
        if let Some(existing) = self.blocks[block].parent_region {
            panic!("push_block: block {block} already belongs to region {existing}");
        }
        self.blocks[block].parent_region = Some(region);
        self.regions[region].blocks.push(block);
    }

    // ========================================================================
    // Use-chain
    // ========================================================================

    /// Get all uses of a value.
    pub fn uses(&self, v: ValueRef) -> &[Use] {
        &self.uses[v]
    }

    /// Check if a value has any uses.
    pub fn has_uses(&self, v: ValueRef) -> bool {
        !self.uses[v].is_empty()
    }

    /// Operations using `v`, once per use.
    pub fn users(&self, v: ValueRef) -> impl Iterator<Item = OpRef> + '_ {
        self.uses[v].iter().map(|u| u.user)
    }

    // ========================================================================
    // RAUW (Replace All Uses With)
    // ========================================================================

    /// Replace all uses of `old` with `new` in all operations.
    ///
    /// Updates both operand lists and the use-chain; `old` is left with no
    /// uses.
    pub fn replace_all_uses_with(&mut self, old: ValueRef, new: ValueRef) {
        if old == new {
            return;
        }
        let old_uses = std::mem::take(&mut self.uses[old]);

        for u in &old_uses {
            let operands = &mut self.ops[u.user].operands;
            let slice = operands.as_mut_slice(&mut self.value_pool);
            debug_assert_eq!(slice[u.operand_index as usize], old);
            slice[u.operand_index as usize] = new;

            self.uses[new].push(*u);
        }
    }
}

impl Default for IrContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the operations of a block.
pub struct BlockOps<'a> {
    ctx: &'a IrContext,
    front: Option<OpRef>,
    back: Option<OpRef>,
    remaining: usize,
}

impl Iterator for BlockOps<'_> {
    type Item = OpRef;

    fn next(&mut self) -> Option<OpRef> {
        if self.remaining == 0 {
            return None;
        }
        let op = self.front?;
        self.remaining -= 1;
        self.front = self.ctx.ops[op].next;
        Some(op)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl DoubleEndedIterator for BlockOps<'_> {
    fn next_back(&mut self) -> Option<OpRef> {
        if self.remaining == 0 {
            return None;
        }
        let op = self.back?;
        self.remaining -= 1;
        self.back = self.ctx.ops[op].prev;
        Some(op)
    }
}

impl ExactSizeIterator for BlockOps<'_> {}

// ============================================================================
// Helper constructors for OperationData
// ============================================================================

impl OperationData {
    /// Create a new OperationData with the given basic fields.
    /// Operands and results must be added via the pool-backed EntityList.
    pub fn new(location: Location, dialect: Symbol, name: Symbol) -> Self {
        Self {
            location,
            dialect,
            name,
            operands: EntityList::new(),
            results: EntityList::new(),
            attributes: BTreeMap::new(),
            regions: SmallVec::new(),
            successors: SmallVec::new(),
            successor_operand_counts: SmallVec::new(),
            parent_block: None,
            prev: None,
            next: None,
            order: Cell::new(0),
            erased: false,
        }
    }
}

/// Builder for constructing `OperationData` with pool-backed lists.
///
/// Collects operands and result types into `Vec`s, then packs them
/// into `EntityList`s on `build()`. Successor operand groups are appended
/// after the plain operands.
pub struct OperationDataBuilder {
    location: Location,
    dialect: Symbol,
    name: Symbol,
    operands: Vec<ValueRef>,
    results: Vec<TypeRef>,
    attributes: BTreeMap<Symbol, Attribute>,
    regions: SmallVec<[RegionRef; 4]>,
    empty_regions: usize,
    successors: SmallVec<[(BlockRef, SmallVec<[ValueRef; 2]>); 2]>,
}

impl OperationDataBuilder {
    pub fn new(location: Location, dialect: Symbol, name: Symbol) -> Self {
        Self {
            location,
            dialect,
            name,
            operands: Vec::new(),
            results: Vec::new(),
            attributes: BTreeMap::new(),
            regions: SmallVec::new(),
            empty_regions: 0,
            successors: SmallVec::new(),
        }
    }

    pub fn operand(mut self, v: ValueRef) -> Self {
        self.operands.push(v);
        self
    }

    pub fn operands(mut self, vs: impl IntoIterator<Item = ValueRef>) -> Self {
        self.operands.extend(vs);
        self
    }

    pub fn result(mut self, ty: TypeRef) -> Self {
        self.results.push(ty);
        self
    }

    pub fn results(mut self, tys: impl IntoIterator<Item = TypeRef>) -> Self {
        self.results.extend(tys);
        self
    }

    pub fn attr(mut self, key: impl Into<Symbol>, val: Attribute) -> Self {
        self.attributes.insert(key.into(), val);
        self
    }

    /// Attach a pre-built region.
    pub fn region(mut self, r: RegionRef) -> Self {
        self.regions.push(r);
        self
    }

    /// Request `n` additional empty regions, created on `build()`.
    pub fn num_regions(mut self, n: usize) -> Self {
        self.empty_regions += n;
        self
    }

    pub fn successor(mut self, b: BlockRef) -> Self {
        self.successors.push((b, SmallVec::new()));
        self
    }

    /// Add a successor together with the operands forwarded to it.
    pub fn successor_with_operands(
        mut self,
        b: BlockRef,
        vs: impl IntoIterator<Item = ValueRef>,
    ) -> Self {
        self.successors.push((b, vs.into_iter().collect()));
        self
    }

    // In-place variants used by asm parse hooks.

    pub fn push_operand(&mut self, v: ValueRef) {
        self.operands.push(v);
    }

    pub fn push_result(&mut self, ty: TypeRef) {
        self.results.push(ty);
    }

    pub fn insert_attr(&mut self, key: impl Into<Symbol>, val: Attribute) {
        self.attributes.insert(key.into(), val);
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn dialect(&self) -> Symbol {
        self.dialect
    }

    pub fn name(&self) -> Symbol {
        self.name
    }

    /// Build the `OperationData`, packing vecs into `EntityList`s using
    /// the context's pools.
    pub fn build(self, ctx: &mut IrContext) -> OperationData {
        let mut operands = EntityList::new();
        for v in self.operands {
            operands.push(v, &mut ctx.value_pool);
        }
        let mut successors = SmallVec::new();
        let mut successor_operand_counts = SmallVec::new();
        for (block, group) in self.successors {
            successors.push(block);
            successor_operand_counts.push(group.len() as u32);
            for v in group {
                operands.push(v, &mut ctx.value_pool);
            }
        }
        let mut results = EntityList::new();
        for ty in self.results {
            results.push(ty, &mut ctx.type_pool);
        }
        let mut regions = self.regions;
        for _ in 0..self.empty_regions {
            regions.push(ctx.create_region(RegionData::new(self.location, [])));
        }
        let mut data = OperationData::new(self.location, self.dialect, self.name);
        data.operands = operands;
        data.results = results;
        data.attributes = self.attributes;
        data.regions = regions;
        data.successors = successors;
        data.successor_operand_counts = successor_operand_counts;
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Span;

    fn test_location(ctx: &mut IrContext) -> Location {
        let path = ctx.paths.intern("file:///test.mlir".to_owned());
        Location::new(path, Span::new(0, 0))
    }

    fn mk_op(ctx: &mut IrContext, loc: Location, name: &'static str, operands: &[ValueRef]) -> OpRef {
        let i32_ty = ctx.types.integer(32);
        let data = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new(name))
            .operands(operands.iter().copied())
            .result(i32_ty)
            .build(ctx);
        ctx.create_op(data)
    }

    fn empty_block(ctx: &mut IrContext, loc: Location) -> BlockRef {
        ctx.create_block(BlockData::new(loc, []))
    }

    #[test]
    fn create_op_and_read_back() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let i32_ty = ctx.types.integer(32);

        let data = OperationDataBuilder::new(loc, Symbol::new("std"), Symbol::new("constant"))
            .result(i32_ty)
            .attr("value", Attribute::IntBits(42))
            .build(&mut ctx);
        let op = ctx.create_op(data);

        assert_eq!(ctx.op_name(op), "std.constant");
        assert_eq!(ctx.op_result_types(op), &[i32_ty]);
        assert_eq!(
            ctx.op_attr(op, Symbol::new("value")),
            Some(&Attribute::IntBits(42))
        );
        assert_eq!(ctx.value_def(ctx.op_result(op, 0)), ValueDef::OpResult(op, 0));
    }

    #[test]
    fn block_args() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let i32_ty = ctx.types.integer(32);
        let idx = ctx.types.index();

        let block = ctx.create_block(BlockData::new(loc, [BlockArgData::new(i32_ty)]));
        let a1 = ctx.add_block_arg(block, idx);

        assert_eq!(ctx.block_args(block).len(), 2);
        assert_eq!(ctx.block_arg(block, 1), a1);
        assert_eq!(ctx.value_ty(a1), idx);
        assert_eq!(ctx.value_def(a1), ValueDef::BlockArg(block, 1));
        assert_eq!(ctx.value_block(a1), Some(block));
    }

    #[test]
    fn use_chain_tracking() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);

        let op1 = mk_op(&mut ctx, loc, "a", &[]);
        let v1 = ctx.op_result(op1, 0);
        assert!(!ctx.has_uses(v1));
        assert!(ctx.use_empty(op1));

        let op2 = mk_op(&mut ctx, loc, "b", &[v1]);
        assert_eq!(ctx.uses(v1), &[Use { user: op2, operand_index: 0 }]);
        assert_eq!(ctx.users(v1).collect::<Vec<_>>(), vec![op2]);
        assert_eq!(ctx.defining_op(v1), Some(op1));
    }

    #[test]
    fn rauw_relinks_every_use() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);

        let op1 = mk_op(&mut ctx, loc, "a", &[]);
        let v_old = ctx.op_result(op1, 0);
        let op2 = mk_op(&mut ctx, loc, "a", &[]);
        let v_new = ctx.op_result(op2, 0);
        let op3 = mk_op(&mut ctx, loc, "add", &[v_old, v_old]);

        ctx.replace_all_uses_with(v_old, v_new);

        assert!(!ctx.has_uses(v_old));
        assert_eq!(ctx.uses(v_new).len(), 2);
        assert_eq!(ctx.op_operands(op3), &[v_new, v_new]);

        // and back again
        ctx.replace_all_uses_with(v_new, v_old);
        assert!(!ctx.has_uses(v_new));
        assert_eq!(ctx.op_operands(op3), &[v_old, v_old]);
    }

    #[test]
    fn set_operand_and_replace_uses_of_with() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);

        let a = mk_op(&mut ctx, loc, "a", &[]);
        let b = mk_op(&mut ctx, loc, "b", &[]);
        let va = ctx.op_result(a, 0);
        let vb = ctx.op_result(b, 0);
        let user = mk_op(&mut ctx, loc, "user", &[va, vb, va]);

        ctx.set_operand(user, 1, va);
        assert_eq!(ctx.uses(va).len(), 3);
        assert!(!ctx.has_uses(vb));

        ctx.replace_uses_of_with(user, va, vb);
        assert_eq!(ctx.op_operands(user), &[vb, vb, vb]);
        assert!(!ctx.has_uses(va));
    }

    #[test]
    fn successor_operands_follow_plain_operands() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let cond = mk_op(&mut ctx, loc, "cond", &[]);
        let x = mk_op(&mut ctx, loc, "x", &[]);
        let (c, v) = (ctx.op_result(cond, 0), ctx.op_result(x, 0));
        let bb1 = empty_block(&mut ctx, loc);
        let bb2 = empty_block(&mut ctx, loc);

        let data = OperationDataBuilder::new(loc, Symbol::new("std"), Symbol::new("cond_br"))
            .operand(c)
            .successor_with_operands(bb1, [v, v])
            .successor(bb2)
            .build(&mut ctx);
        let br = ctx.create_op(data);

        assert_eq!(ctx.non_successor_operands(br), &[c]);
        assert_eq!(ctx.successor_operands(br, 0), &[v, v]);
        assert!(ctx.successor_operands(br, 1).is_empty());
        assert_eq!(ctx.op_successors(br), &[bb1, bb2]);
    }

    #[test]
    fn block_ops_iterate_both_ways() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let block = empty_block(&mut ctx, loc);
        let a = mk_op(&mut ctx, loc, "a", &[]);
        let b = mk_op(&mut ctx, loc, "b", &[]);
        let c = mk_op(&mut ctx, loc, "c", &[]);
        ctx.push_op(block, a);
        ctx.push_op(block, c);
        ctx.insert_op_before(block, c, b);

        assert_eq!(ctx.block_ops(block).collect::<Vec<_>>(), vec![a, b, c]);
        assert_eq!(ctx.block_ops(block).rev().collect::<Vec<_>>(), vec![c, b, a]);
        assert_eq!(ctx.block_ops(block).len(), 3);
        assert_eq!(ctx.first_op(block), Some(a));
        assert_eq!(ctx.last_op(block), Some(c));
    }

    #[test]
    fn remove_op_from_block_keeps_op_alive() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let block = empty_block(&mut ctx, loc);
        let op = mk_op(&mut ctx, loc, "x", &[]);
        ctx.push_op(block, op);

        ctx.remove_op_from_block(block, op);
        assert_eq!(ctx.num_ops(block), 0);
        assert_eq!(ctx.op_block(op), None);
        assert!(!ctx.is_erased(op));
    }

    #[test]
    fn move_before_relinks_across_blocks() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let b1 = empty_block(&mut ctx, loc);
        let b2 = empty_block(&mut ctx, loc);
        let x = mk_op(&mut ctx, loc, "x", &[]);
        let y = mk_op(&mut ctx, loc, "y", &[]);
        let z = mk_op(&mut ctx, loc, "z", &[]);
        ctx.push_op(b1, x);
        ctx.push_op(b1, y);
        ctx.push_op(b2, z);

        ctx.move_op_before(y, z);
        assert_eq!(ctx.block_ops(b1).collect::<Vec<_>>(), vec![x]);
        assert_eq!(ctx.block_ops(b2).collect::<Vec<_>>(), vec![y, z]);
        assert_eq!(ctx.op_block(y), Some(b2));

        ctx.move_op_to_end(x, b2);
        assert_eq!(ctx.block_ops(b2).collect::<Vec<_>>(), vec![y, z, x]);
        assert_eq!(ctx.num_ops(b1), 0);
    }

    #[test]
    fn order_survives_exhausted_gaps() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let block = empty_block(&mut ctx, loc);
        let first = mk_op(&mut ctx, loc, "first", &[]);
        let last = mk_op(&mut ctx, loc, "last", &[]);
        ctx.push_op(block, first);
        ctx.push_op(block, last);

        // Keep inserting right before `last` until the gap runs out.
        let mut inserted = Vec::new();
        for _ in 0..8 {
            let op = mk_op(&mut ctx, loc, "mid", &[]);
            ctx.insert_op_before(block, last, op);
            inserted.push(op);
        }

        assert!(ctx.is_before_in_block(first, last));
        assert!(!ctx.is_before_in_block(last, first));
        for pair in inserted.windows(2) {
            assert!(ctx.is_before_in_block(pair[0], pair[1]));
        }
        assert!(ctx.is_before_in_block(inserted[7], last));
    }

    #[test]
    #[should_panic(expected = "not in the same block")]
    fn is_before_in_block_rejects_different_blocks() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let b1 = empty_block(&mut ctx, loc);
        let b2 = empty_block(&mut ctx, loc);
        let x = mk_op(&mut ctx, loc, "x", &[]);
        let y = mk_op(&mut ctx, loc, "y", &[]);
        ctx.push_op(b1, x);
        ctx.push_op(b2, y);
        ctx.is_before_in_block(x, y);
    }

    #[test]
    fn erase_op_destroys_nested_content() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let outer_val = mk_op(&mut ctx, loc, "outer", &[]);
        let v = ctx.op_result(outer_val, 0);

        let inner_block = empty_block(&mut ctx, loc);
        let inner = mk_op(&mut ctx, loc, "inner", &[v]);
        ctx.push_op(inner_block, inner);
        let region = ctx.create_region(RegionData::new(loc, [inner_block]));
        let data = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new("holder"))
            .region(region)
            .build(&mut ctx);
        let holder = ctx.create_op(data);
        let block = empty_block(&mut ctx, loc);
        ctx.push_op(block, holder);

        assert_eq!(ctx.parent_op(inner), Some(holder));
        assert_eq!(ctx.uses(v).len(), 1);

        ctx.erase_op(holder);
        assert!(ctx.is_erased(holder));
        assert!(ctx.is_erased(inner));
        assert!(ctx.is_region_erased(region));
        assert!(ctx.is_block_erased(inner_block));
        assert!(!ctx.has_uses(v));
        assert_eq!(ctx.num_ops(block), 0);
    }

    #[test]
    #[should_panic(expected = "still has")]
    fn erase_op_panics_when_result_has_uses() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let op1 = mk_op(&mut ctx, loc, "a", &[]);
        let v1 = ctx.op_result(op1, 0);
        let _op2 = mk_op(&mut ctx, loc, "b", &[v1]);
        ctx.erase_op(op1);
    }

    #[test]
    fn drop_all_references_clears_edges() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let a = mk_op(&mut ctx, loc, "a", &[]);
        let v = ctx.op_result(a, 0);
        let b = mk_op(&mut ctx, loc, "b", &[v, v]);

        ctx.drop_all_references(b);
        assert!(ctx.op_operands(b).is_empty());
        assert!(!ctx.has_uses(v));
        ctx.erase_op(a);
    }

    #[test]
    fn erase_block_detaches_from_region() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let entry = empty_block(&mut ctx, loc);
        let dead = empty_block(&mut ctx, loc);
        let op = mk_op(&mut ctx, loc, "x", &[]);
        ctx.push_op(dead, op);
        let region = ctx.create_region(RegionData::new(loc, [entry, dead]));

        ctx.erase_block(dead);
        assert_eq!(ctx.region_blocks(region), &[entry]);
        assert!(ctx.is_erased(op));
        assert_eq!(ctx.entry_block(region), Some(entry));
    }

    #[test]
    fn find_ancestor_op_in_block_walks_up() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let inner_block = empty_block(&mut ctx, loc);
        let inner = mk_op(&mut ctx, loc, "inner", &[]);
        ctx.push_op(inner_block, inner);
        let region = ctx.create_region(RegionData::new(loc, [inner_block]));
        let data = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new("holder"))
            .region(region)
            .build(&mut ctx);
        let holder = ctx.create_op(data);
        let outer = empty_block(&mut ctx, loc);
        ctx.push_op(outer, holder);

        assert_eq!(ctx.find_ancestor_op_in_block(outer, inner), Some(holder));
        assert_eq!(ctx.find_ancestor_op_in_block(inner_block, inner), Some(inner));
        assert_eq!(ctx.find_ancestor_op_in_block(inner_block, holder), None);
    }

    #[test]
    fn num_regions_creates_empty_regions() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let data = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new("two"))
            .num_regions(2)
            .build(&mut ctx);
        let op = ctx.create_op(data);
        assert_eq!(ctx.op_regions(op).len(), 2);
        for &r in ctx.op_regions(op) {
            assert_eq!(ctx.region_op(r), Some(op));
            assert!(ctx.region_blocks(r).is_empty());
        }
    }

    #[test]
    fn entity_ref_display() {
        use cranelift_entity::EntityRef;

        assert_eq!(format!("{}", OpRef::new(0)), "op0");
        assert_eq!(format!("{}", ValueRef::new(5)), "v5");
        assert_eq!(format!("{}", BlockRef::new(2)), "block2");
        assert_eq!(format!("{}", RegionRef::new(1)), "region1");
    }

    #[test]
    #[should_panic(expected = "already belongs to operation")]
    fn create_op_panics_when_region_already_owned() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let region = ctx.create_region(RegionData::new(loc, []));

        let data1 = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new("a"))
            .region(region)
            .build(&mut ctx);
        ctx.create_op(data1);
        let data2 = OperationDataBuilder::new(loc, Symbol::new("test"), Symbol::new("b"))
            .region(region)
            .build(&mut ctx);
        ctx.create_op(data2);
    }

    #[test]
    #[should_panic(expected = "already belongs to block")]
    fn push_op_panics_on_double_attachment() {
        let mut ctx = IrContext::new();
        let loc = test_location(&mut ctx);
        let b1 = empty_block(&mut ctx, loc);
        let b2 = empty_block(&mut ctx, loc);
        let op = mk_op(&mut ctx, loc, "x", &[]);
        ctx.push_op(b1, op);
        ctx.push_op(b2, op);
    }
}
