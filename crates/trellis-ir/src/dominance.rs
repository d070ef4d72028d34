//! Dominance and post-dominance over nested regions.
//!
//! One dominator tree is built per non-empty region below the root op using
//! the Cooper–Harvey–Kennedy iterative algorithm over reverse post-order.
//! Post-dominator trees are rooted at a virtual exit node whose
//! predecessors are the blocks without successors.
//!
//! The information is a snapshot: edits to the IR are not tracked, callers
//! must `recalculate` after changing the CFG.

use std::collections::HashMap;

use tracing::debug;

use crate::context::IrContext;
use crate::refs::{BlockRef, OpRef, RegionRef, ValueDef, ValueRef};

const UNDEF: usize = usize::MAX;

/// Immediate-dominator tree of a single region.
#[derive(Debug)]
pub struct DominatorTree {
    /// Node id of every block reachable from the tree root.
    index: HashMap<BlockRef, usize>,
    /// Block of each node id; `None` for the virtual exit.
    blocks: Vec<Option<BlockRef>>,
    /// Immediate dominator per node id; `UNDEF` for unreachable nodes.
    idom: Vec<usize>,
    root: usize,
}

impl DominatorTree {
    fn build(ctx: &IrContext, region: RegionRef, post_dom: bool) -> Self {
        let region_blocks = ctx.region_blocks(region);
        let local: HashMap<BlockRef, usize> = region_blocks
            .iter()
            .enumerate()
            .map(|(i, &b)| (b, i))
            .collect();
        let n = region_blocks.len();

        // CFG edges restricted to the region.
        let mut cfg_succs: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, &block) in region_blocks.iter().enumerate() {
            for succ in ctx.block_successors(block) {
                if let Some(&j) = local.get(succ) {
                    cfg_succs[i].push(j);
                }
            }
        }

        // The graph the algorithm runs on: the CFG itself, or the reversed
        // CFG with an extra exit node `n`.
        let (num_nodes, root, succs) = if post_dom {
            let mut rev: Vec<Vec<usize>> = vec![Vec::new(); n + 1];
            for (i, targets) in cfg_succs.iter().enumerate() {
                for &j in targets {
                    rev[j].push(i);
                }
                if ctx.block_successors(region_blocks[i]).is_empty() {
                    rev[n].push(i);
                }
            }
            (n + 1, n, rev)
        } else {
            (n, 0, cfg_succs)
        };
        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); num_nodes];
        for (i, targets) in succs.iter().enumerate() {
            for &j in targets {
                preds[j].push(i);
            }
        }

        let postorder = postorder(root, &succs);
        let mut po_number = vec![UNDEF; num_nodes];
        for (i, &node) in postorder.iter().enumerate() {
            po_number[node] = i;
        }

        let mut idom = vec![UNDEF; num_nodes];
        idom[root] = root;
        let mut changed = true;
        while changed {
            changed = false;
            for &node in postorder.iter().rev() {
                if node == root {
                    continue;
                }
                let mut new_idom = UNDEF;
                for &p in &preds[node] {
                    if idom[p] == UNDEF {
                        continue;
                    }
                    new_idom = if new_idom == UNDEF {
                        p
                    } else {
                        intersect(&idom, &po_number, p, new_idom)
                    };
                }
                if new_idom != UNDEF && idom[node] != new_idom {
                    idom[node] = new_idom;
                    changed = true;
                }
            }
        }

        let mut blocks: Vec<Option<BlockRef>> = region_blocks.iter().copied().map(Some).collect();
        if post_dom {
            blocks.push(None);
        }
        let index = local
            .into_iter()
            .filter(|&(_, i)| idom[i] != UNDEF)
            .collect();
        Self {
            index,
            blocks,
            idom,
            root,
        }
    }

    /// Whether `block` is reachable from the tree root.
    pub fn is_reachable(&self, block: BlockRef) -> bool {
        self.index.contains_key(&block)
    }

    /// Immediate dominator of `block`; `None` for the root, for blocks
    /// whose immediate dominator is the virtual exit, and for unreachable
    /// blocks.
    pub fn immediate_dominator(&self, block: BlockRef) -> Option<BlockRef> {
        let &node = self.index.get(&block)?;
        if node == self.root {
            return None;
        }
        self.blocks[self.idom[node]]
    }

    /// Strict dominance within the region.
    pub fn properly_dominates(&self, a: BlockRef, b: BlockRef) -> bool {
        if a == b {
            return false;
        }
        let Some(&b_node) = self.index.get(&b) else {
            return true;
        };
        let Some(&a_node) = self.index.get(&a) else {
            return false;
        };
        let mut node = b_node;
        while node != self.root {
            node = self.idom[node];
            if node == a_node {
                return true;
            }
        }
        false
    }
}

fn postorder(root: usize, succs: &[Vec<usize>]) -> Vec<usize> {
    let mut visited = vec![false; succs.len()];
    let mut order = Vec::with_capacity(succs.len());
    let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
    visited[root] = true;
    while let Some(top) = stack.last_mut() {
        let (node, next_child) = *top;
        if let Some(&child) = succs[node].get(next_child) {
            top.1 += 1;
            if !visited[child] {
                visited[child] = true;
                stack.push((child, 0));
            }
        } else {
            order.push(node);
            stack.pop();
        }
    }
    order
}

fn intersect(idom: &[usize], po_number: &[usize], mut a: usize, mut b: usize) -> usize {
    while a != b {
        while po_number[a] < po_number[b] {
            a = idom[a];
        }
        while po_number[b] < po_number[a] {
            b = idom[b];
        }
    }
    a
}

/// Dominance information shared by the forward and post-dominance flavours.
pub struct DominanceInfoBase<const POST_DOM: bool> {
    trees: HashMap<RegionRef, DominatorTree>,
    computed: bool,
}

pub type DominanceInfo = DominanceInfoBase<false>;
pub type PostDominanceInfo = DominanceInfoBase<true>;

impl<const POST_DOM: bool> Default for DominanceInfoBase<POST_DOM> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const POST_DOM: bool> DominanceInfoBase<POST_DOM> {
    /// Uninitialized info; every query answers permissively until
    /// [`recalculate`](Self::recalculate) runs.
    pub fn new() -> Self {
        Self {
            trees: HashMap::new(),
            computed: false,
        }
    }

    /// Compute fresh information for `root` and everything nested in it.
    pub fn compute(ctx: &IrContext, root: OpRef) -> Self {
        let mut info = Self::new();
        info.recalculate(ctx, root);
        info
    }

    /// Rebuild one tree per non-empty region in `root`'s subtree.
    pub fn recalculate(&mut self, ctx: &IrContext, root: OpRef) {
        self.trees.clear();
        let mut worklist = vec![root];
        while let Some(op) = worklist.pop() {
            for &region in ctx.op_regions(op) {
                let blocks = ctx.region_blocks(region);
                if blocks.is_empty() {
                    continue;
                }
                self.trees
                    .insert(region, DominatorTree::build(ctx, region, POST_DOM));
                for &block in blocks {
                    worklist.extend(ctx.block_ops(block));
                }
            }
        }
        self.computed = true;
        debug!(
            post_dom = POST_DOM,
            regions = self.trees.len(),
            "recalculated dominance for {root}"
        );
    }

    pub fn is_computed(&self) -> bool {
        self.computed
    }

    pub fn tree(&self, region: RegionRef) -> Option<&DominatorTree> {
        self.trees.get(&region)
    }

    /// Whether `block` is reachable from its region's tree root.
    pub fn is_reachable(&self, ctx: &IrContext, block: BlockRef) -> bool {
        ctx.block_region(block)
            .and_then(|r| self.trees.get(&r))
            .is_none_or(|t| t.is_reachable(block))
    }

    pub fn immediate_dominator(&self, ctx: &IrContext, block: BlockRef) -> Option<BlockRef> {
        ctx.block_region(block)
            .and_then(|r| self.trees.get(&r))
            .and_then(|t| t.immediate_dominator(block))
    }

    /// Strict block (post-)dominance, looking through enclosing ops when
    /// the blocks live in different regions.
    pub fn properly_dominates_block(&self, ctx: &IrContext, a: BlockRef, mut b: BlockRef) -> bool {
        if a == b {
            return false;
        }
        let region_a = ctx.block_region(a);
        if region_a != ctx.block_region(b) {
            let Some(region_a) = region_a else {
                return POST_DOM;
            };
            match find_ancestor_block_in_region(ctx, region_a, b) {
                None => return POST_DOM,
                Some(ancestor) if ancestor == a => return true,
                Some(ancestor) => b = ancestor,
            }
        }
        match region_a.and_then(|r| self.trees.get(&r)) {
            Some(tree) => tree.properly_dominates(a, b),
            None => true,
        }
    }

    pub fn dominates_block(&self, ctx: &IrContext, a: BlockRef, b: BlockRef) -> bool {
        a == b || self.properly_dominates_block(ctx, a, b)
    }
}

/// The block in `region` that contains `block`, possibly through nested ops.
fn find_ancestor_block_in_region(
    ctx: &IrContext,
    region: RegionRef,
    mut block: BlockRef,
) -> Option<BlockRef> {
    loop {
        let current = ctx.block_region(block)?;
        if current == region {
            return Some(block);
        }
        block = ctx.op_block(ctx.region_op(current)?)?;
    }
}

impl DominanceInfoBase<false> {
    /// Whether `a` strictly dominates `b`. An op dominates everything nested
    /// in its regions.
    pub fn properly_dominates_op(&self, ctx: &IrContext, a: OpRef, b: OpRef) -> bool {
        let (Some(a_block), Some(b_block)) = (ctx.op_block(a), ctx.op_block(b)) else {
            return false;
        };
        if a_block == b_block {
            return a != b && ctx.is_before_in_block(a, b);
        }
        if let Some(ancestor) = ctx.find_ancestor_op_in_block(a_block, b) {
            return self.dominates_op(ctx, a, ancestor);
        }
        self.properly_dominates_block(ctx, a_block, b_block)
    }

    pub fn dominates_op(&self, ctx: &IrContext, a: OpRef, b: OpRef) -> bool {
        a == b || self.properly_dominates_op(ctx, a, b)
    }

    /// Whether `value` is available strictly before `op` executes.
    ///
    /// Block arguments dominate every op of their own block.
    pub fn properly_dominates_value(&self, ctx: &IrContext, value: ValueRef, op: OpRef) -> bool {
        match ctx.value_def(value) {
            ValueDef::OpResult(def, _) => self.properly_dominates_op(ctx, def, op),
            ValueDef::BlockArg(block, _) => ctx
                .op_block(op)
                .is_some_and(|b| self.dominates_block(ctx, block, b)),
        }
    }

    pub fn dominates_value(&self, ctx: &IrContext, value: ValueRef, op: OpRef) -> bool {
        ctx.defining_op(value) == Some(op) || self.properly_dominates_value(ctx, value, op)
    }
}

impl DominanceInfoBase<true> {
    pub fn properly_post_dominates_op(&self, ctx: &IrContext, a: OpRef, b: OpRef) -> bool {
        let (Some(a_block), Some(b_block)) = (ctx.op_block(a), ctx.op_block(b)) else {
            return false;
        };
        if a_block == b_block {
            return a != b && ctx.is_before_in_block(b, a);
        }
        if let Some(ancestor) = ctx.find_ancestor_op_in_block(a_block, b) {
            return self.post_dominates_op(ctx, a, ancestor);
        }
        self.properly_dominates_block(ctx, a_block, b_block)
    }

    pub fn post_dominates_op(&self, ctx: &IrContext, a: OpRef, b: OpRef) -> bool {
        a == b || self.properly_post_dominates_op(ctx, a, b)
    }

    pub fn properly_post_dominates_block(&self, ctx: &IrContext, a: BlockRef, b: BlockRef) -> bool {
        self.properly_dominates_block(ctx, a, b)
    }

    pub fn post_dominates_block(&self, ctx: &IrContext, a: BlockRef, b: BlockRef) -> bool {
        self.dominates_block(ctx, a, b)
    }
}
