//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::analysis::ControlFlowGraph;
use crate::arena::SecondaryMap;
use crate::ir::{Block, Function};
use crate::utility::{Packable, SaHashSet};
use smallvec::SmallVec;

/// Models the dominator tree for a given control-flow graph. This analysis
/// also gives a postorder for the reachable blocks in the CFG (as this is
/// required for calculating dominators, and is useful information for
/// other passes to have as well).
///
/// # Implementation
/// The algorithm used is described in "A Simple, Fast Dominance Algorithm"
/// by Cooper et. al.
///
/// This implementation stores a tree inside of an arena instead of
/// a direct tree with separately allocated nodes, but the rough
/// "dominator tree" structure still exists.
pub struct DominatorTree {
    // maps B -> idom(B) for given block B. "tree" structure comes from going
    // farther up the tree, e.g. tree[idom(b)].
    tree: SecondaryMap<Block, Block>,
    // a valid postorder of the reachable blocks in the control-flow graph
    postorder: Vec<Block>,
}

impl DominatorTree {
    /// Computes dominance information for a function.
    pub fn compute(func: &Function, cfg: &ControlFlowGraph) -> Self {
        let po = compute_postorder(func, cfg);
        let tree = compute_idoms(&po, |block| cfg.predecessors(block), &[]);

        Self {
            tree,
            postorder: po,
        }
    }

    /// Gets the immediate dominator of `block`, if one exists. The only
    /// reachable block in a given flowgraph that does not have an immediate
    /// dominator is the entry block.
    pub fn idom(&self, block: Block) -> Option<Block> {
        self.tree.get(block).copied().filter(|b| !b.is_reserved())
    }

    /// Checks if `possible_dominator` dominates `block`.
    ///
    /// This follows the dominance property directly, it returns true if
    /// `block` and `possible_dominator` are the same block.
    /// [`Self::strictly_dominates`] does not.
    pub fn dominates(&self, block: Block, possible_dominator: Block) -> bool {
        (block == possible_dominator) || self.strictly_dominates(block, possible_dominator)
    }

    /// Checks if `possible_dominator` strictly dominates `block`, i.e.
    /// dominates it and is not the same block.
    pub fn strictly_dominates(&self, block: Block, possible_dominator: Block) -> bool {
        let mut curr = block;

        while let Some(idom) = self.idom(curr) {
            if idom == possible_dominator {
                return true;
            }

            curr = idom;
        }

        false
    }

    /// Returns the root (entry) node of the CFG.
    pub fn root(&self) -> Block {
        self.postorder
            .last()
            .copied()
            .expect("should have a root node")
    }

    /// Returns the list of reachable blocks in a valid post-ordering
    /// of the CFG.
    pub fn postorder(&self) -> &[Block] {
        &self.postorder
    }

    /// Returns an iterator over the reachable blocks in reverse postorder.
    pub fn reverse_postorder(&self) -> impl Iterator<Item = Block> + '_ {
        self.postorder.iter().copied().rev()
    }

    /// Checks if a block is reachable from the entry node.
    pub fn is_reachable(&self, block: Block) -> bool {
        self.tree.contains(block)
    }
}

/// Models the post-dominator tree for a given control-flow graph.
///
/// This is the [`DominatorTree`] computation run over the reversed CFG,
/// with one twist: a function may have multiple exit blocks (`ret`,
/// `unreachable`), so the tree is rooted at a *virtual* exit node joining
/// all of them. Blocks whose immediate post-dominator is the virtual root
/// report no immediate post-dominator at all.
pub struct PostDominatorTree {
    // reserved() stands for the virtual exit root
    tree: SecondaryMap<Block, Block>,
    // postorder of the *reversed* CFG: sources are the exit blocks
    postorder: Vec<Block>,
}

impl PostDominatorTree {
    /// Computes post-dominance information for a function.
    pub fn compute(func: &Function, cfg: &ControlFlowGraph) -> Self {
        let exits: SmallVec<[Block; 4]> = func
            .layout()
            .blocks()
            .iter()
            .copied()
            .filter(|block| cfg.successors(*block).is_empty())
            .collect();

        let po = compute_reverse_postorder(&exits, cfg);
        let tree = compute_idoms(&po, |block| cfg.successors(block), &exits);

        Self {
            tree,
            postorder: po,
        }
    }

    /// Gets the immediate post-dominator of `block`.
    ///
    /// `None` means `block` either post-dominates every path to function
    /// exit on its own (its post-dominator is the virtual root), or never
    /// reaches an exit at all.
    pub fn ipdom(&self, block: Block) -> Option<Block> {
        self.tree.get(block).copied().filter(|b| !b.is_reserved())
    }

    /// Checks if `possible_pdom` post-dominates `block`.
    ///
    /// Returns true if the blocks are the same, mirroring
    /// [`DominatorTree::dominates`].
    pub fn post_dominates(&self, block: Block, possible_pdom: Block) -> bool {
        (block == possible_pdom) || self.strictly_post_dominates(block, possible_pdom)
    }

    /// Checks if `possible_pdom` strictly post-dominates `block`.
    pub fn strictly_post_dominates(&self, block: Block, possible_pdom: Block) -> bool {
        let mut curr = block;

        while let Some(ipdom) = self.ipdom(curr) {
            if ipdom == possible_pdom {
                return true;
            }

            curr = ipdom;
        }

        false
    }

    /// Checks if a block reaches any function exit.
    pub fn is_reachable(&self, block: Block) -> bool {
        self.tree.contains(block)
    }

    /// Returns the postorder of the reversed CFG used by the computation.
    pub fn postorder(&self) -> &[Block] {
        &self.postorder
    }
}

/// Directly computes a valid post-ordering of the blocks in `func`'s
/// control-flow graph, starting from the entry block and walking successors
/// in CFG order.
pub fn compute_postorder(func: &Function, cfg: &ControlFlowGraph) -> Vec<Block> {
    match func.layout().entry_block() {
        Some(entry) => compute_po_from(&[entry], |block| cfg.successors(block)),
        None => Vec::default(),
    }
}

fn compute_reverse_postorder(exits: &[Block], cfg: &ControlFlowGraph) -> Vec<Block> {
    compute_po_from(exits, |block| cfg.predecessors(block))
}

// iterative DFS that visits edges in the order `next` yields them, pushing
// each block onto the postorder once all of its targets are done
fn compute_po_from<'a, F>(sources: &[Block], next: F) -> Vec<Block>
where
    F: Fn(Block) -> &'a [Block],
{
    let mut po = Vec::new();
    let mut seen = SaHashSet::default();
    let mut stack: Vec<(Block, usize)> = Vec::new();

    for source in sources {
        if !seen.insert(*source) {
            continue;
        }

        stack.push((*source, 0));

        while let Some((block, index)) = stack.pop() {
            match next(block).get(index) {
                Some(target) => {
                    stack.push((block, index + 1));

                    if seen.insert(*target) {
                        stack.push((*target, 0));
                    }
                }
                None => po.push(block),
            }
        }
    }

    po
}

fn intersect(
    po_numbers: &SecondaryMap<Block, usize>,
    idoms: &SecondaryMap<Block, Block>,
    virtual_number: usize,
    bb1: Block,
    bb2: Block,
) -> Block {
    let num = |block: Block| {
        if block.is_reserved() {
            virtual_number
        } else {
            po_numbers[block]
        }
    };

    let mut f1 = bb1;
    let mut f2 = bb2;

    while f1 != f2 {
        // once either finger hits the virtual root, so does the intersection
        if f1.is_reserved() || f2.is_reserved() {
            return Block::reserved();
        }

        let f2v = num(f2);

        while num(f1) < f2v {
            f1 = idoms[f1];
        }

        let f1v = num(f1);

        while !f2.is_reserved() && num(f2) < f1v {
            f2 = idoms[f2];
        }
    }

    f1
}

//
// this implements the dominator algorithm described in "A Simple, Fast
// Dominance Algorithm" by Cooper et. al. See the paper:
// http://www.hipersoft.rice.edu/grads/publications/dom14.pdf.
//
// `roots` is empty for the forward direction (the single root is the last
// entry of `po`, the entry block); for the reverse direction it contains
// every exit block, and all of them get the virtual exit root (the reserved
// key) as their immediate dominator.
//
fn compute_idoms<'a, F>(
    po: &[Block],
    preds: F,
    roots: &[Block],
) -> SecondaryMap<Block, Block>
where
    F: Fn(Block) -> &'a [Block],
{
    let mut idoms = SecondaryMap::default();

    if po.is_empty() {
        return idoms;
    }

    // map block -> postorder number; the virtual root is po.len()
    let po_numbers = {
        let mut map = SecondaryMap::default();

        for (i, bb) in po.iter().copied().enumerate() {
            map.insert(bb, i);
        }

        map
    };

    let virtual_number = po.len();
    let is_root: SaHashSet<Block> = roots.iter().copied().collect();

    if roots.is_empty() {
        // single-root case: the entry node is its own idom for the purposes
        // of the algorithm
        let root = po.last().copied().unwrap();

        idoms.insert(root, root);
    } else {
        for root in roots {
            idoms.insert(*root, Block::reserved());
        }
    }

    let mut changed = true;

    while changed {
        changed = false;

        for block in po.iter().rev().copied() {
            if is_root.contains(&block) || (roots.is_empty() && block == po[po.len() - 1]) {
                continue;
            }

            let idom = {
                // start by getting every processed predecessor. there will
                // always be at least one when we're iterating in reverse
                // postorder, since the roots were processed at the beginning
                // of the algorithm
                let processed: SmallVec<[Block; 16]> = preds(block)
                    .iter()
                    .copied()
                    .filter(|p| idoms.contains(*p))
                    .collect();

                let mut iter = processed.into_iter();
                let mut idom = iter.next().expect(
                    "every block should have at least one processed predecessor when in reverse postorder",
                );

                for pred in iter {
                    idom = intersect(&po_numbers, &idoms, virtual_number, pred, idom);
                }

                idom
            };

            changed |= idoms.insert(block, idom) != Some(idom);
        }
    }

    if roots.is_empty() {
        // remove the root -> root idom relationship, mark a
        // sentinel we can look for instead
        let root = po.last().copied().unwrap();

        idoms.insert(root, Block::reserved());
    }

    idoms
}
