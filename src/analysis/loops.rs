//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::analysis::{ControlFlowGraph, DominatorTree};
use crate::arena::{ArenaKey, ArenaMap, SecondaryMap};
use crate::dense_arena_key;
use crate::ir::{Block, Function};
use crate::utility::{PackedOption, SaHashSet};
use smallvec::SmallVec;

dense_arena_key! {
    /// References a single natural loop discovered by [`LoopInfo`].
    ///
    /// Loops form a tree by containment, walk it through
    /// [`LoopInfo::parent`].
    pub struct Loop;
}

struct LoopData {
    header: Block,
    latches: SmallVec<[Block; 2]>,
    // membership, in deterministic program order
    blocks: Vec<Block>,
    set: SaHashSet<Block>,
    exits: SmallVec<[Block; 4]>,
    parent: PackedOption<Loop>,
    depth: u32,
}

/// Discovers the natural loops of a function and arranges them into a
/// nesting tree.
///
/// A natural loop exists for every back edge `latch -> header` where the
/// header dominates the latch; back edges sharing a header are merged into
/// one loop. Any cycle *not* formed that way (a retreating edge whose
/// target does not dominate its source) makes the function irreducible,
/// which is recorded and must be checked by analyses that assume reducible
/// control flow.
pub struct LoopInfo {
    loops: ArenaMap<Loop, LoopData>,
    innermost: SecondaryMap<Block, Loop>,
    irreducible: bool,
}

impl LoopInfo {
    /// Computes loop information for a function.
    pub fn compute(func: &Function, cfg: &ControlFlowGraph, domtree: &DominatorTree) -> Self {
        let mut computer = LoopComputer {
            func,
            cfg,
            domtree,
            position: SecondaryMap::default(),
        };

        computer.compute()
    }

    /// Gets the innermost loop containing `block`, if there is one.
    pub fn loop_of(&self, block: Block) -> Option<Loop> {
        self.innermost.get(block).copied()
    }

    /// Gets the header of a loop: the single block inside the loop through
    /// which every entering path flows.
    pub fn header(&self, lp: Loop) -> Block {
        self.loops[lp].header
    }

    /// Gets the latch of a loop, if it has exactly one: the block sourcing
    /// the back edge to the header.
    pub fn latch(&self, lp: Loop) -> Option<Block> {
        match self.loops[lp].latches.as_slice() {
            [single] => Some(*single),
            _ => None,
        }
    }

    /// Checks whether `block` is one of the blocks of `lp` (including the
    /// blocks of any nested loop).
    pub fn contains(&self, lp: Loop, block: Block) -> bool {
        self.loops[lp].set.contains(&block)
    }

    /// The blocks of the loop in program order, starting with the header.
    pub fn blocks(&self, lp: Loop) -> &[Block] {
        &self.loops[lp].blocks
    }

    /// The exit blocks of the loop in program order: blocks *outside* the
    /// loop that have a predecessor inside it.
    pub fn exit_blocks(&self, lp: Loop) -> &[Block] {
        &self.loops[lp].exits
    }

    /// Gets the closest loop properly containing `lp`, if any.
    pub fn parent(&self, lp: Loop) -> Option<Loop> {
        self.loops[lp].parent.expand()
    }

    /// Gets the nesting depth of `lp`: 1 for an outermost loop.
    pub fn depth(&self, lp: Loop) -> u32 {
        self.loops[lp].depth
    }

    /// Iterates over every loop in discovery order (outer loops before the
    /// loops they contain).
    pub fn loops(&self) -> impl Iterator<Item = Loop> + '_ {
        self.loops.keys()
    }

    /// The number of loops discovered.
    pub fn len(&self) -> usize {
        self.loops.len()
    }

    /// Checks whether no loops were discovered.
    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    /// Checks whether every cycle in the function is a natural loop.
    ///
    /// Analyses that bound their searches by loop headers are only sound on
    /// reducible control flow, they must refuse to run when this is false.
    pub fn is_reducible(&self) -> bool {
        !self.irreducible
    }
}

struct LoopComputer<'f> {
    func: &'f Function,
    cfg: &'f ControlFlowGraph,
    domtree: &'f DominatorTree,
    position: SecondaryMap<Block, usize>,
}

impl<'f> LoopComputer<'f> {
    fn compute(&mut self) -> LoopInfo {
        for (i, block) in self.func.layout().blocks().iter().enumerate() {
            self.position.insert(*block, i);
        }

        // back edges grouped by header, headers kept in program order
        let mut headers: Vec<Block> = Vec::new();
        let mut latches_of: SecondaryMap<Block, SmallVec<[Block; 2]>> = SecondaryMap::default();

        for block in self.func.layout().blocks().iter().copied() {
            if !self.domtree.is_reachable(block) {
                continue;
            }

            for succ in self.cfg.successors(block) {
                if self.domtree.dominates(block, *succ) {
                    if !latches_of.contains(*succ) {
                        latches_of.insert(*succ, SmallVec::default());
                        headers.push(*succ);
                    }

                    latches_of[*succ].push(block);
                }
            }
        }

        headers.sort_by_key(|header| self.position[*header]);

        // grow each loop body from its latches backwards to the header
        let mut bodies: Vec<(Block, SaHashSet<Block>)> = headers
            .iter()
            .map(|header| (*header, self.loop_body(*header, &latches_of[*header])))
            .collect();

        // innermost-first by size so nesting assignment is a scan
        bodies.sort_by_key(|(header, set)| (set.len(), self.position[*header]));

        let mut info = LoopInfo {
            loops: ArenaMap::default(),
            innermost: SecondaryMap::default(),
            irreducible: self.detect_irreducible(),
        };

        for (header, set) in bodies {
            let mut blocks: Vec<Block> = set.iter().copied().collect();

            blocks.sort_by_key(|block| self.position[*block]);

            // the header is the natural first element of the body
            let header_at = blocks
                .iter()
                .position(|block| *block == header)
                .expect("loop body must contain its own header");

            blocks[0..=header_at].rotate_right(1);

            let mut exits = SmallVec::new();

            for block in blocks.iter() {
                for succ in self.cfg.successors(*block) {
                    if !set.contains(succ) && !exits.contains(succ) {
                        exits.push(*succ);
                    }
                }
            }

            let lp = info.loops.insert(LoopData {
                header,
                latches: latches_of[header].clone(),
                blocks,
                set,
                exits,
                parent: PackedOption::none(),
                depth: 1,
            });

            // processing smallest-first means the first loop claiming a block
            // is the innermost one containing it
            for block in info.loops[lp].blocks.clone() {
                if !info.innermost.contains(block) {
                    info.innermost.insert(block, lp);
                }
            }
        }

        // parent = the innermost *other* loop containing the header; loops are
        // already sorted by size so scanning forward finds it
        for i in 0..info.loops.len() {
            let lp = Loop::new(i);
            let header = info.loops[lp].header;

            for j in (i + 1)..info.loops.len() {
                let candidate = Loop::new(j);

                if info.loops[candidate].set.contains(&header) {
                    info.loops[lp].parent = PackedOption::some(candidate);
                    break;
                }
            }
        }

        for i in 0..info.loops.len() {
            let lp = Loop::new(i);
            let mut depth = 1;
            let mut curr = info.loops[lp].parent;

            while let Some(parent) = curr.expand() {
                depth += 1;
                curr = info.loops[parent].parent;
            }

            info.loops[lp].depth = depth;
        }

        info
    }

    fn loop_body(&self, header: Block, latches: &[Block]) -> SaHashSet<Block> {
        let mut body = SaHashSet::default();
        let mut stack: Vec<Block> = Vec::new();

        body.insert(header);

        for latch in latches {
            if body.insert(*latch) {
                stack.push(*latch);
            }
        }

        while let Some(block) = stack.pop() {
            for pred in self.cfg.predecessors(block) {
                if self.domtree.is_reachable(*pred) && body.insert(*pred) {
                    stack.push(*pred);
                }
            }
        }

        body
    }

    // a retreating edge in the DFS whose target does not dominate its source
    // is an entry into the middle of a cycle
    fn detect_irreducible(&self) -> bool {
        let entry = match self.func.layout().entry_block() {
            Some(entry) => entry,
            None => return false,
        };

        let mut on_stack = SaHashSet::default();
        let mut seen = SaHashSet::default();
        let mut stack: Vec<(Block, usize)> = vec![(entry, 0)];

        seen.insert(entry);
        on_stack.insert(entry);

        while let Some((block, index)) = stack.pop() {
            match self.cfg.successors(block).get(index) {
                Some(succ) => {
                    stack.push((block, index + 1));

                    if on_stack.contains(succ) {
                        if !self.domtree.dominates(block, *succ) {
                            return true;
                        }
                    } else if seen.insert(*succ) {
                        on_stack.insert(*succ);
                        stack.push((*succ, 0));
                    }
                }
                None => {
                    on_stack.remove(&block);
                }
            }
        }

        false
    }
}
