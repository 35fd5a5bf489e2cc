//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::SecondaryMap;
use crate::ir::{Block, Inst};

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// Models the layout of an entire function and every basic block in it.
///
/// The [`DataFlowGraph`](crate::ir::DataFlowGraph) owns the entities, this
/// owns the relationships *between* them: the block ordering and the
/// instruction ordering within each block. Program order as defined by this
/// structure is the iteration-order convention every analysis (and every
/// deterministic textual output) in the library is built on.
///
/// The analyses never splice code, so blocks are plain append-only vectors
/// rather than linked lists.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Layout {
    blocks: Vec<Block>,
    insts: SecondaryMap<Block, Vec<Inst>>,
    inst_blocks: SecondaryMap<Inst, Block>,
}

impl Layout {
    /// Creates a new, empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a block to the end of the block ordering.
    pub fn append_block(&mut self, block: Block) {
        debug_assert!(
            !self.insts.contains(block),
            "cannot insert same block multiple times"
        );

        self.blocks.push(block);
        self.insts.insert(block, Vec::default());
    }

    /// Appends an instruction to the end of the specified block. If this is
    /// the final instruction being appended to the block, it must be a
    /// terminator instruction.
    pub fn append_inst(&mut self, inst: Inst, block: Block) {
        debug_assert!(
            !self.inst_blocks.contains(inst),
            "cannot insert same inst multiple times"
        );

        self.insts[block].push(inst);
        self.inst_blocks.insert(inst, block);
    }

    /// The blocks of the function in program order. The first block is the
    /// entry block.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The entry block, if any blocks exist.
    pub fn entry_block(&self) -> Option<Block> {
        self.blocks.first().copied()
    }

    /// The instructions of `block` in program order.
    pub fn insts(&self, block: Block) -> &[Inst] {
        &self.insts[block]
    }

    /// The last instruction of `block`, if the block is non-empty. For a
    /// well-formed function this is the block's terminator.
    pub fn last_inst(&self, block: Block) -> Option<Inst> {
        self.insts[block].last().copied()
    }

    /// The block that contains `inst`.
    pub fn inst_block(&self, inst: Inst) -> Block {
        self.inst_blocks[inst]
    }

    /// The number of blocks in the layout.
    pub fn block_len(&self) -> usize {
        self.blocks.len()
    }
}
