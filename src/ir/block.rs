//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::dense_arena_key;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

dense_arena_key! {
    /// References a single basic block in a function.
    ///
    /// Must be resolved with a [`DataFlowGraph`](crate::ir::DataFlowGraph) into
    /// an actual [`BasicBlock`] object. Being a stable integer handle, it is
    /// usable as a key for side tables in every analysis.
    pub struct Block;
}

/// Models a single basic block in a function.
///
/// A block is a label plus a linear sequence of instructions ending in a
/// terminator; the instruction list itself lives in the function's
/// [`Layout`](crate::ir::Layout). Phi instructions, when present, form a
/// prefix of the block's instruction list.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct BasicBlock {
    name: String,
}

impl BasicBlock {
    pub(in crate::ir) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
        }
    }

    /// Gets the name of the block.
    pub fn name(&self) -> &str {
        &self.name
    }
}
