//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::{Block, DataFlowGraph, Inst, Layout, Type, Value};
use smallvec::SmallVec;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// Models a single function in SSA form.
///
/// Contains the data-flow graph (the storage for every entity used inside
/// the function), the layout (program order), a list of argument values,
/// and a name.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Function {
    name: String,
    args: SmallVec<[Value; 4]>,
    dfg: DataFlowGraph,
    layout: Layout,
}

impl Function {
    pub(in crate::ir) fn new(
        name: String,
        args: SmallVec<[Value; 4]>,
        dfg: DataFlowGraph,
        layout: Layout,
    ) -> Self {
        Self {
            name,
            args,
            dfg,
            layout,
        }
    }

    /// Gets the name of the function without `@`.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the values modeling the function's arguments, in
    /// declaration order.
    #[inline]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Gets the data-flow graph of the function.
    #[inline]
    pub fn dfg(&self) -> &DataFlowGraph {
        &self.dfg
    }

    /// Gets the layout of the function.
    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Gets the terminator of `block`.
    ///
    /// Returns `None` for a block that is empty or whose last instruction is
    /// not a terminator, either means the function is still being built.
    pub fn terminator(&self, block: Block) -> Option<Inst> {
        self.layout
            .last_inst(block)
            .filter(|inst| self.dfg.data(*inst).is_terminator())
    }

    /// Iterates over the phi instructions at the head of `block`, in
    /// program order.
    pub fn phis(&self, block: Block) -> impl Iterator<Item = Inst> + '_ {
        self.layout
            .insts(block)
            .iter()
            .copied()
            .take_while(|inst| self.dfg.data(*inst).is_phi())
    }

    /// Iterates over every instruction in the function in program order.
    pub fn insts(&self) -> impl Iterator<Item = Inst> + '_ {
        self.layout
            .blocks()
            .iter()
            .flat_map(|block| self.layout.insts(*block).iter().copied())
    }

    /// Gets the type of a value. Convenience forwarder to the DFG.
    #[inline]
    pub fn ty(&self, value: Value) -> Type {
        self.dfg.ty(value)
    }
}
