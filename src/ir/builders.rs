//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::{
    ArithInst, Block, BrInst, CallInst, CondBrInst, DataFlowGraph, Function, ICmpInst, ICmpOp,
    Inst, InstData, InvokeInst, Layout, PhiInst, RetInst, SwitchInst, Type, Value,
};
use smallvec::SmallVec;

/// Builds up a [`Function`] block by block, instruction by instruction.
///
/// ```
/// # use lapis::ir::*;
/// let mut b = FunctionBuilder::new("select", &[Type::Bool, Type::I32, Type::I32]);
/// let (cond, x, y) = (b.arg(0), b.arg(1), b.arg(2));
///
/// let entry = b.create_block("entry");
/// let left = b.create_block("left");
/// let right = b.create_block("right");
/// let merge = b.create_block("merge");
///
/// b.switch_to(entry);
/// b.append().condbr(cond, left, right);
///
/// b.switch_to(left);
/// b.append().br(merge);
///
/// b.switch_to(right);
/// b.append().br(merge);
///
/// b.switch_to(merge);
/// let result = b.append().phi(Type::I32, &[(left, x), (right, y)]);
/// b.append().ret(result);
///
/// let func = b.define();
/// assert_eq!(func.name(), "select");
/// ```
pub struct FunctionBuilder {
    name: String,
    args: SmallVec<[Value; 4]>,
    dfg: DataFlowGraph,
    layout: Layout,
    current: Option<Block>,
}

impl FunctionBuilder {
    /// Creates a builder for a function with the given name and
    /// parameter types.
    pub fn new(name: &str, params: &[Type]) -> Self {
        let mut dfg = DataFlowGraph::new();
        let args = params
            .iter()
            .enumerate()
            .map(|(i, ty)| dfg.create_arg(*ty, i as u32))
            .collect();

        Self {
            name: name.to_owned(),
            args,
            dfg,
            layout: Layout::new(),
            current: None,
        }
    }

    /// Gets the value of the `index`th function argument.
    pub fn arg(&self, index: usize) -> Value {
        self.args[index]
    }

    /// Creates a new block and appends it to the layout.
    pub fn create_block(&mut self, name: &str) -> Block {
        let block = self.dfg.insert_block(name);

        self.layout.append_block(block);

        block
    }

    /// Makes `block` the block that subsequent instructions are
    /// appended to.
    pub fn switch_to(&mut self, block: Block) {
        debug_assert!(self.dfg.is_block_inserted(block));

        self.current = Some(block);
    }

    /// Gets the block currently being inserted into.
    pub fn current_block(&self) -> Option<Block> {
        self.current
    }

    /// Materializes an integer constant.
    pub fn iconst(&mut self, ty: Type, value: i64) -> Value {
        self.dfg.iconst(ty, value)
    }

    /// Materializes a boolean constant.
    pub fn bconst(&mut self, value: bool) -> Value {
        self.dfg.bconst(value)
    }

    /// Materializes an `undef` of the given type.
    pub fn undef(&mut self, ty: Type) -> Value {
        self.dfg.undef(ty)
    }

    /// Converts an [`Inst`] into its result [`Value`], if it has one.
    pub fn inst_to_result(&self, inst: Inst) -> Option<Value> {
        self.dfg.inst_to_result(inst)
    }

    /// Appends an incoming `(predecessor, value)` pair to a phi built
    /// earlier, closing a loop-carried forward reference.
    ///
    /// # Panics
    /// `phi` must be the result of a phi instruction.
    pub fn append_phi_incoming(&mut self, phi: Value, block: Block, value: Value) {
        let inst = self
            .dfg
            .value_to_inst(phi)
            .expect("value is not an instruction result");

        self.dfg.append_phi_incoming(inst, block, value);
    }

    /// Starts appending an instruction at the end of the current block.
    pub fn append(&mut self) -> InstBuilder<'_> {
        let block = self.current.expect("no block is being inserted into");

        debug_assert!(
            self.layout
                .last_inst(block)
                .map(|inst| !self.dfg.data(inst).is_terminator())
                .unwrap_or(true),
            "cannot append to a block that already has a terminator"
        );

        InstBuilder {
            builder: self,
            block,
        }
    }

    /// Finishes the function.
    ///
    /// Every block must have been terminated by the time this is called.
    pub fn define(self) -> Function {
        for block in self.layout.blocks() {
            assert!(
                self.layout
                    .last_inst(*block)
                    .map(|inst| self.dfg.data(inst).is_terminator())
                    .unwrap_or(false),
                "block '{}' has no terminator",
                self.dfg.block(*block).name()
            );
        }

        Function::new(self.name, self.args, self.dfg, self.layout)
    }

    fn push(&mut self, block: Block, data: InstData) -> (Inst, Option<Value>) {
        let (inst, result) = self.dfg.insert_inst(data);

        self.layout.append_inst(inst, block);

        (inst, result)
    }
}

/// Appends one instruction to a block, obtained from
/// [`FunctionBuilder::append`].
pub struct InstBuilder<'b> {
    builder: &'b mut FunctionBuilder,
    block: Block,
}

impl<'b> InstBuilder<'b> {
    /// `%x = phi T [ v, bb ]...`. Phis may only appear at the head of
    /// a block.
    pub fn phi(self, ty: Type, incoming: &[(Block, Value)]) -> Value {
        debug_assert!(
            self.builder
                .layout
                .insts(self.block)
                .iter()
                .all(|inst| self.builder.dfg.data(*inst).is_phi()),
            "phis must form a prefix of their block"
        );

        let (_, result) = self
            .builder
            .push(self.block, InstData::Phi(PhiInst::new(ty, incoming)));

        result.unwrap()
    }

    /// `%x = iadd T a, b`.
    pub fn iadd(self, lhs: Value, rhs: Value) -> Value {
        let ty = self.builder.dfg.ty(lhs);
        let (_, result) = self.builder.push(
            self.block,
            InstData::IAdd(ArithInst {
                ty,
                operands: [lhs, rhs],
            }),
        );

        result.unwrap()
    }

    /// `%x = imul T a, b`.
    pub fn imul(self, lhs: Value, rhs: Value) -> Value {
        let ty = self.builder.dfg.ty(lhs);
        let (_, result) = self.builder.push(
            self.block,
            InstData::IMul(ArithInst {
                ty,
                operands: [lhs, rhs],
            }),
        );

        result.unwrap()
    }

    /// `%x = icmp op T a, b`.
    pub fn icmp(self, op: ICmpOp, lhs: Value, rhs: Value) -> Value {
        let (_, result) = self.builder.push(
            self.block,
            InstData::ICmp(ICmpInst {
                op,
                operands: [lhs, rhs],
            }),
        );

        result.unwrap()
    }

    /// `%x = call T @callee(args...)`.
    pub fn call(self, callee: &str, args: &[Value], ret: Type) -> Value {
        let (_, result) = self.builder.push(
            self.block,
            InstData::Call(CallInst {
                callee: callee.to_owned(),
                args: SmallVec::from_slice(args),
                ret: Some(ret),
            }),
        );

        result.unwrap()
    }

    /// `br target`.
    pub fn br(self, target: Block) -> Inst {
        self.builder.push(self.block, InstData::Br(BrInst { target })).0
    }

    /// `condbr bool cond, if_true, if_false`.
    pub fn condbr(self, cond: Value, if_true: Block, if_false: Block) -> Inst {
        debug_assert!(self.builder.dfg.ty(cond).is_bool());

        self.builder
            .push(
                self.block,
                InstData::CondBr(CondBrInst {
                    cond,
                    targets: [if_true, if_false],
                }),
            )
            .0
    }

    /// `switch T cond, default, [ c: bb... ]`.
    pub fn switch(self, cond: Value, default: Block, cases: &[(i64, Block)]) -> Inst {
        let mut targets = SmallVec::with_capacity(cases.len() + 1);

        targets.push(default);
        targets.extend(cases.iter().map(|(_, bb)| *bb));

        self.builder
            .push(
                self.block,
                InstData::Switch(SwitchInst {
                    cond,
                    cases: cases.iter().map(|(value, _)| *value).collect(),
                    targets,
                }),
            )
            .0
    }

    /// `%x = invoke T @callee(args...), normal, unwind`.
    pub fn invoke(
        self,
        callee: &str,
        args: &[Value],
        ret: Type,
        normal: Block,
        unwind: Block,
    ) -> Inst {
        self.builder
            .push(
                self.block,
                InstData::Invoke(InvokeInst {
                    callee: callee.to_owned(),
                    args: SmallVec::from_slice(args),
                    ret: Some(ret),
                    targets: [normal, unwind],
                }),
            )
            .0
    }

    /// `ret T value`.
    pub fn ret(self, value: Value) -> Inst {
        self.builder
            .push(self.block, InstData::Ret(RetInst { value: Some(value) }))
            .0
    }

    /// `ret void`.
    pub fn ret_void(self) -> Inst {
        self.builder
            .push(self.block, InstData::Ret(RetInst { value: None }))
            .0
    }

    /// `unreachable`.
    pub fn unreachable(self) -> Inst {
        self.builder.push(self.block, InstData::Unreachable).0
    }
}
