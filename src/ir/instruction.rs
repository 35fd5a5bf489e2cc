//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::ir::{Block, Type, Value};
use smallvec::SmallVec;
use std::slice;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// This holds both the opcode of a given instruction and all the state
/// that makes up that specific instruction.
///
/// While each instruction may have wildly different actual data, they all
/// are stored in the same table and all inside the same `InstData` type.
///
/// The set is intentionally small: the phi and terminator kinds the
/// divergence analyses discriminate on, plus enough "normal" instructions
/// (arithmetic, comparisons, opaque calls) to express data dependence.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum InstData {
    /// `%x = phi T [ %a, bb1 ], [ %b, bb2 ]`, merges values flowing in from
    /// predecessor blocks.
    Phi(PhiInst),
    /// `%x = iadd T %a, %b`, integer addition.
    IAdd(ArithInst),
    /// `%x = imul T %a, %b`, integer multiplication.
    IMul(ArithInst),
    /// `%x = icmp op T %a, %b`, integer comparison yielding a `bool`.
    ICmp(ICmpInst),
    /// `%x = call T @f(args...)`, a direct call to an opaque function.
    Call(CallInst),
    /// `br target`, an unconditional branch.
    Br(BrInst),
    /// `condbr bool %cond, if, else`, a two-way conditional branch.
    CondBr(CondBrInst),
    /// `switch T %val, default, [ c1: bb1, c2: bb2 ]`, a multi-way branch.
    Switch(SwitchInst),
    /// `%x = invoke T @f(args...), normal, unwind`, a call that transfers
    /// control to one of two successors.
    Invoke(InvokeInst),
    /// `ret void` / `ret T %val`, returns from the function.
    Ret(RetInst),
    /// `unreachable`, a block that can never be executed to completion.
    Unreachable,
}

impl InstData {
    /// Gets any values that the instruction operates on.
    ///
    /// Note that this may be an empty slice, it is not safe to assume that
    /// there will be at least one operand. For phis, the operands are the
    /// incoming values (in predecessor order).
    pub fn operands(&self) -> &[Value] {
        match self {
            InstData::Phi(phi) => &phi.values,
            InstData::IAdd(arith) | InstData::IMul(arith) => &arith.operands,
            InstData::ICmp(icmp) => &icmp.operands,
            InstData::Call(call) => &call.args,
            InstData::Br(_) => &[],
            InstData::CondBr(condbr) => slice::from_ref(&condbr.cond),
            InstData::Switch(switch) => slice::from_ref(&switch.cond),
            InstData::Invoke(invoke) => &invoke.args,
            InstData::Ret(ret) => match &ret.value {
                Some(value) => slice::from_ref(value),
                None => &[],
            },
            InstData::Unreachable => &[],
        }
    }

    /// Gets the type of the instruction's result after it has been evaluated.
    ///
    /// Not all instructions will have one of these, terminators other than
    /// `invoke` and `call void`s do not evaluate to anything.
    pub fn result_ty(&self) -> Option<Type> {
        match self {
            InstData::Phi(phi) => Some(phi.ty),
            InstData::IAdd(arith) | InstData::IMul(arith) => Some(arith.ty),
            InstData::ICmp(_) => Some(Type::Bool),
            InstData::Call(call) => call.ret,
            InstData::Invoke(invoke) => invoke.ret,
            _ => None,
        }
    }

    /// Gets the possible blocks where control could be transferred to
    /// once this instruction is executed.
    ///
    /// Empty for non-terminators and for terminators that end execution
    /// (`ret`, `unreachable`).
    pub fn targets(&self) -> &[Block] {
        match self {
            InstData::Br(br) => slice::from_ref(&br.target),
            InstData::CondBr(condbr) => &condbr.targets,
            InstData::Switch(switch) => &switch.targets,
            InstData::Invoke(invoke) => &invoke.targets,
            _ => &[],
        }
    }

    /// Checks whether the instruction is one of the terminator kinds.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstData::Br(_)
                | InstData::CondBr(_)
                | InstData::Switch(_)
                | InstData::Invoke(_)
                | InstData::Ret(_)
                | InstData::Unreachable
        )
    }

    /// Checks whether the instruction is a phi.
    pub fn is_phi(&self) -> bool {
        matches!(self, InstData::Phi(_))
    }

    /// For `condbr` and `switch`, gets the value being branched on.
    pub fn condition(&self) -> Option<Value> {
        match self {
            InstData::CondBr(condbr) => Some(condbr.cond),
            InstData::Switch(switch) => Some(switch.cond),
            _ => None,
        }
    }
}

/// Models a single `phi` instruction.
///
/// Incoming pairs are kept as parallel arrays so the incoming values can
/// be handed out as a plain operand slice.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct PhiInst {
    pub(in crate::ir) ty: Type,
    pub(in crate::ir) blocks: SmallVec<[Block; 2]>,
    pub(in crate::ir) values: SmallVec<[Value; 2]>,
}

impl PhiInst {
    pub(in crate::ir) fn new(ty: Type, incoming: &[(Block, Value)]) -> Self {
        Self {
            ty,
            blocks: incoming.iter().map(|(bb, _)| *bb).collect(),
            values: incoming.iter().map(|(_, value)| *value).collect(),
        }
    }

    /// Gets the type of the merged value.
    pub fn ty(&self) -> Type {
        self.ty
    }

    /// Iterates over the `(predecessor, incoming value)` pairs in the
    /// order they were appended.
    pub fn incoming(&self) -> impl Iterator<Item = (Block, Value)> + '_ {
        self.blocks
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }

    /// Gets the value flowing in from `pred`, if `pred` is one of the
    /// phi's incoming blocks.
    pub fn incoming_for(&self, pred: Block) -> Option<Value> {
        self.incoming()
            .find(|(bb, _)| *bb == pred)
            .map(|(_, value)| value)
    }
}

/// Models the two-operand integer arithmetic instructions.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct ArithInst {
    pub(in crate::ir) ty: Type,
    pub(in crate::ir) operands: [Value; 2],
}

impl ArithInst {
    /// Gets the left-hand operand of the instruction.
    pub fn lhs(&self) -> Value {
        self.operands[0]
    }

    /// Gets the right-hand operand of the instruction.
    pub fn rhs(&self) -> Value {
        self.operands[1]
    }
}

/// Models the different ways that integer values can be compared with
/// the `icmp` instruction.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum ICmpOp {
    /// `eq`, checks if the integers are (bitwise) equivalent
    EQ,
    /// `ne`, checks if the integers are (bitwise) not-equal
    NE,
    /// `slt`, treats both integers as signed and checks if `a < b`
    SLT,
    /// `sle`, treats both integers as signed and checks if `a <= b`
    SLE,
    /// `sgt`, treats both integers as signed and checks if `a > b`
    SGT,
    /// `sge`, treats both integers as signed and checks if `a >= b`
    SGE,
    /// `ult`, treats both integers as unsigned and checks if `a < b`
    ULT,
    /// `ule`, treats both integers as unsigned and checks if `a <= b`
    ULE,
    /// `ugt`, treats both integers as unsigned and checks if `a > b`
    UGT,
    /// `uge`, treats both integers as unsigned and checks if `a >= b`
    UGE,
}

impl ICmpOp {
    pub(in crate::ir) fn mnemonic(self) -> &'static str {
        match self {
            ICmpOp::EQ => "eq",
            ICmpOp::NE => "ne",
            ICmpOp::SLT => "slt",
            ICmpOp::SLE => "sle",
            ICmpOp::SGT => "sgt",
            ICmpOp::SGE => "sge",
            ICmpOp::ULT => "ult",
            ICmpOp::ULE => "ule",
            ICmpOp::UGT => "ugt",
            ICmpOp::UGE => "uge",
        }
    }
}

/// Models a single `icmp` instruction.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct ICmpInst {
    pub(in crate::ir) op: ICmpOp,
    pub(in crate::ir) operands: [Value; 2],
}

impl ICmpInst {
    /// Gets the comparison being performed.
    pub fn op(&self) -> ICmpOp {
        self.op
    }

    /// Gets the left-hand operand of the comparison.
    pub fn lhs(&self) -> Value {
        self.operands[0]
    }

    /// Gets the right-hand operand of the comparison.
    pub fn rhs(&self) -> Value {
        self.operands[1]
    }
}

/// Models a direct call to an opaque callee.
///
/// The callee is identified by name only, the analyses treat call results
/// as black boxes (a frontend oracle decides whether they are sources of
/// divergence).
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct CallInst {
    pub(in crate::ir) callee: String,
    pub(in crate::ir) args: SmallVec<[Value; 4]>,
    pub(in crate::ir) ret: Option<Type>,
}

impl CallInst {
    /// Gets the name of the function being called.
    pub fn callee(&self) -> &str {
        &self.callee
    }

    /// Gets the call arguments.
    pub fn args(&self) -> &[Value] {
        &self.args
    }
}

/// Models an unconditional branch.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct BrInst {
    pub(in crate::ir) target: Block,
}

impl BrInst {
    /// Gets the block being branched to.
    pub fn target(&self) -> Block {
        self.target
    }
}

/// Models a conditional branch between two blocks.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct CondBrInst {
    pub(in crate::ir) cond: Value,
    pub(in crate::ir) targets: [Block; 2],
}

impl CondBrInst {
    /// Gets the condition being branched on.
    pub fn condition(&self) -> Value {
        self.cond
    }

    /// Gets the block taken when the condition is `true`.
    pub fn true_target(&self) -> Block {
        self.targets[0]
    }

    /// Gets the block taken when the condition is `false`.
    pub fn false_target(&self) -> Block {
        self.targets[1]
    }
}

/// Models a multi-way branch on an integer value.
///
/// `targets[0]` is the default target, `targets[1..]` line up with
/// `cases` in order.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct SwitchInst {
    pub(in crate::ir) cond: Value,
    pub(in crate::ir) cases: SmallVec<[i64; 2]>,
    pub(in crate::ir) targets: SmallVec<[Block; 2]>,
}

impl SwitchInst {
    /// Gets the value being switched over.
    pub fn condition(&self) -> Value {
        self.cond
    }

    /// Gets the default target of the switch.
    pub fn default_target(&self) -> Block {
        self.targets[0]
    }

    /// Iterates over the `(case value, target)` pairs in order.
    pub fn cases(&self) -> impl Iterator<Item = (i64, Block)> + '_ {
        self.cases
            .iter()
            .copied()
            .zip(self.targets[1..].iter().copied())
    }
}

/// Models a call that transfers control to one of two successors, the
/// normal destination or the unwind destination.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct InvokeInst {
    pub(in crate::ir) callee: String,
    pub(in crate::ir) args: SmallVec<[Value; 4]>,
    pub(in crate::ir) ret: Option<Type>,
    pub(in crate::ir) targets: [Block; 2],
}

impl InvokeInst {
    /// Gets the name of the function being invoked.
    pub fn callee(&self) -> &str {
        &self.callee
    }

    /// Gets the invoke arguments.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Gets the block control flows to on a normal return.
    pub fn normal_target(&self) -> Block {
        self.targets[0]
    }

    /// Gets the block control flows to when the callee unwinds.
    pub fn unwind_target(&self) -> Block {
        self.targets[1]
    }
}

/// Models a return from the function.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct RetInst {
    pub(in crate::ir) value: Option<Value>,
}

impl RetInst {
    /// Gets the value being returned, if the function returns one.
    pub fn value(&self) -> Option<Value> {
        self.value
    }
}
