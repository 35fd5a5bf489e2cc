//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::{ArenaKey, ArenaMap, SecondaryMap};
use crate::dense_arena_key;
use crate::ir::{BasicBlock, Block, InstData, Type};
use crate::utility::SaHashMap;
use smallvec::SmallVec;
use static_assertions::assert_eq_size;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

dense_arena_key! {
    struct EntityRef;

    /// A basic reference to some value: the result of some computation,
    /// a function argument, or an interned constant. Since everything is
    /// based around function-scoped values, this is effectively equivalent
    /// to an `llvm::Value*`.
    ///
    /// These are completely useless without the associated [`DataFlowGraph`]
    /// they come from, as they are just keys into a giant table. The DFG
    /// contains all the information that actually makes these useful.
    pub struct Value;

    /// While [`Value`]s refer to a result of some sort, [`Inst`]s refer to
    /// the instructions themselves. This has a subtly different meaning: an
    /// [`Inst`] may not actually refer to something that produces a *result*.
    ///
    /// Some instructions model control flow (e.g. `ret`, `br`, `condbr`) and
    /// do not produce a result. These can never be referred to with
    /// [`Value`]s, but they *can* be referred to with [`Inst`]s.
    pub struct Inst;
}

// this enables us to turn `Value`s into `Inst`s or `EntityRef`s (and back),
// this is very useful for compact storage in homogenous containers
impl Value {
    pub(in crate::ir) fn raw_from(key: impl ArenaKey) -> Self {
        Self::new(key.index())
    }

    pub(in crate::ir) fn raw_into<T: ArenaKey>(self) -> T {
        T::new(self.index())
    }
}

impl Inst {
    pub(in crate::ir) fn raw_from(key: impl ArenaKey) -> Self {
        Self::new(key.index())
    }

    pub(in crate::ir) fn raw_into<T: ArenaKey>(self) -> T {
        T::new(self.index())
    }
}

/// The payload of an interned constant value.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum ConstantKind {
    /// An integer constant.
    Int(i64),
    /// A boolean constant.
    Bool(bool),
    /// An undefined value of the given type.
    Undef,
}

/// A typed constant. Constants are interned per function: materializing the
/// same constant twice yields the same [`Value`], which gives phi constant
/// detection plain value-identity semantics.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Constant {
    ty: Type,
    kind: ConstantKind,
}

impl Constant {
    /// Gets the type of the constant.
    pub fn ty(&self) -> Type {
        self.ty
    }

    /// Gets the payload of the constant.
    pub fn kind(&self) -> ConstantKind {
        self.kind
    }

    /// Checks whether the constant is an `undef`.
    pub fn is_undef(&self) -> bool {
        matches!(self.kind, ConstantKind::Undef)
    }
}

#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
struct ArgData {
    ty: Type,
    index: u32,
}

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
enum EntityData {
    Inst(InstData),
    Arg(ArgData),
    Const(Constant),
}

/// Models where a given value came from.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum ValueDef {
    /// The value is the result yielded by an instruction
    Inst(Inst),
    /// The value is the nth function argument
    Arg(u32),
    /// The value is an interned constant
    Const(Constant),
}

#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
struct ValueDefinition {
    ty: Type,
    data: ValueDef,
}

// the whole handle scheme relies on keys being thin u32 indices
assert_eq_size!(Value, u32);
assert_eq_size!(Inst, u32);
assert_eq_size!(Block, u32);

/// Owns all of the instructions, basic blocks, values, and everything else
/// in a given function. Also models all the data-flow information between
/// various instructions, although it does not model any of the actual code
/// layout information (block ordering, instruction ordering, etc).
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct DataFlowGraph {
    //
    // fundamental magic for this whole data structure:
    //   1. every 'entity' (an instruction, argument or constant) has a slot
    //      in `entities`
    //   2. every Inst has the same key value as its associated entity
    //   3. every Value has the same key value as the entity that *yields* it,
    //      and also has a slot in `values`
    //
    // this means that (valid) Insts and Values can **always** be used as
    // EntityRefs, but Insts and Values themselves can only be safely converted
    // when it's known that the inst referred to has a result
    blocks: ArenaMap<Block, BasicBlock>,
    entities: ArenaMap<EntityRef, EntityData>,
    values: SecondaryMap<Value, ValueDefinition>,
    uses: SecondaryMap<Value, SmallVec<[Inst; 4]>>,
    constants: SaHashMap<Constant, Value>,
}

impl DataFlowGraph {
    /// Creates a new data-flow graph for a new function.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a basic block with a given name into the DFG.
    pub fn insert_block(&mut self, name: &str) -> Block {
        self.blocks.insert(BasicBlock::new(name))
    }

    /// Resolves a block into a full [`BasicBlock`].
    pub fn block(&self, block: Block) -> &BasicBlock {
        &self.blocks[block]
    }

    /// Checks if the DFG contains a given block.
    pub fn is_block_inserted(&self, block: Block) -> bool {
        self.blocks.contains(block)
    }

    /// Inserts an instruction into the DFG, and returns a reference to it. If
    /// the instruction yields a result (and thus can also be used as an operand
    /// for other instructions), that value is also returned.
    ///
    /// Every operand of the instruction gains `inst` as a user, in
    /// operand order.
    pub fn insert_inst(&mut self, data: InstData) -> (Inst, Option<Value>) {
        let result = data.result_ty();

        for value in data.operands() {
            debug_assert!(self.values.contains(*value), "operand is not a value");
        }

        let operands: SmallVec<[Value; 4]> = SmallVec::from_slice(data.operands());
        let key = self.entities.insert(EntityData::Inst(data));
        let inst = Inst::raw_from(key);

        for value in operands {
            self.uses[value].push(inst);
        }

        match result {
            Some(ty) => {
                let value = Value::raw_from(key);

                self.values.insert(
                    value,
                    ValueDefinition {
                        ty,
                        data: ValueDef::Inst(inst),
                    },
                );
                self.uses.insert(value, SmallVec::default());

                (inst, Some(value))
            }
            None => (inst, None),
        }
    }

    /// Appends an incoming `(predecessor, value)` pair to a phi inserted
    /// earlier.
    ///
    /// Loop-carried inputs are built this way: create the phi with its
    /// entry-edge incoming, then append the backedge value once the
    /// instruction computing it exists.
    pub fn append_phi_incoming(&mut self, phi: Inst, block: Block, value: Value) {
        debug_assert!(self.values.contains(value), "operand is not a value");

        self.uses[value].push(phi);

        match &mut self.entities[phi.raw_into()] {
            EntityData::Inst(InstData::Phi(data)) => {
                data.blocks.push(block);
                data.values.push(value);
            }
            _ => unreachable!("instruction is not a phi"),
        }
    }

    /// Creates a value for the `index`th function argument.
    pub fn create_arg(&mut self, ty: Type, index: u32) -> Value {
        let key = self.entities.insert(EntityData::Arg(ArgData { ty, index }));
        let value = Value::raw_from(key);

        self.values.insert(
            value,
            ValueDefinition {
                ty,
                data: ValueDef::Arg(index),
            },
        );
        self.uses.insert(value, SmallVec::default());

        value
    }

    /// Materializes (or re-uses) an interned constant.
    pub fn insert_constant(&mut self, constant: Constant) -> Value {
        if let Some(value) = self.constants.get(&constant) {
            return *value;
        }

        let key = self.entities.insert(EntityData::Const(constant));
        let value = Value::raw_from(key);

        self.values.insert(
            value,
            ValueDefinition {
                ty: constant.ty(),
                data: ValueDef::Const(constant),
            },
        );
        self.uses.insert(value, SmallVec::default());
        self.constants.insert(constant, value);

        value
    }

    /// Materializes an integer constant of the given type.
    pub fn iconst(&mut self, ty: Type, value: i64) -> Value {
        debug_assert!(ty.is_int());

        self.insert_constant(Constant {
            ty,
            kind: ConstantKind::Int(value),
        })
    }

    /// Materializes a boolean constant.
    pub fn bconst(&mut self, value: bool) -> Value {
        self.insert_constant(Constant {
            ty: Type::Bool,
            kind: ConstantKind::Bool(value),
        })
    }

    /// Materializes an `undef` of the given type.
    pub fn undef(&mut self, ty: Type) -> Value {
        self.insert_constant(Constant {
            ty,
            kind: ConstantKind::Undef,
        })
    }

    /// Gets a single instruction's [`InstData`].
    pub fn data(&self, inst: Inst) -> &InstData {
        match &self.entities[inst.raw_into()] {
            EntityData::Inst(data) => data,
            _ => unreachable!("got an `Inst` that did not refer to an instruction"),
        }
    }

    /// Gets the type of the value that a given [`Value`] evaluates to.
    pub fn ty(&self, value: Value) -> Type {
        self.values[value].ty
    }

    /// Gets the definition of a given value.
    pub fn value_def(&self, value: Value) -> ValueDef {
        self.values[value].data
    }

    /// Converts a [`Value`] into an [`Inst`] if and only if that value refers
    /// to an instruction's result. If `value` is an argument or constant,
    /// `None` is returned.
    pub fn value_to_inst(&self, value: Value) -> Option<Inst> {
        match self.values[value].data {
            ValueDef::Inst(inst) => Some(inst),
            _ => None,
        }
    }

    /// Converts an [`Inst`] into a [`Value`] referring to its result if and
    /// only if that instruction actually yields a result.
    pub fn inst_to_result(&self, inst: Inst) -> Option<Value> {
        self.values.get(inst.raw_into()).map(|_| inst.raw_into())
    }

    /// Gets any values that are used as operands for computing `value`.
    ///
    /// This can potentially be empty, e.g. for arguments or constants.
    pub fn operands(&self, value: Value) -> &[Value] {
        match &self.entities[value.raw_into()] {
            EntityData::Inst(data) => data.operands(),
            _ => &[],
        }
    }

    /// Gets the instructions that use `value` as an operand, in the order
    /// the uses were inserted.
    pub fn users(&self, value: Value) -> &[Inst] {
        &self.uses[value]
    }

    /// Checks if a given value is a function argument.
    pub fn is_arg(&self, value: Value) -> bool {
        matches!(self.values[value].data, ValueDef::Arg(_))
    }

    /// Checks if a given value is an interned constant (including `undef`).
    pub fn is_constant(&self, value: Value) -> bool {
        matches!(self.values[value].data, ValueDef::Const(_))
    }

    /// Checks if a given value is an `undef` constant.
    pub fn is_undef(&self, value: Value) -> bool {
        matches!(
            self.values[value].data,
            ValueDef::Const(constant) if constant.is_undef()
        )
    }

    /// Checks whether `inst` is a phi whose incoming values are all the same
    /// value, ignoring `undef`s.
    ///
    /// A phi like that cannot be made divergent by control divergence alone:
    /// whichever predecessor a lane arrives from, it observes the same value.
    pub fn phi_has_constant_or_undef_value(&self, inst: Inst) -> bool {
        let phi = match self.data(inst) {
            InstData::Phi(phi) => phi,
            _ => unreachable!("instruction is not a phi"),
        };

        let mut merged = None;

        for value in phi.values.iter().copied() {
            if self.is_undef(value) {
                continue;
            }

            match merged {
                Some(seen) if seen != value => return false,
                _ => merged = Some(value),
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ArithInst, PhiInst};

    #[test]
    fn constants_are_interned() {
        let mut dfg = DataFlowGraph::new();

        let one = dfg.iconst(Type::I32, 1);
        let one_again = dfg.iconst(Type::I32, 1);
        let two = dfg.iconst(Type::I32, 2);
        let one_i64 = dfg.iconst(Type::I64, 1);
        let undef = dfg.undef(Type::I32);

        assert_eq!(one, one_again);
        assert_ne!(one, two);
        assert_ne!(one, one_i64);
        assert!(dfg.is_constant(one));
        assert!(!dfg.is_undef(one));
        assert!(dfg.is_undef(undef));
    }

    #[test]
    fn uses_are_recorded_in_operand_order() {
        let mut dfg = DataFlowGraph::new();

        let a = dfg.create_arg(Type::I32, 0);
        let b = dfg.create_arg(Type::I32, 1);
        let (add, result) = dfg.insert_inst(InstData::IAdd(ArithInst {
            ty: Type::I32,
            operands: [a, b],
        }));

        assert!(result.is_some());
        assert_eq!(dfg.users(a), &[add]);
        assert_eq!(dfg.users(b), &[add]);
        assert_eq!(dfg.operands(result.unwrap()), &[a, b]);
    }

    #[test]
    fn phi_constant_detection() {
        let mut dfg = DataFlowGraph::new();

        let bb1 = dfg.insert_block("bb1");
        let bb2 = dfg.insert_block("bb2");

        let one = dfg.iconst(Type::I32, 1);
        let two = dfg.iconst(Type::I32, 2);
        let undef = dfg.undef(Type::I32);

        let (same, _) = dfg.insert_inst(InstData::Phi(PhiInst::new(
            Type::I32,
            &[(bb1, one), (bb2, one)],
        )));
        let (mixed, _) = dfg.insert_inst(InstData::Phi(PhiInst::new(
            Type::I32,
            &[(bb1, one), (bb2, two)],
        )));
        let (with_undef, _) = dfg.insert_inst(InstData::Phi(PhiInst::new(
            Type::I32,
            &[(bb1, one), (bb2, undef)],
        )));

        assert!(dfg.phi_has_constant_or_undef_value(same));
        assert!(!dfg.phi_has_constant_or_undef_value(mixed));
        assert!(dfg.phi_has_constant_or_undef_value(with_undef));
    }
}
