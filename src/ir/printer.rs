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
use crate::ir::{Block, ConstantKind, Function, Inst, InstData, Value, ValueDef};

/// Turns the entities of a single function into stable, human-readable text.
///
/// Value numbering is assigned once at construction: arguments first in
/// declaration order, then instruction results in program order. Two
/// printers over the same function therefore always produce byte-identical
/// text, which the diffable analysis output formats rely on.
pub struct FunctionPrinter<'f> {
    func: &'f Function,
    names: SecondaryMap<Value, u32>,
}

impl<'f> FunctionPrinter<'f> {
    /// Creates a printer for `func`, assigning names to every value.
    pub fn new(func: &'f Function) -> Self {
        let mut names = SecondaryMap::default();
        let mut next = 0u32;

        for arg in func.args() {
            names.insert(*arg, next);
            next += 1;
        }

        for inst in func.insts() {
            if let Some(value) = func.dfg().inst_to_result(inst) {
                names.insert(value, next);
                next += 1;
            }
        }

        Self { func, names }
    }

    /// Provides the textual name of a value: the `%N` syntax, or the
    /// literal for an interned constant.
    pub fn value(&self, value: Value) -> String {
        match self.func.dfg().value_def(value) {
            ValueDef::Const(constant) => match constant.kind() {
                ConstantKind::Int(int) => format!("{int}"),
                ConstantKind::Bool(boolean) => format!("{boolean}"),
                ConstantKind::Undef => "undef".to_owned(),
            },
            _ => format!("%{}", self.names[value]),
        }
    }

    /// Stringifies an entire instruction, including the `%N = ` result
    /// prefix if the instruction has a result.
    pub fn inst(&self, inst: Inst) -> String {
        let dfg = self.func.dfg();
        let mut out = String::new();

        if let Some(value) = dfg.inst_to_result(inst) {
            out += &format!("{} = ", self.value(value));
        }

        match dfg.data(inst) {
            InstData::Phi(phi) => {
                out += &format!("phi {}", phi.ty());

                for (i, (block, value)) in phi.incoming().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };

                    out += &format!("{sep}[ {}, {} ]", self.value(value), self.block(block));
                }
            }
            InstData::IAdd(arith) => {
                out += &format!(
                    "iadd {} {}, {}",
                    arith.ty,
                    self.value(arith.lhs()),
                    self.value(arith.rhs())
                );
            }
            InstData::IMul(arith) => {
                out += &format!(
                    "imul {} {}, {}",
                    arith.ty,
                    self.value(arith.lhs()),
                    self.value(arith.rhs())
                );
            }
            InstData::ICmp(icmp) => {
                out += &format!(
                    "icmp {} {} {}, {}",
                    icmp.op().mnemonic(),
                    self.func.ty(icmp.lhs()),
                    self.value(icmp.lhs()),
                    self.value(icmp.rhs())
                );
            }
            InstData::Call(call) => {
                let ret = match call.ret {
                    Some(ty) => format!("{ty}"),
                    None => "void".to_owned(),
                };

                out += &format!("call {ret} @{}({})", call.callee(), self.args(call.args()));
            }
            InstData::Br(br) => {
                out += &format!("br {}", self.block(br.target()));
            }
            InstData::CondBr(condbr) => {
                out += &format!(
                    "condbr bool {}, {}, {}",
                    self.value(condbr.condition()),
                    self.block(condbr.true_target()),
                    self.block(condbr.false_target())
                );
            }
            InstData::Switch(switch) => {
                out += &format!(
                    "switch {} {}, {}, [",
                    self.func.ty(switch.condition()),
                    self.value(switch.condition()),
                    self.block(switch.default_target())
                );

                for (i, (case, target)) in switch.cases().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };

                    out += &format!("{sep}{case}: {}", self.block(target));
                }

                out += " ]";
            }
            InstData::Invoke(invoke) => {
                let ret = match invoke.ret {
                    Some(ty) => format!("{ty}"),
                    None => "void".to_owned(),
                };

                out += &format!(
                    "invoke {ret} @{}({}), normal {}, unwind {}",
                    invoke.callee(),
                    self.args(invoke.args()),
                    self.block(invoke.normal_target()),
                    self.block(invoke.unwind_target())
                );
            }
            InstData::Ret(ret) => match ret.value() {
                Some(value) => {
                    out += &format!("ret {} {}", self.func.ty(value), self.value(value));
                }
                None => out += "ret void",
            },
            InstData::Unreachable => out += "unreachable",
        }

        out
    }

    /// Stringifies the whole function: prototype, blocks, instructions.
    pub fn function(&self) -> String {
        let mut out = format!("fn @{}(", self.func.name());

        for (i, arg) in self.func.args().iter().enumerate() {
            let sep = if i == 0 { "" } else { ", " };

            out += &format!("{sep}{} {}", self.func.ty(*arg), self.value(*arg));
        }

        out += ") {\n";

        for block in self.func.layout().blocks() {
            out += &format!("{}:\n", self.block(*block));

            for inst in self.func.layout().insts(*block) {
                out += &format!("  {}\n", self.inst(*inst));
            }
        }

        out + "}\n"
    }

    fn block(&self, block: Block) -> &str {
        self.func.dfg().block(block).name()
    }

    fn args(&self, args: &[Value]) -> String {
        let mut out = String::new();

        for (i, arg) in args.iter().enumerate() {
            let sep = if i == 0 { "" } else { ", " };

            out += &format!("{sep}{} {}", self.func.ty(*arg), self.value(*arg));
        }

        out
    }
}
