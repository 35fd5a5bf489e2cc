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
use crate::ir::{Block, Function};
use smallvec::SmallVec;

/// Models successor/predecessor information about the control-flow graph of
/// a given function.
///
/// Edge lists are deduplicated and **ordered**: successors in terminator
/// target order, predecessors in program order of the predecessor blocks.
/// Every traversal in the divergence analyses iterates in these orders, so
/// two runs over the same function visit blocks identically. This is the
/// iteration-order convention the rest of the library documents itself
/// against.
pub struct ControlFlowGraph {
    succs: SecondaryMap<Block, SmallVec<[Block; 2]>>,
    preds: SecondaryMap<Block, SmallVec<[Block; 2]>>,
}

impl ControlFlowGraph {
    /// Directly computes flowgraph information for a given function.
    pub fn compute(func: &Function) -> Self {
        let mut succs = SecondaryMap::<Block, SmallVec<[Block; 2]>>::default();
        let mut preds = SecondaryMap::<Block, SmallVec<[Block; 2]>>::default();

        for block in func.layout().blocks() {
            succs.insert(*block, SmallVec::default());
            preds.insert(*block, SmallVec::default());
        }

        for block in func.layout().blocks() {
            let term = match func.terminator(*block) {
                Some(term) => term,
                None => panic!("invalid block, did not have a terminator"),
            };

            for target in func.dfg().data(term).targets() {
                let out = &mut succs[*block];

                // a `condbr` with identical targets contributes one edge
                if !out.contains(target) {
                    out.push(*target);
                    preds[*target].push(*block);
                }
            }
        }

        Self { succs, preds }
    }

    /// Returns the successors of `block`, in terminator target order.
    pub fn successors(&self, block: Block) -> &[Block] {
        &self.succs[block]
    }

    /// Returns the predecessors of `block`, in program order.
    pub fn predecessors(&self, block: Block) -> &[Block] {
        &self.preds[block]
    }

    /// Returns `block`'s single predecessor, if it has exactly one.
    pub fn unique_predecessor(&self, block: Block) -> Option<Block> {
        match self.preds[block].as_slice() {
            [single] => Some(*single),
            _ => None,
        }
    }

    /// Checks if `pred` is a predecessor of `block`.
    pub fn is_pred_of(&self, block: Block, pred: Block) -> bool {
        self.preds[block].contains(&pred)
    }

    /// Checks if `succ` is a successor of `block`.
    pub fn is_succ_of(&self, block: Block, succ: Block) -> bool {
        self.succs[block].contains(&succ)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::*;

    #[test]
    fn one_block() {
        let mut b = FunctionBuilder::new("main", &[]);

        // fn void @main() {
        // entry:
        //   unreachable
        // }
        let entry = b.create_block("entry");
        b.switch_to(entry);
        b.append().unreachable();

        let func = b.define();
        let cfg = ControlFlowGraph::compute(&func);

        assert!(cfg.predecessors(entry).is_empty());
        assert!(cfg.successors(entry).is_empty());
    }

    #[test]
    fn merge() {
        let mut b = FunctionBuilder::new("main", &[Type::Bool]);
        let cond = b.arg(0);

        //
        // fn void @main(bool) {
        // entry:
        //   condbr bool %0, if.true, otherwise
        //
        // if.true:
        //   br merge
        //
        // otherwise:
        //   br merge
        //
        // merge:
        //   ret void
        // }
        //
        let entry = b.create_block("entry");
        let if_true = b.create_block("if.true");
        let otherwise = b.create_block("otherwise");
        let merge = b.create_block("merge");

        b.switch_to(entry);
        b.append().condbr(cond, if_true, otherwise);

        b.switch_to(if_true);
        b.append().br(merge);

        b.switch_to(otherwise);
        b.append().br(merge);

        b.switch_to(merge);
        b.append().ret_void();

        let func = b.define();
        let cfg = ControlFlowGraph::compute(&func);

        assert!(cfg.predecessors(entry).is_empty());
        assert_eq!(cfg.successors(entry), &[if_true, otherwise]);
        assert_eq!(cfg.predecessors(merge), &[if_true, otherwise]);
        assert_eq!(cfg.successors(if_true), &[merge]);
        assert_eq!(cfg.successors(otherwise), &[merge]);
        assert!(cfg.successors(merge).is_empty());
        assert!(cfg.is_pred_of(merge, if_true));
        assert!(cfg.is_succ_of(entry, otherwise));
        assert_eq!(cfg.unique_predecessor(if_true), Some(entry));
        assert_eq!(cfg.unique_predecessor(merge), None);
    }

    #[test]
    fn infinite_loop() {
        let mut b = FunctionBuilder::new("main", &[]);

        //
        // fn void @main() {
        // entry:
        //   br entry
        // }
        //
        let entry = b.create_block("entry");
        b.switch_to(entry);
        b.append().br(entry);

        let func = b.define();
        let cfg = ControlFlowGraph::compute(&func);

        assert_eq!(cfg.predecessors(entry), &[entry]);
        assert_eq!(cfg.successors(entry), &[entry]);
    }

    #[test]
    fn condbr_same_target_is_one_edge() {
        let mut b = FunctionBuilder::new("main", &[Type::Bool]);
        let cond = b.arg(0);

        let entry = b.create_block("entry");
        let next = b.create_block("next");

        b.switch_to(entry);
        b.append().condbr(cond, next, next);

        b.switch_to(next);
        b.append().ret_void();

        let func = b.define();
        let cfg = ControlFlowGraph::compute(&func);

        assert_eq!(cfg.successors(entry), &[next]);
        assert_eq!(cfg.predecessors(next), &[entry]);
        assert_eq!(cfg.unique_predecessor(next), Some(entry));
    }

    #[test]
    fn canonical_loop() {
        let mut b = FunctionBuilder::new("main", &[Type::Bool]);
        let cond = b.arg(0);

        //
        // fn void @main(bool) {
        // entry:
        //   br loop.head
        //
        // loop.head:
        //   condbr bool %0, loop.body, exit
        //
        // loop.body:
        //   br loop.latch
        //
        // loop.latch:
        //   br loop.head
        //
        // exit:
        //   ret void
        // }
        //
        let entry = b.create_block("entry");
        let loop_head = b.create_block("loop.head");
        let loop_body = b.create_block("loop.body");
        let loop_latch = b.create_block("loop.latch");
        let exit = b.create_block("exit");

        b.switch_to(entry);
        b.append().br(loop_head);

        b.switch_to(loop_head);
        b.append().condbr(cond, loop_body, exit);

        b.switch_to(loop_body);
        b.append().br(loop_latch);

        b.switch_to(loop_latch);
        b.append().br(loop_head);

        b.switch_to(exit);
        b.append().ret_void();

        let func = b.define();
        let cfg = ControlFlowGraph::compute(&func);

        assert_eq!(cfg.successors(entry), &[loop_head]);
        assert_eq!(cfg.predecessors(loop_head), &[entry, loop_latch]);
        assert_eq!(cfg.successors(loop_head), &[loop_body, exit]);
        assert_eq!(cfg.predecessors(exit), &[loop_head]);
    }
}
