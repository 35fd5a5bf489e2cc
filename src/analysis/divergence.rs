//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! The divergence analysis proper: a monotone worklist fixpoint that
//! classifies every SSA value as *uniform* (all lanes of a SIMD/SPMD group
//! agree on it) or *divergent* (lanes may disagree), given a set of seed
//! values known to be divergent.
//!
//! Divergence spreads along three kinds of edges:
//!
//! - **data dependence**: an instruction with a divergent operand computes
//!   a divergent result;
//! - **sync dependence**: a divergent branch makes the phis of its join
//!   blocks divergent even when every incoming value is uniform, the lanes
//!   arrive over different predecessors at once. Which blocks those are is
//!   the [`BranchDependenceAnalysis`]'s business;
//! - **temporal divergence**: lanes leaving a loop in different iterations
//!   make the loop's live-outs divergent.
//!
//! The analysis does not itself identify sources of divergence. The
//! [`LoopDivergenceAnalysis`] and [`GpuDivergenceAnalysis`] frontends seed
//! it for the two classic use cases.

use crate::analysis::{
    BranchDependenceAnalysis, ControlFlowGraph, DominatorTree, Loop, LoopInfo, PostDominatorTree,
};
use crate::ir::{Block, Function, FunctionPrinter, Inst, InstData, Value};
use crate::utility::SaHashSet;
use std::fmt;

/// Classifies values of one function as uniform or divergent, starting
/// from caller-provided seeds.
///
/// An instance is built, seeded through [`Self::mark_divergent`] /
/// [`Self::add_uniform_override`], run to fixpoint once with
/// [`Self::compute`], then queried. The divergent sets only ever grow, and
/// an instance is meant to be discarded after one analysis run.
pub struct DivergenceAnalysis<'f> {
    func: &'f Function,
    // analysis is restricted to this loop when present: values defined
    // outside it are not propagated into
    region_loop: Option<Loop>,
    domtree: &'f DominatorTree,
    loops: &'f LoopInfo,

    divergent_values: SaHashSet<Value>,
    // void instructions (terminators, `ret`) that became divergent; they
    // have no result value to put into `divergent_values`
    divergent_insts: SaHashSet<Inst>,
    uniform_overrides: SaHashSet<Value>,
    // seeds in marking order, the worklist bootstrap must not depend on
    // hash-set iteration order
    seeds: Vec<Value>,

    divergent_join_blocks: SaHashSet<Block>,
    temporal_divergent_blocks: SaHashSet<Block>,

    worklist: Vec<Inst>,
}

impl<'f> DivergenceAnalysis<'f> {
    /// Creates the analysis for `func`, optionally restricted to
    /// `region_loop`.
    pub fn new(
        func: &'f Function,
        region_loop: Option<Loop>,
        domtree: &'f DominatorTree,
        loops: &'f LoopInfo,
    ) -> Self {
        Self {
            func,
            region_loop,
            domtree,
            loops,
            divergent_values: SaHashSet::default(),
            divergent_insts: SaHashSet::default(),
            uniform_overrides: SaHashSet::default(),
            seeds: Vec::default(),
            divergent_join_blocks: SaHashSet::default(),
            temporal_divergent_blocks: SaHashSet::default(),
            worklist: Vec::default(),
        }
    }

    /// Marks a value as divergent.
    ///
    /// # Panics
    /// `value` must be an instruction result or a function argument, and
    /// must not be registered as a uniform override.
    pub fn mark_divergent(&mut self, value: Value) {
        assert!(
            !self.func.dfg().is_constant(value),
            "only instructions and arguments can be divergent"
        );
        assert!(
            !self.is_always_uniform(value),
            "can not mark a uniform override as divergent"
        );

        if self.divergent_values.insert(value) {
            self.seeds.push(value);
        }
    }

    /// Marks a value as immutably uniform: it will never be admitted as
    /// divergent, regardless of its operands.
    pub fn add_uniform_override(&mut self, value: Value) {
        self.uniform_overrides.insert(value);
    }

    /// Checks whether a value is in the divergent set.
    pub fn is_divergent(&self, value: Value) -> bool {
        self.divergent_values.contains(&value)
    }

    /// Checks whether a value was registered as a uniform override.
    pub fn is_always_uniform(&self, value: Value) -> bool {
        self.uniform_overrides.contains(&value)
    }

    /// Checks whether an instruction is divergent: its result is in the
    /// divergent set, or it is a void instruction that was tainted.
    pub fn is_inst_divergent(&self, inst: Inst) -> bool {
        match self.func.dfg().inst_to_result(inst) {
            Some(value) => self.is_divergent(value),
            None => self.divergent_insts.contains(&inst),
        }
    }

    /// Checks whether `block` was marked as a spatial join of a divergent
    /// branch: phis in it merge lanes arriving over different predecessors.
    pub fn is_join_divergent(&self, block: Block) -> bool {
        self.divergent_join_blocks.contains(&block)
    }

    /// Checks whether `block` was marked temporal-divergent: phis in it
    /// merge lanes that left a loop in different iterations.
    pub fn is_temporal_divergent(&self, block: Block) -> bool {
        self.temporal_divergent_blocks.contains(&block)
    }

    /// Runs the fixpoint: propagates divergence from the seeds until
    /// nothing changes anymore.
    ///
    /// `is_lcssa` states that the function is in loop-closed SSA form,
    /// every value used outside its defining loop passes through a phi in a
    /// loop exit block. That allows cross-loop joins to taint just those
    /// phis instead of scanning the loop's entire dominance region for
    /// live-outs.
    pub fn compute(&mut self, bda: &mut BranchDependenceAnalysis<'f>, is_lcssa: bool) {
        // push all users of seed values onto the worklist
        for i in 0..self.seeds.len() {
            let seed = self.seeds[i];

            for user in self.func.dfg().users(seed) {
                self.worklist.push(*user);
            }
        }

        // propagate divergence
        while let Some(inst) = self.worklist.pop() {
            // maintain uniformity of overrides
            if self.is_always_uniform_inst(inst) {
                continue;
            }

            if self.is_inst_divergent(inst) {
                continue;
            }

            // propagate divergence caused by a divergent branch condition
            if self.func.dfg().data(inst).is_terminator() {
                if self.update_terminator(inst) {
                    self.mark_inst_divergent(inst);
                    self.propagate_branch_divergence(inst, bda, is_lcssa);
                    continue;
                }
            }

            // update divergence of the instruction due to divergent operands
            let divergent_upd = if self.func.dfg().data(inst).is_phi() {
                self.update_phi(inst)
            } else {
                self.update_normal(inst)
            };

            // spread divergence to users
            if divergent_upd {
                self.mark_inst_divergent(inst);
                self.push_users(inst);
            }
        }
    }

    /// Writes every divergent instruction as a `DIVERGENT:<instruction>`
    /// line, in program order.
    pub fn print<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        if self.divergent_values.is_empty() && self.divergent_insts.is_empty() {
            return Ok(());
        }

        let printer = FunctionPrinter::new(self.func);

        for inst in self.func.insts() {
            if self.is_inst_divergent(inst) {
                writeln!(out, "DIVERGENT:{}", printer.inst(inst))?;
            }
        }

        Ok(())
    }

    /// Gets the function being analyzed.
    pub fn function(&self) -> &'f Function {
        self.func
    }

    /// Gets the loop the analysis is restricted to, if any.
    pub fn region_loop(&self) -> Option<Loop> {
        self.region_loop
    }

    fn is_always_uniform_inst(&self, inst: Inst) -> bool {
        match self.func.dfg().inst_to_result(inst) {
            Some(value) => self.is_always_uniform(value),
            None => false,
        }
    }

    fn mark_inst_divergent(&mut self, inst: Inst) {
        match self.func.dfg().inst_to_result(inst) {
            Some(value) => self.mark_divergent(value),
            None => {
                self.divergent_insts.insert(inst);
            }
        }
    }

    // a terminator spreads divergence iff it transfers control based on a
    // divergent condition. `invoke` always transfers uniformly (ignoring
    // abnormal execution through the landing pad), and anything with at
    // most one successor has nothing to diverge over.
    fn update_terminator(&self, inst: Inst) -> bool {
        let data = self.func.dfg().data(inst);

        if data.targets().len() <= 1 {
            return false;
        }

        match data {
            InstData::CondBr(condbr) => self.is_divergent(condbr.condition()),
            InstData::Switch(switch) => self.is_divergent(switch.condition()),
            InstData::Invoke(_) => false,
            _ => unreachable!("unknown terminator kind with multiple successors"),
        }
    }

    fn update_phi(&self, inst: Inst) -> bool {
        let block = self.func.layout().inst_block(inst);

        // join in divergence of the parent block
        if self.is_temporal_divergent(block) {
            return true;
        }

        if !self.func.dfg().phi_has_constant_or_undef_value(inst) && self.is_join_divergent(block)
        {
            return true;
        }

        // otherwise, join in incoming value divergence
        self.func
            .dfg()
            .data(inst)
            .operands()
            .iter()
            .any(|value| self.is_divergent(*value))
    }

    fn update_normal(&self, inst: Inst) -> bool {
        self.func
            .dfg()
            .data(inst)
            .operands()
            .iter()
            .any(|value| self.is_divergent(*value))
    }

    fn in_region(&self, inst: Inst) -> bool {
        match self.region_loop {
            Some(lp) => self
                .loops
                .contains(lp, self.func.layout().inst_block(inst)),
            None => true,
        }
    }

    fn push_users(&mut self, inst: Inst) {
        let value = match self.func.dfg().inst_to_result(inst) {
            Some(value) => value,
            None => return,
        };

        for user in self.func.dfg().users(value) {
            // only compute divergence inside the region
            if self.in_region(*user) {
                self.worklist.push(*user);
            }
        }
    }

    fn push_phis_of(&mut self, block: Block) {
        // borrow juggling: `phis` borrows the function, not `self`
        let func = self.func;

        for phi in func.phis(block) {
            self.worklist.push(phi);
        }
    }

    fn propagate_branch_divergence(
        &mut self,
        term: Inst,
        bda: &mut BranchDependenceAnalysis<'f>,
        is_lcssa: bool,
    ) {
        let parent = self.func.layout().inst_block(term);
        let branch_loop = self.loops.loop_of(parent);
        let mut taint_headers: Vec<Block> = Vec::new();

        for join in bda.join_blocks(term).iter() {
            let join_loop = self.loops.loop_of(join);

            if join_loop == branch_loop {
                // same loop level: a spatial join
                self.divergent_join_blocks.insert(join);
                self.push_phis_of(join);
            } else if is_lcssa {
                // in LCSSA form it is sufficient to taint the exit phis
                self.temporal_divergent_blocks.insert(join);
                self.push_phis_of(join);
            } else if let Some(lp) = branch_loop {
                // users of values carried by the branch's loop become
                // divergent outside it; those users are dominated by the
                // loop header or are phis at the fringes of that region
                taint_headers.push(self.loops.header(lp));
            } else {
                // the branch sits outside any loop and the join is a loop
                // header it enters: lanes arrive over different edges in
                // the same step, a spatial join
                self.divergent_join_blocks.insert(join);
                self.push_phis_of(join);
            }
        }

        for header in taint_headers {
            self.taint_loop_live_outs(header);
        }
    }

    // marks all users of loop-carried values of the loop headed by `header`
    // as divergent
    fn taint_loop_live_outs(&mut self, header: Block) {
        let div_loop = self
            .loops
            .loop_of(header)
            .expect("block is not part of a loop");

        debug_assert_eq!(self.loops.header(div_loop), header);

        let mut taint_stack: Vec<Block> = self.loops.exit_blocks(div_loop).to_vec();
        let mut visited: SaHashSet<Block> = taint_stack.iter().copied().collect();

        visited.insert(header);

        while let Some(user_block) = taint_stack.pop() {
            assert!(
                !self.loops.contains(div_loop, user_block),
                "irreducible control flow detected"
            );

            // phi nodes at the fringes of the dominance region
            if !self.domtree.dominates(user_block, header) {
                // all phi nodes in this block become divergent
                self.temporal_divergent_blocks.insert(user_block);
                self.push_phis_of(user_block);
                continue;
            }

            // taint outside users of values carried by the loop
            let func = self.func;

            for inst in func.layout().insts(user_block).iter().copied() {
                if self.is_always_uniform_inst(inst) || self.is_inst_divergent(inst) {
                    continue;
                }

                let uses_carried_value = func
                    .dfg()
                    .data(inst)
                    .operands()
                    .iter()
                    .any(|value| match func.dfg().value_to_inst(*value) {
                        Some(op) => self
                            .loops
                            .contains(div_loop, func.layout().inst_block(op)),
                        None => false,
                    });

                if uses_carried_value {
                    self.mark_inst_divergent(inst);
                    self.push_users(inst);
                }
            }

            // visit the rest of the dominance region
            if let Some(term) = func.terminator(user_block) {
                for succ in func.dfg().data(term).targets() {
                    if visited.insert(*succ) {
                        taint_stack.push(*succ);
                    }
                }
            }
        }
    }
}

/// Identifies target-specific sources of divergence for
/// [`GpuDivergenceAnalysis`].
///
/// The two hooks mirror what a GPU target knows about its intrinsics: a
/// lane/thread-id read diverges by construction, a workgroup-uniform read
/// never does, whatever its operands.
pub trait DivergenceOracle {
    /// Checks whether `value` is divergent by its very nature, e.g. a
    /// thread-id or lane-id read, an atomic result, a function argument of
    /// a non-kernel function.
    fn is_source_of_divergence(&self, func: &Function, value: Value) -> bool;

    /// Checks whether `value` is guaranteed uniform across the group no
    /// matter its operands, e.g. a workgroup-id read.
    fn is_always_uniform(&self, _func: &Function, _value: Value) -> bool {
        false
    }
}

/// Divergence analysis frontend for GPU kernels.
///
/// Consults a [`DivergenceOracle`] for every instruction and argument of
/// the kernel, seeds the generic analysis with its answers and runs the
/// fixpoint over the whole function (GPU kernels are not expected to be in
/// LCSSA form).
pub struct GpuDivergenceAnalysis<'f> {
    da: DivergenceAnalysis<'f>,
}

impl<'f> GpuDivergenceAnalysis<'f> {
    /// Runs the analysis over a kernel.
    ///
    /// # Panics
    /// Panics if the kernel's control flow is irreducible (via
    /// [`BranchDependenceAnalysis::new`]).
    pub fn new(
        func: &'f Function,
        cfg: &'f ControlFlowGraph,
        domtree: &'f DominatorTree,
        pdomtree: &'f PostDominatorTree,
        loops: &'f LoopInfo,
        oracle: &dyn DivergenceOracle,
    ) -> Self {
        let mut bda = BranchDependenceAnalysis::new(func, cfg, domtree, pdomtree, loops);
        let mut da = DivergenceAnalysis::new(func, None, domtree, loops);

        for inst in func.insts() {
            if let Some(value) = func.dfg().inst_to_result(inst) {
                if oracle.is_source_of_divergence(func, value) {
                    da.mark_divergent(value);
                } else if oracle.is_always_uniform(func, value) {
                    da.add_uniform_override(value);
                }
            }
        }

        for arg in func.args() {
            if oracle.is_source_of_divergence(func, *arg) {
                da.mark_divergent(*arg);
            }
        }

        // not in LCSSA form
        da.compute(&mut bda, false);

        Self { da }
    }

    /// Checks whether a value is divergent.
    pub fn is_divergent(&self, value: Value) -> bool {
        self.da.is_divergent(value)
    }

    /// Checks whether a value is uniform.
    pub fn is_uniform(&self, value: Value) -> bool {
        !self.is_divergent(value)
    }

    /// Writes all divergent values of the kernel in a diffable form.
    pub fn print<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        writeln!(out, "Divergence of kernel {} {{", self.da.function().name())?;
        self.da.print(out)?;
        writeln!(out, "}}")
    }
}

/// Divergence analysis frontend for loop vectorization.
///
/// Seeds every phi in the loop header as divergent (the induction variable
/// lives there, and lanes take consecutive iterations), overrides the loop
/// exit condition as uniform (after the scalar remainder loop is extracted,
/// the vectorized loop executes a uniform trip count) and runs the fixpoint
/// restricted to the loop. The function must be in LCSSA form.
pub struct LoopDivergenceAnalysis<'f> {
    da: DivergenceAnalysis<'f>,
}

impl<'f> LoopDivergenceAnalysis<'f> {
    /// Runs the analysis over one loop.
    pub fn new(
        func: &'f Function,
        bda: &mut BranchDependenceAnalysis<'f>,
        domtree: &'f DominatorTree,
        loops: &'f LoopInfo,
        lp: Loop,
    ) -> Self {
        let mut da = DivergenceAnalysis::new(func, Some(lp), domtree, loops);

        for phi in func.phis(loops.header(lp)) {
            let value = func
                .dfg()
                .inst_to_result(phi)
                .expect("phis always have results");

            da.mark_divergent(value);
        }

        // after the scalar remainder loop is extracted, the loop exit
        // condition will be uniform
        if let Some(cond) = Self::unique_exiting_condition(func, loops, lp) {
            da.add_uniform_override(cond);
        }

        // LCSSA form
        da.compute(bda, true);

        Self { da }
    }

    /// Checks whether a value is divergent.
    pub fn is_divergent(&self, value: Value) -> bool {
        self.da.is_divergent(value)
    }

    /// Checks whether a value is uniform.
    pub fn is_uniform(&self, value: Value) -> bool {
        !self.is_divergent(value)
    }

    /// Writes all divergent values of the loop in a diffable form.
    pub fn print<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        let lp = self
            .da
            .region_loop()
            .expect("loop analysis always has a region");
        let header = self.da.function().dfg().block(self.da.loops.header(lp));

        writeln!(out, "Divergence of loop {} {{", header.name())?;
        self.da.print(out)?;
        writeln!(out, "}}")
    }

    // the condition of the loop's single exiting branch, if the loop exits
    // over exactly one conditional branch
    fn unique_exiting_condition(func: &Function, loops: &LoopInfo, lp: Loop) -> Option<Value> {
        let mut exiting = None;

        for block in loops.blocks(lp) {
            let term = func.terminator(*block)?;

            if func
                .dfg()
                .data(term)
                .targets()
                .iter()
                .any(|succ| !loops.contains(lp, *succ))
            {
                match exiting {
                    None => exiting = Some(term),
                    Some(_) => return None,
                }
            }
        }

        func.dfg().data(exiting?).condition()
    }
}
