//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::analysis::disjoint_paths::SearchScope;
use crate::analysis::{
    ControlFlowGraph, DivPathDecider, DominatorTree, Loop, LoopInfo, PostDominatorTree,
};
use crate::ir::{Block, Function, Inst};
use crate::utility::SaHashMap;
use smallvec::SmallVec;

/// A small ordered set of blocks.
///
/// Join-block sets are tiny in practice (a handful of blocks for even the
/// nastiest branches), so this is a sorted inline vector rather than a hash
/// set: no allocation for the common case, and iteration order is a
/// deterministic function of the contents alone.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct BlockSet {
    blocks: SmallVec<[Block; 4]>,
}

impl BlockSet {
    /// Inserts `block`, returning whether it was newly added.
    pub fn insert(&mut self, block: Block) -> bool {
        match self.blocks.binary_search(&block) {
            Ok(_) => false,
            Err(at) => {
                self.blocks.insert(at, block);

                true
            }
        }
    }

    /// Checks whether `block` is in the set.
    pub fn contains(&self, block: Block) -> bool {
        self.blocks.binary_search(&block).is_ok()
    }

    /// Iterates over the blocks in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = Block> + '_ {
        self.blocks.iter().copied()
    }

    /// The number of blocks in the set.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Checks whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl FromIterator<Block> for BlockSet {
    fn from_iter<T: IntoIterator<Item = Block>>(iter: T) -> Self {
        let mut set = Self::default();

        for block in iter {
            set.insert(block);
        }

        set
    }
}

/// Selects how [`BranchDependenceAnalysis`] computes a join-block set.
///
/// Both strategies produce identical sets on reducible control flow; the
/// forward propagation is linear in the reachable region and is the
/// default, the disjoint-paths form exists as an independently testable
/// oracle built on [`DivPathDecider`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum JoinStrategy {
    /// Propagate "last reaching definition" colors forward from the branch
    /// targets, bounded by the immediate post-dominator and the loop header.
    ForwardPropagation,
    /// Ask the max-flow engine for two vertex-disjoint paths per candidate
    /// block, and for an escaping/returning pair per loop exit.
    DisjointPaths,
}

/// Maps a branch to the set of blocks whose phi nodes become divergent if
/// the branch is divergent.
///
/// In the SPMD setting a group of lanes executes a function in
/// bulk-synchronous fashion. If a varying value computes a branch condition,
/// control among the lanes may diverge; phis reachable from the branch over
/// two vertex-disjoint paths then receive values from different incoming
/// blocks at once, and become varying even when every incoming value is
/// uniform. Loop exits get the same treatment in time instead of space: if
/// one path from the branch leaves the loop while a disjoint one returns to
/// the header, lanes exit in different iterations and the exit's phis see a
/// mix of iterations.
///
/// [`DivergenceAnalysis`](crate::analysis::DivergenceAnalysis) consults this
/// to propagate control-induced divergence into phis; results are memoized
/// per terminator for the lifetime of the instance.
pub struct BranchDependenceAnalysis<'f> {
    func: &'f Function,
    cfg: &'f ControlFlowGraph,
    domtree: &'f DominatorTree,
    pdomtree: &'f PostDominatorTree,
    loops: &'f LoopInfo,
    dpd: DivPathDecider<'f>,
    strategy: JoinStrategy,
    cached_join_blocks: SaHashMap<Inst, BlockSet>,
    computed: usize,
    empty: BlockSet,
}

impl<'f> BranchDependenceAnalysis<'f> {
    /// Creates the analysis for one function with the default
    /// (forward-propagation) strategy.
    ///
    /// # Panics
    /// Panics if the function's control flow is irreducible, the join-block
    /// bounds are only sound for natural loops.
    pub fn new(
        func: &'f Function,
        cfg: &'f ControlFlowGraph,
        domtree: &'f DominatorTree,
        pdomtree: &'f PostDominatorTree,
        loops: &'f LoopInfo,
    ) -> Self {
        Self::with_strategy(
            func,
            cfg,
            domtree,
            pdomtree,
            loops,
            JoinStrategy::ForwardPropagation,
        )
    }

    /// Creates the analysis with an explicit strategy.
    pub fn with_strategy(
        func: &'f Function,
        cfg: &'f ControlFlowGraph,
        domtree: &'f DominatorTree,
        pdomtree: &'f PostDominatorTree,
        loops: &'f LoopInfo,
        strategy: JoinStrategy,
    ) -> Self {
        assert!(
            loops.is_reducible(),
            "irreducible control flow detected, refusing to analyze"
        );

        Self {
            func,
            cfg,
            domtree,
            pdomtree,
            loops,
            dpd: DivPathDecider::new(cfg),
            strategy,
            cached_join_blocks: SaHashMap::default(),
            computed: 0,
            empty: BlockSet::default(),
        }
    }

    /// Returns the set of blocks whose phi nodes become divergent if `term`
    /// is divergent.
    ///
    /// `term` must be a terminator of a block in the analyzed function. The
    /// set is computed once per terminator and cached.
    pub fn join_blocks(&mut self, term: Inst) -> &BlockSet {
        debug_assert!(self.func.dfg().data(term).is_terminator());

        if self.func.dfg().data(term).targets().is_empty() {
            return &self.empty;
        }

        if !self.cached_join_blocks.contains_key(&term) {
            let joins = match self.strategy {
                JoinStrategy::ForwardPropagation => self.forward_join_blocks(term),
                JoinStrategy::DisjointPaths => self.disjoint_join_blocks(term),
            };

            self.computed += 1;
            self.cached_join_blocks.insert(term, joins);
        }

        &self.cached_join_blocks[&term]
    }

    /// The number of join-block sets actually computed (as opposed to
    /// served from the cache).
    pub fn computed_join_sets(&self) -> usize {
        self.computed
    }

    //
    // forward propagation: walk out from the branch targets, tracking for
    // every reached block the "last definition", the closest branch target
    // (or join) the walk arrived from. a block reached under two different
    // definitions is a join. the walk never expands past the branch's
    // immediate post-dominator (no join lies beyond it) or the header of the
    // branch's loop (the def would overwrite the one the exit comparison
    // needs), and records loop exits instead of expanding them.
    //
    fn forward_join_blocks(&self, term: Inst) -> BlockSet {
        let parent = self.func.layout().inst_block(term);
        let pd_bound = self.pdomtree.ipdom(parent);
        let term_loop = self.loops.loop_of(parent);
        let term_loop_header = term_loop.map(|lp| self.loops.header(lp));

        let mut joins = BlockSet::default();
        let mut def_map = SaHashMap::<Block, Block>::default();
        let mut exit_blocks = BlockSet::default();
        let mut worklist: Vec<Block> = Vec::new();

        let direct_succs = self.cfg.successors(parent);

        // bootstrap with the branch targets
        for succ in direct_succs.iter().copied() {
            def_map.entry(succ).or_insert(succ);

            // immediate loop exit from the branch
            if self.leaves_loop(term_loop, succ) {
                exit_blocks.insert(succ);
                continue;
            }

            worklist.push(succ);
        }

        // propagate defs, collecting join blocks on the way
        while let Some(block) = worklist.pop() {
            let def = def_map[&block];

            // don't step over the post-dominator bound (if any)
            if Some(block) == pd_bound {
                continue;
            }

            // don't propagate beyond the loop header, or the def the exit
            // comparison below needs would be overwritten
            if Some(block) == term_loop_header {
                continue;
            }

            for succ in self.cfg.successors(block).iter().copied() {
                // loop exit, a candidate for temporal divergence; keeps the
                // def it is first reached under and is not expanded
                if self.leaves_loop(term_loop, succ) {
                    def_map.entry(succ).or_insert(def);
                    exit_blocks.insert(succ);
                    continue;
                }

                match def_map.get(&succ).copied() {
                    // first reaching def
                    None => {
                        def_map.insert(succ, def);
                        worklist.push(succ);
                    }
                    Some(last_def) => {
                        // control flow join: a second def reached `succ`, or
                        // the def of a direct branch target flowed around a
                        // cycle back into it
                        let looped_back = def == succ && direct_succs.contains(&succ);

                        if (last_def != def || looped_back) && joins.insert(succ) {
                            def_map.insert(succ, succ);
                            worklist.push(succ);
                        }
                    }
                }
            }
        }

        // a loop exit whose reaching def differs from the def that reached
        // the header witnesses one path leaving the loop while another keeps
        // circling: lanes exit in different iterations
        if !exit_blocks.is_empty() {
            let lp = term_loop.expect("reached a loop exit without a containing loop");
            let header = self.loops.header(lp);

            // when the post-dominator bound lies inside the loop, all paths
            // rejoin there before the backedge: the header inherits its def
            if let Some(ipd) = pd_bound {
                if self.loops.contains(lp, ipd) {
                    if let Some(def) = def_map.get(&ipd).copied() {
                        def_map.insert(header, def);
                    }
                }
            }

            let header_def = def_map
                .get(&header)
                .copied()
                .expect("no definition in header of carrying loop");

            for exit in exit_blocks.iter() {
                if def_map[&exit] != header_def {
                    joins.insert(exit);
                }
            }
        }

        joins
    }

    //
    // disjoint paths: every block reachable over two vertex-disjoint paths
    // from the branch is a join, every loop exit with a disjoint
    // escaping/returning path pair is a join. the searches carry the same
    // bounds the forward walk enforces structurally: expansion stays inside
    // the branch's loop, and no path may route *through* the loop header
    // (the split edge of a barred block is off-limits).
    //
    fn disjoint_join_blocks(&self, term: Inst) -> BlockSet {
        let parent = self.func.layout().inst_block(term);
        let pd_bound = self.pdomtree.ipdom(parent);
        let term_loop = self.loops.loop_of(parent);
        let term_loop_header = term_loop.map(|lp| self.loops.header(lp));

        let mut joins = BlockSet::default();

        let barred: SmallVec<[Block; 2]> = term_loop_header.into_iter().collect();
        let scope = SearchScope {
            within: term_loop.map(|lp| (self.loops, lp)),
            barred: &barred,
        };

        for block in self.func.layout().blocks().iter().copied() {
            if self.cfg.predecessors(block).len() < 2 {
                continue;
            }

            if !self.domtree.is_reachable(block) {
                continue;
            }

            // blocks outside the branch's loop are reached over its exits
            // and judged by the exit query below
            if self.leaves_loop(term_loop, block) {
                continue;
            }

            if self
                .dpd
                .divergent_paths_scoped(parent, DivPathDecider::sink_into(block), 2, scope)
            {
                joins.insert(block);
            }
        }

        // a direct branch target sitting on a cycle joins with itself: the
        // forward walk re-reaches it under its own def. the cycle search is
        // barred through the loop header *and* the post-dominator bound, the
        // walk never carries a def past either; targets that *are* one of
        // the bounds are never expanded at all
        let mut cycle_barred = barred.clone();

        if let Some(ipd) = pd_bound {
            cycle_barred.push(ipd);
        }

        let cycle_scope = SearchScope {
            within: term_loop.map(|lp| (self.loops, lp)),
            barred: &cycle_barred,
        };

        for succ in self.cfg.successors(parent).iter().copied() {
            if self.leaves_loop(term_loop, succ) || joins.contains(succ) {
                continue;
            }

            if Some(succ) == term_loop_header || Some(succ) == pd_bound {
                continue;
            }

            if self
                .dpd
                .divergent_paths_scoped(succ, DivPathDecider::sink_into(succ), 1, cycle_scope)
            {
                joins.insert(succ);
            }
        }

        if let Some(lp) = term_loop {
            for exit in self.loops.exit_blocks(lp).iter().copied() {
                // an exit the branch targets directly always joins: the
                // lanes that stay behind leave over it in a later iteration.
                // the forward walk gets this from its def comparison (an
                // exit keeps its own color, the header never receives it)
                let divergent = self.cfg.successors(parent).contains(&exit)
                    || self.dpd.induces_divergent_exit(parent, exit, self.loops, lp);

                if divergent {
                    joins.insert(exit);
                }
            }
        }

        joins
    }

    fn leaves_loop(&self, term_loop: Option<Loop>, block: Block) -> bool {
        match term_loop {
            Some(lp) => !self.loops.contains(lp, block),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::*;

    struct Analyses {
        cfg: ControlFlowGraph,
        domtree: DominatorTree,
        pdomtree: PostDominatorTree,
        loops: LoopInfo,
    }

    fn analyze(func: &Function) -> Analyses {
        let cfg = ControlFlowGraph::compute(func);
        let domtree = DominatorTree::compute(func, &cfg);
        let pdomtree = PostDominatorTree::compute(func, &cfg);
        let loops = LoopInfo::compute(func, &cfg, &domtree);

        Analyses {
            cfg,
            domtree,
            pdomtree,
            loops,
        }
    }

    fn join_blocks_of(func: &Function, an: &Analyses, strategy: JoinStrategy, block: Block) -> BlockSet {
        let mut bda = BranchDependenceAnalysis::with_strategy(
            func,
            &an.cfg,
            &an.domtree,
            &an.pdomtree,
            &an.loops,
            strategy,
        );

        bda.join_blocks(func.terminator(block).unwrap()).clone()
    }

    fn assert_strategies_agree(func: &Function, context: &str) {
        let an = analyze(func);

        let mut forward = BranchDependenceAnalysis::with_strategy(
            func,
            &an.cfg,
            &an.domtree,
            &an.pdomtree,
            &an.loops,
            JoinStrategy::ForwardPropagation,
        );
        let mut disjoint = BranchDependenceAnalysis::with_strategy(
            func,
            &an.cfg,
            &an.domtree,
            &an.pdomtree,
            &an.loops,
            JoinStrategy::DisjointPaths,
        );

        for block in func.layout().blocks() {
            let term = func.terminator(*block).unwrap();

            if func.dfg().data(term).targets().is_empty() {
                continue;
            }

            let lhs = forward.join_blocks(term).clone();
            let rhs = disjoint.join_blocks(term).clone();

            assert_eq!(
                lhs,
                rhs,
                "strategies disagree at block '{}' ({context})",
                func.dfg().block(*block).name()
            );
        }
    }

    #[test]
    fn diamond_joins_at_merge() {
        let mut b = FunctionBuilder::new("main", &[Type::Bool]);
        let cond = b.arg(0);

        let entry = b.create_block("entry");
        let left = b.create_block("left");
        let right = b.create_block("right");
        let merge = b.create_block("merge");

        b.switch_to(entry);
        b.append().condbr(cond, left, right);

        b.switch_to(left);
        b.append().br(merge);

        b.switch_to(right);
        b.append().br(merge);

        b.switch_to(merge);
        b.append().ret_void();

        let func = b.define();
        let an = analyze(&func);

        for strategy in [JoinStrategy::ForwardPropagation, JoinStrategy::DisjointPaths] {
            let joins = join_blocks_of(&func, &an, strategy, entry);

            assert_eq!(joins, BlockSet::from_iter([merge]), "{strategy:?}");
            assert!(join_blocks_of(&func, &an, strategy, left).is_empty());
        }

        assert_strategies_agree(&func, "diamond");
    }

    #[test]
    fn nested_diamonds_join_separately() {
        let mut b = FunctionBuilder::new("main", &[Type::Bool]);
        let cond = b.arg(0);

        //
        // outer diamond whose true arm is itself a diamond: the inner branch
        // joins at the inner merge only, the outer at the outer merge only
        //
        let entry = b.create_block("entry");
        let t = b.create_block("t");
        let t1 = b.create_block("t1");
        let t2 = b.create_block("t2");
        let tm = b.create_block("tm");
        let e = b.create_block("e");
        let merge = b.create_block("merge");

        b.switch_to(entry);
        b.append().condbr(cond, t, e);

        b.switch_to(t);
        b.append().condbr(cond, t1, t2);

        b.switch_to(t1);
        b.append().br(tm);

        b.switch_to(t2);
        b.append().br(tm);

        b.switch_to(tm);
        b.append().br(merge);

        b.switch_to(e);
        b.append().br(merge);

        b.switch_to(merge);
        b.append().ret_void();

        let func = b.define();
        let an = analyze(&func);

        assert_eq!(
            join_blocks_of(&func, &an, JoinStrategy::ForwardPropagation, entry),
            BlockSet::from_iter([merge])
        );
        assert_eq!(
            join_blocks_of(&func, &an, JoinStrategy::ForwardPropagation, t),
            BlockSet::from_iter([tm])
        );

        assert_strategies_agree(&func, "nested diamonds");
    }

    #[test]
    fn loop_exit_is_a_join() {
        let mut b = FunctionBuilder::new("main", &[Type::Bool]);
        let cond = b.arg(0);

        //
        // entry -> head -> body; the body's backedge branch also exits: the
        // exit block joins lanes leaving in different iterations
        //
        let entry = b.create_block("entry");
        let head = b.create_block("head");
        let body = b.create_block("body");
        let exit = b.create_block("exit");

        b.switch_to(entry);
        b.append().br(head);

        b.switch_to(head);
        b.append().br(body);

        b.switch_to(body);
        b.append().condbr(cond, head, exit);

        b.switch_to(exit);
        b.append().ret_void();

        let func = b.define();
        let an = analyze(&func);

        for strategy in [JoinStrategy::ForwardPropagation, JoinStrategy::DisjointPaths] {
            let joins = join_blocks_of(&func, &an, strategy, body);

            assert_eq!(joins, BlockSet::from_iter([exit]), "{strategy:?}");
        }

        assert_strategies_agree(&func, "loop exit");
    }

    #[test]
    fn inner_branch_joins_at_inner_loop_exit() {
        let mut b = FunctionBuilder::new("main", &[Type::Bool]);
        let cond = b.arg(0);

        //
        // nested loops; the inner header's branch exits the inner loop, so
        // the inner exit (a block of the outer loop) is its join
        //
        let entry = b.create_block("entry");
        let oh = b.create_block("outer.head");
        let ih = b.create_block("inner.head");
        let ib = b.create_block("inner.body");
        let iexit = b.create_block("inner.exit");
        let olatch = b.create_block("outer.latch");
        let oexit = b.create_block("outer.exit");

        b.switch_to(entry);
        b.append().br(oh);

        b.switch_to(oh);
        b.append().condbr(cond, ih, oexit);

        b.switch_to(ih);
        b.append().condbr(cond, ib, iexit);

        b.switch_to(ib);
        b.append().br(ih);

        b.switch_to(iexit);
        b.append().br(olatch);

        b.switch_to(olatch);
        b.append().br(oh);

        b.switch_to(oexit);
        b.append().ret_void();

        let func = b.define();
        let an = analyze(&func);

        for strategy in [JoinStrategy::ForwardPropagation, JoinStrategy::DisjointPaths] {
            let joins = join_blocks_of(&func, &an, strategy, ih);

            assert_eq!(joins, BlockSet::from_iter([iexit]), "{strategy:?}");
        }

        assert_strategies_agree(&func, "nested loops");
    }

    #[test]
    fn self_looping_successor_joins_with_itself() {
        let mut b = FunctionBuilder::new("main", &[Type::Bool]);
        let cond = b.arg(0);

        //
        // a branch target that immediately loops back into itself: the
        // target re-joins under its own color, and the tail joins the two
        // ways of reaching it
        //
        let entry = b.create_block("entry");
        let spin = b.create_block("spin");
        let tail = b.create_block("tail");

        b.switch_to(entry);
        b.append().condbr(cond, spin, tail);

        b.switch_to(spin);
        b.append().condbr(cond, spin, tail);

        b.switch_to(tail);
        b.append().ret_void();

        let func = b.define();
        let an = analyze(&func);

        for strategy in [JoinStrategy::ForwardPropagation, JoinStrategy::DisjointPaths] {
            let joins = join_blocks_of(&func, &an, strategy, entry);

            assert_eq!(joins, BlockSet::from_iter([spin, tail]), "{strategy:?}");
        }

        assert_strategies_agree(&func, "self loop");
    }

    #[test]
    fn breaking_latch_joins_at_shared_exit() {
        let mut b = FunctionBuilder::new("main", &[Type::Bool]);
        let cond = b.arg(0);

        //
        // both the header and the latch can leave over the same exit block:
        // either branch alone can split the lanes across iterations
        //
        let entry = b.create_block("entry");
        let head = b.create_block("head");
        let latch = b.create_block("latch");
        let exit = b.create_block("exit");

        b.switch_to(entry);
        b.append().br(head);

        b.switch_to(head);
        b.append().condbr(cond, latch, exit);

        b.switch_to(latch);
        b.append().condbr(cond, head, exit);

        b.switch_to(exit);
        b.append().ret_void();

        let func = b.define();
        let an = analyze(&func);

        for strategy in [JoinStrategy::ForwardPropagation, JoinStrategy::DisjointPaths] {
            assert_eq!(
                join_blocks_of(&func, &an, strategy, head),
                BlockSet::from_iter([exit]),
                "{strategy:?}"
            );
            assert_eq!(
                join_blocks_of(&func, &an, strategy, latch),
                BlockSet::from_iter([exit]),
                "{strategy:?}"
            );
        }

        assert_strategies_agree(&func, "breaking latch");
    }

    #[test]
    fn uniform_shaped_branches_have_no_joins() {
        let mut b = FunctionBuilder::new("main", &[Type::Bool]);
        let cond = b.arg(0);

        //
        // both branch targets return separately: no block is reachable
        // twice, so there is nothing to join
        //
        let entry = b.create_block("entry");
        let a = b.create_block("a");
        let bb = b.create_block("b");

        b.switch_to(entry);
        b.append().condbr(cond, a, bb);

        b.switch_to(a);
        b.append().ret_void();

        b.switch_to(bb);
        b.append().ret_void();

        let func = b.define();
        let an = analyze(&func);

        for strategy in [JoinStrategy::ForwardPropagation, JoinStrategy::DisjointPaths] {
            assert!(join_blocks_of(&func, &an, strategy, entry).is_empty());
        }

        assert_strategies_agree(&func, "no joins");
    }

    #[test]
    fn join_blocks_are_memoized() {
        let mut b = FunctionBuilder::new("main", &[Type::Bool]);
        let cond = b.arg(0);

        let entry = b.create_block("entry");
        let left = b.create_block("left");
        let right = b.create_block("right");
        let merge = b.create_block("merge");

        b.switch_to(entry);
        b.append().condbr(cond, left, right);

        b.switch_to(left);
        b.append().br(merge);

        b.switch_to(right);
        b.append().br(merge);

        b.switch_to(merge);
        b.append().ret_void();

        let func = b.define();
        let an = analyze(&func);
        let term = func.terminator(entry).unwrap();

        let mut bda =
            BranchDependenceAnalysis::new(&func, &an.cfg, &an.domtree, &an.pdomtree, &an.loops);

        let first = bda.join_blocks(term).clone();
        let second = bda.join_blocks(term).clone();

        assert_eq!(first, second);
        assert_eq!(bda.computed_join_sets(), 1);

        // single-target terminators are served from the shared empty set
        let br = func.terminator(left).unwrap();

        assert!(bda.join_blocks(br).is_empty());
        assert!(bda.join_blocks(br).is_empty());
        assert_eq!(bda.computed_join_sets(), 2);
    }

    #[test]
    #[should_panic(expected = "irreducible control flow")]
    fn irreducible_function_is_refused() {
        let mut b = FunctionBuilder::new("main", &[Type::Bool]);
        let cond = b.arg(0);

        let entry = b.create_block("entry");
        let a = b.create_block("a");
        let bb = b.create_block("b");

        b.switch_to(entry);
        b.append().condbr(cond, a, bb);

        b.switch_to(a);
        b.append().br(bb);

        b.switch_to(bb);
        b.append().br(a);

        let func = b.define();
        let an = analyze(&func);

        let _ = BranchDependenceAnalysis::new(&func, &an.cfg, &an.domtree, &an.pdomtree, &an.loops);
    }

    //
    // structured-random agreement suite: generate reducible CFGs from
    // nested if/else and while shapes, then check that both strategies
    // agree on every terminator. shapes are driven by a deterministic
    // xorshift stream, so failures reproduce from the seed alone.
    //

    struct XorShift(u64);

    impl XorShift {
        fn next(&mut self, bound: u32) -> u32 {
            let mut x = self.0;

            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            self.0 = x;

            (x % u64::from(bound)) as u32
        }
    }

    struct ShapeGen {
        b: FunctionBuilder,
        rng: XorShift,
        cond: Value,
        blocks: u32,
    }

    impl ShapeGen {
        fn block(&mut self) -> Block {
            self.blocks += 1;

            let name = format!("b{}", self.blocks);

            self.b.create_block(&name)
        }

        // emits a structured region starting in `cur` (unterminated) and
        // returns the block control continues from (also unterminated)
        fn region(&mut self, depth: u32, mut cur: Block) -> Block {
            let segments = 1 + self.rng.next(3);

            for _ in 0..segments {
                if self.blocks > 60 {
                    break;
                }

                let choice = if depth == 0 { 0 } else { self.rng.next(8) };

                cur = match choice {
                    // straight block
                    0 | 1 => {
                        let next = self.block();

                        self.b.switch_to(cur);
                        self.b.append().br(next);

                        next
                    }
                    // if/else diamond
                    2 | 3 => {
                        let t = self.block();
                        let e = self.block();
                        let merge = self.block();

                        self.b.switch_to(cur);
                        self.b.append().condbr(self.cond, t, e);

                        let t_end = self.region(depth - 1, t);
                        self.b.switch_to(t_end);
                        self.b.append().br(merge);

                        let e_end = self.region(depth - 1, e);
                        self.b.switch_to(e_end);
                        self.b.append().br(merge);

                        merge
                    }
                    // if without else
                    4 | 5 => {
                        let t = self.block();
                        let merge = self.block();

                        self.b.switch_to(cur);
                        self.b.append().condbr(self.cond, t, merge);

                        let t_end = self.region(depth - 1, t);
                        self.b.switch_to(t_end);
                        self.b.append().br(merge);

                        merge
                    }
                    // while loop, sometimes with a breaking latch
                    _ => {
                        let head = self.block();
                        let body = self.block();
                        let exit = self.block();

                        self.b.switch_to(cur);
                        self.b.append().br(head);

                        self.b.switch_to(head);
                        self.b.append().condbr(self.cond, body, exit);

                        let body_end = self.region(depth - 1, body);

                        self.b.switch_to(body_end);

                        if self.rng.next(2) == 0 {
                            self.b.append().br(head);
                        } else {
                            // the latch both continues and breaks
                            self.b.append().condbr(self.cond, head, exit);
                        }

                        exit
                    }
                };
            }

            cur
        }
    }

    fn structured_random(seed: u64) -> Function {
        let b = FunctionBuilder::new("generated", &[Type::Bool]);
        let cond = b.arg(0);

        let mut gen = ShapeGen {
            b,
            rng: XorShift(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1),
            cond,
            blocks: 0,
        };

        let entry = gen.block();
        let last = gen.region(3, entry);

        gen.b.switch_to(last);
        gen.b.append().ret_void();

        gen.b.define()
    }

    #[test]
    fn strategies_agree_on_structured_random_cfgs() {
        let mut nonempty = 0;

        for seed in 0..120 {
            let func = structured_random(seed);
            let an = analyze(&func);

            assert!(an.loops.is_reducible(), "generator produced irreducible CFG");

            let mut forward = BranchDependenceAnalysis::with_strategy(
                &func,
                &an.cfg,
                &an.domtree,
                &an.pdomtree,
                &an.loops,
                JoinStrategy::ForwardPropagation,
            );
            let mut disjoint = BranchDependenceAnalysis::with_strategy(
                &func,
                &an.cfg,
                &an.domtree,
                &an.pdomtree,
                &an.loops,
                JoinStrategy::DisjointPaths,
            );

            for block in func.layout().blocks() {
                let term = func.terminator(*block).unwrap();

                if func.dfg().data(term).targets().is_empty() {
                    continue;
                }

                let lhs = forward.join_blocks(term).clone();
                let rhs = disjoint.join_blocks(term).clone();

                nonempty += usize::from(!lhs.is_empty());

                assert_eq!(
                    lhs,
                    rhs,
                    "seed {seed}, block '{}'",
                    func.dfg().block(*block).name()
                );
            }
        }

        // the suite is only meaningful if it actually exercises joins
        assert!(nonempty > 100, "generator produced too few join blocks");
    }
}
