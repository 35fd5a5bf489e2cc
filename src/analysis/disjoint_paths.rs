//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::analysis::{ControlFlowGraph, Loop, LoopInfo};
use crate::arena::ArenaKey;
use crate::ir::Block;
use crate::utility::{SaHashMap, SaHashSet};
use std::collections::VecDeque;

/// A node of the node-split graph: every block `b` becomes `b.in` and
/// `b.out` joined by a unit-capacity *split edge* `b.in -> b.out`, and every
/// CFG edge `a -> b` becomes `a.out -> b.in`. Vertex-disjointness of paths
/// in the CFG equals edge-disjointness in this graph.
///
/// Encoded as `block index * 2 + side` so the whole graph needs no
/// allocation at all, it is conjured on the fly from the CFG.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub(in crate::analysis) struct SplitNode(u32);

impl SplitNode {
    fn input(block: Block) -> Self {
        Self((block.index() as u32) * 2)
    }

    fn output(block: Block) -> Self {
        Self((block.index() as u32) * 2 + 1)
    }

    fn block(self) -> Block {
        Block::new((self.0 / 2) as usize)
    }

    fn is_output(self) -> bool {
        self.0 % 2 == 1
    }
}

type FlowEdge = (SplitNode, SplitNode);

/// Bounds for a single path search.
///
/// `within` restricts cross-block edge expansion to blocks of one loop,
/// `barred` forbids routing *through* the listed blocks (their split edge
/// is off-limits, ending a path at them is still allowed).
#[derive(Default, Copy, Clone)]
pub(in crate::analysis) struct SearchScope<'a> {
    pub(in crate::analysis) within: Option<(&'a LoopInfo, Loop)>,
    pub(in crate::analysis) barred: &'a [Block],
}

impl<'a> SearchScope<'a> {
    fn allows_expansion_at(&self, block: Block) -> bool {
        match self.within {
            Some((li, lp)) => li.contains(lp, block),
            None => true,
        }
    }
}

/// Decides whether `n` pairwise vertex-disjoint paths exist between blocks
/// of a CFG.
///
/// This is a specialization of Ford-Fulkerson on the node-split graph with
/// unit capacities, terminating after a flow of `n` is found. Running time
/// is thus O(edges) * n; the branch-dependence queries only ever need
/// `n <= 2`. Each augmentation runs a breadth-first residual search that
/// expands edges in CFG successor/predecessor order, so results and
/// intermediate traversals are deterministic.
pub struct DivPathDecider<'f> {
    cfg: &'f ControlFlowGraph,
}

impl<'f> DivPathDecider<'f> {
    /// Creates a decider over one function's CFG.
    pub fn new(cfg: &'f ControlFlowGraph) -> Self {
        Self { cfg }
    }

    /// Decides whether there are `n` vertex-disjoint paths `from -> to`,
    /// disjoint in every block except the endpoints.
    pub fn divergent_paths(&self, from: Block, to: Block, n: u32) -> bool {
        let source = SplitNode::output(from);
        let sinks = [SplitNode::input(to)];

        self.flow(source, &sinks, n, SearchScope::default())
    }

    /// Decides whether a divergent branch at `from` can cause lane-divergent
    /// exit through `exit`: one path must leave the loop over `exit` while a
    /// disjoint path returns to the loop header.
    ///
    /// The search never leaves the blocks of `lp`. A branch in the latch
    /// itself short-circuits: its exit is divergent iff the exit block is
    /// reached from the latch alone.
    pub fn induces_divergent_exit(
        &self,
        from: Block,
        exit: Block,
        li: &LoopInfo,
        lp: Loop,
    ) -> bool {
        if Some(from) == li.latch(lp) {
            return self.cfg.unique_predecessor(exit) == Some(from);
        }

        let source = SplitNode::output(from);
        let sinks = [
            SplitNode::output(exit),
            SplitNode::input(li.header(lp)),
        ];

        self.flow(
            source,
            &sinks,
            2,
            SearchScope {
                within: Some((li, lp)),
                barred: &[],
            },
        )
    }

    /// Scoped variant for the disjoint-paths branch-dependence strategy:
    /// `n` disjoint paths from the successors of `from` to `to`, bounded by
    /// `scope`.
    pub(in crate::analysis) fn divergent_paths_scoped(
        &self,
        from: Block,
        to: SplitNode,
        n: u32,
        scope: SearchScope<'_>,
    ) -> bool {
        self.flow(SplitNode::output(from), &[to], n, scope)
    }

    pub(in crate::analysis) fn sink_into(block: Block) -> SplitNode {
        SplitNode::input(block)
    }

    fn flow(&self, source: SplitNode, sinks: &[SplitNode], n: u32, scope: SearchScope<'_>) -> bool {
        let mut flow = SaHashSet::<FlowEdge>::default();

        for _ in 0..n {
            let mut parent = SaHashMap::default();

            let sink = match self.find_path(source, sinks, &flow, &mut parent, scope) {
                Some(sink) => sink,
                None => return false,
            };

            Self::inject_flow(source, sink, &parent, &mut flow);
        }

        true
    }

    // finds a path from `source` to any of `sinks` along residual edges:
    // forward edges with no flow, backward edges carrying flow
    fn find_path(
        &self,
        source: SplitNode,
        sinks: &[SplitNode],
        flow: &SaHashSet<FlowEdge>,
        parent: &mut SaHashMap<SplitNode, SplitNode>,
        scope: SearchScope<'_>,
    ) -> Option<SplitNode> {
        let mut visited = SaHashSet::default();
        let mut queue = VecDeque::new();

        visited.insert(source);
        queue.push_back(source);

        while let Some(node) = queue.pop_front() {
            if sinks.contains(&node) {
                return Some(node);
            }

            let block = node.block();
            let mut push = |next: SplitNode,
                            visited: &mut SaHashSet<SplitNode>,
                            queue: &mut VecDeque<SplitNode>,
                            parent: &mut SaHashMap<SplitNode, SplitNode>| {
                if visited.insert(next) {
                    parent.insert(next, node);
                    queue.push_back(next);
                }
            };

            if node.is_output() {
                // cross edges to successors
                if scope.allows_expansion_at(block) {
                    for succ in self.cfg.successors(block) {
                        let next = SplitNode::input(*succ);

                        if !flow.contains(&(node, next)) {
                            push(next, &mut visited, &mut queue, parent);
                        }
                    }
                }

                // residual reverse of the split edge
                let split_in = SplitNode::input(block);

                if flow.contains(&(split_in, node)) {
                    push(split_in, &mut visited, &mut queue, parent);
                }
            } else {
                // the split edge itself
                let split_out = SplitNode::output(block);

                if !flow.contains(&(node, split_out)) && !scope.barred.contains(&block) {
                    push(split_out, &mut visited, &mut queue, parent);
                }

                // residual reverse of cross edges
                if scope.allows_expansion_at(block) {
                    for pred in self.cfg.predecessors(block) {
                        let next = SplitNode::output(*pred);

                        if flow.contains(&(next, node)) {
                            push(next, &mut visited, &mut queue, parent);
                        }
                    }
                }
            }
        }

        None
    }

    // walks the discovered path backwards, setting flow on forward edges and
    // clearing it on reverse edges
    fn inject_flow(
        source: SplitNode,
        sink: SplitNode,
        parent: &SaHashMap<SplitNode, SplitNode>,
        flow: &mut SaHashSet<FlowEdge>,
    ) {
        let mut end = sink;

        while end != source {
            let prev = parent[&end];

            if !flow.remove(&(end, prev)) {
                flow.insert((prev, end));
            }

            end = prev;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::DominatorTree;
    use crate::ir::*;

    fn diamond() -> (Function, Block, Block) {
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

        (b.define(), entry, merge)
    }

    #[test]
    fn diamond_has_two_disjoint_paths() {
        let (func, entry, merge) = diamond();
        let cfg = ControlFlowGraph::compute(&func);
        let dpd = DivPathDecider::new(&cfg);

        assert!(dpd.divergent_paths(entry, merge, 1));
        assert!(dpd.divergent_paths(entry, merge, 2));
        assert!(!dpd.divergent_paths(entry, merge, 3));
    }

    #[test]
    fn straight_line_has_one_path() {
        let mut b = FunctionBuilder::new("main", &[]);

        let entry = b.create_block("entry");
        let mid = b.create_block("mid");
        let end = b.create_block("end");

        b.switch_to(entry);
        b.append().br(mid);

        b.switch_to(mid);
        b.append().br(end);

        b.switch_to(end);
        b.append().ret_void();

        let func = b.define();
        let cfg = ControlFlowGraph::compute(&func);
        let dpd = DivPathDecider::new(&cfg);

        assert!(dpd.divergent_paths(entry, end, 1));
        assert!(!dpd.divergent_paths(entry, end, 2));
    }

    #[test]
    fn shared_middle_block_defeats_disjointness() {
        let mut b = FunctionBuilder::new("main", &[Type::Bool]);
        let cond = b.arg(0);

        //
        // entry -> a | b, both funnel through mid, mid -> c | d, both to end:
        // plenty of paths, but every one crosses mid
        //
        let entry = b.create_block("entry");
        let a = b.create_block("a");
        let bb = b.create_block("b");
        let mid = b.create_block("mid");
        let c = b.create_block("c");
        let d = b.create_block("d");
        let end = b.create_block("end");

        b.switch_to(entry);
        b.append().condbr(cond, a, bb);

        b.switch_to(a);
        b.append().br(mid);

        b.switch_to(bb);
        b.append().br(mid);

        b.switch_to(mid);
        b.append().condbr(cond, c, d);

        b.switch_to(c);
        b.append().br(end);

        b.switch_to(d);
        b.append().br(end);

        b.switch_to(end);
        b.append().ret_void();

        let func = b.define();
        let cfg = ControlFlowGraph::compute(&func);
        let dpd = DivPathDecider::new(&cfg);

        assert!(dpd.divergent_paths(entry, mid, 2));
        assert!(dpd.divergent_paths(mid, end, 2));
        assert!(!dpd.divergent_paths(entry, end, 2));
    }

    #[test]
    fn triple_split_has_three_disjoint_paths() {
        let mut b = FunctionBuilder::new("main", &[Type::I32]);
        let value = b.arg(0);

        let entry = b.create_block("entry");
        let a = b.create_block("a");
        let bb = b.create_block("b");
        let c = b.create_block("c");
        let end = b.create_block("end");

        b.switch_to(entry);
        b.append().switch(value, a, &[(1, bb), (2, c)]);

        b.switch_to(a);
        b.append().br(end);

        b.switch_to(bb);
        b.append().br(end);

        b.switch_to(c);
        b.append().br(end);

        b.switch_to(end);
        b.append().ret_void();

        let func = b.define();
        let cfg = ControlFlowGraph::compute(&func);
        let dpd = DivPathDecider::new(&cfg);

        assert!(dpd.divergent_paths(entry, end, 3));
        assert!(!dpd.divergent_paths(entry, end, 4));
    }

    #[test]
    fn divergent_loop_exit() {
        let mut b = FunctionBuilder::new("main", &[Type::Bool]);
        let cond = b.arg(0);

        //
        // head -> body | exit; body -> latch | exit2; latch -> head.
        // a branch in body can exit through exit2 while another lane
        // returns to the latch, a branch in the latch cannot diverge
        // over head/exit edges it does not control
        //
        let entry = b.create_block("entry");
        let head = b.create_block("head");
        let body = b.create_block("body");
        let latch = b.create_block("latch");
        let exit = b.create_block("exit");
        let exit2 = b.create_block("exit2");

        b.switch_to(entry);
        b.append().br(head);

        b.switch_to(head);
        b.append().condbr(cond, body, exit);

        b.switch_to(body);
        b.append().condbr(cond, latch, exit2);

        b.switch_to(latch);
        b.append().br(head);

        b.switch_to(exit);
        b.append().ret_void();

        b.switch_to(exit2);
        b.append().ret_void();

        let func = b.define();
        let cfg = ControlFlowGraph::compute(&func);
        let domtree = DominatorTree::compute(&func, &cfg);
        let li = LoopInfo::compute(&func, &cfg, &domtree);
        let dpd = DivPathDecider::new(&cfg);

        let lp = li.loop_of(head).unwrap();

        assert!(dpd.induces_divergent_exit(body, exit2, &li, lp));
        assert!(dpd.induces_divergent_exit(head, exit, &li, lp));

        // the latch short-circuit: `exit` is not reached from the latch
        assert!(!dpd.induces_divergent_exit(latch, exit, &li, lp));
    }
}
