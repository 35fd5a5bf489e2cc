//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

#![deny(
    unreachable_pub,
    missing_docs,
    missing_abi,
    rust_2018_idioms,
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links
)]

//! # Lapis
//!
//! A divergence analysis for SSA-form IR, the building block of
//! vectorizing and GPU compilers that classifies every value as *uniform*
//! (all lanes of a SIMD/SPMD execution group agree on it) or *divergent*
//! (lanes may disagree). Branches flagged as divergent forbid transforms
//! like jump threading and loop unswitching that are only sound when all
//! lanes agree on the direction.
//!
//! The crate ships a compact SSA IR ([`ir`]) to run the analyses over, the
//! structural analyses they consume (CFG, dominator and post-dominator
//! trees, natural loops) and the divergence machinery itself ([`analysis`]):
//! branch dependence computed either by colored forward propagation or by
//! bounded max-flow disjoint-path queries, the worklist propagation of
//! divergence over data, sync and loop-carried dependence, and the loop /
//! GPU-kernel frontends that seed it.
//!
//! ```
//! use lapis::analysis::*;
//! use lapis::ir::*;
//!
//! // a branch on a divergent condition makes the phi at the join divergent
//! let mut b = FunctionBuilder::new("kernel", &[Type::Bool]);
//! let cond = b.arg(0);
//!
//! let entry = b.create_block("entry");
//! let left = b.create_block("left");
//! let right = b.create_block("right");
//! let merge = b.create_block("merge");
//!
//! b.switch_to(entry);
//! b.append().condbr(cond, left, right);
//! b.switch_to(left);
//! b.append().br(merge);
//! b.switch_to(right);
//! b.append().br(merge);
//! b.switch_to(merge);
//! let one = b.iconst(Type::I32, 1);
//! let two = b.iconst(Type::I32, 2);
//! let x = b.append().phi(Type::I32, &[(left, one), (right, two)]);
//! b.append().ret(x);
//!
//! let func = b.define();
//! let cfg = ControlFlowGraph::compute(&func);
//! let domtree = DominatorTree::compute(&func, &cfg);
//! let pdomtree = PostDominatorTree::compute(&func, &cfg);
//! let loops = LoopInfo::compute(&func, &cfg, &domtree);
//!
//! let mut bda = BranchDependenceAnalysis::new(&func, &cfg, &domtree, &pdomtree, &loops);
//! let mut da = DivergenceAnalysis::new(&func, None, &domtree, &loops);
//!
//! da.mark_divergent(cond);
//! da.compute(&mut bda, false);
//!
//! assert!(da.is_divergent(x));
//! ```

pub mod analysis;
pub mod arena;
pub mod ir;
pub mod utility;
