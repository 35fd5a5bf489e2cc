//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! Contains the analyses computed over [`crate::ir`] functions.
//!
//! The structural layer ([`ControlFlowGraph`], [`DominatorTree`],
//! [`PostDominatorTree`], [`LoopInfo`]) provides read-only views of the
//! control-flow shape of a function. On top of it sit the divergence
//! analyses: [`DivPathDecider`] answers vertex-disjoint-path queries,
//! [`BranchDependenceAnalysis`] maps branches to the blocks whose phis they
//! can make divergent, and [`DivergenceAnalysis`] runs the uniform/divergent
//! classification to a fixpoint.

mod branch_dependence;
mod cfg;
mod disjoint_paths;
mod divergence;
mod dominators;
mod loops;

pub use branch_dependence::*;
pub use cfg::*;
pub use disjoint_paths::*;
pub use divergence::*;
pub use dominators::*;
pub use loops::*;
