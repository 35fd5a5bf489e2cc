//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

//! A simple typed arena module that does not allow deletion, and allows
//! configurable index sizes for maximum flexibility and performance. It is
//! used extensively for forming graphs and other complex data structures
//! needed for representing IR and the analyses computed over it.
//!
//! Very similar to `id_arena` and other simple typed arena crates, except this
//! one ties in better with the specific needs of this library: stable integer
//! handles that side tables ([`SecondaryMap`]) can be keyed by, instead of
//! pointer identity.
//!
//! ```
//! # use lapis::arena_key;
//! # use lapis::arena::*;
//! arena_key! {
//!     pub struct Node;
//! }
//!
//! enum AstNode {
//!     Immediate(u64),
//!     Add(Node, Node),
//! }
//!
//! let mut arena = ArenaMap::new();
//!
//! let e1: Node = arena.insert(AstNode::Immediate(16));
//! let e2 = arena.insert(AstNode::Immediate(3));
//! let e3 = arena.insert(AstNode::Add(e1, e2));
//! ```

mod key;
mod map;
mod secondary;

pub use key::ArenaKey;
pub use map::ArenaMap;
pub use secondary::SecondaryMap;
