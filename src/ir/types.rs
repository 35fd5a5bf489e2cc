//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use std::fmt::{self, Display, Formatter};

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// The types a value can have.
///
/// Divergence does not depend on type information beyond "booleans feed
/// branches", so the set is deliberately small: enough to give every SSA
/// value a printable, checkable type.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum Type {
    /// A boolean, the type of branch conditions and comparisons.
    Bool,
    /// A 32-bit integer.
    I32,
    /// A 64-bit integer.
    I64,
}

impl Type {
    /// Checks whether the type is [`Type::Bool`].
    #[inline]
    pub fn is_bool(self) -> bool {
        self == Type::Bool
    }

    /// Checks whether the type is one of the integer types.
    #[inline]
    pub fn is_int(self) -> bool {
        matches!(self, Type::I32 | Type::I64)
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "bool"),
            Type::I32 => write!(f, "i32"),
            Type::I64 => write!(f, "i64"),
        }
    }
}
