//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use std::fmt::{self, Debug, Formatter};

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// Models a type that has a "reserved" value that is invalid to observe,
/// allowing an `Option`-like type to be represented without any extra
/// space being taken up.
///
/// All of the arena keys declared through [`dense_arena_key!`](crate::dense_arena_key)
/// implement this with their maximum index reserved.
pub trait Packable: Sized + Copy {
    /// Returns the reserved value of the type.
    fn reserved() -> Self;

    /// Checks whether `self` is the reserved value.
    fn is_reserved(&self) -> bool;
}

/// A space-efficient equivalent of `Option<T>` for types that have a
/// reserved "null" representation.
///
/// This is used for dense side tables where almost every entry is present
/// and paying for a discriminant on each one would be wasteful.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct PackedOption<T: Packable>(T);

impl<T: Packable> PackedOption<T> {
    /// Creates a `PackedOption` equivalent to `None`.
    #[inline]
    pub fn none() -> Self {
        Self(T::reserved())
    }

    /// Creates a `PackedOption` equivalent to `Some(value)`.
    ///
    /// `value` must not be the reserved value of `T`.
    #[inline]
    pub fn some(value: T) -> Self {
        debug_assert!(!value.is_reserved(), "cannot pack the reserved value");

        Self(value)
    }

    /// Checks if the option is the `None` equivalent.
    #[inline]
    pub fn is_none(&self) -> bool {
        self.0.is_reserved()
    }

    /// Checks if the option is the `Some` equivalent.
    #[inline]
    pub fn is_some(&self) -> bool {
        !self.is_none()
    }

    /// Expands into a real `Option<T>` that can be matched on.
    #[inline]
    pub fn expand(self) -> Option<T> {
        if self.is_none() {
            None
        } else {
            Some(self.0)
        }
    }

    /// Replaces the contents with `value`, returning the previous
    /// value if there was one.
    #[inline]
    pub fn replace(&mut self, value: T) -> Option<T> {
        let prev = self.expand();

        *self = Self::some(value);

        prev
    }

    /// Takes the value out of the option, leaving `None` behind.
    #[inline]
    pub fn take(&mut self) -> Option<T> {
        let prev = self.expand();

        *self = Self::none();

        prev
    }
}

impl<T: Packable> Default for PackedOption<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T: Packable> From<Option<T>> for PackedOption<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(inner) => Self::some(inner),
            None => Self::none(),
        }
    }
}

impl<T: Packable + Debug> Debug for PackedOption<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.expand() {
            Some(inner) => write!(f, "Some({inner:?})"),
            None => write!(f, "None"),
        }
    }
}
