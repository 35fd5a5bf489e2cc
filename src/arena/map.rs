//======---------------------------------------------------------------======//
//                                                                           //
// Copyright 2022-2023 Evan Cox <evanacox00@gmail.com>. All rights reserved. //
//                                                                           //
// Use of this source code is governed by a BSD-style license that can be    //
// found in the LICENSE.txt file at the root of this project, or at the      //
// following link: https://opensource.org/licenses/BSD-3-Clause              //
//                                                                           //
//======---------------------------------------------------------------======//

use crate::arena::ArenaKey;
use std::fmt::{self, Debug, Formatter};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// An insert-only arena that hands out typed keys for the values pushed
/// into it.
///
/// Values are stored contiguously, and the key returned by [`Self::insert`]
/// is a thin wrapper around the index of the value. Keys from one map must
/// not be used with a different map, nothing checks for this besides basic
/// bounds checking.
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct ArenaMap<K: ArenaKey, V> {
    values: Vec<V>,
    _marker: PhantomData<fn() -> K>,
}

impl<K: ArenaKey, V> ArenaMap<K, V> {
    /// Creates a new, empty arena.
    pub fn new() -> Self {
        Self {
            values: Vec::default(),
            _marker: PhantomData,
        }
    }

    /// Inserts a value into the arena, returning the key that now
    /// refers to it.
    pub fn insert(&mut self, value: V) -> K {
        let key = self.next_key();

        self.values.push(value);

        key
    }

    /// Returns the key that the next call to [`Self::insert`] will return.
    pub fn next_key(&self) -> K {
        K::new(self.values.len())
    }

    /// Checks whether a key refers to a value in this arena.
    pub fn contains(&self, key: K) -> bool {
        key.index() < self.values.len()
    }

    /// Gets the value referred to by `key`, if it is in the arena.
    pub fn get(&self, key: K) -> Option<&V> {
        self.values.get(key.index())
    }

    /// Gets the value referred to by `key` mutably, if it is in the arena.
    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        self.values.get_mut(key.index())
    }

    /// The number of values in the arena.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Checks whether the arena contains no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over every key in key order.
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        (0..self.values.len()).map(K::new)
    }

    /// Iterates over `(key, &value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.values.iter().enumerate().map(|(i, v)| (K::new(i), v))
    }
}

impl<K: ArenaKey, V> Default for ArenaMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ArenaKey, V: Clone> Clone for ArenaMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            values: self.values.clone(),
            _marker: PhantomData,
        }
    }
}

impl<K: ArenaKey, V> Index<K> for ArenaMap<K, V> {
    type Output = V;

    fn index(&self, key: K) -> &Self::Output {
        &self.values[key.index()]
    }
}

impl<K: ArenaKey, V> IndexMut<K> for ArenaMap<K, V> {
    fn index_mut(&mut self, key: K) -> &mut Self::Output {
        &mut self.values[key.index()]
    }
}

impl<K: ArenaKey, V: Debug> Debug for ArenaMap<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.values.iter().enumerate())
            .finish()
    }
}

impl<K: ArenaKey, V: PartialEq> PartialEq for ArenaMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl<K: ArenaKey, V: Eq> Eq for ArenaMap<K, V> {}
