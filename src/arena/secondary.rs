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

/// A sparse side table associating extra data with keys handed out by an
/// [`ArenaMap`](crate::arena::ArenaMap).
///
/// The map is dense in storage (indexed by the key) but sparse in content,
/// any key may or may not have an associated value. This is the workhorse
/// for analyses: the IR owns the entities, analyses key their results by
/// the entity handles.
pub struct SecondaryMap<K: ArenaKey, V> {
    values: Vec<Option<V>>,
    len: usize,
    _marker: PhantomData<fn() -> K>,
}

impl<K: ArenaKey, V> SecondaryMap<K, V> {
    /// Creates a new, empty map.
    pub fn new() -> Self {
        Self {
            values: Vec::default(),
            len: 0,
            _marker: PhantomData,
        }
    }

    /// Checks whether `key` has an associated value in this map.
    pub fn contains(&self, key: K) -> bool {
        matches!(self.values.get(key.index()), Some(Some(_)))
    }

    /// Inserts a value for `key`, returning the previous value if
    /// there was one.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let index = key.index();

        if index >= self.values.len() {
            self.values.resize_with(index + 1, || None);
        }

        let prev = self.values[index].replace(value);

        if prev.is_none() {
            self.len += 1;
        }

        prev
    }

    /// Gets the value associated with `key`, if there is one.
    pub fn get(&self, key: K) -> Option<&V> {
        self.values.get(key.index()).and_then(Option::as_ref)
    }

    /// Gets the value associated with `key` mutably, if there is one.
    pub fn get_mut(&mut self, key: K) -> Option<&mut V> {
        self.values.get_mut(key.index()).and_then(Option::as_mut)
    }

    /// Removes and returns the value associated with `key`, if any.
    pub fn take(&mut self, key: K) -> Option<V> {
        let prev = self.values.get_mut(key.index()).and_then(Option::take);

        if prev.is_some() {
            self.len -= 1;
        }

        prev
    }

    /// The number of keys that have associated values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Checks whether no key has an associated value.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates over every `(key, &value)` pair present, in key order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|v| (K::new(i), v)))
    }

    /// Iterates over every key present, in key order.
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.iter().map(|(k, _)| k)
    }
}

impl<K: ArenaKey, V> Default for SecondaryMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ArenaKey, V: Clone> Clone for SecondaryMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            values: self.values.clone(),
            len: self.len,
            _marker: PhantomData,
        }
    }
}

impl<K: ArenaKey, V> Index<K> for SecondaryMap<K, V> {
    type Output = V;

    fn index(&self, key: K) -> &Self::Output {
        self.get(key).expect("no value associated with key")
    }
}

impl<K: ArenaKey, V> IndexMut<K> for SecondaryMap<K, V> {
    fn index_mut(&mut self, key: K) -> &mut Self::Output {
        self.get_mut(key).expect("no value associated with key")
    }
}

impl<K: ArenaKey, V: Debug> Debug for SecondaryMap<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(k, v)| (k.index(), v)))
            .finish()
    }
}

impl<K: ArenaKey, V: PartialEq> PartialEq for SecondaryMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        if self.len != other.len {
            return false;
        }

        self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K: ArenaKey, V: Eq> Eq for SecondaryMap<K, V> {}

#[cfg(feature = "enable-serde")]
impl<K: ArenaKey, V: serde::Serialize> serde::Serialize for SecondaryMap<K, V> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.len))?;

        for (key, value) in self.iter() {
            map.serialize_entry(&key.index(), value)?;
        }

        map.end()
    }
}

#[cfg(feature = "enable-serde")]
impl<'de, K: ArenaKey, V: serde::Deserialize<'de>> serde::Deserialize<'de> for SecondaryMap<K, V> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = std::collections::BTreeMap::<usize, V>::deserialize(deserializer)?;
        let mut map = Self::new();

        for (index, value) in entries {
            map.insert(K::new(index), value);
        }

        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dense_arena_key;

    dense_arena_key! { struct E; }

    #[test]
    fn sparse_insert_and_lookup() {
        let mut map = SecondaryMap::<E, i32>::new();

        assert!(map.is_empty());
        assert_eq!(map.insert(E::new(5), 50), None);
        assert_eq!(map.insert(E::new(1), 10), None);
        assert_eq!(map.insert(E::new(5), 55), Some(50));

        assert_eq!(map.len(), 2);
        assert!(map.contains(E::new(1)));
        assert!(!map.contains(E::new(0)));
        assert_eq!(map[E::new(5)], 55);

        let pairs: Vec<(usize, i32)> = map.iter().map(|(k, v)| (k.index(), *v)).collect();
        assert_eq!(pairs, vec![(1, 10), (5, 55)]);
    }

    #[test]
    fn take_removes() {
        let mut map = SecondaryMap::<E, i32>::new();

        map.insert(E::new(3), 30);

        assert_eq!(map.take(E::new(3)), Some(30));
        assert_eq!(map.take(E::new(3)), None);
        assert!(map.is_empty());
    }
}
