//! Fx-hashed collection aliases.
//!
//! Every in-memory index in the engine is keyed by [`PathKey`] or
//! [`EntryId`](crate::EntryId), both short strings, so the workspace uses the
//! Fx hasher from `rustc-hash` instead of SipHash. None of these maps are
//! exposed to untrusted input.
//!
//! # Examples
//!
//! ```
//! use lc_core::{PathKey, PathKeyMap, path_key_map};
//! use camino::Utf8Path;
//!
//! let mut seen: PathKeyMap<u32> = path_key_map();
//! seen.insert(PathKey::new(Utf8Path::new("/Apps/Foo.app")), 1);
//! assert_eq!(seen.len(), 1);
//! ```

use crate::types::PathKey;

/// A [`HashMap`](std::collections::HashMap) using the Fx hash algorithm.
pub type FxHashMap<K, V> = rustc_hash::FxHashMap<K, V>;

/// A [`HashSet`](std::collections::HashSet) using the Fx hash algorithm.
pub type FxHashSet<V> = rustc_hash::FxHashSet<V>;

/// Map keyed by normalized catalog path.
pub type PathKeyMap<V> = FxHashMap<PathKey, V>;

/// Set of normalized catalog paths.
pub type PathKeySet = FxHashSet<PathKey>;

/// Creates an empty [`PathKeyMap`].
#[inline]
#[must_use]
pub fn path_key_map<V>() -> PathKeyMap<V> {
    PathKeyMap::default()
}

/// Creates an empty [`PathKeySet`] able to hold `capacity` keys without
/// reallocating.
#[inline]
#[must_use]
pub fn path_key_set_with_capacity(capacity: usize) -> PathKeySet {
    PathKeySet::with_capacity_and_hasher(capacity, rustc_hash::FxBuildHasher)
}
