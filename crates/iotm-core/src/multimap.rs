//! [`KeyedMultimap`]: a mapping from key to [`ValueList`], the representation
//! backing a rule's filter, params, and actions, and a plugin event's
//! params.

use std::collections::HashMap;

use crate::codec::{self, CodecError, TypedValue, ValueType};
use crate::value::{Value, ValueList};

/// A mapping from key to value-list. The map preserves no ordering
/// guarantee between lists; within a list, values preserve insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyedMultimap {
    lists: HashMap<String, ValueList>,
    /// Aggregate length: the sum of contained ValueList lengths, tracked
    /// independently so removal can debit it by the removed list's own
    /// length in one step.
    len: usize,
}

impl KeyedMultimap {
    pub fn new() -> Self {
        KeyedMultimap::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of distinct keys currently held.
    pub fn key_count(&self) -> usize {
        self.lists.len()
    }

    /// Returns the list for `key`, creating an empty one if absent.
    pub fn get_or_create_list(&mut self, key: &str) -> &mut ValueList {
        self.lists
            .entry(key.to_string())
            .or_insert_with(|| ValueList::new(key))
    }

    /// Returns the list for `key` without creating it.
    pub fn find_list(&self, key: &str) -> Option<&ValueList> {
        self.lists.get(key)
    }

    /// Plain append of `(key, value)`. Always increments the aggregate len.
    pub fn add_str(&mut self, key: &str, value: impl Into<String>) {
        self.get_or_create_list(key).add_str(value);
        self.len += 1;
    }

    pub fn add(&mut self, key: &str, value: Value) {
        self.get_or_create_list(key).add(value);
        self.len += 1;
    }

    /// Set-semantics append. Only increments the aggregate len if the
    /// underlying set-insert actually happened (i.e. it was not a
    /// duplicate).
    pub fn set_add_str(&mut self, key: &str, value: impl Into<String>) -> bool {
        let inserted = self.get_or_create_list(key).set_add_str(value);
        if inserted {
            self.len += 1;
        }
        inserted
    }

    pub fn set_add(&mut self, key: &str, value: Value) -> bool {
        let inserted = self.get_or_create_list(key).set_add(value);
        if inserted {
            self.len += 1;
        }
        inserted
    }

    /// Encode `value` through the typed codec, then plain-append.
    pub fn add_typed(&mut self, key: &str, value: &TypedValue) {
        let encoded = codec::encode(value);
        self.add_str(key, encoded);
    }

    /// Get the first-appended value under `key` as typed text, if the key
    /// exists. Does not create the key as a side effect: an absent key
    /// yields `None`, never an implicit empty-list insertion. This
    /// intentionally hardens the behaviour of the C source's equivalent
    /// getter, which would dereference a possibly-null head on an absent
    /// key.
    pub fn get_single(&self, key: &str) -> Option<&str> {
        self.find_list(key).and_then(|l| l.head_str())
    }

    pub fn get_single_typed(&self, key: &str, ty: ValueType) -> Option<Result<TypedValue, CodecError>> {
        self.get_single(key).map(|s| codec::decode(s, ty))
    }

    /// Remove the list at `key` entirely, decrementing the aggregate len by
    /// that list's own length.
    pub fn remove_list(&mut self, key: &str) -> Option<ValueList> {
        let removed = self.lists.remove(key);
        if let Some(ref list) = removed {
            self.len -= list.len();
        }
        removed
    }

    /// One callback per key.
    pub fn foreach_list<'a>(&'a self) -> impl Iterator<Item = &'a ValueList> {
        self.lists.values()
    }

    /// One callback per (key, value) pair.
    pub fn foreach_value(&self) -> impl Iterator<Item = &Value> {
        self.lists.values().flat_map(|l| l.iter())
    }

    /// Filter to one key, decode each value through the typed codec, and
    /// call back with the typed buffer. Decode failures log and skip that
    /// value rather than aborting the whole iteration.
    pub fn foreach_typed(&self, key: &str, ty: ValueType, mut cb: impl FnMut(&str, TypedValue)) {
        let Some(list) = self.find_list(key) else {
            return;
        };
        for v in list.iter() {
            match codec::decode(&v.value, ty) {
                Ok(typed) => cb(&v.key, typed),
                Err(err) => log::debug!("foreach_typed: skipping undecodable value `{}`: {err}", v.value),
            }
        }
    }

    /// Per-value shallow copy of (key, text) from `src` into `self`,
    /// ignoring payloads. Always a plain append, never set-append.
    pub fn concat_from(&mut self, src: &KeyedMultimap) {
        for v in src.foreach_value() {
            self.add_str(&v.key, v.value.clone());
        }
    }

    /// Build a multimap from parallel key/value arrays, e.g. a config-store
    /// row's filter/params/actions columns. Returns `None` on an empty
    /// input (mirroring the source's `schema_to_multimap`, which returns
    /// null on n=0). Keys that repeat across the input land in the same
    /// list, in the order given; this is the common-case "single-element
    /// list" shape described informally, not a structural guarantee.
    pub fn from_rows(keys: &[impl AsRef<str>], values: &[impl AsRef<str>]) -> Option<KeyedMultimap> {
        if keys.is_empty() {
            return None;
        }
        let mut map = KeyedMultimap::new();
        for (k, v) in keys.iter().zip(values.iter()) {
            map.add_str(k.as_ref(), v.as_ref().to_string());
        }
        Some(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_len_equals_sum_of_child_lengths() {
        let mut map = KeyedMultimap::new();
        map.add_str("a", "1");
        map.add_str("a", "2");
        map.add_str("b", "3");
        let sum: usize = map.foreach_list().map(|l| l.len()).sum();
        assert_eq!(map.len(), sum);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn remove_list_decrements_by_removed_length() {
        let mut map = KeyedMultimap::new();
        map.add_str("a", "1");
        map.add_str("a", "2");
        map.add_str("b", "3");
        map.remove_list("a");
        assert_eq!(map.len(), 1);
        assert!(map.find_list("a").is_none());
    }

    #[test]
    fn get_single_on_absent_key_does_not_create_it() {
        let map = KeyedMultimap::new();
        assert_eq!(map.get_single("nope"), None);
        assert_eq!(map.key_count(), 0);
    }

    #[test]
    fn set_add_str_is_idempotent_under_repeats() {
        let mut map = KeyedMultimap::new();
        for _ in 0..5 {
            map.set_add_str("tag", "same-value");
        }
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn concat_is_plain_append_not_set() {
        let mut src = KeyedMultimap::new();
        src.add_str("mac", "AA:BB");
        let mut dst = KeyedMultimap::new();
        dst.add_str("mac", "AA:BB");
        dst.concat_from(&src);
        // plain append: duplicate key/value pair is kept, not deduped
        assert_eq!(dst.len(), 2);
    }

    #[test]
    fn from_rows_empty_is_none() {
        let keys: Vec<&str> = vec![];
        let values: Vec<&str> = vec![];
        assert!(KeyedMultimap::from_rows(&keys, &values).is_none());
    }
}
