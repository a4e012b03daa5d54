//! Index definitions, postings, and the per-path index set
//!
//! Each configured field path owns a `BTreeMap` from stringified key to
//! posting, so key enumeration (negation queries) is deterministic.
//! Registration order is preserved: mutation walks definitions in the
//! order they were registered, which fixes the fail-fast order of
//! uniqueness checks.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{StoreError, StoreResult};
use super::key::Key;
use crate::path;

/// Permanent integer identity of a record within the slot array.
pub type Pos = usize;

/// Attributes of one secondary index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexDef {
    /// At most one live record may resolve to a given key.
    pub unique: bool,
    /// A key accumulates an ordered set of positions instead of one.
    pub multiple: bool,
    /// Register the index but defer entry population.
    pub skip: bool,
}

impl IndexDef {
    /// A plain last-writer-wins index.
    pub fn plain() -> IndexDef {
        IndexDef::default()
    }

    /// A unique index.
    pub fn unique() -> IndexDef {
        IndexDef { unique: true, ..IndexDef::default() }
    }

    /// A multi-value index.
    pub fn multiple() -> IndexDef {
        IndexDef { multiple: true, ..IndexDef::default() }
    }
}

/// What a key maps to: one position, or an ordered set of positions.
///
/// `Many` postings are never scrubbed on delete; stale positions are
/// neutralized when they are dereferenced against the slot array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Posting {
    /// Single-position mapping (non-`multiple` definitions).
    One(Pos),
    /// Ordered position set in insertion order (`multiple` definitions).
    Many(Vec<Pos>),
}

impl Posting {
    /// Appends this posting's positions to `out`, preserving order.
    pub fn collect_into(&self, out: &mut Vec<Pos>) {
        match self {
            Posting::One(pos) => out.push(*pos),
            Posting::Many(list) => out.extend_from_slice(list),
        }
    }

    /// Returns this posting's positions as a fresh vector.
    pub fn positions(&self) -> Vec<Pos> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }
}

/// One secondary index: a field path, its definition, and its entries.
#[derive(Debug)]
pub struct Index {
    path: String,
    def: IndexDef,
    entries: BTreeMap<Key, Posting>,
}

impl Index {
    fn new(path: impl Into<String>, def: IndexDef) -> Index {
        Index {
            path: path.into(),
            def,
            entries: BTreeMap::new(),
        }
    }

    /// The field path this index is keyed by.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The definition this index was registered with.
    pub fn def(&self) -> IndexDef {
        self.def
    }

    /// Looks up the posting for a key.
    pub fn posting(&self, key: &Key) -> Option<&Posting> {
        self.entries.get(key)
    }

    /// Iterates every key currently present, in deterministic key order.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.keys()
    }

    /// Number of distinct keys present.
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    /// Writes one key -> position entry.
    ///
    /// `multiple` definitions append to the key's ordered set; anything
    /// else overwrites (last-writer-wins). Used by the populator
    /// strategies and by bulk builds.
    pub fn apply(&mut self, key: Key, pos: Pos) {
        if self.def.multiple {
            let posting = self
                .entries
                .entry(key)
                .or_insert_with(|| Posting::Many(Vec::new()));
            if let Posting::Many(list) = posting {
                list.push(pos);
            }
        } else {
            self.entries.insert(key, Posting::One(pos));
        }
    }

    /// Indexes one record at `pos` under this index's path.
    ///
    /// Resolved keys are de-duplicated first, so a key is never added
    /// twice for the same slot within one operation.
    pub fn apply_record(&mut self, record: &Value, pos: Pos) {
        for key in dedup_keys(path::resolve_keys(record, &self.path)) {
            self.apply(key, pos);
        }
    }
}

/// The full index set of a store, in registration order.
#[derive(Debug, Default)]
pub struct Indexes {
    items: Vec<Index>,
    by_path: HashMap<String, usize>,
}

impl Indexes {
    /// Registers a new index. Redefinition is rejected without mutating
    /// any state.
    pub(crate) fn register(&mut self, path: &str, def: IndexDef) -> StoreResult<()> {
        if self.by_path.contains_key(path) {
            return Err(StoreError::IndexExists { path: path.to_string() });
        }
        self.by_path.insert(path.to_string(), self.items.len());
        self.items.push(Index::new(path, def));
        Ok(())
    }

    /// Returns true when an index exists for `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    /// Looks up the index for `path`.
    pub fn get(&self, path: &str) -> Option<&Index> {
        self.by_path.get(path).map(|&i| &self.items[i])
    }

    pub(crate) fn get_mut(&mut self, path: &str) -> Option<&mut Index> {
        let i = *self.by_path.get(path)?;
        Some(&mut self.items[i])
    }

    /// Returns the definition registered for `path`.
    pub fn def(&self, path: &str) -> Option<IndexDef> {
        self.get(path).map(Index::def)
    }

    /// Iterates indexes in registration order.
    pub fn iter(&self) -> std::slice::Iter<'_, Index> {
        self.items.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Index> {
        self.items.iter_mut()
    }

    /// Number of registered indexes.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true when no index is registered.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Indexes one record across every non-deferred definition.
    pub fn apply_record(&mut self, record: &Value, pos: Pos) {
        for index in &mut self.items {
            if index.def.skip {
                continue;
            }
            index.apply_record(record, pos);
        }
    }
}

/// De-duplicates resolved keys preserving first-seen order.
pub(crate) fn dedup_keys(mut keys: Vec<Key>) -> Vec<Key> {
    let mut seen = HashSet::new();
    keys.retain(|key| seen.insert(key.clone()));
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_register_rejects_redefinition() {
        let mut indexes = Indexes::default();
        indexes.register("id", IndexDef::unique()).unwrap();

        let err = indexes.register("id", IndexDef::plain()).unwrap_err();
        assert_eq!(err, StoreError::IndexExists { path: "id".into() });
        assert_eq!(indexes.len(), 1);
    }

    #[test]
    fn test_apply_last_writer_wins() {
        let mut index = Index::new("id", IndexDef::plain());
        index.apply(Key::text("1"), 0);
        index.apply(Key::text("1"), 3);

        assert_eq!(index.posting(&Key::text("1")), Some(&Posting::One(3)));
    }

    #[test]
    fn test_apply_multiple_accumulates_in_order() {
        let mut index = Index::new("group", IndexDef::multiple());
        index.apply(Key::text("a"), 2);
        index.apply(Key::text("a"), 0);
        index.apply(Key::text("a"), 5);

        assert_eq!(
            index.posting(&Key::text("a")),
            Some(&Posting::Many(vec![2, 0, 5]))
        );
    }

    #[test]
    fn test_apply_record_dedups_within_one_operation() {
        let mut index = Index::new("parentID.$.id", IndexDef::multiple());
        let record = json!({"parentID": [{"id": 7}, {"id": 7}]});
        index.apply_record(&record, 4);

        assert_eq!(
            index.posting(&Key::text("7")),
            Some(&Posting::Many(vec![4]))
        );
    }

    #[test]
    fn test_apply_record_skips_deferred_definitions() {
        let mut indexes = Indexes::default();
        indexes.register("id", IndexDef::unique()).unwrap();
        indexes
            .register("name", IndexDef { skip: true, ..IndexDef::default() })
            .unwrap();

        indexes.apply_record(&json!({"id": 1, "name": "a"}), 0);

        assert_eq!(indexes.get("id").unwrap().key_count(), 1);
        assert_eq!(indexes.get("name").unwrap().key_count(), 0);
    }

    #[test]
    fn test_keys_enumerate_in_deterministic_order() {
        let mut index = Index::new("id", IndexDef::plain());
        index.apply(Key::text("b"), 0);
        index.apply(Key::Absent, 1);
        index.apply(Key::text("a"), 2);

        let keys: Vec<&Key> = index.keys().collect();
        assert_eq!(keys, vec![&Key::Absent, &Key::text("a"), &Key::text("b")]);
    }
}
