//! The record store engine
//!
//! Owns the append-only slot array and the per-path index set, and keeps
//! them in lockstep through create_index / find / insert / delete /
//! update.
//!
//! Mutation flow (strict order):
//!
//! 1. insert appends a provisional tombstone, so a mid-operation failure
//!    never exposes a partially indexed record
//! 2. uniqueness is checked for every definition in registration order,
//!    fail fast, before any index is touched
//! 3. population runs through the configured [`IndexPopulator`] strategy
//! 4. the record is written into its slot last

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::path;
use crate::query::{Conditions, KeyQuery};

use super::config::StoreConfig;
use super::errors::{StoreError, StoreResult};
use super::index::{dedup_keys, Index, IndexDef, Indexes, Pos, Posting};
use super::key::Key;
use super::populate::{EagerPopulator, IndexPopulator};

/// Outcome of [`Store::create_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateIndex {
    /// The index was registered (and built, unless its definition defers
    /// population).
    Created,
    /// No definition was given; no index was created. Informational, not
    /// a failure.
    Skipped,
}

/// One `(path, key)` pair exempted from uniqueness checking.
///
/// Escape hatch for delete-then-reinsert flows that must tolerate a
/// self-collision on a single known key.
#[derive(Debug, Clone)]
pub struct SkipUnique {
    /// The unique index path the exemption applies to.
    pub path: String,
    /// The one key value allowed to collide.
    pub key: Value,
}

/// Options for [`Store::insert`].
#[derive(Debug, Clone, Default)]
pub struct InsertOptions {
    /// Exempts one `(path, key)` pair from uniqueness checks.
    pub skip_unique: Option<SkipUnique>,
}

/// Options for [`Store::update`].
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Use the new record verbatim instead of merging over the prior one.
    pub replace: bool,
    /// Insert the new record when no prior record matches.
    pub upsert: bool,
}

/// Result of a non-empty [`Store::delete`]: the tombstoned positions and
/// the records they previously held, index-aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct Deleted {
    /// Positions that were tombstoned, in posting order.
    pub positions: Vec<Pos>,
    /// The prior records captured from those positions.
    pub records: Vec<Value>,
}

/// In-memory record store with secondary indexes.
///
/// Single-threaded and synchronous: every operation runs to completion,
/// and intermediate mutation states are never observable by callers.
#[derive(Debug)]
pub struct Store {
    config: StoreConfig,
    slots: Vec<Option<Value>>,
    indexes: Indexes,
    populator: Box<dyn IndexPopulator>,
}

impl Store {
    /// Creates a store over an initial record vector.
    ///
    /// The vector is adopted as the slot array (a `null` element counts
    /// as a tombstone) and every configured index is bulk-built over it.
    /// The identity field is auto-registered as a `unique` index unless
    /// `defs` carries its own entry for it. A `None` definition or a
    /// duplicate path in `defs` is logged and skipped; the constructor
    /// never fails. Note that adoption does not re-check uniqueness over
    /// the initial records: a bulk build overwrites, it does not validate.
    pub fn new(
        records: Vec<Value>,
        defs: Vec<(String, Option<IndexDef>)>,
        config: StoreConfig,
    ) -> Store {
        let slots = records
            .into_iter()
            .map(|record| if record.is_null() { None } else { Some(record) })
            .collect();

        let mut store = Store {
            config,
            slots,
            indexes: Indexes::default(),
            populator: Box::new(EagerPopulator),
        };

        if !defs.iter().any(|(p, _)| *p == store.config.id_key) {
            let id_key = store.config.id_key.clone();
            // Cannot fail: the index set is empty at this point.
            let _ = store.create_index(&id_key, Some(IndexDef::unique()));
        }
        for (p, def) in defs {
            if let Err(err) = store.create_index(&p, def) {
                warn!(path = p.as_str(), %err, "skipping index definition");
            }
        }
        store
    }

    /// Swaps in an index maintenance strategy.
    pub fn with_populator(mut self, populator: Box<dyn IndexPopulator>) -> Store {
        self.populator = populator;
        self
    }

    /// The store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Slot array length, tombstones included. Only ever grows.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true when no slot exists at all.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of live (non-tombstoned) records.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// The record at `pos`, or `None` for a tombstone or an out-of-range
    /// position.
    pub fn get(&self, pos: Pos) -> Option<&Value> {
        self.slots.get(pos).and_then(Option::as_ref)
    }

    /// Read access to the index set.
    pub fn indexes(&self) -> &Indexes {
        &self.indexes
    }

    /// Drops every slot, index, and definition.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.indexes = Indexes::default();
    }

    // ------------------------------------------------------------------
    // Index construction
    // ------------------------------------------------------------------

    /// Registers an index for `path` and bulk-builds it over every live
    /// record.
    ///
    /// A `None` definition is an explicit no-op signal and reports
    /// [`CreateIndex::Skipped`]. Redefining an existing path fails with
    /// `IndexExists` without mutating state. A `skip` definition is
    /// registered but its population is deferred to explicit
    /// [`Store::index_position`] calls.
    pub fn create_index(&mut self, p: &str, def: Option<IndexDef>) -> StoreResult<CreateIndex> {
        let Some(def) = def else {
            debug!(path = p, "empty index definition, skipping index creation");
            return Ok(CreateIndex::Skipped);
        };

        self.indexes.register(p, def)?;

        if !def.skip {
            if let Some(index) = self.indexes.get_mut(p) {
                for (pos, slot) in self.slots.iter().enumerate() {
                    if let Some(record) = slot {
                        index.apply_record(record, pos);
                    }
                }
            }
        }

        debug!(
            path = p,
            unique = def.unique,
            multiple = def.multiple,
            deferred = def.skip,
            "created index"
        );
        Ok(CreateIndex::Created)
    }

    /// Incremental single-record build: indexes only the record at `pos`
    /// under an already-registered path.
    ///
    /// This is also the explicit population mechanism for `skip`
    /// definitions. Returns false when the path is unknown or the
    /// position holds no live record.
    pub fn index_position(&mut self, p: &str, pos: Pos) -> bool {
        let Some(index) = self.indexes.get_mut(p) else {
            return false;
        };
        let Some(Some(record)) = self.slots.get(pos) else {
            return false;
        };
        index.apply_record(record, pos);
        true
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Raw position lookup: `None` when no index was ever created for
    /// `path`, `Some(vec![])` when the index exists but nothing matches.
    ///
    /// Positions are returned without dereferencing, so entries left
    /// stale by earlier deletes are included — that is the documented
    /// positions-only contract.
    pub fn find_positions(&self, p: &str, query: &KeyQuery) -> Option<Vec<Pos>> {
        let index = self.indexes.get(p)?;
        let mut out = Vec::new();
        for key in Self::query_keys(index, query) {
            if let Some(posting) = index.posting(&key) {
                posting.collect_into(&mut out);
            }
        }
        Some(out)
    }

    /// Record lookup: positions are dereferenced against the slot array
    /// and tombstoned results dropped.
    ///
    /// `Many` results preserve operand order, then per-key posting order;
    /// `Not` results come back in index key order.
    pub fn find(&self, p: &str, query: &KeyQuery) -> Option<Vec<&Value>> {
        let positions = self.find_positions(p, query)?;
        Some(self.dereference(&positions))
    }

    /// Conjunctive (logical AND) lookup over a condition map, returning
    /// matched positions.
    ///
    /// Fields with `null` values do not constrain the conjunction. Each
    /// field is resolved independently; successive position sets are
    /// intersected preserving the order of the first evaluated set. A
    /// path with no index contributes an empty set.
    pub fn find_cond_positions(&self, conditions: &Conditions) -> Vec<Pos> {
        let mut result: Option<Vec<Pos>> = None;
        for (p, value) in conditions {
            if value.is_null() {
                continue;
            }
            let query = KeyQuery::parse(value, &self.config.not_key);
            let positions = self.find_positions(p, &query).unwrap_or_default();
            result = Some(match result {
                None => positions,
                Some(mut kept) => {
                    kept.retain(|pos| positions.contains(pos));
                    kept
                }
            });
        }
        result.unwrap_or_default()
    }

    /// Conjunctive lookup returning live records.
    pub fn find_cond(&self, conditions: &Conditions) -> Vec<&Value> {
        let positions = self.find_cond_positions(conditions);
        self.dereference(&positions)
    }

    /// Disjunctive (logical OR) lookup over a list of condition maps,
    /// returning matched positions de-duplicated in first-seen order.
    pub fn find_many_positions(&self, conditions: &[Conditions]) -> Vec<Pos> {
        let mut out: Vec<Pos> = Vec::new();
        for cond in conditions {
            for pos in self.find_cond_positions(cond) {
                if !out.contains(&pos) {
                    out.push(pos);
                }
            }
        }
        out
    }

    /// Disjunctive lookup returning live records.
    pub fn find_many(&self, conditions: &[Conditions]) -> Vec<&Value> {
        let positions = self.find_many_positions(conditions);
        self.dereference(&positions)
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Appends a record and populates every index.
    ///
    /// Fails with `ERR_VALIDATION` for a `null` record or one lacking the
    /// identity field, and with `ERR_DUPLICATE` on the first `unique`
    /// definition (in registration order) that already holds a live
    /// mapping for one of the record's keys — without having mutated any
    /// index. A failed insert leaves its provisional tombstone in place:
    /// the slot is burned, the array stays monotone.
    pub fn insert(&mut self, record: Value, options: &InsertOptions) -> StoreResult<Pos> {
        if record.is_null() {
            return Err(StoreError::NullRecord);
        }
        let has_id = record
            .as_object()
            .is_some_and(|map| map.contains_key(&self.config.id_key));
        if !has_id {
            return Err(StoreError::MissingIdKey {
                id_key: self.config.id_key.clone(),
            });
        }

        let pos = self.slots.len();
        self.slots.push(None); // provisional tombstone

        // Pass 1: resolve keys and check uniqueness against live
        // mappings only, fail fast, no index mutation.
        let mut resolved: Vec<Vec<Key>> = Vec::with_capacity(self.indexes.len());
        for index in self.indexes.iter() {
            let keys = dedup_keys(path::resolve_keys(&record, index.path()));
            if index.def().unique {
                for key in &keys {
                    if Self::exempted(index.path(), key, options) {
                        continue;
                    }
                    if self.has_live_mapping(index, key) {
                        trace!(path = index.path(), key = %key, "duplicate key, insert rejected");
                        return Err(StoreError::DuplicateKey {
                            path: index.path().to_string(),
                            key: key.to_string(),
                        });
                    }
                }
            }
            resolved.push(keys);
        }

        // Pass 2: populate through the configured strategy, then expose
        // the record.
        self.populator
            .populate(&mut self.indexes, &record, &resolved, pos);
        self.slots[pos] = Some(record);
        trace!(pos, "inserted record");
        Ok(pos)
    }

    /// Tombstones every live record matching the query.
    ///
    /// Returns `None` when nothing live matches (including deleting an
    /// already-deleted key, or a path with no index). Index entries are
    /// deliberately not pruned; the positions they keep pointing at are
    /// neutralized at dereference time.
    pub fn delete(&mut self, p: &str, query: &KeyQuery) -> Option<Deleted> {
        let candidates = self.find_positions(p, query)?;

        // Stale entries from earlier deletes are filtered here, which is
        // what makes re-deleting a key a no-op.
        let mut positions: Vec<Pos> = Vec::new();
        for pos in candidates {
            if self.get(pos).is_some() && !positions.contains(&pos) {
                positions.push(pos);
            }
        }
        if positions.is_empty() {
            return None;
        }

        let mut records = Vec::with_capacity(positions.len());
        for &pos in &positions {
            if let Some(record) = self.slots[pos].take() {
                records.push(record);
            }
        }
        debug!(path = p, count = positions.len(), "deleted records");
        Some(Deleted { positions, records })
    }

    /// Replaces the record matching `key` on a `unique` path with a new
    /// one, delete-then-insert, rolling back on any downstream failure.
    ///
    /// The effective record is `new_record` verbatim (`replace`) or a
    /// shallow merge of the prior record overwritten by `new_record`'s
    /// fields. With no prior record the operation fails with
    /// `ERR_NOT_FOUND` unless `upsert` is set. On success the old
    /// position stays a permanent tombstone and the record lives at a new
    /// position.
    pub fn update(
        &mut self,
        p: &str,
        key: &Value,
        new_record: Value,
        options: &UpdateOptions,
    ) -> StoreResult<Pos> {
        if new_record.is_null() {
            return Err(StoreError::NullRecord);
        }
        if !self.indexes.def(p).is_some_and(|def| def.unique) {
            return Err(StoreError::NotUnique { path: p.to_string() });
        }

        let deleted = self.delete(p, &KeyQuery::Literal(key.clone()));

        let effective = match &deleted {
            Some(prior) if !prior.records.is_empty() => {
                if options.replace {
                    new_record
                } else {
                    shallow_merge(&prior.records[0], new_record)
                }
            }
            _ => {
                if !options.upsert {
                    self.restore(deleted);
                    return Err(StoreError::NotFound {
                        path: p.to_string(),
                        key: Key::coerce(key).to_string(),
                    });
                }
                new_record
            }
        };

        match self.insert(effective, &InsertOptions::default()) {
            Ok(pos) => {
                trace!(path = p, pos, "updated record");
                Ok(pos)
            }
            Err(err) => {
                self.restore(deleted);
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Expands a query into the concrete keys to look up.
    fn query_keys(index: &Index, query: &KeyQuery) -> Vec<Key> {
        match query {
            KeyQuery::Literal(value) => vec![Key::coerce(value)],
            KeyQuery::Many(values) => values.iter().map(Key::coerce).collect(),
            KeyQuery::Not(values) => {
                let excluded: Vec<Key> = values.iter().map(Key::coerce).collect();
                index
                    .keys()
                    .filter(|key| !excluded.contains(*key))
                    .cloned()
                    .collect()
            }
        }
    }

    fn dereference(&self, positions: &[Pos]) -> Vec<&Value> {
        positions.iter().filter_map(|&pos| self.get(pos)).collect()
    }

    /// True when the key maps to at least one live position.
    fn has_live_mapping(&self, index: &Index, key: &Key) -> bool {
        match index.posting(key) {
            None => false,
            Some(Posting::One(pos)) => self.get(*pos).is_some(),
            Some(Posting::Many(list)) => list.iter().any(|&pos| self.get(pos).is_some()),
        }
    }

    fn exempted(p: &str, key: &Key, options: &InsertOptions) -> bool {
        options
            .skip_unique
            .as_ref()
            .is_some_and(|skip| skip.path == p && Key::coerce(&skip.key) == *key)
    }

    /// Puts captured records back into their tombstoned positions.
    /// A `None` (no-op delete) restores nothing.
    fn restore(&mut self, deleted: Option<Deleted>) {
        if let Some(d) = deleted {
            for (pos, record) in d.positions.into_iter().zip(d.records) {
                self.slots[pos] = Some(record);
            }
        }
    }
}

/// Shallow merge: the prior object's fields overwritten by the patch's.
/// A non-object on either side degrades to the patch verbatim.
fn shallow_merge(prior: &Value, patch: Value) -> Value {
    match (prior.as_object(), patch) {
        (Some(base), Value::Object(fields)) => {
            let mut merged = base.clone();
            for (field, value) in fields {
                merged.insert(field, value);
            }
            Value::Object(merged)
        }
        (_, patch) => patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn empty_store() -> Store {
        Store::new(Vec::new(), Vec::new(), StoreConfig::default())
    }

    #[test]
    fn test_insert_and_find_by_id() {
        let mut store = empty_store();
        let pos = store.insert(json!({"id": 1, "name": "a"}), &InsertOptions::default()).unwrap();
        assert_eq!(pos, 0);

        let found = store.find("id", &KeyQuery::literal(1)).unwrap();
        assert_eq!(found, vec![&json!({"id": 1, "name": "a"})]);
    }

    #[test]
    fn test_find_missing_index_is_none_not_empty() {
        let mut store = empty_store();
        store.insert(json!({"id": 1}), &InsertOptions::default()).unwrap();

        assert!(store.find("nope", &KeyQuery::literal(1)).is_none());
        assert_eq!(store.find("id", &KeyQuery::literal(9)), Some(vec![]));
    }

    #[test]
    fn test_constructor_adopts_initial_records() {
        let store = Store::new(
            vec![json!({"id": 1}), json!(null), json!({"id": 3})],
            Vec::new(),
            StoreConfig::default(),
        );

        assert_eq!(store.len(), 3);
        assert_eq!(store.live_count(), 2);
        assert_eq!(store.get(1), None);
        assert_eq!(
            store.find_positions("id", &KeyQuery::literal(3)),
            Some(vec![2])
        );
    }

    #[test]
    fn test_create_index_after_data_bulk_builds() {
        let mut store = empty_store();
        store.insert(json!({"id": 1, "group": "x"}), &InsertOptions::default()).unwrap();
        store.insert(json!({"id": 2, "group": "x"}), &InsertOptions::default()).unwrap();

        let outcome = store.create_index("group", Some(IndexDef::multiple())).unwrap();
        assert_eq!(outcome, CreateIndex::Created);
        assert_eq!(
            store.find_positions("group", &KeyQuery::literal("x")),
            Some(vec![0, 1])
        );
    }

    #[test]
    fn test_create_index_none_definition_is_informational() {
        let mut store = empty_store();
        assert_eq!(store.create_index("x", None).unwrap(), CreateIndex::Skipped);
        assert!(!store.indexes().contains("x"));
    }

    #[test]
    fn test_create_index_redefinition_rejected() {
        let mut store = empty_store();
        let err = store.create_index("id", Some(IndexDef::plain())).unwrap_err();
        assert_eq!(err, StoreError::IndexExists { path: "id".into() });
    }

    #[test]
    fn test_skip_definition_defers_population() {
        let mut store = empty_store();
        store
            .create_index("name", Some(IndexDef { skip: true, ..IndexDef::default() }))
            .unwrap();
        store.insert(json!({"id": 1, "name": "a"}), &InsertOptions::default()).unwrap();

        assert_eq!(store.find_positions("name", &KeyQuery::literal("a")), Some(vec![]));

        assert!(store.index_position("name", 0));
        assert_eq!(
            store.find_positions("name", &KeyQuery::literal("a")),
            Some(vec![0])
        );
    }

    #[test]
    fn test_insert_null_record_rejected() {
        let mut store = empty_store();
        let err = store.insert(Value::Null, &InsertOptions::default()).unwrap_err();
        assert_eq!(err.code(), "ERR_VALIDATION");
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_insert_missing_id_rejected() {
        let mut store = empty_store();
        let err = store.insert(json!({"name": "a"}), &InsertOptions::default()).unwrap_err();
        assert_eq!(err, StoreError::MissingIdKey { id_key: "id".into() });
    }

    #[test]
    fn test_failed_insert_burns_a_slot() {
        let mut store = empty_store();
        store.insert(json!({"id": 1}), &InsertOptions::default()).unwrap();
        store.insert(json!({"id": 1}), &InsertOptions::default()).unwrap_err();

        assert_eq!(store.len(), 2);
        assert_eq!(store.live_count(), 1);

        let pos = store.insert(json!({"id": 2}), &InsertOptions::default()).unwrap();
        assert_eq!(pos, 2);
    }

    #[test]
    fn test_skip_unique_exempts_one_pair() {
        let mut store = empty_store();
        store.insert(json!({"id": 1}), &InsertOptions::default()).unwrap();

        let options = InsertOptions {
            skip_unique: Some(SkipUnique { path: "id".into(), key: json!(1) }),
        };
        let pos = store.insert(json!({"id": 1, "v": 2}), &options).unwrap();
        assert_eq!(pos, 1);
    }

    #[test]
    fn test_delete_unknown_path_is_noop() {
        let mut store = empty_store();
        store.insert(json!({"id": 1}), &InsertOptions::default()).unwrap();
        assert!(store.delete("nope", &KeyQuery::literal(1)).is_none());
    }

    #[test]
    fn test_clear_drops_definitions_too() {
        let mut store = empty_store();
        store.insert(json!({"id": 1}), &InsertOptions::default()).unwrap();
        store.clear();

        assert_eq!(store.len(), 0);
        assert!(store.indexes().is_empty());
        assert!(store.find("id", &KeyQuery::literal(1)).is_none());
    }

    #[test]
    fn test_shallow_merge() {
        let merged = shallow_merge(
            &json!({"id": 2, "a": 1, "b": 2}),
            json!({"b": 9, "c": 3}),
        );
        assert_eq!(merged, json!({"id": 2, "a": 1, "b": 9, "c": 3}));
    }

    #[test]
    fn test_shallow_merge_non_object_patch_wins() {
        assert_eq!(shallow_merge(&json!({"id": 1}), json!(7)), json!(7));
    }
}
