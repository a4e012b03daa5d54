//! Pluggable index maintenance strategies
//!
//! Insert keeps every index synchronized through an [`IndexPopulator`]:
//! the eager strategy writes the key sets already resolved during the
//! uniqueness pass, the incremental strategy re-resolves each record
//! through the same per-record code path the single-position index build
//! uses. Both must produce identical index state for the same inputs —
//! the equivalence is property-tested.

use std::fmt;

use serde_json::Value;

use super::index::{Indexes, Pos};
use super::key::Key;

/// Strategy for writing index entries during `Store::insert`.
///
/// `resolved` holds one de-duplicated key set per registered index, in
/// registration order, as computed during the uniqueness pass. Deferred
/// (`skip`) definitions must not be populated.
pub trait IndexPopulator: fmt::Debug {
    /// Populates every index for the record at `pos`.
    fn populate(&self, indexes: &mut Indexes, record: &Value, resolved: &[Vec<Key>], pos: Pos);
}

/// Writes the key sets resolved during the uniqueness pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct EagerPopulator;

impl IndexPopulator for EagerPopulator {
    fn populate(&self, indexes: &mut Indexes, _record: &Value, resolved: &[Vec<Key>], pos: Pos) {
        for (index, keys) in indexes.iter_mut().zip(resolved) {
            if index.def().skip {
                continue;
            }
            for key in keys {
                index.apply(key.clone(), pos);
            }
        }
    }
}

/// Re-resolves the record per index, through the same code path the
/// incremental (single-position) index build uses.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncrementalPopulator;

impl IndexPopulator for IncrementalPopulator {
    fn populate(&self, indexes: &mut Indexes, record: &Value, _resolved: &[Vec<Key>], pos: Pos) {
        indexes.apply_record(record, pos);
    }
}
