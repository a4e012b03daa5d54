//! memdex - A strict, deterministic, in-process indexed record store
//!
//! Records live in an append-only slot array; every configured field path
//! gets a secondary index kept in lockstep with the slots through insert,
//! tombstone delete, and update-with-rollback.

pub mod path;
pub mod query;
pub mod store;

pub use query::{Conditions, KeyQuery};
pub use store::{
    CreateIndex, Deleted, EagerPopulator, IncrementalPopulator, Index, IndexDef, IndexPopulator,
    Indexes, InsertOptions, Key, Pos, Posting, SkipUnique, Store, StoreConfig, StoreError,
    StoreResult, UpdateOptions,
};
