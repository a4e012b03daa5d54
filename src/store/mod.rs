//! Record store subsystem for memdex
//!
//! The store owns an append-only slot array of JSON records plus one
//! secondary index per configured field path, and keeps both in lockstep
//! through every mutation.
//!
//! # Design Principles
//!
//! - Positions are permanent: deletion tombstones a slot, never shifts it
//! - Indexes are derived state; reads resolve exclusively through them
//! - Deterministic: BTreeMap key order, registration-order index walks
//!
//! # Invariants
//!
//! - Every key a live record resolves under an indexed path maps to its
//!   position in that path's index
//! - Tombstoned positions are neutralized when postings are dereferenced
//! - No two live positions share a key under a `unique` path
//! - The slot array only grows; positions are dense from 0

mod config;
mod errors;
mod index;
mod key;
mod populate;
#[allow(clippy::module_inception)]
mod store;

pub use config::StoreConfig;
pub use errors::{StoreError, StoreResult};
pub use index::{Index, IndexDef, Indexes, Pos, Posting};
pub use key::Key;
pub use populate::{EagerPopulator, IncrementalPopulator, IndexPopulator};
pub use store::{CreateIndex, Deleted, InsertOptions, SkipUnique, Store, UpdateOptions};
