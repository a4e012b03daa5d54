//! Store configuration

use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::Store`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Identity field every record must carry. Auto-registered as a
    /// `unique` index unless the caller supplies its own definition.
    pub id_key: String,
    /// Reserved operator name expressing set negation in lookups.
    pub not_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            id_key: "id".to_string(),
            not_key: "$not".to_string(),
        }
    }
}
