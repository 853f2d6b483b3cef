//! Work items and result rows

use serde::{Deserialize, Serialize};

/// One achievement ID in flight, with the number of transient retries so far.
///
/// Maintenance re-pushes keep `attempt` unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkItem {
    pub id: u32,
    pub attempt: u32,
}

impl WorkItem {
    pub fn new(id: u32) -> Self {
        Self { id, attempt: 0 }
    }

    pub fn next_attempt(self) -> Self {
        Self {
            id: self.id,
            attempt: self.attempt + 1,
        }
    }
}

/// A resolved achievement: one `ID,Name` row in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(rename = "Name")]
    pub name: String,
}

impl ResultRecord {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}
