use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Utilization at which a batch can not accept any more chunks.
pub const MAX_UTILIZATION: u32 = 16;

/// Identifier of a postage batch.
///
/// Batch identifiers are opaque to this client. The only requirement is that they are not empty.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BatchId(Arc<str>);

impl BatchId {
    /// Creates a new batch identifier, rejecting empty values.
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(crate::Error::InvalidBatchId(id));
        }
        Ok(Self(id.into()))
    }

    /// Returns the identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for BatchId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for BatchId {
    type Error = crate::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BatchId> for String {
    fn from(id: BatchId) -> Self {
        id.0.as_ref().to_owned()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BatchId").field(&self.as_str()).finish()
    }
}

/// A snapshot of a postage batch, as reported by `GET /stamps/{id}`.
///
/// Snapshots are never updated in place. Each poll of the node yields a new one.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Batch {
    /// The identifier of the batch.
    #[serde(rename = "batchID")]
    pub batch_id: BatchId,
    /// How much of the batch capacity has been used, from `0` up to [`MAX_UTILIZATION`].
    pub utilization: u32,
    /// Whether the batch has expired and no longer accepts uploads.
    pub expired: bool,
    /// Whether the batch is funded and ready to accept uploads.
    pub usable: bool,
}

impl Batch {
    /// Creates the snapshot a worker holds before it has polled the node for the first time.
    pub fn placeholder(batch_id: BatchId) -> Self {
        Self {
            batch_id,
            utilization: 0,
            expired: false,
            usable: false,
        }
    }

    /// Returns `true` if the batch reports exactly [`MAX_UTILIZATION`].
    pub fn is_full(&self) -> bool {
        self.utilization == MAX_UTILIZATION
    }
}
