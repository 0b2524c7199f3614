//! The plaintext metadata record encrypted under an independent IV and
//! carried inside every stored blob. The server never sees this in the
//! clear; only the sender constructs it and only the receiver parses it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlobMetadata {
    pub filename: String,
    #[serde(rename = "contentType")]
    pub content_type: String,
    pub size: i64,
}
