//! Sender/receiver core consumed by front-ends (CLI, browser drag-and-drop)
//! that are themselves out of scope for this crate.

pub mod error;
pub mod metadata;
pub mod receiver;
pub mod sender;

pub use error::ClientError;
pub use metadata::BlobMetadata;
pub use receiver::{delete, download, fetch_metadata, RetrievedMetadata};
pub use sender::{upload, KeyMode, UploadOutcome, UploadRequest};
