//! Container format parsing/emission and the filesystem-backed object store.

pub mod container;
pub mod error;
pub mod store;

pub use error::ContainerError;
pub use store::{ObjectStore, ReadMode, TempHandle};
