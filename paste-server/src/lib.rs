//! Upload/retrieval session server for the paste encrypted blob exchange.
//!
//! Wires together the websocket upload channel and the plain-HTTP
//! retrieval endpoints over one shared [`ObjectStore`].

pub mod channel;
pub mod error;
pub mod http;
pub mod session;
pub mod upgrade;

pub use error::{HttpError, SessionError};
pub use session::{IdMode, SessionLimits, UploadSession};
