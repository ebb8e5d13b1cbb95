//! Session persistence.
//!
//! Sessions and their state-transition events, held in memory.

pub mod model;
pub mod store;

// Re-export commonly used types
pub use model::{
    NewSession, NewSessionEvent, Session, SessionEvent, SessionPatch, SessionReport,
};
pub use store::{create_shared_store, SessionStore, SharedSessionStore, StoreError};
