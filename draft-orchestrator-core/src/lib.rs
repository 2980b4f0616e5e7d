//! Draft Orchestrator Core Library
//!
//! Coordination core of a master/detail product app on a draft-enabled backend:
//! - Metadata handshake (Metadata Loader)
//! - Route matching and detail navigation (Navigation Service)
//! - Master list refresh and selection (List Synchronizer)
//! - Draft creation, field submission, activation and deletion (Draft Service)
//!
//! The backend, the router and the views are abstracted through traits, so
//! the core runs with any transport and UI.

pub mod error;
pub mod services;
pub mod state;
pub mod traits;
pub mod types;

#[cfg(test)]
mod test_utils;

// Re-export common types
pub use error::{CoreError, CoreResult};
pub use services::ServiceContext;
pub use state::AppStateStore;
pub use traits::{DetailView, DraftBackend, MasterListView, NavigationHost, ViewRegistry};
