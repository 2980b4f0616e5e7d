//! Backend, router and view abstraction trait definition

mod draft_backend;
mod navigation_host;
mod views;

pub use draft_backend::DraftBackend;
pub use navigation_host::NavigationHost;
pub use views::{DetailView, MasterListView, ViewRegistry};
