//! Platform-agnostic adapters for headless hosts, demos and tests.

mod headless_router;
mod memory_backend;

pub use headless_router::HeadlessRouter;
pub use memory_backend::InMemoryDraftBackend;
