//! In-memory adapters for the task store and the external backend.

mod backend;
mod task;

pub use backend::InMemoryTaskBackend;
pub use task::InMemoryTaskRepository;
