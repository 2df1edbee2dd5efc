//! Storage collaborator
//!
//! Trait-based persistence for targets, check history and alert history.
//!
//! ## Design
//!
//! - **Trait-based**: [`Storage`] allows swapping implementations
//! - **Async**: all operations are async for compatibility with Tokio
//! - **Explicit results**: "duplicate" and "not found" are domain results
//!   ([`backend::TargetInsert`], `bool`), never errors or exceptions
//! - **Concurrent-safe**: writes from independent target ticks may
//!   interleave freely; each tick's persistence commits on its own
//!
//! ## Backends
//!
//! - **SQLite** (default): embedded database, WAL mode
//! - **In-memory**: no persistence, for tests

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
pub mod sqlite;

pub use backend::{Storage, TargetInsert};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
