//! Storage for the relq job queue.
//!
//! [`AtomicStore`] is the contract the engine runs against. Two stores ship
//! with the crate: [`MemoryStore`] for tests and embedding, and
//! [`SurrealStore`] on top of SurrealDB.
//!
//! # Features
//!
//! - `memory` (default): Use in-memory SurrealDB storage
//! - `rocksdb`: Use RocksDB for persistent file-based storage

mod clock;
mod connection;
mod memory;
mod schema;
mod store;
mod surreal;
pub mod repositories;

pub use clock::{Clock, ManualClock, SystemClock};
pub use connection::{Database, DbConfig, connect};
pub use memory::MemoryStore;
pub use schema::init_schema;
pub use store::{AtomicStore, Claimable, Commit, StoreError, Versioned, Write};
pub use surreal::SurrealStore;
