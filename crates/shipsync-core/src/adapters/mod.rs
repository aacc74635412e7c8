//! # Infrastructure Adapters
//!
//! Concrete implementations of the [`OrderStore`](crate::order::OrderStore)
//! and [`PayloadBuffer`](crate::buffer::PayloadBuffer) contracts.
//!
//! The in-memory adapters back tests and development; the filesystem
//! adapters provide single-node durability with atomic tmp-file + rename
//! writes. A database-backed order store would slot in at the same seam.

mod filesystem_buffer;
mod filesystem_order_store;
mod memory_buffer;
mod memory_order_store;

pub use filesystem_buffer::FilesystemPayloadBuffer;
pub use filesystem_order_store::FilesystemOrderStore;
pub use memory_buffer::InMemoryPayloadBuffer;
pub use memory_order_store::InMemoryOrderStore;
