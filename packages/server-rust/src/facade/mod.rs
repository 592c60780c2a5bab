//! Implementations of the operation facade.
//!
//! The handlers only depend on the [`Core`](crate::traits::Core) traits;
//! this module provides the in-memory backend used by the standalone
//! server binary and by end-to-end tests.

pub mod memory;

pub use memory::MemoryCore;
