//! Storage backends for AnyBlok.
//!
//! The registry is bound to a [`Connection`](anyblok_core::Connection). This
//! crate provides [`MemoryConnection`], a transactional in-process store that
//! enforces column types, NOT NULL, primary key, unique and foreign key
//! constraints, and serves named counters.

pub mod memory;

pub use memory::{MemoryConfig, MemoryConnection};
