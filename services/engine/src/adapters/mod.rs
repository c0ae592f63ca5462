//! services/engine/src/adapters/mod.rs
//!
//! Concrete implementations of the core service ports.

pub mod assets;
pub mod fs_state;
pub mod generation;
pub mod memory;
pub mod page_index;
