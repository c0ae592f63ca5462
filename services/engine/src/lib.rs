//! services/engine/src/lib.rs
//!
//! The engine service: pagination, read-progress tracking, reference-text
//! retrieval and interpretation requests over the static scripture corpus.

pub mod adapters;
pub mod config;
pub mod corpus;
pub mod error;
pub mod interpret;
pub mod pages;
pub mod progress;
pub mod references;
pub mod web;

#[cfg(test)]
pub mod testing;
