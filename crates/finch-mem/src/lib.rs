//! `Finch` memory management infrastructure
//!
//! This crate provides the arena that backs long-lived runtime metadata.
//! Class descriptors are allocated here once and never freed, which gives
//! the object runtime stable `'static` references to every class.

pub mod arena;

pub use arena::{ArenaAllocError, ArenaStats, GlobalArena, global_arena};
