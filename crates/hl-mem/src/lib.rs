//! Memory management for the hacker-lang runtime and compiler.
//!
//! Two independent allocators:
//!
//! - **Generational GC** ([`gc`], feature `gc`): young bump buffer with
//!   copying minor collections, old generation reclaimed by mark-and-sweep.
//! - **Arena** ([`arena`], feature `arena`): chunked bump allocator with
//!   O(chunks) reset and savepoints for speculative parsing.
//!
//! Built on top of the arena: string interning ([`interner`], feature
//! `string-interner`) and per-phase arenas ([`factory`], feature
//! `arena-factory`). The `c-abi` feature exports the collector under its
//! `gc_*` C symbol names.
//!
//! Both allocators are single-threaded; give every thread its own instance.

pub mod align;
pub mod error;

#[cfg(feature = "gc")]
pub mod config;

#[cfg(feature = "gc")]
pub mod gc;

#[cfg(feature = "arena")]
pub mod arena;

#[cfg(feature = "arena-factory")]
pub mod factory;

#[cfg(feature = "string-interner")]
pub mod interner;

#[cfg(feature = "string-interner")]
pub mod symbol;

#[cfg(feature = "c-abi")]
pub mod ffi;

pub use error::{Error, Result};

#[cfg(feature = "gc")]
pub use config::{GcConfig, PretenurePolicy};

#[cfg(feature = "gc")]
pub use gc::{Gc, GcPtr, GcStats, Generation};

#[cfg(feature = "arena")]
pub use arena::{Arena, ArenaStats, Savepoint};

#[cfg(feature = "string-interner")]
pub use interner::StringInterner;

#[cfg(feature = "string-interner")]
pub use symbol::Symbol;
