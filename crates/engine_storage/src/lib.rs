//! # engine_storage
//!
//! Pooled component storage for the entity-component engine.
//!
//! This crate provides:
//!
//! - [`Pool`] — block-allocated, free-list-recycled storage for one
//!   component type, each slot tagged with its owning entity.
//! - [`Registry`] — entity id lifecycle plus the directory of pools, routing
//!   component create/destroy/lookup to the right one.
//! - [`View`] — a query over entities holding a fixed combination of
//!   component types.
//! - [`StorageError`] — the misuse taxonomy (type contradiction, invalid
//!   entity usage) as typed errors.
//!
//! The engine is strictly single-threaded: no operation blocks, suspends,
//! or takes a lock, and [`Pool`] is neither `Send` nor `Sync`.

pub mod error;
pub mod pool;
pub mod registry;
pub mod view;

pub use error::StorageError;
pub use pool::Pool;
pub use registry::{DEFAULT_BLOCK_SIZE, Registry};
pub use view::View;
