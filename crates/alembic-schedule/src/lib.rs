//! Event scheduling and dependency tracking for Alembic.
//!
//! - [`Scheduler`]: priority queue of putative reaction times, with
//!   [`IndexedHeap`] (O(log n) update) and [`LinearScheduler`] (O(n) scan).
//! - [`DependencyGraph`]: which reactions must be recomputed when another
//!   one fires, maintained incrementally from declared influence sets.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod dependency;
pub mod scheduler;

pub use dependency::{DependencyError, DependencyGraph};
pub use scheduler::{IndexedHeap, LinearScheduler, Scheduler};
