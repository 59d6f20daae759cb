//! Discrete-event engine for Alembic.
//!
//! [`Engine`] owns an environment, its reactions, a [`Scheduler`] and a
//! [`DependencyGraph`], and repeatedly fires the earliest reaction,
//! recomputing only the reactions that depend on it. It can be driven in
//! lockstep with [`Engine::tick`], run to completion with [`Engine::run`],
//! moved to a background thread with [`Engine::spawn`], or run alongside
//! independent engines with [`run_batch`].
//!
//! External code steers a running engine through an [`EngineHandle`].
//! Commands are queued and applied only between steps.
//!
//! [`Scheduler`]: alembic_schedule::Scheduler
//! [`DependencyGraph`]: alembic_schedule::DependencyGraph

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod arena;
pub mod batched;
pub mod command;
pub mod config;
pub mod control;
pub mod engine;
pub mod metrics;
pub mod monitor;
pub mod status;
pub mod thread;
pub mod trace;

pub use batched::{run_batch, BatchError, BatchOutcome};
pub use command::{EngineView, Ticket};
pub use config::{BatchConfig, ConfigError, EngineConfig};
pub use control::EngineHandle;
pub use engine::{Engine, Progress};
pub use metrics::StepMetrics;
pub use monitor::{OutputMonitor, StepEvent};
pub use status::{StatusCell, StatusChange};
pub use thread::{EngineThread, EngineThreadError};
pub use trace::{Trace, TraceRecorder};
