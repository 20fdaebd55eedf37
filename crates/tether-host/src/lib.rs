//! # tether-host
//!
//! Host scheduler integration for tether.
//!
//! A host application runs work on its own task scheduler and shows progress
//! and a status line per task. This crate adapts tether operations to that
//! world:
//! - [`BackgroundCommand`] wraps an operation-producing closure as a
//!   cancellable, progress-reporting task
//! - [`HostExecutor`] offers plain `execute(work)` on top of the scheduler
//! - [`TokioScheduler`] is a ready-made scheduler on a tokio runtime
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use tether_core::operation::Operation;
//! use tether_host::{run_async, HostConfig, TaskFlags, TokioScheduler};
//!
//! # let runtime = tokio::runtime::Runtime::new().unwrap();
//! # runtime.block_on(async {
//! let (scheduler, mut reports) = TokioScheduler::current(HostConfig::default())?;
//! let (command, _monitor) = run_async(&scheduler, Arc::new(()), "resume", TaskFlags::command(), |_, _| {
//!     Operation::ready(())
//! })?;
//!
//! let report = reports.recv().await.unwrap();
//! assert_eq!(report.name, "resume");
//! assert_eq!(command.status(), None);
//! # Ok::<(), tether_core::error::ModelError>(())
//! # }).unwrap();
//! ```

pub mod background;
pub mod config;
pub mod executor;
pub mod monitor;
pub mod scheduler;

pub use background::{run_async, BackgroundCommand, STATUS_CANCELLED, STATUS_INTERRUPTED};
pub use config::HostConfig;
pub use executor::HostExecutor;
pub use monitor::{Progress, TaskFlags, TaskMonitor};
pub use scheduler::{HostTask, TaskOutcome, TaskReport, TaskScheduler, TokioScheduler};
