//! # tether-core
//!
//! A debugger-agnostic target model. Each backend (an LLVM debugger, a GNU
//! debugger, a dynamic-instrumentation engine) is mirrored into one
//! hierarchical, path-addressed tree of objects, and clients drive any of them
//! through the same small set of capability-based commands.
//!
//! This crate provides:
//! - The object model and its single writer ([`model`])
//! - Capability traits and the per-object capability set ([`capability`])
//! - Asynchronous operations with cancellation ([`operation`])
//! - Observable execution state ([`async_state`])
//! - The command protocol ([`protocol`]) and breakpoint builder ([`breakpoints`])
//! - Backend adapters and an in-process loopback driver ([`backends`])
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use tether_core::backends::loopback::LoopbackDriver;
//! use tether_core::prelude::*;
//!
//! # let runtime = tokio::runtime::Runtime::new().unwrap();
//! # runtime.block_on(async {
//! let driver = Arc::new(LoopbackDriver::new());
//! let session = DebuggerSession::open(BackendKind::Lldb, driver, ModelConfig::default())?;
//!
//! let launcher: TargetPath = "Sessions[0]".parse()?;
//! let mut arguments = Arguments::new();
//! arguments.insert("args".to_string(), "echo hi".into());
//! session.protocol().launch(&launcher, arguments)?.await?;
//! # Ok::<(), ModelError>(())
//! # }).unwrap();
//! ```

pub mod async_state;
pub mod backends;
pub mod breakpoints;
pub mod capability;
pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod operation;
pub mod params;
pub mod prelude;
pub mod protocol;
pub mod session;
pub mod types;

pub use error::{ModelError, ModelResult};
pub use model::{ObjectModel, TargetObject};
pub use operation::Operation;
pub use session::DebuggerSession;
pub use types::{Address, ExecutionState, ProcessId, TargetPath};
