//! # Types
//!
//! Backend-neutral value types shared by the model, the protocol and the
//! adapters.

pub mod address;
pub mod ids;
pub mod path;
pub mod state;

pub use address::Address;
pub use ids::{ProcessId, ThreadId};
pub use path::{PathSegment, TargetPath};
pub use state::{Endian, ExecutionState, TargetEnvironment};
