//! Remote debugger session manager
//!
//! Starts debug clients for Python and Ruby programs, speaks their
//! line based wire protocol and keeps breakpoints and watch expressions
//! in sync with them while a program is debugged.

pub mod cli;
pub mod commands;
pub mod common;
pub mod events;
pub mod interface;
pub mod process;
pub mod registry;
pub mod server;
pub mod wire;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use events::Event;
pub use server::{DebugServer, ServerHandle, ServerRuntime};
