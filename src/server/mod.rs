//! Debug session manager
//!
//! [`DebugServer`] owns the active debugger interface, the breakpoint and
//! watchpoint registries and the client process. [`ServerRuntime`] drives
//! it from a tokio event loop: accepted sockets, client data, process
//! output and calls from the console all arrive as [`Inbound`] messages and
//! are handled one at a time.

mod manager;
pub mod runtime;
pub mod session;
pub mod sync;

pub use manager::{DebugOptions, DebugServer, HostApproval, ProgramOptions, UnittestOptions};
pub use runtime::{ServerHandle, ServerRuntime};
pub use session::SessionState;

use std::fmt;

use crate::events::OutputStream;

/// Identifies one accepted client connection
pub type ConnectionId = u64;

/// Work for the session event loop
pub enum Inbound {
    /// Bytes read from a client connection
    Data { conn: ConnectionId, bytes: Vec<u8> },
    /// A client connection was closed by the peer
    Disconnected { conn: ConnectionId },
    /// Output of the client process
    ProcessOutput { stream: OutputStream, text: String },
    /// The client process terminated
    ProcessExited { id: u64, status: Option<i32> },
    /// Run a closure against the server
    Call(Box<dyn FnOnce(&mut DebugServer) + Send>),
    /// Shut the session down and leave the event loop
    Stop,
}

impl fmt::Debug for Inbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inbound::Data { conn, bytes } => f
                .debug_struct("Data")
                .field("conn", conn)
                .field("len", &bytes.len())
                .finish(),
            Inbound::Disconnected { conn } => {
                f.debug_struct("Disconnected").field("conn", conn).finish()
            }
            Inbound::ProcessOutput { stream, text } => f
                .debug_struct("ProcessOutput")
                .field("stream", stream)
                .field("text", text)
                .finish(),
            Inbound::ProcessExited { id, status } => f
                .debug_struct("ProcessExited")
                .field("id", id)
                .field("status", status)
                .finish(),
            Inbound::Call(_) => write!(f, "Call(..)"),
            Inbound::Stop => write!(f, "Stop"),
        }
    }
}
