//! Per-language debugger interfaces
//!
//! A debugger interface knows how to start the debug client for one
//! language, which requests that client understands and how to read its
//! responses. The session manager talks to exactly one interface at a time.

pub mod capabilities;
pub mod channel;
mod client;
pub mod decode;
pub mod dispatch;
pub mod languages;
pub mod none;
pub mod python;
pub mod ruby;
pub mod translate;

pub use capabilities::Capabilities;
pub use channel::ClientLink;
pub use languages::{LanguageEntry, LANGUAGES};
pub use translate::{Direction, PathTranslator};

use crate::common::config::{Config, ProjectSettings};
use crate::common::Result;
use crate::events::Event;
use crate::process::{ClientProcess, Launcher};
use crate::wire::Request;

/// What an interface needs to start its debug client
pub struct StartContext<'a> {
    /// Port the server listens on
    pub port: u16,
    pub run_in_console: bool,
    /// Address a client on this machine connects back to
    pub local_host: String,
    /// Address a client on another machine connects back to
    pub remote_host: String,
    pub config: &'a Config,
    pub launcher: &'a dyn Launcher,
}

/// Result of starting a debug client
///
/// Start failures are not errors: `process` stays empty and `notification`
/// says why.
#[derive(Debug, Default)]
pub struct StartOutcome {
    pub process: Option<ClientProcess>,
    /// Whether the client talks to us over the network
    pub networked: bool,
    /// Interpreter of a locally started client, empty otherwise
    pub interpreter: String,
    pub notification: Option<String>,
}

impl StartOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            networked: true,
            notification: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Options fixed when an interface is created
#[derive(Debug, Clone, Default)]
pub struct InterfaceOptions {
    /// Clients are started externally and connect on their own
    pub passive: bool,
    /// Translation used in passive mode, where no start configures one
    pub translator: PathTranslator,
}

/// A language specific debug client driver
pub trait DebuggerInterface: Send {
    /// Client type name, e.g. `Python3`
    fn client_type(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// Start the debug client with the global settings
    fn start_remote(&mut self, ctx: &StartContext<'_>) -> StartOutcome;

    /// Start the debug client with project settings
    fn start_remote_for_project(
        &mut self,
        ctx: &StartContext<'_>,
        project: &ProjectSettings,
    ) -> StartOutcome;

    /// Translate a file name between the local and the client's view
    fn translate(&self, path: &str, direction: Direction) -> String;

    /// Wire form of a request; empty when the client ignores it
    fn encode(&self, request: &Request) -> Result<String>;

    /// Send a request, queueing it while unconnected
    fn send(&mut self, request: &Request) -> Result<()>;

    /// Adopt a client connection; false if one is already attached
    fn new_connection(&mut self, link: Box<dyn ClientLink>) -> bool;

    fn is_connected(&self) -> bool;

    /// Write requests queued before the client connected
    fn flush(&mut self);

    /// Ask the client to shut down and drop the connection
    ///
    /// Returns false when there was no connection.
    fn shutdown(&mut self) -> bool;

    /// The peer closed the connection
    fn disconnected(&mut self);

    /// Feed bytes received from the client
    fn on_data(&mut self, data: &[u8]) -> Vec<Event>;

    /// Events the interface produced itself while handling requests
    fn take_events(&mut self) -> Vec<Event> {
        Vec::new()
    }
}
