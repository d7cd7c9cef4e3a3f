//! Python debug client interface
//!
//! Python 2 and Python 3 clients speak the full protocol: threads, call
//! tracing, fork negotiation, coverage, profiling and unit tests.

use crate::common::config::ProjectSettings;
use crate::common::Result;
use crate::events::Event;
use crate::wire::tokens::RESPONSE_TOKENS;
use crate::wire::Request;

use super::capabilities::Capabilities;
use super::channel::ClientLink;
use super::client::{ClientCore, ClientSettings};
use super::translate::Direction;
use super::{DebuggerInterface, InterfaceOptions, StartContext, StartOutcome};

pub const PYTHON2: &str = "Python2";
pub const PYTHON3: &str = "Python3";

pub const PYTHON2_EXTENSIONS: &[&str] = &[".py", ".pyw", ".py2", ".pyw2", ".ptl"];
pub const PYTHON3_EXTENSIONS: &[&str] = &[".py", ".pyw", ".py3", ".pyw3"];

#[derive(Debug)]
pub struct PythonInterface {
    core: ClientCore,
}

impl PythonInterface {
    /// Interface for `client_type`, either [`PYTHON2`] or [`PYTHON3`]
    pub fn new(client_type: &'static str, options: &InterfaceOptions) -> Result<Self> {
        Ok(Self {
            core: ClientCore::new(client_type, RESPONSE_TOKENS, Capabilities::HAS_ALL, options)?,
        })
    }
}

impl DebuggerInterface for PythonInterface {
    fn client_type(&self) -> &'static str {
        self.core.client_type()
    }

    fn capabilities(&self) -> Capabilities {
        self.core.capabilities()
    }

    fn start_remote(&mut self, ctx: &StartContext<'_>) -> StartOutcome {
        let settings = ClientSettings::global(self.core.client_type(), ctx);
        self.core.start(ctx, settings)
    }

    fn start_remote_for_project(
        &mut self,
        ctx: &StartContext<'_>,
        project: &ProjectSettings,
    ) -> StartOutcome {
        let settings = ClientSettings::project(self.core.client_type(), ctx, project);
        self.core.start(ctx, settings)
    }

    fn translate(&self, path: &str, direction: Direction) -> String {
        self.core.translate(path, direction)
    }

    fn encode(&self, request: &Request) -> Result<String> {
        Ok(self.core.encode_translated(request))
    }

    fn send(&mut self, request: &Request) -> Result<()> {
        let text = self.encode(request)?;
        self.core.send_encoded(request, text);
        Ok(())
    }

    fn new_connection(&mut self, link: Box<dyn ClientLink>) -> bool {
        self.core.new_connection(link)
    }

    fn is_connected(&self) -> bool {
        self.core.is_connected()
    }

    fn flush(&mut self) {
        self.core.flush()
    }

    fn shutdown(&mut self) -> bool {
        self.core.shutdown()
    }

    fn disconnected(&mut self) {
        self.core.disconnected()
    }

    fn on_data(&mut self, data: &[u8]) -> Vec<Event> {
        self.core.on_data(data)
    }
}
