//! Ruby debug client interface
//!
//! The Ruby client has no thread support, no call tracing and none of the
//! coverage, profiling or unit test machinery.

use crate::common::config::ProjectSettings;
use crate::common::{Error, Result};
use crate::events::Event;
use crate::wire::tokens::*;
use crate::wire::Request;

use super::capabilities::Capabilities;
use super::channel::ClientLink;
use super::client::{ClientCore, ClientSettings};
use super::translate::Direction;
use super::{DebuggerInterface, InterfaceOptions, StartContext, StartOutcome};

pub const CLIENT_TYPE: &str = "Ruby";

pub const EXTENSIONS: &[&str] = &[".rb"];

/// Responses a Ruby client sends
pub const RUBY_TOKENS: &[&str] = &[
    RESPONSE_LINE,
    RESPONSE_VARIABLES,
    RESPONSE_VARIABLE,
    RESPONSE_OK,
    RESPONSE_CONTINUE,
    RESPONSE_EXCEPTION,
    RESPONSE_SYNTAX,
    RESPONSE_EXIT,
    RESPONSE_CLEAR_BREAK,
    RESPONSE_CLEAR_WATCH,
    RESPONSE_BANNER,
    RESPONSE_CAPABILITIES,
    RESPONSE_COMPLETION,
    PASSIVE_STARTUP,
];

pub const CAPABILITIES: Capabilities = Capabilities::HAS_DEBUGGER
    .union(Capabilities::HAS_SHELL)
    .union(Capabilities::HAS_INTERPRETER)
    .union(Capabilities::HAS_COMPLETER);

#[derive(Debug)]
pub struct RubyInterface {
    core: ClientCore,
}

impl RubyInterface {
    pub fn new(options: &InterfaceOptions) -> Result<Self> {
        Ok(Self {
            core: ClientCore::new(CLIENT_TYPE, RUBY_TOKENS, CAPABILITIES, options)?,
        })
    }
}

impl DebuggerInterface for RubyInterface {
    fn client_type(&self) -> &'static str {
        CLIENT_TYPE
    }

    fn capabilities(&self) -> Capabilities {
        self.core.capabilities()
    }

    fn start_remote(&mut self, ctx: &StartContext<'_>) -> StartOutcome {
        let settings = ClientSettings::global(CLIENT_TYPE, ctx);
        self.core.start(ctx, settings)
    }

    fn start_remote_for_project(
        &mut self,
        ctx: &StartContext<'_>,
        project: &ProjectSettings,
    ) -> StartOutcome {
        let settings = ClientSettings::project(CLIENT_TYPE, ctx, project);
        self.core.start(ctx, settings)
    }

    fn translate(&self, path: &str, direction: Direction) -> String {
        self.core.translate(path, direction)
    }

    fn encode(&self, request: &Request) -> Result<String> {
        match request {
            Request::Coverage { .. }
            | Request::Profile { .. }
            | Request::UtPrepare { .. }
            | Request::UtRun
            | Request::UtStop => Err(Error::unsupported(request.name(), CLIENT_TYPE)),
            Request::ThreadList
            | Request::ThreadSet(_)
            | Request::CallTrace(_)
            | Request::ForkMode { .. }
            | Request::ForkTo { .. } => Ok(String::new()),
            _ => Ok(self.core.encode_translated(request)),
        }
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
