//! Placeholder interface used when no debug client is available
//!
//! It never starts a process and never connects. The shell still gets an
//! answer to statements and banner requests so it does not hang.

use crate::common::config::ProjectSettings;
use crate::common::Result;
use crate::events::Event;
use crate::wire::Request;

use super::capabilities::Capabilities;
use super::channel::ClientLink;
use super::translate::Direction;
use super::{DebuggerInterface, StartContext, StartOutcome};

pub const CLIENT_TYPE: &str = "None";

#[derive(Debug, Default)]
pub struct NoneInterface {
    events: Vec<Event>,
}

impl NoneInterface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DebuggerInterface for NoneInterface {
    fn client_type(&self) -> &'static str {
        CLIENT_TYPE
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::empty()
    }

    fn start_remote(&mut self, _ctx: &StartContext<'_>) -> StartOutcome {
        StartOutcome {
            networked: true,
            ..Default::default()
        }
    }

    fn start_remote_for_project(
        &mut self,
        ctx: &StartContext<'_>,
        _project: &ProjectSettings,
    ) -> StartOutcome {
        self.start_remote(ctx)
    }

    fn translate(&self, path: &str, _direction: Direction) -> String {
        path.to_string()
    }

    fn encode(&self, _request: &Request) -> Result<String> {
        Ok(String::new())
    }

    fn send(&mut self, request: &Request) -> Result<()> {
        match request {
            Request::Statement(_) => self.events.push(Event::Statement { more: false }),
            Request::Banner => self.events.push(Event::Banner {
                version: "No backend".to_string(),
                platform: String::new(),
                client: String::new(),
            }),
            other => tracing::trace!("No backend, dropping '{}' request", other.name()),
        }
        Ok(())
    }

    fn new_connection(&mut self, _link: Box<dyn ClientLink>) -> bool {
        false
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn flush(&mut self) {}

    fn shutdown(&mut self) -> bool {
        false
    }

    fn disconnected(&mut self) {}

    fn on_data(&mut self, _data: &[u8]) -> Vec<Event> {
        Vec::new()
    }

    fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}
