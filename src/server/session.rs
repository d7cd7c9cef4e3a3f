//! Session state and the part of the session shared with registry observers

use std::fmt;

use tokio::sync::mpsc;

use crate::common::Result;
use crate::events::Event;
use crate::interface::none::NoneInterface;
use crate::interface::DebuggerInterface;
use crate::wire::Request;

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No client process and no connection
    #[default]
    Idle,
    /// A client was started and is expected to connect
    InterfaceReady,
    /// A client is connected, no program is loaded
    Connected,
    /// A program is loaded under the debugger and stopped
    Debugging,
    /// A program is executing
    Running { debugging: bool },
}

impl SessionState {
    /// Breakpoints are live on the client
    pub fn is_debugging(&self) -> bool {
        matches!(self, SessionState::Debugging | SessionState::Running { debugging: true })
    }

    /// A program is loaded, stopped or not
    pub fn is_running(&self) -> bool {
        matches!(self, SessionState::Debugging | SessionState::Running { .. })
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::InterfaceReady => write!(f, "waiting for client"),
            SessionState::Connected => write!(f, "connected"),
            SessionState::Debugging => write!(f, "debugging"),
            SessionState::Running { debugging: true } => write!(f, "running (debugging)"),
            SessionState::Running { debugging: false } => write!(f, "running"),
        }
    }
}

/// Active interface, session state and event sink
///
/// Shared between the server and its registry observers. Never call into a
/// registry while holding the lock.
pub struct SessionCore {
    pub interface: Box<dyn DebuggerInterface>,
    pub state: SessionState,
    events: mpsc::UnboundedSender<Event>,
}

impl fmt::Debug for SessionCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCore")
            .field("client_type", &self.interface.client_type())
            .field("state", &self.state)
            .finish()
    }
}

impl SessionCore {
    pub fn new(events: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            interface: Box::new(NoneInterface::new()),
            state: SessionState::Idle,
            events,
        }
    }

    pub fn emit(&self, event: Event) {
        tracing::trace!(?event, "Session event");
        if self.events.send(event).is_err() {
            tracing::debug!("Event receiver dropped");
        }
    }

    /// Send a request and surface events the interface produced on its own
    pub fn send(&mut self, request: &Request) -> Result<()> {
        let result = self.interface.send(request);
        for event in self.interface.take_events() {
            self.emit(event);
        }
        result
    }

    /// Send requests only while breakpoints are live on the client
    pub fn send_if_debugging(&mut self, requests: &[Request]) {
        if !self.state.is_debugging() {
            return;
        }
        for request in requests {
            if let Err(e) = self.send(request) {
                tracing::debug!(error = %e, "Registry change not sent");
            }
        }
    }

    /// Replace the active interface
    pub fn replace_interface(&mut self, interface: Box<dyn DebuggerInterface>) {
        tracing::debug!(
            from = self.interface.client_type(),
            to = interface.client_type(),
            "Switching debugger interface"
        );
        self.interface = interface;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(!SessionState::Idle.is_running());
        assert!(!SessionState::Connected.is_debugging());
        assert!(SessionState::Debugging.is_debugging());
        assert!(SessionState::Running { debugging: true }.is_debugging());
        assert!(!SessionState::Running { debugging: false }.is_debugging());
        assert!(SessionState::Running { debugging: false }.is_running());
    }

    #[test]
    fn test_none_events_are_forwarded() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut core = SessionCore::new(tx);
        core.send(&Request::Statement("x".into())).unwrap();
        assert_eq!(rx.try_recv().unwrap(), Event::Statement { more: false });
    }

    #[test]
    fn test_send_if_debugging_suppressed_when_idle() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut core = SessionCore::new(tx);
        core.send_if_debugging(&[Request::Banner]);
        assert!(rx.try_recv().is_err());
        core.state = SessionState::Debugging;
        core.send_if_debugging(&[Request::Banner]);
        assert!(rx.try_recv().is_ok());
    }
}
