//! Outgoing side of a debug client connection
//!
//! Requests issued before the client connected are queued and written in
//! order by [`Channel::flush`].

use std::collections::VecDeque;
use std::io;
use tracing::{debug, warn};

use crate::wire::tokens::REQUEST_SHUTDOWN;

/// Write half of an accepted client connection
pub trait ClientLink: Send {
    /// Queue text for writing; must not block on the peer
    fn write(&mut self, data: &str) -> io::Result<()>;

    /// Close the connection; further writes fail
    fn close(&mut self);
}

/// A client link plus the queue of requests waiting for it
#[derive(Default)]
pub struct Channel {
    link: Option<Box<dyn ClientLink>>,
    queue: VecDeque<String>,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("connected", &self.link.is_some())
            .field("queued", &self.queue.len())
            .finish()
    }
}

impl Channel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `link` for all further writes; refused while another link is
    /// attached
    pub fn attach(&mut self, link: Box<dyn ClientLink>) -> bool {
        if self.link.is_some() {
            return false;
        }
        self.link = Some(link);
        true
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Number of requests waiting for a connection
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Write now if connected, queue otherwise
    pub fn send(&mut self, text: String) {
        match self.link.as_mut() {
            Some(link) => {
                debug!("wire >>> {}", text.trim_end());
                if let Err(e) = link.write(&text) {
                    warn!(error = %e, "Write to debug client failed, dropping connection");
                    self.link = None;
                }
            }
            None => self.queue.push_back(text),
        }
    }

    /// Write everything queued while unconnected, oldest first
    pub fn flush(&mut self) {
        if self.link.is_none() {
            return;
        }
        while let Some(text) = self.queue.pop_front() {
            self.send(text);
        }
    }

    /// Ask the client to shut down, then close the connection
    ///
    /// Returns false when there was nothing to close.
    pub fn close(&mut self) -> bool {
        let Some(mut link) = self.link.take() else {
            return false;
        };
        debug!("wire >>> {}", REQUEST_SHUTDOWN);
        if let Err(e) = link.write(&format!("{}\n", REQUEST_SHUTDOWN)) {
            debug!(error = %e, "Shutdown request not delivered");
        }
        link.close();
        self.queue.clear();
        true
    }

    /// Forget a connection the peer already closed
    pub fn disconnected(&mut self) {
        self.link = None;
    }
}


#[cfg(test)]
mod tests {
    use super::memory::MemoryLink;
    use super::*;

    #[test]
    fn test_queue_until_connected() {
        let mut channel = Channel::new();
        channel.send(">Step<\n".into());
        channel.send(">Continue<0\n".into());
        assert_eq!(channel.queued(), 2);

        let link = MemoryLink::new();
        assert!(channel.attach(Box::new(link.clone())));
        assert!(link.lines().is_empty());

        channel.flush();
        assert_eq!(link.lines(), vec![">Step<", ">Continue<0"]);
        assert_eq!(channel.queued(), 0);
    }

    #[test]
    fn test_second_link_refused() {
        let mut channel = Channel::new();
        assert!(channel.attach(Box::new(MemoryLink::new())));
        assert!(!channel.attach(Box::new(MemoryLink::new())));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut channel = Channel::new();
        let link = MemoryLink::new();
        channel.attach(Box::new(link.clone()));

        assert!(channel.close());
        assert!(!channel.close());

        assert_eq!(link.lines(), vec![">Shutdown<"]);
        assert!(link.is_closed());
        assert!(!channel.is_connected());
    }

    #[test]
    fn test_write_failure_drops_link() {
        let mut channel = Channel::new();
        let link = MemoryLink::new();
        channel.attach(Box::new(link.clone()));
        *link.closed.lock() = true;

        channel.send(">Step<\n".into());
        assert!(!channel.is_connected());
    }
}
