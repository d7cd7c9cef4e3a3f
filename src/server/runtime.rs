//! Event loop driving the debug server
//!
//! The loop owns the [`DebugServer`] and the TCP listener. Every accepted
//! socket gets a reader task feeding [`Inbound::Data`] into the loop and a
//! writer task draining an unbounded channel, so the server never blocks on
//! a slow client.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::events::Event;
use crate::interface::ClientLink;
use crate::process::SystemLauncher;

use super::{ConnectionId, DebugServer, Inbound};

const READ_BUFFER_SIZE: usize = 8192;

/// Address to listen on for a configured network interface
pub fn listen_address(network_interface: &str) -> Result<IpAddr> {
    match network_interface {
        "all" => Ok(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
        "allv6" => Ok(IpAddr::V6(Ipv6Addr::UNSPECIFIED)),
        address => address.parse().map_err(|_| {
            Error::Config(format!("invalid network interface '{}'", network_interface))
        }),
    }
}

/// Write half of an accepted socket
struct TcpLink {
    writer: Option<mpsc::UnboundedSender<String>>,
    reader: AbortHandle,
}

impl ClientLink for TcpLink {
    fn write(&mut self, data: &str) -> io::Result<()> {
        let writer = self
            .writer
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "connection closed"))?;
        writer
            .send(data.to_string())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "connection closed"))
    }

    fn close(&mut self) {
        // the writer task flushes what is queued, then shuts the socket down
        self.writer = None;
        self.reader.abort();
    }
}

impl Drop for TcpLink {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(
    conn: ConnectionId,
    mut reader: OwnedReadHalf,
    inbound: mpsc::UnboundedSender<Inbound>,
) {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let bytes = buf[..n].to_vec();
                if inbound.send(Inbound::Data { conn, bytes }).is_err() {
                    return;
                }
            }
            Err(e) => {
                debug!(conn, error = %e, "Read from debug client failed");
                break;
            }
        }
    }
    let _ = inbound.send(Inbound::Disconnected { conn });
}

async fn write_loop(mut writer: OwnedWriteHalf, mut queue: mpsc::UnboundedReceiver<String>) {
    while let Some(text) = queue.recv().await {
        if let Err(e) = writer.write_all(text.as_bytes()).await {
            debug!(error = %e, "Write to debug client failed");
            break;
        }
    }
    let _ = writer.shutdown().await;
}

/// Submits work to a running [`ServerRuntime`]
#[derive(Debug, Clone)]
pub struct ServerHandle {
    inbound: mpsc::UnboundedSender<Inbound>,
}

impl ServerHandle {
    /// Run `f` on the event loop and return its result
    pub async fn call<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut DebugServer) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.inbound
            .send(Inbound::Call(Box::new(move |server| {
                let _ = tx.send(f(server));
            })))
            .map_err(|_| Error::Internal("debug server is not running".to_string()))?;
        rx.await
            .map_err(|_| Error::Internal("debug server stopped".to_string()))
    }

    /// Ask the event loop to shut the session down and return
    pub fn stop(&self) {
        let _ = self.inbound.send(Inbound::Stop);
    }
}

/// Listener plus debug server, run by [`ServerRuntime::run`]
pub struct ServerRuntime {
    server: DebugServer,
    listener: TcpListener,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    next_connection: ConnectionId,
}

impl ServerRuntime {
    /// Bind the listener and create the debug server
    ///
    /// Passive mode listens on the configured passive port, otherwise on an
    /// ephemeral port handed to spawned clients.
    pub async fn bind(config: Config, events: mpsc::UnboundedSender<Event>) -> Result<Self> {
        let address = listen_address(&config.server.network_interface)?;
        let port = if config.server.passive {
            config.server.passive_port
        } else {
            0
        };
        let listener = TcpListener::bind(SocketAddr::new(address, port))
            .await
            .map_err(|source| Error::Bind {
                address: SocketAddr::new(address, port).to_string(),
                source,
            })?;
        let port = listener.local_addr()?.port();
        info!(%address, port, "Debug server listening");

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let launcher = SystemLauncher::new(
            inbound_tx.clone(),
            Duration::from_millis(config.timeouts.process_kill_ms),
        );
        let server = DebugServer::new(config, port, Box::new(launcher), events);

        Ok(Self {
            server,
            listener,
            inbound_tx,
            inbound_rx,
            next_connection: 1,
        })
    }

    pub fn port(&self) -> u16 {
        self.server.port()
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            inbound: self.inbound_tx.clone(),
        }
    }

    /// Access the server before the loop starts
    pub fn server_mut(&mut self) -> &mut DebugServer {
        &mut self.server
    }

    /// Run until [`ServerHandle::stop`] is called
    pub async fn run(mut self) -> Result<()> {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.adopt(stream, peer),
                    Err(e) => warn!(error = %e, "Accept failed"),
                },
                inbound = self.inbound_rx.recv() => match inbound {
                    Some(Inbound::Stop) | None => break,
                    Some(inbound) => self.server.handle_inbound(inbound),
                },
            }
        }

        self.server.shutdown();
        info!("Debug server stopped");
        Ok(())
    }

    fn adopt(&mut self, stream: TcpStream, peer: SocketAddr) {
        let conn = self.next_connection;
        self.next_connection += 1;
        let peer = peer.ip().to_canonical().to_string();
        debug!(conn, peer = %peer, "Incoming connection");
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Could not disable Nagle");
        }

        let (reader, writer) = stream.into_split();
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(writer, queue_rx));
        let reader = tokio::spawn(read_loop(conn, reader, self.inbound_tx.clone()));

        let link = TcpLink {
            writer: Some(queue_tx),
            reader: reader.abort_handle(),
        };
        if !self.server.accept_connection(conn, &peer, Box::new(link)) {
            debug!(conn, "Connection not adopted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::SessionState;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::time::timeout;

    fn passive_config() -> Config {
        let mut config = Config::default();
        config.server.passive = true;
        config.server.passive_port = 0;
        config
    }

    #[test]
    fn test_listen_address() {
        assert_eq!(listen_address("all").unwrap(), IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(listen_address("allv6").unwrap(), IpAddr::V6(Ipv6Addr::UNSPECIFIED));
        assert_eq!(
            listen_address("127.0.0.1").unwrap(),
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        );
        assert!(matches!(listen_address("eth0"), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_passive_client_round_trip() {
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let runtime = ServerRuntime::bind(passive_config(), events_tx).await.unwrap();
        let port = runtime.port();
        let handle = runtime.handle();
        let task = tokio::spawn(runtime.run());

        let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();

        let first = timeout(Duration::from_secs(5), lines.next_line())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.as_deref(), Some(">Capabilities<"));

        write
            .write_all(b">PassiveStartup</tmp/app.py|1\n")
            .await
            .unwrap();
        let started = timeout(Duration::from_secs(5), async {
            while let Some(event) = events.recv().await {
                if let Event::PassiveDebugStarted { file, .. } = event {
                    return file;
                }
            }
            String::new()
        })
        .await
        .unwrap();
        assert_eq!(started, "/tmp/app.py");

        let state = handle.call(|server| server.state()).await.unwrap();
        assert_eq!(state, SessionState::Debugging);

        handle.stop();
        timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_call_after_stop_fails() {
        let (events_tx, _events) = mpsc::unbounded_channel();
        let runtime = ServerRuntime::bind(passive_config(), events_tx).await.unwrap();
        let handle = runtime.handle();
        let task = tokio::spawn(runtime.run());
        handle.stop();
        task.await.unwrap().unwrap();
        assert!(handle.call(|server| server.port()).await.is_err());
    }
}
