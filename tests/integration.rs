//! End-to-end integration tests for the debug server
//!
//! These tests run a real [`ServerRuntime`] on a local port and let the
//! `mock_client` binary play the debug client:
//! 1. The server spawns mock_client as the "Python3 interpreter"
//! 2. mock_client connects back and executes a text file line by line
//! 3. The tests drive the session and check the events it produces

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use debug_server::common::config::{ClientConfig, Config};
use debug_server::registry::Breakpoint;
use debug_server::server::session::SessionState;
use debug_server::server::{DebugOptions, ProgramOptions};
use debug_server::wire::request::SCOPE_LOCAL;
use debug_server::{Event, ServerHandle, ServerRuntime};
use tempfile::TempDir;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio::time::timeout;

const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Test context with a program file and a running server
struct TestContext {
    _dir: TempDir,
    program: PathBuf,
    handle: ServerHandle,
    port: u16,
    events: UnboundedReceiver<Event>,
    server: JoinHandle<debug_server::Result<()>>,
}

fn mock_client() -> &'static str {
    env!("CARGO_BIN_EXE_mock_client")
}

fn write_program(dir: &Path, lines: usize) -> PathBuf {
    let program = dir.join("app.py");
    let text: Vec<String> = (1..=lines).map(|i| format!("step_{} = {}", i, i)).collect();
    fs::write(&program, text.join("\n") + "\n").expect("Failed to write program");
    program
}

fn client_config(dir: &Path) -> Config {
    let client_script = dir.join("DebugClient.py");
    fs::write(&client_script, "# debug client\n").expect("Failed to write client script");

    let mut config = Config::default();
    config.clients.insert(
        "python3".to_string(),
        ClientConfig {
            interpreter: mock_client().to_string(),
            client_script: Some(client_script),
            redirect: true,
        },
    );
    config
}

impl TestContext {
    /// Bind a server; `setup` runs on it before the event loop starts
    async fn start<F>(passive: bool, setup: F) -> Self
    where
        F: FnOnce(&mut debug_server::DebugServer, &Path),
    {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let program = write_program(dir.path(), 6);
        let mut config = client_config(dir.path());
        if passive {
            config.server.passive = true;
            config.server.passive_port = 0;
        }

        let (events_tx, events) = mpsc::unbounded_channel();
        let mut runtime = ServerRuntime::bind(config, events_tx)
            .await
            .expect("Failed to bind debug server");
        setup(runtime.server_mut(), &program);

        let port = runtime.port();
        let handle = runtime.handle();
        let server = tokio::spawn(runtime.run());
        Self {
            _dir: dir,
            program,
            handle,
            port,
            events,
            server,
        }
    }

    fn program(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Wait for the first event matching `pred`, skipping others
    async fn wait_for<F>(&mut self, what: &str, pred: F) -> Event
    where
        F: Fn(&Event) -> bool,
    {
        let result = timeout(EVENT_TIMEOUT, async {
            while let Some(event) = self.events.recv().await {
                if pred(&event) {
                    return Some(event);
                }
            }
            None
        })
        .await;
        match result {
            Ok(Some(event)) => event,
            Ok(None) => panic!("Event stream closed while waiting for {}", what),
            Err(_) => panic!("Timed out waiting for {}", what),
        }
    }

    async fn state(&self) -> SessionState {
        self.handle.call(|s| s.state()).await.expect("Server gone")
    }

    async fn stop(self) {
        self.handle.stop();
        timeout(EVENT_TIMEOUT, self.server)
            .await
            .expect("Server did not stop")
            .expect("Server task panicked")
            .expect("Server failed");
    }
}

fn python3() -> ProgramOptions {
    ProgramOptions {
        client_type: Some("Python3".to_string()),
        ..Default::default()
    }
}

fn is_line(line: u32) -> impl Fn(&Event) -> bool {
    move |e| matches!(e, Event::LineReached { line: l, .. } if *l == line)
}

#[tokio::test]
async fn test_debug_stops_at_breakpoint() {
    let mut ctx = TestContext::start(false, |server, program| {
        let file = program.to_string_lossy().into_owned();
        server
            .breakpoints_mut()
            .add(Breakpoint::new(file.clone(), 4))
            .unwrap();
        server
            .remote_load(&file, &python3(), &DebugOptions::default())
            .unwrap();
    })
    .await;

    let event = ctx.wait_for("breakpoint hit", is_line(4)).await;
    if let Event::LineReached { file, .. } = event {
        assert_eq!(file, ctx.program());
    }
    assert_eq!(ctx.state().await, SessionState::Debugging);

    ctx.handle
        .call(|s| s.remote_client_variables(SCOPE_LOCAL, Vec::new(), 0))
        .await
        .unwrap()
        .unwrap();
    let event = ctx
        .wait_for("local variables", |e| matches!(e, Event::Variables { .. }))
        .await;
    let Event::Variables { scope, variables } = event else {
        unreachable!()
    };
    assert_eq!(scope, i64::from(SCOPE_LOCAL));
    assert!(variables.iter().any(|v| v.name == "line" && v.value == "4"));

    ctx.handle
        .call(|s| s.remote_step())
        .await
        .unwrap()
        .unwrap();
    ctx.wait_for("step to line 5", is_line(5)).await;

    ctx.handle
        .call(|s| s.remote_continue(false))
        .await
        .unwrap()
        .unwrap();
    let exit = ctx
        .wait_for("program exit", |e| matches!(e, Event::Exit { .. }))
        .await;
    assert!(matches!(exit, Event::Exit { status: 0 }));
    assert_eq!(ctx.state().await, SessionState::InterfaceReady);

    ctx.stop().await;
}

#[tokio::test]
async fn test_temporary_breakpoint_is_removed_on_hit() {
    let mut ctx = TestContext::start(false, |server, program| {
        let file = program.to_string_lossy().into_owned();
        let mut bp = Breakpoint::new(file.clone(), 3);
        bp.temporary = true;
        server.breakpoints_mut().add(bp).unwrap();
        server
            .remote_load(&file, &python3(), &DebugOptions::default())
            .unwrap();
    })
    .await;

    let cleared = ctx
        .wait_for("breakpoint cleared", |e| matches!(e, Event::ClearBreak { .. }))
        .await;
    assert!(matches!(cleared, Event::ClearBreak { line: 3, .. }));
    ctx.wait_for("breakpoint hit", is_line(3)).await;

    let remaining = ctx.handle.call(|s| s.breakpoints().len()).await.unwrap();
    assert_eq!(remaining, 0);

    ctx.stop().await;
}

#[tokio::test]
async fn test_breakpoint_added_while_debugging() {
    let mut ctx = TestContext::start(false, |server, program| {
        let file = program.to_string_lossy().into_owned();
        let debug = DebugOptions {
            auto_continue: false,
            ..Default::default()
        };
        server.remote_load(&file, &python3(), &debug).unwrap();
    })
    .await;

    ctx.wait_for("first line", is_line(1)).await;

    let file = ctx.program();
    ctx.handle
        .call(move |s| s.breakpoints_mut().add(Breakpoint::new(file, 5)))
        .await
        .unwrap()
        .unwrap();
    ctx.handle
        .call(|s| s.remote_continue(false))
        .await
        .unwrap()
        .unwrap();
    ctx.wait_for("new breakpoint hit", is_line(5)).await;

    ctx.stop().await;
}

#[tokio::test]
async fn test_run_reports_output_and_exit() {
    let mut ctx = TestContext::start(false, |server, program| {
        let file = program.to_string_lossy().into_owned();
        server.remote_run(&file, &python3()).unwrap();
    })
    .await;

    let output = ctx
        .wait_for("program output", |e| {
            matches!(e, Event::Output { text } if text.starts_with("Running"))
        })
        .await;
    if let Event::Output { text } = output {
        assert!(text.contains("app.py"));
    }
    ctx.wait_for("program exit", |e| matches!(e, Event::Exit { status: 0 }))
        .await;
    assert_eq!(ctx.state().await, SessionState::InterfaceReady);

    ctx.stop().await;
}

#[tokio::test]
async fn test_passive_client_session() {
    let mut ctx = TestContext::start(true, |_, _| {}).await;

    let mut client = tokio::process::Command::new(mock_client())
        .arg("--passive")
        .arg(&ctx.program)
        .arg(ctx.port.to_string())
        .arg("127.0.0.1")
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to start mock client");

    let started = ctx
        .wait_for("passive startup", |e| {
            matches!(e, Event::PassiveDebugStarted { .. })
        })
        .await;
    if let Event::PassiveDebugStarted { file, exceptions } = started {
        assert_eq!(file, ctx.program());
        assert!(!exceptions);
    }
    ctx.wait_for("first line", is_line(1)).await;
    assert_eq!(ctx.state().await, SessionState::Debugging);

    ctx.handle
        .call(|s| s.remote_step_over())
        .await
        .unwrap()
        .unwrap();
    ctx.wait_for("second line", is_line(2)).await;

    ctx.handle
        .call(|s| s.remote_step_quit())
        .await
        .unwrap()
        .unwrap();
    ctx.wait_for("session closed", |e| matches!(e, Event::PassiveSessionClosed))
        .await;
    ctx.wait_for("program exit", |e| matches!(e, Event::Exit { status: 1 }))
        .await;

    let status = timeout(EVENT_TIMEOUT, client.wait())
        .await
        .expect("Mock client did not exit")
        .expect("Mock client wait failed");
    assert!(status.success());

    ctx.stop().await;
}
