//! The debug session manager
//!
//! Starts debug clients, accepts their connections, forwards user requests
//! and turns client responses into session events. Breakpoints and watch
//! expressions are mirrored onto the client while a program is debugged.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::common::config::Config;
use crate::common::paths::{absolute, local_hostname};
use crate::common::Result;
use crate::events::Event;
use crate::interface::none::{self, NoneInterface};
use crate::interface::{
    languages, Capabilities, ClientLink, DebuggerInterface, InterfaceOptions, PathTranslator,
    StartContext, LANGUAGES,
};
use crate::process::launch::parse_environment;
use crate::process::{ClientProcess, Launcher};
use crate::registry::{split_condition, Breakpoint, BreakpointKey, Registry, Watchpoint};
use crate::wire::request::{SCOPE_GLOBAL, SCOPE_LOCAL};
use crate::wire::Request;

use super::session::{SessionCore, SessionState};
use super::sync;
use super::{ConnectionId, Inbound};

/// Asks whether a connection from a host outside the allow list is accepted
pub trait HostApproval: Send {
    fn approve(&mut self, peer: &str) -> bool;
}

impl<F> HostApproval for F
where
    F: FnMut(&str) -> bool + Send,
{
    fn approve(&mut self, peer: &str) -> bool {
        self(peer)
    }
}

/// How to start a program, shared by load, run, coverage and profile
#[derive(Debug, Clone, Default)]
pub struct ProgramOptions {
    pub argv: Vec<String>,
    /// Working directory; the script's directory when empty
    pub wd: String,
    /// `KEY=value` assignments for the program's environment
    pub env: String,
    /// Client type; derived from the file extension when absent
    pub client_type: Option<String>,
    pub for_project: bool,
    pub run_in_console: bool,
    /// Clear the shell when the client starts
    pub auto_clear_shell: bool,
    pub auto_fork: bool,
    pub fork_child: bool,
}

/// Options only used when debugging
#[derive(Debug, Clone)]
pub struct DebugOptions {
    pub trace_interpreter: bool,
    /// Run to the first breakpoint instead of stopping at the first line
    pub auto_continue: bool,
    pub enable_call_trace: bool,
}

impl Default for DebugOptions {
    fn default() -> Self {
        Self {
            trace_interpreter: false,
            auto_continue: true,
            enable_call_trace: false,
        }
    }
}

/// Unit test preparation
#[derive(Debug, Clone, Default)]
pub struct UnittestOptions {
    pub file: String,
    pub test_name: String,
    pub test_function: String,
    /// Ids of previously failed tests to rerun
    pub failed: Vec<String>,
    pub coverage: bool,
    pub coverage_file: String,
    pub erase: bool,
    pub client_type: Option<String>,
    pub for_project: bool,
}

/// Debug session manager
pub struct DebugServer {
    config: Config,
    core: Arc<Mutex<SessionCore>>,
    breakpoints: Registry<Breakpoint>,
    watchpoints: Registry<Watchpoint>,
    launcher: Box<dyn Launcher>,
    host_approval: Option<Box<dyn HostApproval>>,
    allowed_hosts: Vec<String>,
    port: u16,
    passive: bool,
    /// The passive client reported its exit
    passive_client_exited: bool,
    process: Option<ClientProcess>,
    connection: Option<ConnectionId>,
    client_type: String,
    /// Client type of the last successful start
    last_client_type: String,
    interpreter: String,
    capabilities: HashMap<String, Capabilities>,
    /// File extension to client type, first registration wins
    associations: Vec<(&'static str, &'static str)>,
    auto_clear_shell: bool,
    for_project: bool,
    run_in_console: bool,
}

impl std::fmt::Debug for DebugServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugServer")
            .field("port", &self.port)
            .field("passive", &self.passive)
            .field("client_type", &self.client_type)
            .field("core", &*self.core.lock())
            .field("connection", &self.connection)
            .finish()
    }
}

impl DebugServer {
    /// Create a session manager for clients connecting back to `port`
    pub fn new(
        config: Config,
        port: u16,
        launcher: Box<dyn Launcher>,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        let core = Arc::new(Mutex::new(SessionCore::new(events)));
        let mut breakpoints = Registry::new();
        sync::observe_breakpoints(&mut breakpoints, Arc::clone(&core));
        let mut watchpoints = Registry::new();
        sync::observe_watchpoints(&mut watchpoints, Arc::clone(&core));

        let mut capabilities = HashMap::new();
        let mut associations: Vec<(&'static str, &'static str)> = Vec::new();
        for entry in languages::registered(&config) {
            if entry.client_type == none::CLIENT_TYPE {
                continue;
            }
            capabilities.insert(entry.client_type.to_string(), entry.capabilities);
            for ext in entry.extensions {
                if !associations.iter().any(|(e, _)| e == ext) {
                    associations.push((*ext, entry.client_type));
                }
            }
        }

        let mut server = Self {
            passive: config.server.passive,
            allowed_hosts: config.server.allowed_hosts.clone(),
            config,
            core,
            breakpoints,
            watchpoints,
            launcher,
            host_approval: None,
            port,
            passive_client_exited: false,
            process: None,
            connection: None,
            client_type: String::new(),
            last_client_type: String::new(),
            interpreter: String::new(),
            capabilities,
            associations,
            auto_clear_shell: false,
            for_project: false,
            run_in_console: false,
        };

        let default = server.config.server.default_client_type.clone();
        if !server.set_client_type(&default) {
            server.client_type = server
                .supported_languages(false)
                .into_iter()
                .next()
                .unwrap_or_else(|| none::CLIENT_TYPE.to_string());
        }
        info!(
            port,
            passive = server.passive,
            client_type = %server.client_type,
            "Debug server ready"
        );
        server
    }

    // === Accessors ===

    pub fn state(&self) -> SessionState {
        self.core.lock().state
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_passive(&self) -> bool {
        self.passive
    }

    pub fn client_type(&self) -> &str {
        &self.client_type
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn breakpoints(&self) -> &Registry<Breakpoint> {
        &self.breakpoints
    }

    /// Edits are mirrored onto the client while debugging
    pub fn breakpoints_mut(&mut self) -> &mut Registry<Breakpoint> {
        &mut self.breakpoints
    }

    pub fn watchpoints(&self) -> &Registry<Watchpoint> {
        &self.watchpoints
    }

    pub fn watchpoints_mut(&mut self) -> &mut Registry<Watchpoint> {
        &mut self.watchpoints
    }

    pub fn allowed_hosts(&self) -> &[String] {
        &self.allowed_hosts
    }

    pub fn set_host_approval(&mut self, approval: Box<dyn HostApproval>) {
        self.host_approval = Some(approval);
    }

    pub fn is_connected(&self) -> bool {
        self.core.lock().interface.is_connected()
    }

    /// Capabilities of a client type, empty for unknown types
    pub fn client_capabilities(&self, client_type: &str) -> Capabilities {
        self.capabilities
            .get(client_type)
            .copied()
            .unwrap_or_else(Capabilities::empty)
    }

    /// Usable client types, optionally only those with an interactive shell
    pub fn supported_languages(&self, shell_only: bool) -> Vec<String> {
        LANGUAGES
            .iter()
            .filter_map(|entry| {
                let caps = self.capabilities.get(entry.client_type)?;
                (!shell_only || caps.contains(Capabilities::HAS_SHELL))
                    .then(|| entry.client_type.to_string())
            })
            .collect()
    }

    /// File extensions associated with a client type
    pub fn extensions(&self, language: &str) -> Vec<&'static str> {
        self.associations
            .iter()
            .filter(|(_, lang)| *lang == language)
            .map(|(ext, _)| *ext)
            .collect()
    }

    /// Interpreter of the running client, empty for remote or passive ones
    pub fn client_interpreter(&self) -> &str {
        &self.interpreter
    }

    /// Address a debug client uses to connect back
    pub fn host_address(&self, localhost: bool) -> String {
        match self.config.server.network_interface.as_str() {
            "all" if localhost => "127.0.0.1".to_string(),
            "all" => format!("{}@@v4", local_hostname()),
            "allv6" if localhost => "::1".to_string(),
            "allv6" => format!("{}@@v6", local_hostname()),
            address => format!("{}@@i0", address),
        }
    }

    // === Internal helpers ===

    fn emit(&self, event: Event) {
        self.core.lock().emit(event);
    }

    fn send(&self, request: Request) -> Result<()> {
        self.core.lock().send(&request)
    }

    fn send_logged(&self, request: Request) {
        if let Err(e) = self.send(request) {
            debug!(error = %e, "Request not sent");
        }
    }

    fn set_state(&self, state: SessionState) {
        let mut core = self.core.lock();
        if core.state != state {
            debug!(from = %core.state, to = %state, "Session state");
            core.state = state;
        }
    }

    /// Select the client type if it is supported
    fn set_client_type(&mut self, client_type: &str) -> bool {
        if self.capabilities.contains_key(client_type) {
            self.client_type = client_type.to_string();
            true
        } else {
            debug!(client_type, "Ignoring unsupported client type");
            false
        }
    }

    fn language_for_file(&self, file: &str) -> Option<&'static str> {
        let ext = Path::new(file).extension()?.to_str()?;
        let ext = format!(".{}", ext);
        self.associations
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, lang)| *lang)
    }

    /// Explicit client type, else by file extension, else the default
    fn resolve_client_type(&mut self, file: &str, explicit: Option<&str>) {
        if let Some(client_type) = explicit.filter(|c| !c.is_empty()) {
            if self.set_client_type(client_type) {
                return;
            }
        }
        let client_type = match self.language_for_file(file) {
            Some(lang) => lang.to_string(),
            None => self.config.server.default_client_type.clone(),
        };
        self.set_client_type(&client_type);
    }

    fn interface_options(&self, passive: bool) -> InterfaceOptions {
        InterfaceOptions {
            passive,
            translator: PathTranslator::from_config(&self.config.path_translation),
        }
    }

    fn create_interface(&self, client_type: &str, passive: bool) -> Box<dyn DebuggerInterface> {
        match languages::create(client_type, &self.interface_options(passive)) {
            Ok(interface) => interface,
            Err(e) => {
                warn!(client_type, error = %e, "Falling back to the no-backend interface");
                Box::new(NoneInterface::new())
            }
        }
    }

    fn set_interpreter(&mut self, interpreter: String) {
        if interpreter != self.interpreter {
            self.interpreter = interpreter;
            self.emit(Event::InterpreterChanged {
                interpreter: self.interpreter.clone(),
            });
        }
    }

    fn kill_process(&mut self) {
        if let Some(mut process) = self.process.take() {
            if process.kill() {
                info!(program = process.program(), "Debug client process killed");
            }
        }
    }

    fn switch_to_none(&self) {
        let mut core = self.core.lock();
        core.replace_interface(Box::new(NoneInterface::new()));
        core.state = SessionState::Idle;
    }

    // === Client lifecycle ===

    /// Start a debug client, replacing any running one
    ///
    /// `unplanned` marks a restart after the client went away on its own.
    /// Start failures are reported as notification events.
    pub fn start_client(
        &mut self,
        unplanned: bool,
        client_type: Option<&str>,
        for_project: bool,
        run_in_console: bool,
    ) {
        self.for_project = for_project;
        self.run_in_console = run_in_console;

        let was_debugging = self.state().is_debugging();
        if !(self.passive && self.passive_client_exited) && self.is_connected() {
            self.shutdown_server();
            self.emit(Event::ClientGone {
                unplanned: unplanned && was_debugging,
            });
        }

        if let Some(client_type) = client_type {
            self.set_client_type(client_type);
        }

        if self.passive {
            self.switch_to_none();
            self.set_interpreter(String::new());
            return;
        }

        self.kill_process();
        let interface = self.create_interface(&self.client_type, false);
        let ctx = StartContext {
            port: self.port,
            run_in_console,
            local_host: self.host_address(true),
            remote_host: self.host_address(false),
            config: &self.config,
            launcher: self.launcher.as_ref(),
        };
        let outcome = {
            let mut core = self.core.lock();
            core.replace_interface(interface);
            core.state = SessionState::Idle;
            match (for_project, self.config.project.as_ref()) {
                (true, Some(project)) => core.interface.start_remote_for_project(&ctx, project),
                _ => core.interface.start_remote(&ctx),
            }
        };

        if let Some(message) = outcome.notification {
            self.emit(Event::Notification { message });
        }

        match outcome.process {
            Some(process) => {
                info!(
                    client_type = %self.client_type,
                    program = process.program(),
                    pid = ?process.pid(),
                    "Debug client started"
                );
                self.process = Some(process);
                if self.last_client_type != self.client_type {
                    self.last_client_type = self.client_type.clone();
                    self.send_logged(Request::Banner);
                } else if self.auto_clear_shell {
                    self.auto_clear_shell = false;
                    self.send_logged(Request::Banner);
                }
                for scope in [SCOPE_GLOBAL, SCOPE_LOCAL] {
                    self.send_logged(Request::Variables {
                        frame: 0,
                        scope,
                        filter: Vec::new(),
                    });
                }
                self.set_state(SessionState::InterfaceReady);
            }
            None => {
                if client_type.is_some() && !self.last_client_type.is_empty() {
                    let last = self.last_client_type.clone();
                    self.set_client_type(&last);
                }
            }
        }

        self.set_interpreter(outcome.interpreter);
    }

    /// Ask the client to terminate and drop its connection
    pub fn shutdown_server(&mut self) {
        if self.core.lock().interface.shutdown() {
            info!("Debug client connection shut down");
        }
        self.connection = None;
    }

    /// Tear the whole session down
    pub fn shutdown(&mut self) {
        self.shutdown_server();
        self.kill_process();
        self.set_state(SessionState::Idle);
    }

    /// Adopt an accepted socket
    ///
    /// Peers outside the allow list need approval. An existing connection is
    /// shut down first. Returns whether the connection was adopted.
    pub fn accept_connection(
        &mut self,
        conn: ConnectionId,
        peer: &str,
        mut link: Box<dyn ClientLink>,
    ) -> bool {
        if !self.allowed_hosts.iter().any(|h| h == peer) {
            let approved = self
                .host_approval
                .as_mut()
                .is_some_and(|approval| approval.approve(peer));
            if !approved {
                warn!(peer, "Connection from disallowed host refused");
                link.close();
                self.emit(Event::ConnectionRefused {
                    peer: peer.to_string(),
                });
                return false;
            }
            info!(peer, "Host approved, adding to allowed hosts");
            self.allowed_hosts.push(peer.to_string());
        }

        if self.is_connected() {
            info!(peer, "Replacing existing client connection");
            self.shutdown_server();
        }

        if self.passive {
            // passive clients bring their own interpreter
            let client_type = &self.config.server.passive_client_type;
            if languages::find(client_type).is_some() {
                self.client_type = client_type.clone();
            }
            let interface = self.create_interface(&self.client_type, true);
            self.core.lock().replace_interface(interface);
        }

        let accepted = self.core.lock().interface.new_connection(link);
        if !accepted {
            warn!(peer, client_type = %self.client_type, "Interface refused the connection");
            return false;
        }

        info!(peer, conn, "Debug client connected");
        self.connection = Some(conn);
        if matches!(self.state(), SessionState::Idle | SessionState::InterfaceReady) {
            self.set_state(SessionState::Connected);
        }

        if self.last_client_type != self.client_type {
            self.last_client_type = self.client_type.clone();
            self.send_logged(Request::Banner);
        } else if self.auto_clear_shell {
            self.auto_clear_shell = false;
            self.send_logged(Request::Banner);
        } else if self.passive {
            self.send_logged(Request::Banner);
        }
        self.core.lock().interface.flush();
        true
    }

    /// Process one message from the event loop
    pub fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Data { conn, bytes } => {
                if self.connection != Some(conn) {
                    debug!(conn, "Dropping data from a stale connection");
                    return;
                }
                let events = self.core.lock().interface.on_data(&bytes);
                for event in events {
                    self.handle_event(event);
                }
            }
            Inbound::Disconnected { conn } => {
                if self.connection == Some(conn) {
                    self.client_disconnected();
                } else {
                    debug!(conn, "Stale connection closed");
                }
            }
            Inbound::ProcessOutput { stream, text } => {
                self.emit(Event::ProcessOutput { stream, text });
            }
            Inbound::ProcessExited { id, status } => self.process_exited(id, status),
            Inbound::Call(call) => call(self),
            Inbound::Stop => self.shutdown(),
        }
    }

    fn process_exited(&mut self, id: u64, status: Option<i32>) {
        if self.process.as_ref().map(ClientProcess::id) != Some(id) {
            debug!(id, "Exit of a replaced client process");
            return;
        }
        info!(?status, "Debug client process exited");
        self.process = None;
        if !self.is_connected() && self.state() == SessionState::InterfaceReady {
            self.set_state(SessionState::Idle);
            self.emit(Event::Notification {
                message: match status {
                    Some(code) => format!("Debug client exited with status {} before connecting", code),
                    None => "Debug client was terminated before connecting".to_string(),
                },
            });
        }
    }

    fn client_disconnected(&mut self) {
        self.connection = None;
        let state = self.state();
        self.core.lock().interface.disconnected();
        info!(state = %state, "Debug client disconnected");

        self.emit(Event::ClientGone {
            unplanned: state.is_debugging(),
        });

        if self.passive {
            if !self.passive_client_exited {
                self.passive_client_exited = true;
                self.emit(Event::PassiveSessionClosed);
            }
            self.switch_to_none();
        } else if state.is_running() && self.config.server.restart_on_disconnect {
            self.start_client(true, None, self.for_project, self.run_in_console);
        } else {
            self.set_state(SessionState::InterfaceReady);
        }
    }

    fn handle_event(&mut self, event: Event) {
        let forward = match &event {
            e if e.requires_running() => {
                let running = self.state().is_running();
                if !running {
                    debug!("Dropping client report, no program is running");
                }
                running
            }
            Event::LineReached { .. } => {
                if self.state() == (SessionState::Running { debugging: true }) {
                    self.set_state(SessionState::Debugging);
                }
                true
            }
            Event::ClearBreak { file, line } => {
                if self.state().is_debugging() {
                    self.delete_breakpoint(&(file.clone(), *line));
                }
                true
            }
            Event::ClearWatch { condition } => {
                if self.state().is_debugging() {
                    let key = split_condition(condition);
                    if self.watchpoints.contains(&key) {
                        if let Err(e) = self.watchpoints.remove(&key) {
                            debug!(error = %e, "Watch expression already gone");
                        }
                    }
                }
                true
            }
            Event::Capabilities {
                capabilities,
                client_type,
            } => {
                self.capabilities.insert(
                    client_type.clone(),
                    Capabilities::from_wire(i64::from(*capabilities)),
                );
                true
            }
            Event::Exit { status } => {
                self.client_exited(*status);
                false
            }
            Event::PassiveDebugStarted { file, exceptions } => {
                self.passive_started(file.clone(), *exceptions);
                false
            }
            _ => true,
        };
        if forward {
            self.emit(event);
        }
    }

    fn delete_breakpoint(&mut self, key: &BreakpointKey) {
        if self.breakpoints.contains(key) {
            if let Err(e) = self.breakpoints.remove(key) {
                debug!(error = %e, "Breakpoint already gone");
            }
        }
    }

    fn client_exited(&mut self, status: i64) {
        if self.passive {
            self.passive_client_exited = true;
            self.shutdown_server();
            self.emit(Event::PassiveSessionClosed);
        }

        self.emit(Event::Exit { status });

        if self.config.server.automatic_reset {
            self.start_client(false, None, self.for_project, self.run_in_console);
        }

        if self.passive {
            self.switch_to_none();
            self.emit(Event::Output {
                text: "\nNot connected\n".to_string(),
            });
            self.emit(Event::Statement { more: false });
        } else if self.state().is_running() {
            self.set_state(SessionState::InterfaceReady);
        }
    }

    fn passive_started(&mut self, file: String, exceptions: bool) {
        info!(file = %file, "Passive debug session started");
        self.emit(Event::Output {
            text: "Passive debug connection received\n".to_string(),
        });
        self.passive_client_exited = false;
        self.set_state(SessionState::Debugging);
        self.restore_breakpoints();
        self.restore_watchpoints();
        self.emit(Event::PassiveDebugStarted { file, exceptions });
    }

    fn restore_breakpoints(&self) {
        let requests: Vec<Request> = self
            .breakpoints
            .list()
            .iter()
            .flat_map(sync::set_breakpoint)
            .collect();
        self.core.lock().send_if_debugging(&requests);
    }

    fn restore_watchpoints(&self) {
        let requests: Vec<Request> = self
            .watchpoints
            .list()
            .iter()
            .flat_map(sync::set_watchpoint)
            .collect();
        self.core.lock().send_if_debugging(&requests);
    }

    // === Program control ===

    /// Start the client for a program; false when no client process runs
    fn prepare_program(&mut self, file: &str, options: &ProgramOptions) -> bool {
        self.auto_clear_shell = options.auto_clear_shell;
        self.resolve_client_type(file, options.client_type.as_deref());
        self.start_client(false, None, options.for_project, options.run_in_console);
        self.client_started(file)
    }

    fn client_started(&self, file: &str) -> bool {
        if self.process.is_some() {
            return true;
        }
        debug!(file, client_type = %self.client_type, "No debug client running, program not started");
        false
    }

    fn fork_mode(&self, options: &ProgramOptions) -> Result<()> {
        self.send(Request::ForkMode {
            auto_fork: options.auto_fork,
            fork_child: options.fork_child,
        })
    }

    /// Send environment assignments for the program
    pub fn remote_environment(&self, env: &str) -> Result<()> {
        self.send(Request::Environment(parse_environment(env)))
    }

    /// Start a client and load a program under the debugger
    ///
    /// All breakpoints and watch expressions are sent once the load request
    /// is queued. When the client cannot be started nothing is sent and the
    /// session stays idle.
    pub fn remote_load(
        &mut self,
        file: &str,
        options: &ProgramOptions,
        debug: &DebugOptions,
    ) -> Result<()> {
        if !self.prepare_program(file, options) {
            return Ok(());
        }
        self.set_call_trace_enabled(debug.enable_call_trace)?;
        self.remote_environment(&options.env)?;
        self.fork_mode(options)?;
        let (wd, file) = program_paths(file, &options.wd);
        self.send(Request::Load {
            wd,
            file,
            argv: options.argv.clone(),
            trace_interpreter: debug.trace_interpreter,
            auto_continue: debug.auto_continue,
        })?;
        self.set_state(SessionState::Debugging);
        self.restore_breakpoints();
        self.restore_watchpoints();
        Ok(())
    }

    /// Start a client and run a program without stopping
    pub fn remote_run(&mut self, file: &str, options: &ProgramOptions) -> Result<()> {
        if !self.prepare_program(file, options) {
            return Ok(());
        }
        self.remote_environment(&options.env)?;
        self.fork_mode(options)?;
        let (wd, file) = program_paths(file, &options.wd);
        self.send(Request::Run {
            wd,
            file,
            argv: options.argv.clone(),
        })?;
        self.set_state(SessionState::Running { debugging: false });
        Ok(())
    }

    /// Run a program with coverage collection
    pub fn remote_coverage(&mut self, file: &str, options: &ProgramOptions, erase: bool) -> Result<()> {
        if !self.prepare_program(file, options) {
            return Ok(());
        }
        self.remote_environment(&options.env)?;
        let (wd, file) = program_paths(file, &options.wd);
        self.send(Request::Coverage {
            wd,
            file,
            argv: options.argv.clone(),
            erase,
        })?;
        self.set_state(SessionState::Running { debugging: false });
        Ok(())
    }

    /// Run a program under the profiler
    pub fn remote_profile(&mut self, file: &str, options: &ProgramOptions, erase: bool) -> Result<()> {
        if !self.prepare_program(file, options) {
            return Ok(());
        }
        self.remote_environment(&options.env)?;
        let (wd, file) = program_paths(file, &options.wd);
        self.send(Request::Profile {
            wd,
            file,
            argv: options.argv.clone(),
            erase,
        })?;
        self.set_state(SessionState::Running { debugging: false });
        Ok(())
    }

    /// Execute a statement in the client's shell
    pub fn remote_statement(&self, statement: &str) -> Result<()> {
        self.send(Request::Statement(statement.trim_end().to_string()))
    }

    fn step_request(&self, request: Request) -> Result<()> {
        if !self.state().is_debugging() {
            debug!(request = request.name(), "No program is being debugged, ignoring");
            return Ok(());
        }
        self.send(request)?;
        self.set_state(SessionState::Running { debugging: true });
        Ok(())
    }

    pub fn remote_step(&self) -> Result<()> {
        self.step_request(Request::Step)
    }

    pub fn remote_step_over(&self) -> Result<()> {
        self.step_request(Request::StepOver)
    }

    pub fn remote_step_out(&self) -> Result<()> {
        self.step_request(Request::StepOut)
    }

    pub fn remote_step_quit(&self) -> Result<()> {
        self.step_request(Request::StepQuit)
    }

    /// Continue; `special` continues until the watch expressions change
    pub fn remote_continue(&self, special: bool) -> Result<()> {
        self.step_request(Request::Continue { special })
    }

    /// Answer a raw input request of the program
    pub fn remote_raw_input(&self, text: &str) -> Result<()> {
        self.send(Request::RawInput(text.to_string()))?;
        self.emit(Event::RawInputSent);
        Ok(())
    }

    pub fn remote_thread_list(&self) -> Result<()> {
        self.send(Request::ThreadList)
    }

    pub fn remote_set_thread(&self, tid: i64) -> Result<()> {
        self.send(Request::ThreadSet(tid))
    }

    /// Request the variables of a scope in a stack frame
    pub fn remote_client_variables(&self, scope: u8, filter: Vec<i64>, frame: u32) -> Result<()> {
        self.send(Request::Variables {
            frame,
            scope,
            filter,
        })
    }

    /// Request the members of one variable
    pub fn remote_client_variable(
        &self,
        scope: u8,
        filter: Vec<i64>,
        path: Vec<String>,
        frame: u32,
    ) -> Result<()> {
        self.send(Request::Variable {
            path,
            frame,
            scope,
            filter,
        })
    }

    /// Set the variable name filter of a scope
    pub fn remote_client_set_filter(&self, scope: u8, filter: &str) -> Result<()> {
        self.send(Request::SetFilter {
            scope,
            filter: filter.to_string(),
        })
    }

    pub fn set_call_trace_enabled(&self, on: bool) -> Result<()> {
        self.send(Request::CallTrace(on))
    }

    pub fn remote_eval(&self, expression: &str) -> Result<()> {
        self.send(Request::Eval(expression.to_string()))
    }

    pub fn remote_exec(&self, statement: &str) -> Result<()> {
        self.send(Request::Exec(statement.to_string()))
    }

    pub fn remote_banner(&self) -> Result<()> {
        self.send(Request::Banner)
    }

    pub fn remote_capabilities(&self) -> Result<()> {
        self.send(Request::Capabilities)
    }

    pub fn remote_completion(&self, text: &str) -> Result<()> {
        self.send(Request::Completion(text.to_string()))
    }

    /// Start a client and prepare a unit test run
    pub fn remote_ut_prepare(&mut self, options: &UnittestOptions) -> Result<()> {
        self.resolve_client_type(&options.file, options.client_type.as_deref());
        self.start_client(false, None, options.for_project, false);
        if !self.client_started(&options.file) {
            return Ok(());
        }
        self.send(Request::UtPrepare {
            file: absolute(&options.file),
            test_name: options.test_name.clone(),
            test_function: options.test_function.clone(),
            failed: options.failed.clone(),
            coverage: options.coverage,
            coverage_file: options.coverage_file.clone(),
            erase: options.erase,
        })?;
        self.set_state(SessionState::Running { debugging: false });
        Ok(())
    }

    pub fn remote_ut_run(&self) -> Result<()> {
        self.send(Request::UtRun)
    }

    pub fn remote_ut_stop(&self) -> Result<()> {
        self.send(Request::UtStop)
    }

    /// Answer a fork request: follow the child or the parent
    pub fn remote_fork_to(&self, child: bool) -> Result<()> {
        self.send(Request::ForkTo { child })
    }
}

/// Absolute script path and working directory, defaulting to the script's
/// directory
fn program_paths(file: &str, wd: &str) -> (String, String) {
    let file = absolute(file);
    let wd = if wd.is_empty() {
        Path::new(&file)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    } else {
        wd.to_string()
    };
    (wd, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::common::config::ClientConfig;
    use crate::common::Error;
    use crate::interface::channel::memory::MemoryLink;
    use crate::process::supervisor::recording::RecordingLauncher;
    use crate::registry::WatchSpecial;

    fn test_config() -> Config {
        let mut config = Config::default();
        for client_type in ["python3", "ruby"] {
            config.clients.insert(
                client_type.to_string(),
                ClientConfig {
                    interpreter: format!("/usr/bin/{}", client_type),
                    client_script: Some(PathBuf::from(format!("/opt/clients/{}/client", client_type))),
                    redirect: true,
                },
            );
        }
        config.clients.insert(
            "python2".to_string(),
            ClientConfig {
                interpreter: String::new(),
                client_script: None,
                redirect: true,
            },
        );
        config
    }

    struct Harness {
        server: DebugServer,
        launcher: RecordingLauncher,
        events: mpsc::UnboundedReceiver<Event>,
        next_conn: ConnectionId,
    }

    impl Harness {
        fn new(config: Config) -> Self {
            let launcher = RecordingLauncher::new();
            let (tx, events) = mpsc::unbounded_channel();
            let server = DebugServer::new(config, 40001, Box::new(launcher.clone()), tx);
            Self {
                server,
                launcher,
                events,
                next_conn: 0,
            }
        }

        fn connect(&mut self) -> MemoryLink {
            let link = MemoryLink::new();
            self.next_conn += 1;
            assert!(self
                .server
                .accept_connection(self.next_conn, "127.0.0.1", Box::new(link.clone())));
            link
        }

        fn receive(&mut self, data: &str) {
            self.server.handle_inbound(Inbound::Data {
                conn: self.next_conn,
                bytes: data.as_bytes().to_vec(),
            });
        }

        fn drain(&mut self) -> Vec<Event> {
            let mut events = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                events.push(event);
            }
            events
        }

        /// Load a script and connect its client
        fn load(&mut self, file: &str) -> MemoryLink {
            self.server
                .remote_load(file, &ProgramOptions::default(), &DebugOptions::default())
                .unwrap();
            self.connect()
        }
    }

    fn breaks(link: &MemoryLink) -> Vec<String> {
        link.lines()
            .into_iter()
            .filter(|l| l.starts_with(">Break<"))
            .collect()
    }

    #[test]
    fn test_no_breakpoint_traffic_until_load() {
        let mut h = Harness::new(test_config());
        h.server.start_client(false, None, false, false);
        let shell = h.connect();
        h.server
            .breakpoints_mut()
            .add(Breakpoint::new("/src/app.py", 10))
            .unwrap();
        h.server
            .breakpoints_mut()
            .add(Breakpoint::new("/src/app.py", 20))
            .unwrap();
        assert!(breaks(&shell).is_empty());

        let link = h.load("/src/app.py");
        let lines = link.lines();
        let load = lines.iter().position(|l| l.starts_with(">Load<")).unwrap();
        let first_break = lines.iter().position(|l| l.starts_with(">Break<")).unwrap();
        assert!(load < first_break);
        assert_eq!(
            breaks(&link),
            vec![">Break</src/app.py@@10@@0@@1@@None", ">Break</src/app.py@@20@@0@@1@@None"]
        );
        assert!(!lines.iter().any(|l| l.starts_with(">Continue<")));
        assert_eq!(h.server.state(), SessionState::Debugging);
    }

    #[test]
    fn test_replay_follows_registry_order() {
        let mut h = Harness::new(test_config());
        for line in [30, 10, 20] {
            h.server
                .breakpoints_mut()
                .add(Breakpoint::new("/src/app.py", line))
                .unwrap();
        }
        let mut wp = Watchpoint::new("total", WatchSpecial::Created);
        wp.enabled = false;
        h.server.watchpoints_mut().add(wp).unwrap();

        let link = h.load("/src/app.py");
        let lines: Vec<_> = breaks(&link);
        assert!(lines[0].contains("@@30@@"));
        assert!(lines[1].contains("@@10@@"));
        assert!(lines[2].contains("@@20@@"));
        let all = link.lines();
        assert!(all.contains(&">Watch<total ??created??@@0@@1".to_string()));
        assert!(all.contains(&">EnableWatch<total ??created??,0".to_string()));
    }

    #[test]
    fn test_edit_is_clear_then_set() {
        let mut h = Harness::new(test_config());
        h.server
            .breakpoints_mut()
            .add(Breakpoint::new("/src/app.py", 5))
            .unwrap();
        let link = h.load("/src/app.py");
        let before = link.lines().len();

        let key = ("/src/app.py".to_string(), 5);
        let edited = Breakpoint::new("/src/app.py", 6).with_condition("n == 3");
        h.server.breakpoints_mut().update(&key, edited).unwrap();

        let lines = link.lines();
        assert_eq!(
            &lines[before..],
            &[
                ">Break</src/app.py@@5@@0@@0@@None".to_string(),
                ">Break</src/app.py@@6@@0@@1@@n == 3".to_string(),
            ]
        );
    }

    #[test]
    fn test_remove_sends_clear_only_while_debugging() {
        let mut h = Harness::new(test_config());
        h.server
            .breakpoints_mut()
            .add(Breakpoint::new("/src/app.py", 5))
            .unwrap();
        let link = h.load("/src/app.py");
        let before = link.lines().len();
        h.server.breakpoints_mut().remove_all();
        assert_eq!(
            &link.lines()[before..],
            &[">Break</src/app.py@@5@@0@@0@@None".to_string()]
        );

        h.receive(">Exit<0\n");
        h.server
            .breakpoints_mut()
            .add(Breakpoint::new("/src/app.py", 7))
            .unwrap();
        assert_eq!(link.lines().len(), before + 1);
    }

    #[test]
    fn test_client_clear_break_removes_entry() {
        let mut h = Harness::new(test_config());
        let mut temp = Breakpoint::new("/src/app.py", 12);
        temp.temporary = true;
        h.server.breakpoints_mut().add(temp).unwrap();
        h.server
            .breakpoints_mut()
            .add(Breakpoint::new("/src/app.py", 40).with_condition("x >"))
            .unwrap();
        h.load("/src/app.py");
        h.drain();

        h.receive(">ClearBreak</src/app.py,12\n>BPConditionError</src/app.py,40\n");
        assert!(!h.server.breakpoints().contains(&("/src/app.py".to_string(), 12)));
        assert!(h.server.breakpoints().contains(&("/src/app.py".to_string(), 40)));
        let events = h.drain();
        assert!(events.contains(&Event::ClearBreak {
            file: "/src/app.py".into(),
            line: 12
        }));
        assert!(events.contains(&Event::BreakConditionError {
            file: "/src/app.py".into(),
            line: 40
        }));
    }

    #[test]
    fn test_relative_breakpoint_cleared_by_client() {
        let mut h = Harness::new(test_config());
        let mut bp = Breakpoint::parse_location("app.py:3").unwrap();
        bp.temporary = true;
        let file = bp.file.clone();
        assert_eq!(file, absolute("app.py"));
        h.server.breakpoints_mut().add(bp).unwrap();

        let link = h.load("app.py");
        assert_eq!(breaks(&link), vec![format!(">Break<{}@@3@@1@@1@@None", file)]);
        h.drain();

        h.receive(&format!(">ClearBreak<{},3\n", file));
        assert!(h.server.breakpoints().is_empty());
        assert!(h.drain().contains(&Event::ClearBreak { file, line: 3 }));
    }

    #[test]
    fn test_client_clear_watch_removes_entry() {
        let mut h = Harness::new(test_config());
        h.server
            .watchpoints_mut()
            .add(Watchpoint::new("total", WatchSpecial::Changed))
            .unwrap();
        h.load("/src/app.py");
        h.receive(">ClearWatch<total ??changed??\n");
        assert!(h.server.watchpoints().is_empty());
    }

    #[test]
    fn test_second_connection_replaces_first() {
        let mut h = Harness::new(test_config());
        h.server.start_client(false, None, false, false);
        let first = h.connect();
        let second = h.connect();
        assert!(first.is_closed());
        assert_eq!(first.lines().last().map(String::as_str), Some(">Shutdown<"));
        assert!(!second.is_closed());
        assert!(h.server.is_connected());
    }

    #[test]
    fn test_disallowed_host_refused() {
        let mut h = Harness::new(test_config());
        h.server.start_client(false, None, false, false);
        let link = MemoryLink::new();
        assert!(!h.server.accept_connection(1, "10.1.2.3", Box::new(link.clone())));
        assert!(link.is_closed());
        assert!(h.drain().contains(&Event::ConnectionRefused {
            peer: "10.1.2.3".into()
        }));
        assert!(!h.server.is_connected());
    }

    #[test]
    fn test_approved_host_is_remembered() {
        let mut h = Harness::new(test_config());
        h.server.start_client(false, None, false, false);
        h.server
            .set_host_approval(Box::new(|peer: &str| peer.starts_with("10.")));
        assert!(h
            .server
            .accept_connection(1, "10.1.2.3", Box::new(MemoryLink::new())));
        assert!(h.server.allowed_hosts().iter().any(|h| h == "10.1.2.3"));
    }

    #[test]
    fn test_step_ignored_when_not_debugging() {
        let mut h = Harness::new(test_config());
        h.server.start_client(false, None, false, false);
        let link = h.connect();
        let before = link.lines().len();
        h.server.remote_step().unwrap();
        h.server.remote_continue(false).unwrap();
        assert_eq!(link.lines().len(), before);
        assert_eq!(h.server.state(), SessionState::Connected);
    }

    #[test]
    fn test_step_and_line_reached_transitions() {
        let mut h = Harness::new(test_config());
        let link = h.load("/src/app.py");
        // first line report is answered with a continue
        h.receive(">Line<[['/src/app.py', 1, '<module>', '']]\n");
        assert_eq!(link.lines().last().map(String::as_str), Some(">Continue<0"));

        h.server.remote_step_over().unwrap();
        assert_eq!(h.server.state(), SessionState::Running { debugging: true });
        h.receive(">Line<[['/src/app.py', 2, '<module>', '']]\n");
        assert_eq!(h.server.state(), SessionState::Debugging);
        assert!(h
            .drain()
            .iter()
            .any(|e| matches!(e, Event::LineReached { line: 2, .. })));
    }

    #[test]
    fn test_exit_returns_to_ready_and_drops_late_exceptions() {
        let mut h = Harness::new(test_config());
        h.load("/src/app.py");
        h.drain();
        h.receive(">Exit<3\n");
        assert_eq!(h.server.state(), SessionState::InterfaceReady);
        h.receive(">Exception<['ValueError', 'late']\n");
        let events = h.drain();
        assert_eq!(events, vec![Event::Exit { status: 3 }]);
    }

    #[test]
    fn test_unplanned_disconnect_restarts_client() {
        let mut h = Harness::new(test_config());
        h.load("/src/app.py");
        h.drain();
        h.server.handle_inbound(Inbound::Disconnected { conn: h.next_conn });
        let events = h.drain();
        assert!(events.contains(&Event::ClientGone { unplanned: true }));
        assert_eq!(h.launcher.specs().len(), 2);
        assert_eq!(h.server.state(), SessionState::InterfaceReady);
    }

    #[test]
    fn test_stale_disconnect_ignored() {
        let mut h = Harness::new(test_config());
        h.server.start_client(false, None, false, false);
        h.connect();
        h.connect();
        h.server.handle_inbound(Inbound::Disconnected { conn: 1 });
        assert!(h.server.is_connected());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut h = Harness::new(test_config());
        h.server.start_client(false, None, false, false);
        let link = h.connect();
        h.server.shutdown_server();
        h.server.shutdown_server();
        h.server.shutdown();
        let shutdowns = link.lines().iter().filter(|l| *l == ">Shutdown<").count();
        assert_eq!(shutdowns, 1);
        assert!(!h.server.is_connected());
        assert_eq!(h.server.state(), SessionState::Idle);
    }

    #[test]
    fn test_start_failure_is_notified() {
        let mut h = Harness::new(test_config());
        h.launcher.set_failing(true);
        h.server.start_client(false, None, false, false);
        let events = h.drain();
        assert!(events.iter().any(|e| matches!(
            e,
            Event::Notification { message } if message.starts_with("The debugger backend could not be started")
        )));
        assert_eq!(h.server.state(), SessionState::Idle);
    }

    #[test]
    fn test_load_without_client_stays_idle() {
        let mut h = Harness::new(test_config());
        h.launcher.set_failing(true);
        h.server
            .breakpoints_mut()
            .add(Breakpoint::new("/src/app.py", 4))
            .unwrap();
        h.server
            .remote_load("/src/app.py", &ProgramOptions::default(), &DebugOptions::default())
            .unwrap();
        assert_eq!(h.server.state(), SessionState::Idle);
        assert!(h
            .drain()
            .iter()
            .any(|e| matches!(e, Event::Notification { .. })));

        h.server.remote_step().unwrap();
        assert_eq!(h.server.state(), SessionState::Idle);
    }

    #[test]
    fn test_start_announces_interpreter_and_banner() {
        let mut h = Harness::new(test_config());
        h.server.start_client(false, None, false, false);
        let events = h.drain();
        assert!(events.contains(&Event::InterpreterChanged {
            interpreter: "/usr/bin/python3".into()
        }));
        let link = h.connect();
        let lines = link.lines();
        assert_eq!(lines[0], ">Capabilities<");
        assert_eq!(lines[1], ">Banner<");
        assert!(lines[2].starts_with(">Variables<"));
        assert!(lines[3].starts_with(">Variables<"));
    }

    #[test]
    fn test_client_type_resolution() {
        let mut h = Harness::new(test_config());
        h.server
            .remote_run("/src/tool.rb", &ProgramOptions::default())
            .unwrap();
        assert_eq!(h.server.client_type(), "Ruby");

        h.server
            .remote_run("/src/tool.txt", &ProgramOptions::default())
            .unwrap();
        assert_eq!(h.server.client_type(), "Python3");

        let options = ProgramOptions {
            client_type: Some("Ruby".into()),
            ..Default::default()
        };
        h.server.remote_run("/src/tool.py", &options).unwrap();
        assert_eq!(h.server.client_type(), "Ruby");
        assert_eq!(h.server.state(), SessionState::Running { debugging: false });
    }

    #[test]
    fn test_ruby_coverage_unsupported() {
        let mut h = Harness::new(test_config());
        let result = h
            .server
            .remote_coverage("/src/tool.rb", &ProgramOptions::default(), false);
        assert!(matches!(result, Err(Error::Unsupported { .. })));
    }

    #[test]
    fn test_languages_and_extensions() {
        let h = Harness::new(test_config());
        assert_eq!(h.server.supported_languages(false), vec!["Python3", "Ruby"]);
        assert_eq!(h.server.supported_languages(true), vec!["Python3", "Ruby"]);
        assert!(h.server.extensions("Python3").contains(&".py"));
        assert_eq!(h.server.extensions("Ruby"), vec![".rb"]);
        assert!(h.server.extensions("Python2").is_empty());
        assert!(h
            .server
            .client_capabilities("Python3")
            .contains(Capabilities::HAS_UNITTEST));
        assert!(h.server.client_capabilities("Cobol").is_empty());
    }

    #[test]
    fn test_capabilities_response_updates_map() {
        let mut h = Harness::new(test_config());
        h.server.start_client(false, None, false, false);
        h.connect();
        h.receive(">Capabilities<1, \"Python3\"\n");
        assert_eq!(
            h.server.client_capabilities("Python3"),
            Capabilities::HAS_DEBUGGER
        );
    }

    #[test]
    fn test_host_address() {
        let mut config = test_config();
        config.server.network_interface = "all".into();
        let h = Harness::new(config.clone());
        assert_eq!(h.server.host_address(true), "127.0.0.1");
        assert!(h.server.host_address(false).ends_with("@@v4"));

        config.server.network_interface = "allv6".into();
        let h = Harness::new(config.clone());
        assert_eq!(h.server.host_address(true), "::1");

        config.server.network_interface = "192.168.1.4".into();
        let h = Harness::new(config);
        assert_eq!(h.server.host_address(false), "192.168.1.4@@i0");
    }

    #[test]
    fn test_raw_input_emits_sent() {
        let mut h = Harness::new(test_config());
        h.server.start_client(false, None, false, false);
        let link = h.connect();
        h.drain();
        h.server.remote_raw_input("yes").unwrap();
        assert_eq!(link.lines().last().map(String::as_str), Some("yes"));
        assert_eq!(h.drain(), vec![Event::RawInputSent]);
    }

    #[test]
    fn test_passive_session() {
        let mut config = test_config();
        config.server.passive = true;
        let mut h = Harness::new(config);
        h.server
            .breakpoints_mut()
            .add(Breakpoint::new("/src/app.py", 3))
            .unwrap();

        let link = h.connect();
        assert_eq!(h.server.state(), SessionState::Connected);
        assert!(h.launcher.specs().is_empty());
        assert!(link.lines().contains(&">Banner<".to_string()));

        h.receive(">PassiveStartup</src/app.py|1\n");
        assert_eq!(h.server.state(), SessionState::Debugging);
        assert_eq!(breaks(&link), vec![">Break</src/app.py@@3@@0@@1@@None"]);
        let events = h.drain();
        assert!(events.contains(&Event::PassiveDebugStarted {
            file: "/src/app.py".into(),
            exceptions: true
        }));

        h.receive(">Exit<0\n");
        let events = h.drain();
        assert_eq!(
            events,
            vec![
                Event::PassiveSessionClosed,
                Event::Exit { status: 0 },
                Event::Output {
                    text: "\nNot connected\n".into()
                },
                Event::Statement { more: false },
            ]
        );
        assert!(link.is_closed());
        assert_eq!(h.server.state(), SessionState::Idle);
    }

    #[test]
    fn test_ut_prepare_and_fork() {
        let mut h = Harness::new(test_config());
        h.server
            .remote_ut_prepare(&UnittestOptions {
                file: "/src/test_app.py".into(),
                test_name: "suite".into(),
                ..Default::default()
            })
            .unwrap();
        let link = h.connect();
        h.server.remote_fork_to(true).unwrap();
        let lines = link.lines();
        assert!(lines.iter().any(|l| l.starts_with(">UTPrepare<")));
        assert!(lines.last().is_some_and(|l| l.starts_with(">ForkTo<")));
        assert_eq!(h.server.state(), SessionState::Running { debugging: false });
    }
}
