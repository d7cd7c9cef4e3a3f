//! State shared by the networked debugger interfaces

use std::path::PathBuf;

use crate::common::config::ProjectSettings;
use crate::common::Result;
use crate::events::Event;
use crate::process::launch::{self, EnvPolicy, LaunchSpec};
use crate::wire::{LineBuffer, Request};

use super::capabilities::Capabilities;
use super::channel::{Channel, ClientLink};
use super::decode::decode;
use super::dispatch::{Dispatch, ResponseTable};
use super::translate::{Direction, PathTranslator};
use super::{InterfaceOptions, StartContext, StartOutcome};

/// How to start a debug client, resolved from global or project settings
#[derive(Debug, Clone)]
pub(crate) struct ClientSettings {
    pub interpreter: String,
    pub client_script: Option<PathBuf>,
    pub redirect: bool,
    /// Remote execution command and host
    pub remote: Option<(String, String)>,
    /// Translation used for remotely executed clients
    pub remote_translator: PathTranslator,
    pub console_command: Option<String>,
    pub env: EnvPolicy,
}

impl ClientSettings {
    pub fn global(client_type: &str, ctx: &StartContext<'_>) -> Self {
        let config = ctx.config;
        let client = config.client(client_type);
        let remote = (config.remote.enabled && !config.remote.execution.is_empty())
            .then(|| (config.remote.execution.clone(), config.remote.host.clone()));
        let console_command = (ctx.run_in_console || config.console.enabled)
            .then(|| config.console.command.clone())
            .filter(|c| !c.trim().is_empty());
        Self {
            interpreter: client.interpreter,
            client_script: client.client_script,
            redirect: client.redirect,
            remote,
            remote_translator: PathTranslator::from_config(&config.path_translation),
            console_command,
            env: launch::environment(config.environment.replace, &config.environment.variables),
        }
    }

    /// Project values win; empty project values fall back to the global ones
    pub fn project(client_type: &str, ctx: &StartContext<'_>, project: &ProjectSettings) -> Self {
        let mut settings = Self::global(client_type, ctx);
        if !project.interpreter.is_empty() {
            settings.interpreter = project.interpreter.clone();
        }
        if project.client_script.is_some() {
            settings.client_script = project.client_script.clone();
        }
        settings.redirect = project.redirect;
        settings.remote = (project.remote_debugger && !project.remote_command.is_empty())
            .then(|| (project.remote_command.clone(), project.remote_host.clone()));
        settings.remote_translator = PathTranslator::from_project(project);
        settings.console_command = if ctx.run_in_console || project.console_debugger {
            let command = if project.console_command.is_empty() {
                ctx.config.console.command.clone()
            } else {
                project.console_command.clone()
            };
            Some(command).filter(|c| !c.trim().is_empty())
        } else {
            None
        };
        settings.env = launch::environment(project.environment_override, &project.environment);
        settings
    }
}

/// Connection, parsing and translation state of one interface
#[derive(Debug)]
pub(crate) struct ClientCore {
    client_type: &'static str,
    channel: Channel,
    buffer: LineBuffer,
    table: ResponseTable,
    translator: PathTranslator,
    capabilities: Capabilities,
    passive: bool,
    /// Answer the next line report with a continue
    auto_continue: bool,
}

impl ClientCore {
    pub fn new(
        client_type: &'static str,
        tokens: &[&'static str],
        capabilities: Capabilities,
        options: &InterfaceOptions,
    ) -> Result<Self> {
        Ok(Self {
            client_type,
            channel: Channel::new(),
            buffer: LineBuffer::new(),
            table: ResponseTable::new(tokens)?,
            translator: if options.passive {
                options.translator.clone()
            } else {
                PathTranslator::identity()
            },
            capabilities,
            passive: options.passive,
            auto_continue: !options.passive,
        })
    }

    pub fn client_type(&self) -> &'static str {
        self.client_type
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn translate(&self, path: &str, direction: Direction) -> String {
        self.translator.translate(path, direction)
    }

    /// Wire form of a request with local file names made remote
    pub fn encode_translated(&self, request: &Request) -> String {
        if self.translator.is_identity() {
            return request.to_wire();
        }
        request
            .clone()
            .map_paths(|path| self.translator.translate(path, Direction::LocalToRemote))
            .to_wire()
    }

    /// Send an encoded request; empty text is dropped
    pub fn send_encoded(&mut self, request: &Request, text: String) {
        if text.is_empty() {
            tracing::debug!(
                client_type = self.client_type,
                "Dropping '{}' request, not understood by this client",
                request.name()
            );
            return;
        }
        if let Request::Load { auto_continue, .. } = request {
            self.auto_continue = *auto_continue;
        }
        self.channel.send(text);
    }

    /// Start the client process described by `settings`
    pub fn start(&mut self, ctx: &StartContext<'_>, settings: ClientSettings) -> StartOutcome {
        if settings.interpreter.is_empty() {
            return StartOutcome::failed(format!("No {} interpreter configured", self.client_type));
        }
        let Some(script) = settings.client_script.as_deref() else {
            return StartOutcome::failed(format!(
                "No debug client script available for {}",
                self.client_type
            ));
        };

        if let Some((command, host)) = &settings.remote {
            self.translator = settings.remote_translator.clone();
            let spec = launch::remote(
                command,
                host,
                &settings.interpreter,
                script,
                ctx.port,
                settings.redirect,
                &ctx.remote_host,
            );
            let mut outcome = self.spawn(ctx, spec);
            outcome.interpreter = String::new();
            return outcome;
        }

        self.translator = PathTranslator::identity();
        let spec = match &settings.console_command {
            Some(command) => launch::console(
                command,
                &settings.interpreter,
                script,
                ctx.port,
                &ctx.local_host,
                settings.env,
            ),
            None => Ok(launch::plain(
                &settings.interpreter,
                script,
                ctx.port,
                settings.redirect,
                &ctx.local_host,
                settings.env,
            )),
        };
        let mut outcome = self.spawn(ctx, spec);
        if outcome.process.is_some() {
            outcome.interpreter = settings.interpreter;
        }
        outcome
    }

    fn spawn(&self, ctx: &StartContext<'_>, spec: Result<LaunchSpec>) -> StartOutcome {
        let result = spec.and_then(|spec| ctx.launcher.launch(&spec));
        match result {
            Ok(process) => StartOutcome {
                process: Some(process),
                networked: true,
                ..Default::default()
            },
            Err(e) => {
                tracing::warn!(client_type = self.client_type, error = %e, "Debug client could not be started");
                StartOutcome::failed(format!("The debugger backend could not be started: {}", e))
            }
        }
    }

    pub fn new_connection(&mut self, link: Box<dyn ClientLink>) -> bool {
        if !self.channel.attach(link) {
            return false;
        }
        self.buffer.clear();
        self.channel.send(Request::Capabilities.to_wire());
        true
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    pub fn flush(&mut self) {
        self.channel.flush();
    }

    pub fn shutdown(&mut self) -> bool {
        self.buffer.clear();
        self.channel.close()
    }

    pub fn disconnected(&mut self) {
        self.buffer.clear();
        self.channel.disconnected();
    }

    /// Split received bytes into lines and turn them into events
    pub fn on_data(&mut self, data: &[u8]) -> Vec<Event> {
        let mut events = Vec::new();
        for line in self.buffer.push(data) {
            tracing::debug!("wire <<< {}", line);
            match self.table.dispatch(&line) {
                Dispatch::Output(text) => events.push(Event::output(text)),
                Dispatch::Response {
                    leading,
                    token,
                    payload,
                } => {
                    if let Some(text) = leading {
                        events.push(Event::Output {
                            text: text.to_string(),
                        });
                    }
                    match decode(token, payload) {
                        Ok(Event::LineReached { .. }) if self.auto_continue && !self.passive => {
                            self.auto_continue = false;
                            self.channel
                                .send(Request::Continue { special: false }.to_wire());
                        }
                        Ok(event) => {
                            if let Event::Capabilities { capabilities, .. } = &event {
                                self.capabilities = Capabilities::from_wire(i64::from(*capabilities));
                            }
                            events.push(self.translator.localize_event(event));
                        }
                        Err(e) => {
                            tracing::warn!(token, error = %e, "Unparseable response from debug client");
                            events.push(Event::unparseable(token, payload, e));
                        }
                    }
                }
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::Config;
    use crate::interface::channel::memory::MemoryLink;
    use crate::process::supervisor::recording::RecordingLauncher;
    use crate::wire::tokens::RESPONSE_TOKENS;

    fn core(passive: bool) -> ClientCore {
        ClientCore::new(
            "Python3",
            RESPONSE_TOKENS,
            Capabilities::HAS_ALL,
            &InterfaceOptions {
                passive,
                translator: PathTranslator::identity(),
            },
        )
        .unwrap()
    }

    fn context<'a>(config: &'a Config, launcher: &'a RecordingLauncher) -> StartContext<'a> {
        StartContext {
            port: 40001,
            run_in_console: false,
            local_host: "127.0.0.1".into(),
            remote_host: "devbox@@v4".into(),
            config,
            launcher,
        }
    }

    fn settings() -> ClientSettings {
        ClientSettings {
            interpreter: "/usr/bin/python3".into(),
            client_script: Some(PathBuf::from("/opt/clients/DebugClient.py")),
            redirect: true,
            remote: None,
            remote_translator: PathTranslator::identity(),
            console_command: None,
            env: EnvPolicy::Inherit { overrides: vec![] },
        }
    }

    #[test]
    fn test_start_plain() {
        let config = Config::default();
        let launcher = RecordingLauncher::new();
        let mut core = core(false);
        let outcome = core.start(&context(&config, &launcher), settings());
        assert!(outcome.process.is_some());
        assert_eq!(outcome.interpreter, "/usr/bin/python3");
        let specs = launcher.specs();
        assert_eq!(specs[0].program, "/usr/bin/python3");
        assert_eq!(specs[0].args[1..], ["40001", "1", "127.0.0.1"]);
    }

    #[test]
    fn test_start_remote_sets_translation() {
        let config = Config::default();
        let launcher = RecordingLauncher::new();
        let mut core = core(false);
        let mut settings = settings();
        settings.remote = Some(("no-such-ssh-xyz".into(), "build01".into()));
        settings.remote_translator = PathTranslator::new("/srv", "/home/dev");
        let outcome = core.start(&context(&config, &launcher), settings);
        assert!(outcome.process.is_some());
        assert_eq!(outcome.interpreter, "");
        assert_eq!(launcher.specs()[0].args[0], "build01");
        assert_eq!(launcher.specs()[0].args.last().unwrap(), "devbox@@v4");
        assert_eq!(core.translate("/home/dev/a.py", Direction::LocalToRemote), "/srv/a.py");
    }

    #[test]
    fn test_start_without_interpreter() {
        let config = Config::default();
        let launcher = RecordingLauncher::new();
        let mut core = core(false);
        let mut settings = settings();
        settings.interpreter.clear();
        let outcome = core.start(&context(&config, &launcher), settings);
        assert!(outcome.process.is_none());
        assert_eq!(
            outcome.notification.as_deref(),
            Some("No Python3 interpreter configured")
        );
        assert!(launcher.specs().is_empty());
    }

    #[test]
    fn test_spawn_failure_is_a_notification() {
        let config = Config::default();
        let launcher = RecordingLauncher::new();
        launcher.set_failing(true);
        let outcome = core(false).start(&context(&config, &launcher), settings());
        assert!(outcome.process.is_none());
        assert!(outcome.notification.unwrap().contains("could not be started"));
    }

    #[test]
    fn test_requests_queue_until_connected() {
        let mut core = core(false);
        core.send_encoded(&Request::Banner, Request::Banner.to_wire());
        assert!(!core.is_connected());

        let link = MemoryLink::new();
        assert!(core.new_connection(Box::new(link.clone())));
        assert!(!core.new_connection(Box::new(MemoryLink::new())));
        core.flush();
        assert_eq!(link.lines(), vec![">Capabilities<", ">Banner<"]);
    }

    #[test]
    fn test_auto_continue_swallows_first_line() {
        let mut core = core(false);
        let link = MemoryLink::new();
        core.new_connection(Box::new(link.clone()));
        let load = Request::Load {
            wd: "/tmp".into(),
            file: "/tmp/a.py".into(),
            argv: vec![],
            trace_interpreter: false,
            auto_continue: true,
        };
        let text = core.encode_translated(&load);
        core.send_encoded(&load, text);

        let events = core.on_data(b">Line<[['/tmp/a.py', 1, '<module>', '']]\n");
        assert!(events.is_empty());
        assert_eq!(link.lines().last().unwrap(), ">Continue<0");

        let events = core.on_data(b">Line<[['/tmp/a.py', 5, '<module>', '']]\n");
        assert!(matches!(events[0], Event::LineReached { line: 5, .. }));
    }

    #[test]
    fn test_passive_never_auto_continues() {
        let mut core = core(true);
        let events = core.on_data(b">Line<[['/tmp/a.py', 1, '<module>', '']]\n");
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_leading_output_and_garbage() {
        let mut core = core(true);
        let events = core.on_data(b"partial>Exit<0\nplain text\n>Variables<not a literal\n");
        assert_eq!(
            events[0],
            Event::Output {
                text: "partial".into()
            }
        );
        assert_eq!(events[1], Event::Exit { status: 0 });
        assert_eq!(events[2], Event::output("plain text"));
        assert!(matches!(events[3], Event::UnparseableFrame { .. }));
    }

    #[test]
    fn test_capabilities_response_updates_mask() {
        let mut core = core(true);
        core.on_data(b">Capabilities<3, 'Python3'\n");
        assert_eq!(
            core.capabilities(),
            Capabilities::HAS_DEBUGGER | Capabilities::HAS_INTERPRETER
        );
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut core = core(false);
        let link = MemoryLink::new();
        core.new_connection(Box::new(link.clone()));
        assert!(core.shutdown());
        assert!(!core.shutdown());
        assert!(link.is_closed());
        assert_eq!(link.lines().last().unwrap(), ">Shutdown<");
    }
}
