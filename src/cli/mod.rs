//! CLI command handling
//!
//! Binds the debug server, starts the requested program and hands the
//! terminal to the interactive console.

pub mod console;
pub mod render;

use std::path::{Path, PathBuf};

use colored::Colorize;
use tokio::sync::mpsc;
use tracing::info;

use crate::commands::{Commands, ProgramArgs};
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::events::Event;
use crate::interface::{languages, Capabilities};
use crate::registry::{split_condition, Breakpoint, Watchpoint};
use crate::server::{DebugOptions, DebugServer, ProgramOptions, ServerRuntime};

/// Options given before the subcommand
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Print events as JSON lines
    pub json: bool,
    /// Configuration file replacing the default one
    pub config: Option<PathBuf>,
}

/// What to do with the program once the server is listening
enum Launch {
    Debug(DebugOptions),
    Run,
    Coverage { erase: bool },
    Profile { erase: bool },
}

fn load_config(options: &GlobalOptions) -> Result<Config> {
    match &options.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn program_options(args: Vec<String>, program: &ProgramArgs) -> ProgramOptions {
    ProgramOptions {
        argv: args,
        wd: program
            .cwd
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default(),
        env: program.env.clone(),
        client_type: program.client_type.clone(),
        for_project: program.project,
        run_in_console: program.console,
        auto_clear_shell: false,
        // without --fork-child the client asks which process to follow
        auto_fork: program.fork_child,
        fork_child: program.fork_child,
    }
}

/// Add command line breakpoints and watch expressions to the registries
fn seed_registries(server: &mut DebugServer, breakpoints: &[String], watches: &[String]) -> Result<()> {
    for spec in breakpoints {
        server.breakpoints_mut().add(Breakpoint::parse_location(spec)?)?;
    }
    for expression in watches {
        let (expression, special) = split_condition(expression);
        server
            .watchpoints_mut()
            .add(Watchpoint::new(expression, special))?;
    }
    Ok(())
}

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, options: GlobalOptions) -> Result<()> {
    let mut config = load_config(&options)?;

    match command {
        Commands::Languages { shell_only } => {
            list_languages(&config, shell_only);
            Ok(())
        }

        Commands::Debug {
            file,
            args,
            program,
            stop_on_entry,
            trace_interpreter,
            call_trace,
        } => {
            let debug = DebugOptions {
                trace_interpreter,
                auto_continue: !stop_on_entry,
                enable_call_trace: call_trace,
            };
            run_program(config, &options, &file, args, &program, Launch::Debug(debug)).await
        }

        Commands::Run {
            file,
            args,
            program,
        } => run_program(config, &options, &file, args, &program, Launch::Run).await,

        Commands::Coverage {
            file,
            args,
            program,
            erase,
        } => {
            let launch = Launch::Coverage { erase };
            run_program(config, &options, &file, args, &program, launch).await
        }

        Commands::Profile {
            file,
            args,
            program,
            erase,
        } => {
            let launch = Launch::Profile { erase };
            run_program(config, &options, &file, args, &program, launch).await
        }

        Commands::Listen {
            port,
            breakpoints,
            watches,
            allow_any_host,
        } => {
            config.server.passive = true;
            if let Some(port) = port {
                config.server.passive_port = port;
            }
            listen(config, &options, &breakpoints, &watches, allow_any_host).await
        }
    }
}

/// One line per configured language, optionally only those with a shell
fn language_lines(config: &Config, shell_only: bool) -> Vec<String> {
    languages::registered(config)
        .into_iter()
        .filter(|entry| entry.client_type != "None")
        .filter(|entry| !shell_only || entry.capabilities.contains(Capabilities::HAS_SHELL))
        .map(|entry| {
            format!(
                "{} {} [{}]",
                entry.client_type.bold(),
                entry.extensions.join(" ").dimmed(),
                entry.capabilities.describe().join(", ")
            )
        })
        .collect()
}

fn list_languages(config: &Config, shell_only: bool) {
    let lines = language_lines(config, shell_only);
    if lines.is_empty() {
        println!("No debug clients are configured");
    }
    for line in lines {
        println!("{}", line);
    }
}

async fn run_program(
    config: Config,
    options: &GlobalOptions,
    file: &Path,
    args: Vec<String>,
    program: &ProgramArgs,
    launch: Launch,
) -> Result<()> {
    if !file.exists() {
        return Err(Error::FileRead {
            path: file.display().to_string(),
            error: "no such file".to_string(),
        });
    }

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let mut runtime = ServerRuntime::bind(config, events_tx).await?;
    let server = runtime.server_mut();
    seed_registries(server, &program.breakpoints, &program.watches)?;

    let path = file.to_string_lossy().into_owned();
    let program_options = program_options(args, program);
    match launch {
        Launch::Debug(debug) => server.remote_load(&path, &program_options, &debug)?,
        Launch::Run => server.remote_run(&path, &program_options)?,
        Launch::Coverage { erase } => server.remote_coverage(&path, &program_options, erase)?,
        Launch::Profile { erase } => server.remote_profile(&path, &program_options, erase)?,
    }
    info!(file = %path, port = runtime.port(), "Program started");

    serve(runtime, events_rx, options.json, false).await
}

async fn listen(
    config: Config,
    options: &GlobalOptions,
    breakpoints: &[String],
    watches: &[String],
    allow_any_host: bool,
) -> Result<()> {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let mut runtime = ServerRuntime::bind(config, events_tx).await?;
    let server = runtime.server_mut();
    seed_registries(server, breakpoints, watches)?;
    if allow_any_host {
        server.set_host_approval(Box::new(|peer: &str| {
            info!(peer, "Accepting connection from unlisted host");
            true
        }));
    }

    if !options.json {
        println!(
            "{} on port {}",
            "Waiting for debug clients".cyan().bold(),
            runtime.port()
        );
    }

    serve(runtime, events_rx, options.json, true).await
}

/// Run the event loop alongside the console until either finishes
async fn serve(
    runtime: ServerRuntime,
    events: mpsc::UnboundedReceiver<Event>,
    json: bool,
    persistent: bool,
) -> Result<()> {
    let handle = runtime.handle();
    let server = tokio::spawn(runtime.run());

    console::run(handle, events, json, persistent).await?;

    server
        .await
        .map_err(|e| Error::Internal(format!("debug server task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::ClientConfig;

    #[test]
    fn test_program_options() {
        let program = ProgramArgs {
            cwd: Some(PathBuf::from("/work")),
            env: "A=1".to_string(),
            fork_child: true,
            ..Default::default()
        };
        let options = program_options(vec!["-v".into()], &program);
        assert_eq!(options.wd, "/work");
        assert_eq!(options.env, "A=1");
        assert_eq!(options.argv, vec!["-v".to_string()]);
        assert!(options.auto_fork);
        assert!(options.fork_child);
    }

    #[test]
    fn test_language_lines_shell_only() {
        colored::control::set_override(false);
        let mut config = Config::default();
        for (name, interpreter) in [("python3", "/usr/bin/python3"), ("ruby", "/usr/bin/ruby")] {
            config.clients.insert(
                name.to_string(),
                ClientConfig {
                    interpreter: interpreter.to_string(),
                    client_script: None,
                    redirect: true,
                },
            );
        }

        let all = language_lines(&config, false);
        let shells = language_lines(&config, true);
        assert!(!shells.is_empty());
        assert!(shells.len() <= all.len());
        assert!(shells.iter().all(|line| line.contains("shell")));
        assert!(!all.iter().any(|line| line.starts_with("None ")));
    }
}
