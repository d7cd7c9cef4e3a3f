//! Interactive console
//!
//! Reads commands from stdin while session events are printed as they
//! arrive. Input that is not a console command is sent to the client's
//! shell as a statement.

use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::common::{Error, Result};
use crate::events::Event;
use crate::registry::{split_condition, Breakpoint, Watchpoint};
use crate::server::ServerHandle;
use crate::wire::request::{SCOPE_GLOBAL, SCOPE_LOCAL};

use super::render::print_event;

const HELP: &str = "\
Commands:
  step | over | out | quit       step into, over, out of, or quit the program
  continue [watch]               continue (until a watch expression changes)
  break <file:line[:cond]>       set a breakpoint
  tbreak <file:line[:cond]>      set a temporary breakpoint
  clear <file:line>              delete a breakpoint
  enable | disable <file:line>   enable or disable a breakpoint
  ignore <file:line> <count>     skip the next <count> hits
  watch <expr>                   add a watch expression
  unwatch <expr>                 delete a watch expression
  breakpoints | watches          list breakpoints or watch expressions
  eval <expr> | exec <stmt>      evaluate in the current frame
  vars [local|global] [frame]    show variables
  threads | thread <id>          list threads or switch thread
  complete <text>                ask for completions
  input <text>                   answer an input request of the program
  fork child|parent              choose the process to follow after a fork
  trace on|off                   report calls and returns
  banner | status                client banner or session state
  help | exit
Anything else is executed in the client's shell.";

/// A parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Step,
    StepOver,
    StepOut,
    StepQuit,
    Continue { special: bool },
    Break(Breakpoint),
    Clear { file: String, line: u32 },
    Enable { file: String, line: u32, enabled: bool },
    Ignore { file: String, line: u32, count: u32 },
    Watch(Watchpoint),
    Unwatch(Watchpoint),
    Breakpoints,
    Watches,
    Eval(String),
    Exec(String),
    Variables { scope: u8, frame: u32 },
    Threads,
    Thread(i64),
    Complete(String),
    Input(String),
    Fork { child: bool },
    Trace(bool),
    Banner,
    Status,
    Help,
    Exit,
    Statement(String),
    Empty,
}

fn location(arg: Option<&str>) -> Result<(String, u32)> {
    let spec = arg.ok_or_else(|| Error::InvalidLocation("expected file:line".to_string()))?;
    let bp = Breakpoint::parse_location(spec)?;
    Ok((bp.file, bp.line))
}

fn require<'a>(rest: &'a str, what: &str) -> Result<&'a str> {
    if rest.is_empty() {
        Err(Error::Usage(format!("missing {}", what)))
    } else {
        Ok(rest)
    }
}

fn watchpoint(expression: &str) -> Watchpoint {
    let (expression, special) = split_condition(expression);
    Watchpoint::new(expression, special)
}

impl ConsoleCommand {
    /// Parse one line of console input
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end();
        if line.trim().is_empty() {
            return Ok(Self::Empty);
        }
        let trimmed = line.trim_start();
        let (word, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (trimmed, ""),
        };
        let args = shlex::split(rest).unwrap_or_default();
        let arg = |i: usize| args.get(i).map(String::as_str);

        let command = match word {
            "step" | "s" => Self::Step,
            "over" | "next" | "n" => Self::StepOver,
            "out" | "finish" => Self::StepOut,
            "quit" => Self::StepQuit,
            "continue" | "c" => Self::Continue {
                special: arg(0) == Some("watch"),
            },
            "break" | "b" | "tbreak" => {
                let mut bp = Breakpoint::parse_location(require(rest, "location")?)?;
                bp.temporary = word == "tbreak";
                Self::Break(bp)
            }
            "clear" => {
                let (file, line) = location(arg(0))?;
                Self::Clear { file, line }
            }
            "enable" | "disable" => {
                let (file, line) = location(arg(0))?;
                Self::Enable {
                    file,
                    line,
                    enabled: word == "enable",
                }
            }
            "ignore" => {
                let (file, line) = location(arg(0))?;
                let count = arg(1)
                    .and_then(|c| c.parse().ok())
                    .ok_or_else(|| Error::Usage("expected an ignore count".to_string()))?;
                Self::Ignore { file, line, count }
            }
            "watch" => Self::Watch(watchpoint(require(rest, "expression")?)),
            "unwatch" => Self::Unwatch(watchpoint(require(rest, "expression")?)),
            "breakpoints" => Self::Breakpoints,
            "watches" => Self::Watches,
            "eval" | "p" => Self::Eval(require(rest, "expression")?.to_string()),
            "exec" => Self::Exec(require(rest, "statement")?.to_string()),
            "vars" => {
                let scope = match arg(0) {
                    None | Some("local") | Some("locals") => SCOPE_LOCAL,
                    Some("global") | Some("globals") => SCOPE_GLOBAL,
                    Some(other) => {
                        return Err(Error::Usage(format!("unknown scope '{}'", other)))
                    }
                };
                let frame = match arg(1) {
                    Some(f) => f
                        .parse()
                        .map_err(|_| Error::Usage(format!("invalid frame '{}'", f)))?,
                    None => 0,
                };
                Self::Variables { scope, frame }
            }
            "threads" => Self::Threads,
            "thread" => {
                let id = arg(0)
                    .and_then(|t| t.parse().ok())
                    .ok_or_else(|| Error::Usage("expected a thread id".to_string()))?;
                Self::Thread(id)
            }
            "complete" => Self::Complete(rest.to_string()),
            "input" => Self::Input(rest.to_string()),
            "fork" => match arg(0) {
                Some("child") => Self::Fork { child: true },
                Some("parent") => Self::Fork { child: false },
                _ => return Err(Error::Usage("expected 'child' or 'parent'".to_string())),
            },
            "trace" => match arg(0) {
                Some("on") => Self::Trace(true),
                Some("off") => Self::Trace(false),
                _ => return Err(Error::Usage("expected 'on' or 'off'".to_string())),
            },
            "banner" => Self::Banner,
            "status" => Self::Status,
            "help" | "?" => Self::Help,
            "exit" => Self::Exit,
            _ => Self::Statement(line.to_string()),
        };
        Ok(command)
    }
}

/// Execute a command; returns false when the console should close
pub async fn execute(handle: &ServerHandle, command: ConsoleCommand) -> Result<bool> {
    match command {
        ConsoleCommand::Empty => {}
        ConsoleCommand::Exit => return Ok(false),
        ConsoleCommand::Help => println!("{}", HELP),
        ConsoleCommand::Step => handle.call(|s| s.remote_step()).await??,
        ConsoleCommand::StepOver => handle.call(|s| s.remote_step_over()).await??,
        ConsoleCommand::StepOut => handle.call(|s| s.remote_step_out()).await??,
        ConsoleCommand::StepQuit => handle.call(|s| s.remote_step_quit()).await??,
        ConsoleCommand::Continue { special } => {
            handle.call(move |s| s.remote_continue(special)).await??
        }
        ConsoleCommand::Break(bp) => {
            let text = format!("{}:{}", bp.file, bp.line);
            handle.call(move |s| s.breakpoints_mut().add(bp)).await??;
            println!("Breakpoint set at {}", text);
        }
        ConsoleCommand::Clear { file, line } => {
            handle
                .call(move |s| s.breakpoints_mut().remove(&(file, line)).map(|_| ()))
                .await??
        }
        ConsoleCommand::Enable {
            file,
            line,
            enabled,
        } => {
            handle
                .call(move |s| s.breakpoints_mut().set_enabled(&(file, line), enabled))
                .await??
        }
        ConsoleCommand::Ignore { file, line, count } => {
            handle
                .call(move |s| s.breakpoints_mut().set_ignore_count(&(file, line), count))
                .await??
        }
        ConsoleCommand::Watch(wp) => handle.call(move |s| s.watchpoints_mut().add(wp)).await??,
        ConsoleCommand::Unwatch(wp) => {
            let key = (wp.expression, wp.special);
            handle
                .call(move |s| s.watchpoints_mut().remove(&key).map(|_| ()))
                .await??
        }
        ConsoleCommand::Breakpoints => {
            let list = handle.call(|s| s.breakpoints().list()).await?;
            if list.is_empty() {
                println!("No breakpoints");
            }
            for bp in list {
                let mut line = format!("{}:{}", bp.file, bp.line);
                if let Some(condition) = &bp.condition {
                    line.push_str(&format!(" if {}", condition));
                }
                if bp.temporary {
                    line.push_str(" (temporary)");
                }
                if bp.ignore_count > 0 {
                    line.push_str(&format!(" (ignore {})", bp.ignore_count));
                }
                if bp.enabled {
                    println!("{}", line);
                } else {
                    println!("{} {}", line.dimmed(), "(disabled)".dimmed());
                }
            }
        }
        ConsoleCommand::Watches => {
            let list = handle.call(|s| s.watchpoints().list()).await?;
            if list.is_empty() {
                println!("No watch expressions");
            }
            for wp in list {
                let state = if wp.enabled { "" } else { " (disabled)" };
                println!("{}{}", wp.wire_condition(), state);
            }
        }
        ConsoleCommand::Eval(expr) => handle.call(move |s| s.remote_eval(&expr)).await??,
        ConsoleCommand::Exec(stmt) => handle.call(move |s| s.remote_exec(&stmt)).await??,
        ConsoleCommand::Variables { scope, frame } => {
            handle
                .call(move |s| s.remote_client_variables(scope, Vec::new(), frame))
                .await??
        }
        ConsoleCommand::Threads => handle.call(|s| s.remote_thread_list()).await??,
        ConsoleCommand::Thread(id) => handle.call(move |s| s.remote_set_thread(id)).await??,
        ConsoleCommand::Complete(text) => {
            handle.call(move |s| s.remote_completion(&text)).await??
        }
        ConsoleCommand::Input(text) => handle.call(move |s| s.remote_raw_input(&text)).await??,
        ConsoleCommand::Fork { child } => handle.call(move |s| s.remote_fork_to(child)).await??,
        ConsoleCommand::Trace(on) => handle.call(move |s| s.set_call_trace_enabled(on)).await??,
        ConsoleCommand::Banner => handle.call(|s| s.remote_banner()).await??,
        ConsoleCommand::Status => {
            let (state, client_type, port) = handle
                .call(|s| (s.state(), s.client_type().to_string(), s.port()))
                .await?;
            println!("State: {}", state.to_string().bold());
            println!("Client type: {}", client_type);
            println!("Port: {}", port);
        }
        ConsoleCommand::Statement(stmt) => {
            handle.call(move |s| s.remote_statement(&stmt)).await??
        }
    }
    Ok(true)
}

/// Whether an event ends a non-interactive session
fn ends_session(event: &Event) -> bool {
    matches!(
        event,
        Event::Exit { .. } | Event::ClientGone { unplanned: true }
    )
}

/// Run the console until `exit`, Ctrl-C, or the end of input
///
/// Once stdin is closed the console keeps printing events until the
/// program exits, so commands can be piped in.
pub async fn run(
    handle: ServerHandle,
    mut events: mpsc::UnboundedReceiver<Event>,
    json: bool,
    persistent: bool,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                print_event(&event, json)?;
                if !input_open && !persistent && ends_session(&event) {
                    break;
                }
            }
            line = lines.next_line(), if input_open => match line? {
                Some(line) => {
                    match ConsoleCommand::parse(&line) {
                        Ok(command) => match execute(&handle, command).await {
                            Ok(true) => {}
                            Ok(false) => break,
                            Err(e) => eprintln!("{} {}", "Error:".red(), e),
                        },
                        Err(e) => eprintln!("{} {}", "Error:".red(), e),
                    }
                }
                None => input_open = false,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.stop();
    Ok(())
}
