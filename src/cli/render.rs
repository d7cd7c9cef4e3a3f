//! Event formatting for the console
//!
//! Events are printed as colored text or, with `--json`, one JSON object
//! per line.

use colored::Colorize;

use crate::common::Result;
use crate::events::{Event, OutputStream, StackFrame, TraceLocation};
use crate::interface::Capabilities;

fn frame_line(index: usize, frame: &StackFrame) -> String {
    format!(
        "  #{} {}({}) at {}:{}",
        index, frame.function, frame.args, frame.file, frame.line
    )
}

fn stack_lines(stack: &[StackFrame]) -> String {
    stack
        .iter()
        .enumerate()
        .map(|(i, f)| frame_line(i, f))
        .collect::<Vec<_>>()
        .join("\n")
}

fn location(loc: &TraceLocation) -> String {
    format!("{}:{} {}", loc.file, loc.line, loc.function)
}

/// Text form of an event; `None` for events not worth a line
pub fn format_event(event: &Event) -> Option<String> {
    let text = match event {
        Event::Output { text } => text.trim_end_matches('\n').to_string(),
        Event::ProcessOutput { stream, text } => {
            let text = text.trim_end_matches('\n');
            match stream {
                OutputStream::Stdout => text.dimmed().to_string(),
                OutputStream::Stderr => text.red().to_string(),
            }
        }
        Event::LineReached { file, line, stack } => {
            let function = stack.first().map(|f| f.function.as_str()).unwrap_or("?");
            format!("{} {}:{} in {}", "Stopped at".cyan().bold(), file, line, function)
        }
        Event::Stack { stack } => format!("{}\n{}", "Stack:".bold(), stack_lines(stack)),
        Event::Statement { more: true } => "...".dimmed().to_string(),
        Event::Statement { more: false } => return None,
        Event::Exception {
            kind,
            message,
            stack,
        } => {
            if kind.is_empty() {
                "Unhandled exception".red().bold().to_string()
            } else {
                let head = format!("{}: {}", kind, message).red().bold().to_string();
                if stack.is_empty() {
                    head
                } else {
                    format!("{}\n{}", head, stack_lines(stack))
                }
            }
        }
        Event::SyntaxError {
            message,
            file,
            line,
            column,
        } => format!(
            "{} {} ({}:{}:{})",
            "Syntax error:".red().bold(),
            message,
            file,
            line,
            column
        ),
        Event::Signal {
            message,
            file,
            line,
            function,
            ..
        } => format!(
            "{} {} at {}:{} in {}",
            "Signal:".red().bold(),
            message,
            file,
            line,
            function
        ),
        Event::Exit { status } => {
            let text = format!("Program exited with status {}", status);
            if *status == 0 {
                text.green().to_string()
            } else {
                text.yellow().to_string()
            }
        }
        Event::ClientGone { unplanned: true } => {
            "Debug client terminated unexpectedly".red().bold().to_string()
        }
        Event::ClientGone { unplanned: false } => "Debug client disconnected".dimmed().to_string(),
        Event::ClearBreak { file, line } => {
            format!("Temporary breakpoint {}:{} removed", file, line)
        }
        Event::ClearWatch { condition } => format!("Temporary watch '{}' removed", condition),
        Event::BreakConditionError { file, line } => format!(
            "{} of breakpoint {}:{}",
            "Invalid condition".red(),
            file,
            line
        ),
        Event::WatchConditionError { condition } => {
            format!("{} '{}'", "Invalid watch expression".red(), condition)
        }
        Event::ThreadList { current, threads } => {
            let mut lines = vec!["Threads:".bold().to_string()];
            for thread in threads {
                let marker = if thread.id == *current { "*" } else { " " };
                let state = if thread.broken { "waiting" } else { "running" };
                lines.push(format!("{} {} {} ({})", marker, thread.id, thread.name, state));
            }
            lines.join("\n")
        }
        Event::ThreadSet => "Thread switched".to_string(),
        Event::Variables { scope, variables } => {
            let title = if *scope == 0 { "Globals:" } else { "Locals:" };
            let mut lines = vec![title.bold().to_string()];
            for var in variables {
                lines.push(format!("  {} ({}) = {}", var.name, var.type_name, var.value));
            }
            lines.join("\n")
        }
        Event::Variable {
            path, variables, ..
        } => {
            let mut lines = vec![format!("{}:", path.join(".")).bold().to_string()];
            for var in variables {
                lines.push(format!("  {} ({}) = {}", var.name, var.type_name, var.value));
            }
            lines.join("\n")
        }
        Event::CompletionList { completions, text } => {
            if completions.is_empty() {
                format!("No completions for '{}'", text)
            } else {
                completions.join("  ")
            }
        }
        Event::RawInput { prompt, .. } => format!(
            "{}{}",
            prompt,
            "(answer with 'input <text>')".dimmed()
        ),
        Event::RawInputSent => return None,
        Event::Banner {
            version,
            platform,
            client,
        } => {
            if platform.is_empty() {
                version.clone()
            } else {
                format!("{} on {}, {}", version, platform, client)
            }
        }
        Event::Capabilities {
            capabilities,
            client_type,
        } => format!(
            "{} client: {}",
            client_type,
            Capabilities::from_wire(i64::from(*capabilities))
                .describe()
                .join(", ")
        ),
        Event::CallTrace { is_call, from, to } => {
            let arrow = if *is_call { "->" } else { "<-" };
            format!("{} {} {}", location(from), arrow.dimmed(), location(to))
        }
        Event::ForkRequested => format!(
            "{} answer with 'fork child' or 'fork parent'",
            "Program forked:".yellow()
        ),
        Event::UtPrepared {
            count,
            exc_type,
            exc_value,
        } => {
            if exc_type.is_empty() {
                format!("{} tests collected", count)
            } else {
                format!("{} {}: {}", "Test preparation failed:".red(), exc_type, exc_value)
            }
        }
        Event::UtStartTest { test, .. } => format!("{} ...", test),
        Event::UtStopTest => return None,
        Event::UtTestFailed { test, traceback, .. } => {
            format!("{} {}\n{}", "FAIL".red().bold(), test, traceback)
        }
        Event::UtTestErrored { test, traceback, .. } => {
            format!("{} {}\n{}", "ERROR".red().bold(), test, traceback)
        }
        Event::UtTestSkipped { test, reason, .. } => {
            format!("{} {} ({})", "skip".yellow(), test, reason)
        }
        Event::UtTestFailedExpected { test, .. } => format!("{} {}", "expected failure".dimmed(), test),
        Event::UtTestSucceededUnexpected { test, .. } => {
            format!("{} {}", "unexpected success".yellow(), test)
        }
        Event::UtFinished => "Tests finished".green().to_string(),
        Event::PassiveDebugStarted { file, .. } => {
            format!("{} {}", "Debugging".cyan().bold(), file)
        }
        Event::PassiveSessionClosed => "Passive debug connection closed".dimmed().to_string(),
        Event::InterpreterChanged { interpreter } => {
            if interpreter.is_empty() {
                return None;
            }
            format!("Interpreter: {}", interpreter).dimmed().to_string()
        }
        Event::ConnectionRefused { peer } => {
            format!("{} {}", "Refused connection from".yellow(), peer)
        }
        Event::UnparseableFrame { token, reason, .. } => {
            format!("{} {}: {}", "Unreadable response".red(), token, reason)
        }
        Event::Notification { message } => message.yellow().bold().to_string(),
    };
    Some(text)
}

/// Print one event to stdout
pub fn print_event(event: &Event, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
    } else if let Some(text) = format_event(event) {
        println!("{}", text);
    }
    Ok(())
}
