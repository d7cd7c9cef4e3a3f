//! Launch plans for debug client processes
//!
//! A [`LaunchSpec`] says what to run and with which environment. The builders
//! here produce the three command line shapes debug clients understand:
//! plain, wrapped in a console window, and started through a remote
//! execution command.

use std::path::Path;

use crate::common::{Error, Result};

/// Environment handed to a spawned client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvPolicy {
    /// Keep the server's environment and apply overrides
    Inherit { overrides: Vec<(String, String)> },

    /// Start from an empty environment
    Replace(Vec<(String, String)>),

    /// Leave the environment alone; used for remote execution where the
    /// variables would not reach the client anyway
    Untouched,
}

/// Everything needed to start one process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: EnvPolicy,
}

impl LaunchSpec {
    /// Render the command line for log messages
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(|part| shlex::try_quote(part).map(|q| q.into_owned()).unwrap_or_else(|_| part.to_string()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Parse `A=1 B="two words"` into key/value pairs
///
/// Entries without `=` are skipped. Quotes that survive shell splitting are
/// stripped from the value. Keys ending in `+` are kept as they are; the
/// client appends those to its inherited value.
pub fn parse_environment(text: &str) -> Vec<(String, String)> {
    let words = shlex::split(text).unwrap_or_else(|| {
        text.split_whitespace().map(str::to_string).collect()
    });
    words
        .into_iter()
        .filter_map(|word| {
            let (key, value) = word.split_once('=')?;
            if key.is_empty() {
                return None;
            }
            let value = strip_quotes(value);
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

fn strip_quotes(value: &str) -> &str {
    let quoted = value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')));
    if quoted {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Build the environment policy from a variables string
pub fn environment(replace: bool, variables: &str) -> EnvPolicy {
    let vars = parse_environment(variables);
    if replace {
        EnvPolicy::Replace(vars)
    } else {
        EnvPolicy::Inherit { overrides: vars }
    }
}

/// Split an option string into words, failing on unbalanced quotes
fn split_command(kind: &str, command: &str) -> Result<Vec<String>> {
    let words = shlex::split(command)
        .ok_or_else(|| Error::Config(format!("Unbalanced quotes in {} command '{}'", kind, command)))?;
    if words.is_empty() {
        return Err(Error::Config(format!("Empty {} command", kind)));
    }
    Ok(words)
}

/// Resolve a program name through PATH, keeping it unchanged when not found
fn executable(program: &str) -> String {
    which::which(program)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| program.to_string())
}

fn redirect_flag(redirect: bool) -> &'static str {
    if redirect {
        "1"
    } else {
        "0"
    }
}

fn script_arg(script: &Path) -> String {
    std::path::absolute(script)
        .unwrap_or_else(|_| script.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

/// `interpreter client_script port redirect host`
pub fn plain(
    interpreter: &str,
    client_script: &Path,
    port: u16,
    redirect: bool,
    host: &str,
    env: EnvPolicy,
) -> LaunchSpec {
    LaunchSpec {
        program: interpreter.to_string(),
        args: vec![
            script_arg(client_script),
            port.to_string(),
            redirect_flag(redirect).to_string(),
            host.to_string(),
        ],
        env,
    }
}

/// `console_cmd... interpreter client_script port 0 host`
///
/// Output stays in the console window, so redirection is always off.
pub fn console(
    console_command: &str,
    interpreter: &str,
    client_script: &Path,
    port: u16,
    host: &str,
    env: EnvPolicy,
) -> Result<LaunchSpec> {
    let mut words = split_command("console", console_command)?;
    let program = executable(&words.remove(0));
    words.extend([
        interpreter.to_string(),
        script_arg(client_script),
        port.to_string(),
        "0".to_string(),
        host.to_string(),
    ]);
    Ok(LaunchSpec {
        program,
        args: words,
        env,
    })
}

/// `remote_cmd... remote_host interpreter client_script port redirect host`
pub fn remote(
    remote_command: &str,
    remote_host: &str,
    interpreter: &str,
    client_script: &Path,
    port: u16,
    redirect: bool,
    host: &str,
) -> Result<LaunchSpec> {
    let mut words = split_command("remote execution", remote_command)?;
    let program = executable(&words.remove(0));
    let remote_host = if remote_host.is_empty() {
        "localhost"
    } else {
        remote_host
    };
    words.extend([
        remote_host.to_string(),
        interpreter.to_string(),
        script_arg(client_script),
        port.to_string(),
        redirect_flag(redirect).to_string(),
        host.to_string(),
    ]);
    Ok(LaunchSpec {
        program,
        args: words,
        env: EnvPolicy::Untouched,
    })
}
