//! Configuration, log and debug client paths
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/debug-server/`, `~/.local/share/debug-server/`
//! - macOS: `~/Library/Application Support/debug-server/`
//! - Windows: `%APPDATA%\debug-server\`

use std::path::{Path, PathBuf};

/// Application name used for all per-user directories
const APP_NAME: &str = "debug-server";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the path to the log directory
pub fn log_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("logs"))
}

/// Directory holding the installed debug client scripts, one sub-directory
/// per client type (`Python3/DebugClient.py`, `Ruby/DebugClient.rb`, ...)
pub fn client_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("DebugClients"))
}

/// Absolute form of `file`, resolved against the current directory
///
/// The file does not need to exist; `..` components are kept.
pub fn absolute(file: impl AsRef<Path>) -> String {
    let file = file.as_ref();
    std::path::absolute(file)
        .unwrap_or_else(|_| file.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

/// Name of the local host, used when a client must connect back from
/// another machine
#[cfg(unix)]
pub fn local_hostname() -> String {
    let mut buf = [0u8; 256];
    // SAFETY: the buffer is valid for its full length and gethostname
    // NUL-terminates on success.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return "localhost".to_string();
    }
    let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

#[cfg(not(unix))]
pub fn local_hostname() -> String {
    std::env::var("COMPUTERNAME").unwrap_or_else(|_| "localhost".to_string())
}
