//! Configuration file handling

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::paths::{client_dir, config_path};
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Listener and session settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Per client type settings, keyed by lowercase client type
    /// (`python3`, `python2`, `ruby`)
    #[serde(default)]
    pub clients: HashMap<String, ClientConfig>,

    /// Remote execution of the debug client
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Running the debug client inside a console window
    #[serde(default)]
    pub console: ConsoleConfig,

    /// Environment handed to spawned debug clients
    #[serde(default)]
    pub environment: EnvironmentConfig,

    /// Remote/local path translation
    #[serde(default)]
    pub path_translation: PathTranslationConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Project specific debugger properties
    #[serde(default)]
    pub project: Option<ProjectSettings>,
}

/// Listener and session settings
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// `"all"`, `"allv6"` or a literal interface address
    #[serde(default = "default_network_interface")]
    pub network_interface: String,

    /// Wait for externally started clients instead of spawning them
    #[serde(default)]
    pub passive: bool,

    /// Fixed port used in passive mode
    #[serde(default = "default_passive_port")]
    pub passive_port: u16,

    /// Client type assumed for passive connections
    #[serde(default = "default_client_type")]
    pub passive_client_type: String,

    /// Hosts allowed to connect without confirmation
    #[serde(default = "default_allowed_hosts")]
    pub allowed_hosts: Vec<String>,

    /// Restart the debug client after the program exited
    #[serde(default)]
    pub automatic_reset: bool,

    /// Start a fresh client when the connection drops unexpectedly
    #[serde(default = "default_true")]
    pub restart_on_disconnect: bool,

    /// Client type used when none is given and the extension is unknown
    #[serde(default = "default_client_type")]
    pub default_client_type: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            network_interface: default_network_interface(),
            passive: false,
            passive_port: default_passive_port(),
            passive_client_type: default_client_type(),
            allowed_hosts: default_allowed_hosts(),
            automatic_reset: false,
            restart_on_disconnect: true,
            default_client_type: default_client_type(),
        }
    }
}

fn default_network_interface() -> String {
    "127.0.0.1".to_string()
}
fn default_passive_port() -> u16 {
    42424
}
fn default_client_type() -> String {
    "Python3".to_string()
}
fn default_allowed_hosts() -> Vec<String> {
    vec!["127.0.0.1".to_string(), "::1".to_string()]
}
fn default_true() -> bool {
    true
}

/// Settings for one client type
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ClientConfig {
    /// Interpreter executable; empty disables the client type
    #[serde(default)]
    pub interpreter: String,

    /// Debug client script run by the interpreter
    #[serde(default)]
    pub client_script: Option<PathBuf>,

    /// Redirect the debugged program's stdio over the debug connection
    #[serde(default = "default_true")]
    pub redirect: bool,
}

/// Remote execution settings
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RemoteConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Host to run the client on; empty means `localhost`
    #[serde(default)]
    pub host: String,

    /// Remote execution command, e.g. `ssh`
    #[serde(default)]
    pub execution: String,
}

/// Console window settings
#[derive(Debug, Deserialize, Clone)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Console launcher command, e.g. `xterm -e`
    #[serde(default = "default_console_command")]
    pub command: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: default_console_command(),
        }
    }
}

fn default_console_command() -> String {
    "xterm -e".to_string()
}

/// Environment settings for spawned clients
#[derive(Debug, Deserialize, Clone, Default)]
pub struct EnvironmentConfig {
    /// Start from an empty environment instead of inheriting ours
    #[serde(default)]
    pub replace: bool,

    /// Space separated `KEY=value` assignments
    #[serde(default)]
    pub variables: String,
}

/// Path translation between the local and the remote file system
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PathTranslationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub remote: String,
    #[serde(default)]
    pub local: String,
}

/// Timeout settings
#[derive(Debug, Deserialize, Clone)]
pub struct Timeouts {
    /// How long to wait for a killed client process to go away
    #[serde(default = "default_process_kill")]
    pub process_kill_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            process_kill_ms: default_process_kill(),
        }
    }
}

fn default_process_kill() -> u64 {
    1000
}

/// Project specific debugger properties
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProjectSettings {
    #[serde(default)]
    pub interpreter: String,
    #[serde(default)]
    pub client_script: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub redirect: bool,
    #[serde(default)]
    pub remote_debugger: bool,
    #[serde(default)]
    pub remote_host: String,
    #[serde(default)]
    pub remote_command: String,
    #[serde(default)]
    pub path_translation: bool,
    #[serde(default)]
    pub remote_path: String,
    #[serde(default)]
    pub local_path: String,
    #[serde(default)]
    pub environment_override: bool,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub console_debugger: bool,
    #[serde(default)]
    pub console_command: String,
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }

    /// Get client settings for a client type
    ///
    /// Falls back to searching PATH for a Python 3 interpreter and to the
    /// installed client scripts when nothing is configured.
    pub fn client(&self, client_type: &str) -> ClientConfig {
        let mut config = self
            .clients
            .get(&client_type.to_lowercase())
            .cloned()
            .unwrap_or_else(|| ClientConfig {
                redirect: true,
                ..Default::default()
            });

        if config.interpreter.is_empty() && client_type == "Python3" {
            if let Ok(path) = which::which("python3") {
                config.interpreter = path.to_string_lossy().into_owned();
            }
        }

        if config.client_script.is_none() {
            let script = match client_type {
                "Python2" => Some("Python/DebugClient.py"),
                "Python3" => Some("Python3/DebugClient.py"),
                "Ruby" => Some("Ruby/DebugClient.rb"),
                _ => None,
            };
            config.client_script = script.and_then(|s| client_dir().map(|d| d.join(s)));
        }

        config
    }

    /// Whether a client type has an interpreter configured
    pub fn has_interpreter(&self, client_type: &str) -> bool {
        !self.client(client_type).interpreter.is_empty()
    }
}
