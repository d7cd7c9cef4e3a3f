//! CLI command definitions
//!
//! Defines the clap commands for the debug server CLI.

use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Options shared by every command that starts a program
#[derive(Args, Debug, Clone, Default)]
pub struct ProgramArgs {
    /// Client type (Python3, Python2, Ruby); derived from the extension by default
    #[arg(long)]
    pub client_type: Option<String>,

    /// Working directory of the program (default: the script's directory)
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Environment assignments, e.g. 'A=1 B="two words"'
    #[arg(long, default_value = "")]
    pub env: String,

    /// Set a breakpoint before the program starts (file:line[:condition])
    /// Can be specified multiple times: --break app.py:12 --break app.py:30:x>1
    #[arg(long = "break", short = 'b')]
    pub breakpoints: Vec<String>,

    /// Watch an expression; suffix with '??created??' or '??changed??' for
    /// the special forms
    #[arg(long = "watch", short = 'w')]
    pub watches: Vec<String>,

    /// Start the debug client inside the configured console
    #[arg(long)]
    pub console: bool,

    /// Use the project debugger settings from the configuration file
    #[arg(long)]
    pub project: bool,

    /// Follow the child process when the program forks
    #[arg(long)]
    pub fork_child: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Debug a script, stopping at breakpoints
    #[command(alias = "d")]
    Debug {
        /// Script to debug
        file: PathBuf,

        /// Arguments to pass to the script
        #[arg(last = true)]
        args: Vec<String>,

        #[command(flatten)]
        program: ProgramArgs,

        /// Stop at the first line instead of running to the first breakpoint
        #[arg(long)]
        stop_on_entry: bool,

        /// Also trace into the interpreter's own modules
        #[arg(long)]
        trace_interpreter: bool,

        /// Report every call and return
        #[arg(long)]
        call_trace: bool,
    },

    /// Run a script without stopping
    Run {
        file: PathBuf,

        #[arg(last = true)]
        args: Vec<String>,

        #[command(flatten)]
        program: ProgramArgs,
    },

    /// Run a script with coverage collection
    Coverage {
        file: PathBuf,

        #[arg(last = true)]
        args: Vec<String>,

        #[command(flatten)]
        program: ProgramArgs,

        /// Erase previously collected coverage data
        #[arg(long)]
        erase: bool,
    },

    /// Run a script under the profiler
    Profile {
        file: PathBuf,

        #[arg(last = true)]
        args: Vec<String>,

        #[command(flatten)]
        program: ProgramArgs,

        /// Erase previously collected timing data
        #[arg(long)]
        erase: bool,
    },

    /// Wait for externally started debug clients (passive mode)
    Listen {
        /// Port to listen on (default: the configured passive port)
        #[arg(long)]
        port: Option<u16>,

        /// Breakpoints sent once a client announces its program
        #[arg(long = "break", short = 'b')]
        breakpoints: Vec<String>,

        /// Watch expressions sent once a client announces its program
        #[arg(long = "watch", short = 'w')]
        watches: Vec<String>,

        /// Accept connections from any host without asking
        #[arg(long)]
        allow_any_host: bool,
    },

    /// List the available client types
    Languages {
        /// Only client types with an interactive shell
        #[arg(long)]
        shell_only: bool,
    },
}
