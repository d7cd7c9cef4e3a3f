//! Session events
//!
//! Everything the debug server reports to its consumer flows through
//! [`Event`]. Events serialize to tagged JSON for `--json` output.

use serde::Serialize;

/// One frame of a client stack
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackFrame {
    pub file: String,
    pub line: u32,
    pub function: String,
    pub args: String,
}

/// One entry of a variables dump
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variable {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: String,
}

/// A thread as reported by the client
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadInfo {
    pub id: i64,
    pub name: String,
    pub broken: bool,
}

/// Source position of a call trace entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceLocation {
    pub file: String,
    pub line: u32,
    pub function: String,
}

/// Which output stream of the client process produced text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Events raised by the debug server
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    // === Output ===
    /// Program output forwarded over the debug connection
    Output { text: String },

    /// Output of the client process itself
    ProcessOutput { stream: OutputStream, text: String },

    // === Execution ===
    /// Execution stopped at a line; `stack[0]` is the current frame
    LineReached {
        file: String,
        line: u32,
        stack: Vec<StackFrame>,
    },

    /// Stack requested while stopped
    Stack { stack: Vec<StackFrame> },

    /// Shell statement finished; `more` means it needs continuation lines
    Statement { more: bool },

    Exception {
        kind: String,
        message: String,
        stack: Vec<StackFrame>,
    },

    SyntaxError {
        message: String,
        file: String,
        line: u32,
        column: u32,
    },

    Signal {
        message: String,
        file: String,
        line: u32,
        function: String,
        args: String,
    },

    /// The debugged program terminated
    Exit { status: i64 },

    /// The client connection closed
    ClientGone { unplanned: bool },

    // === Breakpoints and watches ===
    /// The client removed a temporary breakpoint
    ClearBreak { file: String, line: u32 },

    ClearWatch { condition: String },

    /// The client could not compile a breakpoint condition
    BreakConditionError { file: String, line: u32 },

    WatchConditionError { condition: String },

    // === Inspection ===
    ThreadList {
        current: i64,
        threads: Vec<ThreadInfo>,
    },

    ThreadSet,

    Variables {
        scope: i64,
        variables: Vec<Variable>,
    },

    /// Members of one expanded variable
    Variable {
        scope: i64,
        path: Vec<String>,
        variables: Vec<Variable>,
    },

    CompletionList { completions: Vec<String>, text: String },

    // === Interaction ===
    /// The debugged program waits for input
    RawInput { prompt: String, echo: bool },

    RawInputSent,

    Banner {
        version: String,
        platform: String,
        client: String,
    },

    Capabilities { capabilities: u32, client_type: String },

    CallTrace {
        is_call: bool,
        from: TraceLocation,
        to: TraceLocation,
    },

    /// The client asks whether to follow the child or the parent of a fork
    ForkRequested,

    // === Unit tests ===
    UtPrepared {
        count: i64,
        exc_type: String,
        exc_value: String,
    },
    UtStartTest { test: String, doc: String },
    UtStopTest,
    UtTestFailed { test: String, traceback: String, id: String },
    UtTestErrored { test: String, traceback: String, id: String },
    UtTestSkipped { test: String, reason: String, id: String },
    UtTestFailedExpected { test: String, traceback: String, id: String },
    UtTestSucceededUnexpected { test: String, id: String },
    UtFinished,

    // === Session ===
    /// A passively started client announced the program it debugs
    PassiveDebugStarted { file: String, exceptions: bool },

    PassiveSessionClosed,

    InterpreterChanged { interpreter: String },

    ConnectionRefused { peer: String },

    /// A response carried a payload that could not be decoded
    UnparseableFrame {
        token: String,
        payload: String,
        reason: String,
    },

    /// User facing message, typically a start failure
    Notification { message: String },
}

impl Event {
    /// Build an output event for one received line
    pub fn output(line: &str) -> Self {
        Event::Output {
            text: format!("{}\n", line),
        }
    }

    /// Build an unparseable frame event
    pub fn unparseable(token: &str, payload: &str, reason: impl ToString) -> Self {
        Event::UnparseableFrame {
            token: token.to_string(),
            payload: payload.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Events only meaningful while a program runs
    pub fn requires_running(&self) -> bool {
        matches!(
            self,
            Event::Exception { .. } | Event::SyntaxError { .. } | Event::Signal { .. }
        )
    }
}
