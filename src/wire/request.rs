//! Requests sent to a debug client
//!
//! [`Request::to_wire`] produces the exact line format the debug clients
//! expect. Separators differ per request and are part of the protocol.

use super::literal::Literal;
use super::tokens::*;

/// Variable scope selector used by the variables requests
pub const SCOPE_GLOBAL: u8 = 0;
pub const SCOPE_LOCAL: u8 = 1;

/// A request to the debug client
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Environment for the debugged program
    Environment(Vec<(String, String)>),
    Capabilities,
    ForkMode {
        auto_fork: bool,
        fork_child: bool,
    },
    /// Load a program for debugging
    ///
    /// `auto_continue` is not sent; it tells the interface to answer the
    /// first line-reached report with a continue.
    Load {
        wd: String,
        file: String,
        argv: Vec<String>,
        trace_interpreter: bool,
        auto_continue: bool,
    },
    Run {
        wd: String,
        file: String,
        argv: Vec<String>,
    },
    Coverage {
        wd: String,
        file: String,
        argv: Vec<String>,
        erase: bool,
    },
    Profile {
        wd: String,
        file: String,
        argv: Vec<String>,
        erase: bool,
    },
    /// A statement for the client's interactive shell
    Statement(String),
    Step,
    StepOver,
    StepOut,
    StepQuit,
    Continue {
        special: bool,
    },
    Break {
        file: String,
        line: u32,
        set: bool,
        condition: Option<String>,
        temporary: bool,
    },
    EnableBreak {
        file: String,
        line: u32,
        enable: bool,
    },
    IgnoreBreak {
        file: String,
        line: u32,
        count: u32,
    },
    /// `condition` carries the wire form including any special suffix
    Watch {
        condition: String,
        set: bool,
        temporary: bool,
    },
    EnableWatch {
        condition: String,
        enable: bool,
    },
    IgnoreWatch {
        condition: String,
        count: u32,
    },
    /// Answer to a raw input request of the debugged program
    RawInput(String),
    ThreadList,
    ThreadSet(i64),
    Variables {
        frame: u32,
        scope: u8,
        filter: Vec<i64>,
    },
    Variable {
        path: Vec<String>,
        frame: u32,
        scope: u8,
        filter: Vec<i64>,
    },
    SetFilter {
        scope: u8,
        filter: String,
    },
    CallTrace(bool),
    Eval(String),
    Exec(String),
    Banner,
    Completion(String),
    UtPrepare {
        file: String,
        test_name: String,
        test_function: String,
        failed: Vec<String>,
        coverage: bool,
        coverage_file: String,
        erase: bool,
    },
    UtRun,
    UtStop,
    ForkTo {
        child: bool,
    },
    Shutdown,
}

fn flag(b: bool) -> u8 {
    u8::from(b)
}

fn int_list(items: &[i64]) -> Literal {
    Literal::List(items.iter().map(|i| Literal::Int(*i)).collect())
}

impl Request {
    /// Short name for logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            Request::Environment(_) => "environment",
            Request::Capabilities => "capabilities",
            Request::ForkMode { .. } => "fork mode",
            Request::Load { .. } => "load",
            Request::Run { .. } => "run",
            Request::Coverage { .. } => "coverage",
            Request::Profile { .. } => "profile",
            Request::Statement(_) => "statement",
            Request::Step => "step",
            Request::StepOver => "step over",
            Request::StepOut => "step out",
            Request::StepQuit => "step quit",
            Request::Continue { .. } => "continue",
            Request::Break { .. } => "breakpoint",
            Request::EnableBreak { .. } => "enable breakpoint",
            Request::IgnoreBreak { .. } => "ignore breakpoint",
            Request::Watch { .. } => "watch expression",
            Request::EnableWatch { .. } => "enable watch expression",
            Request::IgnoreWatch { .. } => "ignore watch expression",
            Request::RawInput(_) => "raw input",
            Request::ThreadList => "thread list",
            Request::ThreadSet(_) => "thread set",
            Request::Variables { .. } => "variables",
            Request::Variable { .. } => "variable",
            Request::SetFilter { .. } => "set filter",
            Request::CallTrace(_) => "call trace",
            Request::Eval(_) => "eval",
            Request::Exec(_) => "exec",
            Request::Banner => "banner",
            Request::Completion(_) => "completion",
            Request::UtPrepare { .. } => "unittest prepare",
            Request::UtRun => "unittest run",
            Request::UtStop => "unittest stop",
            Request::ForkTo { .. } => "fork to",
            Request::Shutdown => "shutdown",
        }
    }

    /// Apply `f` to every file system path carried by the request
    pub fn map_paths(self, f: impl Fn(&str) -> String) -> Request {
        match self {
            Request::Load { wd, file, argv, trace_interpreter, auto_continue } => Request::Load {
                wd: f(&wd),
                file: f(&file),
                argv,
                trace_interpreter,
                auto_continue,
            },
            Request::Run { wd, file, argv } => Request::Run { wd: f(&wd), file: f(&file), argv },
            Request::Coverage { wd, file, argv, erase } => Request::Coverage {
                wd: f(&wd),
                file: f(&file),
                argv,
                erase,
            },
            Request::Profile { wd, file, argv, erase } => Request::Profile {
                wd: f(&wd),
                file: f(&file),
                argv,
                erase,
            },
            Request::Break { file, line, set, condition, temporary } => Request::Break {
                file: f(&file),
                line,
                set,
                condition,
                temporary,
            },
            Request::EnableBreak { file, line, enable } => Request::EnableBreak {
                file: f(&file),
                line,
                enable,
            },
            Request::IgnoreBreak { file, line, count } => Request::IgnoreBreak {
                file: f(&file),
                line,
                count,
            },
            Request::UtPrepare {
                file,
                test_name,
                test_function,
                failed,
                coverage,
                coverage_file,
                erase,
            } => Request::UtPrepare {
                file: f(&file),
                test_name,
                test_function,
                failed,
                coverage,
                coverage_file,
                erase,
            },
            other => other,
        }
    }

    /// Encode as newline terminated protocol text
    pub fn to_wire(&self) -> String {
        match self {
            Request::Environment(vars) => {
                let dict = Literal::Dict(
                    vars.iter()
                        .map(|(k, v)| (Literal::from(k.as_str()), Literal::from(v.as_str())))
                        .collect(),
                );
                format!("{}{}\n", REQUEST_ENV, dict)
            }
            Request::Capabilities => format!("{}\n", REQUEST_CAPABILITIES),
            Request::ForkMode { auto_fork, fork_child } => format!(
                "{}{}\n",
                REQUEST_FORK_MODE,
                Literal::Tuple(vec![(*auto_fork).into(), (*fork_child).into()])
            ),
            Request::Load { wd, file, argv, trace_interpreter, .. } => format!(
                "{}{}|{}|{}|{}\n",
                REQUEST_LOAD,
                wd,
                file,
                Literal::str_list(argv.iter().cloned()),
                flag(*trace_interpreter)
            ),
            Request::Run { wd, file, argv } => format!(
                "{}{}|{}|{}\n",
                REQUEST_RUN,
                wd,
                file,
                Literal::str_list(argv.iter().cloned())
            ),
            Request::Coverage { wd, file, argv, erase } => format!(
                "{}{}@@{}@@{}@@{}\n",
                REQUEST_COVERAGE,
                wd,
                file,
                Literal::str_list(argv.iter().cloned()),
                flag(*erase)
            ),
            Request::Profile { wd, file, argv, erase } => format!(
                "{}{}|{}|{}|{}\n",
                REQUEST_PROFILE,
                wd,
                file,
                Literal::str_list(argv.iter().cloned()),
                flag(*erase)
            ),
            Request::Statement(stmt) => format!("{}\n{}\n", stmt, REQUEST_OK),
            Request::Step => format!("{}\n", REQUEST_STEP),
            Request::StepOver => format!("{}\n", REQUEST_STEP_OVER),
            Request::StepOut => format!("{}\n", REQUEST_STEP_OUT),
            Request::StepQuit => format!("{}\n", REQUEST_STEP_QUIT),
            Request::Continue { special } => format!("{}{}\n", REQUEST_CONTINUE, flag(*special)),
            Request::Break { file, line, set, condition, temporary } => {
                let condition = condition.as_deref().filter(|c| !c.is_empty()).unwrap_or("None");
                format!(
                    "{}{}@@{}@@{}@@{}@@{}\n",
                    REQUEST_BREAK,
                    file,
                    line,
                    flag(*temporary),
                    flag(*set),
                    condition
                )
            }
            Request::EnableBreak { file, line, enable } => {
                format!("{}{},{},{}\n", REQUEST_BREAK_ENABLE, file, line, flag(*enable))
            }
            Request::IgnoreBreak { file, line, count } => {
                format!("{}{},{},{}\n", REQUEST_BREAK_IGNORE, file, line, count)
            }
            Request::Watch { condition, set, temporary } => format!(
                "{}{}@@{}@@{}\n",
                REQUEST_WATCH,
                condition,
                flag(*temporary),
                flag(*set)
            ),
            Request::EnableWatch { condition, enable } => {
                format!("{}{},{}\n", REQUEST_WATCH_ENABLE, condition, flag(*enable))
            }
            Request::IgnoreWatch { condition, count } => {
                format!("{}{},{}\n", REQUEST_WATCH_IGNORE, condition, count)
            }
            Request::RawInput(text) => format!("{}\n", text),
            Request::ThreadList => format!("{}\n", REQUEST_THREAD_LIST),
            Request::ThreadSet(tid) => format!("{}{}\n", REQUEST_THREAD_SET, tid),
            Request::Variables { frame, scope, filter } => format!(
                "{}{}, {}, {}\n",
                REQUEST_VARIABLES,
                frame,
                scope,
                int_list(filter)
            ),
            Request::Variable { path, frame, scope, filter } => format!(
                "{}{}, {}, {}, {}\n",
                REQUEST_VARIABLE,
                Literal::str_list(path.iter().cloned()),
                frame,
                scope,
                int_list(filter)
            ),
            Request::SetFilter { scope, filter } => {
                format!("{}{}, \"{}\"\n", REQUEST_SET_FILTER, scope, filter)
            }
            Request::CallTrace(on) => {
                format!("{}{}\n", REQUEST_CALL_TRACE, if *on { "on" } else { "off" })
            }
            Request::Eval(expr) => format!("{}{}\n", REQUEST_EVAL, expr),
            Request::Exec(stmt) => format!("{}{}\n", REQUEST_EXEC, stmt),
            Request::Banner => format!("{}\n", REQUEST_BANNER),
            Request::Completion(text) => format!("{}{}\n", REQUEST_COMPLETION, text),
            Request::UtPrepare {
                file,
                test_name,
                test_function,
                failed,
                coverage,
                coverage_file,
                erase,
            } => format!(
                "{}{}|{}|{}|{}|{}|{}|{}\n",
                REQUEST_UT_PREPARE,
                file,
                test_name,
                test_function,
                Literal::str_list(failed.iter().cloned()),
                flag(*coverage),
                coverage_file,
                flag(*erase)
            ),
            Request::UtRun => format!("{}\n", REQUEST_UT_RUN),
            Request::UtStop => format!("{}\n", REQUEST_UT_STOP),
            Request::ForkTo { child } => {
                format!("{}{}\n", REQUEST_FORK_TO, if *child { "child" } else { "parent" })
            }
            Request::Shutdown => format!("{}\n", REQUEST_SHUTDOWN),
        }
    }
}
