//! Response payload decoding
//!
//! Turns the payload following a response token into a typed [`Event`].
//! Decoding never panics; malformed payloads yield a protocol error that
//! the interface reports as an unparseable frame.

use crate::common::{Error, Result};
use crate::events::{Event, StackFrame, ThreadInfo, TraceLocation, Variable};
use crate::wire::tokens::*;
use crate::wire::Literal;

fn parse(token: &str, payload: &str) -> Result<Literal> {
    Literal::parse(payload).map_err(|e| Error::protocol(token, e.to_string()))
}

fn seq<'a>(token: &str, lit: &'a Literal) -> Result<&'a [Literal]> {
    lit.as_seq()
        .ok_or_else(|| Error::protocol(token, "expected a list or tuple"))
}

/// Text of an optional element; missing and None become empty
fn text_at(items: &[Literal], index: usize) -> String {
    match items.get(index) {
        None | Some(Literal::None) => String::new(),
        Some(lit) => lit.text(),
    }
}

fn int(token: &str, lit: &Literal) -> Result<i64> {
    lit.as_int()
        .or_else(|| lit.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| Error::protocol(token, format!("expected an integer, got {}", lit)))
}

fn int_at(token: &str, items: &[Literal], index: usize) -> Result<i64> {
    let lit = items
        .get(index)
        .ok_or_else(|| Error::protocol(token, "missing field"))?;
    int(token, lit)
}

fn line_number(token: &str, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::protocol(token, format!("invalid line number {}", value)))
}

fn frame(token: &str, lit: &Literal) -> Result<StackFrame> {
    let items = seq(token, lit)?;
    if items.len() < 2 {
        return Err(Error::protocol(token, "stack frame needs file and line"));
    }
    Ok(StackFrame {
        file: text_at(items, 0),
        line: line_number(token, int_at(token, items, 1)?)?,
        function: text_at(items, 2),
        args: text_at(items, 3),
    })
}

fn frames(token: &str, items: &[Literal]) -> Result<Vec<StackFrame>> {
    items.iter().map(|lit| frame(token, lit)).collect()
}

fn variables(token: &str, items: &[Literal]) -> Result<Vec<Variable>> {
    items
        .iter()
        .map(|lit| {
            let entry = seq(token, lit)?;
            if entry.len() < 3 {
                return Err(Error::protocol(token, "variable entry needs name, type and value"));
            }
            Ok(Variable {
                name: text_at(entry, 0),
                type_name: text_at(entry, 1),
                value: text_at(entry, 2),
            })
        })
        .collect()
}

/// Split `file,line` with the line after the last comma
fn file_line(token: &str, payload: &str) -> Result<(String, u32)> {
    let (file, line) = payload
        .rsplit_once(',')
        .ok_or_else(|| Error::protocol(token, "expected 'file,line'"))?;
    let line = line
        .trim()
        .parse::<i64>()
        .map_err(|_| Error::protocol(token, format!("invalid line number '{}'", line)))?;
    Ok((file.to_string(), line_number(token, line)?))
}

/// `file:line:function`, the file may itself contain colons
fn trace_location(token: &str, text: &str) -> Result<TraceLocation> {
    let mut parts = text.rsplitn(3, ':');
    let function = parts.next().unwrap_or_default().to_string();
    let line = parts
        .next()
        .and_then(|l| l.parse::<i64>().ok())
        .ok_or_else(|| Error::protocol(token, format!("invalid trace location '{}'", text)))?;
    let file = parts
        .next()
        .ok_or_else(|| Error::protocol(token, format!("invalid trace location '{}'", text)))?;
    Ok(TraceLocation {
        file: file.to_string(),
        line: line_number(token, line)?,
        function,
    })
}

/// Fields of a unittest progress tuple
fn ut_fields(token: &str, payload: &str, count: usize) -> Result<Vec<String>> {
    let lit = parse(token, payload)?;
    let items = seq(token, &lit)?;
    if items.len() < count {
        return Err(Error::protocol(token, format!("expected {} fields", count)));
    }
    Ok((0..count).map(|i| text_at(items, i)).collect())
}

/// Decode a response payload
pub fn decode(token: &'static str, payload: &str) -> Result<Event> {
    let payload = payload.trim_end();
    let event = match token {
        RESPONSE_OK => Event::Statement { more: false },
        RESPONSE_CONTINUE => Event::Statement { more: true },

        RESPONSE_LINE | RESPONSE_STACK => {
            let lit = parse(token, payload)?;
            let stack = frames(token, seq(token, &lit)?)?;
            if token == RESPONSE_STACK {
                Event::Stack { stack }
            } else {
                let top = stack
                    .first()
                    .ok_or_else(|| Error::protocol(token, "empty stack"))?;
                Event::LineReached {
                    file: top.file.clone(),
                    line: top.line,
                    stack,
                }
            }
        }

        RESPONSE_EXCEPTION => {
            if payload.is_empty() {
                Event::Exception {
                    kind: String::new(),
                    message: String::new(),
                    stack: Vec::new(),
                }
            } else {
                let lit = parse(token, payload)?;
                let items = seq(token, &lit)?;
                Event::Exception {
                    kind: text_at(items, 0),
                    message: text_at(items, 1),
                    stack: frames(token, items.get(2..).unwrap_or_default())?,
                }
            }
        }

        RESPONSE_SYNTAX => {
            let lit = parse(token, payload)?;
            let items = seq(token, &lit)?;
            let location = match items.get(1) {
                Some(loc) => seq(token, loc)?.to_vec(),
                None => Vec::new(),
            };
            let line = match location.get(1) {
                Some(lit) => line_number(token, int(token, lit)?)?,
                None => 0,
            };
            let column = match location.get(2) {
                Some(lit) => u32::try_from(int(token, lit)?).unwrap_or(0),
                None => 0,
            };
            Event::SyntaxError {
                message: text_at(items, 0),
                file: text_at(&location, 0),
                line,
                column,
            }
        }

        RESPONSE_SIGNAL => {
            let lit = parse(token, payload)?;
            let items = seq(token, &lit)?;
            let location = items
                .get(1)
                .ok_or_else(|| Error::protocol(token, "missing location"))?;
            let frame = frame(token, location)?;
            Event::Signal {
                message: text_at(items, 0),
                file: frame.file,
                line: frame.line,
                function: frame.function,
                args: frame.args,
            }
        }

        RESPONSE_EXIT => Event::Exit {
            status: payload
                .trim()
                .parse()
                .map_err(|_| Error::protocol(token, format!("invalid exit status '{}'", payload)))?,
        },

        RESPONSE_RAW => {
            let lit = parse(token, payload)?;
            let items = seq(token, &lit)?;
            Event::RawInput {
                prompt: text_at(items, 0),
                echo: items.get(1).and_then(Literal::as_bool).unwrap_or(true),
            }
        }

        RESPONSE_CLEAR_BREAK => {
            let (file, line) = file_line(token, payload)?;
            Event::ClearBreak { file, line }
        }
        RESPONSE_BP_CONDITION_ERROR => {
            let (file, line) = file_line(token, payload)?;
            Event::BreakConditionError { file, line }
        }
        RESPONSE_CLEAR_WATCH => Event::ClearWatch {
            condition: payload.to_string(),
        },
        RESPONSE_WP_CONDITION_ERROR => Event::WatchConditionError {
            condition: payload.to_string(),
        },

        RESPONSE_VARIABLES => {
            let lit = parse(token, payload)?;
            let items = seq(token, &lit)?;
            Event::Variables {
                scope: int_at(token, items, 0)?,
                variables: variables(token, items.get(1..).unwrap_or_default())?,
            }
        }

        RESPONSE_VARIABLE => {
            let lit = parse(token, payload)?;
            let items = seq(token, &lit)?;
            let scope = int_at(token, items, 0)?;
            // Second element names the expanded variable when it is a plain
            // list of strings
            let (path, rest) = match items.get(1) {
                Some(Literal::List(names)) if names.iter().all(|n| n.as_str().is_some()) => (
                    names.iter().map(Literal::text).collect(),
                    items.get(2..).unwrap_or_default(),
                ),
                _ => (Vec::new(), items.get(1..).unwrap_or_default()),
            };
            Event::Variable {
                scope,
                path,
                variables: variables(token, rest)?,
            }
        }

        RESPONSE_THREAD_LIST => {
            let lit = parse(token, payload)?;
            let items = seq(token, &lit)?;
            let current = int_at(token, items, 0)?;
            let list = match items.get(1) {
                Some(list) => seq(token, list)?,
                None => &[],
            };
            let threads = list
                .iter()
                .map(|t| {
                    Ok(ThreadInfo {
                        id: t
                            .get("id")
                            .map(|id| int(token, id))
                            .transpose()?
                            .unwrap_or_default(),
                        name: t.get("name").map(Literal::text).unwrap_or_default(),
                        broken: t.get("broken").and_then(Literal::as_bool).unwrap_or(false),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Event::ThreadList { current, threads }
        }
        RESPONSE_THREAD_SET => Event::ThreadSet,

        RESPONSE_BANNER => {
            let lit = parse(token, payload)?;
            let items = seq(token, &lit)?;
            Event::Banner {
                version: text_at(items, 0),
                platform: text_at(items, 1),
                client: text_at(items, 2),
            }
        }

        RESPONSE_CAPABILITIES => {
            let lit = parse(token, payload)?;
            let items = seq(token, &lit)?;
            let bits = int_at(token, items, 0)?;
            Event::Capabilities {
                capabilities: u32::try_from(bits)
                    .map_err(|_| Error::protocol(token, "invalid capability word"))?,
                client_type: text_at(items, 1),
            }
        }

        RESPONSE_COMPLETION => {
            let (list, text) = payload
                .split_once("||")
                .ok_or_else(|| Error::protocol(token, "expected 'list||text'"))?;
            let lit = parse(token, list)?;
            Event::CompletionList {
                completions: seq(token, &lit)?.iter().map(Literal::text).collect(),
                text: text.to_string(),
            }
        }

        RESPONSE_UT_PREPARED => {
            let lit = parse(token, payload)?;
            let items = seq(token, &lit)?;
            Event::UtPrepared {
                count: int_at(token, items, 0)?,
                exc_type: text_at(items, 1),
                exc_value: text_at(items, 2),
            }
        }
        RESPONSE_UT_START_TEST => {
            let f = ut_fields(token, payload, 2)?;
            Event::UtStartTest {
                test: f[0].clone(),
                doc: f[1].clone(),
            }
        }
        RESPONSE_UT_STOP_TEST => Event::UtStopTest,
        RESPONSE_UT_TEST_FAILED | RESPONSE_UT_TEST_ERRORED | RESPONSE_UT_TEST_FAILED_EXPECTED => {
            let mut f = ut_fields(token, payload, 3)?.into_iter();
            let test = f.next().unwrap_or_default();
            let traceback = f.next().unwrap_or_default();
            let id = f.next().unwrap_or_default();
            match token {
                RESPONSE_UT_TEST_FAILED => Event::UtTestFailed { test, traceback, id },
                RESPONSE_UT_TEST_ERRORED => Event::UtTestErrored { test, traceback, id },
                _ => Event::UtTestFailedExpected { test, traceback, id },
            }
        }
        RESPONSE_UT_TEST_SKIPPED => {
            let f = ut_fields(token, payload, 3)?;
            Event::UtTestSkipped {
                test: f[0].clone(),
                reason: f[1].clone(),
                id: f[2].clone(),
            }
        }
        RESPONSE_UT_TEST_SUCCEEDED_UNEXPECTED => {
            let f = ut_fields(token, payload, 2)?;
            Event::UtTestSucceededUnexpected {
                test: f[0].clone(),
                id: f[1].clone(),
            }
        }
        RESPONSE_UT_FINISHED => Event::UtFinished,

        RESPONSE_FORK_TO => Event::ForkRequested,

        PASSIVE_STARTUP => {
            let (file, exceptions) = payload.split_once('|').unwrap_or((payload, ""));
            let exceptions = match exceptions.trim().parse::<i64>() {
                Ok(flag) => flag != 0,
                Err(_) => !exceptions.trim().is_empty(),
            };
            Event::PassiveDebugStarted {
                file: file.to_string(),
                exceptions,
            }
        }

        CALL_TRACE => {
            let mut parts = payload.splitn(3, "@@");
            let kind = parts.next().unwrap_or_default();
            let (from, to) = match (parts.next(), parts.next()) {
                (Some(from), Some(to)) => (from, to),
                _ => return Err(Error::protocol(token, "expected 'event@@from@@to'")),
            };
            Event::CallTrace {
                is_call: kind.starts_with('c'),
                from: trace_location(token, from)?,
                to: trace_location(token, to)?,
            }
        }

        other => return Err(Error::protocol(other, "no decoder for token")),
    };
    Ok(event)
}
