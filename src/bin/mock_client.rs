//! Mock debug client for integration testing
//!
//! Speaks the client side of the debug protocol without running any code.
//! The "program" is a text file; each of its lines is one executable line.
//!
//! Usage, matching how the server starts clients:
//!
//! ```text
//! mock_client <script> <port> <redirect> <host>
//! mock_client --passive <script> <port> <host>
//! ```

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;

use debug_server::wire::tokens::*;
use debug_server::wire::Literal;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (passive, args) = match args.first().map(String::as_str) {
        Some("--passive") => (true, &args[1..]),
        _ => (false, &args[..]),
    };
    if args.len() < 3 {
        eprintln!("usage: mock_client [--passive] <script> <port> [<redirect>] <host>");
        std::process::exit(2);
    }

    let script = args[0].clone();
    let port: u16 = match args[1].parse() {
        Ok(port) => port,
        Err(_) => {
            eprintln!("mock_client: invalid port '{}'", args[1]);
            std::process::exit(2);
        }
    };
    let host = args.last().cloned().unwrap_or_default();
    // "addr@@i0", "name@@v4"
    let host = host.split("@@").next().unwrap_or("127.0.0.1").to_string();

    let stream = match TcpStream::connect((host.as_str(), port)) {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("mock_client: cannot connect to {}:{}: {}", host, port, e);
            std::process::exit(1);
        }
    };
    let reader = match stream.try_clone() {
        Ok(reader) => BufReader::new(reader),
        Err(e) => {
            eprintln!("mock_client: {}", e);
            std::process::exit(1);
        }
    };

    let mut client = MockClient::new(stream);
    if passive {
        client.passive_startup(&script);
    }

    for line in reader.lines() {
        let Ok(line) = line else { break };
        if !client.handle(&line) {
            break;
        }
    }
}

struct MockBreakpoint {
    file: String,
    line: u32,
    temporary: bool,
}

struct MockClient {
    writer: TcpStream,
    file: String,
    lines: u32,
    current: u32,
    breakpoints: Vec<MockBreakpoint>,
    statement: Vec<String>,
}

impl MockClient {
    fn new(writer: TcpStream) -> Self {
        Self {
            writer,
            file: String::new(),
            lines: 0,
            current: 0,
            breakpoints: Vec::new(),
            statement: Vec::new(),
        }
    }

    fn send(&mut self, text: &str) {
        let _ = self.writer.write_all(text.as_bytes());
        let _ = self.writer.write_all(b"\n");
        let _ = self.writer.flush();
    }

    fn respond(&mut self, token: &str, payload: impl std::fmt::Display) {
        self.send(&format!("{}{}", token, payload));
    }

    fn load(&mut self, file: &str) {
        self.file = file.to_string();
        self.lines = std::fs::read_to_string(file)
            .map(|text| text.lines().count() as u32)
            .unwrap_or(10)
            .max(1);
        self.current = 1;
    }

    fn passive_startup(&mut self, file: &str) {
        self.load(file);
        let startup = format!("{}|0", self.file);
        self.respond(PASSIVE_STARTUP, startup);
        self.report_line();
    }

    fn report_line(&mut self) {
        let frame = Literal::List(vec![
            Literal::from(self.file.as_str()),
            Literal::Int(i64::from(self.current)),
            Literal::from("<module>"),
            Literal::from(""),
        ]);
        self.respond(RESPONSE_LINE, Literal::List(vec![frame]));
    }

    fn exit(&mut self, status: i64) {
        self.file.clear();
        self.current = 0;
        self.respond(RESPONSE_EXIT, status);
    }

    fn step(&mut self) {
        if self.file.is_empty() {
            return;
        }
        self.current += 1;
        if self.current > self.lines {
            self.exit(0);
        } else {
            self.report_line();
        }
    }

    fn continue_to_breakpoint(&mut self) {
        if self.file.is_empty() {
            return;
        }
        let next = self
            .breakpoints
            .iter()
            .filter(|bp| bp.file == self.file && bp.line > self.current && bp.line <= self.lines)
            .min_by_key(|bp| bp.line)
            .map(|bp| (bp.line, bp.temporary));
        match next {
            Some((line, temporary)) => {
                self.current = line;
                if temporary {
                    self.breakpoints
                        .retain(|bp| !(bp.file == self.file && bp.line == line));
                    let cleared = format!("{},{}", self.file, line);
                    self.respond(RESPONSE_CLEAR_BREAK, cleared);
                }
                self.report_line();
            }
            None => self.exit(0),
        }
    }

    fn set_breakpoint(&mut self, payload: &str) {
        let parts: Vec<&str> = payload.split("@@").collect();
        if parts.len() < 4 {
            return;
        }
        let file = parts[0].to_string();
        let Ok(line) = parts[1].parse::<u32>() else {
            return;
        };
        self.breakpoints
            .retain(|bp| !(bp.file == file && bp.line == line));
        if parts[3] == "1" {
            self.breakpoints.push(MockBreakpoint {
                file,
                line,
                temporary: parts[2] == "1",
            });
        }
    }

    fn variables(&mut self, payload: &str) {
        let scope = Literal::parse(payload)
            .ok()
            .and_then(|lit| lit.as_seq().and_then(|items| items.get(1)?.as_int()))
            .unwrap_or(0);
        let var = |name: &str, kind: &str, value: &str| {
            Literal::Tuple(vec![name.into(), kind.into(), value.into()])
        };
        let mut items = vec![Literal::Int(scope)];
        if scope == 0 {
            items.push(var("__name__", "str", "'__main__'"));
        } else {
            items.push(var("answer", "int", "42"));
            items.push(var("line", "int", &self.current.to_string()));
        }
        self.respond(RESPONSE_VARIABLES, Literal::List(items));
    }

    fn thread_list(&mut self) {
        let thread = Literal::Dict(vec![
            (Literal::from("id"), Literal::Int(1)),
            (Literal::from("name"), Literal::from("MainThread")),
            (Literal::from("broken"), Literal::Bool(!self.file.is_empty())),
        ]);
        self.respond(
            RESPONSE_THREAD_LIST,
            Literal::Tuple(vec![Literal::Int(1), Literal::List(vec![thread])]),
        );
    }

    fn completion(&mut self, text: &str) {
        let words = ["print", "property", "range", "repr"];
        let matches = Literal::str_list(words.iter().filter(|w| w.starts_with(text)).copied());
        self.respond(RESPONSE_COMPLETION, format!("{}||{}", matches, text));
    }

    /// Handle one line from the server; false ends the session
    fn handle(&mut self, line: &str) -> bool {
        if line == REQUEST_OK {
            let statement = std::mem::take(&mut self.statement).join("\n");
            if !statement.trim().is_empty() {
                self.send(&format!("= {}", statement.trim()));
            }
            self.send(RESPONSE_OK);
            return true;
        }

        let Some((token, payload)) = split_token(line) else {
            self.statement.push(line.to_string());
            return true;
        };

        match token {
            REQUEST_SHUTDOWN => return false,
            REQUEST_CAPABILITIES => self.respond(
                RESPONSE_CAPABILITIES,
                Literal::Tuple(vec![Literal::Int(127), Literal::from("Python3")]),
            ),
            REQUEST_BANNER => self.respond(
                RESPONSE_BANNER,
                Literal::Tuple(vec!["Mock 1.0".into(), "mock".into(), "mock_client".into()]),
            ),
            REQUEST_LOAD => {
                let file = payload.split('|').nth(1).unwrap_or_default().to_string();
                self.load(&file);
                self.send(&format!("Loading {}", file));
                self.report_line();
            }
            REQUEST_RUN => {
                let file = payload.split('|').nth(1).unwrap_or_default().to_string();
                self.load(&file);
                self.send(&format!("Running {}", file));
                self.exit(0);
            }
            REQUEST_BREAK => self.set_breakpoint(payload),
            REQUEST_CONTINUE => self.continue_to_breakpoint(),
            REQUEST_STEP | REQUEST_STEP_OVER | REQUEST_STEP_OUT => self.step(),
            REQUEST_STEP_QUIT => {
                if !self.file.is_empty() {
                    self.exit(1);
                }
            }
            REQUEST_VARIABLES => self.variables(payload),
            REQUEST_THREAD_LIST => self.thread_list(),
            REQUEST_THREAD_SET => self.send(RESPONSE_THREAD_SET),
            REQUEST_EVAL | REQUEST_EXEC => {
                self.send(&format!("= {}", payload));
                self.send(RESPONSE_OK);
            }
            REQUEST_COMPLETION => self.completion(payload),
            _ => {}
        }
        true
    }
}

/// Split `>Token<payload`
fn split_token(line: &str) -> Option<(&str, &str)> {
    if !line.starts_with('>') {
        return None;
    }
    let end = line.find('<')?;
    Some((&line[..=end], &line[end + 1..]))
}
