//! Structured literal payloads
//!
//! Debug clients serialize stacks, variable dumps and thread lists as
//! Python-style literals. This module parses them without evaluating
//! anything, bounded by input size and nesting depth, and renders values
//! back into the same notation for request payloads.

use std::fmt;
use thiserror::Error;

/// Maximum accepted payload size in bytes
pub const MAX_INPUT_LEN: usize = 1024 * 1024;

/// Maximum nesting of containers
pub const MAX_DEPTH: usize = 64;

/// Errors produced while parsing a literal
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LiteralError {
    #[error("payload of {0} bytes exceeds the size limit")]
    TooLong(usize),

    #[error("nesting deeper than {MAX_DEPTH} levels")]
    TooDeep,

    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("unexpected '{ch}' at offset {pos}")]
    Unexpected { ch: char, pos: usize },

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("invalid escape sequence at offset {0}")]
    InvalidEscape(usize),

    #[error("trailing input at offset {0}")]
    Trailing(usize),
}

/// A parsed literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Literal>),
    Tuple(Vec<Literal>),
    Dict(Vec<(Literal, Literal)>),
}

impl Literal {
    /// Parse a complete payload
    ///
    /// A top-level comma sequence (`1, "x"`) is returned as a tuple.
    pub fn parse(input: &str) -> Result<Literal, LiteralError> {
        if input.len() > MAX_INPUT_LEN {
            return Err(LiteralError::TooLong(input.len()));
        }
        let mut parser = Parser { src: input, pos: 0, depth: 0 };
        parser.skip_ws();
        let first = parser.value()?;
        parser.skip_ws();

        let value = if parser.peek() == Some(',') {
            let mut items = vec![first];
            while parser.eat(',') {
                parser.skip_ws();
                if parser.peek().is_none() {
                    break;
                }
                items.push(parser.value()?);
                parser.skip_ws();
            }
            Literal::Tuple(items)
        } else {
            first
        };

        parser.skip_ws();
        if parser.pos < parser.src.len() {
            return Err(LiteralError::Trailing(parser.pos));
        }
        Ok(value)
    }

    /// String contents, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer value; booleans count as 0/1
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Literal::Int(i) => Some(*i),
            Literal::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Truth value for booleans and integers
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Bool(b) => Some(*b),
            Literal::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Elements of a list or tuple
    pub fn as_seq(&self) -> Option<&[Literal]> {
        match self {
            Literal::List(items) | Literal::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Look up a string key in a dict
    pub fn get(&self, key: &str) -> Option<&Literal> {
        match self {
            Literal::Dict(entries) => entries
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Plain text of a value: string contents unquoted, anything else in
    /// literal notation
    pub fn text(&self) -> String {
        match self {
            Literal::Str(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Build a list of strings
    pub fn str_list<I, S>(items: I) -> Literal
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Literal::List(items.into_iter().map(|s| Literal::Str(s.into())).collect())
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::Str(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::Str(s)
    }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Literal::Int(i)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

impl fmt::Display for Literal {
    /// Render in Python repr notation
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::None => f.write_str("None"),
            Literal::Bool(true) => f.write_str("True"),
            Literal::Bool(false) => f.write_str("False"),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(x) if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 => {
                write!(f, "{:.1}", x)
            }
            Literal::Float(x) => write!(f, "{}", x),
            Literal::Str(s) => write_repr(f, s),
            Literal::List(items) => {
                f.write_str("[")?;
                write_items(f, items)?;
                f.write_str("]")
            }
            Literal::Tuple(items) => {
                f.write_str("(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Literal::Dict(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Literal]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Quote a string the way Python's `repr` does
fn write_repr(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    f.write_str(&out)
}

/// Render a string as a Python string literal
pub fn quote(s: &str) -> String {
    Literal::Str(s.to_string()).to_string()
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn unexpected(&self) -> LiteralError {
        match self.peek() {
            Some(ch) => LiteralError::Unexpected { ch, pos: self.pos },
            None => LiteralError::UnexpectedEnd,
        }
    }

    fn value(&mut self) -> Result<Literal, LiteralError> {
        self.skip_ws();
        match self.peek() {
            None => Err(LiteralError::UnexpectedEnd),
            Some('[') => self.sequence('[', ']').map(Literal::List),
            Some('(') => self.tuple(),
            Some('{') => self.dict(),
            Some('\'') | Some('"') => self.string(false),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.word(),
            Some(_) => Err(self.unexpected()),
        }
    }

    fn enter(&mut self) -> Result<(), LiteralError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            Err(LiteralError::TooDeep)
        } else {
            Ok(())
        }
    }

    /// Comma separated values up to `close`, trailing comma allowed.
    /// Returns the items and whether a comma was seen.
    fn items(&mut self, close: char) -> Result<(Vec<Literal>, bool), LiteralError> {
        let mut items = Vec::new();
        let mut comma = false;
        loop {
            self.skip_ws();
            if self.eat(close) {
                return Ok((items, comma));
            }
            items.push(self.value()?);
            self.skip_ws();
            if self.eat(',') {
                comma = true;
            } else if self.eat(close) {
                return Ok((items, comma));
            } else {
                return Err(self.unexpected());
            }
        }
    }

    fn sequence(&mut self, open: char, close: char) -> Result<Vec<Literal>, LiteralError> {
        self.enter()?;
        self.eat(open);
        let (items, _) = self.items(close)?;
        self.depth -= 1;
        Ok(items)
    }

    fn tuple(&mut self) -> Result<Literal, LiteralError> {
        self.enter()?;
        self.eat('(');
        let (mut items, comma) = self.items(')')?;
        self.depth -= 1;
        // `(x)` is a parenthesized value, `(x,)` a one-element tuple
        if items.len() == 1 && !comma {
            Ok(items.remove(0))
        } else {
            Ok(Literal::Tuple(items))
        }
    }

    fn dict(&mut self) -> Result<Literal, LiteralError> {
        self.enter()?;
        self.eat('{');
        let mut entries = Vec::new();
        loop {
            self.skip_ws();
            if self.eat('}') {
                break;
            }
            let key = self.value()?;
            self.skip_ws();
            if !self.eat(':') {
                return Err(self.unexpected());
            }
            let value = self.value()?;
            entries.push((key, value));
            self.skip_ws();
            if self.eat(',') {
                continue;
            }
            if self.eat('}') {
                break;
            }
            return Err(self.unexpected());
        }
        self.depth -= 1;
        Ok(Literal::Dict(entries))
    }

    fn word(&mut self) -> Result<Literal, LiteralError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.bump();
        }
        let word = &self.src[start..self.pos];

        // String prefixes: u'', b'', r'', br'', ...
        if matches!(self.peek(), Some('\'') | Some('"'))
            && word.len() <= 2
            && word.chars().all(|c| "uUbBrR".contains(c))
        {
            let raw = word.contains(['r', 'R']);
            return self.string(raw);
        }

        match word {
            "None" => Ok(Literal::None),
            "True" => Ok(Literal::Bool(true)),
            "False" => Ok(Literal::Bool(false)),
            _ => Err(LiteralError::Unexpected {
                ch: word.chars().next().unwrap_or('?'),
                pos: start,
            }),
        }
    }

    fn number(&mut self) -> Result<Literal, LiteralError> {
        let start = self.pos;
        if matches!(self.peek(), Some('-') | Some('+')) {
            self.bump();
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '.' || c == '_')
            || (matches!(self.peek(), Some('-') | Some('+'))
                && matches!(self.src[..self.pos].chars().last(), Some('e') | Some('E')))
        {
            self.bump();
        }
        let text = &self.src[start..self.pos];
        let digits = text.trim_end_matches(['L', 'l']).replace('_', "");

        if let Ok(i) = digits.parse::<i64>() {
            return Ok(Literal::Int(i));
        }
        let unsigned = digits.trim_start_matches(['-', '+']);
        if let Some(hex) = unsigned.strip_prefix("0x").or_else(|| unsigned.strip_prefix("0X")) {
            if let Ok(i) = i64::from_str_radix(hex, 16) {
                return Ok(Literal::Int(if digits.starts_with('-') { -i } else { i }));
            }
        }
        if let Ok(x) = digits.parse::<f64>() {
            return Ok(Literal::Float(x));
        }
        Err(LiteralError::InvalidNumber(text.to_string()))
    }

    fn string(&mut self, raw: bool) -> Result<Literal, LiteralError> {
        let quote = self.bump().ok_or(LiteralError::UnexpectedEnd)?;
        let mut out = String::new();
        loop {
            let ch = self.bump().ok_or(LiteralError::UnexpectedEnd)?;
            if ch == quote {
                return Ok(Literal::Str(out));
            }
            if ch != '\\' {
                out.push(ch);
                continue;
            }

            let esc_pos = self.pos - 1;
            let esc = self.bump().ok_or(LiteralError::UnexpectedEnd)?;
            if raw {
                out.push('\\');
                out.push(esc);
                continue;
            }
            match esc {
                '\n' => {}
                '\\' => out.push('\\'),
                '\'' => out.push('\''),
                '"' => out.push('"'),
                'n' => out.push('\n'),
                'r' => out.push('\r'),
                't' => out.push('\t'),
                'a' => out.push('\u{07}'),
                'b' => out.push('\u{08}'),
                'f' => out.push('\u{0c}'),
                'v' => out.push('\u{0b}'),
                'x' => out.push(self.hex_escape(2, esc_pos)?),
                'u' => out.push(self.hex_escape(4, esc_pos)?),
                'U' => out.push(self.hex_escape(8, esc_pos)?),
                '0'..='7' => {
                    let mut value = esc.to_digit(8).unwrap_or(0);
                    for _ in 0..2 {
                        match self.peek().and_then(|c| c.to_digit(8)) {
                            Some(d) => {
                                value = value * 8 + d;
                                self.bump();
                            }
                            None => break,
                        }
                    }
                    out.push(char::from_u32(value).ok_or(LiteralError::InvalidEscape(esc_pos))?);
                }
                other => {
                    // Unknown escapes are kept verbatim
                    out.push('\\');
                    out.push(other);
                }
            }
        }
    }

    fn hex_escape(&mut self, len: usize, esc_pos: usize) -> Result<char, LiteralError> {
        let end = self.pos + len;
        let digits = self
            .src
            .get(self.pos..end)
            .ok_or(LiteralError::InvalidEscape(esc_pos))?;
        let value = u32::from_str_radix(digits, 16).map_err(|_| LiteralError::InvalidEscape(esc_pos))?;
        self.pos = end;
        char::from_u32(value).ok_or(LiteralError::InvalidEscape(esc_pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalars() {
        assert_eq!(Literal::parse("None").unwrap(), Literal::None);
        assert_eq!(Literal::parse("True").unwrap(), Literal::Bool(true));
        assert_eq!(Literal::parse("-42").unwrap(), Literal::Int(-42));
        assert_eq!(Literal::parse("42L").unwrap(), Literal::Int(42));
        assert_eq!(Literal::parse("0x1f").unwrap(), Literal::Int(31));
        assert_eq!(Literal::parse("1.5e3").unwrap(), Literal::Float(1500.0));
    }

    #[test]
    fn test_parse_strings() {
        assert_eq!(Literal::parse("'a\\'b'").unwrap(), Literal::from("a'b"));
        assert_eq!(Literal::parse("u\"caf\\xe9\"").unwrap(), Literal::from("café"));
        assert_eq!(Literal::parse("r'C:\\temp'").unwrap(), Literal::from("C:\\temp"));
        assert_eq!(Literal::parse("'tab\\there'").unwrap(), Literal::from("tab\there"));
        assert_eq!(Literal::parse("'\\u00e9'").unwrap(), Literal::from("é"));
    }

    #[test]
    fn test_parse_stack() {
        let lit = Literal::parse("[['/tmp/a.py', 10, 'main', ''], ['/tmp/b.py', 3, 'f', 'x=1']]")
            .unwrap();
        let frames = lit.as_seq().unwrap();
        assert_eq!(frames.len(), 2);
        let first = frames[0].as_seq().unwrap();
        assert_eq!(first[0].as_str(), Some("/tmp/a.py"));
        assert_eq!(first[1].as_int(), Some(10));
    }

    #[test]
    fn test_parse_top_level_tuple() {
        let lit = Literal::parse("127, \"Python3\"").unwrap();
        assert_eq!(
            lit,
            Literal::Tuple(vec![Literal::Int(127), Literal::from("Python3")])
        );
    }

    #[test]
    fn test_parse_tuples() {
        assert_eq!(Literal::parse("(1)").unwrap(), Literal::Int(1));
        assert_eq!(
            Literal::parse("(1,)").unwrap(),
            Literal::Tuple(vec![Literal::Int(1)])
        );
        assert_eq!(Literal::parse("()").unwrap(), Literal::Tuple(vec![]));
    }

    #[test]
    fn test_parse_dict() {
        let lit = Literal::parse("{'id': 7, 'name': 'MainThread', 'broken': True}").unwrap();
        assert_eq!(lit.get("id").and_then(Literal::as_int), Some(7));
        assert_eq!(lit.get("broken").and_then(Literal::as_bool), Some(true));
        assert!(lit.get("missing").is_none());
    }

    #[test]
    fn test_rejects_expressions() {
        assert!(Literal::parse("__import__('os').system('rm -rf /')").is_err());
        assert!(Literal::parse("[1, 2] + [3]").is_err());
        assert!(Literal::parse("open").is_err());
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(Literal::parse(""), Err(LiteralError::UnexpectedEnd));
        assert_eq!(Literal::parse("[1, 2"), Err(LiteralError::UnexpectedEnd));
        assert_eq!(Literal::parse("'abc"), Err(LiteralError::UnexpectedEnd));
        assert!(matches!(Literal::parse("1 2"), Err(LiteralError::Trailing(_))));
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}{}", "[".repeat(MAX_DEPTH + 1), "]".repeat(MAX_DEPTH + 1));
        assert_eq!(Literal::parse(&deep), Err(LiteralError::TooDeep));

        let ok = format!("{}{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH));
        assert!(Literal::parse(&ok).is_ok());
    }

    #[test]
    fn test_size_limit() {
        let big = format!("'{}'", "a".repeat(MAX_INPUT_LEN));
        assert!(matches!(Literal::parse(&big), Err(LiteralError::TooLong(_))));
    }

    #[test]
    fn test_render_repr() {
        let lit = Literal::List(vec![
            Literal::from("it's"),
            Literal::from("plain"),
            Literal::Int(3),
            Literal::Float(2.0),
            Literal::None,
        ]);
        assert_eq!(lit.to_string(), "[\"it's\", 'plain', 3, 2.0, None]");
        assert_eq!(Literal::Tuple(vec![Literal::Bool(true)]).to_string(), "(True,)");
        assert_eq!(quote("a\\b\n"), "'a\\\\b\\n'");
    }

    #[test]
    fn test_render_then_parse_env_dict() {
        let dict = Literal::Dict(vec![(Literal::from("PATH"), Literal::from("/bin:'x'"))]);
        let text = dict.to_string();
        assert_eq!(text, "{'PATH': \"/bin:'x'\"}");
        assert_eq!(Literal::parse(&text).unwrap(), dict);
    }
}
