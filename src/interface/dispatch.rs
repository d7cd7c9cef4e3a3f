//! Response token dispatch
//!
//! Each interface owns a table of the response tokens its clients send.
//! A line is matched at its first `>Token<` marker; anything before the
//! marker is program output that was written without a trailing newline.

use regex::{Regex, RegexSet};

use crate::common::{Error, Result};

/// Outcome of matching one received line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch<'a> {
    /// No known token: the whole line is program output
    Output(&'a str),

    Response {
        /// Output that preceded the token on the same line
        leading: Option<&'a str>,
        token: &'static str,
        payload: &'a str,
    },
}

/// Regex based token table
#[derive(Debug)]
pub struct ResponseTable {
    marker: Regex,
    set: RegexSet,
    tokens: Vec<&'static str>,
}

impl ResponseTable {
    pub fn new(tokens: &[&'static str]) -> Result<Self> {
        let patterns: Vec<String> = tokens
            .iter()
            .map(|t| format!("^{}", regex::escape(t)))
            .collect();
        let set = RegexSet::new(&patterns).map_err(|e| Error::Internal(e.to_string()))?;
        let marker = Regex::new(r">[A-Za-z?]+<").map_err(|e| Error::Internal(e.to_string()))?;
        Ok(Self {
            marker,
            set,
            tokens: tokens.to_vec(),
        })
    }

    pub fn dispatch<'a>(&self, line: &'a str) -> Dispatch<'a> {
        let Some(found) = self.marker.find(line) else {
            return Dispatch::Output(line);
        };
        let rest = &line[found.start()..];

        // Longest match wins so that no token can shadow a more specific one
        let token = self
            .set
            .matches(rest)
            .into_iter()
            .map(|i| self.tokens[i])
            .max_by_key(|t| t.len());

        match token {
            Some(token) => Dispatch::Response {
                leading: (found.start() > 0).then(|| &line[..found.start()]),
                token,
                payload: &rest[token.len()..],
            },
            None => Dispatch::Output(line),
        }
    }
}
