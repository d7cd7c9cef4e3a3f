//! Line breakpoints

use serde::Serialize;

use super::Record;
use crate::common::{paths, Error, Result};

/// Breakpoints are unique per file and line
pub type BreakpointKey = (String, u32);

/// A line breakpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakpoint {
    pub file: String,
    pub line: u32,
    pub condition: Option<String>,
    /// Deleted by the client after its first hit
    pub temporary: bool,
    pub enabled: bool,
    /// Number of hits to skip before stopping
    pub ignore_count: u32,
}

impl Breakpoint {
    /// An enabled, permanent, unconditional breakpoint
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
            condition: None,
            temporary: false,
            enabled: true,
            ignore_count: 0,
        }
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        let condition = condition.into();
        self.condition = if condition.is_empty() { None } else { Some(condition) };
        self
    }

    /// Parse a `file:line[:condition]` location
    ///
    /// Relative files are made absolute, matching the paths the client
    /// reports back.
    pub fn parse_location(spec: &str) -> Result<Self> {
        let mut parts = spec.splitn(3, ':');
        let file = parts.next().unwrap_or_default();
        let line = parts
            .next()
            .and_then(|l| l.trim().parse::<u32>().ok())
            .ok_or_else(|| Error::InvalidLocation(spec.to_string()))?;
        if file.is_empty() {
            return Err(Error::InvalidLocation(spec.to_string()));
        }
        let mut bp = Breakpoint::new(paths::absolute(file), line);
        if let Some(condition) = parts.next() {
            bp = bp.with_condition(condition);
        }
        bp.validate()?;
        Ok(bp)
    }
}

impl Record for Breakpoint {
    type Key = BreakpointKey;

    fn key(&self) -> BreakpointKey {
        (self.file.clone(), self.line)
    }

    fn validate(&self) -> Result<()> {
        if self.file.is_empty() {
            return Err(Error::InvalidLocation("missing file name".to_string()));
        }
        if self.line == 0 {
            return Err(Error::InvalidLocation(format!("{}:0", self.file)));
        }
        Ok(())
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn set_ignore_count(&mut self, count: u32) {
        self.ignore_count = count;
    }
}
