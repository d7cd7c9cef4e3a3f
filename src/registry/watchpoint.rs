//! Watch expressions

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::Record;
use crate::common::{Error, Result};

/// Qualifier of a watch expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchSpecial {
    /// Stop when the expression is true
    #[default]
    None,
    /// Stop when the variable is created
    Created,
    /// Stop when the value changes
    Changed,
}

const CREATED_SUFFIX: &str = " ??created??";
const CHANGED_SUFFIX: &str = " ??changed??";

impl WatchSpecial {
    fn suffix(self) -> &'static str {
        match self {
            WatchSpecial::None => "",
            WatchSpecial::Created => CREATED_SUFFIX,
            WatchSpecial::Changed => CHANGED_SUFFIX,
        }
    }
}

impl fmt::Display for WatchSpecial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchSpecial::None => write!(f, ""),
            WatchSpecial::Created => write!(f, "created"),
            WatchSpecial::Changed => write!(f, "changed"),
        }
    }
}

impl FromStr for WatchSpecial {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" => Ok(WatchSpecial::None),
            "created" => Ok(WatchSpecial::Created),
            "changed" => Ok(WatchSpecial::Changed),
            other => Err(Error::Config(format!("unknown watch qualifier '{}'", other))),
        }
    }
}

/// Watch expressions are unique per expression and qualifier
pub type WatchpointKey = (String, WatchSpecial);

/// A watch expression
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Watchpoint {
    pub expression: String,
    pub special: WatchSpecial,
    pub temporary: bool,
    pub enabled: bool,
    pub ignore_count: u32,
}

impl Watchpoint {
    pub fn new(expression: impl Into<String>, special: WatchSpecial) -> Self {
        Self {
            expression: expression.into(),
            special,
            temporary: false,
            enabled: true,
            ignore_count: 0,
        }
    }

    /// Expression with its qualifier as sent to the client
    pub fn wire_condition(&self) -> String {
        format!("{}{}", self.expression, self.special.suffix())
    }
}

/// Split a wire condition back into expression and qualifier
pub fn split_condition(condition: &str) -> (String, WatchSpecial) {
    if let Some(expr) = condition.strip_suffix(CREATED_SUFFIX) {
        (expr.to_string(), WatchSpecial::Created)
    } else if let Some(expr) = condition.strip_suffix(CHANGED_SUFFIX) {
        (expr.to_string(), WatchSpecial::Changed)
    } else {
        (condition.to_string(), WatchSpecial::None)
    }
}

impl Record for Watchpoint {
    type Key = WatchpointKey;

    fn key(&self) -> WatchpointKey {
        (self.expression.clone(), self.special)
    }

    fn validate(&self) -> Result<()> {
        if self.expression.trim().is_empty() {
            return Err(Error::InvalidLocation("empty watch expression".to_string()));
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
