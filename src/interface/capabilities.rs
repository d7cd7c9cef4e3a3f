//! Debug client capability flags

use bitflags::bitflags;
use serde::Serialize;

bitflags! {
    /// What a debug client can do; bit values are part of the protocol
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
    pub struct Capabilities: u32 {
        const HAS_DEBUGGER = 0x0001;
        const HAS_INTERPRETER = 0x0002;
        const HAS_PROFILER = 0x0004;
        const HAS_COVERAGE = 0x0008;
        const HAS_COMPLETER = 0x0010;
        const HAS_UNITTEST = 0x0020;
        const HAS_SHELL = 0x0040;

        const HAS_ALL = Self::HAS_DEBUGGER.bits()
            | Self::HAS_INTERPRETER.bits()
            | Self::HAS_PROFILER.bits()
            | Self::HAS_COVERAGE.bits()
            | Self::HAS_COMPLETER.bits()
            | Self::HAS_UNITTEST.bits()
            | Self::HAS_SHELL.bits();
    }
}

impl Capabilities {
    /// Interpret a capability word received from a client, ignoring
    /// unknown bits
    pub fn from_wire(bits: i64) -> Self {
        Capabilities::from_bits_truncate(u32::try_from(bits).unwrap_or(0))
    }

    /// Names of the set flags, for display
    pub fn describe(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        for (flag, name) in [
            (Capabilities::HAS_DEBUGGER, "debugger"),
            (Capabilities::HAS_INTERPRETER, "interpreter"),
            (Capabilities::HAS_PROFILER, "profiler"),
            (Capabilities::HAS_COVERAGE, "coverage"),
            (Capabilities::HAS_COMPLETER, "completer"),
            (Capabilities::HAS_UNITTEST, "unittest"),
            (Capabilities::HAS_SHELL, "shell"),
        ] {
            if self.contains(flag) {
                names.push(name);
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_all_value() {
        assert_eq!(Capabilities::HAS_ALL.bits(), 0x7f);
    }

    #[test]
    fn test_from_wire() {
        assert_eq!(Capabilities::from_wire(127), Capabilities::HAS_ALL);
        assert_eq!(Capabilities::from_wire(0x41), Capabilities::HAS_DEBUGGER | Capabilities::HAS_SHELL);
        assert_eq!(Capabilities::from_wire(-1), Capabilities::empty());
        assert_eq!(Capabilities::from_wire(0x180), Capabilities::empty());
    }

    #[test]
    fn test_describe() {
        let caps = Capabilities::HAS_DEBUGGER | Capabilities::HAS_SHELL;
        assert_eq!(caps.describe(), vec!["debugger", "shell"]);
    }
}
