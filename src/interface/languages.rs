//! Table of supported debug client languages
//!
//! Contains every client type the server can drive, its file extensions
//! and how to create its interface.

use crate::common::config::Config;
use crate::common::{Error, Result};

use super::capabilities::Capabilities;
use super::none::{self, NoneInterface};
use super::python::{self, PythonInterface};
use super::ruby::{self, RubyInterface};
use super::{DebuggerInterface, InterfaceOptions};

/// Static information about one client type
pub struct LanguageEntry {
    /// Client type name used throughout the session manager
    pub client_type: &'static str,
    /// Display name
    pub name: &'static str,
    /// Capabilities assumed before the client reports its own
    pub capabilities: Capabilities,
    /// File extensions, including the dot
    pub extensions: &'static [&'static str],
    /// Whether the language needs a configured interpreter
    pub needs_interpreter: bool,
    /// Create a fresh interface
    pub create: fn(&InterfaceOptions) -> Result<Box<dyn DebuggerInterface>>,
}

impl std::fmt::Debug for LanguageEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageEntry")
            .field("client_type", &self.client_type)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

impl LanguageEntry {
    /// Whether the language can be used with `config`
    pub fn available(&self, config: &Config) -> bool {
        !self.needs_interpreter || config.has_interpreter(self.client_type)
    }
}

fn create_python3(options: &InterfaceOptions) -> Result<Box<dyn DebuggerInterface>> {
    Ok(Box::new(PythonInterface::new(python::PYTHON3, options)?))
}

fn create_python2(options: &InterfaceOptions) -> Result<Box<dyn DebuggerInterface>> {
    Ok(Box::new(PythonInterface::new(python::PYTHON2, options)?))
}

fn create_ruby(options: &InterfaceOptions) -> Result<Box<dyn DebuggerInterface>> {
    Ok(Box::new(RubyInterface::new(options)?))
}

fn create_none(_options: &InterfaceOptions) -> Result<Box<dyn DebuggerInterface>> {
    Ok(Box::new(NoneInterface::new()))
}

/// All client types, in extension claiming order
pub static LANGUAGES: &[LanguageEntry] = &[
    LanguageEntry {
        client_type: python::PYTHON3,
        name: "Python 3",
        capabilities: Capabilities::HAS_ALL,
        extensions: python::PYTHON3_EXTENSIONS,
        needs_interpreter: true,
        create: create_python3,
    },
    LanguageEntry {
        client_type: python::PYTHON2,
        name: "Python 2",
        capabilities: Capabilities::HAS_ALL,
        extensions: python::PYTHON2_EXTENSIONS,
        needs_interpreter: true,
        create: create_python2,
    },
    LanguageEntry {
        client_type: ruby::CLIENT_TYPE,
        name: "Ruby",
        capabilities: ruby::CAPABILITIES,
        extensions: ruby::EXTENSIONS,
        needs_interpreter: true,
        create: create_ruby,
    },
    LanguageEntry {
        client_type: none::CLIENT_TYPE,
        name: "No backend",
        capabilities: Capabilities::empty(),
        extensions: &[],
        needs_interpreter: false,
        create: create_none,
    },
];

/// Get a language by client type
pub fn find(client_type: &str) -> Option<&'static LanguageEntry> {
    LANGUAGES.iter().find(|l| l.client_type == client_type)
}

/// Languages usable with the given configuration
pub fn registered(config: &Config) -> Vec<&'static LanguageEntry> {
    LANGUAGES.iter().filter(|l| l.available(config)).collect()
}

/// Create the interface for a client type
pub fn create(client_type: &str, options: &InterfaceOptions) -> Result<Box<dyn DebuggerInterface>> {
    let entry = find(client_type).ok_or_else(|| Error::UnknownClientType(client_type.to_string()))?;
    (entry.create)(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::ClientConfig;

    fn config_with(interpreters: &[&str]) -> Config {
        let mut config = Config::default();
        for client_type in ["python3", "python2", "ruby"] {
            let interpreter = if interpreters.contains(&client_type) {
                format!("/usr/bin/{}", client_type)
            } else {
                String::new()
            };
            config.clients.insert(
                client_type.to_string(),
                ClientConfig {
                    interpreter,
                    client_script: None,
                    redirect: true,
                },
            );
        }
        config
    }

    #[test]
    fn test_none_always_registered() {
        let registered = registered(&config_with(&["ruby"]));
        let types: Vec<_> = registered.iter().map(|l| l.client_type).collect();
        assert!(types.contains(&"None"));
        assert!(types.contains(&"Ruby"));
        assert!(!types.contains(&"Python2"));
    }

    #[test]
    fn test_create_each_language() {
        let options = InterfaceOptions::default();
        for entry in LANGUAGES {
            let iface = (entry.create)(&options).unwrap();
            assert_eq!(iface.client_type(), entry.client_type);
            assert_eq!(iface.capabilities(), entry.capabilities);
        }
    }

    #[test]
    fn test_unknown_client_type() {
        assert!(matches!(
            create("Cobol", &InterfaceOptions::default()),
            Err(Error::UnknownClientType(_))
        ));
    }

    #[test]
    fn test_extensions_have_dots() {
        for entry in LANGUAGES {
            assert!(entry.extensions.iter().all(|e| e.starts_with('.')));
        }
    }
}
