//! Path translation between the debug server and a remote client

use crate::common::config::{PathTranslationConfig, ProjectSettings};
use crate::events::{Event, StackFrame};

/// Direction of a path translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    RemoteToLocal,
    LocalToRemote,
}

/// Maps file names between the local and the remote file system
///
/// Translation is a plain substring substitution of the configured prefixes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathTranslator {
    mapping: Option<(String, String)>,
}

impl PathTranslator {
    /// Translator that leaves paths untouched
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn new(remote: impl Into<String>, local: impl Into<String>) -> Self {
        let remote = remote.into();
        let local = local.into();
        if remote.is_empty() && local.is_empty() {
            return Self::identity();
        }
        Self {
            mapping: Some((remote, local)),
        }
    }

    pub fn from_config(config: &PathTranslationConfig) -> Self {
        if config.enabled {
            Self::new(&config.remote, &config.local)
        } else {
            Self::identity()
        }
    }

    pub fn from_project(project: &ProjectSettings) -> Self {
        if project.path_translation {
            Self::new(&project.remote_path, &project.local_path)
        } else {
            Self::identity()
        }
    }

    pub fn is_identity(&self) -> bool {
        self.mapping.is_none()
    }

    pub fn translate(&self, path: &str, direction: Direction) -> String {
        match (&self.mapping, direction) {
            (Some((remote, local)), Direction::RemoteToLocal) if !remote.is_empty() => {
                path.replace(remote.as_str(), local)
            }
            (Some((remote, local)), Direction::LocalToRemote) if !local.is_empty() => {
                path.replace(local.as_str(), remote)
            }
            _ => path.to_string(),
        }
    }

    fn localize_frames(&self, stack: Vec<StackFrame>) -> Vec<StackFrame> {
        stack
            .into_iter()
            .map(|mut frame| {
                frame.file = self.translate(&frame.file, Direction::RemoteToLocal);
                frame
            })
            .collect()
    }

    /// Rewrite every remote file name carried by an event
    pub fn localize_event(&self, event: Event) -> Event {
        if self.is_identity() {
            return event;
        }
        let local = |path: String| self.translate(&path, Direction::RemoteToLocal);
        match event {
            Event::LineReached { file, line, stack } => Event::LineReached {
                file: local(file),
                line,
                stack: self.localize_frames(stack),
            },
            Event::Stack { stack } => Event::Stack {
                stack: self.localize_frames(stack),
            },
            Event::Exception { kind, message, stack } => Event::Exception {
                kind,
                message,
                stack: self.localize_frames(stack),
            },
            Event::SyntaxError { message, file, line, column } => Event::SyntaxError {
                message,
                file: local(file),
                line,
                column,
            },
            Event::Signal { message, file, line, function, args } => Event::Signal {
                message,
                file: local(file),
                line,
                function,
                args,
            },
            Event::ClearBreak { file, line } => Event::ClearBreak {
                file: local(file),
                line,
            },
            Event::BreakConditionError { file, line } => Event::BreakConditionError {
                file: local(file),
                line,
            },
            Event::PassiveDebugStarted { file, exceptions } => Event::PassiveDebugStarted {
                file: local(file),
                exceptions,
            },
            Event::CallTrace { is_call, mut from, mut to } => {
                from.file = local(from.file);
                to.file = local(to.file);
                Event::CallTrace { is_call, from, to }
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let translator = PathTranslator::identity();
        assert_eq!(translator.translate("/a/b.py", Direction::RemoteToLocal), "/a/b.py");
        assert!(translator.is_identity());
    }

    #[test]
    fn test_both_directions() {
        let translator = PathTranslator::new("/srv/app", "/home/dev/app");
        assert_eq!(
            translator.translate("/srv/app/main.py", Direction::RemoteToLocal),
            "/home/dev/app/main.py"
        );
        assert_eq!(
            translator.translate("/home/dev/app/main.py", Direction::LocalToRemote),
            "/srv/app/main.py"
        );
    }

    #[test]
    fn test_disabled_config_is_identity() {
        let config = PathTranslationConfig {
            enabled: false,
            remote: "/srv".into(),
            local: "/home".into(),
        };
        assert!(PathTranslator::from_config(&config).is_identity());
    }

    #[test]
    fn test_localize_event() {
        let translator = PathTranslator::new("/srv", "/home");
        let event = translator.localize_event(Event::ClearBreak {
            file: "/srv/a.py".into(),
            line: 4,
        });
        assert_eq!(
            event,
            Event::ClearBreak {
                file: "/home/a.py".into(),
                line: 4
            }
        );
    }
}
