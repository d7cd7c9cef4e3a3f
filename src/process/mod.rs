//! Debug client processes: launch plans and supervision

pub mod launch;
pub mod supervisor;

pub use launch::{EnvPolicy, LaunchSpec};
pub use supervisor::{ClientProcess, Launcher, SystemLauncher};
