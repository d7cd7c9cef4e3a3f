//! Common utilities shared by the server, the CLI and the mock client

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};
