//! Trainer invocation: configuration, command-line building, process execution.

pub mod builder;
pub mod config;
pub mod runner;

pub use builder::{CommandBuilder, FlagCommandBuilder};
pub use config::{CommandConfig, Flags};
pub use runner::{ProcessRunner, ShellRunner};
