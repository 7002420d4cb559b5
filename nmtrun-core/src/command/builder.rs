//! Command-line construction for trainer invocations.

use crate::command::config::CommandConfig;

/// Turns a configuration into an executable command line.
pub trait CommandBuilder: Send + Sync {
    fn build(&self, config: &CommandConfig) -> String;
}

/// Renders `<path>/<name> --flag<sep>v1 v2 --switch`.
///
/// Values are not quoted: they pass through the shell unchanged, so a value
/// may carry redirections.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagCommandBuilder;

impl CommandBuilder for FlagCommandBuilder {
    fn build(&self, config: &CommandConfig) -> String {
        let program = if config.command_path.as_os_str().is_empty() {
            config.command_name.clone()
        } else {
            config
                .command_path
                .join(&config.command_name)
                .display()
                .to_string()
        };

        let mut parts = vec![program];
        for (name, values) in &config.flags {
            if values.is_empty() {
                parts.push(format!("--{name}"));
            } else {
                parts.push(format!(
                    "--{name}{}{}",
                    config.flag_separator,
                    values.join(" ")
                ));
            }
        }
        parts.join(" ")
    }
}
