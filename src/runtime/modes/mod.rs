//! Mode routing
//!
//! - Server mode (HTTP server)
//! - CLI mode (management commands)

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "cli")]
pub mod cli;

#[cfg(feature = "server")]
pub use server::run_server;

#[cfg(feature = "cli")]
pub use cli::run_cli;

/// Mode detection result
#[derive(Debug, PartialEq)]
pub enum Mode {
    #[cfg(feature = "server")]
    Server,
    #[cfg(feature = "cli")]
    Cli,
    Unknown,
}

/// Detect which mode to run based on the parsed subcommand
///
/// 1. No subcommand or `serve` -> Server mode
/// 2. Any other subcommand with the CLI feature -> CLI mode
pub fn detect_mode(command: Option<&crate::cli::Commands>) -> Mode {
    match command {
        #[cfg(feature = "cli")]
        Some(cmd) if !matches!(cmd, crate::cli::Commands::Serve) => Mode::Cli,
        #[cfg(feature = "server")]
        _ => Mode::Server,
        #[cfg(not(feature = "server"))]
        _ => Mode::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Commands, ConfigCommands};

    #[test]
    fn test_detect_mode() {
        assert_eq!(detect_mode(None), Mode::Server);
        assert_eq!(detect_mode(Some(&Commands::Serve)), Mode::Server);
        let generate = Commands::Config {
            action: ConfigCommands::Generate {
                output_path: None,
                force: false,
            },
        };
        assert_eq!(detect_mode(Some(&generate)), Mode::Cli);
    }
}
