use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use dub_core::cli::Cli;
use dub_core::config::{DEFAULT_CONFIG_PATH, get_config, init_config_from};
use dub_core::runtime::modes::{self, Mode};
use dub_core::system::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    init_config_from(config_path)
        .with_context(|| format!("Invalid configuration in {}", config_path))?;

    match modes::detect_mode(cli.command.as_ref()) {
        #[cfg(feature = "cli")]
        Mode::Cli => {
            let Some(cmd) = cli.command else {
                return Ok(());
            };
            if let Err(e) = modes::run_cli(cmd).await {
                eprintln!("{}", e.format_colored());
                std::process::exit(1);
            }
            Ok(())
        }
        #[cfg(feature = "server")]
        Mode::Server => {
            // guard 必须存活到进程结束
            let _guard = init_logging(&get_config().logging)?;
            info!("dub-core {} starting", env!("CARGO_PKG_VERSION"));
            modes::run_server().await
        }
        Mode::Unknown => {
            eprintln!("No execution mode enabled, rebuild with the `server` feature");
            std::process::exit(1);
        }
    }
}
