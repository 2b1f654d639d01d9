//! CLI interface module
//!
//! 管理命令直接操作数据库与缓存，不经过 HTTP。

pub mod commands;

use std::fmt;
use std::time::Duration;

use crate::cli::{
    CacheCommands, Commands, ConfigCommands, DomainCommands, LinkCommands, PartnerCommands,
    PayoutCommands, ProgramCommands, TokenCommands, WorkspaceCommands,
};
use crate::config::get_config;
use crate::errors::DubError;
use crate::runtime::lifetime::startup;
use commands::{config_management, links, maintenance, programs};

/// 退出前等待 webhook 等后台任务的时长
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub enum CliError {
    StorageError(String),
    ParseError(String),
    CommandError(String),
}

impl CliError {
    pub fn format_simple(&self) -> String {
        match self {
            CliError::StorageError(msg) => format!("Storage error: {}", msg),
            CliError::ParseError(msg) => format!("Parse error: {}", msg),
            CliError::CommandError(msg) => format!("Command error: {}", msg),
        }
    }

    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        match self {
            CliError::StorageError(msg) => {
                format!("{} {}", "Storage error:".red().bold(), msg.white())
            }
            CliError::ParseError(msg) => {
                format!("{} {}", "Parse error:".yellow().bold(), msg.white())
            }
            CliError::CommandError(msg) => {
                format!("{} {}", "Command error:".red().bold(), msg.white())
            }
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for CliError {}

impl From<DubError> for CliError {
    fn from(err: DubError) -> Self {
        if err.is_client_error() {
            CliError::CommandError(err.format_simple())
        } else {
            CliError::StorageError(err.format_simple())
        }
    }
}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::StorageError(format!("{:#}", err))
    }
}

/// Run a CLI command from clap-parsed input
pub async fn run_cli_command(cmd: Commands) -> Result<(), CliError> {
    // 生成配置不需要数据库
    if let Commands::Config {
        action: ConfigCommands::Generate { output_path, force },
    } = cmd
    {
        return config_management::config_generate(output_path, force);
    }

    startup::install_crypto_provider();
    let config = get_config();
    let ctx = startup::build_context(&config).await?;

    let result = match cmd {
        Commands::Link { action } => match action {
            LinkCommands::Add {
                url,
                key,
                domain,
                workspace,
                expires_at,
                expired_url,
                ios,
                android,
                geo,
                tags,
                public_stats,
                track_conversion,
                program,
                partner,
            } => {
                let input = links::LinkArgs {
                    url,
                    key,
                    domain,
                    workspace,
                    expires_at,
                    expired_url,
                    ios,
                    android,
                    geo,
                    tags,
                    public_stats,
                    track_conversion,
                    program,
                    partner,
                }
                .into_input()?;
                links::add_link(&ctx.link_service, input).await
            }
            LinkCommands::Remove { domain, key } => {
                links::remove_link(&ctx.link_service, &domain, &key).await
            }
        },
        Commands::Domain {
            action: DomainCommands::Rename {
                old_domain,
                new_domain,
            },
        } => links::rename_domain(&ctx.link_service, &old_domain, &new_domain).await,
        Commands::Cache {
            action: CacheCommands::Warm { domain },
        } => maintenance::warm_cache(&ctx.link_service, domain.as_deref()).await,
        Commands::Workspace {
            action: WorkspaceCommands::Add { slug, name },
        } => programs::add_workspace(&ctx.storage, &slug, &name).await,
        Commands::Token {
            action: TokenCommands::Create { workspace, name },
        } => programs::create_token(&ctx.storage, &workspace, &name).await,
        Commands::Program { action } => match action {
            ProgramCommands::Add {
                workspace,
                name,
                slug,
            } => programs::add_program(&ctx.storage, &workspace, &name, &slug).await,
            ProgramCommands::Reward {
                program,
                amount,
                event,
                kind,
                partner,
            } => {
                programs::add_reward(&ctx.storage, &program, partner.as_deref(), event, kind, amount)
                    .await
            }
        },
        Commands::Partner {
            action: PartnerCommands::Add {
                program,
                name,
                email,
            },
        } => programs::add_partner(&ctx.partner_service, &program, &name, email.as_deref()).await,
        Commands::Payout { action } => match action {
            PayoutCommands::Create {
                program,
                partner,
                start,
                end,
            } => programs::create_payout(&ctx.payout_service, &program, &partner, start, end).await,
            PayoutCommands::Status { payout_id, status } => {
                programs::update_payout_status(&ctx.payout_service, &payout_id, status).await
            }
        },
        Commands::DeadLetters => maintenance::list_dead_letters(&ctx.storage).await,
        Commands::Serve | Commands::Config { .. } => Err(CliError::CommandError(
            "Command is not handled in CLI mode".to_string(),
        )),
    };

    // 等待本次命令投递的 webhook
    if !ctx.queue.wait_idle(DRAIN_TIMEOUT).await {
        tracing::warn!("{} background jobs still pending at exit", ctx.queue.pending());
    }
    result
}
