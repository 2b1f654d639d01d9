//! Command-line interface definitions using clap
//!
//! 无子命令或 `serve` 时启动 HTTP 服务，其余子命令直接操作数据库。

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use crate::storage::{PayoutStatus, RewardEvent, RewardKind};

/// dub-core - link edge for a multi-tenant link platform
#[derive(Parser)]
#[command(name = "dub-core")]
#[command(version)]
#[command(about = "Link cache, redirects, click tracking and partner payouts", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve,

    /// Manage short links
    Link {
        #[command(subcommand)]
        action: LinkCommands,
    },

    /// Domain level operations
    Domain {
        #[command(subcommand)]
        action: DomainCommands,
    },

    /// Link cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheCommands,
    },

    /// Manage workspaces
    Workspace {
        #[command(subcommand)]
        action: WorkspaceCommands,
    },

    /// Manage workspace API tokens
    Token {
        #[command(subcommand)]
        action: TokenCommands,
    },

    /// Manage partner programs and rewards
    Program {
        #[command(subcommand)]
        action: ProgramCommands,
    },

    /// Manage partners
    Partner {
        #[command(subcommand)]
        action: PartnerCommands,
    },

    /// Create payouts and move them through their lifecycle
    Payout {
        #[command(subcommand)]
        action: PayoutCommands,
    },

    /// Inspect background jobs that exhausted their retries
    DeadLetters,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum LinkCommands {
    /// Create a short link
    Add {
        /// Destination URL
        url: String,

        /// Short key (random when omitted)
        #[arg(long, short = 'k')]
        key: Option<String>,

        /// Short domain (defaults to links.default_domain)
        #[arg(long, short = 'd')]
        domain: Option<String>,

        /// Owning workspace ID
        #[arg(long, short = 'w')]
        workspace: Option<String>,

        /// Expiration time (RFC3339)
        #[arg(long)]
        expires_at: Option<DateTime<Utc>>,

        /// Redirect target after expiration
        #[arg(long)]
        expired_url: Option<String>,

        #[arg(long)]
        ios: Option<String>,

        #[arg(long)]
        android: Option<String>,

        /// Country override, repeatable: `--geo US=https://example.com/us`
        #[arg(long = "geo", value_name = "COUNTRY=URL")]
        geo: Vec<String>,

        /// Tag ID, repeatable
        #[arg(long = "tag")]
        tags: Vec<String>,

        #[arg(long)]
        public_stats: bool,

        /// Append `dub_id` to the destination on redirect
        #[arg(long)]
        track_conversion: bool,

        #[arg(long)]
        program: Option<String>,

        #[arg(long)]
        partner: Option<String>,
    },

    /// Delete a short link
    Remove {
        domain: String,
        key: String,
    },
}

#[derive(Subcommand)]
pub enum DomainCommands {
    /// Move every link from one domain to another
    Rename { old_domain: String, new_domain: String },
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Load active links into the cache
    Warm {
        #[arg(long, short = 'd')]
        domain: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum WorkspaceCommands {
    /// Create a workspace
    Add { slug: String, name: String },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Create an API token; the plaintext is printed once
    Create {
        /// Workspace slug
        workspace: String,

        #[arg(long, default_value = "default")]
        name: String,
    },
}

#[derive(Subcommand)]
pub enum ProgramCommands {
    /// Create a partner program in a workspace
    Add {
        /// Workspace slug
        workspace: String,
        name: String,
        slug: String,
    },

    /// Add a reward rule to a program
    Reward {
        program: String,

        /// Commission amount: percent for `percentage`, minor units for `flat`
        amount: i64,

        #[arg(long, default_value = "sale")]
        event: RewardEvent,

        #[arg(long = "type", default_value = "percentage")]
        kind: RewardKind,

        /// Partner-specific rule
        #[arg(long)]
        partner: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum PartnerCommands {
    /// Create a partner and enroll it in a program
    Add {
        program: String,
        name: String,

        #[arg(long)]
        email: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum PayoutCommands {
    /// Aggregate pending sales of a partner into a payout
    Create {
        program: String,
        partner: String,

        /// Period start (RFC3339), defaults to the Unix epoch
        #[arg(long)]
        start: Option<DateTime<Utc>>,

        /// Period end (RFC3339), defaults to now
        #[arg(long)]
        end: Option<DateTime<Utc>>,
    },

    /// Move a payout to a new status
    Status { payout_id: String, status: PayoutStatus },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a sample configuration file
    Generate {
        output_path: Option<String>,

        /// Overwrite an existing file
        #[arg(long, short = 'f')]
        force: bool,
    },
}
