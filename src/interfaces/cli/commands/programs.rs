//! Workspace, token, program, partner and payout commands

use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::errors::DubError;
use crate::interfaces::cli::CliError;
use crate::services::{PartnerService, PayoutService};
use crate::storage::{PayoutStatus, RewardEvent, RewardKind, SeaOrmStorage, Workspace};
use crate::utils::{generate_api_token, hash_token};

async fn workspace_by_slug(storage: &SeaOrmStorage, slug: &str) -> Result<Workspace, CliError> {
    storage
        .find_workspace_by_slug(slug)
        .await?
        .ok_or_else(|| DubError::not_found(format!("Workspace '{}' not found", slug)).into())
}

pub async fn add_workspace(storage: &SeaOrmStorage, slug: &str, name: &str) -> Result<(), CliError> {
    let workspace = storage.create_workspace(slug, name).await?;
    println!(
        "{} Created workspace {} ({})",
        "✓".bold().green(),
        workspace.slug.cyan(),
        workspace.id.dimmed()
    );
    Ok(())
}

/// 明文令牌只在这里打印一次
pub async fn create_token(storage: &SeaOrmStorage, workspace: &str, name: &str) -> Result<(), CliError> {
    let workspace = workspace_by_slug(storage, workspace).await?;
    let token = generate_api_token();
    let id = storage
        .create_workspace_token(&workspace.id, name, &hash_token(&token))
        .await?;

    println!(
        "{} Created token {} for {}",
        "✓".bold().green(),
        id.dimmed(),
        workspace.slug.cyan()
    );
    println!("  {}", token.yellow().bold());
    println!("  {}", "Store it now, it will not be shown again.".dimmed());
    Ok(())
}

pub async fn add_program(
    storage: &SeaOrmStorage,
    workspace: &str,
    name: &str,
    slug: &str,
) -> Result<(), CliError> {
    let workspace = workspace_by_slug(storage, workspace).await?;
    let program = storage.create_program(&workspace.id, name, slug).await?;
    println!(
        "{} Created program {} ({})",
        "✓".bold().green(),
        program.name.cyan(),
        program.id.dimmed()
    );
    Ok(())
}

pub async fn add_reward(
    storage: &SeaOrmStorage,
    program: &str,
    partner: Option<&str>,
    event: RewardEvent,
    kind: RewardKind,
    amount: i64,
) -> Result<(), CliError> {
    if amount < 0 {
        return Err(CliError::ParseError("Reward amount must not be negative".to_string()));
    }
    if storage.find_program(program).await?.is_none() {
        return Err(DubError::not_found(format!("Program {} not found", program)).into());
    }

    let reward = storage
        .create_reward(program, partner, event, kind, amount)
        .await?;
    println!(
        "{} Added {} {} reward of {} to {}{}",
        "✓".bold().green(),
        reward.kind.to_string().yellow(),
        reward.event,
        reward.amount.to_string().yellow(),
        program.cyan(),
        partner.map(|p| format!(" for {}", p)).unwrap_or_default()
    );
    Ok(())
}

pub async fn add_partner(
    service: &PartnerService,
    program: &str,
    name: &str,
    email: Option<&str>,
) -> Result<(), CliError> {
    let partner = service.create_partner(program, name, email).await?;
    println!(
        "{} Enrolled partner {} ({}) in {}",
        "✓".bold().green(),
        partner.name.cyan(),
        partner.id.dimmed(),
        program.cyan()
    );
    Ok(())
}

pub async fn create_payout(
    service: &PayoutService,
    program: &str,
    partner: &str,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<(), CliError> {
    let start = start.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    let end = end.unwrap_or_else(Utc::now);
    if start > end {
        return Err(CliError::ParseError("--start must not be after --end".to_string()));
    }

    match service
        .create_sales_payout(program, partner, start, end)
        .await?
    {
        Some(payout) => {
            println!(
                "{} Created payout {}: {} sales, amount {} + fee {} = {} {}",
                "✓".bold().green(),
                payout.id.cyan(),
                payout.quantity,
                payout.amount,
                payout.fee,
                payout.total.to_string().yellow(),
                payout.currency
            );
        }
        None => println!("{}", "No pending sales in this period".dimmed()),
    }
    Ok(())
}

pub async fn update_payout_status(
    service: &PayoutService,
    payout_id: &str,
    status: PayoutStatus,
) -> Result<(), CliError> {
    let payout = service.update_status(payout_id, status).await?;
    println!(
        "{} Payout {} is now {}",
        "✓".bold().green(),
        payout.id.cyan(),
        payout.status.to_string().yellow()
    );
    Ok(())
}
