//! Cache warm-up and dead-letter inspection

use colored::Colorize;

use crate::interfaces::cli::CliError;
use crate::services::LinkService;
use crate::storage::SeaOrmStorage;

pub async fn warm_cache(service: &LinkService, domain: Option<&str>) -> Result<(), CliError> {
    let count = service.warm_cache(domain).await?;
    println!(
        "{} Cached {} links{}",
        "✓".bold().green(),
        count.to_string().yellow(),
        domain.map(|d| format!(" for {}", d)).unwrap_or_default()
    );
    Ok(())
}

pub async fn list_dead_letters(storage: &SeaOrmStorage) -> Result<(), CliError> {
    let letters = storage.list_dead_letters().await?;
    if letters.is_empty() {
        println!("{}", "No dead letters".dimmed());
        return Ok(());
    }

    for letter in &letters {
        println!(
            "{} {} after {} attempts: {}",
            "✗".bold().red(),
            letter.job_kind.yellow(),
            letter.attempts,
            letter.error
        );
        println!("  {}", letter.payload.dimmed());
    }
    println!("{} dead letters", letters.len());
    Ok(())
}
