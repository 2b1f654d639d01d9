//! Link and domain commands

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::interfaces::cli::CliError;
use crate::services::LinkService;
use crate::storage::LinkInput;

/// `link add` 的原始参数
pub struct LinkArgs {
    pub url: String,
    pub key: Option<String>,
    pub domain: Option<String>,
    pub workspace: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub expired_url: Option<String>,
    pub ios: Option<String>,
    pub android: Option<String>,
    pub geo: Vec<String>,
    pub tags: Vec<String>,
    pub public_stats: bool,
    pub track_conversion: bool,
    pub program: Option<String>,
    pub partner: Option<String>,
}

/// `US=https://...` 形式的 geo 参数
fn parse_geo(entries: &[String]) -> Result<Option<BTreeMap<String, String>>, CliError> {
    if entries.is_empty() {
        return Ok(None);
    }
    let mut map = BTreeMap::new();
    for entry in entries {
        let (country, url) = entry
            .split_once('=')
            .filter(|(c, u)| !c.trim().is_empty() && !u.trim().is_empty())
            .ok_or_else(|| {
                CliError::ParseError(format!("Invalid --geo '{}', expected COUNTRY=URL", entry))
            })?;
        map.insert(country.trim().to_string(), url.trim().to_string());
    }
    Ok(Some(map))
}

impl LinkArgs {
    pub fn into_input(self) -> Result<LinkInput, CliError> {
        Ok(LinkInput {
            domain: self.domain.unwrap_or_default(),
            key: self.key,
            url: self.url,
            workspace_id: self.workspace,
            public_stats: self.public_stats,
            track_conversion: self.track_conversion,
            expires_at: self.expires_at,
            expired_url: self.expired_url,
            ios: self.ios,
            android: self.android,
            geo: parse_geo(&self.geo)?,
            program_id: self.program,
            partner_id: self.partner,
            folder_id: None,
            tag_ids: self.tags,
        })
    }
}

pub async fn add_link(service: &LinkService, input: LinkInput) -> Result<(), CliError> {
    let generated = input.key.is_none();
    let link = service.create(input).await?;

    if generated {
        println!(
            "{} Generated random key: {}",
            "ℹ".bold().blue(),
            link.key.magenta()
        );
    }
    println!(
        "{} Added short link: {}/{} -> {} ({})",
        "✓".bold().green(),
        link.domain.cyan(),
        link.key.cyan(),
        link.url.blue().underline(),
        link.id.dimmed()
    );
    if let Some(expires_at) = link.expires_at {
        println!(
            "  expires: {}",
            expires_at.format("%Y-%m-%d %H:%M:%S UTC").to_string().yellow()
        );
    }
    Ok(())
}

pub async fn remove_link(service: &LinkService, domain: &str, key: &str) -> Result<(), CliError> {
    let removed = service.delete(domain, key).await?;
    println!(
        "{} Deleted short link: {}/{}",
        "✓".bold().green(),
        removed.domain.cyan(),
        key.cyan()
    );
    Ok(())
}

pub async fn rename_domain(
    service: &LinkService,
    old_domain: &str,
    new_domain: &str,
) -> Result<(), CliError> {
    let (moved, renamed) = service.rename_domain(old_domain, new_domain).await?;
    println!(
        "{} Renamed {} -> {}: {} links moved, {} cache entries renamed",
        "✓".bold().green(),
        old_domain.cyan(),
        new_domain.cyan(),
        moved.to_string().yellow(),
        renamed.to_string().yellow()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_geo() {
        assert_eq!(parse_geo(&[]).unwrap(), None);

        let parsed = parse_geo(&["us=https://a.example".to_string()]).unwrap().unwrap();
        assert_eq!(parsed.get("us").map(String::as_str), Some("https://a.example"));

        assert!(parse_geo(&["https://missing-country".to_string()]).is_err());
        assert!(parse_geo(&["US=".to_string()]).is_err());
    }
}
