use anyhow::bail;

use crate::config::Config;
use crate::db::Store;

pub async fn cmd_user_grant(config: &Config, username: &str, role: &str) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    if store.get_user_by_username(username).await?.is_none() {
        bail!("User '{username}' not found. Users are created on their first login.");
    }

    if store.grant_role(username, role).await? {
        println!("✓ Granted '{role}' to {username}");
    } else {
        println!("{username} already has '{role}'");
    }
    Ok(())
}

pub async fn cmd_user_history(config: &Config, username: &str, limit: u64) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let entries = store.recent_actions(username, limit).await?;

    if entries.is_empty() {
        println!("No recorded actions for {username}.");
        return Ok(());
    }

    for entry in entries {
        println!(
            "{}  {:<22} {}",
            entry.created_at,
            entry.action,
            entry.details.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
