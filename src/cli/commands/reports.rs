use crate::config::Config;
use crate::db::Store;

pub async fn cmd_reports_set_location(config: &Config, path: &str) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    store.ensure_global_config(&config.reports.location).await?;
    store.set_reports_location(path).await?;

    if !std::path::Path::new(path).is_dir() {
        println!("Warning: {path} is not a directory yet");
    }
    println!("✓ Reports are now read from {path}");
    Ok(())
}
