use crate::config::Config;
use crate::db::Store;

pub async fn cmd_dataset_add(
    config: &Config,
    name: &str,
    location: &str,
    format: &str,
    description: Option<&str>,
) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let dataset = store.add_dataset(name, location, format, description).await?;

    println!("✓ Registered dataset '{}' (ID: {})", dataset.name, dataset.id);
    Ok(())
}

pub async fn cmd_dataset_list(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let datasets = store.list_datasets().await?;

    if datasets.is_empty() {
        println!("No datasets registered.");
        println!();
        println!("Register one with: dataplate dataset add <name> <location>");
        return Ok(());
    }

    println!("Datasets ({} total)", datasets.len());
    println!("{:-<70}", "");

    for dataset in datasets {
        println!("{} [{}]", dataset.name, dataset.format);
        println!("  ID: {} | Location: {}", dataset.id, dataset.location);
        if let Some(description) = dataset.description.filter(|d| !d.is_empty()) {
            println!("  {description}");
        }
    }

    Ok(())
}
