use crate::config::Config;
use crate::db::Store;
use crate::services::query_service::extract_parameters;

pub async fn cmd_query_add(
    config: &Config,
    name: &str,
    sql: &str,
    description: Option<&str>,
) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let query = store.add_query(name, sql, description).await?;

    let parameters = extract_parameters(&query.sql);
    println!("✓ Saved query '{}' (ID: {})", query.name, query.id);
    if !parameters.is_empty() {
        println!("  Parameters: {}", parameters.join(", "));
    }
    println!("  Run it at /query/{}/run", query.id);
    Ok(())
}

pub async fn cmd_query_list(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let queries = store.list_queries().await?;

    if queries.is_empty() {
        println!("No saved queries.");
        return Ok(());
    }

    for query in queries {
        let parameters = extract_parameters(&query.sql);
        println!("{:>4}  {}", query.id, query.name);
        if !parameters.is_empty() {
            println!("      parameters: {}", parameters.join(", "));
        }
    }

    Ok(())
}
