mod args;

use anyhow::{Context as _, bail};
use args::Args;
use clap::Parser as _;
use edge_relay::db::{get_store_stats, new_pool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if !args.database_path.exists() {
        bail!("database not found: {:?}", args.database_path);
    }

    let pool = new_pool(&args.database_path)
        .await
        .context("failed to open reading store")?;

    let stats = get_store_stats(&pool)
        .await
        .context("failed to read store statistics")?;

    println!("Readings:  {}", stats.total);
    println!("Delivered: {}", stats.delivered);
    println!("Pending:   {}", stats.pending);

    if let Some(oldest) = stats.oldest_pending {
        println!(
            "Oldest pending: id={} client={} at {}",
            oldest.id, oldest.client_id, oldest.timestamp
        );
    }

    pool.close().await;

    Ok(())
}
