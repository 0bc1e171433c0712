use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use toolmark_storage::{CatalogRepository, InMemoryCatalog, PgCatalogRepository};
use toolmark_sync::{SyncConfig, SyncEngine, SyncRequest};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "toolmark-cli")]
#[command(about = "Toolmark catalog sync command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Pull Product Hunt listings into the catalog and print the result JSON
    Sync(SyncArgs),
    /// Apply database migrations
    Migrate,
    /// Run the admin HTTP surface
    Serve,
}

#[derive(Debug, Default, Args)]
struct SyncArgs {
    /// Acting admin recorded as the submitter
    #[arg(long, default_value = "toolmark-cli")]
    admin: String,
    #[arg(long)]
    limit: Option<usize>,
    /// Create submissions even when the tool already exists
    #[arg(long)]
    force: bool,
    /// Overwrite matching published tools instead of skipping them
    #[arg(long)]
    update_existing: bool,
    /// Categorize published tools that have no category
    #[arg(long)]
    stale_categories: bool,
    #[arg(long)]
    start_date: Option<String>,
    #[arg(long)]
    end_date: Option<String>,
    /// Sync a single product by Product Hunt URL or slug
    #[arg(long)]
    product_url: Option<String>,
    /// Reconcile against an empty in-memory catalog instead of Postgres
    #[arg(long)]
    dry_run: bool,
}

impl SyncArgs {
    fn default_run() -> Self {
        Self {
            admin: "toolmark-cli".to_string(),
            ..Default::default()
        }
    }

    fn to_request(&self) -> SyncRequest {
        SyncRequest {
            limit: self.limit,
            force_sync: self.force,
            update_existing: self.update_existing,
            sync_old_data: self.stale_categories,
            sync_by_date: self.start_date.is_some() || self.end_date.is_some(),
            sync_single_product: self.product_url.is_some(),
            product_url: self.product_url.clone(),
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or_else(|| Commands::Sync(SyncArgs::default_run())) {
        Commands::Sync(args) => {
            let config = SyncConfig::from_env();
            let repo: Arc<dyn CatalogRepository> = if args.dry_run {
                Arc::new(InMemoryCatalog::new())
            } else {
                Arc::new(
                    PgCatalogRepository::connect(&config.database_url)
                        .await
                        .context("connecting catalog database")?,
                )
            };
            let engine = SyncEngine::from_config(&config, repo)?;
            let result = engine.run(&args.admin, &args.to_request()).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Migrate => {
            let config = SyncConfig::from_env();
            let repo = PgCatalogRepository::connect(&config.database_url)
                .await
                .context("connecting catalog database")?;
            repo.migrate().await?;
            info!("migrations applied");
        }
        Commands::Serve => toolmark_web::serve_from_env().await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sync_args(argv: &[&str]) -> SyncArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Some(Commands::Sync(args)) => args,
            other => panic!("expected sync, got {other:?}"),
        }
    }

    #[test]
    fn date_flags_select_date_mode() {
        let args = sync_args(&["toolmark-cli", "sync", "--start-date", "2026-02-01", "--limit", "5"]);
        let request = args.to_request();
        assert!(request.sync_by_date);
        assert!(!request.sync_single_product);
        assert_eq!(request.limit, Some(5));
        assert_eq!(args.admin, "toolmark-cli");
    }

    #[test]
    fn product_url_selects_single_mode() {
        let args = sync_args(&[
            "toolmark-cli",
            "sync",
            "--product-url",
            "https://www.producthunt.com/posts/linear",
            "--update-existing",
            "--admin",
            "ops",
        ]);
        let request = args.to_request();
        assert!(request.sync_single_product);
        assert!(request.update_existing);
        assert_eq!(args.admin, "ops");
    }
}
