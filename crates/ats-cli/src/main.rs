mod cart;
mod catalog;

use std::sync::Arc;

use ats_client::ApiClient;
use ats_store::{FileStore, KeyValueStore};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ats-cli")]
#[command(about = "Liquor storefront command line client")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List product categories
    Categories {
        /// Maximum number of categories to list
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Browse a category page by page, optionally filtered
    Browse {
        /// Category key (e.g., WHISKY)
        category: String,
        /// Number of pages to load
        #[arg(long, default_value = "1")]
        pages: u32,
        #[command(flatten)]
        filters: catalog::FilterArgs,
    },
    /// Search the catalog; without a query, show recent searches
    Search {
        query: Option<String>,
        /// Maximum number of results
        #[arg(long, default_value = "20")]
        limit: u32,
        /// Forget recent searches first
        #[arg(long)]
        clear_history: bool,
    },
    /// Show one product by id or SKU
    Product {
        #[arg(required_unless_present = "sku")]
        id: Option<i64>,
        #[arg(long, conflicts_with = "id")]
        sku: Option<String>,
    },
    /// Show products similar to a product
    Related {
        id: i64,
        /// Maximum number of related products
        #[arg(long, default_value = "8")]
        max: usize,
        /// Also score model, size and other attributes
        #[arg(long)]
        with_brand: bool,
    },
    /// Manage the shopping cart
    Cart {
        #[command(subcommand)]
        command: cart::CartCommands,
    },
    /// Place an order for the cart contents
    Checkout(cart::CheckoutArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ats_core::load_app_config()?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("ats-cli: run with --help to see available commands");
        return Ok(());
    };

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(config.data_dir.clone())?);
    let client = || {
        ApiClient::from_config(&config)
            .map_err(|e| anyhow::anyhow!("failed to build product API client: {e}"))
    };

    match command {
        Commands::Categories { limit } => {
            catalog::run_categories(&client()?, limit).await;
            Ok(())
        }
        Commands::Browse {
            category,
            pages,
            filters,
        } => catalog::run_browse(&client()?, &store, &category, pages, &filters).await,
        Commands::Search {
            query,
            limit,
            clear_history,
        } => catalog::run_search(&client()?, &store, query.as_deref(), limit, clear_history).await,
        Commands::Product { id, sku } => {
            catalog::run_product(&client()?, id, sku.as_deref()).await
        }
        Commands::Related {
            id,
            max,
            with_brand,
        } => catalog::run_related(&client()?, id, max, with_brand).await,
        Commands::Cart { command } => {
            let mut cart = cart::open_cart(&config, &store);
            match command {
                cart::CartCommands::Add { id, quantity } => {
                    cart::run_cart_add(&client()?, &mut cart, id, quantity).await
                }
                other => cart::run_cart_command(&mut cart, other),
            }
        }
        Commands::Checkout(args) => {
            let mut cart = cart::open_cart(&config, &store);
            cart::run_checkout(&mut cart, args)
        }
    }
}

#[cfg(test)]
mod tests;
