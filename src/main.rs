//! Rebalancer - two-asset portfolio rebalancer for Kraken

use anyhow::Result;
use rebalancer::adapters::cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (secrets go here, not in the config file)
    dotenvy::dotenv().ok();

    let app = cli::init();
    cli::execute(app).await
}
