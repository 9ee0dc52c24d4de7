use anyhow::Result;
use embed_picker::cli::parse_args;
use embed_picker::config::AppConfig;
use embed_picker::server;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config = AppConfig::from_cli(parse_args())?;
    server::init_tracing(&config)?;
    server::start_server(config).await
}
