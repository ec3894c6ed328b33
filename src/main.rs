use tracing::info;
use tracing_subscriber::EnvFilter;

use foodgram::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("foodgram=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    tokio::fs::create_dir_all(&config.media_root).await?;

    let db = foodgram::connect(&config).await?;

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %listener.local_addr()?, "Running");

    axum::serve(listener, foodgram::app(db, config)).await?;
    Ok(())
}
