use conduit::{config::Config, run_app};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> conduit::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("conduit=info,tower_http=info")),
        )
        .init();

    let config = Config::load()?;
    run_app(config).await
}
