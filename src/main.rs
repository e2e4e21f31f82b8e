use std::error::Error;

use api::telemetry;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // `.env` is optional; real environment variables win.
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(telemetry::env_filter("info,tower_http=info"))
        .with(telemetry::layer())
        .try_init()?;

    if let Err(e) = api::start().await {
        tracing::error!(error = %e, "service failed");
        return Err(e.into());
    }

    Ok(())
}
