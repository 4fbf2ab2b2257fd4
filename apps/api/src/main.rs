use dotenvy::dotenv;
use tracing::{info, warn};

use roomgrant_api::infra::{app::create_app, setup::init_app_state};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let app_state = init_app_state()?;

    let bind_addr = app_state.config.bind_addr;
    let minting_configured = app_state.config.minting_configured();

    let app = create_app(app_state);

    if !minting_configured {
        warn!("LiveKit gateway URL or signing credentials missing, grant requests will fail");
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Grant service listening at {}", &listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
