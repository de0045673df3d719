use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info, warn};

use brand_shop::config::init_config;
use brand_shop::errors::{ShopError, ShopResult};
use brand_shop::server::logging::init_logging;
use brand_shop::server::{build_app, AppState, Database, TokenService};

async fn run() -> ShopResult<()> {
    let config = init_config()?;
    init_logging(&config.logging);

    let db = Database::connect(&config.database).await?;
    match db.ping().await {
        Ok(()) => info!("Pinged {} deployment successfully", db.backend_name()),
        Err(e) => warn!("Database ping failed, requests will retry the connection: {e}"),
    }

    let state = AppState {
        db,
        tokens: Arc::new(TokenService::from_config(&config.auth)?),
        enforce_cart_owner: config.auth.enforce_cart_owner,
    };
    let app = build_app(state, &config.cors)?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| ShopError::ConfigError(format!("invalid listen address: {e}")))?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ShopError::ServerError(format!("failed to bind {addr}: {e}")))?;

    info!("Server running on port {}", config.server.port);
    axum::serve(listener, app)
        .await
        .map_err(|e| ShopError::ServerError(format!("server error: {e}")))
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; the environment may be set another way.
    let _ = dotenvy::dotenv();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("brand_shop_server: {e}");
            ExitCode::FAILURE
        }
    }
}
