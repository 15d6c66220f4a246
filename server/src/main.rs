use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use proposal_server::auth;
use proposal_server::collab::registry::RoomRegistry;
use proposal_server::config::{generate_config_template, Config};
use proposal_server::db;
use proposal_server::routes;
use proposal_server::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "proposal_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "proposal_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("Proposal server v{} starting", env!("CARGO_PKG_VERSION"));

    // Initialize SQLite database and seed demo accounts
    let db = db::init_db(&config.data_dir)?;
    {
        let conn = db
            .lock()
            .map_err(|_| "DB lock poisoned during seeding")?;
        db::seed::seed_demo_users(&conn)?;
    }

    // Load or generate JWT signing key (256-bit random, stored in data_dir)
    let jwt_secret = auth::jwt::load_or_generate_jwt_secret(&config.data_dir)?;

    let app_state = AppState {
        db,
        jwt_secret,
        token_expire_minutes: config.token_expire_minutes,
        rooms: Arc::new(RoomRegistry::new()),
    };

    let app = routes::build_router(app_state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
