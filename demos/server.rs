//! Demo server: reads options from the environment (and `.env`), generates the settings file from the
//! database when it does not exist yet, and mounts the admin API.

use admin_sdk::settings::generate::introspect;
use admin_sdk::{admin_router, AdminOptions, AppState};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("admin_sdk=info".parse()?))
        .init();

    let options = AdminOptions::from_env()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&options.database_url)
        .await?;

    let state = AppState::new(pool.clone(), options);
    if !state.settings.path().exists() {
        tracing::info!(path = %state.settings.path().display(), "no settings file; generating from database");
        let generated = introspect(&pool, &state.options.schema).await?;
        state.settings.save(&generated).await?;
    }

    let app = admin_router(state);
    let listener = TcpListener::bind("0.0.0.0:3000").await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
