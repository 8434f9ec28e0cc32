mod admin;
mod app;
mod auth;
mod config;
mod error;
mod extract;
mod models;
mod notes;
mod state;
mod store;

use tracing_subscriber::EnvFilter;

use crate::{app::build_app, auth::services::ensure_bootstrap_admin, state::AppState};

/// `RUST_LOG` picks the filter; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("notekeeper=debug,axum=info,tower_http=info"));
    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().with_target(false).init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let state = AppState::init().await?;

    if let Some(admin) = &state.config.bootstrap_admin {
        if let Err(e) = ensure_bootstrap_admin(state.store.as_ref(), admin).await {
            tracing::warn!(error = %e, "could not create bootstrap admin; continuing");
        }
    }

    app::serve(build_app(state)).await
}
