//! newsdesk: binary entrypoint.
//! Boots the Axum HTTP server: config, store, auth/leads collaborators, metrics.

use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    newsdesk::init_tracing();

    let router = newsdesk::app().await?;
    Ok(router.into())
}
