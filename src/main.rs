//! Pettag server binary.
//!
//! # API Endpoints
//!
//! Public (anonymous finders):
//!
//! - `GET /pet/{code}` - Redacted pet profile; records a scan and alerts the owner
//! - `POST /pet/{code}/scan` - Record a scan with optional coordinates
//! - `POST /pet/{code}/report` - File a finder report with contact details
//!
//! Owner-facing (authorized upstream):
//!
//! - `POST /owners` - Provision an owner contact record
//! - `POST /pets` - Register a pet and issue its code and QR token
//! - `GET /pets/{id}` - Full pet record
//! - `PUT /pets/{id}` - Update profile fields
//! - `POST /pets/{id}/qr` - Regenerate the visual token
//! - `POST /pets/{id}/lost` / `POST /pets/{id}/found` - Toggle the lost flag
//! - `DELETE /pets/{id}` - Deactivate the pet and retire its code
//! - `GET /pets/{id}/scans` - Scan statistics and recent history
//! - `POST /pets/{id}/vaccination` / `GET /pets/{id}/vaccinations` - Vaccination history
//! - `POST /reports/{id}/verify` / `POST /reports/{id}/reunited` - Report lifecycle
//! - `GET /health` - Health check

use std::env;
use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use pettag::api::{
    AppState, add_vaccination, delete_pet, get_pet, get_pet_scans, get_public_pet,
    get_vaccinations, health_check, mark_found, mark_lost, post_owner, post_report, post_scan,
    register_pet, regenerate_qr, reunite_report, update_pet, verify_report,
};
use pettag::channels::{EmailClient, MessagingClient};
use pettag::dispatch::Dispatcher;
use pettag::storage::Storage;

/// Default port if not specified via environment variable.
const DEFAULT_PORT: u16 = 3000;

/// Default database path if not specified via environment variable.
const DEFAULT_DB_PATH: &str = "sqlite:pettag.db?mode=rwc";

/// Default sender identity for the email channel.
const DEFAULT_EMAIL_FROM: &str = "Pettag <alerts@pettag.example>";

/// Build the email client from the environment, if configured.
fn email_from_env() -> Option<EmailClient> {
    let token = env::var("PETTAG_EMAIL_API_TOKEN").ok()?;
    let from = env::var("PETTAG_EMAIL_FROM").unwrap_or_else(|_| DEFAULT_EMAIL_FROM.to_string());
    let client = match env::var("PETTAG_EMAIL_API_URL") {
        Ok(url) => EmailClient::with_base_url(&url, &token, &from),
        Err(_) => EmailClient::new(&token, &from),
    };
    Some(client)
}

/// Build the messaging client from the environment, if configured.
fn messaging_from_env() -> Option<MessagingClient> {
    let phone_id = env::var("PETTAG_MESSAGING_PHONE_ID").ok()?;
    let token = env::var("PETTAG_MESSAGING_API_TOKEN").ok()?;
    let client = match env::var("PETTAG_MESSAGING_API_URL") {
        Ok(url) => MessagingClient::with_base_url(&url, &phone_id, &token),
        Err(_) => MessagingClient::new(&phone_id, &token),
    };
    Some(client)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with environment filter
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("pettag=info".parse()?))
        .init();

    // Load configuration from environment
    let port: u16 = env::var("PETTAG_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let db_url = env::var("PETTAG_DATABASE_URL").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());

    let base_url =
        env::var("PETTAG_BASE_URL").unwrap_or_else(|_| format!("http://localhost:{port}"));

    info!(port, db_url = %db_url, base_url = %base_url, "Starting Pettag server");

    // Initialize storage
    let storage = Storage::new(&db_url).await?;
    info!("Database initialized");

    // Channel clients are optional; a missing credential means the channel
    // is skipped at dispatch time, never a startup failure.
    let email = email_from_env();
    let messaging = messaging_from_env();
    info!(
        email_configured = email.is_some(),
        messaging_configured = messaging.is_some(),
        "Notification channels configured"
    );

    let dispatcher = Dispatcher::new(&base_url, email, messaging);

    // Create application state
    let state = AppState {
        storage,
        dispatcher,
        base_url,
    };

    // Build router
    let app = Router::new()
        .route("/owners", post(post_owner))
        .route("/pets", post(register_pet))
        .route(
            "/pets/:id",
            get(get_pet).put(update_pet).delete(delete_pet),
        )
        .route("/pets/:id/qr", post(regenerate_qr))
        .route("/pets/:id/lost", post(mark_lost))
        .route("/pets/:id/found", post(mark_found))
        .route("/pets/:id/scans", get(get_pet_scans))
        .route("/pets/:id/vaccination", post(add_vaccination))
        .route("/pets/:id/vaccinations", get(get_vaccinations))
        .route("/pet/:code", get(get_public_pet))
        .route("/pet/:code/scan", post(post_scan))
        .route("/pet/:code/report", post(post_report))
        .route("/reports/:id/verify", post(verify_report))
        .route("/reports/:id/reunited", post(reunite_report))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "Pettag is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
