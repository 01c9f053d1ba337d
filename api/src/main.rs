use dbforum_api::{app, config::Config, cors_layer, db, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dbforum_api=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env();
    let pool = db::open(&config).expect("Failed to open database");
    let cors = cors_layer(config.cors_origin.as_deref()).expect("Invalid CORS_ORIGIN");

    let app = app(AppState { db: pool }, cors);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind");
    tracing::info!(addr = %config.bind_addr, "API server listening");
    axum::serve(listener, app).await.expect("Server error");
}
