//! Forum service: users, forums, threads with reply trees, and thread votes,
//! stored in SQLite and served over JSON HTTP.

pub mod config;
pub mod conflict;
pub mod db;
pub mod error;
pub mod forum;
pub mod ordering;
pub mod path;
pub mod posts;
pub mod service;
pub mod threads;
pub mod users;
pub mod votes;

#[cfg(test)]
mod testing;

use axum::{
    http::{header::InvalidHeaderValue, HeaderValue},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

pub type DbPool = r2d2::Pool<r2d2_sqlite::SqliteConnectionManager>;

/// Page size for listings that omit `limit`.
pub const DEFAULT_LIMIT: u32 = 100;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
}

/// CORS for the configured origin, or for any origin when none is set.
pub fn cors_layer(origin: Option<&str>) -> Result<CorsLayer, InvalidHeaderValue> {
    let allow_origin = match origin {
        Some(origin) => AllowOrigin::exact(origin.parse::<HeaderValue>()?),
        None => AllowOrigin::any(),
    };
    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::any())
        .allow_headers(AllowHeaders::any()))
}

pub fn app(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/api/health", get(|| async { "ok" }))
        // Forums
        .route("/api/forum/create", post(forum::create_forum))
        .route("/api/forum/{slug}/details", get(forum::forum_details))
        .route("/api/forum/{slug}/create", post(forum::create_thread))
        .route("/api/forum/{slug}/threads", get(forum::list_threads))
        .route("/api/forum/{slug}/users", get(forum::forum_users))
        // Posts
        .route(
            "/api/post/{id}/details",
            get(posts::post_details).post(posts::update_post),
        )
        // Service
        .route("/api/service/clear", post(service::clear_all))
        .route("/api/service/status", get(service::service_status))
        // Threads
        .route("/api/thread/{slug_or_id}/create", post(posts::create_posts))
        .route(
            "/api/thread/{slug_or_id}/details",
            get(threads::thread_details).post(threads::update_thread),
        )
        .route("/api/thread/{slug_or_id}/posts", get(ordering::thread_posts))
        .route("/api/thread/{slug_or_id}/vote", post(votes::vote_thread))
        // Users
        .route("/api/user/{nickname}/create", post(users::create_user))
        .route(
            "/api/user/{nickname}/profile",
            get(users::get_profile).post(users::update_profile),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
