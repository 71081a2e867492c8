use axum::{middleware, routing, Router};
use std::sync::Arc;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

use crate::auth::login;
use crate::auth::middleware::JwtSecret;
use crate::gallery;
use crate::state::AppState;
use crate::status;
use crate::ws::handler as ws_handler;

/// Inject the JWT secret into request extensions so the Claims extractor can find it.
async fn inject_jwt_secret(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
///
/// The router must be served with `into_make_service_with_connect_info::<SocketAddr>()`
/// so the login rate limiter can key on the peer address.
pub fn build_router(state: AppState) -> Router {
    // Rate limiting: 5 requests per minute per IP on the login endpoint
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(12) // 1 token every 12 seconds = 5 per minute
            .burst_size(5)
            .finish()
            .expect("static governor config is valid"),
    );
    let governor_limiter = governor_config.limiter().clone();

    // Spawn background task to clean up rate limiter state
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            governor_limiter.retain_recent();
        }
    });

    let auth_routes = Router::new()
        .route("/login/", routing::post(login::login))
        .layer(GovernorLayer {
            config: governor_config,
        });

    let gallery_routes =
        Router::new().route("/gallery/{week}", routing::get(gallery::get_week_projects));

    // Reads are public; writes check the bearer token inside the handler.
    let status_routes = Router::new()
        .route("/how/{number}", routing::get(status::get_statuses))
        .route("/how/{number}/add/", routing::post(status::add_status))
        .route(
            "/how/{number}/update/{status_id}",
            routing::put(status::put_status),
        )
        .route(
            "/how/{number}/delete/{status_id}",
            routing::delete(status::remove_status),
        );

    // Chat endpoint: display name in the path, no token
    let chat_routes = Router::new().route("/chat/{name}", routing::get(ws_handler::chat_upgrade));

    let health = Router::new().route("/health", routing::get(health_check));

    Router::new()
        .merge(auth_routes)
        .merge(gallery_routes)
        .merge(status_routes)
        .merge(chat_routes)
        .merge(health)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
