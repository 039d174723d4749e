use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    health_handler, lookup_handler, redirect_handler, shorten_form_handler, shorten_path_handler,
};
use crate::state::AppState;

pub struct App {}

impl App {
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/{id}", get(redirect_handler))
            .nest(
                "/api/v1",
                Router::new()
                    .route("/shorten", post(shorten_form_handler))
                    .route("/shorten/{*url}", post(shorten_path_handler))
                    .route("/lookup/{id}", get(lookup_handler)),
            )
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}
