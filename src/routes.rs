use axum::{
    routing::{get, post},
    Router,
};

use crate::sessions::api;

pub fn api_routes() -> Router {
    Router::new()
        .route(
            "/api/sessions/:advisor_id/status",
            get(api::session_status),
        )
        .route(
            "/api/sessions/:advisor_id/start-free",
            post(api::start_free_session),
        )
        .route(
            "/api/sessions/:advisor_id/start-paid",
            post(api::start_paid_session),
        )
        .route("/api/sessions/:advisor_id/stop", post(api::stop_session))
        .route(
            "/api/sessions/:advisor_id/availability",
            get(api::availability),
        )
        .route("/api/wallet", get(api::wallet_balance))
        .route("/api/wallet/credits", post(api::top_up))
        .route("/api/events/stream", get(api::stream_events))
}
