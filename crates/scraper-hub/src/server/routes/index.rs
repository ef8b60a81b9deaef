use axum::{routing::any, Router};

pub(super) fn router() -> Router {
    Router::new().route("/ping", any(ping))
}

async fn ping() -> &'static str {
    "pong"
}
