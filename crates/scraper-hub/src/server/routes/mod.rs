use axum::Router;

mod api;
mod index;

pub(super) fn router() -> Router {
    Router::new()
        .merge(index::router())
        .nest("/api", api::router())
}
