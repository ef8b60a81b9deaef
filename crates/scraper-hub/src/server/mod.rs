use std::{net::SocketAddr, time::Duration};

use app_config::Config;
use axum::http::{header, HeaderValue, Request};
use axum::response::Response;
use listenfd::ListenFd;
use once_cell::sync::Lazy;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{self, CorsLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{debug, field, info, Span};

mod rate_limit;
mod routes;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting server...");

    let router = add_middlewares(routes::router());

    let mut listenfd = ListenFd::from_env();
    let listener = match listenfd.take_tcp_listener(0)? {
        Some(listener) => TcpListener::from_std(listener).expect("Failed to create listener"),
        None => {
            let host = Config::global().server().host.clone();
            let port = Config::global().server().port;

            TcpListener::bind((host, port))
                .await
                .expect("Failed to create listener")
        }
    };

    info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

static CACHE_CONTROL: Lazy<HeaderValue> =
    Lazy::new(|| HeaderValue::from_static("private, max-age=0"));

fn add_middlewares(router: axum::Router) -> axum::Router {
    router
        .layer(CatchPanicLayer::new())
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|request: &Request<_>| {
                            let m = request.method();
                            let p = request.uri().path();
                            let dur = field::Empty;

                            tracing::info_span!("", %m, ?p, dur)
                        })
                        .on_request(|request: &Request<_>, _span: &Span| {
                            let headers = request.headers();
                            info!(
                                target: "request",
                                "START \"{method} {uri} {http_type:?}\" {user_agent:?} {ip:?}",
                                http_type = request.version(),
                                method = request.method(),
                                uri = request.uri(),
                                user_agent = headers
                                    .get(header::USER_AGENT)
                                    .map_or("-", |x| x.to_str().unwrap_or("-")),
                                ip = headers
                                    .get("x-forwarded-for")
                                    .map_or("-", |x| x.to_str().unwrap_or("-")),
                            );
                        })
                        .on_response(|response: &Response<_>, latency, span: &Span| {
                            span.record("dur", field::debug(latency));
                            debug!(
                                target: "request",
                                "END {status}",
                                status = response.status().as_u16(),
                            );
                        }),
                )
                .layer(TimeoutLayer::new(Duration::from_secs(120)))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::CACHE_CONTROL,
                    |_response: &Response<_>| Some(CACHE_CONTROL.clone()),
                ))
                .layer(SetResponseHeaderLayer::appending(
                    header::DATE,
                    |_response: &Response<_>| {
                        Some(
                            chrono::Utc::now()
                                .to_rfc2822()
                                .parse()
                                .expect("Invalid date"),
                        )
                    },
                )),
        )
        .layer(
            CorsLayer::new()
                .allow_methods(cors::AllowMethods::mirror_request())
                .allow_origin(cors::AllowOrigin::mirror_request()),
        )
}
