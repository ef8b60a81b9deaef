//! Fixed-window request counter keyed by client address.
//!
//! Process-wide state with reset-on-window semantics; the extraction core
//! itself stays stateless.

use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    sync::Mutex,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use once_cell::sync::Lazy;
use serde_json::json;

const WINDOW: Duration = Duration::from_secs(60);

static WINDOWS: Lazy<Mutex<HashMap<IpAddr, Window>>> = Lazy::new(|| Mutex::new(HashMap::new()));

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started_at: Instant,
}

pub async fn middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(request.headers(), addr);
    let limit = app_config::Config::global().server().rate_limit;

    if !check(ip, limit, Instant::now()) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "Rate limit exceeded. Please try again in a minute." })),
        )
            .into_response();
    }

    next.run(request).await
}

fn client_ip(headers: &HeaderMap, addr: SocketAddr) -> IpAddr {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|x| x.to_str().ok())
        .and_then(|x| x.split(',').next())
        .and_then(|x| x.trim().parse().ok())
        .unwrap_or_else(|| addr.ip())
}

fn check(ip: IpAddr, limit: u32, now: Instant) -> bool {
    let mut windows = WINDOWS.lock().expect("Rate limit map poisoned");
    let window = windows.entry(ip).or_insert(Window {
        count: 0,
        started_at: now,
    });

    if now.duration_since(window.started_at) > WINDOW {
        window.count = 0;
        window.started_at = now;
    }

    if window.count >= limit {
        return false;
    }

    window.count += 1;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    // The window map is process-wide, so every test uses its own address.

    #[test]
    fn blocks_once_the_window_limit_is_reached() {
        let ip: IpAddr = "10.1.0.1".parse().expect("Invalid test IP");
        let now = Instant::now();

        for _ in 0..3 {
            assert!(check(ip, 3, now));
        }
        assert!(!check(ip, 3, now));
    }

    #[test]
    fn resets_after_the_window_expires() {
        let ip: IpAddr = "10.1.0.2".parse().expect("Invalid test IP");
        let now = Instant::now();

        for _ in 0..3 {
            assert!(check(ip, 3, now));
        }
        assert!(!check(ip, 3, now));

        let later = now + WINDOW + Duration::from_secs(1);
        assert!(check(ip, 3, later));
    }

    #[test]
    fn clients_are_counted_independently() {
        let first: IpAddr = "10.1.0.3".parse().expect("Invalid test IP");
        let second: IpAddr = "10.1.0.4".parse().expect("Invalid test IP");
        let now = Instant::now();

        assert!(check(first, 1, now));
        assert!(!check(first, 1, now));
        assert!(check(second, 1, now));
    }
}
