use axum::{
    debug_handler,
    extract::Path,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use lazy_static::lazy_static;
#[allow(unused)]
use metrics::{counter, gauge, histogram};
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::{
    num::NonZeroU32,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
    time::Duration,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

pub fn router() -> Router {
    Router::new()
        .route("/_admin/readiness", get(readiness))
        .route(
            "/_admin/readiness/degraded/:error_pct/delay/ms/:delay_ms",
            get(degraded),
        )
        // Mounted under a prefix so a base URL of `/empty` reaches it as its readiness probe.
        .route("/empty/_admin/readiness", get(empty))
        .route("/delay/ms/:delay_ms", get(delay))
        .route("/status/:code", get(status))
        .route(
            "/limited/:max_rps/delay/ms/:delay_ms/server/:server_id",
            get(limited),
        )
        .layer(TraceLayer::new_for_http())
}

/// Serve on `addr` until the process exits.
pub async fn run(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!("Mock service listening on {}", listener.local_addr()?);
    axum::serve(listener, router()).await?;
    Ok(())
}

/// Serve on an ephemeral localhost port in the background and return its address.
pub async fn spawn() -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router()).await {
            error!("Mock service stopped: {err}");
        }
    });
    Ok(addr)
}

#[derive(Debug, Serialize)]
pub struct Readiness {
    pub status: &'static str,
}

#[debug_handler]
pub async fn readiness() -> Json<Readiness> {
    count();
    Json(Readiness { status: "ready" })
}

/// Readiness probe which fails `error_pct` percent of requests with a 503.
#[debug_handler]
pub async fn degraded(
    Path((error_pct, delay_ms)): Path<(u8, u64)>,
) -> Result<Json<Readiness>, StatusCode> {
    count();
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;

    let roll: u8 = rand::thread_rng().gen_range(0..100);
    if roll < error_pct {
        debug!("Degraded readiness probe failing");
        Err(StatusCode::SERVICE_UNAVAILABLE)
    } else {
        Ok(Json(Readiness { status: "ready" }))
    }
}

#[debug_handler]
pub async fn empty() -> StatusCode {
    count();
    StatusCode::OK
}

#[debug_handler]
pub async fn delay(Path(delay_ms): Path<u64>) -> &'static str {
    count();
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    "ok"
}

#[debug_handler]
pub async fn status(Path(code): Path<u16>) -> StatusCode {
    count();
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

lazy_static! {
    static ref LIMITED_MAP: Arc<RwLock<HashMap<String, Arc<DefaultDirectRateLimiter>>>> =
        Arc::new(RwLock::new(HashMap::new()));
}

/// Responds 429 once `max_rps` is exceeded for `server_id`.
#[debug_handler]
pub async fn limited(
    Path((max_rps, delay_ms, server_id)): Path<(u32, u64, String)>,
) -> StatusCode {
    count();
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;

    let Some(max_rps) = NonZeroU32::new(max_rps) else {
        return StatusCode::BAD_REQUEST;
    };

    let read = LIMITED_MAP
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .get(&server_id)
        .cloned();
    let limiter = if let Some(limiter) = read {
        limiter
    } else {
        let limiter = Arc::new(rate_limiter(max_rps));
        LIMITED_MAP
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(server_id, limiter.clone());
        limiter
    };

    match limiter.check() {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::TOO_MANY_REQUESTS,
    }
}

/** Utils **/

pub fn rate_limiter(rps: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(rps))
}

fn count() {
    counter!("mock-service.requests").increment(1);
    RPS_MEASURE.fetch_add(1, Ordering::Relaxed);
    TOTAL.fetch_add(1, Ordering::Relaxed);
}

/// Requests served since the process started.
pub fn total_requests() -> u64 {
    TOTAL.load(Ordering::Relaxed)
}

/** RPS Printer **/

static RPS_MEASURE: AtomicU64 = AtomicU64::new(0);
static TOTAL: AtomicU64 = AtomicU64::new(0);

pub async fn rps_measure_task() {
    loop {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let requests = RPS_MEASURE.swap(0, Ordering::Relaxed);
        info!("{requests} RPS");
    }
}
