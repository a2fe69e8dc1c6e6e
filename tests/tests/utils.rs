use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

static PROMETHEUS: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install logging and the metrics recorder once, then start a mock service for this test.
///
/// Every test runs on its own runtime, so each one gets its own mock service.
#[allow(unused)]
pub async fn init() -> SocketAddr {
    PROMETHEUS.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_env_filter("volley=debug,mock_service=info,axum::rejection=trace")
            .init();

        PrometheusBuilder::new().install_recorder().unwrap()
    });

    mock_service::spawn().await.unwrap()
}

#[allow(unused)]
pub fn prometheus() -> Option<&'static PrometheusHandle> {
    PROMETHEUS.get()
}
