use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use volley::http::HttpClient;
use volley::prelude::*;
use volley::report::EXIT_INVALID_CONFIG;
use volley_runtime::VolleyRuntime;

const READINESS: &str = include_str!("../configs/readiness.json");
const ACCEPTABLE_RESPONSE_TIME: Duration = Duration::from_millis(2000);

#[tokio::main]
async fn main() -> ExitCode {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("volley=info,readiness=info")),
        )
        .init();

    let default = match RunConfigFile::from_json(READINESS) {
        Ok(file) => file,
        Err(err) => {
            error!("Built-in readiness config is invalid: {err}");
            return ExitCode::from(EXIT_INVALID_CONFIG as u8);
        }
    };

    VolleyRuntime::new()
        .default_config(default)
        .with_args()
        .run(|config, request| {
            let client = HttpClient::new();
            let request = Arc::new(request);
            let target = request.base_url.clone();

            LoadTest::new("readiness", config, move |vu: VirtualUser| {
                readiness(client.clone(), request.clone(), vu)
            })
            .setup(move || async move {
                info!("Starting readiness load test against {target}");
                Ok::<_, anyhow::Error>(())
            })
            .teardown(|| async {
                info!("Readiness load test complete");
                Ok::<_, anyhow::Error>(())
            })
        })
        .await
}

/// One iteration: probe the readiness endpoint and grade the response.
async fn readiness(
    client: HttpClient,
    request: Arc<RequestConfig>,
    _vu: VirtualUser,
) -> Vec<Sample> {
    let url = format!("{}/_admin/readiness", request.base_url);
    let (sample, res) = client.sample(&url, &request.headers, request.timeout).await;

    let (ok, fast, content) = match &res {
        Ok(res) => {
            if res.status != 200 {
                warn!(
                    "Readiness check failed with status {}: {}",
                    res.status, res.body
                );
            }
            (
                res.status == 200,
                res.timings.duration < ACCEPTABLE_RESPONSE_TIME,
                res.has_content(),
            )
        }
        Err(err) => {
            warn!("Readiness request failed: {err}");
            (false, false, false)
        }
    };

    vec![sample
        .check("status is 200", ok)
        .check("response time is acceptable", fast)
        .check("response has content", content)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(base_url: String) -> Arc<RequestConfig> {
        Arc::new(RequestConfig {
            base_url,
            ..RequestConfig::default()
        })
    }

    fn checks(sample: &Sample) -> Vec<bool> {
        sample.checks.values().copied().collect()
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    async fn healthy_service_passes_every_check() {
        let addr = mock_service::spawn().await.unwrap();
        let vu = VirtualUser { id: 0, iteration: 0 };

        let samples =
            readiness(HttpClient::new(), request(format!("http://{addr}")), vu).await;

        assert_eq!(samples.len(), 1);
        assert!(samples[0].is_success());
        assert_eq!(checks(&samples[0]), vec![true, true, true]);
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    async fn missing_endpoint_fails_status_check() {
        let addr = mock_service::spawn().await.unwrap();
        let vu = VirtualUser { id: 0, iteration: 0 };

        let samples =
            readiness(HttpClient::new(), request(format!("http://{addr}/nope")), vu).await;

        assert!(!samples[0].is_success());
        assert!(!samples[0].checks["status is 200"]);
        assert!(logs_contain("Readiness check failed with status 404"));
    }

    #[tokio::test]
    async fn empty_body_fails_content_check() {
        let addr = mock_service::spawn().await.unwrap();
        let vu = VirtualUser { id: 0, iteration: 0 };

        let samples =
            readiness(HttpClient::new(), request(format!("http://{addr}/empty")), vu).await;

        assert!(samples[0].is_success());
        assert!(samples[0].checks["status is 200"]);
        assert!(samples[0].checks["response time is acceptable"]);
        assert!(!samples[0].checks["response has content"]);
    }

    #[tokio::test]
    async fn unreachable_service_fails_every_check() {
        let vu = VirtualUser { id: 0, iteration: 0 };
        let base_url = "http://127.0.0.1:1".to_string();
        let samples = readiness(HttpClient::new(), request(base_url), vu).await;

        assert!(!samples[0].is_success());
        assert_eq!(checks(&samples[0]), vec![false, false, false]);
    }

    #[test]
    fn built_in_config_is_valid() {
        let file = RunConfigFile::from_json(READINESS).unwrap();
        let config = file.validate().unwrap();
        assert_eq!(config.stages.len(), 3);
        assert_eq!(config.max_duration, Duration::from_secs(20 * 60));
        assert_eq!(config.thresholds.len(), 2);
        assert_eq!(file.request().unwrap().timeout, Duration::from_secs(10));
    }
}
