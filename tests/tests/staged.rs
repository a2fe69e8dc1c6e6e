mod utils;
#[allow(unused)]
use utils::*;

#[cfg(feature = "integration")]
mod tests {
    use super::*;

    use std::num::NonZeroU32;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use volley::http::HttpClient;
    use volley::prelude::*;
    use volley::report::{EXIT_CANCELLED, EXIT_THRESHOLDS_FAILED};
    use volley::{AbortReason, RunState, StopReason};

    fn quick(stages: Vec<Stage>, thresholds: &[(&str, &str)]) -> RunConfig {
        RunConfig::new(stages)
            .tick(Duration::from_millis(50))
            .pause(Duration::from_millis(20))
            .grace_period(Duration::from_millis(500))
            .thresholds(Thresholds::from_pairs(thresholds.iter().copied()).unwrap())
    }

    fn ramp() -> Vec<Stage> {
        vec![
            Stage::new(Duration::from_millis(300), 5),
            Stage::new(Duration::from_millis(500), 5),
            Stage::new(Duration::from_millis(200), 0),
        ]
    }

    /// One GET to `url` per iteration, graded with the readiness status check.
    #[derive(Clone)]
    struct Probe {
        client: HttpClient,
        url: Arc<String>,
    }

    impl Probe {
        fn new(url: String) -> Self {
            Self {
                client: HttpClient::new(),
                url: Arc::new(url),
            }
        }

        async fn run(self, _vu: VirtualUser) -> Vec<Sample> {
            let (sample, res) = self.client.sample(&self.url, &[], Duration::from_secs(2)).await;
            let ok = res.as_ref().map(|r| r.status == 200).unwrap_or(false);
            vec![sample.check("status is 200", ok)]
        }
    }

    fn get(url: String) -> impl Fn(VirtualUser) -> ProbeFuture + Clone + Send + Sync + 'static {
        let probe = Probe::new(url);
        move |vu: VirtualUser| -> ProbeFuture { Box::pin(probe.clone().run(vu)) }
    }

    type ProbeFuture = std::pin::Pin<Box<dyn std::future::Future<Output = Vec<Sample>> + Send>>;

    #[tokio::test]
    async fn readiness_run_passes() {
        let addr = init().await;

        let config = quick(
            ramp(),
            &[
                ("http_req_duration", "p(95)<2000"),
                ("http_req_failed", "rate<0.05"),
                ("checks", "rate>0.99"),
            ],
        );
        let url = format!("http://{addr}/_admin/readiness");
        let report = LoadTest::new("readiness", config, get(url)).await;

        assert_eq!(report.outcome, RunOutcome::Passed, "{report}");
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.stop_reason, Some(StopReason::StagesComplete));

        let summary = report.summary.unwrap();
        assert!(summary.requests > 10);
        assert_eq!(summary.failures, 0);
        assert_eq!(summary.checks["status is 200"].fails, 0);

        if let Some(prometheus) = prometheus() {
            assert!(prometheus.render().contains("volley_http_reqs"));
        }
    }

    #[tokio::test]
    async fn degraded_service_fails_error_rate() {
        let addr = init().await;

        let config = quick(
            ramp(),
            &[
                ("http_req_duration", "p(95)<2000"),
                ("http_req_failed", "rate<0.05"),
            ],
        );
        let url = format!("http://{addr}/_admin/readiness/degraded/50/delay/ms/1");
        let report = LoadTest::new("degraded", config, get(url)).await;

        assert_eq!(report.outcome, RunOutcome::Failed, "{report}");
        assert_eq!(report.exit_code(), EXIT_THRESHOLDS_FAILED);

        let verdict = report.verdict.unwrap();
        assert!(!verdict.results["http_req_failed: rate<0.05"].passed);
        assert!(verdict.results["http_req_duration: p(95)<2000"].passed);
    }

    #[tokio::test]
    async fn slow_service_fails_latency() {
        let addr = init().await;

        let config = quick(
            vec![Stage::new(Duration::from_millis(800), 3)],
            &[
                ("http_req_duration", "p(95)<100"),
                ("http_req_failed", "rate<0.05"),
            ],
        );
        let report =
            LoadTest::new("slow", config, get(format!("http://{addr}/delay/ms/250"))).await;

        assert_eq!(report.outcome, RunOutcome::Failed, "{report}");
        let verdict = report.verdict.unwrap();
        let latency = &verdict.results["http_req_duration: p(95)<100"];
        assert!(!latency.passed);
        assert!(latency.observed >= 250.);
        assert!(verdict.results["http_req_failed: rate<0.05"].passed);
    }

    #[tokio::test]
    async fn max_rps_keeps_under_server_limit() {
        let addr = init().await;

        let config = RunConfig::new(vec![Stage::new(Duration::from_secs(1), 10)])
            .start_target(10)
            .tick(Duration::from_millis(50))
            .pause(Duration::ZERO)
            .grace_period(Duration::from_millis(500))
            .max_rps(NonZeroU32::new(40).unwrap());
        let url = format!("http://{addr}/limited/60/delay/ms/0/server/max-rps");
        let report = LoadTest::new("max-rps", config, get(url)).await;

        let summary = report.summary.unwrap();
        assert_eq!(summary.failures, 0, "server limit exceeded");
        assert!(summary.requests <= 60, "{} requests", summary.requests);
    }

    #[tokio::test]
    #[ntest::timeout(10000)]
    async fn cancel_mid_run_aborts() {
        let addr = init().await;

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            canceller.cancel();
        });

        let config = quick(
            vec![Stage::new(Duration::from_secs(30), 5)],
            &[("http_req_failed", "rate<0.05")],
        );
        let start = Instant::now();
        let report = LoadTest::new(
            "cancelled",
            config,
            get(format!("http://{addr}/delay/ms/100")),
        )
        .cancel_on(token)
        .await;

        assert!(start.elapsed() < Duration::from_secs(3));
        assert_eq!(report.abort_reason, Some(AbortReason::Cancelled));
        assert_eq!(report.exit_code(), EXIT_CANCELLED);
        assert!(!report.states.contains(&RunState::Evaluated));
        assert!(report.summary.unwrap().requests > 0);
    }

    #[tokio::test]
    async fn unreachable_service_fails() {
        init().await;

        let config = quick(
            vec![Stage::new(Duration::from_millis(300), 2)],
            &[("http_req_failed", "rate<0.05")],
        );
        let url = "http://127.0.0.1:1/".to_string();
        let report = LoadTest::new("unreachable", config, get(url)).await;

        assert_eq!(report.outcome, RunOutcome::Failed, "{report}");
        let summary = report.summary.unwrap();
        assert_eq!(summary.failures, summary.requests);
    }
}
