mod utils;
#[allow(unused)]
use utils::*;

#[cfg(feature = "integration")]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Duration;
    use volley::http::HttpClient;
    use volley::prelude::*;
    use volley::AbortReason;
    use volley_runtime::{RuntimeError, VolleyRuntime};

    const RUN: &str = r#"{
        "stages": [
            { "duration": "200ms", "target": 3 },
            { "duration": "300ms", "target": 3 }
        ],
        "pause": "20ms",
        "tick": "50ms",
        "gracePeriod": "500ms",
        "thresholds": {
            "http_req_duration": ["p(95)<2000"],
            "http_req_failed": ["rate<0.05"]
        },
        "request": { "baseUrl": "http://127.0.0.1:1", "timeout": "2s" }
    }"#;

    async fn probe(
        client: HttpClient,
        request: Arc<RequestConfig>,
        _vu: VirtualUser,
    ) -> Vec<Sample> {
        let url = format!("{}/_admin/readiness", request.base_url);
        let (sample, _res) = client.sample(&url, &request.headers, request.timeout).await;
        vec![sample]
    }

    fn write_config(name: &str, json: &str) -> std::path::PathBuf {
        let file = format!("volley-{}-{name}.json", std::process::id());
        let path = std::env::temp_dir().join(file);
        std::fs::write(&path, json).unwrap();
        path
    }

    #[tokio::test]
    async fn config_file_with_base_url_override() -> anyhow::Result<()> {
        let addr = init().await;
        let path = write_config("override", RUN);

        let report = VolleyRuntime::new()
            .config_path(&path)
            .base_url(&format!("http://{addr}/"))
            .execute(|config, request| {
                let client = HttpClient::new();
                let request = Arc::new(request);
                LoadTest::new("runtime", config, move |vu: VirtualUser| {
                    probe(client.clone(), request.clone(), vu)
                })
            })
            .await?;

        assert!(report.passed(), "{report}");
        assert!(report.summary.unwrap().requests > 0);

        std::fs::remove_file(path)?;
        Ok(())
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_load() -> anyhow::Result<()> {
        init().await;
        let json = r#"{ "stages": [{ "duration": "-5s", "target": 1 }] }"#;
        let path = write_config("invalid", json);

        let res = VolleyRuntime::new()
            .config_path(&path)
            .execute(|config, _request| {
                LoadTest::new("invalid", config, |_vu: VirtualUser| async {
                    Vec::<Sample>::new()
                })
            })
            .await;

        assert!(matches!(res, Err(RuntimeError::Config(_))));
        std::fs::remove_file(path)?;
        Ok(())
    }

    #[tokio::test]
    async fn setup_failure_is_reported_as_aborted() -> anyhow::Result<()> {
        let addr = init().await;

        let runtime = || {
            VolleyRuntime::new()
                .default_config(RunConfigFile::from_json(RUN).unwrap())
                .base_url(&format!("http://{addr}"))
                .json(true)
        };
        let report = runtime()
            .execute(|config, request| {
                let client = HttpClient::new();
                let request = Arc::new(request);
                LoadTest::new("setup", config, move |vu: VirtualUser| {
                    probe(client.clone(), request.clone(), vu)
                })
                .setup(|| async { Err::<(), _>(anyhow::anyhow!("seed data missing")) })
            })
            .await?;

        assert!(matches!(report.abort_reason, Some(AbortReason::SetupFailed(_))));
        assert!(report.summary.is_none());
        assert_eq!(report.exit_code(), 107);

        let json: serde_json::Value = serde_json::from_str(&runtime().render(&report)?)?;
        assert_eq!(json["outcome"], "aborted");
        assert_eq!(json["abortReason"]["kind"], "setupFailed");
        let message = json["abortReason"]["message"].as_str().unwrap_or_default();
        assert!(message.contains("seed data missing"), "{message}");
        assert_eq!(json["states"], serde_json::json!(["idle", "settingUp", "aborted"]));
        Ok(())
    }

    #[tokio::test]
    async fn manual_cancellation_through_runtime_token() -> anyhow::Result<()> {
        let addr = init().await;
        let runtime = VolleyRuntime::new()
            .default_config(RunConfigFile::from_json(RUN)?)
            .base_url(&format!("http://{addr}"));

        let token = runtime.cancellation_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            token.cancel();
        });

        let report = runtime
            .execute(|config, request| {
                let client = HttpClient::new();
                let request = Arc::new(request);
                LoadTest::new("manual-cancel", config, move |vu: VirtualUser| {
                    probe(client.clone(), request.clone(), vu)
                })
            })
            .await?;

        assert_eq!(report.abort_reason, Some(AbortReason::Cancelled));
        Ok(())
    }
}
