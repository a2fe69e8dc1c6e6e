mod utils;
#[allow(unused)]
use utils::*;

#[cfg(feature = "integration")]
mod tests {
    use super::*;

    use std::time::Duration;
    use volley::error::TransportError;
    use volley::http::HttpClient;
    use volley::prelude::*;

    fn request(base_url: String) -> RequestConfig {
        RequestConfig {
            base_url,
            ..RequestConfig::default()
        }
    }

    #[tokio::test]
    async fn status_codes_become_samples() {
        let addr = init().await;
        let client = HttpClient::new();

        let (sample, res) = client
            .sample(&format!("http://{addr}/status/503"), &[], Duration::from_secs(2))
            .await;
        assert!(!sample.is_success());
        assert_eq!(res.unwrap().status, 503);

        let (sample, res) = client
            .sample(&format!("http://{addr}/status/204"), &[], Duration::from_secs(2))
            .await;
        assert!(sample.is_success());
        assert!(!res.unwrap().has_content());
    }

    #[tokio::test]
    async fn get_path_joins_base_url() {
        let addr = init().await;
        let client = HttpClient::new();
        let request = request(format!("http://{addr}"));

        let res = client.get_path(&request, "/delay/ms/0").await.unwrap();
        assert_eq!(res.status, 200);
        assert_eq!(res.body, "ok");

        let res = client.get_path(&request, "_admin/readiness").await.unwrap();
        assert_eq!(res.status, 200);
        assert!(res.body.contains("ready"));
    }

    #[tokio::test]
    async fn custom_client_is_used() -> anyhow::Result<()> {
        let addr = init().await;
        let request = request(format!("http://{addr}"));

        let res = HttpClient::new().get_path(&request, "/delay/ms/0").await?;
        assert_eq!(res.status, 200);

        let inner = reqwest::Client::builder().https_only(true).build()?;
        let client = HttpClient::with_client(inner);
        let res = client.get_path(&request, "/delay/ms/0").await;
        assert!(matches!(res, Err(TransportError::InvalidRequest(_))));
        Ok(())
    }

    #[tokio::test]
    async fn served_requests_are_counted() {
        let addr = init().await;
        let client = HttpClient::new();
        let before = mock_service::total_requests();

        for _ in 0..5 {
            let res = client
                .get(&format!("http://{addr}/status/200"), &[], Duration::from_secs(2))
                .await
                .unwrap();
            assert_eq!(res.status, 200);
        }

        assert!(mock_service::total_requests() >= before + 5);
    }
}
