// src/probes/http.rs
use crate::health::{CheckContext, CheckError, ComponentStatus, Probe};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use std::time::Duration;
use url::Url;

/// Checks a downstream service with a single HTTP request.
///
/// The component is up only for a `200 OK` response.
pub struct UrlProbe {
    name: String,
    method: Method,
    url: Url,
    headers: HeaderMap,
    timeout: Duration,
    client: Client,
}

impl UrlProbe {
    pub fn new(
        name: impl Into<String>,
        method: Method,
        url: Url,
        headers: HeaderMap,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            method,
            url,
            headers,
            timeout,
            client: Client::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl Probe for UrlProbe {
    async fn check(&self, ctx: &CheckContext) -> ComponentStatus {
        // The caller's deadline wins; our own timeout only applies without one
        let ctx = ctx.clone().or_timeout(self.timeout);
        let status = ComponentStatus::new();

        let request = self
            .client
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone());

        let response = match ctx.run(request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_timeout() => {
                return status
                    .mark_down()
                    .with_detail("err", CheckError::DeadlineExceeded.to_string());
            }
            Ok(Err(e)) => {
                tracing::debug!(probe = %self.name, url = %self.url, error = %e, "Url probe failed");
                return status.mark_down().with_detail("err", e.to_string());
            }
            Err(e) => return status.mark_down().with_detail("err", e.to_string()),
        };

        let code = response.status();
        let status = if code == reqwest::StatusCode::OK {
            status.mark_up()
        } else {
            status.mark_down()
        };
        status.with_detail("status", code.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderName, HeaderValue};
    use tokio::net::TcpListener;

    fn probe(url: &str, headers: HeaderMap, timeout: Duration) -> UrlProbe {
        UrlProbe::new(
            "indicator",
            Method::GET,
            Url::parse(url).unwrap(),
            headers,
            timeout,
        )
    }

    #[tokio::test]
    async fn test_status_ok() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .match_header("key1", "value1")
            .with_status(200)
            .create_async()
            .await;

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("key1"),
            HeaderValue::from_static("value1"),
        );
        let probe = probe(&format!("{}/health", server.url()), headers, Duration::from_secs(1));

        let status = probe.check(&CheckContext::new()).await;

        mock.assert_async().await;
        assert!(status.is_up());
        assert_eq!(status.detail("status"), Some(&serde_json::json!(200)));
        assert!(status.detail("err").is_none());
    }

    #[tokio::test]
    async fn test_internal_server_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .with_status(500)
            .create_async()
            .await;

        let probe = probe(
            &format!("{}/health", server.url()),
            HeaderMap::new(),
            Duration::from_secs(1),
        );

        let status = probe.check(&CheckContext::new()).await;

        mock.assert_async().await;
        assert!(status.is_down());
        assert_eq!(status.detail("status"), Some(&serde_json::json!(500)));
        assert!(status.detail("err").is_none());
    }

    #[tokio::test]
    async fn test_timeout_is_down_with_deadline_error() {
        // Accepts connections and never answers
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let probe = probe(
            &format!("http://{}/health", addr),
            HeaderMap::new(),
            Duration::from_millis(100),
        );

        let status = probe.check(&CheckContext::new()).await;
        assert!(!status.is_up());
        assert!(status.detail("status").is_none());
        let err = status.detail("err").unwrap().as_str().unwrap().to_string();
        assert!(err.contains("deadline exceeded"), "unexpected err: {}", err);

        let ctx = CheckContext::with_timeout(Duration::from_millis(50));
        let status = probe.check(&ctx).await;
        assert!(status.is_down());

        server.abort();
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = probe(
            &format!("http://{}/health", addr),
            HeaderMap::new(),
            Duration::from_secs(1),
        );

        let status = probe.check(&CheckContext::new()).await;
        assert!(status.is_down());
        assert!(status.detail("err").is_some());
    }
}
