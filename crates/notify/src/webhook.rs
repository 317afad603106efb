//! HTTP webhook notifier.
//!
//! Posts every progress event as a JSON body to a configured URL.

use std::collections::HashMap;
use std::time::Duration;

use crate::traits::{NotifyError, ProgressEvent, ProgressNotifier};

/// Delivers progress events as JSON over HTTP to a configured endpoint.
///
/// Environment variable references (`${VAR_NAME}`) in the URL and header
/// values are resolved at construction time.
#[derive(Debug)]
pub struct WebhookNotifier {
    url: String,
    headers: HashMap<String, String>,
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Missing env vars referenced in `url` or `headers` produce a
    /// [`NotifyError::Config`] error.
    pub fn new(
        url: &str,
        headers: HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let url = resolve_env_vars(url)?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(NotifyError::Config(format!("webhook url must be http(s): {url}")));
        }

        let mut resolved_headers = HashMap::with_capacity(headers.len());
        for (key, value) in &headers {
            resolved_headers.insert(key.clone(), resolve_env_vars(value)?);
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            url,
            headers: resolved_headers,
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl ProgressNotifier for WebhookNotifier {
    async fn broadcast(&self, event: &ProgressEvent) -> Result<(), NotifyError> {
        let body = serde_json::to_string(event)?;

        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);

        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(
                url = %self.url,
                %status,
                body = %body_text,
                "webhook returned non-2xx status"
            );
            return Err(NotifyError::Rejected(format!(
                "webhook returned {status}: {body_text}"
            )));
        }

        tracing::trace!(url = %self.url, uri = %event.uri, "progress webhook delivered");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}

/// Resolve `${VAR_NAME}` patterns in a string using `std::env::var`.
fn resolve_env_vars(input: &str) -> Result<String, NotifyError> {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| {
            NotifyError::Config(format!("unclosed env var reference in: {input}"))
        })?;
        let var_name = &after[..end];
        let value = std::env::var(var_name)
            .map_err(|_| NotifyError::Config(format!("env var not found: {var_name}")))?;
        result.push_str(&value);
        rest = &after[end + 1..];
    }
    result.push_str(rest);

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use repoflow_core::JobType;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn resolve_env_vars_multiple() {
        std::env::set_var("RF_WT_PROTO", "https");
        std::env::set_var("RF_WT_HOST", "api.test");
        let result = resolve_env_vars("${RF_WT_PROTO}://${RF_WT_HOST}/v1").unwrap();
        assert_eq!(result, "https://api.test/v1");
        std::env::remove_var("RF_WT_PROTO");
        std::env::remove_var("RF_WT_HOST");
    }

    #[test]
    fn resolve_env_vars_missing() {
        match resolve_env_vars("https://${RF_ABSOLUTELY_NOT_SET_12345}/hook").unwrap_err() {
            NotifyError::Config(msg) => assert!(msg.contains("RF_ABSOLUTELY_NOT_SET_12345")),
            other => panic!("expected Config error, got: {other:?}"),
        }
    }

    #[test]
    fn resolve_env_vars_unclosed() {
        match resolve_env_vars("https://${UNCLOSED/hook").unwrap_err() {
            NotifyError::Config(msg) => assert!(msg.contains("unclosed")),
            other => panic!("expected Config error, got: {other:?}"),
        }
    }

    #[test]
    fn rejects_non_http_url() {
        let result = WebhookNotifier::new("ftp://example.com", HashMap::new(), Duration::from_secs(1));
        assert!(matches!(result, Err(NotifyError::Config(_))));
    }

    #[test]
    fn headers_are_resolved() {
        std::env::set_var("RF_WT_API_KEY", "secret-key-123");
        let headers = HashMap::from([("X-Api-Key".to_string(), "${RF_WT_API_KEY}".to_string())]);
        let notifier =
            WebhookNotifier::new("https://example.com/hook", headers, Duration::from_secs(1))
                .unwrap();
        assert_eq!(notifier.headers["X-Api-Key"], "secret-key-123");
        assert_eq!(notifier.channel_name(), "webhook");
        std::env::remove_var("RF_WT_API_KEY");
    }

    /// Accept one HTTP request, answer with `status_line`, return the raw request.
    async fn one_shot_server(status_line: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let content_length = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            let (k, v) = l.split_once(':')?;
                            k.eq_ignore_ascii_case("content-length")
                                .then(|| v.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if buf.len() >= head_end + 4 + content_length {
                        break;
                    }
                }
            }
            let response = format!("{status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        });
        (format!("http://{addr}/hook"), handle)
    }

    fn event() -> ProgressEvent {
        ProgressEvent {
            uri: "example.com/r".to_string(),
            stage: JobType::Clone,
            progress: 40,
            timestamp: Utc::now(),
            revision: None,
            clone_progress: None,
        }
    }

    #[tokio::test]
    async fn posts_event_as_json() {
        let (url, server) = one_shot_server("HTTP/1.1 200 OK").await;
        let notifier = WebhookNotifier::new(&url, HashMap::new(), Duration::from_secs(5)).unwrap();

        notifier.broadcast(&event()).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /hook"));
        assert!(request.contains("\"uri\":\"example.com/r\""));
        assert!(request.contains("\"stage\":\"clone\""));
    }

    #[tokio::test]
    async fn non_2xx_is_rejected() {
        let (url, server) = one_shot_server("HTTP/1.1 503 Service Unavailable").await;
        let notifier = WebhookNotifier::new(&url, HashMap::new(), Duration::from_secs(5)).unwrap();

        let err = notifier.broadcast(&event()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Rejected(msg) if msg.contains("503")));
        server.await.unwrap();
    }
}
