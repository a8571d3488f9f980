//! Import client: POST the ledger XML to the accounting endpoint.
//!
//! One request per attempt, `Content-Type: text/xml`. By default there is a
//! single attempt; [`RetryPolicy`](crate::config::RetryPolicy) can enable
//! exponential backoff (`backoff_ms * 2^(attempt-1)`) for connection
//! failures, timeouts and 5xx answers. A 4xx answer is final.

use crate::config::{ImportConfig, RetryPolicy};
use crate::error::{Pdf2TallyError, Result};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Longest slice of a rejected response body kept in the error.
const MAX_BODY_IN_ERROR: usize = 512;

/// Sends import documents to one accounting endpoint.
#[derive(Debug, Clone)]
pub struct ImportClient {
    client: reqwest::Client,
    endpoint: String,
    timeout_secs: u64,
    retry: RetryPolicy,
}

impl ImportClient {
    pub fn new(config: &ImportConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Pdf2TallyError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            timeout_secs: config.request_timeout_secs,
            retry: config.retry,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Transmit `xml` and return the endpoint's response body.
    pub async fn send(&self, xml: &str) -> Result<String> {
        let mut last_err: Option<Pdf2TallyError> = None;

        for attempt in 0..=self.retry.max_retries {
            if attempt > 0 {
                let backoff = self.retry.delay_for(attempt);
                warn!(
                    "Import retry {}/{} after {}ms",
                    attempt, self.retry.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.send_once(xml).await {
                Ok(body) => {
                    info!(
                        "Import accepted by {} ({} bytes response)",
                        self.endpoint,
                        body.len()
                    );
                    return Ok(body);
                }
                Err(e) if e.is_retryable() => {
                    warn!("Import attempt {} failed: {}", attempt + 1, e);
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| Pdf2TallyError::Internal("no import attempt made".into())))
    }

    async fn send_once(&self, xml: &str) -> Result<String> {
        debug!("POST {} ({} bytes)", self.endpoint, xml.len());

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/xml")
            .body(xml.to_owned())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(Pdf2TallyError::ImportRejected {
                status: status.as_u16(),
                body: truncate(&body, MAX_BODY_IN_ERROR),
            });
        }

        Ok(body)
    }

    fn transport_error(&self, e: reqwest::Error) -> Pdf2TallyError {
        if e.is_timeout() {
            Pdf2TallyError::ImportTimeout {
                endpoint: self.endpoint.clone(),
                secs: self.timeout_secs,
            }
        } else {
            Pdf2TallyError::ImportUnreachable {
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\u{2026}", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc\u{2026}");
        // 'é' is two bytes; cutting at 2 would split it.
        assert_eq!(truncate("aé", 2), "a\u{2026}");
    }

    #[test]
    fn client_keeps_endpoint_and_policy() {
        let config = ImportConfig {
            endpoint: "http://127.0.0.1:9000".into(),
            request_timeout_secs: 5,
            retry: RetryPolicy {
                max_retries: 2,
                backoff_ms: 10,
            },
        };
        let client = ImportClient::new(&config).unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:9000");
        assert_eq!(client.retry.max_retries, 2);
    }
}
