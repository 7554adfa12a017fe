// Platform client
// Posts a thread as a linear reply chain with signed requests

use crate::error::PublishError;
use crate::oauth::{self, OAuthCredentials};
use crate::retry::{with_retries, RetryPolicy};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub const DEFAULT_ENDPOINT: &str = "https://api.twitter.com/2/tweets";

/// Status and raw body of one HTTP exchange
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Seam between the client and the network
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_json(&self, url: &str, authorization: &str, body: &Value) -> Result<HttpResponse, PublishError>;
}

/// reqwest transport with a per-request timeout
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, PublishError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, url: &str, authorization: &str, body: &Value) -> Result<HttpResponse, PublishError> {
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, authorization)
            .json(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}

/// A thread that stopped part way through
#[derive(Debug, Error)]
#[error("thread aborted at part {} with {} part(s) already posted: {}", .part_index + 1, .posted.len(), .source)]
pub struct ThreadPostError {
    /// Ids that were posted before the failure, in order
    pub posted: Vec<String>,
    /// Zero-based index of the part that failed
    pub part_index: usize,
    #[source]
    pub source: PublishError,
}

/// Posts ordered text parts as a reply chain and returns their ids
#[async_trait]
pub trait ThreadPoster: Send + Sync {
    async fn post_thread(&self, parts: &[String], cancel: &CancellationToken) -> Result<Vec<String>, ThreadPostError>;
}

#[derive(Debug, Deserialize)]
struct PostResponse {
    data: Option<PostData>,
}

#[derive(Debug, Deserialize)]
struct PostData {
    id: Option<String>,
}

/// Signed client for the platform's post endpoint
pub struct TwitterClient {
    transport: Arc<dyn HttpTransport>,
    credentials: OAuthCredentials,
    endpoint: String,
    retry: RetryPolicy,
}

impl TwitterClient {
    pub fn new(transport: Arc<dyn HttpTransport>, credentials: OAuthCredentials) -> Self {
        Self {
            transport,
            credentials,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Post one part, optionally as a reply, retrying transient failures
    pub async fn post_one(
        &self,
        text: &str,
        reply_to: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String, PublishError> {
        let body = match reply_to {
            Some(id) => json!({ "text": text, "reply": { "in_reply_to_tweet_id": id } }),
            None => json!({ "text": text }),
        };
        let body = &body;

        with_retries(&self.retry, cancel, || async move {
            // Re-signed per attempt so every request carries a fresh nonce
            let authorization = oauth::authorization_header(&self.credentials, "POST", &self.endpoint, &[])?;
            let response = self.transport.post_json(&self.endpoint, &authorization, body).await?;
            parse_post_response(response)
        })
        .await
    }
}

fn parse_post_response(response: HttpResponse) -> Result<String, PublishError> {
    if !(200..300).contains(&response.status) {
        return Err(PublishError::Http {
            status: response.status,
            body: response.body,
        });
    }

    let parsed: PostResponse = serde_json::from_str(&response.body)
        .map_err(|e| PublishError::Protocol(format!("unreadable success body: {}", e)))?;

    parsed
        .data
        .and_then(|d| d.id)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| PublishError::Protocol("success response without data.id".to_string()))
}

#[async_trait]
impl ThreadPoster for TwitterClient {
    async fn post_thread(&self, parts: &[String], cancel: &CancellationToken) -> Result<Vec<String>, ThreadPostError> {
        let mut posted: Vec<String> = Vec::with_capacity(parts.len());

        for (index, part) in parts.iter().enumerate() {
            let reply_to = posted.last().cloned();

            match self.post_one(part, reply_to.as_deref(), cancel).await {
                Ok(id) => {
                    info!(part = index + 1, total = parts.len(), post_id = %id, "Posted thread part");
                    posted.push(id);
                }
                Err(source) => {
                    error!(
                        part = index + 1,
                        total = parts.len(),
                        posted = posted.len(),
                        error = %source,
                        "Thread posting aborted"
                    );
                    return Err(ThreadPostError {
                        posted,
                        part_index: index,
                        source,
                    });
                }
            }
        }

        Ok(posted)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted transport: queued responses first, then sequential successes
    #[derive(Default)]
    pub struct FakeTransport {
        scripted: Mutex<VecDeque<HttpResponse>>,
        pub requests: Mutex<Vec<(String, String, Value)>>,
        next_id: Mutex<u64>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_response(&self, status: u16, body: &str) {
            self.scripted.lock().unwrap().push_back(HttpResponse {
                status,
                body: body.to_string(),
            });
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn bodies(&self) -> Vec<Value> {
            self.requests.lock().unwrap().iter().map(|(_, _, b)| b.clone()).collect()
        }
    }

    #[async_trait]
    impl HttpTransport for FakeTransport {
        async fn post_json(&self, url: &str, authorization: &str, body: &Value) -> Result<HttpResponse, PublishError> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), authorization.to_string(), body.clone()));

            if let Some(response) = self.scripted.lock().unwrap().pop_front() {
                return Ok(response);
            }

            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            Ok(HttpResponse {
                status: 201,
                body: json!({ "data": { "id": next.to_string(), "text": body["text"] } }).to_string(),
            })
        }
    }

    pub fn credentials() -> OAuthCredentials {
        OAuthCredentials::new("consumer", "consumer-secret", "token", "token-secret")
    }

    pub fn client(transport: Arc<FakeTransport>) -> TwitterClient {
        TwitterClient::new(transport, credentials()).with_retry_policy(RetryPolicy::new(1, 3))
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn parts(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("part {}", i)).collect()
    }

    #[tokio::test]
    async fn test_thread_is_a_linear_reply_chain() {
        let transport = Arc::new(FakeTransport::new());
        let ids = client(transport.clone())
            .post_thread(&parts(3), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(ids, vec!["1", "2", "3"]);
        let bodies = transport.bodies();
        assert!(bodies[0].get("reply").is_none());
        assert_eq!(bodies[1]["reply"]["in_reply_to_tweet_id"], "1");
        assert_eq!(bodies[2]["reply"]["in_reply_to_tweet_id"], "2");
        assert_eq!(bodies[2]["text"], "part 3");

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].0, DEFAULT_ENDPOINT);
        assert!(requests[0].1.starts_with("OAuth "));
        // Fresh nonce per request
        assert_ne!(requests[0].1, requests[1].1);
    }

    #[tokio::test]
    async fn test_rate_limit_then_success() {
        let transport = Arc::new(FakeTransport::new());
        transport.push_response(429, r#"{"title":"Too Many Requests"}"#);

        let ids = client(transport.clone())
            .post_thread(&parts(1), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(ids, vec!["1"]);
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_bad_request_aborts_without_retry() {
        let transport = Arc::new(FakeTransport::new());
        transport.push_response(400, r#"{"title":"Invalid Request"}"#);

        let err = client(transport.clone())
            .post_thread(&parts(3), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(transport.request_count(), 1);
        assert_eq!(err.part_index, 0);
        assert!(err.posted.is_empty());
        assert_eq!(err.source.status(), Some(400));
    }

    #[tokio::test]
    async fn test_mid_thread_failure_reports_partial_ids() {
        let transport = Arc::new(FakeTransport::new());
        transport.push_response(201, r#"{"data":{"id":"100"}}"#);
        transport.push_response(403, r#"{"title":"Forbidden"}"#);

        let err = client(transport.clone())
            .post_thread(&parts(3), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.posted, vec!["100"]);
        assert_eq!(err.part_index, 1);
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_success_without_id_is_protocol_error() {
        let transport = Arc::new(FakeTransport::new());
        transport.push_response(200, r#"{"data":{}}"#);

        let err = client(transport.clone())
            .post_one("hello", None, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Protocol(_)));
        assert_eq!(transport.request_count(), 1);
    }
}
