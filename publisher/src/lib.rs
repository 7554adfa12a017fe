//! Idempotent, retrying publisher for approved threads
//!
//! - `oauth`: OAuth 1.0a HMAC-SHA1 request signing
//! - `retry`: bounded exponential backoff for 429/5xx responses
//! - `client`: signed reply-chain poster behind an `HttpTransport` seam
//! - `publish`: run-level flow (idempotency, second-stage gate, publish lock)

pub mod client;
pub mod error;
pub mod oauth;
pub mod publish;
pub mod retry;

pub use client::{HttpResponse, HttpTransport, ReqwestTransport, ThreadPostError, ThreadPoster, TwitterClient, DEFAULT_ENDPOINT};
pub use error::PublishError;
pub use oauth::OAuthCredentials;
pub use publish::{PublishRequest, Publisher};
pub use retry::{with_retries, RetryPolicy};
