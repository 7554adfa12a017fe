//! OAuth 1.0a request signing (HMAC-SHA1)
//!
//! Only the oauth_* parameters and any query/form parameters are signed.
//! JSON request bodies are not part of the signature base string.

use crate::error::PublishError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha1::Sha1;
use std::fmt;

type HmacSha1 = Hmac<Sha1>;

/// RFC 3986 unreserved characters are left as is
const RFC3986: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";

pub fn percent_encode(value: &str) -> String {
    utf8_percent_encode(value, RFC3986).to_string()
}

/// Consumer and access-token key pairs
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("access_token", &self.access_token)
            .field("access_token_secret", &"<redacted>")
            .finish()
    }
}

impl OAuthCredentials {
    pub fn new(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        access_token: impl Into<String>,
        access_token_secret: impl Into<String>,
    ) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            access_token: access_token.into(),
            access_token_secret: access_token_secret.into(),
        }
    }

    /// Read `X_API_KEY`, `X_API_SECRET`, `X_ACCESS_TOKEN`, `X_ACCESS_SECRET`
    pub fn from_env() -> Result<Self, PublishError> {
        let var = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PublishError::MissingCredentials(name.to_string()))
        };

        Ok(Self {
            consumer_key: var("X_API_KEY")?,
            consumer_secret: var("X_API_SECRET")?,
            access_token: var("X_ACCESS_TOKEN")?,
            access_token_secret: var("X_ACCESS_SECRET")?,
        })
    }
}

/// Random 16-byte nonce, hex encoded
pub fn generate_nonce() -> String {
    let bytes: [u8; 16] = std::array::from_fn(|_| fastrand::u8(..));
    hex::encode(bytes)
}

fn unix_timestamp() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Per-request signing inputs
#[derive(Debug, Clone)]
pub struct Signer<'a> {
    credentials: &'a OAuthCredentials,
    nonce: String,
    timestamp: u64,
}

impl<'a> Signer<'a> {
    /// Fresh nonce and current time
    pub fn new(credentials: &'a OAuthCredentials) -> Self {
        Self::with_nonce(credentials, generate_nonce(), unix_timestamp())
    }

    pub fn with_nonce(credentials: &'a OAuthCredentials, nonce: impl Into<String>, timestamp: u64) -> Self {
        Self {
            credentials,
            nonce: nonce.into(),
            timestamp,
        }
    }

    fn oauth_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("oauth_consumer_key", self.credentials.consumer_key.clone()),
            ("oauth_nonce", self.nonce.clone()),
            ("oauth_signature_method", SIGNATURE_METHOD.to_string()),
            ("oauth_timestamp", self.timestamp.to_string()),
            ("oauth_token", self.credentials.access_token.clone()),
            ("oauth_version", OAUTH_VERSION.to_string()),
        ]
    }

    /// `METHOD&enc(url)&enc(sorted encoded params)`
    pub fn base_string(&self, method: &str, url: &str, extra_params: &[(&str, &str)]) -> String {
        let mut encoded: Vec<(String, String)> = self
            .oauth_params()
            .into_iter()
            .map(|(k, v)| (percent_encode(k), percent_encode(&v)))
            .chain(
                extra_params
                    .iter()
                    .map(|(k, v)| (percent_encode(k), percent_encode(v))),
            )
            .collect();
        encoded.sort();

        let parameter_string = encoded
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        format!(
            "{}&{}&{}",
            method.to_ascii_uppercase(),
            percent_encode(url),
            percent_encode(&parameter_string)
        )
    }

    /// Base64 HMAC-SHA1 of the base string
    pub fn signature(&self, method: &str, url: &str, extra_params: &[(&str, &str)]) -> Result<String, PublishError> {
        let key = format!(
            "{}&{}",
            percent_encode(&self.credentials.consumer_secret),
            percent_encode(&self.credentials.access_token_secret)
        );

        let mut mac =
            HmacSha1::new_from_slice(key.as_bytes()).map_err(|e| PublishError::Signing(e.to_string()))?;
        mac.update(self.base_string(method, url, extra_params).as_bytes());

        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    /// Value for the `Authorization` header
    pub fn authorization_header(
        &self,
        method: &str,
        url: &str,
        extra_params: &[(&str, &str)],
    ) -> Result<String, PublishError> {
        let signature = self.signature(method, url, extra_params)?;

        let mut params = self.oauth_params();
        params.push(("oauth_signature", signature));
        params.sort();

        let fields = params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("OAuth {}", fields))
    }
}

/// Sign one request with a fresh nonce and timestamp
pub fn authorization_header(
    credentials: &OAuthCredentials,
    method: &str,
    url: &str,
    extra_params: &[(&str, &str)],
) -> Result<String, PublishError> {
    Signer::new(credentials).authorization_header(method, url, extra_params)
}
