use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};
use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::http_client::HttpMethod;

type HmacSha256 = Hmac<Sha256>;

/// API key and secret for one exchange account.
///
/// Immutable once constructed and owned by exactly one adapter instance.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    secret: Vec<u8>,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            api_key: api_key.into(),
            secret: secret.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Per-exchange signing configuration.
///
/// Which endpoints require a signature, and which of those sign over the bare
/// path while the request itself still carries its query string, are upstream
/// API quirks. Both are data here so each adapter instance can carry its own
/// tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningPolicy {
    private_endpoints: BTreeSet<String>,
    query_exempt: BTreeSet<String>,
    expiry_horizon: Duration,
}

impl SigningPolicy {
    pub fn new<I, J>(private_endpoints: I, query_exempt: J, expiry_horizon: Duration) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        J: IntoIterator,
        J::Item: Into<String>,
    {
        Self {
            private_endpoints: private_endpoints.into_iter().map(Into::into).collect(),
            query_exempt: query_exempt.into_iter().map(Into::into).collect(),
            expiry_horizon,
        }
    }

    /// BitMEX signs its three account endpoints; `user/wallet` is signed over
    /// the path without its query string. Signatures are valid for 20 seconds.
    pub fn bitmex_default() -> Self {
        Self::new(
            ["user", "user/wallet", "user/walletHistory"],
            ["user/wallet"],
            Duration::from_secs(20),
        )
    }

    pub fn requires_signature(&self, endpoint: &str) -> bool {
        self.private_endpoints.contains(endpoint)
    }

    /// Path to sign for `endpoint`: the bare path when the endpoint is
    /// query-exempt, otherwise the full path including the query string.
    pub fn signed_path<'a>(&self, endpoint: &str, bare: &'a str, full: &'a str) -> &'a str {
        if self.query_exempt.contains(endpoint) {
            bare
        } else {
            full
        }
    }

    pub const fn expiry_horizon(&self) -> Duration {
        self.expiry_horizon
    }
}

/// Computes per-request authentication signatures from secret key material.
#[derive(Clone)]
pub struct RequestSigner {
    secret: Vec<u8>,
}

impl RequestSigner {
    pub fn new(credentials: &Credentials) -> Self {
        Self {
            secret: credentials.secret.clone(),
        }
    }

    /// Hex-encoded HMAC-SHA256 over `VERB + path + expires + body`.
    ///
    /// Pure: identical inputs always yield identical signatures. `expires` is
    /// embedded here and must be transmitted unchanged in the expiry header.
    pub fn sign(&self, method: HttpMethod, path: &str, expires: i64, body: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("hmac-sha256 accepts keys of any length");
        mac.update(method.as_str().as_bytes());
        mac.update(path.as_bytes());
        mac.update(expires.to_string().as_bytes());
        mac.update(body.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}
