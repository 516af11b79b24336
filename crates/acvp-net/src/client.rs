// crates/acvp-net/src/client.rs
// ============================================================================
// Module: HTTP network client
// Description: Reference `NetworkClient` implementation over `reqwest`,
//              injecting a JWT bearer header into every call.
// ============================================================================

//! ## Overview
//! TLS client-certificate authentication, if configured, is handled by the
//! underlying `reqwest::Client` the caller builds and is opaque to this
//! wrapper — it only adds the bearer header and translates transport/status
//! failures into [`NetError`].

use acvp_core::identifiers::{ModuleDefinition, TestId};
use acvp_core::interfaces::{NetError, NetworkClient};
use async_trait::async_trait;

/// Reference [`NetworkClient`] backed by `reqwest`.
pub struct HttpNetworkClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpNetworkClient {
    /// Wraps a pre-built `reqwest::Client` (already configured with
    /// whatever TLS/mTLS and timeout settings the caller needs) and the
    /// base URL of the currently active ACVP server.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn classify(response: reqwest::Response) -> Result<Vec<u8>, NetError> {
        let status = response.status();
        if status.is_client_error() {
            return Err(NetError::ClientError(status.as_u16()));
        }
        if status.is_server_error() {
            return Err(NetError::ServerError(status.as_u16()));
        }
        response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|err| NetError::Transport(err.to_string()))
    }
}

#[async_trait]
impl NetworkClient for HttpNetworkClient {
    async fn login(&self, module: &ModuleDefinition, test_id: TestId) -> Result<String, NetError> {
        let body = serde_json::json!({
            "vendor": module.vendor(),
            "module": module.module(),
            "version": module.version(),
            "testSessionId": test_id.0,
        });
        let response = self
            .client
            .post(self.url("/login"))
            .json(&body)
            .send()
            .await
            .map_err(|err| NetError::Transport(err.to_string()))?;
        let bytes = Self::classify(response).await?;
        let value: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|err| NetError::MalformedBody(err.to_string()))?;
        value
            .get("accessToken")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| NetError::AuthFailed("login response missing accessToken".to_string()))
    }

    async fn get(&self, url: &str, token: &str) -> Result<Vec<u8>, NetError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| NetError::Transport(err.to_string()))?;
        Self::classify(response).await
    }

    async fn post(&self, url: &str, token: &str, body: &[u8]) -> Result<Vec<u8>, NetError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .body(body.to_vec())
            .send()
            .await
            .map_err(|err| NetError::Transport(err.to_string()))?;
        Self::classify(response).await
    }

    async fn put(&self, url: &str, token: &str, body: &[u8]) -> Result<Vec<u8>, NetError> {
        let response = self
            .client
            .put(url)
            .bearer_auth(token)
            .body(body.to_vec())
            .send()
            .await
            .map_err(|err| NetError::Transport(err.to_string()))?;
        Self::classify(response).await
    }
}

/// Builds the five exact ACVP URLs this workspace's core consumes.
pub mod urls {
    use acvp_core::identifiers::{TestId, VsId};

    /// `GET /testSessions/{t}/vectorSets/{v}` — fetch vectors.
    #[must_use]
    pub fn vector_set(base_url: &str, test_id: TestId, vs_id: VsId) -> String {
        format!("{}/testSessions/{test_id}/vectorSets/{vs_id}", base_url.trim_end_matches('/'))
    }

    /// `POST`/`PUT /testSessions/{t}/vectorSets/{v}/results` — submit results.
    #[must_use]
    pub fn vector_set_results(base_url: &str, test_id: TestId, vs_id: VsId) -> String {
        format!(
            "{}/testSessions/{test_id}/vectorSets/{vs_id}/results",
            base_url.trim_end_matches('/')
        )
    }

    /// `GET /testSessions/{t}/vectorSets/{v}/results` — vsID verdict.
    #[must_use]
    pub fn vsid_verdict(base_url: &str, test_id: TestId, vs_id: VsId) -> String {
        vector_set_results(base_url, test_id, vs_id)
    }

    /// `GET /testSessions/{t}/results` — session verdict.
    #[must_use]
    pub fn testid_verdict(base_url: &str, test_id: TestId) -> String {
        format!("{}/testSessions/{test_id}/results", base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Test-only assertions.")]
mod tests {
    use super::urls;
    use acvp_core::identifiers::{TestId, VsId};

    #[test]
    fn urls_match_the_documented_exact_paths() {
        let base = "https://acvts.example/acvp/v1";
        assert_eq!(
            urls::vector_set(base, TestId::from(1234), VsId::from(5678)),
            "https://acvts.example/acvp/v1/testSessions/1234/vectorSets/5678"
        );
        assert_eq!(
            urls::vector_set_results(base, TestId::from(1234), VsId::from(5678)),
            "https://acvts.example/acvp/v1/testSessions/1234/vectorSets/5678/results"
        );
        assert_eq!(
            urls::testid_verdict(base, TestId::from(1234)),
            "https://acvts.example/acvp/v1/testSessions/1234/results"
        );
    }
}
