//! Dynamic-secret backend client.
//!
//! Speaks the backend's two-step protocol: authenticate with the
//! caller's platform service identity to obtain a short-lived client
//! token, then fetch lease-bound credentials with it. The client holds
//! no state beyond the endpoint — every resolution performs a fresh
//! login and fetch, so there is nothing to renew or revoke.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use tracing::debug;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("invalid backend endpoint {endpoint}: {reason}")]
    Endpoint { endpoint: String, reason: String },

    #[error("request to {path} failed: {reason}")]
    Transport { path: String, reason: String },

    #[error("{path} returned status {status}")]
    Status { path: String, status: u16 },

    #[error("failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type VaultResult<T> = Result<T, VaultError>;

/// A short-lived credential pair minted by the backend.
///
/// Never persisted; used once to render a connection string and
/// discarded.
#[derive(Debug, Clone)]
pub struct DynamicCredentials {
    pub username: String,
    pub password: String,
    /// Lease validity in seconds.
    pub lease_duration: u64,
}

// ── Wire payloads ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct LoginResponse {
    auth: LoginAuth,
}

#[derive(Deserialize)]
struct LoginAuth {
    client_token: String,
}

#[derive(Deserialize)]
struct CredsResponse {
    lease_duration: u64,
    data: CredsData,
}

#[derive(Deserialize)]
struct CredsData {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct ConfigResponse {
    data: ConfigData,
}

#[derive(Deserialize)]
struct ConfigData {
    connection_details: ConnectionDetails,
}

#[derive(Deserialize)]
struct ConnectionDetails {
    connection_url: String,
}

// ── Client ────────────────────────────────────────────────────────

/// HTTP client for one secrets backend endpoint.
#[derive(Debug, Clone)]
pub struct VaultClient {
    endpoint: String,
}

impl VaultClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    /// Authenticate with a platform service-account token.
    ///
    /// Returns the short-lived client token used for subsequent reads.
    pub async fn login(&self, role: &str, jwt: &str) -> VaultResult<String> {
        let body = serde_json::json!({ "role": role, "jwt": jwt });
        let bytes = self
            .request(
                http::Method::POST,
                "/v1/auth/kubernetes/login",
                None,
                body.to_string().into_bytes(),
            )
            .await?;
        let response: LoginResponse = decode("/v1/auth/kubernetes/login", &bytes)?;
        debug!(endpoint = %self.endpoint, %role, "backend login succeeded");
        Ok(response.auth.client_token)
    }

    /// Fetch dynamic credentials for a secret under the database engine.
    pub async fn dynamic_credentials(
        &self,
        token: &str,
        secret: &str,
    ) -> VaultResult<DynamicCredentials> {
        let path = format!("/v1/database/creds/{secret}");
        let bytes = self
            .request(http::Method::GET, &path, Some(token), Vec::new())
            .await?;
        let response: CredsResponse = decode(&path, &bytes)?;
        debug!(%secret, lease = response.lease_duration, "dynamic credentials issued");
        Ok(DynamicCredentials {
            username: response.data.username,
            password: response.data.password,
            lease_duration: response.lease_duration,
        })
    }

    /// Fetch the stored connection URL template for a database mount.
    pub async fn stored_connection_url(&self, token: &str, database: &str) -> VaultResult<String> {
        let path = format!("/v1/database/config/{database}");
        let bytes = self
            .request(http::Method::GET, &path, Some(token), Vec::new())
            .await?;
        let response: ConfigResponse = decode(&path, &bytes)?;
        Ok(response.data.connection_details.connection_url)
    }

    /// Issue one HTTP/1.1 request and buffer the whole response body.
    async fn request(
        &self,
        method: http::Method,
        path: &str,
        token: Option<&str>,
        body: Vec<u8>,
    ) -> VaultResult<Bytes> {
        let uri: http::Uri = self.endpoint.parse().map_err(|e: http::uri::InvalidUri| {
            VaultError::Endpoint {
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            }
        })?;
        let host = uri.host().ok_or_else(|| VaultError::Endpoint {
            endpoint: self.endpoint.clone(),
            reason: "missing host".to_string(),
        })?;
        let port = uri.port_u16().unwrap_or(80);
        let address = format!("{host}:{port}");

        let transport = |reason: String| VaultError::Transport {
            path: path.to_string(),
            reason,
        };

        let stream = tokio::net::TcpStream::connect(&address)
            .await
            .map_err(|e| transport(e.to_string()))?;
        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| transport(e.to_string()))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let mut builder = http::Request::builder()
            .method(method)
            .uri(path)
            .header("host", &address)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("x-vault-token", token);
        }
        let request = builder
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| transport(e.to_string()))?;

        let response = sender
            .send_request(request)
            .await
            .map_err(|e| transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(VaultError::Status {
                path: path.to_string(),
                status: response.status().as_u16(),
            });
        }

        let collected = response
            .into_body()
            .collect()
            .await
            .map_err(|e| transport(e.to_string()))?;
        Ok(collected.to_bytes())
    }
}

fn decode<T: serde::de::DeserializeOwned>(path: &str, bytes: &Bytes) -> VaultResult<T> {
    serde_json::from_slice(bytes.as_ref()).map_err(|source| VaultError::Decode {
        path: path.to_string(),
        source,
    })
}
