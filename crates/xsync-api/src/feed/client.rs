// Feed HTTP client
//
// Posts `{ token, public_id }` to the feed URL and hands back the decoded
// response together with the raw body, which the snapshot archiver stores
// byte-for-byte.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::models::{FeedResponse, preview};
use crate::error::Error;
use crate::transport::TransportConfig;

#[derive(Serialize)]
struct FeedRequest<'a> {
    token: &'a str,
    public_id: &'a str,
}

/// HTTP client for the desired-state feed.
pub struct FeedClient {
    http: reqwest::Client,
    url: Url,
    token: SecretString,
    server_id: String,
}

impl FeedClient {
    /// Create a feed client from a `TransportConfig`.
    pub fn new(
        url: Url,
        token: SecretString,
        server_id: impl Into<String>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_http_client()?;
        Ok(Self::with_client(http, url, token, server_id))
    }

    /// Create a feed client with a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        url: Url,
        token: SecretString,
        server_id: impl Into<String>,
    ) -> Self {
        Self {
            http,
            url,
            token,
            server_id: server_id.into(),
        }
    }

    /// The feed endpoint.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The public identifier this server presents to the feed.
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Fetch the desired state.
    ///
    /// Non-2xx answers become `Error::FeedStatus` with a body preview;
    /// a body that is not the expected JSON becomes `Error::Deserialization`.
    pub async fn fetch(&self) -> Result<FeedResponse, Error> {
        debug!(url = %self.url, server_id = %self.server_id, "POST feed");

        let body = FeedRequest {
            token: self.token.expose_secret(),
            public_id: &self.server_id,
        };

        let resp = self
            .http
            .post(self.url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(Error::Transport)?;

        if !status.is_success() {
            return Err(Error::FeedStatus {
                status: status.as_u16(),
                preview: preview(&bytes),
            });
        }

        let parsed = FeedResponse::parse(bytes.to_vec())?;
        debug!(
            clients = parsed.clients.len(),
            vless = parsed.groups.vless.len(),
            vmess = parsed.groups.vmess.len(),
            reality = parsed.groups.reality.len(),
            "feed decoded"
        );
        Ok(parsed)
    }
}

impl std::fmt::Debug for FeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedClient")
            .field("url", &self.url.as_str())
            .field("server_id", &self.server_id)
            .finish_non_exhaustive()
    }
}
