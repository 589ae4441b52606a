// Shared transport configuration for building HTTP and gRPC clients.
//
// The feed client (reqwest) and the Xray client (tonic) share timeout
// settings through this module, avoiding duplicated builder logic.

use std::time::Duration;

use tonic::transport::Endpoint;

use crate::error::Error;

/// Shared transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Deadline applied to every individual request / RPC.
    pub timeout: Duration,
    /// Deadline for establishing the underlying connection.
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(8),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl TransportConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Build a `reqwest::Client` for the desired-state feed.
    ///
    /// Redirects are not followed: the feed is an authenticated POST and a
    /// redirect almost always means a misconfigured URL.
    pub fn build_http_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("xsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Transport)
    }

    /// Build a plaintext HTTP/2 endpoint for the Xray API listener.
    ///
    /// Accepts either `host:port` or a full `http://host:port` URI.
    pub fn build_endpoint(&self, address: &str) -> Result<Endpoint, Error> {
        let uri = if address.contains("://") {
            address.to_owned()
        } else {
            format!("http://{address}")
        };

        let endpoint = Endpoint::from_shared(uri).map_err(|e| Error::InvalidAddress {
            address: address.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(endpoint
            .connect_timeout(self.connect_timeout)
            .timeout(self.timeout)
            .tcp_nodelay(true))
    }
}
