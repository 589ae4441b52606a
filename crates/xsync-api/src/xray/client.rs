// Xray HandlerService gRPC client
//
// Wraps a tonic `Channel` with the `AlterInbound` call and fans every user
// operation out to all configured inbound tags. Per-tag rejections are
// collected into a single `Error::Rejected` so callers can classify them.

use std::time::Duration;

use tonic::Code;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Channel;
use tracing::debug;

use super::account::Account;
use super::proto::{
    ALTER_INBOUND_PATH, AddUserOperation, AlterInboundRequest, AlterInboundResponse,
    RemoveUserOperation, TypedMessage, User,
};
use crate::error::{Error, RpcOp, TagFailure};
use crate::transport::TransportConfig;

/// Client for Xray's `HandlerService`, bound to a fixed set of inbound tags.
///
/// Cheap to share: calls take `&self` and clone the underlying channel,
/// so one client can serve any number of concurrent workers.
#[derive(Clone)]
pub struct XrayClient {
    grpc: Grpc<Channel>,
    address: String,
    tags: Vec<String>,
    timeout: Duration,
}

impl XrayClient {
    /// Dial the Xray API listener and bind the client to `tags`.
    ///
    /// The connection is established eagerly, so an unreachable control
    /// plane surfaces here as `Error::Connect` rather than on the first call.
    /// Blank tags are dropped; an empty tag set is rejected.
    pub async fn connect(
        address: &str,
        tags: Vec<String>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let tags = normalize_tags(tags);
        if tags.is_empty() {
            return Err(Error::NoTargets);
        }

        let channel = transport
            .build_endpoint(address)?
            .connect()
            .await
            .map_err(|source| Error::Connect {
                address: address.to_owned(),
                source,
            })?;

        debug!(address, ?tags, "connected to xray api");

        Ok(Self {
            grpc: Grpc::new(channel),
            address: address.to_owned(),
            tags,
            timeout: transport.timeout,
        })
    }

    /// The control-plane address this client dialed.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The inbound tags every call fans out to.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Add a user to every configured inbound.
    pub async fn add_user(&self, email: &str, level: u32, account: &Account) -> Result<(), Error> {
        let user = User {
            level,
            email: email.to_owned(),
            account: Some(account.to_typed_message()),
        };
        let operation =
            TypedMessage::pack(AddUserOperation::TYPE_NAME, &AddUserOperation { user: Some(user) });
        debug!(email, level, "adding user");
        self.alter_all(RpcOp::AddUser, &operation).await
    }

    /// Remove a user (by email) from every configured inbound.
    pub async fn remove_user(&self, email: &str) -> Result<(), Error> {
        let operation = TypedMessage::pack(
            RemoveUserOperation::TYPE_NAME,
            &RemoveUserOperation {
                email: email.to_owned(),
            },
        );
        debug!(email, "removing user");
        self.alter_all(RpcOp::RemoveUser, &operation).await
    }

    // ── Fan-out ──────────────────────────────────────────────────────

    async fn alter_all(&self, op: RpcOp, operation: &TypedMessage) -> Result<(), Error> {
        let mut failures = Vec::new();
        for tag in &self.tags {
            if let Err(failure) = self.alter_inbound(tag, operation).await {
                debug!(%op, %failure, "inbound rejected operation");
                failures.push(failure);
            }
        }
        fan_out_result(op, self.tags.len(), failures)
    }

    /// One `AlterInbound` call against a single tag, bounded by the call timeout.
    async fn alter_inbound(&self, tag: &str, operation: &TypedMessage) -> Result<(), TagFailure> {
        let request = AlterInboundRequest {
            tag: tag.to_owned(),
            operation: Some(operation.clone()),
        };
        let mut grpc = self.grpc.clone();

        let call = async move {
            grpc.ready()
                .await
                .map_err(|e| tonic::Status::unavailable(format!("service was not ready: {e}")))?;
            let codec: ProstCodec<AlterInboundRequest, AlterInboundResponse> =
                ProstCodec::default();
            grpc.unary(
                tonic::Request::new(request),
                PathAndQuery::from_static(ALTER_INBOUND_PATH),
                codec,
            )
            .await
        };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(status)) => Err(TagFailure::new(tag, status.code(), status.message())),
            Err(_) => Err(TagFailure::new(
                tag,
                Code::DeadlineExceeded,
                format!("no response within {}ms", self.timeout.as_millis()),
            )),
        }
    }
}

impl std::fmt::Debug for XrayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XrayClient")
            .field("address", &self.address)
            .field("tags", &self.tags)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_owned());
        }
    }
    out
}

/// A fan-out call succeeds only if no tag rejected it.
fn fan_out_result(op: RpcOp, total: usize, failures: Vec<TagFailure>) -> Result<(), Error> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::Rejected {
            op,
            total,
            failures,
        })
    }
}
