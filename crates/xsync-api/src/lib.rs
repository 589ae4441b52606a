// xsync-api: Async Rust clients for the Xray control plane and the desired-state feed

pub mod error;
pub mod feed;
pub mod transport;
pub mod xray;

pub use error::{Error, RpcOp, TagFailure};
pub use feed::{FeedClient, FeedClientEntry, FeedResponse, GroupKind, InboundGroups};
pub use transport::TransportConfig;
pub use xray::{Account, XrayClient};

/// gRPC status codes carried by [`TagFailure`].
pub use tonic::Code;
