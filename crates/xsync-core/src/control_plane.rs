// ── Control-plane seam ──
//
// The engine only needs "add this user everywhere" and "remove this ID
// everywhere". `XrayClient` is the production implementation; tests plug
// in scripted doubles.

use async_trait::async_trait;

use xsync_api::{Error as ApiError, XrayClient};

use crate::model::User;

/// Fan-out user management against a fixed set of inbound tags.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Add `user` to every target inbound.
    async fn add_user(&self, user: &User) -> Result<(), ApiError>;

    /// Remove the user keyed by `id` from every target inbound.
    async fn remove_user(&self, id: &str) -> Result<(), ApiError>;

    /// The inbound tags calls fan out to.
    fn targets(&self) -> &[String];
}

#[async_trait]
impl ControlPlane for XrayClient {
    async fn add_user(&self, user: &User) -> Result<(), ApiError> {
        XrayClient::add_user(self, &user.id, user.level, &user.account()).await
    }

    async fn remove_user(&self, id: &str) -> Result<(), ApiError> {
        XrayClient::remove_user(self, id).await
    }

    fn targets(&self) -> &[String] {
        self.tags()
    }
}
