// Desired-state feed
//
// A single authenticated POST returns the inbound tag groups and client
// list this server should carry.

pub mod client;
pub mod models;

pub use client::FeedClient;
pub use models::{FeedClientEntry, FeedResponse, GroupKind, InboundGroups};
