// Xray control-plane client modules
//
// Hand-written protobuf messages for `HandlerService.AlterInbound` plus a
// tonic client that fans user operations out across inbound tags.

pub mod account;
pub mod client;
pub mod proto;

pub use account::Account;
pub use client::XrayClient;
