//! # multisig-core
//!
//! Client library for a role-gated, timelocked multisig wallet contract:
//! JSON-RPC transport, contract read/write seams, a persistent transaction
//! cache, the cached transaction sync, and the owner-gated dashboard
//! controller.

pub mod cache;
pub mod client;
pub mod config;
pub mod contract;
pub mod dashboard;
pub mod error;
pub mod rpc;
pub mod sync;
pub mod types;
pub mod units;

pub use error::SyncError;
