//! Data models for the blob gateway.
//!
//! None of these are persisted by the gateway: the object store is the only
//! source of truth for which blobs exist.

pub mod blob;
pub mod ticket;
pub mod upload;
