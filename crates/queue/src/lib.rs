//! Job queue adapters for apserve.
//!
//! Accepted inbox activities are pushed to Redis through apalis; the
//! processing workers consume the same storage.

pub mod inbox;

pub use inbox::{INBOX_NAMESPACE, RedisInboxQueue, connect_inbox_storage};
