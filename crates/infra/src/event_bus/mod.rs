//! External log queue publishers.
//!
//! The publishing abstraction lives in `usergate-events`; this module holds
//! the infrastructure-backed implementation (Redis).

#[cfg(feature = "redis")]
pub mod redis_streams;

#[cfg(feature = "redis")]
pub use redis_streams::{RedisStreamsError, RedisStreamsPublisher};
