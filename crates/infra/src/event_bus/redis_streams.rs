//! Redis Streams-backed log publisher.
//!
//! Each [`LogEvent`] becomes one `XADD` entry on a single stream:
//!
//! | Field | Value |
//! |-------|-------|
//! | `pattern` | routing key, e.g. `user.created` |
//! | `event_id` | the envelope's UUIDv7 |
//! | `payload` | the full envelope as JSON |
//!
//! The stream is capped with `MAXLEN ~` so an unconsumed queue cannot grow
//! without bound. Consumers (the external log service) own consumer groups
//! and acknowledgement; this side only appends.
//!
//! One connection is kept open and reused. It is opened with a connect
//! timeout, carries read/write timeouts, and is discarded after any error so
//! the next publish reconnects.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::instrument;

use usergate_events::{EventPublisher, LogEvent};

/// Default stream key for log events.
pub const DEFAULT_STREAM_KEY: &str = "usergate:logs";

/// Approximate cap on stream length.
const DEFAULT_MAX_LEN: usize = 100_000;

/// Bound on connect, read and write for each publish.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct RedisStreamsPublisher {
    client: Arc<redis::Client>,
    conn: Arc<Mutex<Option<redis::Connection>>>,
    stream_key: String,
    max_len: usize,
    io_timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum RedisStreamsError {
    #[error("Redis connection error: {0}")]
    Connection(String),

    #[error("Redis command error: {0}")]
    Command(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RedisStreamsPublisher {
    /// Create a publisher for `redis_url`.
    ///
    /// Opening the client only parses the URL; no connection is made until
    /// the first publish.
    pub fn new(
        redis_url: impl AsRef<str>,
        stream_key: Option<String>,
    ) -> Result<Self, RedisStreamsError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| RedisStreamsError::Connection(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            conn: Arc::new(Mutex::new(None)),
            stream_key: stream_key.unwrap_or_else(|| DEFAULT_STREAM_KEY.to_string()),
            max_len: DEFAULT_MAX_LEN,
            io_timeout: DEFAULT_IO_TIMEOUT,
        })
    }

    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.io_timeout = timeout;
        }
        self
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len.max(1);
        self
    }

    pub fn stream_key(&self) -> &str {
        &self.stream_key
    }

    #[instrument(
        skip(self, message),
        fields(stream_key = %self.stream_key, pattern = %message.pattern()),
        err
    )]
    fn publish_sync(&self, message: &LogEvent) -> Result<(), RedisStreamsError> {
        let payload = serde_json::to_string(message)
            .map_err(|e| RedisStreamsError::Serialization(e.to_string()))?;

        let mut slot = self
            .conn
            .lock()
            .map_err(|_| RedisStreamsError::Connection("connection lock poisoned".to_string()))?;

        let mut conn = match slot.take() {
            Some(conn) => conn,
            None => self.connect()?,
        };

        let _: String = redis::cmd("XADD")
            .arg(&self.stream_key)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.max_len)
            .arg("*")
            .arg("pattern")
            .arg(message.pattern())
            .arg("event_id")
            .arg(message.id().to_string())
            .arg("payload")
            .arg(&payload)
            .query(&mut conn)
            .map_err(|e| RedisStreamsError::Command(format!("XADD failed: {}", e)))?;

        // Only a connection that just worked goes back for reuse.
        *slot = Some(conn);
        Ok(())
    }

    fn connect(&self) -> Result<redis::Connection, RedisStreamsError> {
        let conn = self
            .client
            .get_connection_with_timeout(self.io_timeout)
            .map_err(|e| RedisStreamsError::Connection(e.to_string()))?;

        conn.set_read_timeout(Some(self.io_timeout))
            .and_then(|_| conn.set_write_timeout(Some(self.io_timeout)))
            .map_err(|e| RedisStreamsError::Connection(e.to_string()))?;

        Ok(conn)
    }
}

impl core::fmt::Debug for RedisStreamsPublisher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RedisStreamsPublisher")
            .field("stream_key", &self.stream_key)
            .field("max_len", &self.max_len)
            .field("io_timeout", &self.io_timeout)
            .finish_non_exhaustive()
    }
}

impl EventPublisher<LogEvent> for RedisStreamsPublisher {
    type Error = RedisStreamsError;

    fn publish(&self, message: LogEvent) -> Result<(), Self::Error> {
        self.publish_sync(&message)
    }
}
