use thiserror::Error;

/// Durable-bus domain error (§7).
#[derive(Error, Debug)]
pub enum BusError {
    /// Connect-time failure, retried up to a bounded attempt count by the caller.
    #[error("transient connect error: {0}")]
    TransientConnect(String),
    /// Publish ack failure. Logged and counted; never retried by the core.
    #[error("publish error: {0}")]
    Publish(String),
    /// Stream/consumer administration failure unrelated to "not found".
    #[error("admin error: {0}")]
    Admin(String),
    /// One of `duplicate subscription`, `durable requires ...`, `subject does not
    /// match consumer` — triggers the one-shot reset protocol in §4.1.
    #[error("consumer mismatch: {0}")]
    ConsumerMismatch(String),
    /// Ack/term/nak failed on an individual message.
    #[error("message ack error: {0}")]
    Ack(String),
}

impl BusError {
    /// Matches the three reset-triggering substrings from §4.1 / §7.
    pub fn is_consumer_mismatch(message: &str) -> bool {
        const MARKERS: [&str; 3] = [
            "duplicate subscription",
            "durable requires",
            "subject does not match consumer",
        ];
        let lower = message.to_lowercase();
        MARKERS.iter().any(|m| lower.contains(m))
    }

    pub fn is_not_found(message: &str) -> bool {
        message.to_lowercase().contains("not found")
    }
}
