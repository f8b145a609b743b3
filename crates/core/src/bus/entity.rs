use serde::{Deserialize, Serialize};

/// Where a newly created durable consumer's cursor starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliverPolicy {
    New,
    All,
    Last,
    LastPerSubject,
}

impl Default for DeliverPolicy {
    fn default() -> Self {
        DeliverPolicy::New
    }
}

impl std::str::FromStr for DeliverPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(DeliverPolicy::New),
            "all" => Ok(DeliverPolicy::All),
            "last" => Ok(DeliverPolicy::Last),
            "last_per_subject" | "lastpersubject" => Ok(DeliverPolicy::LastPerSubject),
            other => Err(format!("unknown deliver policy: {other}")),
        }
    }
}

/// Idempotent stream declaration passed to [`super::port::BusClient::ensure_stream`].
#[derive(Debug, Clone)]
pub struct StreamSpec {
    pub name: String,
    pub subjects: Vec<String>,
}

impl StreamSpec {
    pub fn new(name: impl Into<String>, subjects: Vec<String>) -> Self {
        Self {
            name: name.into(),
            subjects,
        }
    }
}

/// Well-known stream/subject names (§6).
pub mod names {
    pub const PRINTS_STREAM: &str = "EQUITY_PRINTS";
    pub const PRINTS_SUBJECT: &str = "equity.prints";
    pub const QUOTES_STREAM: &str = "EQUITY_QUOTES";
    pub const QUOTES_SUBJECT: &str = "equity.quotes";
    pub const CANDLES_STREAM: &str = "EQUITY_CANDLES";
    pub const CANDLES_SUBJECT: &str = "equity.candles";
}
