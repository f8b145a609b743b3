pub mod off_exchange;
pub mod publisher;
pub mod synthetic;
pub mod throttle;

pub use publisher::IngestPublisher;
pub use synthetic::SyntheticAdapter;
pub use throttle::ThrottleGate;
