pub mod nats;

pub use nats::{NatsBusClient, NatsBusMessage};
