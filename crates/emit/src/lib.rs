pub mod emitter;

pub use emitter::{CandleEmitter, EmitterCounts};
