#![doc = "Measurement engine for the vsock latency benchmark."]

pub mod channel;
pub mod clock;
pub mod pinning;
pub mod protocol;

pub use channel::*;
pub use clock::*;
pub use pinning::*;
pub use protocol::*;
