pub mod batcher;

pub use batcher::{BatchBackend, BatchDispatcher, DispatchConfig};
