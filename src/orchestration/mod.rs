pub mod engine;

pub use engine::{CaptureResult, Collaborators, Engine};
