//! Errors for the engine's outer surface
//!
//! The simulation itself never fails: misses, empty transfers and vanished
//! targets are ordinary state. Only configuration and thread setup can.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A settings value is out of range.
    #[error("invalid settings: {0}")]
    InvalidSettings(&'static str),
    /// Reading a file or spawning the worker thread failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// Settings or star map JSON did not parse.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// The worker thread panicked; its world is lost.
    #[error("simulation worker panicked")]
    WorkerPanicked,
}
