// src/lib.rs
pub mod cli;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod output;
pub mod probe;
pub mod queue;
pub mod resolver;
pub mod session;
pub mod sink;
pub mod sources;
pub mod types;
pub mod utils;
pub mod web;

pub use cli::Args;
pub use engine::ScanEngine;
pub use sink::EventSink;
pub use types::{Config, ResolutionRecord, ScanEvent, ScanSettings, ScanStats, SubprobeError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
