// src/lib.rs

pub mod broker;
pub mod client;
pub mod error;
pub mod interface;
pub mod jobs;
pub mod logger;
pub mod results;
pub mod server;
pub mod tasks;

// Re-export key items for easier access
pub use error::{Error, Result};
pub use interface::{BrokerTraits, ResultsTraits};
pub use jobs::{Job, TaskFn, TaskId, TaskStatus};
pub use server::{Server, ServerOpts, ServerState, ShutdownPolicy};
pub use tasks::Kernel;
