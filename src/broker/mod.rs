pub mod broker; // In-memory FIFO task queue

// Re-export the main components for external use
pub use broker::{Broker, Options};
