pub mod results;

pub use results::Results;
