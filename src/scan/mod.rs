pub mod blame;
pub mod dedupe;
pub mod filter;
pub mod generator;
pub mod metadata;
pub mod parser;

pub use filter::PathFilter;
pub use generator::{ScanOutcome, TodoGenerator};
