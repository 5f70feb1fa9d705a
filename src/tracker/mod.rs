pub mod client;

pub use client::{Client, Issue, Label};
