pub mod client;

pub use client::{HttpReporter, Reporter};
