//! Core business logic abstractions

pub mod config;
pub mod error;
pub mod log;
pub mod ratio;
pub mod series;

// Re-export main types for cleaner imports
pub use error::RatioError;
pub use ratio::{Pipeline, RatioPoint, RatioRequest};
pub use series::{HistoryProvider, PriceSeries};
