//! Utility functions for tubemap

pub mod cache;
pub mod filename;
pub mod url;

pub use cache::*;
pub use filename::*;
pub use url::*;
