//! # tubemap - watch page stream resolver
//!
//! Turns a video watch page into a list of directly downloadable streams.
//!
//! ## Features
//!
//! - Embedded player config extraction
//! - Stream map decoding
//! - Static format catalog with quality ordering
//! - Signature deciphering from the player script, without a JS engine
//! - Player script caching shared across concurrent requests
//!
//! ## Example
//!
//! ```rust,no_run
//! use tubemap::{Resolver, StreamQuery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resolver = Resolver::new()?;
//!     let info = resolver.resolve_url("VIDEO_URL").await?;
//!
//!     if let Some(stream) = info.get(&StreamQuery::new().with_resolution("720p"))? {
//!         println!("{} -> {}", stream.summary(), stream.url);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod core;
pub mod error;
pub mod platform;
pub mod utils;

// Re-export main types
pub use crate::core::{
    resolve, resolve_with_marker, ResolvedStream, Resolver, ResolverOptions, VideoInfo,
};
pub use crate::error::{CipherStage, ExtractionError, TubemapError};
pub use crate::platform::{
    extract_json_object, lookup_format, parse_stream_map, CipherProgram, FormatDescriptor,
    StreamMap, StreamQuery,
};

/// Result type alias for tubemap operations
pub type Result<T> = std::result::Result<T, TubemapError>;
