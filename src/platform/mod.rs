//! Watch page parsing, format catalog, signature cipher and HTTP fetching

pub mod cipher;
pub mod client;
pub mod extractor;
pub mod formats;
pub mod stream_map;

pub use cipher::*;
pub use client::*;
pub use extractor::*;
pub use formats::*;
pub use stream_map::*;
