//! Core resolution: resolved streams and the resolver driving the pipeline

pub mod resolver;
pub mod video_info;

pub use resolver::*;
pub use video_info::*;
