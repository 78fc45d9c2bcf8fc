//! Resolved stream and video structures

use crate::error::TubemapError;
use crate::platform::formats::{filter_streams, get_stream, FormatDescriptor, StreamQuery};
use crate::utils::filename::to_safe_filename;
use serde::Serialize;

/// A stream with its format metadata and a final, signed URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedStream {
    /// Format identifier (itag)
    pub itag: u32,
    /// Direct download URL, signature included
    pub url: String,
    /// Quality label from the stream map, e.g. "hd720"
    pub quality: Option<String>,
    /// Alternate host serving the same stream
    pub fallback_host: Option<String>,
    /// MIME type string from the stream map
    pub mime_type: Option<String>,
    /// Catalog metadata for `itag`
    pub descriptor: FormatDescriptor,
}

impl ResolvedStream {
    pub fn extension(&self) -> &'static str {
        self.descriptor.extension
    }

    pub fn resolution(&self) -> &'static str {
        self.descriptor.resolution
    }

    pub fn profile(&self) -> &'static str {
        self.descriptor.profile
    }

    /// Numeric height, `None` for formats without a known resolution
    pub fn height(&self) -> Option<u32> {
        self.descriptor.height()
    }

    /// One-line summary, e.g. `22: mp4 720p (H.264 High / AAC 192k)`
    pub fn summary(&self) -> String {
        format!(
            "{}: {} {} ({} {} / {} {}k)",
            self.itag,
            self.extension(),
            self.resolution(),
            self.descriptor.video_codec,
            self.profile(),
            self.descriptor.audio_codec,
            self.descriptor.audio_bitrate
        )
    }
}

/// A resolved watch page
#[derive(Debug, Clone, Serialize)]
pub struct VideoInfo {
    /// Video ID from the watch URL, when resolved from one
    pub id: Option<String>,
    /// Title from the player config
    pub title: Option<String>,
    /// Absolute player script URL
    pub player_url: Option<String>,
    /// Streams, best first
    pub streams: Vec<ResolvedStream>,
    filename: Option<String>,
}

impl VideoInfo {
    /// Create a new VideoInfo over already sorted streams
    pub fn new(streams: Vec<ResolvedStream>) -> Self {
        Self {
            id: None,
            title: None,
            player_url: None,
            streams,
            filename: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_player_url(mut self, player_url: impl Into<String>) -> Self {
        self.player_url = Some(player_url.into());
        self
    }

    /// Override the filename stem derived from the title
    pub fn set_filename(&mut self, filename: impl Into<String>) {
        self.filename = Some(filename.into());
    }

    /// Safe filename for a download of this video with `extension`
    pub fn filename(&self, extension: &str) -> String {
        let stem = self
            .filename
            .as_deref()
            .or(self.title.as_deref())
            .or(self.id.as_deref())
            .unwrap_or_default();
        to_safe_filename(stem, extension)
    }

    /// Best available stream
    pub fn best(&self) -> Option<&ResolvedStream> {
        self.streams.first()
    }

    /// Identifiers of the resolved streams, best first
    pub fn itags(&self) -> Vec<u32> {
        self.streams.iter().map(|s| s.itag).collect()
    }

    /// Single stream matching `query`, see [`get_stream`]
    pub fn get(&self, query: &StreamQuery) -> Result<Option<&ResolvedStream>, TubemapError> {
        get_stream(&self.streams, query)
    }

    /// Streams selected by `query`: all of them for an empty query, else the
    /// single [`get`](Self::get) match (none when nothing matches)
    pub fn select(&self, query: &StreamQuery) -> Result<Vec<&ResolvedStream>, TubemapError> {
        if query.is_empty() {
            return Ok(self.streams.iter().collect());
        }
        Ok(self.get(query)?.into_iter().collect())
    }

    /// Streams matching `query`, see [`filter_streams`]
    pub fn filter(&self, query: &StreamQuery) -> Vec<&ResolvedStream> {
        filter_streams(&self.streams, query)
    }
}
