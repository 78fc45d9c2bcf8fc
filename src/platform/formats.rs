//! Format catalog, stream ordering and selection

use crate::core::video_info::ResolvedStream;
use crate::error::TubemapError;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Codec and resolution metadata for a stream format identifier (itag)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormatDescriptor {
    /// Container extension, e.g. "mp4"
    pub extension: &'static str,
    /// Resolution label, e.g. "720p" or "N/A"
    pub resolution: &'static str,
    pub video_codec: &'static str,
    /// Codec profile, e.g. "High", "3D" or "N/A"
    pub profile: &'static str,
    /// Approximate video bitrate in Mbit/s, e.g. "2-2.9"
    pub video_bitrate: &'static str,
    pub audio_codec: &'static str,
    /// Audio bitrate in kbit/s
    pub audio_bitrate: &'static str,
}

impl FormatDescriptor {
    const fn new(
        extension: &'static str,
        resolution: &'static str,
        video_codec: &'static str,
        profile: &'static str,
        video_bitrate: &'static str,
        audio_codec: &'static str,
        audio_bitrate: &'static str,
    ) -> Self {
        Self {
            extension,
            resolution,
            video_codec,
            profile,
            video_bitrate,
            audio_codec,
            audio_bitrate,
        }
    }

    /// Numeric height from the resolution label ("720p" -> 720)
    pub fn height(&self) -> Option<u32> {
        self.resolution.strip_suffix('p')?.parse().ok()
    }
}

/// Version of [`FORMAT_CATALOG`], bumped whenever rows change
pub const CATALOG_VERSION: u32 = 1;

/// Known stream formats. Extend by adding rows.
pub static FORMAT_CATALOG: &[(u32, FormatDescriptor)] = &[
    // Flash Video
    (5, FormatDescriptor::new("flv", "240p", "Sorenson H.263", "N/A", "0.25", "MP3", "64")),
    (6, FormatDescriptor::new("flv", "270p", "Sorenson H.263", "N/A", "0.8", "MP3", "64")),
    (34, FormatDescriptor::new("flv", "360p", "H.264", "Main", "0.5", "AAC", "128")),
    (35, FormatDescriptor::new("flv", "480p", "H.264", "Main", "0.8-1", "AAC", "128")),
    // 3GP
    (36, FormatDescriptor::new("3gp", "240p", "MPEG-4 Visual", "Simple", "0.17", "AAC", "38")),
    (13, FormatDescriptor::new("3gp", "N/A", "MPEG-4 Visual", "N/A", "0.5", "AAC", "N/A")),
    (17, FormatDescriptor::new("3gp", "144p", "MPEG-4 Visual", "Simple", "0.05", "AAC", "24")),
    // MPEG-4
    (18, FormatDescriptor::new("mp4", "360p", "H.264", "Baseline", "0.5", "AAC", "96")),
    (22, FormatDescriptor::new("mp4", "720p", "H.264", "High", "2-2.9", "AAC", "192")),
    (37, FormatDescriptor::new("mp4", "1080p", "H.264", "High", "3-4.3", "AAC", "192")),
    (38, FormatDescriptor::new("mp4", "3072p", "H.264", "High", "3.5-5", "AAC", "192")),
    (82, FormatDescriptor::new("mp4", "360p", "H.264", "3D", "0.5", "AAC", "96")),
    (83, FormatDescriptor::new("mp4", "240p", "H.264", "3D", "0.5", "AAC", "96")),
    (84, FormatDescriptor::new("mp4", "720p", "H.264", "3D", "2-2.9", "AAC", "152")),
    (85, FormatDescriptor::new("mp4", "1080p", "H.264", "3D", "2-2.9", "AAC", "152")),
    // WebM
    (43, FormatDescriptor::new("webm", "360p", "VP8", "N/A", "0.5", "Vorbis", "128")),
    (44, FormatDescriptor::new("webm", "480p", "VP8", "N/A", "1", "Vorbis", "128")),
    (45, FormatDescriptor::new("webm", "720p", "VP8", "N/A", "2", "Vorbis", "192")),
    (46, FormatDescriptor::new("webm", "1080p", "VP8", "N/A", "N/A", "Vorbis", "192")),
    (100, FormatDescriptor::new("webm", "360p", "VP8", "3D", "N/A", "Vorbis", "128")),
    (101, FormatDescriptor::new("webm", "360p", "VP8", "3D", "N/A", "Vorbis", "192")),
    (102, FormatDescriptor::new("webm", "720p", "VP8", "3D", "N/A", "Vorbis", "192")),
];

static CATALOG_INDEX: LazyLock<HashMap<u32, &'static FormatDescriptor>> =
    LazyLock::new(|| FORMAT_CATALOG.iter().map(|(itag, d)| (*itag, d)).collect());

/// Look up the descriptor for an identifier; `None` means unavailable
pub fn lookup_format(itag: u32) -> Option<&'static FormatDescriptor> {
    CATALOG_INDEX.get(&itag).copied()
}

/// Sort rank of a container extension, lower is preferred
pub fn extension_priority(extension: &str) -> u8 {
    match extension {
        "mp4" => 0,
        "webm" => 1,
        "flv" => 2,
        "3gp" => 3,
        _ => 4,
    }
}

/// Best-first order: height descending (unknown last), then extension
/// priority, then identifier.
pub fn compare_streams(a: &ResolvedStream, b: &ResolvedStream) -> Ordering {
    let height = match (a.height(), b.height()) {
        (Some(a_h), Some(b_h)) => b_h.cmp(&a_h),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    height
        .then_with(|| extension_priority(a.extension()).cmp(&extension_priority(b.extension())))
        .then_with(|| a.itag.cmp(&b.itag))
}

/// Sort streams best first
pub fn sort_streams(streams: &mut [ResolvedStream]) {
    streams.sort_by(compare_streams);
}

/// Exact-match criteria for [`filter_streams`] and [`get_stream`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamQuery {
    pub extension: Option<String>,
    pub resolution: Option<String>,
    pub profile: Option<String>,
}

impl StreamQuery {
    /// Query matching every stream
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = Some(resolution.into());
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Check if no criterion is set
    pub fn is_empty(&self) -> bool {
        self == &StreamQuery::default()
    }

    /// Check whether a stream satisfies every given criterion
    pub fn matches(&self, stream: &ResolvedStream) -> bool {
        fn accepts(wanted: &Option<String>, actual: &str) -> bool {
            wanted.as_deref().map_or(true, |w| w == actual)
        }

        accepts(&self.extension, stream.extension())
            && accepts(&self.resolution, stream.resolution())
            && accepts(&self.profile, stream.profile())
    }
}

/// Streams matching the query, in their current order
pub fn filter_streams<'a>(streams: &'a [ResolvedStream], query: &StreamQuery) -> Vec<&'a ResolvedStream> {
    streams.iter().filter(|s| query.matches(s)).collect()
}

/// The single stream matching the query.
///
/// Returns `Ok(None)` when nothing matches and `MultipleMatches` when the
/// query is ambiguous.
pub fn get_stream<'a>(
    streams: &'a [ResolvedStream],
    query: &StreamQuery,
) -> Result<Option<&'a ResolvedStream>, TubemapError> {
    let mut matches = filter_streams(streams, query);
    match matches.len() {
        0 => Ok(None),
        1 => Ok(matches.pop()),
        n => Err(TubemapError::MultipleMatches(n)),
    }
}
