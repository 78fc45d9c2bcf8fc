//! Terminal output for resolved videos

use crate::cli::args::VerbosityLevel;
use crate::core::video_info::{ResolvedStream, VideoInfo};
use crate::platform::formats::CATALOG_VERSION;
use colored::Colorize;

/// Output formatter for tubemap
pub struct OutputFormatter {
    verbosity: VerbosityLevel,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self { verbosity }
    }

    /// Print info message
    pub fn info(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            println!("{} {}", "info:".cyan().bold(), message);
        }
    }

    /// Print warning message
    pub fn warning(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            eprintln!("{} {}", "warning:".yellow().bold(), message);
        }
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "error:".red().bold(), message);
    }

    /// Print the video header and its streams, best first
    pub fn print_video(&self, info: &VideoInfo, streams: &[&ResolvedStream]) {
        if self.verbosity == VerbosityLevel::Quiet {
            return;
        }

        let title = info.title.as_deref().unwrap_or("(untitled)");
        println!("{}", title.bold());
        if let Some(id) = &info.id {
            println!("  id: {}", id);
        }
        if self.verbosity == VerbosityLevel::Verbose {
            if let Some(player_url) = &info.player_url {
                println!("  player: {}", player_url);
            }
            println!("  format catalog: v{}", CATALOG_VERSION);
        }
        println!("  {} of {} streams", streams.len(), info.streams.len());
        println!();

        for stream in streams {
            println!("  {}", stream_line(stream));
            if self.verbosity == VerbosityLevel::Verbose {
                println!("      {}", stream.url.dimmed());
            }
        }
    }
}

/// Listing line for one stream, e.g. `22  mp4   720p  H.264 High / AAC 192k  [hd720]`
fn stream_line(stream: &ResolvedStream) -> String {
    let descriptor = &stream.descriptor;
    let quality = stream
        .quality
        .as_deref()
        .map(|q| format!("  [{}]", q))
        .unwrap_or_default();
    format!(
        "{:>3}  {:<4}  {:>5}  {} {} / {} {}k{}",
        stream.itag,
        stream.extension(),
        stream.resolution(),
        descriptor.video_codec,
        stream.profile(),
        descriptor.audio_codec,
        descriptor.audio_bitrate,
        quality
    )
}
