//! Embedded player config extraction from watch pages

use crate::error::{ExtractionError, TubemapError};
use serde::Deserialize;
use tracing::debug;

/// Assignment prefix that precedes the player config object
pub const DEFAULT_CONFIG_MARKER: &str = "ytplayer.config = ";

/// Meta tag present on pages served in their age-gated variant
const AGE_RESTRICTION_MARKER: &str = "og:restrictions:age";

/// Player configuration embedded in the watch page
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerConfig {
    #[serde(default)]
    pub args: PlayerArgs,
    #[serde(default)]
    pub assets: PlayerAssets,
}

/// Per-video arguments of the player config
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerArgs {
    /// Encoded stream map, see [`crate::platform::stream_map`]
    pub url_encoded_fmt_stream_map: Option<String>,
    pub title: Option<String>,
}

/// Player resources referenced by the config
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerAssets {
    /// Player script location, usually protocol-relative
    pub js: Option<String>,
}

impl PlayerConfig {
    /// Raw stream map string
    pub fn stream_map(&self) -> Result<&str, TubemapError> {
        self.args
            .url_encoded_fmt_stream_map
            .as_deref()
            .ok_or(TubemapError::MissingField("args.url_encoded_fmt_stream_map"))
    }

    /// Player script location as written in the page
    pub fn player_js(&self) -> Result<&str, TubemapError> {
        self.assets
            .js
            .as_deref()
            .ok_or(TubemapError::MissingField("assets.js"))
    }
}

/// Find the index of the brace closing the one at `open`.
///
/// Depth starts at zero and the scan stops as soon as it returns to zero
/// after having gone positive. Returns `None` when the input ends first.
pub(crate) fn match_braces(text: &str, open: usize) -> Option<usize> {
    let mut depth: usize = 0;
    for (offset, byte) in text.as_bytes()[open..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Isolate the JSON object that follows `marker` in `text`.
///
/// Returns the exact slice from the opening brace to its matching closing
/// brace. Nothing is parsed here.
pub fn extract_json_object<'a>(text: &'a str, marker: &str) -> Result<&'a str, ExtractionError> {
    let marker_at = text
        .find(marker)
        .ok_or_else(|| ExtractionError::MarkerNotFound(marker.to_string()))?;
    let after = marker_at + marker.len();

    let open = text[after..]
        .find('{')
        .map(|pos| after + pos)
        .ok_or(ExtractionError::NoOpeningBrace)?;
    let close = match_braces(text, open).ok_or(ExtractionError::Unbalanced)?;

    debug!(
        "Extracted JSON object at {}..={} ({} bytes)",
        open,
        close,
        close + 1 - open
    );
    Ok(&text[open..=close])
}

/// Extract and decode the player config from a watch page body
pub fn parse_player_config(page_body: &str, marker: &str) -> Result<PlayerConfig, TubemapError> {
    if page_body.contains(AGE_RESTRICTION_MARKER) {
        return Err(TubemapError::AgeRestricted);
    }

    let json = extract_json_object(page_body, marker)?;
    let config: PlayerConfig = serde_json::from_str(json)?;
    Ok(config)
}
