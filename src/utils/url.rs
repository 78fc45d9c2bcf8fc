//! URL utilities for watch pages, player scripts and stream URLs

use crate::error::TubemapError;
use url::Url;

/// Extract the video ID from the `v` query parameter of a watch URL
pub fn extract_video_id(url: &str) -> Result<String, TubemapError> {
    let parsed = Url::parse(url)?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, value)| value.into_owned())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| TubemapError::InvalidUrl(format!("missing v parameter in {}", url)))
}

/// Make the player script location from the page config absolute.
///
/// Protocol-relative locations get `https:`, root-relative ones are joined
/// onto the watch page URL.
pub fn normalize_player_url(player_js: &str, page_url: &str) -> Result<String, TubemapError> {
    if player_js.starts_with("//") {
        return Ok(format!("https:{}", player_js));
    }
    if let Ok(absolute) = Url::parse(player_js) {
        return Ok(absolute.into());
    }

    let base = Url::parse(page_url)?;
    Ok(base.join(player_js)?.into())
}

/// Check whether a stream URL already carries a `signature` query parameter
pub fn has_signature(stream_url: &str) -> bool {
    match Url::parse(stream_url) {
        Ok(parsed) => parsed.query_pairs().any(|(key, _)| key == "signature"),
        Err(_) => stream_url.contains("signature="),
    }
}

/// Append `signature=<value>` to a stream URL, leaving the rest untouched
pub fn append_signature(stream_url: &str, signature: &str) -> String {
    let separator = if stream_url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}signature={}",
        stream_url,
        separator,
        urlencoding::encode(signature)
    )
}

/// Identifier embedded as `itag=<digits>` in a stream URL, if exactly one
pub fn itag_from_url(stream_url: &str) -> Option<u32> {
    let mut found = stream_url
        .match_indices("itag=")
        .filter(|(pos, _)| {
            *pos == 0 || matches!(stream_url.as_bytes()[pos - 1], b'?' | b'&')
        })
        .map(|(pos, m)| {
            stream_url[pos + m.len()..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
        })
        .filter(|digits| !digits.is_empty());

    let first = found.next()?;
    if found.next().is_some() {
        return None;
    }
    first.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert!(extract_video_id("https://www.youtube.com/watch").is_err());
        assert!(extract_video_id("https://www.youtube.com/watch?v=").is_err());
        assert!(extract_video_id("not a url").is_err());
    }

    #[test]
    fn test_normalize_player_url() {
        let page = "https://www.youtube.com/watch?v=abc";
        assert_eq!(
            normalize_player_url("//s.ytimg.com/yts/jsbin/player.js", page).unwrap(),
            "https://s.ytimg.com/yts/jsbin/player.js"
        );
        assert_eq!(
            normalize_player_url("/s/player/base.js", page).unwrap(),
            "https://www.youtube.com/s/player/base.js"
        );
        assert_eq!(
            normalize_player_url("http://cdn.example.com/p.js", page).unwrap(),
            "http://cdn.example.com/p.js"
        );
    }

    #[test]
    fn test_has_signature() {
        assert!(has_signature("https://h/videoplayback?id=1&signature=AB.CD"));
        assert!(!has_signature("https://h/videoplayback?id=1&sig=AB"));
        assert!(!has_signature("https://h/videoplayback?id=1"));
        assert!(has_signature("relative?signature=x"));
    }

    #[test]
    fn test_append_signature() {
        assert_eq!(
            append_signature("https://h/v?id=1", "AB.CD"),
            "https://h/v?id=1&signature=AB.CD"
        );
        assert_eq!(append_signature("https://h/v", "x"), "https://h/v?signature=x");
    }

    #[test]
    fn test_itag_from_url() {
        assert_eq!(itag_from_url("https://h/v?id=1&itag=22&x=2"), Some(22));
        assert_eq!(itag_from_url("https://h/v?itag=43"), Some(43));
        assert_eq!(itag_from_url("https://h/v?id=1"), None);
        assert_eq!(itag_from_url("https://h/v?itag=18&itag=22"), None);
        assert_eq!(itag_from_url("https://h/v?fitag=18"), None);
    }
}
