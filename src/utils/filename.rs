//! Filename sanitising for resolved videos

/// Longest stem produced, leaving room for an extension within 255 bytes
const MAX_STEM_LEN: usize = 200;

/// Characters rejected by at least one common filesystem
fn is_forbidden(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | '#' | '%' | '~')
        || c.is_control()
}

/// Turn a video title into a filename stem safe on every common filesystem.
///
/// Forbidden characters are dropped, whitespace runs collapse to one space,
/// leading/trailing dots and spaces are trimmed, and the result is cut to a
/// char boundary under [`MAX_STEM_LEN`] bytes. An empty result becomes
/// `"video"`.
pub fn safe_filename(title: &str) -> String {
    let cleaned: String = title.chars().filter(|c| !is_forbidden(*c)).collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut stem = collapsed
        .trim_matches(|c: char| c == '.' || c == ' ')
        .to_string();

    if stem.len() > MAX_STEM_LEN {
        let mut cut = MAX_STEM_LEN;
        while !stem.is_char_boundary(cut) {
            cut -= 1;
        }
        stem.truncate(cut);
        stem = stem.trim_end().to_string();
    }

    if stem.is_empty() {
        "video".to_string()
    } else {
        stem
    }
}

/// Safe stem plus extension, e.g. `("A/B", "mp4")` -> `"AB.mp4"`
pub fn to_safe_filename(title: &str, extension: &str) -> String {
    let stem = safe_filename(title);
    let extension = extension.trim_start_matches('.');
    if extension.is_empty() {
        stem
    } else {
        format!("{}.{}", stem, extension)
    }
}
