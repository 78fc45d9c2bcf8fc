//! Decoder for the `url_encoded_fmt_stream_map` encoding.
//!
//! The map is a comma-separated list of records, each record a `&`-separated
//! list of `key=value` pairs with percent-encoded values:
//!
//! ```text
//! itag=22&url=https%3A%2F%2Fhost%2Fv%3Fa%3D1&quality=hd720,itag=18&s=ABC...
//! ```
//!
//! Standard form decoders mangle it (values hold further `=` and `+` must
//! stay literal), so it is decoded by hand into one column per known key.

use crate::error::TubemapError;
use tracing::debug;

/// One stream as described by position `i` of every column
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawStreamEntry {
    pub itag: Option<String>,
    pub url: Option<String>,
    pub quality: Option<String>,
    pub fallback_host: Option<String>,
    /// Scrambled signature, present when `url` is unsigned
    pub s: Option<String>,
    /// MIME type string, e.g. `video/mp4; codecs="avc1.64001F, mp4a.40.2"`
    pub mime_type: Option<String>,
}

/// Decoded stream map, one column per known key.
///
/// Every column holds exactly one slot per record, `None` where the record
/// did not carry the key, so position `i` across all columns is stream `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamMap {
    itag: Vec<Option<String>>,
    url: Vec<Option<String>>,
    quality: Vec<Option<String>>,
    fallback_host: Vec<Option<String>>,
    s: Vec<Option<String>>,
    mime_type: Vec<Option<String>>,
    records: usize,
}

impl StreamMap {
    /// Number of decoded records
    pub fn len(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Values of one key in record order, by its wire name (`type` for the MIME type)
    pub fn column(&self, key: &str) -> Option<&[Option<String>]> {
        let column = match key {
            "itag" => &self.itag,
            "url" => &self.url,
            "quality" => &self.quality,
            "fallback_host" => &self.fallback_host,
            "s" => &self.s,
            "type" => &self.mime_type,
            _ => return None,
        };
        Some(column)
    }

    /// Entry at position `index`
    pub fn entry(&self, index: usize) -> Option<RawStreamEntry> {
        if index >= self.records {
            return None;
        }
        Some(RawStreamEntry {
            itag: self.itag.get(index)?.clone(),
            url: self.url.get(index)?.clone(),
            quality: self.quality.get(index)?.clone(),
            fallback_host: self.fallback_host.get(index)?.clone(),
            s: self.s.get(index)?.clone(),
            mime_type: self.mime_type.get(index)?.clone(),
        })
    }

    /// All entries in record order
    pub fn entries(&self) -> Vec<RawStreamEntry> {
        (0..self.records).filter_map(|i| self.entry(i)).collect()
    }

    fn push(&mut self, entry: RawStreamEntry) {
        self.itag.push(entry.itag);
        self.url.push(entry.url);
        self.quality.push(entry.quality);
        self.fallback_host.push(entry.fallback_host);
        self.s.push(entry.s);
        self.mime_type.push(entry.mime_type);
        self.records += 1;
    }

    fn validate(&self) -> Result<(), TubemapError> {
        let columns = [
            ("itag", self.itag.len()),
            ("url", self.url.len()),
            ("quality", self.quality.len()),
            ("fallback_host", self.fallback_host.len()),
            ("s", self.s.len()),
            ("type", self.mime_type.len()),
        ];
        for (key, len) in columns {
            if len != self.records {
                return Err(TubemapError::Decode(format!(
                    "column {} has {} values for {} records",
                    key, len, self.records
                )));
            }
        }
        Ok(())
    }
}

fn slot<'a>(entry: &'a mut RawStreamEntry, key: &str) -> Option<&'a mut Option<String>> {
    match key {
        "itag" => Some(&mut entry.itag),
        "url" => Some(&mut entry.url),
        "quality" => Some(&mut entry.quality),
        "fallback_host" => Some(&mut entry.fallback_host),
        "s" => Some(&mut entry.s),
        "type" => Some(&mut entry.mime_type),
        _ => None,
    }
}

fn decode_record(index: usize, record: &str) -> Result<RawStreamEntry, TubemapError> {
    if record.trim().is_empty() {
        return Err(TubemapError::Decode(format!("record {} is empty", index)));
    }

    let mut entry = RawStreamEntry::default();
    for pair in record.split('&') {
        let (key, raw_value) = pair.split_once('=').ok_or_else(|| {
            TubemapError::Decode(format!("record {}: pair {:?} has no '='", index, pair))
        })?;

        let Some(slot) = slot(&mut entry, key) else {
            continue;
        };
        if slot.is_some() {
            // first occurrence wins
            continue;
        }

        let value = urlencoding::decode(raw_value).map_err(|e| {
            TubemapError::Decode(format!("record {}: value of {:?}: {}", index, key, e))
        })?;
        *slot = Some(value.into_owned());
    }
    Ok(entry)
}

/// Decode a stream map string into aligned columns
pub fn parse_stream_map(text: &str) -> Result<StreamMap, TubemapError> {
    let mut map = StreamMap::default();
    if text.trim().is_empty() {
        return Ok(map);
    }

    for (index, record) in text.split(',').enumerate() {
        map.push(decode_record(index, record)?);
    }
    map.validate()?;

    debug!("Decoded stream map with {} records", map.len());
    Ok(map)
}

/// Encode entries back into the stream map format.
///
/// An entry with no field set has no representation (its record would be
/// empty) and is left out.
pub fn encode_stream_map(entries: &[RawStreamEntry]) -> String {
    entries
        .iter()
        .filter(|entry| *entry != &RawStreamEntry::default())
        .map(|entry| {
            let fields = [
                ("itag", &entry.itag),
                ("url", &entry.url),
                ("quality", &entry.quality),
                ("fallback_host", &entry.fallback_host),
                ("s", &entry.s),
                ("type", &entry.mime_type),
            ];
            fields
                .iter()
                .filter_map(|(key, value)| {
                    value
                        .as_ref()
                        .map(|v| format!("{}={}", key, urlencoding::encode(v)))
                })
                .collect::<Vec<_>>()
                .join("&")
        })
        .collect::<Vec<_>>()
        .join(",")
}
