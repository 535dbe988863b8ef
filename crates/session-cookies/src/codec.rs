//! `Cookie` header parsing and serialization.

use std::borrow::Cow;

use tracing::trace;

use crate::CookieMap;

/// Parse a raw `Cookie` header into a [`CookieMap`].
///
/// Segments are split on `;` and then on the first `=`. Segments missing a
/// name or a value are skipped. Values are percent-decoded; a value that does
/// not decode to UTF-8 is kept as written.
pub fn parse(raw: &str) -> CookieMap {
    let mut map = CookieMap::new();

    for segment in raw.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        let Some((name, value)) = split_pair(segment) else {
            trace!(segment_len = segment.len(), "Skipping malformed cookie segment");
            continue;
        };

        map.insert(name, decode_value(value));
    }

    map
}

/// Render a [`CookieMap`] as `name=value; name=value`, percent-encoding values.
pub fn serialize(map: &CookieMap) -> String {
    map.iter()
        .map(|(name, value)| format!("{}={}", name, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Split `name=value` on the first `=`, trimming both halves.
pub(crate) fn split_pair(segment: &str) -> Option<(&str, &str)> {
    let (name, value) = segment.split_once('=')?;
    let name = name.trim();
    let value = value.trim();
    if name.is_empty() || value.is_empty() {
        return None;
    }
    Some((name, value))
}

pub(crate) fn decode_value(value: &str) -> String {
    match urlencoding::decode(value) {
        Ok(Cow::Borrowed(decoded)) => decoded.to_string(),
        Ok(Cow::Owned(decoded)) => decoded,
        Err(_) => value.to_string(),
    }
}
