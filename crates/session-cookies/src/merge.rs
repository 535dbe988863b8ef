//! Folding server-issued cookie rotations into a stored session.

use crate::{RotationDirective, codec};

/// Apply rotation directives to a stored session.
///
/// With no directives the input is returned untouched, including `None`, so
/// that a session is never re-encoded unless the server actually changed it.
/// Otherwise every directive is upserted in order (the last one for a name
/// wins), names unknown to the session are appended, and the result is
/// serialized.
pub fn merge(current: Option<&str>, directives: &[RotationDirective]) -> Option<String> {
    if directives.is_empty() {
        return current.map(str::to_string);
    }

    let mut cookies = current.map(codec::parse).unwrap_or_default();
    for directive in directives {
        cookies.insert(directive.name.as_str(), directive.value.as_str());
    }

    Some(codec::serialize(&cookies))
}
