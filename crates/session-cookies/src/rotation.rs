//! Extraction of rotation directives from `Set-Cookie` header values.

use crate::codec::{decode_value, split_pair};

/// A cookie name and value issued by the server through `Set-Cookie`.
///
/// Attributes such as `Expires`, `Path`, `Domain` and flags are discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationDirective {
    pub name: String,
    pub value: String,
}

impl RotationDirective {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Parse a single `Set-Cookie` header value.
    ///
    /// Only the leading `name=value` pair is read. The value is percent-decoded
    /// so it is stored the same way [`crate::parse`] stores session values.
    pub fn from_set_cookie(header_value: &str) -> Option<Self> {
        let pair = header_value.split(';').next()?.trim();
        let (name, value) = split_pair(pair)?;
        Some(Self::new(name, decode_value(value)))
    }
}

/// Collect directives from every `Set-Cookie` header value, in order.
pub fn directives_from_set_cookie<'a, I>(header_values: I) -> Vec<RotationDirective>
where
    I: IntoIterator<Item = &'a str>,
{
    header_values
        .into_iter()
        .filter_map(RotationDirective::from_set_cookie)
        .collect()
}
