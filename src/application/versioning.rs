//! Response schema versions negotiated through the `Accept` header.
//!
//! A client asks for a schema with a media-type parameter such as
//! `Accept: application/json; version=2.0`. Anything unparseable falls back
//! to the configured default.

use std::cmp::Ordering;
use std::fmt;

/// An opaque version token, ordered segment-wise on `.`.
///
/// Numeric segments compare numerically and sort before textual ones;
/// textual segments compare lexically. Missing trailing segments count as
/// zero, so `2` and `2.0` are equal.
#[derive(Debug, Clone)]
pub struct VersionTag(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Segment<'a> {
    Number(u64),
    Text(&'a str),
}

impl VersionTag {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn segments(&self) -> impl Iterator<Item = Segment<'_>> {
        self.0.split('.').map(|raw| match raw.parse::<u64>() {
            Ok(number) => Segment::Number(number),
            Err(_) => Segment::Text(raw),
        })
    }
}

impl Ord for VersionTag {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut left = self.segments();
        let mut right = other.segments();
        loop {
            let ordering = match (left.next(), right.next()) {
                (None, None) => return Ordering::Equal,
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(a), None) => a.cmp(&Segment::Number(0)),
                (None, Some(b)) => Segment::Number(0).cmp(&b),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
    }
}

impl PartialOrd for VersionTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for VersionTag {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionTag {}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionTag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Extract the requested schema version from an `Accept` header value.
///
/// The first `;`-separated segment mentioning `version` wins. Its value is
/// the second `=`-separated part, trimmed. Unknown tokens pass through.
pub fn resolve(accept: Option<&str>, default: &VersionTag) -> VersionTag {
    let Some(header) = accept else {
        return default.clone();
    };

    let Some(segment) = header.split(';').find(|part| part.contains("version")) else {
        return default.clone();
    };

    match segment.split('=').nth(1).map(str::trim) {
        Some(token) if !token.is_empty() => VersionTag::new(token),
        _ => default.clone(),
    }
}
