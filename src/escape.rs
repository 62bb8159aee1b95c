//! XML escaping, entity decoding and CDATA segmenting.
//!
//! Everything here works on `&str` and only ever splits at ASCII bytes, so
//! slices stay on UTF-8 boundaries without any unchecked conversions.

use memchr::{memchr, memchr3, memmem};
use std::borrow::Cow;

/// The sequence that terminates a CDATA section.
pub const CDATA_END: &str = "]]>";

/// Replaces the five markup characters with their predefined entities.
///
/// The input is borrowed back unchanged when it has none of them. The
/// result is safe both as element text and inside a double-quoted
/// attribute value.
#[inline]
pub fn escape(s: &str) -> Cow<'_, str> {
    if !needs_escape(s.as_bytes()) {
        return Cow::Borrowed(s);
    }

    let mut result = String::with_capacity(s.len() + s.len() / 8);
    escape_to(s, &mut result);
    Cow::Owned(result)
}

#[inline]
fn needs_escape(bytes: &[u8]) -> bool {
    memchr3(b'<', b'>', b'&', bytes).is_some() || memchr::memchr2(b'"', b'\'', bytes).is_some()
}

/// Appends the escaped form of `s` to `out`.
pub fn escape_to(s: &str, out: &mut String) {
    let mut start = 0;

    for (i, byte) in s.bytes().enumerate() {
        let entity = match byte {
            b'<' => "&lt;",
            b'>' => "&gt;",
            b'&' => "&amp;",
            b'"' => "&quot;",
            b'\'' => "&apos;",
            _ => continue,
        };
        out.push_str(&s[start..i]);
        out.push_str(entity);
        start = i + 1;
    }

    out.push_str(&s[start..]);
}

/// Splits text into pieces that can each be written as one CDATA section.
///
/// Every occurrence of `]]>` is cut between `]]` and `>`, so concatenating
/// the segments gives back the input and no segment contains the
/// terminator. Text without the terminator yields itself once; empty text
/// yields nothing.
///
/// ```rust
/// use xml_marshal::escape::cdata_segments;
///
/// let parts: Vec<_> = cdata_segments("a]]>b").collect();
/// assert_eq!(parts, ["a]]", ">b"]);
/// ```
pub fn cdata_segments(text: &str) -> CDataSegments<'_> {
    CDataSegments { rest: text }
}

/// Iterator returned by [`cdata_segments`].
#[derive(Debug, Clone)]
pub struct CDataSegments<'a> {
    rest: &'a str,
}

impl<'a> Iterator for CDataSegments<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }
        let cut = memmem::find(self.rest.as_bytes(), CDATA_END.as_bytes()).map(|i| i + 2);
        let (segment, rest) = match cut {
            Some(at) => self.rest.split_at(at),
            None => (self.rest, ""),
        };
        self.rest = rest;
        Some(segment)
    }
}

/// Resolves predefined entities and character references.
///
/// Text without `&` is borrowed back unchanged.
#[inline]
pub fn unescape(s: &str) -> Result<Cow<'_, str>, UnescapeError> {
    if memchr(b'&', s.as_bytes()).is_none() {
        return Ok(Cow::Borrowed(s));
    }

    let mut result = String::with_capacity(s.len());
    unescape_to(s, &mut result)?;
    Ok(Cow::Owned(result))
}

/// An entity or character reference that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnescapeError {
    /// The offending reference, `&` and `;` included.
    pub entity: String,
    /// Byte offset of its `&`.
    pub position: usize,
}

impl std::fmt::Display for UnescapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unresolvable reference '{}' at byte {}", self.entity, self.position)
    }
}

impl std::error::Error for UnescapeError {}

/// Appends the resolved form of `s` to `out`.
pub fn unescape_to(s: &str, out: &mut String) -> Result<(), UnescapeError> {
    let bytes = s.as_bytes();
    let mut start = 0;

    while let Some(offset) = memchr(b'&', &bytes[start..]) {
        let amp = start + offset;
        out.push_str(&s[start..amp]);

        let body_start = amp + 1;
        let len = match memchr(b';', &bytes[body_start..]) {
            Some(len) if len > 0 => len,
            _ => {
                return Err(UnescapeError {
                    entity: String::from("&"),
                    position: amp,
                })
            }
        };
        let entity = &s[body_start..body_start + len];
        match decode_entity(entity).or_else(|| decode_numeric_entity(entity)) {
            Some(c) => out.push(c),
            None => {
                return Err(UnescapeError {
                    entity: format!("&{};", entity),
                    position: amp,
                })
            }
        }
        start = body_start + len + 1;
    }

    out.push_str(&s[start..]);
    Ok(())
}

#[inline]
fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => None,
    }
}

/// Decodes `#NNN` and `#xHHH` character references.
fn decode_numeric_entity(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    char::from_u32(code)
}
