//! Image header probe.
//!
//! Reads pixel dimensions straight out of a GIF logical screen descriptor:
//!
//! ```text
//! offset  0..6   signature  "GIF87a" | "GIF89a"
//! offset  6..8   width      u16 little-endian
//! offset  8..10  height     u16 little-endian
//! ```
//!
//! Anything else is "dimensions unknown". That is a normal outcome, not an
//! error: renderers fall back to a layout that does not need the size.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

const GIF87A: &[u8; 6] = b"GIF87a";
const GIF89A: &[u8; 6] = b"GIF89a";

/// Bytes needed to read a signature plus both dimensions.
const HEADER_LEN: usize = 10;

/// Content type assumed when the upstream does not send one.
pub const DEFAULT_CONTENT_TYPE: &str = "image/gif";

/// Transparent 1x1 GIF89a.
pub const PLACEHOLDER_GIF: [u8; 43] = [
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, // GIF89a
    0x01, 0x00, 0x01, 0x00, // 1x1
    0x80, 0x00, 0x00, // global colour table, 2 entries
    0xff, 0xff, 0xff, 0x00, 0x00, 0x00, // white, black
    0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, // graphic control: index 0 transparent
    0x2c, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, // image descriptor
    0x02, 0x02, 0x44, 0x01, 0x00, // LZW data
    0x3b, // trailer
];

/// The bare `type/subtype` of a `Content-Type` header value.
///
/// Parameters after `;` are dropped. Returns `None` unless both halves are
/// non-empty and limited to ASCII letters, digits, `.`, `+` and `-`, so the
/// result is safe to place inside an HTML attribute.
pub fn media_type(header: &str) -> Option<&str> {
    let essence = header.split(';').next().unwrap_or(header).trim();
    let (kind, subtype) = essence.split_once('/')?;
    let valid = |part: &str| {
        !part.is_empty()
            && part
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'+' | b'-'))
    };
    (valid(kind) && valid(subtype)).then_some(essence)
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u16,
    pub height: u16,
}

/// Read width and height from a GIF header.
///
/// Returns `None` for unrecognized signatures and for input shorter than
/// 10 bytes.
pub fn probe(bytes: &[u8]) -> Option<Dimensions> {
    if bytes.len() < HEADER_LEN {
        return None;
    }
    let signature = &bytes[..6];
    if signature != GIF87A && signature != GIF89A {
        return None;
    }
    Some(Dimensions {
        width: u16::from_le_bytes([bytes[6], bytes[7]]),
        height: u16::from_le_bytes([bytes[8], bytes[9]]),
    })
}

/// A fetched image plus whatever the probe could learn about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDescriptor {
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub width: Option<u16>,
    pub height: Option<u16>,
}

impl ImageDescriptor {
    /// Wrap fetched bytes, probing them for dimensions.
    pub fn from_bytes(content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        let dims = probe(&bytes);
        Self {
            content_type: content_type.into(),
            width: dims.map(|d| d.width),
            height: dims.map(|d| d.height),
            bytes,
        }
    }

    /// The 1x1 blank stand-in used when no image could be fetched.
    pub fn placeholder() -> Self {
        Self::from_bytes(DEFAULT_CONTENT_TYPE, PLACEHOLDER_GIF.to_vec())
    }

    /// Both dimensions, if the probe recognized the image.
    pub fn dimensions(&self) -> Option<Dimensions> {
        match (self.width, self.height) {
            (Some(width), Some(height)) => Some(Dimensions { width, height }),
            _ => None,
        }
    }

    /// `data:` URI embedding the image bytes.
    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type,
            STANDARD.encode(&self.bytes)
        )
    }
}
