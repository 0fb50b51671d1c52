//! Magic byte sniffing
//!
//! Identifies common formats from a bounded prefix of the file. Unknown binary
//! content yields `None` so the caller can fall back to the extension.

use super::ContentSniffer;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Bytes read from the start of a file for identification
pub const SNIFF_LEN: usize = 4096;

/// MIME type reported for zero-length files
pub const EMPTY_MIME: &str = "inode/x-empty";

/// One byte sequence expected at a fixed offset
#[derive(Debug, Clone, Copy)]
struct Marker {
    offset: usize,
    bytes: &'static [u8],
}

impl Marker {
    const fn at(offset: usize, bytes: &'static [u8]) -> Self {
        Self { offset, bytes }
    }

    fn matches(&self, buf: &[u8]) -> bool {
        buf.get(self.offset..self.offset + self.bytes.len()) == Some(self.bytes)
    }
}

/// All markers must match for the signature to apply
#[derive(Debug, Clone, Copy)]
struct Signature {
    mime: &'static str,
    markers: &'static [Marker],
}

impl Signature {
    fn matches(&self, buf: &[u8]) -> bool {
        self.markers.iter().all(|m| m.matches(buf))
    }
}

// More specific signatures come first (e.g. WebP before generic RIFF users).
const SIGNATURES: &[Signature] = &[
    Signature { mime: "image/png", markers: &[Marker::at(0, b"\x89PNG\r\n\x1a\n")] },
    Signature { mime: "image/jpeg", markers: &[Marker::at(0, b"\xFF\xD8\xFF")] },
    Signature { mime: "image/gif", markers: &[Marker::at(0, b"GIF87a")] },
    Signature { mime: "image/gif", markers: &[Marker::at(0, b"GIF89a")] },
    Signature { mime: "image/webp", markers: &[Marker::at(0, b"RIFF"), Marker::at(8, b"WEBP")] },
    Signature { mime: "image/tiff", markers: &[Marker::at(0, b"II*\x00")] },
    Signature { mime: "image/tiff", markers: &[Marker::at(0, b"MM\x00*")] },
    Signature { mime: "image/heic", markers: &[Marker::at(4, b"ftypheic")] },
    Signature { mime: "image/heic", markers: &[Marker::at(4, b"ftypheix")] },
    Signature { mime: "image/heif", markers: &[Marker::at(4, b"ftypmif1")] },
    Signature { mime: "image/avif", markers: &[Marker::at(4, b"ftypavif")] },
    Signature { mime: "image/x-icon", markers: &[Marker::at(0, b"\x00\x00\x01\x00")] },
    Signature { mime: "image/bmp", markers: &[Marker::at(0, b"BM")] },
    Signature { mime: "application/pdf", markers: &[Marker::at(0, b"%PDF-")] },
    Signature { mime: "application/zip", markers: &[Marker::at(0, b"PK\x03\x04")] },
    Signature { mime: "application/gzip", markers: &[Marker::at(0, b"\x1F\x8B")] },
    Signature { mime: "application/x-7z-compressed", markers: &[Marker::at(0, b"7z\xBC\xAF\x27\x1C")] },
    Signature { mime: "audio/x-wav", markers: &[Marker::at(0, b"RIFF"), Marker::at(8, b"WAVE")] },
    Signature { mime: "audio/mpeg", markers: &[Marker::at(0, b"ID3")] },
    Signature { mime: "audio/flac", markers: &[Marker::at(0, b"fLaC")] },
    Signature { mime: "video/quicktime", markers: &[Marker::at(4, b"ftypqt")] },
    Signature { mime: "video/mp4", markers: &[Marker::at(4, b"ftyp")] },
];

/// Built-in content sniffer backed by a table of magic byte signatures
#[derive(Debug, Clone, Copy, Default)]
pub struct MagicSniffer;

impl MagicSniffer {
    pub fn new() -> Self {
        Self
    }

    /// Identify a buffer holding the first bytes of a file
    pub fn identify(buf: &[u8]) -> Option<&'static str> {
        if buf.is_empty() {
            return Some(EMPTY_MIME);
        }

        if let Some(signature) = SIGNATURES.iter().find(|s| s.matches(buf)) {
            return Some(signature.mime);
        }

        if looks_like_text(buf) {
            return Some("text/plain");
        }

        None
    }
}

impl ContentSniffer for MagicSniffer {
    fn sniff(&self, path: &Path) -> io::Result<Option<String>> {
        let file = File::open(path)?;
        let mut buf = Vec::with_capacity(SNIFF_LEN);
        file.take(SNIFF_LEN as u64).read_to_end(&mut buf)?;
        Ok(Self::identify(&buf).map(str::to_string))
    }
}

/// NUL-free UTF-8 (allowing a multi-byte char cut at the prefix boundary)
fn looks_like_text(buf: &[u8]) -> bool {
    if buf.contains(&0) {
        return false;
    }
    match std::str::from_utf8(buf) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none() && buf.len() - e.valid_up_to() < 4,
    }
}
