//! Text encoding detection for log files.
//!
//! Only a prefix of the file is sniffed. The order of checks is fixed:
//! BOM, strict UTF-8, strict GBK, then a statistical guess from `chardetng`.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

/// Number of bytes read from the start of a file for detection
pub const SAMPLE_SIZE: usize = 32 * 1024;

/// Encoding chosen for a file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
    Gbk,
    /// Anything else `chardetng` settled on
    Other(&'static encoding_rs::Encoding),
}

impl TextEncoding {
    /// Identifier reported to callers and shown in the status bar
    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf8Bom => "utf-8-sig",
            TextEncoding::Utf16Le => "utf-16-le",
            TextEncoding::Utf16Be => "utf-16-be",
            TextEncoding::Gbk => "gbk",
            TextEncoding::Other(enc) => enc.name(),
        }
    }

    /// The `encoding_rs` codec used to decode the file
    pub fn codec(&self) -> &'static encoding_rs::Encoding {
        match self {
            TextEncoding::Utf8 | TextEncoding::Utf8Bom => encoding_rs::UTF_8,
            TextEncoding::Utf16Le => encoding_rs::UTF_16LE,
            TextEncoding::Utf16Be => encoding_rs::UTF_16BE,
            TextEncoding::Gbk => encoding_rs::GBK,
            TextEncoding::Other(enc) => enc,
        }
    }

    /// Whether this is one of the UTF-8 identifiers
    pub fn is_utf8_family(&self) -> bool {
        matches!(self, TextEncoding::Utf8 | TextEncoding::Utf8Bom)
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Detect the encoding of the file at `path`.
///
/// Never fails: unreadable files and inconclusive samples resolve to UTF-8.
pub fn detect_encoding(path: &Path) -> TextEncoding {
    match read_sample(path) {
        Ok(sample) => detect_from_bytes(&sample),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "encoding sniff failed, assuming utf-8");
            TextEncoding::Utf8
        }
    }
}

fn read_sample(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut sample = Vec::with_capacity(SAMPLE_SIZE);
    file.take(SAMPLE_SIZE as u64).read_to_end(&mut sample)?;
    Ok(sample)
}

/// Detect the encoding of an in-memory sample
pub fn detect_from_bytes(sample: &[u8]) -> TextEncoding {
    if sample.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return TextEncoding::Utf8Bom;
    }
    if sample.starts_with(&[0xFF, 0xFE]) {
        return TextEncoding::Utf16Le;
    }
    if sample.starts_with(&[0xFE, 0xFF]) {
        return TextEncoding::Utf16Be;
    }

    if is_strict_utf8(sample) {
        return TextEncoding::Utf8;
    }

    if encoding_rs::GBK
        .decode_without_bom_handling_and_without_replacement(sample)
        .is_some()
    {
        return TextEncoding::Gbk;
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(sample, true);
    let (guess, confident) = detector.guess_assess(None, true);
    if !confident {
        return TextEncoding::Utf8;
    }
    normalize(guess)
}

/// A sample cut at `SAMPLE_SIZE` may end inside a multi-byte sequence;
/// an incomplete tail in a full-size sample still counts as valid.
fn is_strict_utf8(sample: &[u8]) -> bool {
    match std::str::from_utf8(sample) {
        Ok(_) => true,
        Err(e) => {
            e.error_len().is_none()
                && sample.len() >= SAMPLE_SIZE
                && e.valid_up_to() + 3 >= sample.len()
        }
    }
}

fn normalize(enc: &'static encoding_rs::Encoding) -> TextEncoding {
    if enc == encoding_rs::GB18030 || enc == encoding_rs::GBK {
        TextEncoding::Gbk
    } else if enc == encoding_rs::UTF_8 {
        TextEncoding::Utf8
    } else if enc == encoding_rs::UTF_16LE {
        TextEncoding::Utf16Le
    } else if enc == encoding_rs::UTF_16BE {
        TextEncoding::Utf16Be
    } else {
        TextEncoding::Other(enc)
    }
}
