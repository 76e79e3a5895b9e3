//! Chunked loading of log files into an in-memory line array.
//!
//! Files are read in fixed-size byte chunks and decoded with a streaming
//! `encoding_rs` decoder, so multi-byte sequences and `\r\n` pairs that
//! straddle a chunk boundary come out exactly as they would from a single read.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use encoding_rs::{CoderResult, Decoder};
use tracing::{debug, info, trace};

use crate::config::DEFAULT_CHUNK_SIZE;
use crate::encoding::{TextEncoding, detect_encoding};
use crate::error::{LoadError, Result};

/// All lines of one opened file or one derived view.
///
/// Index `i` always names the same line. A derived store (a grep view)
/// remembers which line of its source each of its lines came from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineStore {
    lines: Vec<String>,
    origin: Option<Vec<usize>>,
}

impl LineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines, origin: None }
    }

    /// A store whose line `i` is line `origin[i]` of another store
    pub fn derived(lines: Vec<String>, origin: Vec<usize>) -> Self {
        debug_assert_eq!(lines.len(), origin.len());
        Self {
            lines,
            origin: Some(origin),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    /// Lines in `[start, end)`, clamped to the store
    pub fn range(&self, start: usize, end: usize) -> &[String] {
        let end = end.min(self.lines.len());
        let start = start.min(end);
        &self.lines[start..end]
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Index of line `index` in the store this one was derived from
    pub fn source_index(&self, index: usize) -> Option<usize> {
        match &self.origin {
            Some(origin) => origin.get(index).copied(),
            None if index < self.lines.len() => Some(index),
            None => None,
        }
    }

    pub fn is_derived(&self) -> bool {
        self.origin.is_some()
    }

    fn extend(&mut self, lines: impl IntoIterator<Item = String>) {
        self.lines.extend(lines);
    }
}

/// Outcome of a successful load
#[derive(Debug)]
pub struct LoadResult {
    pub path: PathBuf,
    pub lines: LineStore,
    pub encoding: TextEncoding,
    pub line_count: usize,
    pub file_size: u64,
}

/// Streams a file in fixed-size chunks and splits it into lines
#[derive(Clone, Debug)]
pub struct ChunkedLoader {
    chunk_size: usize,
    cancel: Arc<AtomicBool>,
}

impl Default for ChunkedLoader {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl ChunkedLoader {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops an in-flight load at the next chunk boundary
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Load `path`, reporting `(bytes_read, total_bytes)` after every chunk
    pub fn load(
        &self,
        path: &Path,
        mut on_progress: impl FnMut(u64, u64),
    ) -> Result<LoadResult> {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(LoadError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let file_size = metadata.len();
        let encoding = detect_encoding(path);
        info!(path = %path.display(), %encoding, file_size, "loading file");

        let mut file = File::open(path)?;
        let mut decoder = encoding.codec().new_decoder_with_bom_removal();
        let mut splitter = LineSplitter::default();
        let mut lines = LineStore::new();
        let mut buf = Vec::with_capacity(self.chunk_size.min(DEFAULT_CHUNK_SIZE));
        let mut text = String::new();
        let mut bytes_read: u64 = 0;

        loop {
            if self.cancel.load(Ordering::Relaxed) {
                debug!(path = %path.display(), bytes_read, "load cancelled");
                return Err(LoadError::Cancelled);
            }

            buf.clear();
            let n = (&mut file)
                .take(self.chunk_size as u64)
                .read_to_end(&mut buf)?;
            if n == 0 {
                break;
            }
            bytes_read += n as u64;

            text.clear();
            decode_into(&mut decoder, &buf, false, &mut text);
            let mut chunk_lines = Vec::new();
            splitter.feed(&text, &mut chunk_lines);
            lines.extend(chunk_lines);

            trace!(bytes_read, file_size, lines = lines.len(), "chunk loaded");
            on_progress(bytes_read, file_size);
        }

        text.clear();
        decode_into(&mut decoder, &[], true, &mut text);
        let mut tail = Vec::new();
        splitter.feed(&text, &mut tail);
        splitter.finish(&mut tail);
        lines.extend(tail);

        let line_count = lines.len();
        info!(path = %path.display(), line_count, "file loaded");
        Ok(LoadResult {
            path: path.to_path_buf(),
            lines,
            encoding,
            line_count,
            file_size,
        })
    }
}

/// Decode `bytes` onto the end of `out`, replacing malformed sequences with U+FFFD
fn decode_into(decoder: &mut Decoder, mut bytes: &[u8], last: bool, out: &mut String) {
    loop {
        let needed = decoder
            .max_utf8_buffer_length(bytes.len())
            .unwrap_or(bytes.len() * 3 + 16);
        out.reserve(needed);
        let (result, read, _replaced) = decoder.decode_to_string(bytes, out, last);
        bytes = &bytes[read..];
        match result {
            CoderResult::InputEmpty => break,
            CoderResult::OutputFull => continue,
        }
    }
}

/// Universal-newline splitter that carries partial lines across chunks
#[derive(Default)]
struct LineSplitter {
    partial: String,
    /// Previous chunk ended in `\r`; a leading `\n` belongs to it
    skip_lf: bool,
}

impl LineSplitter {
    fn feed(&mut self, text: &str, out: &mut Vec<String>) {
        let mut rest = text;
        if self.skip_lf && !rest.is_empty() {
            rest = rest.strip_prefix('\n').unwrap_or(rest);
            self.skip_lf = false;
        }

        while let Some(pos) = rest.find(|c: char| c == '\n' || c == '\r') {
            self.partial.push_str(&rest[..pos]);
            out.push(std::mem::take(&mut self.partial));
            let was_cr = rest.as_bytes()[pos] == b'\r';
            rest = &rest[pos + 1..];
            if was_cr {
                if rest.is_empty() {
                    self.skip_lf = true;
                } else {
                    rest = rest.strip_prefix('\n').unwrap_or(rest);
                }
            }
        }
        self.partial.push_str(rest);
    }

    fn finish(self, out: &mut Vec<String>) {
        if !self.partial.is_empty() {
            out.push(self.partial);
        }
    }
}
