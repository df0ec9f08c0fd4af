//! Line-based IPC primitives for worker channels.
//!
//! Messages are newline-delimited; these wrappers add buffering and EOF
//! detection over any `Read`/`Write` endpoint.

use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};

/// Default buffer size for IPC (64KB).
///
/// Also the effective message size bound: a line longer than the writer
/// buffer reaches the pipe in pieces, and a reader that picks up the head of
/// a split line would block mid-line instead of returning to its readiness
/// wait. Every line must fit in one flush.
const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Buffered line reader for one channel endpoint.
pub struct LineReader<R: Read> {
    reader: BufReader<R>,
    line_buffer: String,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, inner),
            line_buffer: String::with_capacity(4096),
        }
    }

    /// Read a line, returning a reference to the internal buffer.
    /// Returns `None` on EOF.
    pub fn read_line(&mut self) -> io::Result<Option<&str>> {
        self.line_buffer.clear();
        match self.reader.read_line(&mut self.line_buffer) {
            Ok(0) => Ok(None), // EOF
            Ok(_) => {
                if self.line_buffer.ends_with('\n') {
                    self.line_buffer.pop();
                }
                if self.line_buffer.ends_with('\r') {
                    self.line_buffer.pop();
                }
                Ok(Some(&self.line_buffer))
            }
            Err(e) => Err(e),
        }
    }

    /// Whether decoded-but-unread bytes are sitting in the userspace buffer.
    ///
    /// Readiness polling only sees the kernel pipe; a multiplexer must drain
    /// buffered channels before blocking or it can stall on data it already
    /// holds.
    pub fn has_buffered(&self) -> bool {
        !self.reader.buffer().is_empty()
    }

    /// Access the underlying endpoint (e.g. to poll its file descriptor).
    pub fn get_ref(&self) -> &R {
        self.reader.get_ref()
    }
}

/// Buffered line writer for one channel endpoint.
pub struct LineWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> LineWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, inner),
        }
    }

    /// Write a line (appends newline if not present) and flush.
    ///
    /// Every message is flushed immediately so the receiving end's readiness
    /// wait sees it without delay. Lines up to [`DEFAULT_BUFFER_SIZE`] land
    /// in a single flush; see the constant for why that bound matters.
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        if !line.ends_with('\n') {
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush()
    }
}
