//! Writing flushed byte ranges to the merged output.

use std::fmt;
use std::io::{self, Write};

/// Writes each flush as a single, uninterrupted write.
///
/// No bytes are held back between calls; per-source buffering is the
/// multiplexer's job.
pub struct OutputWriter<W> {
    inner: W,
    scratch: Vec<u8>,
    bytes: u64,
    flushes: u64,
}

impl<W: Write> OutputWriter<W> {
    pub fn new(inner: W) -> Self {
        OutputWriter {
            inner,
            scratch: Vec::new(),
            bytes: 0,
            flushes: 0,
        }
    }

    /// Writes `head` followed by `tail` as one write, then flushes.
    ///
    /// Nothing is written when both are empty.
    pub fn emit(&mut self, head: &[u8], tail: &[u8]) -> io::Result<()> {
        let len = head.len() + tail.len();
        if len == 0 {
            return Ok(());
        }

        if head.is_empty() || tail.is_empty() {
            let only = if head.is_empty() { tail } else { head };
            self.inner.write_all(only)?;
        } else {
            self.scratch.clear();
            self.scratch.reserve(len);
            self.scratch.extend_from_slice(head);
            self.scratch.extend_from_slice(tail);
            self.inner.write_all(&self.scratch)?;
        }
        self.inner.flush()?;

        self.bytes += len as u64;
        self.flushes += 1;

        Ok(())
    }

    /// Total bytes written so far.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Number of non-empty flushes so far.
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W> fmt::Debug for OutputWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        f.debug_struct("OutputWriter")
            .field("bytes", &self.bytes)
            .field("flushes", &self.flushes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Keeps every `write` call separate so tests can see write boundaries.
    #[derive(Default)]
    struct Writes(Vec<Vec<u8>>);

    impl Write for Writes {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.push(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_emit_joins_head_and_tail() {
        let mut out = OutputWriter::new(Writes::default());

        out.emit(b"ab", b"c\n").unwrap();
        out.emit(b"", b"d\n").unwrap();
        out.emit(b"tail", b"").unwrap();

        assert_eq!(
            out.get_ref().0,
            vec![b"abc\n".to_vec(), b"d\n".to_vec(), b"tail".to_vec()]
        );
        assert_eq!(out.bytes(), 10);
        assert_eq!(out.flushes(), 3);
    }

    #[test]
    fn test_empty_emit_is_skipped() {
        let mut out = OutputWriter::new(Writes::default());

        out.emit(b"", b"").unwrap();

        assert!(out.into_inner().0.is_empty());
    }

    #[test]
    fn test_write_error_propagates() {
        struct Broken;

        impl Write for Broken {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut out = OutputWriter::new(Broken);
        let err = out.emit(b"x", b"\n").unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(out.flushes(), 0);
    }
}
