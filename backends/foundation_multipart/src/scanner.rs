use std::io::{BufRead, Read};

use crate::{ByteSource, Delimiter, MultipartResult};

/// Match state for one part body.
///
/// `matched` counts delimiter bytes seen so far. After a false positive,
/// `replayed` walks back over those bytes so they are handed out as ordinary
/// body content; while it is non-zero the source is not touched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct BoundaryScanner {
    matched: usize,
    replayed: usize,
    finished: bool,
}

impl BoundaryScanner {
    pub(crate) fn next_byte<R: BufRead>(
        &mut self,
        source: &mut ByteSource<R>,
        delimiter: &Delimiter,
    ) -> MultipartResult<Option<u8>> {
        if self.finished {
            return Ok(None);
        }

        let delimiter = delimiter.as_bytes();

        if self.replayed > 0 {
            let byte = delimiter[self.replayed];
            self.replayed += 1;
            if self.replayed == self.matched {
                self.replayed = 0;
                self.matched = 0;
            }
            return Ok(Some(byte));
        }

        loop {
            let byte = source.expect_byte()?;

            if byte == delimiter[self.matched] {
                self.matched += 1;
                if self.matched == delimiter.len() {
                    tracing::debug!("part body ended at delimiter");
                    self.finished = true;
                    return Ok(None);
                }
                continue;
            }

            if self.matched == 0 {
                return Ok(Some(byte));
            }

            // false positive: the mismatching byte may itself start a
            // delimiter, so it goes back to the source untouched.
            tracing::trace!(matched = self.matched, "partial delimiter match discarded");
            source.unread(byte);
            if self.matched == 1 {
                self.matched = 0;
            } else {
                self.replayed = 1;
            }
            return Ok(Some(delimiter[0]));
        }
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.matched == 0 && !self.finished
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }
}

/// The body of a single part.
///
/// Yields the part's bytes and reports end-of-stream exactly where the next
/// delimiter starts. The delimiter itself is consumed, nothing after it is.
/// Single pass: once finished it keeps returning end-of-stream.
pub struct PartBody<'a, R> {
    source: &'a mut ByteSource<R>,
    delimiter: &'a Delimiter,
    scanner: BoundaryScanner,
    pending: Option<&'a mut bool>,
}

impl<'a, R: BufRead> PartBody<'a, R> {
    pub fn new(source: &'a mut ByteSource<R>, delimiter: &'a Delimiter) -> Self {
        Self {
            source,
            delimiter,
            scanner: BoundaryScanner::default(),
            pending: None,
        }
    }

    /// Like [`PartBody::new`], clearing `pending` once the delimiter is
    /// reached.
    pub(crate) fn tracked(
        source: &'a mut ByteSource<R>,
        delimiter: &'a Delimiter,
        pending: &'a mut bool,
    ) -> Self {
        Self {
            pending: Some(pending),
            ..Self::new(source, delimiter)
        }
    }

    /// Next body byte, `Ok(None)` at the delimiter.
    ///
    /// # Errors
    ///
    /// [`crate::MultipartError::UnexpectedEndOfStream`] if the source ends
    /// before the delimiter; source errors are passed through.
    pub fn next_byte(&mut self) -> MultipartResult<Option<u8>> {
        let byte = self.scanner.next_byte(self.source, self.delimiter)?;
        if byte.is_none() {
            self.mark_finished();
        }
        Ok(byte)
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.scanner.is_finished()
    }

    /// Skips the rest of the body, returning how many bytes were skipped.
    ///
    /// # Errors
    ///
    /// Same as [`PartBody::next_byte`].
    pub fn drain(&mut self) -> MultipartResult<u64> {
        let mut skipped = 0u64;
        let mut scratch = [0u8; 1024];
        loop {
            let read = self.fill(&mut scratch)?;
            if read == 0 {
                return Ok(skipped);
            }
            skipped += read as u64;
        }
    }

    fn fill(&mut self, buf: &mut [u8]) -> MultipartResult<usize> {
        let stop = self.delimiter.first_byte();
        let mut written = 0;

        while written < buf.len() {
            if self.scanner.is_idle() && !self.source.has_pushback() {
                let copied = self.source.copy_until(stop, &mut buf[written..])?;
                if copied > 0 {
                    written += copied;
                    continue;
                }
            }

            match self.next_byte()? {
                Some(byte) => {
                    buf[written] = byte;
                    written += 1;
                }
                None => break,
            }
        }

        Ok(written)
    }
}

impl<R> PartBody<'_, R> {
    fn mark_finished(&mut self) {
        if let Some(pending) = self.pending.as_deref_mut() {
            *pending = false;
        }
    }
}

impl<R: BufRead> Read for PartBody<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(self.fill(buf)?)
    }
}

impl<R> core::fmt::Debug for PartBody<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartBody")
            .field("delimiter", &self.delimiter)
            .field("scanner", &self.scanner)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}
