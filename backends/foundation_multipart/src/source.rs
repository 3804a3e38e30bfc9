use std::io::{BufRead, ErrorKind};

use crate::{MultipartError, MultipartResult};

/// Byte-at-a-time view over a [`BufRead`] with a single byte of pushback.
///
/// Reads go through `fill_buf`/`consume`, so nothing past the byte handed out
/// is ever taken from the wrapped reader. That keeps the wrapped reader exactly
/// positioned after the last delimiter once decoding is done.
#[derive(Debug)]
pub struct ByteSource<R> {
    inner: R,
    pushed_back: Option<u8>,
}

impl<R: BufRead> ByteSource<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pushed_back: None,
        }
    }

    /// Next byte, or `None` once the wrapped reader is exhausted.
    ///
    /// # Errors
    ///
    /// Propagates the wrapped reader's errors as [`MultipartError::Io`].
    pub fn next_byte(&mut self) -> MultipartResult<Option<u8>> {
        if let Some(byte) = self.pushed_back.take() {
            return Ok(Some(byte));
        }

        let byte = loop {
            match self.inner.fill_buf() {
                Ok([]) => return Ok(None),
                Ok(available) => break available[0],
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(MultipartError::Io(err)),
            }
        };

        self.inner.consume(1);
        Ok(Some(byte))
    }

    /// Like [`ByteSource::next_byte`] but treats the end of the stream as an
    /// error.
    ///
    /// # Errors
    ///
    /// [`MultipartError::UnexpectedEndOfStream`] when nothing is left.
    pub fn expect_byte(&mut self) -> MultipartResult<u8> {
        self.next_byte()?
            .ok_or(MultipartError::UnexpectedEndOfStream)
    }

    /// Returns `byte` to the front of the stream. Only one byte can be held.
    pub fn unread(&mut self, byte: u8) {
        debug_assert!(
            self.pushed_back.is_none(),
            "only a single byte of pushback is supported"
        );
        self.pushed_back = Some(byte);
    }

    #[must_use]
    pub fn has_pushback(&self) -> bool {
        self.pushed_back.is_some()
    }

    /// Copies buffered bytes into `out` up to (not including) the first
    /// `stop` byte. Returns `0` when a pushed back byte is pending, when the
    /// next byte is `stop`, or when the reader is exhausted; the byte-wise
    /// path takes over in those cases.
    ///
    /// # Errors
    ///
    /// Propagates the wrapped reader's errors as [`MultipartError::Io`].
    pub fn copy_until(&mut self, stop: u8, out: &mut [u8]) -> MultipartResult<usize> {
        if self.pushed_back.is_some() || out.is_empty() {
            return Ok(0);
        }

        let copied = loop {
            match self.inner.fill_buf() {
                Ok(available) => {
                    let limit = available.len().min(out.len());
                    let copied = memchr::memchr(stop, &available[..limit]).unwrap_or(limit);
                    out[..copied].copy_from_slice(&available[..copied]);
                    break copied;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(MultipartError::Io(err)),
            }
        };

        self.inner.consume(copied);
        Ok(copied)
    }

    /// Reads and discards everything left, returning how many bytes went.
    ///
    /// # Errors
    ///
    /// Propagates the wrapped reader's errors as [`MultipartError::Io`].
    pub fn drain(&mut self) -> MultipartResult<u64> {
        let pushed = u64::from(self.pushed_back.take().is_some());
        let drained = std::io::copy(&mut self.inner, &mut std::io::sink())?;
        Ok(pushed + drained)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}
