use std::io::{BufRead, Read};

use crate::headers::read_headers;
use crate::{
    ByteSource, Delimiter, MultipartConfig, MultipartError, MultipartResult, PartBody, PartHeaders,
};

/// One decoded part: its headers and a body stream positioned on the first
/// body byte.
#[derive(Debug)]
pub struct Part<'a, R> {
    headers: PartHeaders,
    body: PartBody<'a, R>,
}

impl<'a, R: BufRead> Part<'a, R> {
    fn new(headers: PartHeaders, body: PartBody<'a, R>) -> Self {
        Self { headers, body }
    }

    #[must_use]
    pub fn headers(&self) -> &PartHeaders {
        &self.headers
    }

    #[must_use]
    pub fn header_value(&self, header: &str) -> Option<&str> {
        self.headers.value(header)
    }

    #[must_use]
    pub fn header_values(&self, header: &str) -> Option<&[String]> {
        self.headers.values(header)
    }

    pub fn header_names(&self) -> impl Iterator<Item = &str> {
        self.headers.names()
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.headers.name()
    }

    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.headers.filename()
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.content_type()
    }

    #[must_use]
    pub fn body(&self) -> &PartBody<'a, R> {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut PartBody<'a, R> {
        &mut self.body
    }

    /// Reads the remaining body into memory.
    ///
    /// # Errors
    ///
    /// Truncated bodies fail with [`MultipartError::UnexpectedEndOfStream`].
    pub fn read_body_bytes(&mut self) -> MultipartResult<Vec<u8>> {
        let mut content = Vec::new();
        self.body.read_to_end(&mut content)?;
        Ok(content)
    }

    /// Reads the remaining body as text, replacing invalid UTF-8.
    ///
    /// # Errors
    ///
    /// Same as [`Part::read_body_bytes`].
    pub fn read_body_text(&mut self) -> MultipartResult<String> {
        let content = self.read_body_bytes()?;
        Ok(match String::from_utf8(content) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MultipartReadState {
    Preamble,
    Parts,
    Finished,
    Failed,
}

/// Pull-based multipart decoder.
///
/// ```
/// use foundation_multipart::MultipartReader;
///
/// let body = "--BOUND\r\nContent-Disposition: form-data; name=\"f\"\r\n\r\nHELLO\r\n--BOUND--\r\n";
/// let mut reader = MultipartReader::new("BOUND", body.as_bytes()).unwrap();
///
/// let mut part = reader.next_part().unwrap().unwrap();
/// assert_eq!(part.name(), Some("f"));
/// assert_eq!(part.read_body_text().unwrap(), "HELLO");
/// drop(part);
///
/// assert!(reader.next_part().unwrap().is_none());
/// ```
#[derive(Debug)]
pub struct MultipartReader<R> {
    source: ByteSource<R>,
    delimiter: Delimiter,
    config: MultipartConfig,
    state: MultipartReadState,
    parts_read: usize,
    body_pending: bool,
}

impl<R: BufRead> MultipartReader<R> {
    /// # Errors
    ///
    /// [`MultipartError::EmptyBoundary`] for an empty boundary token.
    pub fn new(boundary: &str, reader: R) -> MultipartResult<Self> {
        Self::with_config(boundary, reader, MultipartConfig::default())
    }

    /// # Errors
    ///
    /// [`MultipartError::EmptyBoundary`] for an empty boundary token.
    pub fn with_config(
        boundary: &str,
        reader: R,
        config: MultipartConfig,
    ) -> MultipartResult<Self> {
        Ok(Self {
            source: ByteSource::new(reader),
            delimiter: Delimiter::new(boundary)?,
            config,
            state: MultipartReadState::Preamble,
            parts_read: 0,
            body_pending: false,
        })
    }

    #[must_use]
    pub fn delimiter(&self) -> &Delimiter {
        &self.delimiter
    }

    #[must_use]
    pub fn config(&self) -> &MultipartConfig {
        &self.config
    }

    #[must_use]
    pub fn parts_read(&self) -> usize {
        self.parts_read
    }

    pub fn into_inner(self) -> R {
        self.source.into_inner()
    }

    /// Decodes the next part. `Ok(None)` once the closing delimiter has been
    /// consumed.
    ///
    /// The returned part's body reads straight from the underlying stream.
    /// With [`MultipartConfig::drain_unread_body`] off, it must be read to the
    /// end before calling this again. After an error the reader stays failed
    /// and only returns `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Any [`MultipartError`] met while locating or parsing the part.
    pub fn next_part(&mut self) -> MultipartResult<Option<Part<'_, R>>> {
        if matches!(
            self.state,
            MultipartReadState::Finished | MultipartReadState::Failed
        ) {
            return Ok(None);
        }

        let headers = match self.advance() {
            Ok(Some(headers)) => headers,
            Ok(None) => {
                self.state = MultipartReadState::Finished;
                return Ok(None);
            }
            Err(err) => {
                tracing::debug!("multipart decoding failed: {:?}", &err);
                self.state = MultipartReadState::Failed;
                return Err(err);
            }
        };

        self.parts_read += 1;
        self.body_pending = true;
        tracing::debug!(
            part = self.parts_read,
            name = ?headers.name(),
            filename = ?headers.filename(),
            "multipart part ready"
        );

        Ok(Some(Part::new(
            headers,
            PartBody::tracked(&mut self.source, &self.delimiter, &mut self.body_pending),
        )))
    }

    fn advance(&mut self) -> MultipartResult<Option<PartHeaders>> {
        if self.state == MultipartReadState::Preamble {
            self.skip_preamble()?;
            self.state = MultipartReadState::Parts;
        } else if self.body_pending {
            self.finish_previous_body()?;
        }

        if !self.read_part_separator()? {
            return Ok(None);
        }

        if self.parts_read == self.config.get_max_parts() {
            return Err(MultipartError::TooManyParts(self.config.get_max_parts()));
        }

        read_headers(&mut self.source, &self.config).map(Some)
    }

    fn finish_previous_body(&mut self) -> MultipartResult<()> {
        if !self.config.get_drain_unread_body() {
            return Ok(());
        }

        let mut body =
            PartBody::tracked(&mut self.source, &self.delimiter, &mut self.body_pending);
        let skipped = body.drain()?;
        tracing::debug!(skipped, "drained unread part body");
        Ok(())
    }

    /// Discards everything up to and including the first `--boundary`.
    #[cfg_attr(feature = "debug_trace", tracing::instrument(level = "trace", skip_all))]
    fn skip_preamble(&mut self) -> MultipartResult<()> {
        let pattern = self.delimiter.dash_boundary();
        let fallback = prefix_table(pattern);

        let mut matched = 0;
        let mut discarded = 0usize;
        while matched < pattern.len() {
            let Some(byte) = self.source.next_byte()? else {
                return Err(MultipartError::InitialDelimiterNotFound);
            };
            discarded += 1;

            while matched > 0 && byte != pattern[matched] {
                matched = fallback[matched - 1];
            }
            if byte == pattern[matched] {
                matched += 1;
            }
        }

        tracing::debug!(
            preamble = discarded - pattern.len(),
            "initial delimiter found"
        );
        Ok(())
    }

    /// Reads the two bytes after a delimiter. `true` when another part
    /// follows, `false` at the closing `--`, after which the rest of the
    /// stream is discarded.
    fn read_part_separator(&mut self) -> MultipartResult<bool> {
        let first = self.source.expect_byte()?;
        let second = self.source.expect_byte()?;

        match (first, second) {
            (b'\r', b'\n') => Ok(true),
            (b'-', b'-') => {
                let epilogue = self.source.drain()?;
                tracing::debug!(epilogue, "closing delimiter found");
                Ok(false)
            }
            _ => Err(MultipartError::MalformedSequence),
        }
    }
}

/// Longest proper prefix that is also a suffix, for every prefix of
/// `pattern`.
fn prefix_table(pattern: &[u8]) -> Vec<usize> {
    let mut table = vec![0; pattern.len()];
    let mut length = 0;
    for index in 1..pattern.len() {
        while length > 0 && pattern[index] != pattern[length] {
            length = table[length - 1];
        }
        if pattern[index] == pattern[length] {
            length += 1;
        }
        table[index] = length;
    }
    table
}

/// Decodes a multipart body, calling `on_part` once per part in stream order.
///
/// Returns once the closing delimiter has been consumed and the epilogue
/// drained. An error from `on_part` stops decoding and is returned as is.
///
/// # Errors
///
/// Any [`MultipartError`] from decoding or from `on_part`.
pub fn decode<R, F>(boundary: &str, reader: R, on_part: F) -> MultipartResult<()>
where
    R: BufRead,
    F: FnMut(&mut Part<'_, R>) -> MultipartResult<()>,
{
    decode_with_config(boundary, reader, &MultipartConfig::default(), on_part)
}

/// [`decode`] with explicit limits.
///
/// # Errors
///
/// Any [`MultipartError`] from decoding or from `on_part`.
pub fn decode_with_config<R, F>(
    boundary: &str,
    reader: R,
    config: &MultipartConfig,
    mut on_part: F,
) -> MultipartResult<()>
where
    R: BufRead,
    F: FnMut(&mut Part<'_, R>) -> MultipartResult<()>,
{
    let mut reader = MultipartReader::with_config(boundary, reader, config.clone())?;
    while let Some(mut part) = reader.next_part()? {
        on_part(&mut part)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_table_handles_repeated_dashes() {
        assert_eq!(prefix_table(b"---X"), vec![0, 1, 2, 0]);
        assert_eq!(prefix_table(b"--ab--a"), vec![0, 1, 0, 0, 1, 2, 3]);
    }

    #[test]
    fn preamble_scan_recovers_from_overlapping_prefixes() {
        // the boundary starts with a dash, so "----X" hides "---X" one byte in
        let body = "----X\r\n\r\nbody\r\n---X--";
        let mut reader = MultipartReader::new("-X", body.as_bytes()).expect("reader");

        let mut part = reader.next_part().expect("decode").expect("one part");
        assert_eq!(part.read_body_text().expect("body"), "body");
        drop(part);

        assert!(reader.next_part().expect("decode").is_none());
    }

    #[test]
    fn pending_body_is_tracked_by_the_reader() {
        let body = "--B\r\n\r\nfirst\r\n--B\r\n\r\nsecond\r\n--B--";
        let mut reader = MultipartReader::new("B", body.as_bytes()).expect("reader");

        let mut part = reader.next_part().expect("decode").expect("first part");
        assert_eq!(part.read_body_text().expect("body"), "first");
        drop(part);
        assert!(!reader.body_pending);

        let part = reader.next_part().expect("decode").expect("second part");
        drop(part);
        assert!(reader.body_pending);

        assert!(reader.next_part().expect("decode").is_none());
        assert!(!reader.body_pending);
    }

    #[test]
    fn failed_reader_stays_failed() {
        let mut reader = MultipartReader::new("B", "--Bxx".as_bytes()).expect("reader");
        assert!(matches!(
            reader.next_part(),
            Err(MultipartError::MalformedSequence)
        ));
        assert!(reader.next_part().expect("failed reader").is_none());
    }
}
