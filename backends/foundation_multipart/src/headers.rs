use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::BufRead;

use crate::{ByteSource, ContentDisposition, MultipartConfig, MultipartError, MultipartResult};

const CONTENT_DISPOSITION: &str = "content-disposition";
const CONTENT_TYPE: &str = "content-type";

/// Values stored for one header name. A name seen once holds a single value;
/// a repeat promotes it to a list, keeping arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeaderEntry {
    Single(String),
    Multiple(Vec<String>),
}

impl HeaderEntry {
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value.as_str()),
            Self::Multiple(values) => values.first().map(String::as_str),
        }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        match self {
            Self::Single(value) => std::slice::from_ref(value),
            Self::Multiple(values) => values.as_slice(),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            Self::Single(existing) => {
                let first = std::mem::take(existing);
                *self = Self::Multiple(vec![first, value]);
            }
            Self::Multiple(values) => values.push(value),
        }
    }
}

/// Headers of a single part.
///
/// Names are stored lower-cased, lookups accept any casing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartHeaders {
    entries: BTreeMap<String, HeaderEntry>,
    name: Option<String>,
    filename: Option<String>,
}

impl PartHeaders {
    /// First value received for `header`.
    #[must_use]
    pub fn value(&self, header: &str) -> Option<&str> {
        self.entries
            .get(&*lookup_key(header))
            .and_then(HeaderEntry::first)
    }

    /// All values received for `header`, in arrival order.
    #[must_use]
    pub fn values(&self, header: &str) -> Option<&[String]> {
        self.entries
            .get(&*lookup_key(header))
            .map(HeaderEntry::as_slice)
    }

    #[must_use]
    pub fn contains(&self, header: &str) -> bool {
        self.entries.contains_key(&*lookup_key(header))
    }

    /// Lower-cased header names in sorted order. Arrival order is only kept
    /// among the values of a single name, see [`PartHeaders::values`].
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `name` parameter of the `form-data` disposition.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// `filename` parameter of the `form-data` disposition.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.value(CONTENT_TYPE)
    }

    fn insert(&mut self, name: String, value: String) {
        if name == CONTENT_DISPOSITION {
            let disposition = ContentDisposition::parse(&value);
            if disposition.name.is_some() {
                self.name = disposition.name;
            }
            if disposition.filename.is_some() {
                self.filename = disposition.filename;
            }
        }

        match self.entries.get_mut(&name) {
            Some(entry) => entry.push(value),
            None => {
                self.entries.insert(name, HeaderEntry::Single(value));
            }
        }
    }
}

fn lookup_key(header: &str) -> Cow<'_, str> {
    if header.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Owned(header.to_ascii_lowercase())
    } else {
        Cow::Borrowed(header)
    }
}

/// Parses a header block from `reader`, up to and including the blank line
/// that ends it. The reader is left on the first byte after that line.
///
/// # Errors
///
/// See [`MultipartError`]: truncated input, malformed lines and exceeded
/// limits each have their own variant.
pub fn parse_headers<R: BufRead>(
    reader: &mut R,
    config: &MultipartConfig,
) -> MultipartResult<PartHeaders> {
    let mut source = ByteSource::new(reader);
    read_headers(&mut source, config)
}

#[cfg_attr(feature = "debug_trace", tracing::instrument(level = "trace", skip_all))]
pub(crate) fn read_headers<R: BufRead>(
    source: &mut ByteSource<R>,
    config: &MultipartConfig,
) -> MultipartResult<PartHeaders> {
    let mut headers = PartHeaders::default();
    let mut lines = 0usize;

    while let Some(name) = read_header_name(source, config.get_max_header_name_length())? {
        lines += 1;
        if lines > config.get_max_headers_per_part() {
            return Err(MultipartError::TooManyHeaders(
                config.get_max_headers_per_part(),
            ));
        }

        let value = read_header_value(source, config.get_max_header_value_length())?;
        tracing::debug!("HeaderKey: {:?} HeaderValue: {:?}", &name, &value);

        headers.insert(name, value);
    }

    Ok(headers)
}

/// Reads a lower-cased header name up to `:`. `None` marks the blank line
/// that closes the block.
fn read_header_name<R: BufRead>(
    source: &mut ByteSource<R>,
    max_length: usize,
) -> MultipartResult<Option<String>> {
    let mut byte = skip_spaces(source)?;

    if byte == b'\r' {
        return match source.expect_byte()? {
            b'\n' => Ok(None),
            _ => Err(MultipartError::MalformedHeader),
        };
    }

    let mut name = Vec::new();
    while byte != b':' {
        if byte == b'\r' || byte == b'\n' {
            return Err(MultipartError::MalformedHeader);
        }
        if name.len() == max_length {
            return Err(MultipartError::HeaderNameTooLong(max_length));
        }
        name.push(byte.to_ascii_lowercase());
        byte = source.expect_byte()?;
    }

    if name.is_empty() {
        return Err(MultipartError::MalformedHeader);
    }

    Ok(Some(String::from_utf8_lossy(&name).into_owned()))
}

/// Reads a header value up to `CR` and checks the `LF` after it.
fn read_header_value<R: BufRead>(
    source: &mut ByteSource<R>,
    max_length: usize,
) -> MultipartResult<String> {
    let mut byte = skip_spaces(source)?;

    let mut value = Vec::new();
    while byte != b'\r' {
        if value.len() == max_length {
            return Err(MultipartError::HeaderValueTooLong(max_length));
        }
        value.push(byte);
        byte = source.expect_byte()?;
    }

    if source.expect_byte()? != b'\n' {
        return Err(MultipartError::MalformedHeader);
    }

    Ok(String::from_utf8_lossy(&value).into_owned())
}

fn skip_spaces<R: BufRead>(source: &mut ByteSource<R>) -> MultipartResult<u8> {
    loop {
        let byte = source.expect_byte()?;
        if byte != b' ' {
            return Ok(byte);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    fn parse(content: &str) -> MultipartResult<PartHeaders> {
        let mut cursor = Cursor::new(content.as_bytes().to_vec());
        parse_headers(&mut cursor, &MultipartConfig::default())
    }

    #[test]
    fn reads_a_single_header() {
        let headers = parse("header1: value1\r\n\r\n").expect("headers");
        assert_eq!(headers.names().collect::<Vec<_>>(), vec!["header1"]);
        assert_eq!(headers.value("header1"), Some("value1"));
    }

    #[test]
    fn repeated_header_promotes_to_list() {
        let headers = parse("header1: value1\r\nHeader1: value2\r\n\r\n").expect("headers");

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.value("header1"), Some("value1"));
        assert_eq!(
            headers.values("HEADER1"),
            Some(&["value1".to_string(), "value2".to_string()][..])
        );
    }

    #[test]
    fn names_come_back_sorted() {
        let headers = parse("X-Zeta: 1\r\nContent-Type: a\r\nx-alpha: 2\r\n\r\n").expect("headers");
        assert_eq!(
            headers.names().collect::<Vec<_>>(),
            vec!["content-type", "x-alpha", "x-zeta"]
        );
    }

    #[test]
    fn lookups_ignore_case() {
        let headers = parse("Content-Type: text/plain\r\n\r\n").expect("headers");
        assert_eq!(headers.value("content-type"), Some("text/plain"));
        assert_eq!(headers.value("CONTENT-TYPE"), Some("text/plain"));
        assert_eq!(headers.content_type(), Some("text/plain"));
        assert!(headers.contains("Content-type"));
    }

    #[test]
    fn empty_block_has_no_headers() {
        let headers = parse("\r\n").expect("headers");
        assert!(headers.is_empty());
        assert_eq!(headers.name(), None);
    }

    #[test]
    fn empty_value_is_kept() {
        let headers = parse("x-empty:\r\nx-next: 1\r\n\r\n").expect("headers");
        assert_eq!(headers.value("x-empty"), Some(""));
        assert_eq!(headers.value("x-next"), Some("1"));
    }

    #[test]
    fn does_not_read_past_the_blank_line() {
        let mut cursor = Cursor::new(b"header1: value1\r\nheader2: value2\r\n\r\nXXX".to_vec());
        parse_headers(&mut cursor, &MultipartConfig::default()).expect("headers");

        let mut rest = String::new();
        cursor.read_to_string(&mut rest).expect("rest");
        assert_eq!(rest, "XXX");
    }

    #[test]
    fn disposition_fields_are_extracted() {
        let headers = parse(
            "Content-Disposition: form-data; name=\"file1\"; filename=\"my%20file%0A.txt\"\r\n\r\n",
        )
        .expect("headers");
        assert_eq!(headers.name(), Some("file1"));
        assert_eq!(headers.filename(), Some("my file\n.txt"));
    }

    #[test]
    fn line_of_spaces_ends_the_block() {
        let mut cursor = Cursor::new(b"a: 1\r\n   \r\nBODY".to_vec());
        let headers = parse_headers(&mut cursor, &MultipartConfig::default()).expect("headers");

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.value("a"), Some("1"));

        let mut rest = String::new();
        cursor.read_to_string(&mut rest).expect("rest");
        assert_eq!(rest, "BODY");
    }

    #[test]
    fn carriage_return_without_lf_at_line_start_is_malformed() {
        assert!(matches!(
            parse("a: 1\r\n\rX"),
            Err(MultipartError::MalformedHeader)
        ));
    }

    #[test]
    fn line_without_colon_is_malformed() {
        assert!(matches!(
            parse("no colon here\r\n\r\n"),
            Err(MultipartError::MalformedHeader)
        ));
    }

    #[test]
    fn value_without_lf_is_malformed() {
        assert!(matches!(
            parse("a: b\rX\r\n\r\n"),
            Err(MultipartError::MalformedHeader)
        ));
    }

    #[test]
    fn truncated_block_is_end_of_stream() {
        assert!(matches!(
            parse("a: b\r\nc: d"),
            Err(MultipartError::UnexpectedEndOfStream)
        ));
    }

    #[test]
    fn limits_are_enforced() {
        let config = MultipartConfig::new()
            .max_header_name_length(4)
            .max_header_value_length(4)
            .max_headers_per_part(1);

        let mut long_name = Cursor::new(b"abcde: x\r\n\r\n".to_vec());
        assert!(matches!(
            parse_headers(&mut long_name, &config),
            Err(MultipartError::HeaderNameTooLong(4))
        ));

        let mut long_value = Cursor::new(b"a: abcde\r\n\r\n".to_vec());
        assert!(matches!(
            parse_headers(&mut long_value, &config),
            Err(MultipartError::HeaderValueTooLong(4))
        ));

        let mut too_many = Cursor::new(b"a: 1\r\nb: 2\r\n\r\n".to_vec());
        assert!(matches!(
            parse_headers(&mut too_many, &config),
            Err(MultipartError::TooManyHeaders(1))
        ));
    }
}
