//! Field extraction for `Content-Disposition` values.
//!
//! Only the `form-data` disposition type is inspected. Parameters are read
//! with a single left-to-right scan, see [`disposition_field`].

const FORM_DATA: &str = "form-data";
const NAME_FIELD: &str = "name";
const FILENAME_FIELD: &str = "filename";

/// The `name` and `filename` parameters of a `form-data` disposition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentDisposition {
    pub name: Option<String>,
    pub filename: Option<String>,
}

impl ContentDisposition {
    /// Parses a raw header value. Anything that is not `form-data` yields an
    /// empty result.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if !is_form_data(value) {
            return Self::default();
        }

        Self {
            name: disposition_field(value, NAME_FIELD),
            filename: disposition_field(value, FILENAME_FIELD),
        }
    }
}

fn is_form_data(value: &str) -> bool {
    value
        .get(..FORM_DATA.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(FORM_DATA))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScanState {
    ScanForKey,
    SkipKey,
    SkipValue,
    SkipToQuote,
    SkipToSeparator,
    ValueStart,
    ReadValue,
    ReadToQuote(usize),
    ReadToSeparator(usize),
}

fn is_separator(byte: u8) -> bool {
    byte == b' ' || byte == b';'
}

/// Returns the percent-decoded value of parameter `key` in a disposition
/// value, or `None` when the parameter is absent.
///
/// The disposition type itself is skipped. Keys match case-insensitively and
/// only as whole keys: `filename` never satisfies `name`, neither does
/// `names`. Quoted values run to the closing quote, unquoted ones to the next
/// space or `;`. A value that runs to the end of the string is returned as is.
#[must_use]
pub fn disposition_field(value: &str, key: &str) -> Option<String> {
    let bytes = value.as_bytes();
    let key_bytes = key.as_bytes();

    let mut state = ScanState::SkipToSeparator;
    let mut index = 0;

    while index < bytes.len() {
        if state == ScanState::ScanForKey && starts_with_key(&bytes[index..], key_bytes) {
            index += key_bytes.len();
            state = ScanState::ValueStart;
            continue;
        }

        let byte = bytes[index];
        state = match state {
            ScanState::ScanForKey => {
                if is_separator(byte) || byte == b'\t' {
                    ScanState::ScanForKey
                } else {
                    ScanState::SkipKey
                }
            }
            ScanState::SkipKey => {
                if byte == b'=' {
                    ScanState::SkipValue
                } else {
                    ScanState::SkipKey
                }
            }
            ScanState::SkipValue => {
                if byte == b'"' {
                    ScanState::SkipToQuote
                } else {
                    ScanState::SkipToSeparator
                }
            }
            ScanState::SkipToQuote => {
                if byte == b'"' {
                    ScanState::SkipToSeparator
                } else {
                    ScanState::SkipToQuote
                }
            }
            ScanState::SkipToSeparator => {
                if is_separator(byte) {
                    ScanState::ScanForKey
                } else {
                    ScanState::SkipToSeparator
                }
            }
            // the key was only the start of a longer one
            ScanState::ValueStart if byte != b'=' => ScanState::SkipKey,
            ScanState::ValueStart => ScanState::ReadValue,
            ScanState::ReadValue => {
                if byte == b'"' {
                    ScanState::ReadToQuote(index + 1)
                } else if is_separator(byte) {
                    return Some(String::new());
                } else {
                    ScanState::ReadToSeparator(index)
                }
            }
            ScanState::ReadToQuote(start) => {
                if byte == b'"' {
                    return Some(percent_decode(&value[start..index]));
                }
                state
            }
            ScanState::ReadToSeparator(start) => {
                if is_separator(byte) {
                    return Some(percent_decode(&value[start..index]));
                }
                state
            }
        };

        index += 1;
    }

    match state {
        ScanState::ReadToQuote(start) | ScanState::ReadToSeparator(start) => {
            Some(percent_decode(&value[start..]))
        }
        ScanState::ReadValue => Some(String::new()),
        _ => None,
    }
}

fn starts_with_key(bytes: &[u8], key: &[u8]) -> bool {
    bytes
        .get(..key.len())
        .is_some_and(|candidate| candidate.eq_ignore_ascii_case(key))
}

/// Replaces every `%XX` (two hex digits) with the byte it encodes. Malformed
/// sequences are kept verbatim. The decoded bytes are read as UTF-8, invalid
/// sequences become U+FFFD.
#[must_use]
pub fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    if memchr::memchr(b'%', bytes).is_none() {
        return raw.to_string();
    }

    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' {
            let high = bytes.get(index + 1).copied().and_then(hex_value);
            let low = bytes.get(index + 2).copied().and_then(hex_value);
            if let (Some(high), Some(low)) = (high, low) {
                decoded.push((high << 4) | low);
                index += 3;
                continue;
            }
        }
        decoded.push(bytes[index]);
        index += 1;
    }

    match String::from_utf8(decoded) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
