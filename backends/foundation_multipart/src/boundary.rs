use crate::{MultipartError, MultipartResult};

const DELIMITER_PREFIX: &[u8] = b"\r\n--";
const BOUNDARY_PARAM: &str = "boundary=";

/// The byte sequence separating parts: `CRLF "--" boundary`.
///
/// The terminal marker is the same sequence followed by `--`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Delimiter(Vec<u8>);

impl Delimiter {
    /// Builds the delimiter for a boundary token. The token is used as given,
    /// any quote stripping must have happened when it was extracted.
    ///
    /// # Errors
    ///
    /// Returns [`MultipartError::EmptyBoundary`] for an empty token.
    pub fn new(boundary: &str) -> MultipartResult<Self> {
        if boundary.is_empty() {
            return Err(MultipartError::EmptyBoundary);
        }

        let mut bytes = Vec::with_capacity(DELIMITER_PREFIX.len() + boundary.len());
        bytes.extend_from_slice(DELIMITER_PREFIX);
        bytes.extend_from_slice(boundary.as_bytes());
        Ok(Self(bytes))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// `"--" + boundary`, what opens the very first part.
    #[must_use]
    pub fn dash_boundary(&self) -> &[u8] {
        &self.0[2..]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn first_byte(&self) -> u8 {
        self.0[0]
    }
}

impl AsRef<[u8]> for Delimiter {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Pulls the boundary token out of a `Content-Type` value such as
/// `multipart/form-data; boundary="----abc"`.
///
/// # Errors
///
/// [`MultipartError::MissingBoundary`] when no `boundary` parameter exists and
/// [`MultipartError::EmptyBoundary`] when it is present but empty.
pub fn boundary_from_content_type(content_type: &str) -> MultipartResult<String> {
    for param in content_type.split(';') {
        let param = param.trim();
        let Some(prefix) = param.get(..BOUNDARY_PARAM.len()) else {
            continue;
        };
        if !prefix.eq_ignore_ascii_case(BOUNDARY_PARAM) {
            continue;
        }

        let token = param[BOUNDARY_PARAM.len()..].trim().trim_matches('"');
        if token.is_empty() {
            return Err(MultipartError::EmptyBoundary);
        }
        return Ok(token.to_string());
    }

    Err(MultipartError::MissingBoundary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_is_crlf_dashes_and_token() {
        let delimiter = Delimiter::new("BOUND").expect("valid boundary");
        assert_eq!(delimiter.as_bytes(), b"\r\n--BOUND");
        assert_eq!(delimiter.dash_boundary(), b"--BOUND");
        assert_eq!(delimiter.len(), 9);
    }

    #[test]
    fn token_is_not_normalized() {
        let delimiter = Delimiter::new(" \"x\" ").expect("valid boundary");
        assert_eq!(delimiter.as_bytes(), b"\r\n-- \"x\" ");
    }

    #[test]
    fn empty_token_is_rejected() {
        assert!(matches!(
            Delimiter::new(""),
            Err(MultipartError::EmptyBoundary)
        ));
    }

    #[test]
    fn boundary_is_read_from_content_type() {
        let token = boundary_from_content_type(
            "multipart/form-data; boundary=----WebKitFormBoundary7MA4YWxkTrZu0gW",
        )
        .expect("has boundary");
        assert_eq!(token, "----WebKitFormBoundary7MA4YWxkTrZu0gW");
    }

    #[test]
    fn quoted_boundary_is_unquoted() {
        let token = boundary_from_content_type(r#"multipart/form-data; BOUNDARY="simple boundary""#)
            .expect("has boundary");
        assert_eq!(token, "simple boundary");
    }

    #[test]
    fn missing_and_empty_boundaries_fail() {
        assert!(matches!(
            boundary_from_content_type("multipart/form-data"),
            Err(MultipartError::MissingBoundary)
        ));
        assert!(matches!(
            boundary_from_content_type("multipart/form-data; boundary=\"\""),
            Err(MultipartError::EmptyBoundary)
        ));
    }
}
