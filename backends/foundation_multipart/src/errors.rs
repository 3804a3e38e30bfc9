use derive_more::From;

pub type MultipartResult<T> = std::result::Result<T, MultipartError>;

#[derive(From, Debug)]
pub enum MultipartError {
    /// The boundary token was empty.
    EmptyBoundary,

    /// No `boundary=` parameter was found in a `Content-Type` value.
    MissingBoundary,

    /// The source ended before the first `--boundary` occurrence.
    InitialDelimiterNotFound,

    /// The source ended inside a header block, between parts or inside a part
    /// body before its delimiter was seen.
    UnexpectedEndOfStream,

    /// The two bytes after a delimiter were neither `CRLF` nor `--`.
    MalformedSequence,

    /// A header line did not follow `name: value CRLF`.
    MalformedHeader,

    #[from(ignore)]
    HeaderNameTooLong(usize),

    #[from(ignore)]
    HeaderValueTooLong(usize),

    #[from(ignore)]
    TooManyHeaders(usize),

    #[from(ignore)]
    TooManyParts(usize),

    #[from(ignore)]
    Io(std::io::Error),
}

impl std::error::Error for MultipartError {}

impl core::fmt::Display for MultipartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl MultipartError {
    #[must_use]
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::UnexpectedEndOfStream)
    }
}

// Part bodies surface errors through `std::io::Read`, so a `MultipartError`
// can travel inside an `io::Error` and be unwrapped again on the way back.
impl From<std::io::Error> for MultipartError {
    fn from(err: std::io::Error) -> Self {
        let carries_multipart = err
            .get_ref()
            .is_some_and(|inner| inner.is::<MultipartError>());

        if carries_multipart {
            if let Some(inner) = err.into_inner() {
                return match inner.downcast::<MultipartError>() {
                    Ok(multipart_err) => *multipart_err,
                    Err(other) => Self::Io(std::io::Error::other(other)),
                };
            }
            return Self::UnexpectedEndOfStream;
        }

        Self::Io(err)
    }
}

impl From<MultipartError> for std::io::Error {
    fn from(err: MultipartError) -> Self {
        match err {
            MultipartError::Io(inner) => inner,
            MultipartError::UnexpectedEndOfStream => {
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, err)
            }
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        }
    }
}
