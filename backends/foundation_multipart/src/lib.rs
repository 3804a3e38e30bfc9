//! Streaming `multipart/form-data` decoding over any [`std::io::BufRead`].
//!
//! Parts are handed out one at a time with their headers parsed and a body
//! stream that ends exactly at the next delimiter, so nothing is buffered
//! beyond a single byte of lookahead.

mod boundary;
mod config;
mod decoder;
mod disposition;
mod errors;
mod headers;
mod scanner;
mod source;

pub use boundary::*;
pub use config::*;
pub use decoder::*;
pub use disposition::*;
pub use errors::*;
pub use headers::*;
pub use scanner::PartBody;
pub use source::*;
