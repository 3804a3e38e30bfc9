use serde::{Deserialize, Serialize};

/// Default maximum length of a part header name.
pub const DEFAULT_MAX_HEADER_NAME_LENGTH: usize = (1 << 16) - 1;

/// Default maximum length of a part header value.
pub const DEFAULT_MAX_HEADER_VALUE_LENGTH: usize = (1 << 16) - 1;

/// Default maximum number of header lines in a single part.
pub const DEFAULT_MAX_HEADERS_PER_PART: usize = 100;

/// Default maximum number of parts in a single body.
pub const DEFAULT_MAX_PARTS: usize = 1024;

/// Limits and behaviour switches for decoding a multipart body.
///
/// Every field has a default, so the struct can be embedded in a host
/// application's configuration file and only the overridden keys need to be
/// present:
///
/// ```toml
/// [multipart]
/// max_parts = 16
/// drain_unread_body = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultipartConfig {
    max_header_name_length: usize,
    max_header_value_length: usize,
    max_headers_per_part: usize,
    max_parts: usize,

    /// When set, any body bytes a caller left unread are skipped before the
    /// next part is decoded.
    drain_unread_body: bool,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            max_header_name_length: DEFAULT_MAX_HEADER_NAME_LENGTH,
            max_header_value_length: DEFAULT_MAX_HEADER_VALUE_LENGTH,
            max_headers_per_part: DEFAULT_MAX_HEADERS_PER_PART,
            max_parts: DEFAULT_MAX_PARTS,
            drain_unread_body: true,
        }
    }
}

impl MultipartConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn max_header_name_length(mut self, length: usize) -> Self {
        self.max_header_name_length = length;
        self
    }

    #[must_use]
    pub fn max_header_value_length(mut self, length: usize) -> Self {
        self.max_header_value_length = length;
        self
    }

    #[must_use]
    pub fn max_headers_per_part(mut self, count: usize) -> Self {
        self.max_headers_per_part = count;
        self
    }

    #[must_use]
    pub fn max_parts(mut self, count: usize) -> Self {
        self.max_parts = count;
        self
    }

    #[must_use]
    pub fn drain_unread_body(mut self, drain: bool) -> Self {
        self.drain_unread_body = drain;
        self
    }

    #[must_use]
    pub fn get_max_header_name_length(&self) -> usize {
        self.max_header_name_length
    }

    #[must_use]
    pub fn get_max_header_value_length(&self) -> usize {
        self.max_header_value_length
    }

    #[must_use]
    pub fn get_max_headers_per_part(&self) -> usize {
        self.max_headers_per_part
    }

    #[must_use]
    pub fn get_max_parts(&self) -> usize {
        self.max_parts
    }

    #[must_use]
    pub fn get_drain_unread_body(&self) -> bool {
        self.drain_unread_body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = MultipartConfig::new()
            .max_parts(3)
            .max_headers_per_part(2)
            .drain_unread_body(false);

        assert_eq!(config.get_max_parts(), 3);
        assert_eq!(config.get_max_headers_per_part(), 2);
        assert!(!config.get_drain_unread_body());
        assert_eq!(
            config.get_max_header_name_length(),
            DEFAULT_MAX_HEADER_NAME_LENGTH
        );
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: MultipartConfig =
            toml::from_str("max_parts = 8\ndrain_unread_body = false\n").expect("valid toml");

        assert_eq!(config.get_max_parts(), 8);
        assert!(!config.get_drain_unread_body());
        assert_eq!(
            config.get_max_header_value_length(),
            DEFAULT_MAX_HEADER_VALUE_LENGTH
        );
        assert_eq!(config.get_max_headers_per_part(), DEFAULT_MAX_HEADERS_PER_PART);
    }

    #[test]
    fn empty_toml_is_the_default_config() {
        let config: MultipartConfig = toml::from_str("").expect("valid toml");
        assert_eq!(config, MultipartConfig::default());
    }
}
