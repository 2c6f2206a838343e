//! Analyzer configuration.
//!
//! [`AnalyzerConfig`] is deserialised from the host's configuration file and
//! validated once when the analyzer is built. Connections take an immutable
//! snapshot of the derived settings, so a configuration is never shared
//! between analyzer instances.

use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    correlator::{DEFAULT_MAX_PENDING_REQUESTS, DEFAULT_TRANSACTION_TIMEOUT, TransactionConfig},
    framing::MarkerFraming,
    parser::ParserConfig,
};

/// Default cap on unframed bytes per stream direction (10 MiB).
pub const DEFAULT_MAX_BYTES: usize = 10 * 1024 * 1024;

/// Default protocol tag placed on events.
pub const DEFAULT_PROTOCOL: &str = "simpleprotocol";

/// Errors raised while validating an [`AnalyzerConfig`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Port zero cannot carry traffic.
    #[error("invalid port 0 in ports list")]
    ZeroPort,
    /// The transaction timeout must be positive.
    #[error("transaction_timeout must be greater than zero")]
    ZeroTransactionTimeout,
    /// At least one request must be allowed to wait for a response.
    #[error("max_pending_requests must be greater than zero")]
    ZeroPendingRequests,
    /// Framing bytes must be single ASCII characters.
    #[error("framing.{field} must be an ASCII character, got {value:?}")]
    NonAsciiFraming {
        /// Offending field.
        field: &'static str,
        /// Rejected value.
        value: char,
    },
    /// A marker collides with the delimiter.
    #[error("framing.{field} must differ from the delimiter")]
    MarkerIsDelimiter {
        /// Offending field.
        field: &'static str,
    },
    /// The response marker equals the request marker.
    #[error("framing.response_marker must differ from framing.request_marker")]
    MarkerCollision,
    /// The protocol tag is empty.
    #[error("protocol tag must not be empty")]
    EmptyProtocol,
}

/// Framing bytes of the line-oriented reference protocol.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FramingConfig {
    /// Byte terminating every unit.
    pub delimiter: char,
    /// Leading byte marking a request.
    pub request_marker: char,
    /// Optional byte following the request marker that is also stripped.
    pub request_separator: Option<char>,
    /// Leading byte marking a well-formed response. Disabled by default, in
    /// which case every non-request unit is reported as failed.
    pub response_marker: Option<char>,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            delimiter: '\n',
            request_marker: '>',
            request_separator: Some(' '),
            response_marker: None,
        }
    }
}

impl FramingConfig {
    fn ascii(field: &'static str, value: char) -> Result<u8, ConfigError> {
        u8::try_from(value)
            .ok()
            .filter(u8::is_ascii)
            .ok_or(ConfigError::NonAsciiFraming { field, value })
    }

    /// Validate and convert into a [`MarkerFraming`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a byte is not ASCII, a marker equals the
    /// delimiter, or both markers are the same byte.
    pub fn to_framing(&self) -> Result<MarkerFraming, ConfigError> {
        let delimiter = Self::ascii("delimiter", self.delimiter)?;
        let request_marker = Self::ascii("request_marker", self.request_marker)?;
        let separator = self
            .request_separator
            .map(|c| Self::ascii("request_separator", c))
            .transpose()?;
        let response_marker = self
            .response_marker
            .map(|c| Self::ascii("response_marker", c))
            .transpose()?;

        if request_marker == delimiter {
            return Err(ConfigError::MarkerIsDelimiter {
                field: "request_marker",
            });
        }
        if response_marker == Some(delimiter) {
            return Err(ConfigError::MarkerIsDelimiter {
                field: "response_marker",
            });
        }
        if response_marker == Some(request_marker) {
            return Err(ConfigError::MarkerCollision);
        }

        Ok(MarkerFraming::new(
            delimiter,
            request_marker,
            separator,
            response_marker,
        ))
    }
}

/// User-facing analyzer settings.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use flowframe::AnalyzerConfig;
///
/// let config = AnalyzerConfig::default()
///     .ports([7000, 7001])
///     .send_request(true)
///     .transaction_timeout(Duration::from_secs(5));
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.ports, vec![7000, 7001]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerConfig {
    /// TCP ports the host should route to this analyzer.
    pub ports: Vec<u16>,
    /// Include raw request content in events.
    pub send_request: bool,
    /// Include raw response content in events.
    pub send_response: bool,
    /// Maximum time an unanswered request stays pending, in milliseconds
    /// when serialised.
    #[serde(with = "millis")]
    pub transaction_timeout: Duration,
    /// Cap on unframed bytes per stream direction; 0 disables the cap.
    pub max_bytes: usize,
    /// Maximum unanswered requests per connection.
    pub max_pending_requests: usize,
    /// Tag placed in the `type` field of events.
    pub protocol: String,
    /// Framing bytes.
    pub framing: FramingConfig,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            ports: Vec::new(),
            send_request: false,
            send_response: false,
            transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT,
            max_bytes: DEFAULT_MAX_BYTES,
            max_pending_requests: DEFAULT_MAX_PENDING_REQUESTS.get(),
            protocol: DEFAULT_PROTOCOL.to_owned(),
            framing: FramingConfig::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Set the ports to analyse.
    #[must_use]
    pub fn ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.ports = ports.into_iter().collect();
        self
    }

    /// Set whether request content is published.
    #[must_use]
    pub fn send_request(mut self, enabled: bool) -> Self {
        self.send_request = enabled;
        self
    }

    /// Set whether response content is published.
    #[must_use]
    pub fn send_response(mut self, enabled: bool) -> Self {
        self.send_response = enabled;
        self
    }

    /// Set the transaction timeout.
    #[must_use]
    pub fn transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout = timeout;
        self
    }

    /// Set the per-direction byte cap; 0 disables it.
    #[must_use]
    pub fn max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Set the pending request cap.
    #[must_use]
    pub fn max_pending_requests(mut self, count: usize) -> Self {
        self.max_pending_requests = count;
        self
    }

    /// Set the framing bytes.
    #[must_use]
    pub fn framing(mut self, framing: FramingConfig) -> Self {
        self.framing = framing;
        self
    }

    /// Check the configuration for values the analyzer cannot honour.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ports.contains(&0) {
            return Err(ConfigError::ZeroPort);
        }
        if self.transaction_timeout.is_zero() {
            return Err(ConfigError::ZeroTransactionTimeout);
        }
        if self.max_pending_requests == 0 {
            return Err(ConfigError::ZeroPendingRequests);
        }
        if self.protocol.is_empty() {
            return Err(ConfigError::EmptyProtocol);
        }
        self.framing.to_framing()?;
        Ok(())
    }

    /// Derive the parser settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the framing bytes are invalid.
    pub fn parser_config(&self) -> Result<ParserConfig, ConfigError> {
        Ok(ParserConfig {
            max_bytes: NonZeroUsize::new(self.max_bytes),
            framing: Arc::new(self.framing.to_framing()?),
        })
    }

    /// Derive the correlator settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the timeout or queue cap is zero.
    pub fn transaction_config(&self) -> Result<TransactionConfig, ConfigError> {
        if self.transaction_timeout.is_zero() {
            return Err(ConfigError::ZeroTransactionTimeout);
        }
        Ok(TransactionConfig {
            transaction_timeout: self.transaction_timeout,
            max_pending_requests: NonZeroUsize::new(self.max_pending_requests)
                .ok_or(ConfigError::ZeroPendingRequests)?,
        })
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::{AnalyzerConfig, ConfigError, FramingConfig};
    use crate::framing::{Framing, MarkerFraming};

    #[test]
    fn defaults_are_valid() {
        let config = AnalyzerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.transaction_timeout, Duration::from_secs(10));
        assert_eq!(
            config.framing.to_framing().expect("framing"),
            MarkerFraming::default()
        );
    }

    #[test]
    fn deserialises_all_options() {
        let config: AnalyzerConfig = toml::from_str(
            r#"
            ports = [8889, 3030]
            send_request = true
            send_response = true
            transaction_timeout = 20
            max_bytes = 0

            [framing]
            response_marker = "<"
            "#,
        )
        .expect("valid toml");

        assert_eq!(config.ports, vec![8889, 3030]);
        assert!(config.send_request);
        assert!(config.send_response);
        assert_eq!(config.transaction_timeout, Duration::from_millis(20));
        assert_eq!(config.max_bytes, 0);
        assert_eq!(config.framing.response_marker, Some('<'));
        assert_eq!(config.framing.request_marker, '>');
        assert!(config.parser_config().expect("parser").max_bytes.is_none());
    }

    #[test]
    fn unknown_option_is_rejected() {
        let result: Result<AnalyzerConfig, _> = toml::from_str("send_requests = true");
        assert!(result.is_err());
    }

    #[rstest]
    #[case(AnalyzerConfig::default().ports([80, 0]), ConfigError::ZeroPort)]
    #[case(
        AnalyzerConfig::default().transaction_timeout(Duration::ZERO),
        ConfigError::ZeroTransactionTimeout
    )]
    #[case(
        AnalyzerConfig::default().max_pending_requests(0),
        ConfigError::ZeroPendingRequests
    )]
    #[case(
        AnalyzerConfig::default().framing(FramingConfig { request_marker: '\n', ..FramingConfig::default() }),
        ConfigError::MarkerIsDelimiter { field: "request_marker" }
    )]
    #[case(
        AnalyzerConfig::default().framing(FramingConfig { response_marker: Some('>'), ..FramingConfig::default() }),
        ConfigError::MarkerCollision
    )]
    #[case(
        AnalyzerConfig::default().framing(FramingConfig { delimiter: 'é', ..FramingConfig::default() }),
        ConfigError::NonAsciiFraming { field: "delimiter", value: 'é' }
    )]
    fn invalid_configs_are_rejected(#[case] config: AnalyzerConfig, #[case] expected: ConfigError) {
        assert_eq!(config.validate(), Err(expected));
    }

    #[test]
    fn derived_settings_follow_config() {
        let config = AnalyzerConfig::default()
            .max_bytes(128)
            .max_pending_requests(3)
            .transaction_timeout(Duration::from_millis(250));

        let parser = config.parser_config().expect("parser");
        assert_eq!(parser.max_bytes.map(std::num::NonZeroUsize::get), Some(128));
        assert_eq!(parser.framing.delimiter(), b'\n');

        let trans = config.transaction_config().expect("transactions");
        assert_eq!(trans.transaction_timeout, Duration::from_millis(250));
        assert_eq!(trans.max_pending_requests.get(), 3);
    }
}
