//! Pluggable framing rules.
//!
//! A [`Framing`] tells the parser where a unit ends and how to interpret its
//! leading bytes. [`MarkerFraming`] implements the line-oriented reference
//! rule: units end at a delimiter byte and a leading marker byte selects the
//! request role.

use std::fmt;

use crate::message::Role;

/// Interpretation of a framed unit body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classification {
    /// Role assigned to the unit.
    pub role: Role,
    /// Whether the leading bytes violated the framing rule.
    pub failed: bool,
    /// Number of leading body bytes that belong to the framing and are
    /// excluded from the message content.
    pub skip: usize,
    /// Diagnostic attached to the message, if any.
    pub note: Option<String>,
}

/// Framing rule for one wire protocol.
pub trait Framing: fmt::Debug + Send + Sync + 'static {
    /// Byte terminating every unit.
    fn delimiter(&self) -> u8;

    /// Classify a unit body (delimiter already removed).
    ///
    /// `skip` must not exceed `body.len()`.
    fn classify(&self, body: &[u8]) -> Classification;
}

/// Reference line framing keyed on a leading marker byte.
///
/// A body whose first byte equals the request marker is a request; the
/// marker and one optional separator byte are stripped. Anything else is a
/// failed response with its first byte stripped, unless a response marker
/// is configured and matches, in which case the response is well formed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarkerFraming {
    delimiter: u8,
    request_marker: u8,
    separator: Option<u8>,
    response_marker: Option<u8>,
}

impl Default for MarkerFraming {
    fn default() -> Self {
        Self {
            delimiter: b'\n',
            request_marker: b'>',
            separator: Some(b' '),
            response_marker: None,
        }
    }
}

impl MarkerFraming {
    /// Build a framing rule from its parts.
    #[must_use]
    pub const fn new(
        delimiter: u8,
        request_marker: u8,
        separator: Option<u8>,
        response_marker: Option<u8>,
    ) -> Self {
        Self {
            delimiter,
            request_marker,
            separator,
            response_marker,
        }
    }

    /// Accept `marker` as the leading byte of a well-formed response.
    #[must_use]
    pub const fn with_response_marker(mut self, marker: u8) -> Self {
        self.response_marker = Some(marker);
        self
    }

    fn marker_len(&self, body: &[u8]) -> usize {
        match (self.separator, body.get(1)) {
            (Some(sep), Some(&next)) if next == sep => 2,
            _ => 1,
        }
    }
}

impl Framing for MarkerFraming {
    fn delimiter(&self) -> u8 { self.delimiter }

    fn classify(&self, body: &[u8]) -> Classification {
        match body.first() {
            Some(&lead) if lead == self.request_marker => Classification {
                role: Role::Request,
                failed: false,
                skip: self.marker_len(body),
                note: None,
            },
            Some(&lead) if Some(lead) == self.response_marker => Classification {
                role: Role::Response,
                failed: false,
                skip: self.marker_len(body),
                note: None,
            },
            Some(&lead) => Classification {
                role: Role::Response,
                failed: true,
                skip: 1,
                note: Some(format!("malformed framing: unexpected leading byte {lead:#04x}")),
            },
            None => Classification {
                role: Role::Response,
                failed: true,
                skip: 0,
                note: Some("malformed framing: empty unit".to_owned()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{Framing, MarkerFraming};
    use crate::message::Role;

    #[rstest]
    #[case(b"> hello", Role::Request, false, 2)]
    #[case(b">hello", Role::Request, false, 1)]
    #[case(b">", Role::Request, false, 1)]
    #[case(b"> ", Role::Request, false, 2)]
    #[case(b"not-a-marker", Role::Response, true, 1)]
    #[case(b"< reply", Role::Response, true, 1)]
    #[case(b"", Role::Response, true, 0)]
    fn reference_rule(
        #[case] body: &[u8],
        #[case] role: Role,
        #[case] failed: bool,
        #[case] skip: usize,
    ) {
        let class = MarkerFraming::default().classify(body);
        assert_eq!(class.role, role);
        assert_eq!(class.failed, failed);
        assert_eq!(class.skip, skip);
        assert_eq!(class.note.is_some(), failed);
    }

    #[test]
    fn response_marker_yields_clean_response() {
        let framing = MarkerFraming::default().with_response_marker(b'<');
        let class = framing.classify(b"< reply");
        assert_eq!(class.role, Role::Response);
        assert!(!class.failed);
        assert_eq!(class.skip, 2);
        assert!(class.note.is_none());
    }

    #[test]
    fn malformed_note_names_leading_byte() {
        let class = MarkerFraming::default().classify(b"!oops");
        assert_eq!(
            class.note.as_deref(),
            Some("malformed framing: unexpected leading byte 0x21")
        );
    }
}
