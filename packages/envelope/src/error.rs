//! Protocol errors.
//!
//! Every variant here is fatal: both ends of the bridge are generated from
//! the same schema, so a mismatch means build or version skew rather than a
//! runtime condition to recover from. Recoverable failures (blob misses,
//! image decode errors) never become a `ProtocolError`; they travel back to
//! the worker as ordinary response envelopes.

use thiserror::Error;

/// A violation of the host/worker message protocol.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    /// The envelope's category is not part of the schema.
    #[error("unknown category: {0:?}")]
    UnknownCategory(String),

    /// The category is known but the operation is not valid for it.
    #[error("unknown operation {operation:?} for category {category}")]
    UnknownOperation {
        category: &'static str,
        operation: Option<String>,
    },

    /// A required payload field (or the envelope id) is absent.
    #[error("{category} envelope is missing field {field}")]
    MissingField {
        category: &'static str,
        field: &'static str,
    },

    /// A payload field has the wrong type.
    #[error("{category} envelope field {field} must be {expected}")]
    InvalidField {
        category: &'static str,
        field: &'static str,
        expected: &'static str,
    },

    /// The category is valid, but never travels in this direction.
    #[error("{category} envelopes are not accepted in this direction")]
    WrongDirection { category: &'static str },

    /// A custom message arrived but the host never registered a handler.
    #[error("custom message received but no custom message handler is registered")]
    MissingCustomHandler,

    /// A graphics command arrived before a graphics context was acquired.
    #[error("graphics command received before a graphics context was acquired")]
    MissingGraphicsContext,

    /// `set-property` named an object the host does not expose.
    #[error("unknown drawing object: {0}")]
    UnknownObject(String),

    /// `set-property` named a pair outside the allow-list.
    #[error("property {object}.{property} is not settable")]
    PropertyNotAllowed { object: String, property: String },

    /// The bytes on the wire could not be decoded into an envelope.
    #[error("malformed envelope: {0}")]
    Malformed(String),
}

impl ProtocolError {
    pub(crate) fn missing(category: &'static str, field: &'static str) -> Self {
        ProtocolError::MissingField { category, field }
    }

    pub(crate) fn invalid(
        category: &'static str,
        field: &'static str,
        expected: &'static str,
    ) -> Self {
        ProtocolError::InvalidField {
            category,
            field,
            expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_category_display() {
        let e = ProtocolError::UnknownCategory("bogus".to_string());
        assert_eq!(format!("{}", e), "unknown category: \"bogus\"");
    }

    #[test]
    fn unknown_operation_display() {
        let e = ProtocolError::UnknownOperation {
            category: "canvas",
            operation: Some("explode".to_string()),
        };
        let display = format!("{}", e);
        assert!(display.contains("canvas"));
        assert!(display.contains("explode"));
    }

    #[test]
    fn field_errors_name_the_field() {
        let e = ProtocolError::missing("tick", "id");
        assert_eq!(format!("{}", e), "tick envelope is missing field id");

        let e = ProtocolError::invalid("canvas", "width", "a non-negative integer");
        assert!(format!("{}", e).contains("non-negative integer"));
    }
}
