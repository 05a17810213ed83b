//! Cross-context message envelopes.
//!
//! Every message exchanged with the host is a JSON object carrying a string
//! `type` discriminant plus payload fields:
//!
//! ```json
//! { "type": "REQUEST_TOKEN" }
//! { "type": "AUTH_TOKEN", "token": "..." }
//! ```
//!
//! Unknown discriminants decode to [`Envelope::Unrecognized`] so the protocol
//! can grow without breaking older mini apps.

use serde::{Deserialize, Serialize};

/// A decoded envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Envelope {
    /// Mini app -> host: please send the current user's credential.
    RequestToken,
    /// Host -> mini app: credential delivery.
    AuthToken { token: String },
    /// Any other discriminant. Never sent, ignored on receipt.
    #[serde(other)]
    Unrecognized,
}

impl Envelope {
    /// Decode an already-parsed JSON value.
    pub fn decode(value: &serde_json::Value) -> Result<Self, EnvelopeError> {
        let object = value.as_object().ok_or(EnvelopeError::NotAnObject)?;
        match object.get("type") {
            Some(serde_json::Value::String(_)) => {}
            Some(_) => return Err(EnvelopeError::BadDiscriminant),
            None => return Err(EnvelopeError::MissingDiscriminant),
        }
        Envelope::deserialize(value).map_err(EnvelopeError::Malformed)
    }

    /// Decode from JSON text.
    pub fn from_json(text: &str) -> Result<Self, EnvelopeError> {
        let value: serde_json::Value = serde_json::from_str(text).map_err(EnvelopeError::Json)?;
        Self::decode(&value)
    }

    /// Encode to a JSON value for posting.
    pub fn to_value(&self) -> Result<serde_json::Value, EnvelopeError> {
        serde_json::to_value(self).map_err(EnvelopeError::Malformed)
    }

    /// Discriminant name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::RequestToken => "REQUEST_TOKEN",
            Envelope::AuthToken { .. } => "AUTH_TOKEN",
            Envelope::Unrecognized => "unrecognized",
        }
    }
}

/// Reasons an inbound payload is not a usable envelope.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("envelope is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),
    #[error("envelope must be a JSON object")]
    NotAnObject,
    #[error("envelope has no `type` discriminant")]
    MissingDiscriminant,
    #[error("envelope `type` must be a string")]
    BadDiscriminant,
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_auth_token() {
        let env = Envelope::decode(&json!({"type": "AUTH_TOKEN", "token": "abc123"})).unwrap();
        assert_eq!(
            env,
            Envelope::AuthToken {
                token: "abc123".into()
            }
        );
    }

    #[test]
    fn extra_fields_are_tolerated() {
        let env = Envelope::from_json(r#"{"type":"AUTH_TOKEN","token":"t","expires":3600}"#).unwrap();
        assert_eq!(env.kind(), "AUTH_TOKEN");
    }

    #[test]
    fn unknown_discriminant_is_unrecognized() {
        let env = Envelope::decode(&json!({"type": "PING", "seq": 4})).unwrap();
        assert_eq!(env, Envelope::Unrecognized);
    }

    #[test]
    fn auth_token_without_token_is_malformed() {
        let err = Envelope::decode(&json!({"type": "AUTH_TOKEN"})).unwrap_err();
        assert!(matches!(err, EnvelopeError::Malformed(_)));

        let err = Envelope::decode(&json!({"type": "AUTH_TOKEN", "token": 42})).unwrap_err();
        assert!(matches!(err, EnvelopeError::Malformed(_)));
    }

    #[test]
    fn discriminant_must_be_a_string() {
        assert!(matches!(
            Envelope::decode(&json!({"token": "x"})),
            Err(EnvelopeError::MissingDiscriminant)
        ));
        assert!(matches!(
            Envelope::decode(&json!({"type": 0})),
            Err(EnvelopeError::BadDiscriminant)
        ));
        assert!(matches!(
            Envelope::decode(&json!("AUTH_TOKEN")),
            Err(EnvelopeError::NotAnObject)
        ));
        assert!(matches!(
            Envelope::from_json("{not json"),
            Err(EnvelopeError::Json(_))
        ));
    }

    #[test]
    fn request_token_wire_form() {
        let value = Envelope::RequestToken.to_value().unwrap();
        assert_eq!(value, json!({"type": "REQUEST_TOKEN"}));
    }
}
