//! Message origins and the trust policy applied to inbound envelopes.
//!
//! Origin format: `scheme://host[:port]`
//!
//! A mini app embedded in a frame can receive messages from anything able to
//! post into its context. Only envelopes whose sender origin matches the
//! configured host are [`Trust::Trusted`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// A web origin in the form `scheme://host[:port]`.
///
/// Parsing goes through the WHATWG URL rules, so hosts are lowercased and
/// a port equal to the scheme's default is dropped: `https://a.example:443`
/// and `https://A.example/` are the same origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Origin {
    serialized: String,
    scheme: String,
    host: String,
    port: u16,
}

impl Origin {
    /// Origin of an already-parsed URL. Path, query and fragment are ignored.
    pub fn from_url(url: &Url) -> Result<Self, OriginParseError> {
        if !url.username().is_empty() || url.password().is_some() {
            let host = url.host_str().unwrap_or_default().to_string();
            return Err(OriginParseError::HasUserinfo(host));
        }
        let origin = url.origin();
        let serialized = origin.ascii_serialization();
        let url::Origin::Tuple(scheme, host, port) = origin else {
            return Err(OriginParseError::Opaque(url.to_string()));
        };
        Ok(Self {
            serialized,
            scheme,
            host: host.to_string(),
            port,
        })
    }

    /// The scheme (e.g., "https").
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The host name or address. IPv6 addresses keep their brackets.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Effective port, with the scheme default filled in.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialized)
    }
}

impl FromStr for Origin {
    type Err = OriginParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s).map_err(|e| match e {
            url::ParseError::RelativeUrlWithoutBase => {
                OriginParseError::MissingScheme(s.to_string())
            }
            url::ParseError::EmptyHost => OriginParseError::EmptyHost,
            url::ParseError::InvalidPort => OriginParseError::BadPort(s.to_string()),
            reason => OriginParseError::Invalid {
                input: s.to_string(),
                reason,
            },
        })?;

        let origin = Self::from_url(&url)?;
        if !matches!(url.path(), "" | "/") || url.query().is_some() || url.fragment().is_some() {
            return Err(OriginParseError::HasPath(s.to_string()));
        }
        Ok(origin)
    }
}

impl TryFrom<String> for Origin {
    type Error = OriginParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Origin> for String {
    fn from(origin: Origin) -> Self {
        origin.serialized
    }
}

/// Error parsing an origin string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OriginParseError {
    #[error("origin must look like scheme://host[:port], got: {0}")]
    MissingScheme(String),
    #[error("invalid origin {input}: {reason}")]
    Invalid {
        input: String,
        #[source]
        reason: url::ParseError,
    },
    #[error("origin cannot contain a path, query or fragment: {0}")]
    HasPath(String),
    #[error("origin for {0} cannot carry user credentials")]
    HasUserinfo(String),
    #[error("scheme has no network origin: {0}")]
    Opaque(String),
    #[error("origin port is not a number: {0}")]
    BadPort(String),
    #[error("origin host cannot be empty")]
    EmptyHost,
}

/// Where an outbound envelope may be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOrigin {
    /// `*`: any embedding context. Anyone framing the app sees the request.
    Any,
    /// Only deliver to this origin.
    Exact(Origin),
}

impl fmt::Display for TargetOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetOrigin::Any => f.write_str("*"),
            TargetOrigin::Exact(origin) => origin.fmt(f),
        }
    }
}

/// Which senders may deliver credentials.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OriginPolicy {
    /// Accept envelopes from any sender.
    #[default]
    AllowAny,
    /// Accept only envelopes from one of these origins.
    Expect(Vec<Origin>),
}

impl OriginPolicy {
    /// Build a policy from a list of expected hosts; empty means `AllowAny`.
    pub fn from_expected(origins: Vec<Origin>) -> Self {
        if origins.is_empty() {
            Self::AllowAny
        } else {
            Self::Expect(origins)
        }
    }

    /// Whether this policy lets any sender through.
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, OriginPolicy::AllowAny)
    }

    /// Tag `value` with the trust level of its sender.
    pub fn classify<T>(&self, sender: Option<&Origin>, value: T) -> Trust<T> {
        match self {
            OriginPolicy::AllowAny => Trust::Trusted(value),
            OriginPolicy::Expect(expected) => match sender {
                Some(origin) if expected.contains(origin) => Trust::Trusted(value),
                _ => Trust::Untrusted {
                    origin: sender.cloned(),
                },
            },
        }
    }

    /// Target for outbound requests.
    pub fn target(&self) -> TargetOrigin {
        match self {
            OriginPolicy::Expect(expected) => expected
                .first()
                .cloned()
                .map(TargetOrigin::Exact)
                .unwrap_or(TargetOrigin::Any),
            OriginPolicy::AllowAny => TargetOrigin::Any,
        }
    }
}

/// A value tagged with whether its sender passed the origin policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trust<T> {
    Trusted(T),
    /// Discarded; the value is dropped so it cannot be used by accident.
    Untrusted { origin: Option<Origin> },
}
