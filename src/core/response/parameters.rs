use crate::core::object::TypedParameter;

use anyhow::{bail, Error};
use serde_json::Value as Json;

use super::presentation::VerifiablePresentationPayload;

macro_rules! string_parameter {
    ($(#[$meta:meta])* $name:ident, $key:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(pub String);

        impl TypedParameter for $name {
            const KEY: &'static str = $key;
        }

        impl TryFrom<Json> for $name {
            type Error = Error;

            fn try_from(value: Json) -> Result<Self, Self::Error> {
                Ok(Self(serde_json::from_value(value)?))
            }
        }

        impl From<$name> for Json {
            fn from(value: $name) -> Self {
                Json::String(value.0)
            }
        }
    };
}

string_parameter!(
    /// The signed self-issued identity token.
    IdToken,
    "id_token"
);
string_parameter!(State, "state");
string_parameter!(AccessToken, "access_token");
string_parameter!(TokenType, "token_type");
string_parameter!(RefreshToken, "refresh_token");

/// Lifetime of the access token in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiresIn(pub u64);

impl TypedParameter for ExpiresIn {
    const KEY: &'static str = "expires_in";
}

impl TryFrom<Json> for ExpiresIn {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        match value {
            // Form encoded responses carry numbers as strings.
            Json::String(s) => Ok(Self(s.parse()?)),
            value => Ok(Self(serde_json::from_value(value)?)),
        }
    }
}

impl From<ExpiresIn> for Json {
    fn from(value: ExpiresIn) -> Self {
        value.0.into()
    }
}

/// The `vp_token` response parameter.
///
/// > JSON String or JSON object that MUST contain a single Verifiable Presentation or
/// > an array of JSON Strings and JSON objects each of them containing a Verifiable Presentations.
///
/// See: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html#section-6.1-2.2>
#[derive(Debug, Clone, PartialEq)]
pub enum VpToken {
    Single(VerifiablePresentationPayload),
    Many(Vec<VerifiablePresentationPayload>),
}

impl VpToken {
    /// `None` for no presentations, a bare presentation for one, an array otherwise.
    pub fn from_presentations(
        mut presentations: Vec<VerifiablePresentationPayload>,
    ) -> Option<Self> {
        match presentations.len() {
            0 => None,
            1 => presentations.pop().map(Self::Single),
            _ => Some(Self::Many(presentations)),
        }
    }

    pub fn presentations(&self) -> Vec<&VerifiablePresentationPayload> {
        match self {
            Self::Single(p) => vec![p],
            Self::Many(ps) => ps.iter().collect(),
        }
    }
}

impl TypedParameter for VpToken {
    const KEY: &'static str = "vp_token";
}

impl TryFrom<Json> for VpToken {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        match value {
            // Form encoding turns a JSON object or array into its string form.
            Json::String(s) if s.starts_with('{') || s.starts_with('[') => {
                Self::try_from(serde_json::from_str::<Json>(&s)?)
            }
            Json::String(s) => Ok(Self::Single(VerifiablePresentationPayload::Compact(s))),
            Json::Object(map) => Ok(Self::Single(VerifiablePresentationPayload::Object(map))),
            Json::Array(arr) => arr
                .into_iter()
                .map(serde_json::from_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Many)
                .map_err(Into::into),
            _ => bail!("invalid vp_token"),
        }
    }
}

impl From<VpToken> for Json {
    fn from(value: VpToken) -> Self {
        fn to_json(p: VerifiablePresentationPayload) -> Json {
            match p {
                VerifiablePresentationPayload::Compact(s) => Json::String(s),
                VerifiablePresentationPayload::Object(map) => Json::Object(map),
            }
        }

        match value {
            VpToken::Single(p) => to_json(p),
            VpToken::Many(ps) => Json::Array(ps.into_iter().map(to_json).collect()),
        }
    }
}
