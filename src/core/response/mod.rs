use std::fmt;

use anyhow::{Context, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use self::parameters::{IdToken, State, VpToken};
use super::{
    object::{TypedParameter, UntypedObject},
    presentation_submission::PresentationSubmission,
};

pub mod id_token;
pub mod parameters;
pub mod presentation;

/// The envelope a verifiable presentation is submitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VpTokenLocation {
    /// The `vp_token` parameter of the authorization response.
    AuthorizationResponse,
    /// The `vp_token` parameter, described by the `_vp_token` claim of the `id_token`.
    IdToken,
    /// The response of the token endpoint.
    TokenResponse,
}

impl fmt::Display for VpTokenLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthorizationResponse => "authorization_response",
            Self::IdToken => "id_token",
            Self::TokenResponse => "token_response",
        }
        .fmt(f)
    }
}

/// The parameters of an authorization response.
///
/// Known parameters are read and written through their [TypedParameter]; anything else is
/// kept as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorizationResponsePayload(UntypedObject);

impl AuthorizationResponsePayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any previous value.
    pub fn with<T: TypedParameter>(mut self, t: T) -> Self {
        self.0.insert(t);
        self
    }

    pub fn get<T: TypedParameter>(&self) -> Option<Result<T>> {
        self.0.get()
    }

    pub fn id_token(&self) -> Option<Result<IdToken>> {
        self.get()
    }

    pub fn state(&self) -> Option<Result<State>> {
        self.get()
    }

    pub fn vp_token(&self) -> Option<Result<VpToken>> {
        self.get()
    }

    pub fn presentation_submission(&self) -> Option<Result<PresentationSubmission>> {
        self.get()
    }

    /// Raw access to all parameters.
    pub fn as_map(&self) -> &Map<String, Json> {
        self.0.as_map()
    }

    pub fn as_json(&self) -> Json {
        self.0.clone().into()
    }

    /// `application/x-www-form-urlencoded` serialization.
    ///
    /// Values that are not strings are sent as their JSON text.
    pub fn as_query(&self) -> Result<String, Error> {
        let pairs = self
            .0
            .as_map()
            .iter()
            .map(|(k, v)| match v {
                Json::String(s) => Ok((k.as_str(), s.clone())),
                v => serde_json::to_string(v).map(|s| (k.as_str(), s)),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(serde_urlencoded::to_string(pairs)?)
    }

    /// Parse a form encoded response. Values are kept as strings; typed parameters decode
    /// their JSON text on access.
    pub fn from_query(query: &str) -> Result<Self> {
        let pairs: Vec<(String, String)> =
            serde_urlencoded::from_str(query).context("invalid form encoded response")?;
        Ok(Self(UntypedObject::from(
            pairs
                .into_iter()
                .map(|(k, v)| (k, Json::String(v)))
                .collect::<Map<_, _>>(),
        )))
    }
}

impl From<Map<String, Json>> for AuthorizationResponsePayload {
    fn from(value: Map<String, Json>) -> Self {
        Self(value.into())
    }
}

impl TryFrom<Json> for AuthorizationResponsePayload {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        match value {
            Json::Object(map) => Ok(map.into()),
            _ => anyhow::bail!("authorization response must be a JSON object"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parameters::{AccessToken, ExpiresIn};
    use super::*;

    use crate::core::object::ParsingErrorContext;
    use serde_json::json;

    #[test]
    fn form_round_trip() {
        let payload = AuthorizationResponsePayload::new()
            .with(IdToken("h.c.s".into()))
            .with(State("xyz".into()))
            .with(AccessToken("at".into()))
            .with(ExpiresIn(3600))
            .with(VpToken::Many(vec![
                "a.b.c".to_string().into(),
                "d.e.f".to_string().into(),
            ]));

        let query = payload.as_query().unwrap();
        assert!(query.contains("state=xyz"));
        assert!(query.contains("expires_in=3600"));

        let parsed = AuthorizationResponsePayload::from_query(&query).unwrap();
        assert_eq!(parsed.id_token().parsing_error().unwrap().0, "h.c.s");
        assert_eq!(parsed.get::<ExpiresIn>().parsing_error().unwrap(), ExpiresIn(3600));
        assert_eq!(parsed.vp_token().parsing_error().unwrap().presentations().len(), 2);
    }

    #[test]
    fn unknown_parameters_are_kept() {
        let payload = AuthorizationResponsePayload::try_from(json!({
            "state": "s",
            "custom": { "a": 1 }
        }))
        .unwrap();

        assert_eq!(payload.as_json(), json!({ "state": "s", "custom": { "a": 1 } }));
        assert!(payload.id_token().is_none());
    }

    #[test]
    fn location_names() {
        assert_eq!(
            serde_json::to_value(VpTokenLocation::TokenResponse).unwrap(),
            json!("token_response")
        );
        assert_eq!(VpTokenLocation::IdToken.to_string(), "id_token");
    }
}
