use serde::{Deserialize, Serialize};
use ssi::jwk::JWK;

use crate::core::presentation_submission::PresentationSubmission;

/// Claims of a self-issued `id_token`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    /// A DID, or the JWK thumbprint of `sub_jwk`.
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_jwk: Option<JWK>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Submission for presentations carried alongside the token.
    #[serde(
        rename = "_vp_token",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub vp_token: Option<IdTokenVpToken>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdTokenVpToken {
    pub presentation_submission: PresentationSubmission,
}
