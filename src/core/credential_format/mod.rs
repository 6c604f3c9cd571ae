use core::fmt;
use std::{borrow::Cow, collections::HashMap, str::FromStr};

use serde::{Deserialize, Serialize};

const FORMAT_JWT: &str = "jwt";
const FORMAT_JWT_VC: &str = "jwt_vc";
const FORMAT_JWT_VP: &str = "jwt_vp";
const FORMAT_JWT_VC_JSON: &str = "jwt_vc_json";
const FORMAT_JWT_VP_JSON: &str = "jwt_vp_json";
const FORMAT_LDP: &str = "ldp";
const FORMAT_LDP_VC: &str = "ldp_vc";
const FORMAT_LDP_VP: &str = "ldp_vp";

/// A Json object of claim formats.
pub type ClaimFormatMap = HashMap<ClaimFormatDesignation, ClaimFormatPayload>;

/// Claim format payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClaimFormatPayload {
    #[serde(rename = "alg")]
    Alg(Vec<String>),
    #[serde(rename = "proof_type")]
    ProofType(Vec<String>),
    #[serde(untagged)]
    Other(serde_json::Value),
}

/// The claim format designation type is used in presentation definitions and descriptor
/// maps to specify the format of a claim.
///
/// Registry of claim format type: https://identity.foundation/claim-format-registry/#registry
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClaimFormatDesignation {
    /// A JSON Web Token (JWT) as defined by RFC7519, submitted as a JWT encoded string.
    Jwt,

    /// A W3C Verifiable Credential secured as a JWT.
    JwtVc,

    /// A W3C Verifiable Presentation secured as a JWT.
    JwtVp,

    JwtVcJson,

    JwtVpJson,

    /// A Linked-Data Proof submitted as an object.
    Ldp,

    /// A W3C Verifiable Credential secured with a Linked Data Proof.
    LdpVc,

    /// A W3C Verifiable Presentation secured with a Linked Data Proof.
    LdpVp,

    /// Other claim format designations not covered by the above.
    Other(String),
}

impl ClaimFormatDesignation {
    pub fn from_name(name: Cow<str>) -> Self {
        match name.as_ref() {
            FORMAT_JWT => Self::Jwt,
            FORMAT_JWT_VC => Self::JwtVc,
            FORMAT_JWT_VP => Self::JwtVp,
            FORMAT_JWT_VC_JSON => Self::JwtVcJson,
            FORMAT_JWT_VP_JSON => Self::JwtVpJson,
            FORMAT_LDP => Self::Ldp,
            FORMAT_LDP_VC => Self::LdpVc,
            FORMAT_LDP_VP => Self::LdpVp,
            _ => Self::Other(name.into_owned()),
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Jwt => FORMAT_JWT,
            Self::JwtVc => FORMAT_JWT_VC,
            Self::JwtVp => FORMAT_JWT_VP,
            Self::JwtVcJson => FORMAT_JWT_VC_JSON,
            Self::JwtVpJson => FORMAT_JWT_VP_JSON,
            Self::Ldp => FORMAT_LDP,
            Self::LdpVc => FORMAT_LDP_VC,
            Self::LdpVp => FORMAT_LDP_VP,
            Self::Other(other) => other,
        }
    }

    /// Whether claims of this format are JWT encoded strings.
    pub fn is_jwt(&self) -> bool {
        matches!(
            self,
            Self::Jwt | Self::JwtVc | Self::JwtVp | Self::JwtVcJson | Self::JwtVpJson
        )
    }

    /// Whether claims of this format are JSON objects secured with a Linked Data Proof.
    pub fn is_ldp(&self) -> bool {
        matches!(self, Self::Ldp | Self::LdpVc | Self::LdpVp)
    }

    /// Whether a presentation of the `presented` format is acceptable where `self` is requested.
    ///
    /// The generic `jwt`/`ldp` designations accept any format of their family, and the
    /// `_json` variants are treated as aliases of the plain ones.
    pub fn accepts(&self, presented: &ClaimFormatDesignation) -> bool {
        match (self, presented) {
            (Self::Jwt, p) => p.is_jwt(),
            (Self::Ldp, p) => p.is_ldp(),
            (Self::JwtVp | Self::JwtVpJson, Self::JwtVp | Self::JwtVpJson) => true,
            (Self::JwtVc | Self::JwtVcJson, Self::JwtVc | Self::JwtVcJson) => true,
            (requested, presented) => requested == presented,
        }
    }
}

impl From<&str> for ClaimFormatDesignation {
    fn from(s: &str) -> Self {
        Self::from_name(Cow::Borrowed(s))
    }
}

impl From<String> for ClaimFormatDesignation {
    fn from(value: String) -> Self {
        Self::from_name(Cow::Owned(value))
    }
}

impl FromStr for ClaimFormatDesignation {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.into())
    }
}

impl From<ClaimFormatDesignation> for String {
    fn from(format: ClaimFormatDesignation) -> Self {
        format.name().to_owned()
    }
}

impl fmt::Display for ClaimFormatDesignation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name().fmt(f)
    }
}

impl Serialize for ClaimFormatDesignation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.name().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ClaimFormatDesignation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Into::into)
    }
}
