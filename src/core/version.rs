use std::{fmt, str::FromStr};

use anyhow::{bail, Error};
use serde::{Deserialize, Serialize};
use ssi::jwk::Algorithm;

use super::response::VpTokenLocation;

/// Self-issued `iss` value used by SIOPv2 drafts.
pub const SELF_ISSUED_V2: &str = "https://self-issued.me/v2";

/// Self-issued `iss` value mandated by the JWT VC Presentation Profile.
pub const SELF_ISSUED_V2_OPENID_VC: &str = "https://self-issued.me/v2/openid-vc";

/// JWS algorithms an `id_token` can be signed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    ES256,
    ES256K,
    EdDSA,
}

impl SigningAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ES256 => "ES256",
            Self::ES256K => "ES256K",
            Self::EdDSA => "EdDSA",
        }
    }
}

impl FromStr for SigningAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ES256" => Ok(Self::ES256),
            "ES256K" => Ok(Self::ES256K),
            "EdDSA" => Ok(Self::EdDSA),
            _ => bail!("unknown signing algorithm '{s}'"),
        }
    }
}

impl From<SigningAlgorithm> for Algorithm {
    fn from(value: SigningAlgorithm) -> Self {
        match value {
            SigningAlgorithm::ES256 => Algorithm::ES256,
            SigningAlgorithm::ES256K => Algorithm::ES256K,
            SigningAlgorithm::EdDSA => Algorithm::EdDSA,
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

/// Protocol version a response is built for or verified against.
///
/// Each version carries an explicit profile: the self-issued identifier it expects in `iss`,
/// the `id_token` signing algorithms it accepts, and where presentations are submitted by
/// default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SupportedVersion {
    #[serde(rename = "SIOPv2_ID1")]
    SiopV2Id1,
    #[default]
    #[serde(rename = "SIOPv2_D11")]
    SiopV2D11,
    #[serde(rename = "SIOPv2_D12_OID4VP_D18")]
    SiopV2D12Oid4vpD18,
    #[serde(rename = "JWT_VC_PRESENTATION_PROFILE_v1")]
    JwtVcPresentationProfileV1,
}

impl SupportedVersion {
    /// The `iss` value of a self-issued `id_token`.
    pub fn issuer(&self) -> &'static str {
        match self {
            Self::SiopV2Id1 | Self::SiopV2D11 | Self::SiopV2D12Oid4vpD18 => SELF_ISSUED_V2,
            Self::JwtVcPresentationProfileV1 => SELF_ISSUED_V2_OPENID_VC,
        }
    }

    /// Algorithms an `id_token` may be signed with under this version.
    pub fn signing_algorithms(&self) -> &'static [SigningAlgorithm] {
        match self {
            Self::SiopV2Id1 => &[SigningAlgorithm::ES256],
            Self::SiopV2D11 | Self::SiopV2D12Oid4vpD18 => &[
                SigningAlgorithm::ES256,
                SigningAlgorithm::ES256K,
                SigningAlgorithm::EdDSA,
            ],
            Self::JwtVcPresentationProfileV1 => {
                &[SigningAlgorithm::ES256K, SigningAlgorithm::EdDSA]
            }
        }
    }

    pub fn supports_algorithm(&self, alg: SigningAlgorithm) -> bool {
        self.signing_algorithms().contains(&alg)
    }

    /// Where presentations are submitted when a definition does not say otherwise.
    ///
    /// Early drafts and the presentation profile carry the submission inside the `id_token`
    /// (`_vp_token`), later drafts put it next to `vp_token` in the response body.
    pub fn default_vp_token_location(&self) -> VpTokenLocation {
        match self {
            Self::SiopV2Id1 | Self::JwtVcPresentationProfileV1 => VpTokenLocation::IdToken,
            Self::SiopV2D11 | Self::SiopV2D12Oid4vpD18 => VpTokenLocation::AuthorizationResponse,
        }
    }
}

impl fmt::Display for SupportedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SiopV2Id1 => "SIOPv2_ID1",
            Self::SiopV2D11 => "SIOPv2_D11",
            Self::SiopV2D12Oid4vpD18 => "SIOPv2_D12_OID4VP_D18",
            Self::JwtVcPresentationProfileV1 => "JWT_VC_PRESENTATION_PROFILE_v1",
        }
        .fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id1_only_accepts_es256() {
        let version = SupportedVersion::SiopV2Id1;
        assert!(version.supports_algorithm(SigningAlgorithm::ES256));
        assert!(!version.supports_algorithm(SigningAlgorithm::EdDSA));
        assert_eq!(version.issuer(), SELF_ISSUED_V2);
    }

    #[test]
    fn presentation_profile_uses_openid_vc_issuer() {
        let version: SupportedVersion =
            serde_json::from_str(r#""JWT_VC_PRESENTATION_PROFILE_v1""#).unwrap();
        assert_eq!(version.issuer(), SELF_ISSUED_V2_OPENID_VC);
        assert!(!version.supports_algorithm(SigningAlgorithm::ES256));
        assert_eq!(version.default_vp_token_location(), VpTokenLocation::IdToken);
    }

    #[test]
    fn algorithm_names() {
        assert_eq!("EdDSA".parse::<SigningAlgorithm>().unwrap(), SigningAlgorithm::EdDSA);
        assert!("HS256".parse::<SigningAlgorithm>().is_err());
        assert_eq!(
            serde_json::to_value(SigningAlgorithm::ES256K).unwrap(),
            serde_json::json!("ES256K")
        );
    }
}
