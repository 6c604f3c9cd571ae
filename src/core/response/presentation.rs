use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use super::VpTokenLocation;
use crate::core::{
    credential_format::ClaimFormatDesignation, jwt, presentation_submission::DescriptorMap,
};

/// A verifiable presentation as it appears in `vp_token`.
///
/// JWT presentations are compact strings; Linked Data presentations are JSON objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VerifiablePresentationPayload {
    Compact(String),
    Object(Map<String, Json>),
}

/// A credential found inside a presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct PresentedCredential {
    /// JSONPath of the credential, relative to the presentation.
    pub path: String,
    pub format: ClaimFormatDesignation,
    /// The credential claims; JWT credentials are decoded.
    pub claims: Json,
}

impl VerifiablePresentationPayload {
    pub fn format(&self) -> ClaimFormatDesignation {
        match self {
            Self::Compact(_) => ClaimFormatDesignation::JwtVp,
            Self::Object(_) => ClaimFormatDesignation::LdpVp,
        }
    }

    /// The presentation as JSON: the JWT claims for compact presentations.
    pub fn decoded_json(&self) -> Result<Json> {
        match self {
            Self::Compact(token) => {
                let (_, claims) =
                    jwt::decode_unverified(token).context("invalid JWT presentation")?;
                Ok(Json::Object(claims))
            }
            Self::Object(map) => Ok(Json::Object(map.clone())),
        }
    }

    /// Enumerate the credentials of the presentation.
    ///
    /// JWT presentations carry them in `vp.verifiableCredential`, Linked Data presentations
    /// in `verifiableCredential`. A single credential may be given without an array.
    pub fn credentials(&self) -> Result<Vec<PresentedCredential>> {
        let decoded = self.decoded_json()?;
        let (base, container) = match self {
            Self::Compact(_) => ("$.vp.verifiableCredential", decoded.get("vp")),
            Self::Object(_) => ("$.verifiableCredential", Some(&decoded)),
        };

        let Some(entries) = container.and_then(|c| c.get("verifiableCredential")) else {
            return Ok(Vec::new());
        };

        match entries {
            Json::Array(entries) => entries
                .iter()
                .enumerate()
                .map(|(k, entry)| decode_credential(format!("{base}[{k}]"), entry))
                .collect(),
            entry => Ok(vec![decode_credential(base.to_owned(), entry)?]),
        }
    }

    /// Whether any credential of the presentation carries a `credentialStatus`.
    pub fn has_credential_status(&self) -> bool {
        self.credentials()
            .map(|credentials| {
                credentials.iter().any(|c| {
                    c.claims.get("credentialStatus").is_some()
                        || c.claims
                            .get("vc")
                            .and_then(|vc| vc.get("credentialStatus"))
                            .is_some()
                })
            })
            .unwrap_or(false)
    }
}

fn decode_credential(path: String, entry: &Json) -> Result<PresentedCredential> {
    match entry {
        Json::String(token) => {
            let (_, claims) = jwt::decode_unverified(token)
                .with_context(|| format!("invalid JWT credential at {path}"))?;
            Ok(PresentedCredential {
                path,
                format: ClaimFormatDesignation::JwtVc,
                claims: Json::Object(claims),
            })
        }
        other => Ok(PresentedCredential {
            path,
            format: ClaimFormatDesignation::LdpVc,
            claims: other.clone(),
        }),
    }
}

impl From<String> for VerifiablePresentationPayload {
    fn from(value: String) -> Self {
        Self::Compact(value)
    }
}

impl From<Map<String, Json>> for VerifiablePresentationPayload {
    fn from(value: Map<String, Json>) -> Self {
        Self::Object(value)
    }
}

/// Accessors shared by presentations on the build and verification paths.
pub trait LocatedPresentation {
    fn presentation(&self) -> &VerifiablePresentationPayload;
    fn location(&self) -> VpTokenLocation;
}

/// A presentation supplied to the response builder.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiablePresentationWithLocation {
    presentation: VerifiablePresentationPayload,
    location: VpTokenLocation,
    format: ClaimFormatDesignation,
}

impl VerifiablePresentationWithLocation {
    pub fn new(presentation: VerifiablePresentationPayload, location: VpTokenLocation) -> Self {
        let format = presentation.format();
        Self {
            presentation,
            location,
            format,
        }
    }

    pub fn format(&self) -> &ClaimFormatDesignation {
        &self.format
    }
}

impl LocatedPresentation for VerifiablePresentationWithLocation {
    fn presentation(&self) -> &VerifiablePresentationPayload {
        &self.presentation
    }

    fn location(&self) -> VpTokenLocation {
        self.location
    }
}

/// A presentation extracted from a response, with the descriptor that located it.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiablePresentationWithSubmissionData {
    presentation: VerifiablePresentationPayload,
    format: ClaimFormatDesignation,
    location: VpTokenLocation,
    submission_data: DescriptorMap,
}

impl VerifiablePresentationWithSubmissionData {
    pub fn new(
        presentation: VerifiablePresentationPayload,
        location: VpTokenLocation,
        submission_data: DescriptorMap,
    ) -> Self {
        Self {
            format: submission_data.format.clone(),
            presentation,
            location,
            submission_data,
        }
    }

    pub fn format(&self) -> &ClaimFormatDesignation {
        &self.format
    }

    pub fn descriptor(&self) -> &DescriptorMap {
        &self.submission_data
    }
}

impl LocatedPresentation for VerifiablePresentationWithSubmissionData {
    fn presentation(&self) -> &VerifiablePresentationPayload {
        &self.presentation
    }

    fn location(&self) -> VpTokenLocation {
        self.location
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn ldp_presentation_credentials() {
        let vp: VerifiablePresentationPayload = serde_json::from_value(json!({
            "type": ["VerifiablePresentation"],
            "verifiableCredential": [
                { "type": ["VerifiableCredential"], "credentialStatus": { "id": "urn:status:1" } },
                { "type": ["VerifiableCredential"] }
            ]
        }))
        .unwrap();

        assert_eq!(vp.format(), ClaimFormatDesignation::LdpVp);
        let credentials = vp.credentials().unwrap();
        assert_eq!(credentials.len(), 2);
        assert_eq!(credentials[1].path, "$.verifiableCredential[1]");
        assert_eq!(credentials[0].format, ClaimFormatDesignation::LdpVc);
        assert!(vp.has_credential_status());
    }

    #[test]
    fn compact_presentation_with_single_credential() {
        // {"alg":"none"} . {"vp":{"verifiableCredential":{"type":"X"}}}
        let token = concat!(
            "eyJhbGciOiJub25lIn0.",
            "eyJ2cCI6eyJ2ZXJpZmlhYmxlQ3JlZGVudGlhbCI6eyJ0eXBlIjoiWCJ9fX0."
        );
        let vp: VerifiablePresentationPayload = serde_json::from_value(json!(token)).unwrap();

        assert_eq!(vp.format(), ClaimFormatDesignation::JwtVp);
        let credentials = vp.credentials().unwrap();
        assert_eq!(credentials.len(), 1);
        assert_eq!(credentials[0].path, "$.vp.verifiableCredential");
        assert_eq!(credentials[0].claims, json!({ "type": "X" }));
        assert!(!vp.has_credential_status());
    }
}
