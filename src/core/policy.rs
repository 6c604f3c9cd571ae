//! Revocation and linked-domain policies.
//!
//! Both follow the same rule: `Never` passes, `IfPresent` evaluates only when the response
//! carries evidence for the check, `Always` evaluates unconditionally. An evaluation that
//! must run without a configured callback is a configuration error.

use std::{fmt, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    did::{DidDocument, LINKED_DOMAINS},
    response::presentation::{LocatedPresentation, VerifiablePresentationWithSubmissionData},
};
use crate::error::ResponseError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationVerification {
    Never,
    #[default]
    IfPresent,
    Always,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckLinkedDomain {
    Never,
    #[default]
    IfPresent,
    Always,
}

/// Whether a tri-state policy requires an evaluation given the available evidence.
trait PolicyMode {
    fn requires_check(&self, evidence: bool) -> bool;
}

impl PolicyMode for RevocationVerification {
    fn requires_check(&self, evidence: bool) -> bool {
        match self {
            Self::Never => false,
            Self::IfPresent => evidence,
            Self::Always => true,
        }
    }
}

impl PolicyMode for CheckLinkedDomain {
    fn requires_check(&self, evidence: bool) -> bool {
        match self {
            Self::Never => false,
            Self::IfPresent => evidence,
            Self::Always => true,
        }
    }
}

impl fmt::Display for RevocationVerification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => "never",
            Self::IfPresent => "if_present",
            Self::Always => "always",
        }
        .fmt(f)
    }
}

impl fmt::Display for CheckLinkedDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => "never",
            Self::IfPresent => "if_present",
            Self::Always => "always",
        }
        .fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationStatus {
    Valid,
    Invalid,
}

/// Checks the credentials of a presentation against their status lists.
#[async_trait]
pub trait RevocationVerifier: std::fmt::Debug {
    async fn verify_revocation(
        &self,
        presentation: &VerifiablePresentationWithSubmissionData,
    ) -> Result<RevocationStatus>;
}

/// Checks the domain linkage of a DID.
#[async_trait]
pub trait LinkedDomainVerifier: std::fmt::Debug {
    /// `true` when the DID is linked to the domains its document claims.
    async fn verify_linked_domain(&self, did: &str, document: &DidDocument) -> Result<bool>;
}

#[derive(Debug, Clone, Default)]
pub struct RevocationPolicy {
    pub mode: RevocationVerification,
    pub verifier: Option<Arc<dyn RevocationVerifier + Send + Sync>>,
}

impl RevocationPolicy {
    /// Check each presentation in turn; the first failure rejects.
    pub async fn check(
        &self,
        presentations: &[VerifiablePresentationWithSubmissionData],
    ) -> Result<(), ResponseError> {
        if self.mode == RevocationVerification::Always && self.verifier.is_none() {
            return Err(ResponseError::RevocationPolicyMisconfigured(self.mode));
        }

        for presentation in presentations {
            let evidence = presentation.presentation().has_credential_status();
            if !self.mode.requires_check(evidence) {
                tracing::debug!(mode = %self.mode, evidence, "skipping revocation check");
                continue;
            }

            let Some(verifier) = &self.verifier else {
                return Err(ResponseError::RevocationPolicyMisconfigured(self.mode));
            };

            match verifier.verify_revocation(presentation).await {
                Ok(RevocationStatus::Valid) => {}
                Ok(RevocationStatus::Invalid) => {
                    return Err(ResponseError::RevocationCheckFailed(format!(
                        "presentation for '{}' is revoked",
                        presentation.descriptor().id()
                    )))
                }
                Err(e) => return Err(ResponseError::RevocationCheckFailed(format!("{e:#}"))),
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct LinkedDomainPolicy {
    pub mode: CheckLinkedDomain,
    pub verifier: Option<Arc<dyn LinkedDomainVerifier + Send + Sync>>,
}

impl LinkedDomainPolicy {
    /// Check the signer's DID. `signer` is `None` when the response is signed with a bare
    /// key, in which case there is no domain to link.
    pub async fn check(&self, signer: Option<(&str, &DidDocument)>) -> Result<(), ResponseError> {
        let evidence =
            signer.is_some_and(|(_, document)| document.has_service_type(LINKED_DOMAINS));

        if !self.mode.requires_check(evidence) {
            tracing::debug!(mode = %self.mode, evidence, "skipping linked domain check");
            return Ok(());
        }

        let Some(verifier) = &self.verifier else {
            return Err(ResponseError::LinkedDomainPolicyMisconfigured(self.mode));
        };

        let Some((did, document)) = signer else {
            return Err(ResponseError::LinkedDomainCheckFailed(
                "response is not signed with a DID".into(),
            ));
        };

        match verifier.verify_linked_domain(did, document).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(ResponseError::LinkedDomainCheckFailed(format!(
                "'{did}' is not linked to its domains"
            ))),
            Err(e) => Err(ResponseError::LinkedDomainCheckFailed(format!("{e:#}"))),
        }
    }
}
