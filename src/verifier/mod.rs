use std::{fmt, sync::Arc};

use anyhow::{Context, Result};
use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::{
    config::PolicyConfig,
    core::{
        did::{DidResolutionResult, DidResolver, ResolverRegistry, UniversalResolver},
        jwt::CompactJws,
        policy::{
            CheckLinkedDomain, LinkedDomainPolicy, LinkedDomainVerifier, RevocationPolicy,
            RevocationVerification, RevocationVerifier,
        },
        presentation_definition::PresentationDefinitionWithLocation,
        presentation_exchange::{
            align_with_definitions, PresentationEvaluator, PresentationExchange,
        },
        presentation_submission::PresentationSubmission,
        response::{
            id_token::IdTokenClaims, parameters::IdToken,
            presentation::VerifiablePresentationWithSubmissionData, AuthorizationResponsePayload,
            VpTokenLocation,
        },
        signature::{JwkSignatureVerifier, SignatureVerifier},
        util::ReqwestClient,
        version::SupportedVersion,
    },
    error::ResponseError,
    utils::unix_timestamp,
};

use self::claims::ClaimExpectations;

mod claims;
mod presentations;

pub use self::claims::SignerInfo;
pub use self::presentations::PresentationVerifier;

/// The stages a response goes through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Received,
    HeaderParsed,
    ClaimsDecoded,
    SignatureVerified,
    IssuerAccepted,
    LinkedDomainChecked,
    ClaimsValidated,
    PresentationsValidated,
    RevocationChecked,
    Verified,
    Rejected,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Received => "received",
            Self::HeaderParsed => "header_parsed",
            Self::ClaimsDecoded => "claims_decoded",
            Self::SignatureVerified => "signature_verified",
            Self::IssuerAccepted => "issuer_accepted",
            Self::LinkedDomainChecked => "linked_domain_checked",
            Self::ClaimsValidated => "claims_validated",
            Self::PresentationsValidated => "presentations_validated",
            Self::RevocationChecked => "revocation_checked",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
        .fmt(f)
    }
}

/// What a response is checked against.
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    /// Expected `aud`. When unset the token must not carry one either.
    pub audience: Option<String>,
    /// Expected `nonce`. The token must carry a nonce in any case.
    pub nonce: Option<String>,
    /// Expected `state` of the response.
    pub state: Option<String>,
    /// Definitions of the request the response answers.
    pub presentation_definitions: Vec<PresentationDefinitionWithLocation>,
    /// Verification time in seconds since the Unix epoch, the current time when unset.
    pub now: Option<i64>,
}

impl VerifyOptions {
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_presentation_definition(
        mut self,
        definition: PresentationDefinitionWithLocation,
    ) -> Self {
        self.presentation_definitions.push(definition);
        self
    }

    pub fn at(mut self, now: i64) -> Self {
        self.now = Some(now);
        self
    }
}

/// A response that passed every stage.
#[derive(Debug, Clone)]
pub struct VerifiedResponse {
    signer: SignerInfo,
    did_resolution: Option<DidResolutionResult>,
    id_token: String,
    claims: IdTokenClaims,
    payload: AuthorizationResponsePayload,
    presentations: Vec<VerifiablePresentationWithSubmissionData>,
    submissions: Vec<PresentationSubmission>,
}

impl VerifiedResponse {
    pub fn signer(&self) -> &SignerInfo {
        &self.signer
    }

    pub fn did_resolution(&self) -> Option<&DidResolutionResult> {
        self.did_resolution.as_ref()
    }

    /// The compact `id_token`.
    pub fn id_token(&self) -> &str {
        &self.id_token
    }

    /// The signing DID, or the JWK thumbprint in `sub` when no DID is used.
    pub fn issuer(&self) -> &str {
        self.signer.did.as_deref().unwrap_or(&self.claims.sub)
    }

    pub fn id_token_claims(&self) -> &IdTokenClaims {
        &self.claims
    }

    pub fn payload(&self) -> &AuthorizationResponsePayload {
        &self.payload
    }

    pub fn presentations(&self) -> &[VerifiablePresentationWithSubmissionData] {
        &self.presentations
    }

    /// The submission of each definition the presentations were validated against.
    pub fn submissions(&self) -> &[PresentationSubmission] {
        &self.submissions
    }
}

/// Verifies SIOP authorization responses.
#[derive(Debug, Clone)]
pub struct ResponseVerifier {
    version: SupportedVersion,
    resolvers: ResolverRegistry,
    signature_verifier: Arc<dyn SignatureVerifier + Send + Sync>,
    presentation_verifier: Option<Arc<dyn PresentationVerifier + Send + Sync>>,
    exchange: PresentationExchange,
    revocation: RevocationPolicy,
    linked_domain: LinkedDomainPolicy,
}

impl ResponseVerifier {
    /// Build a new verifier.
    pub fn builder() -> ResponseVerifierBuilder {
        ResponseVerifierBuilder::default()
    }

    pub fn version(&self) -> SupportedVersion {
        self.version
    }

    /// Verify an authorization response.
    pub async fn verify(
        &self,
        payload: &AuthorizationResponsePayload,
        options: &VerifyOptions,
    ) -> Result<VerifiedResponse, ResponseError> {
        let mut stage = Stage::Received;
        match self.run(payload, options, &mut stage).await {
            Ok(verified) => {
                debug!(stage = %Stage::Verified, issuer = verified.issuer(), "response verified");
                Ok(verified)
            }
            Err(error) => {
                warn!(stage = %stage, %error, "response {}", Stage::Rejected);
                Err(error)
            }
        }
    }

    /// Verify a bare `id_token` that came without an authorization response.
    pub async fn verify_id_token(
        &self,
        id_token: &str,
        options: &VerifyOptions,
    ) -> Result<VerifiedResponse, ResponseError> {
        let payload = AuthorizationResponsePayload::new().with(IdToken(id_token.to_owned()));
        self.verify(&payload, options).await
    }

    async fn run(
        &self,
        payload: &AuthorizationResponsePayload,
        options: &VerifyOptions,
        stage: &mut Stage,
    ) -> Result<VerifiedResponse, ResponseError> {
        let id_token = match payload.id_token() {
            Some(Ok(IdToken(token))) if !token.is_empty() => token,
            Some(Err(e)) => {
                return Err(ResponseError::MalformedResponse(format!(
                    "invalid id_token: {e:#}"
                )))
            }
            _ => return Err(ResponseError::MissingToken),
        };

        enter(stage, Stage::HeaderParsed);
        let jws = CompactJws::parse(&id_token)
            .map_err(|e| ResponseError::MalformedResponse(format!("{e:#}")))?;

        enter(stage, Stage::ClaimsDecoded);
        let claims: IdTokenClaims = serde_json::from_value(Json::Object(jws.claims().clone()))
            .map_err(|e| {
                ResponseError::MalformedResponse(format!("invalid id_token claims: {e}"))
            })?;

        enter(stage, Stage::SignatureVerified);
        let (signer, did_resolution) = claims::verify_signature(
            &jws,
            &claims,
            self.version,
            &self.resolvers,
            self.signature_verifier.as_ref(),
        )
        .await?;

        enter(stage, Stage::IssuerAccepted);
        if claims.iss != self.version.issuer() {
            return Err(ResponseError::IssuerMismatch {
                expected: self.version.issuer().to_owned(),
                found: claims.iss,
            });
        }

        enter(stage, Stage::LinkedDomainChecked);
        let signer_document = signer
            .did
            .as_deref()
            .zip(did_resolution.as_ref().map(|r| &r.did_document));
        self.linked_domain.check(signer_document).await?;

        enter(stage, Stage::ClaimsValidated);
        let response_state = payload
            .state()
            .transpose()
            .map_err(|e| ResponseError::MalformedResponse(format!("invalid state: {e:#}")))?;
        claims::validate_claims(
            &claims,
            response_state.as_ref().map(|s| s.0.as_str()),
            &ClaimExpectations {
                audience: options.audience.as_deref(),
                nonce: options.nonce.as_deref(),
                state: options.state.as_deref(),
                now: options.now.unwrap_or_else(unix_timestamp),
            },
        )?;

        enter(stage, Stage::PresentationsValidated);
        let (presentations, submissions) = self
            .validate_presentations(payload, &claims, options)
            .await?;

        enter(stage, Stage::RevocationChecked);
        self.revocation.check(&presentations).await?;

        Ok(VerifiedResponse {
            signer,
            did_resolution,
            id_token,
            claims,
            payload: payload.clone(),
            presentations,
            submissions,
        })
    }

    async fn validate_presentations(
        &self,
        payload: &AuthorizationResponsePayload,
        claims: &IdTokenClaims,
        options: &VerifyOptions,
    ) -> Result<
        (
            Vec<VerifiablePresentationWithSubmissionData>,
            Vec<PresentationSubmission>,
        ),
        ResponseError,
    > {
        let extracted = presentations::extract(payload, claims, self.version)?;

        if !extracted.presentations.is_empty() {
            let Some(verifier) = &self.presentation_verifier else {
                return Err(ResponseError::PresentationVerificationCallbackMissing);
            };
            for presentation in &extracted.presentations {
                verifier
                    .verify_presentation(presentation)
                    .await
                    .map_err(|e| ResponseError::PresentationVerificationFailed(format!("{e:#}")))?;
            }
        }

        let definitions: Vec<_> = options
            .presentation_definitions
            .iter()
            .filter(|d| d.vp_token_location() != VpTokenLocation::TokenResponse)
            .cloned()
            .collect();
        let presentations = align_with_definitions(&definitions, extracted.presentations);

        let submissions = self
            .exchange
            .validate(&definitions, &presentations, &extracted.submissions)
            .await?;

        Ok((presentations, submissions))
    }
}

fn enter(stage: &mut Stage, next: Stage) {
    debug!(passed = %stage, "verifying {next}");
    *stage = next;
}

/// Builder struct for [ResponseVerifier].
#[derive(Debug, Clone, Default)]
pub struct ResponseVerifierBuilder {
    version: SupportedVersion,
    resolvers: Option<ResolverRegistry>,
    signature_verifier: Option<Arc<dyn SignatureVerifier + Send + Sync>>,
    presentation_verifier: Option<Arc<dyn PresentationVerifier + Send + Sync>>,
    presentation_evaluator: Option<Arc<dyn PresentationEvaluator + Send + Sync>>,
    revocation: RevocationPolicy,
    linked_domain: LinkedDomainPolicy,
}

impl ResponseVerifierBuilder {
    /// Build the verifier.
    ///
    /// Unless configured otherwise, DIDs are resolved with `did:jwk` and `did:key` only,
    /// signatures are checked with [JwkSignatureVerifier] and both policies are `IfPresent`.
    pub fn build(self) -> ResponseVerifier {
        let Self {
            version,
            resolvers,
            signature_verifier,
            presentation_verifier,
            presentation_evaluator,
            revocation,
            linked_domain,
        } = self;

        ResponseVerifier {
            version,
            resolvers: resolvers.unwrap_or_default(),
            signature_verifier: signature_verifier
                .unwrap_or_else(|| Arc::new(JwkSignatureVerifier)),
            presentation_verifier,
            exchange: presentation_evaluator
                .map(PresentationExchange::new)
                .unwrap_or_default(),
            revocation,
            linked_domain,
        }
    }

    /// Apply deployment settings: the version, both policy modes and the universal resolver
    /// as fallback for DID methods without a dedicated resolver.
    pub fn with_policy_config(mut self, config: &PolicyConfig) -> Result<Self> {
        self.version = config.version;
        self.revocation.mode = config.revocation;
        self.linked_domain.mode = config.linked_domain;

        if let Some(base) = &config.universal_resolver {
            let http_client = ReqwestClient::new().context("universal resolver client")?;
            self = self.with_fallback_resolver(Arc::new(UniversalResolver::new(
                base.clone(),
                Arc::new(http_client),
            )));
        }

        Ok(self)
    }

    /// Set the protocol version responses are verified against.
    pub fn with_version(mut self, version: SupportedVersion) -> Self {
        self.version = version;
        self
    }

    /// Replace the DID resolvers.
    pub fn with_resolver_registry(mut self, resolvers: ResolverRegistry) -> Self {
        self.resolvers = Some(resolvers);
        self
    }

    /// Resolve DIDs of `method` with `resolver`.
    pub fn with_resolver(
        mut self,
        method: impl Into<String>,
        resolver: Arc<dyn DidResolver + Send + Sync>,
    ) -> Self {
        self.resolvers = Some(
            self.resolvers
                .take()
                .unwrap_or_default()
                .with_method(method, resolver),
        );
        self
    }

    /// Resolve DIDs without a dedicated resolver with `resolver`.
    pub fn with_fallback_resolver(mut self, resolver: Arc<dyn DidResolver + Send + Sync>) -> Self {
        self.resolvers = Some(
            self.resolvers
                .take()
                .unwrap_or_default()
                .with_fallback(resolver),
        );
        self
    }

    /// Set the signature verifier used to check the `id_token`.
    pub fn with_signature_verifier(
        mut self,
        verifier: Arc<dyn SignatureVerifier + Send + Sync>,
    ) -> Self {
        self.signature_verifier = Some(verifier);
        self
    }

    /// Set the verifier of presentation proofs. Required for responses carrying presentations.
    pub fn with_presentation_verifier(
        mut self,
        verifier: Arc<dyn PresentationVerifier + Send + Sync>,
    ) -> Self {
        self.presentation_verifier = Some(verifier);
        self
    }

    /// Set how presentations are matched against input descriptors.
    pub fn with_presentation_evaluator(
        mut self,
        evaluator: Arc<dyn PresentationEvaluator + Send + Sync>,
    ) -> Self {
        self.presentation_evaluator = Some(evaluator);
        self
    }

    pub fn with_revocation_verification(mut self, mode: RevocationVerification) -> Self {
        self.revocation.mode = mode;
        self
    }

    pub fn with_revocation_verifier(
        mut self,
        verifier: Arc<dyn RevocationVerifier + Send + Sync>,
    ) -> Self {
        self.revocation.verifier = Some(verifier);
        self
    }

    pub fn with_linked_domain_check(mut self, mode: CheckLinkedDomain) -> Self {
        self.linked_domain.mode = mode;
        self
    }

    pub fn with_linked_domain_verifier(
        mut self,
        verifier: Arc<dyn LinkedDomainVerifier + Send + Sync>,
    ) -> Self {
        self.linked_domain.verifier = Some(verifier);
        self
    }
}
