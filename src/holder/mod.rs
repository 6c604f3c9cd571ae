//! Holder side: turning a verified authorization request into a signed response.

use std::collections::{HashMap, HashSet};

use base64::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json_path::JsonPath;
use sha2::{Digest, Sha256};

use crate::{
    core::{
        jwt::JwsHeader,
        object::TypedParameter,
        presentation_definition::PresentationDefinitionWithLocation,
        presentation_exchange::{align_with_definitions, PresentationExchange},
        presentation_submission::{DescriptorMap, PresentationSubmission},
        response::{
            id_token::{IdTokenClaims, IdTokenVpToken},
            parameters::{
                AccessToken, ExpiresIn, IdToken, RefreshToken, State, TokenType, VpToken,
            },
            presentation::{LocatedPresentation, VerifiablePresentationWithLocation},
            AuthorizationResponsePayload, VpTokenLocation,
        },
        signature::{jwk_thumbprint, SignatureMaterial},
        version::SupportedVersion,
    },
    error::ResponseError,
    utils::unix_timestamp,
};

/// Subject syntax type of `id_token`s whose `sub` is a JWK thumbprint.
pub const JWK_THUMBPRINT_SUBJECT_SYNTAX: &str = "urn:ietf:params:oauth:jwk-thumbprint";

/// `id_token` lifetime in seconds when none is set.
pub const DEFAULT_EXPIRES_IN: u64 = 600;

/// The parts of an already verified authorization request a response depends on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerifiedAuthorizationRequest {
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default)]
    pub presentation_definitions: Vec<PresentationDefinitionWithLocation>,
    #[serde(default)]
    pub subject_syntax_types_supported: Vec<String>,
    #[serde(default)]
    pub version: SupportedVersion,
}

impl VerifiedAuthorizationRequest {
    /// The `aud` of the response: the redirect URI, or the client id without one.
    pub fn audience(&self) -> &str {
        self.redirect_uri.as_deref().unwrap_or(&self.client_id)
    }

    pub fn supports_jwk_thumbprint(&self) -> bool {
        self.subject_syntax_types_supported
            .iter()
            .any(|s| s == JWK_THUMBPRINT_SUBJECT_SYNTAX)
    }
}

/// Token endpoint parameters echoed in the response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenParameters {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
}

/// Options of a single response.
#[derive(Debug, Clone, Default)]
pub struct ResponseOptions {
    pub signature: SignatureMaterial,
    /// Overrides the state of the request.
    pub state: Option<String>,
    /// Used when the request carries no nonce.
    pub nonce: Option<String>,
    /// `id_token` lifetime in seconds, [DEFAULT_EXPIRES_IN] when unset.
    pub expires_in: Option<u64>,
    pub presentations: Vec<VerifiablePresentationWithLocation>,
    pub tokens: TokenParameters,
}

impl ResponseOptions {
    pub fn new(signature: SignatureMaterial) -> Self {
        Self {
            signature,
            ..Default::default()
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn with_expires_in(mut self, expires_in: u64) -> Self {
        self.expires_in = Some(expires_in);
        self
    }

    pub fn with_presentation(mut self, presentation: VerifiablePresentationWithLocation) -> Self {
        self.presentations.push(presentation);
        self
    }

    pub fn with_tokens(mut self, tokens: TokenParameters) -> Self {
        self.tokens = tokens;
        self
    }
}

/// A signed authorization response.
#[derive(Debug, Clone)]
pub struct SignedResponse {
    id_token: String,
    payload: AuthorizationResponsePayload,
    state: String,
    nonce: String,
    claims: IdTokenClaims,
    token_response_vp_token: Option<VpToken>,
}

impl SignedResponse {
    pub fn id_token(&self) -> &str {
        &self.id_token
    }

    pub fn payload(&self) -> &AuthorizationResponsePayload {
        &self.payload
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn id_token_claims(&self) -> &IdTokenClaims {
        &self.claims
    }

    /// Presentations to hand out from the token endpoint.
    pub fn token_response_vp_token(&self) -> Option<&VpToken> {
        self.token_response_vp_token.as_ref()
    }
}

/// Builds signed responses.
#[derive(Debug, Clone, Default)]
pub struct ResponseBuilder {
    exchange: PresentationExchange,
}

impl ResponseBuilder {
    pub fn new(exchange: PresentationExchange) -> Self {
        Self { exchange }
    }

    pub async fn build(
        &self,
        request: &VerifiedAuthorizationRequest,
        options: ResponseOptions,
    ) -> Result<SignedResponse, ResponseError> {
        let version = request.version;
        let signature = &options.signature;

        if let SignatureMaterial::None = signature {
            return Err(ResponseError::MissingSignature);
        }
        signature
            .validate()
            .map_err(|e| ResponseError::InvalidSignatureMaterial(format!("{e:#}")))?;
        let alg = signature
            .algorithm()
            .map_err(|e| ResponseError::InvalidSignatureMaterial(format!("{e:#}")))?;
        if !version.supports_algorithm(alg) {
            return Err(ResponseError::UnsupportedAlgorithm { alg, version });
        }

        let expires_in = options.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);
        let lifetime = match i64::try_from(expires_in) {
            Ok(lifetime) if lifetime > 0 => lifetime,
            _ => {
                return Err(ResponseError::InvalidOptions(format!(
                    "expires_in must be positive and fit a timestamp, got {expires_in}"
                )))
            }
        };

        let state = options
            .state
            .clone()
            .or_else(|| request.state.clone())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let nonce = request
            .nonce
            .clone()
            .or_else(|| options.nonce.clone())
            .unwrap_or_else(|| derive_nonce(&state));

        let (sub, sub_jwk) = match signature.did() {
            Some(did) => (did.to_owned(), None),
            None if request.supports_jwk_thumbprint() => {
                let Some(jwk) = signature.public_jwk() else {
                    return Err(ResponseError::InvalidSignatureMaterial(
                        "a JWK thumbprint subject needs a locally known public key".into(),
                    ));
                };
                let thumbprint = jwk_thumbprint(&jwk)
                    .map_err(|e| ResponseError::InvalidSignatureMaterial(format!("{e:#}")))?;
                (thumbprint, Some(jwk))
            }
            None => return Err(ResponseError::MissingIdentifier),
        };

        let definitions = &request.presentation_definitions;
        let definition_ids = single_definition_per_location(definitions)?;

        let presentations = align_with_definitions(definitions, options.presentations);
        let submissions = self
            .exchange
            .validate(definitions, &presentations, &[])
            .await?;

        let (vp_token, mut located_submissions) =
            assemble_vp_token(&presentations, &submissions, &definition_ids)?;

        let now = unix_timestamp();
        let exp = now.checked_add(lifetime).ok_or_else(|| {
            ResponseError::InvalidOptions(format!("expires_in {expires_in} overflows `exp`"))
        })?;
        let claims = IdTokenClaims {
            iss: version.issuer().to_owned(),
            sub,
            sub_jwk,
            aud: Some(request.audience().to_owned()),
            iat: now,
            exp,
            auth_time: Some(now),
            nonce: Some(nonce.clone()),
            state: None,
            vp_token: located_submissions
                .remove(&VpTokenLocation::IdToken)
                .map(|presentation_submission| IdTokenVpToken {
                    presentation_submission,
                }),
        };

        let header = JwsHeader::new(alg.as_str())
            .with_kid(signature.kid())
            .with_typ("JWT");
        let claims_json = serde_json::to_value(&claims)
            .map_err(|e| ResponseError::SigningFailed(e.to_string()))?;
        let id_token = signature
            .sign(&header, &claims_json)
            .await
            .map_err(|e| ResponseError::SigningFailed(format!("{e:#}")))?;

        tracing::debug!(sub = claims.sub, %version, "signed id_token");

        let TokenParameters {
            access_token,
            token_type,
            refresh_token,
            expires_in: token_expires_in,
        } = options.tokens;

        let mut payload = AuthorizationResponsePayload::new()
            .with(IdToken(id_token.clone()))
            .with(State(state.clone()));
        payload = with_optional(payload, access_token.map(AccessToken));
        payload = with_optional(payload, token_type.map(TokenType));
        payload = with_optional(payload, refresh_token.map(RefreshToken));
        payload = with_optional(payload, token_expires_in.map(ExpiresIn));
        payload = with_optional(payload, vp_token);
        payload = with_optional(
            payload,
            located_submissions.remove(&VpTokenLocation::AuthorizationResponse),
        );

        let token_response_vp_token = VpToken::from_presentations(
            presentations
                .iter()
                .filter(|p| p.location() == VpTokenLocation::TokenResponse)
                .map(|p| p.presentation().clone())
                .collect(),
        );

        Ok(SignedResponse {
            id_token,
            payload,
            state,
            nonce,
            claims,
            token_response_vp_token,
        })
    }
}

fn with_optional<T: TypedParameter>(
    payload: AuthorizationResponsePayload,
    t: Option<T>,
) -> AuthorizationResponsePayload {
    match t {
        Some(t) => payload.with(t),
        None => payload,
    }
}

/// `base64url(SHA-256(state))`
fn derive_nonce(state: &str) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(Sha256::digest(state.as_bytes()))
}

/// The id of the definition expecting presentations at each location.
fn single_definition_per_location(
    definitions: &[PresentationDefinitionWithLocation],
) -> Result<HashMap<VpTokenLocation, String>, ResponseError> {
    let mut by_location: HashMap<VpTokenLocation, HashSet<&String>> = HashMap::new();
    for definition in definitions {
        by_location
            .entry(definition.vp_token_location())
            .or_default()
            .insert(definition.definition().id());
    }

    by_location
        .into_iter()
        .map(|(location, ids)| {
            let mut ids = ids.into_iter();
            match (ids.next(), ids.next()) {
                (Some(id), None) => Ok((location, id.clone())),
                _ => Err(ResponseError::MultipleDefinitionsForLocation(location)),
            }
        })
        .collect()
}

type LocatedSubmissions = HashMap<VpTokenLocation, PresentationSubmission>;

/// Build `vp_token` from the presentations that ride with the authorization response and
/// rewrite their descriptors to point into it.
fn assemble_vp_token(
    presentations: &[VerifiablePresentationWithLocation],
    submissions: &[PresentationSubmission],
    definition_ids: &HashMap<VpTokenLocation, String>,
) -> Result<(Option<VpToken>, LocatedSubmissions), ResponseError> {
    let in_vp_token: Vec<_> = presentations
        .iter()
        .zip(submissions)
        .filter(|(p, _)| p.location() != VpTokenLocation::TokenResponse)
        .collect();

    let mut descriptors: HashMap<VpTokenLocation, Vec<DescriptorMap>> = HashMap::new();
    for (index, (presentation, submission)) in in_vp_token.iter().enumerate() {
        let raw_path = if in_vp_token.len() == 1 {
            "$".to_owned()
        } else {
            format!("$[{index}]")
        };
        let path = JsonPath::parse(&raw_path)
            .map_err(|e| ResponseError::MalformedResponse(format!("invalid path: {e}")))?;

        descriptors
            .entry(presentation.location())
            .or_default()
            .extend(submission.descriptor_map().iter().map(|d| {
                d.clone()
                    .relocate(path.clone(), presentation.format().clone())
            }));
    }

    let submissions = descriptors
        .into_iter()
        .filter_map(|(location, descriptor_map)| {
            definition_ids.get(&location).map(|definition_id| {
                (
                    location,
                    PresentationSubmission::new(
                        uuid::Uuid::new_v4(),
                        definition_id.clone(),
                        descriptor_map,
                    ),
                )
            })
        })
        .collect();

    let vp_token = VpToken::from_presentations(
        in_vp_token
            .iter()
            .map(|(p, _)| p.presentation().clone())
            .collect(),
    );

    Ok((vp_token, submissions))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::core::{
        presentation_definition::{PresentationDefinition, PresentationDefinitionLocation},
        signature::{InternalSignature, P256Signer, SuppliedSignature},
        version::SigningAlgorithm,
    };
    use std::sync::Arc;

    fn supplied(did: Option<&str>) -> SignatureMaterial {
        SignatureMaterial::Supplied(SuppliedSignature {
            signer: Arc::new(P256Signer::random().unwrap()),
            did: did.map(ToOwned::to_owned),
            kid: None,
        })
    }

    fn request() -> VerifiedAuthorizationRequest {
        VerifiedAuthorizationRequest {
            client_id: "https://rp.example".into(),
            redirect_uri: Some("https://rp.example/cb".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn missing_signature() {
        let result = ResponseBuilder::default()
            .build(&request(), ResponseOptions::default())
            .await;
        assert_eq!(result.unwrap_err(), ResponseError::MissingSignature);
    }

    #[tokio::test]
    async fn missing_identifier() {
        let result = ResponseBuilder::default()
            .build(&request(), ResponseOptions::new(supplied(None)))
            .await;
        assert_eq!(result.unwrap_err(), ResponseError::MissingIdentifier);
    }

    #[tokio::test]
    async fn algorithm_outside_version_table() {
        let secret = p256::SecretKey::random(&mut rand::rngs::OsRng);
        let material = SignatureMaterial::Internal(InternalSignature {
            key: serde_json::from_str(&secret.to_jwk_string()).unwrap(),
            did: Some("did:example:holder".into()),
            kid: None,
            alg: SigningAlgorithm::ES256,
        });
        let request = VerifiedAuthorizationRequest {
            version: SupportedVersion::JwtVcPresentationProfileV1,
            ..request()
        };

        let result = ResponseBuilder::default()
            .build(&request, ResponseOptions::new(material))
            .await;
        assert!(matches!(
            result,
            Err(ResponseError::UnsupportedAlgorithm {
                alg: SigningAlgorithm::ES256,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn nonce_derived_from_state() {
        let response = ResponseBuilder::default()
            .build(
                &request(),
                ResponseOptions::new(supplied(Some("did:example:holder"))).with_state("abc"),
            )
            .await
            .unwrap();

        assert_eq!(response.state(), "abc");
        assert_eq!(response.nonce(), derive_nonce("abc"));
        assert_eq!(
            response.id_token_claims().aud.as_deref(),
            Some("https://rp.example/cb")
        );
        assert_eq!(
            response.id_token_claims().exp - response.id_token_claims().iat,
            DEFAULT_EXPIRES_IN as i64
        );
    }

    #[tokio::test]
    async fn request_nonce_and_state_win() {
        let request = VerifiedAuthorizationRequest {
            nonce: Some("request-nonce".into()),
            state: Some("request-state".into()),
            ..request()
        };
        let response = ResponseBuilder::default()
            .build(
                &request,
                ResponseOptions::new(supplied(Some("did:example:holder")))
                    .with_nonce("option-nonce"),
            )
            .await
            .unwrap();

        assert_eq!(response.nonce(), "request-nonce");
        assert_eq!(response.state(), "request-state");
        assert!(response.payload().vp_token().is_none());
    }

    #[tokio::test]
    async fn token_parameters_are_echoed() {
        let tokens = TokenParameters {
            access_token: Some("2YotnFZFEjr1zCsicMWpAA".into()),
            token_type: Some("Bearer".into()),
            expires_in: Some(3600),
            ..Default::default()
        };
        let response = ResponseBuilder::default()
            .build(
                &request(),
                ResponseOptions::new(supplied(Some("did:example:holder"))).with_tokens(tokens),
            )
            .await
            .unwrap();

        let payload = response.payload();
        assert_eq!(
            payload.get::<AccessToken>().unwrap().unwrap().0,
            "2YotnFZFEjr1zCsicMWpAA"
        );
        assert_eq!(payload.get::<TokenType>().unwrap().unwrap().0, "Bearer");
        assert_eq!(
            payload.get::<ExpiresIn>().unwrap().unwrap(),
            ExpiresIn(3600)
        );
        assert!(payload.get::<RefreshToken>().is_none());
    }

    #[tokio::test]
    async fn multiple_definitions_for_one_location() {
        let definition = |id: &str| {
            PresentationDefinitionWithLocation::new(
                PresentationDefinition::new(id.into(), Default::default()),
                PresentationDefinitionLocation::ClaimsVpToken,
                VpTokenLocation::AuthorizationResponse,
            )
        };
        let request = VerifiedAuthorizationRequest {
            presentation_definitions: vec![definition("a"), definition("b")],
            ..request()
        };

        let result = ResponseBuilder::default()
            .build(
                &request,
                ResponseOptions::new(supplied(Some("did:example:holder"))),
            )
            .await;
        assert_eq!(
            result.unwrap_err(),
            ResponseError::MultipleDefinitionsForLocation(VpTokenLocation::AuthorizationResponse)
        );
    }

    #[tokio::test]
    async fn lifetime_must_fit_a_timestamp() {
        for expires_in in [0, u64::MAX, i64::MAX as u64] {
            let result = ResponseBuilder::default()
                .build(
                    &request(),
                    ResponseOptions::new(supplied(Some("did:example:holder")))
                        .with_expires_in(expires_in),
                )
                .await;
            assert!(
                matches!(result, Err(ResponseError::InvalidOptions(_))),
                "expires_in {expires_in}"
            );
        }
    }
}
