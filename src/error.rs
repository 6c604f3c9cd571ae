use crate::core::{
    policy::{CheckLinkedDomain, RevocationVerification},
    presentation_exchange::PexError,
    response::VpTokenLocation,
    version::{SigningAlgorithm, SupportedVersion},
};

/// Broad classification of a [ResponseError].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedInput,
    Configuration,
    CryptographicFailure,
    ClaimValidationFailure,
    PresentationExchangeFailure,
    RevocationFailure,
    LinkedDomainFailure,
}

/// Failure to build or verify an authorization response.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResponseError {
    #[error("the response has no id_token")]
    MissingToken,

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("no signature material was provided")]
    MissingSignature,

    #[error("no DID was provided and the request does not accept JWK thumbprint subjects")]
    MissingIdentifier,

    #[error("invalid signature material: {0}")]
    InvalidSignatureMaterial(String),

    #[error("invalid response options: {0}")]
    InvalidOptions(String),

    #[error("{alg} is not supported by {version}")]
    UnsupportedAlgorithm {
        alg: SigningAlgorithm,
        version: SupportedVersion,
    },

    #[error("more than one presentation definition expects presentations in {0}")]
    MultipleDefinitionsForLocation(VpTokenLocation),

    #[error("presentations were supplied but no presentation verifier is configured")]
    PresentationVerificationCallbackMissing,

    #[error("revocation verification is '{0}' but no revocation verifier is configured")]
    RevocationPolicyMisconfigured(RevocationVerification),

    #[error("linked domain check is '{0}' but no linked domain verifier is configured")]
    LinkedDomainPolicyMisconfigured(CheckLinkedDomain),

    #[error("failed to sign the id_token: {0}")]
    SigningFailed(String),

    #[error("invalid id_token signature: {0}")]
    SignatureInvalid(String),

    #[error("failed to resolve {did}: {reason}")]
    DidResolutionFailed { did: String, reason: String },

    #[error("unexpected issuer '{found}', expected '{expected}'")]
    IssuerMismatch { expected: String, found: String },

    #[error("the id_token has no nonce")]
    MissingNonce,

    #[error("the id_token nonce does not match the expected nonce")]
    NonceMismatch,

    #[error("the response state does not match the expected state")]
    StateMismatch,

    #[error("the id_token expired at {exp} (now {now})")]
    Expired { exp: i64, now: i64 },

    #[error("the id_token expires ({exp}) before it was issued ({iat})")]
    InvalidTimestamps { iat: i64, exp: i64 },

    #[error("audience mismatch: expected {expected:?}, found {found:?}")]
    AudienceMismatch {
        expected: Option<String>,
        found: Option<String>,
    },

    #[error("invalid audience '{found}', expected '{expected}'")]
    AudienceInvalid { expected: String, found: String },

    #[error(transparent)]
    PresentationExchange(#[from] PexError),

    #[error("presentation verification failed: {0}")]
    PresentationVerificationFailed(String),

    #[error("revocation check failed: {0}")]
    RevocationCheckFailed(String),

    #[error("linked domain check failed: {0}")]
    LinkedDomainCheckFailed(String),
}

impl ResponseError {
    pub fn kind(&self) -> ErrorKind {
        use ResponseError::*;

        match self {
            MissingToken | MalformedResponse(_) => ErrorKind::MalformedInput,
            MissingSignature
            | MissingIdentifier
            | InvalidSignatureMaterial(_)
            | InvalidOptions(_)
            | UnsupportedAlgorithm { .. }
            | MultipleDefinitionsForLocation(_)
            | PresentationVerificationCallbackMissing
            | RevocationPolicyMisconfigured(_)
            | LinkedDomainPolicyMisconfigured(_) => ErrorKind::Configuration,
            SigningFailed(_) | SignatureInvalid(_) | DidResolutionFailed { .. } => {
                ErrorKind::CryptographicFailure
            }
            IssuerMismatch { .. }
            | MissingNonce
            | NonceMismatch
            | StateMismatch
            | Expired { .. }
            | InvalidTimestamps { .. }
            | AudienceMismatch { .. }
            | AudienceInvalid { .. } => ErrorKind::ClaimValidationFailure,
            PresentationExchange(_) | PresentationVerificationFailed(_) => {
                ErrorKind::PresentationExchangeFailure
            }
            RevocationCheckFailed(_) => ErrorKind::RevocationFailure,
            LinkedDomainCheckFailed(_) => ErrorKind::LinkedDomainFailure,
        }
    }

    /// Whether the error stems from how the builder or verifier was set up rather than
    /// from the response itself.
    pub fn is_configuration_error(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}
