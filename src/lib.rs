//! This library builds and verifies [SIOPv2] authorization responses carrying
//! [OpenID4VP] verifiable presentations.
//!
//! [SIOPv2]: <https://openid.net/specs/openid-connect-self-issued-v2-1_0.html>
//! [OpenID4VP]: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html>
//!
//! # Holder Usage
//!
//! A holder answers an already verified authorization request with a [`ResponseBuilder`]:
//!
//! ```ignore
//! use siop_oid4vp::holder::{ResponseBuilder, ResponseOptions, VerifiedAuthorizationRequest};
//! use siop_oid4vp::core::response::presentation::VerifiablePresentationWithLocation;
//! use siop_oid4vp::core::response::VpTokenLocation;
//! use siop_oid4vp::core::signature::{InternalSignature, SignatureMaterial};
//! use siop_oid4vp::core::version::SigningAlgorithm;
//!
//! let signature = SignatureMaterial::Internal(InternalSignature {
//!     key: private_jwk,
//!     did: Some(did),
//!     kid: None,
//!     alg: SigningAlgorithm::ES256,
//! });
//!
//! let response = ResponseBuilder::default()
//!     .build(
//!         &request,
//!         ResponseOptions::new(signature).with_presentation(
//!             VerifiablePresentationWithLocation::new(vp_jwt.into(), VpTokenLocation::IdToken),
//!         ),
//!     )
//!     .await?;
//!
//! // Post the response to the relying party.
//! let body = response.payload().as_query()?;
//! ```
//!
//! The id token can be signed with a local key ([`InternalSignature`]), by a remote signing
//! service ([`ExternalSignature`]) or by any [`PayloadSigner`] ([`SuppliedSignature`]).
//!
//! [`ResponseBuilder`]: crate::holder::ResponseBuilder
//! [`InternalSignature`]: crate::core::signature::InternalSignature
//! [`ExternalSignature`]: crate::core::signature::ExternalSignature
//! [`SuppliedSignature`]: crate::core::signature::SuppliedSignature
//! [`PayloadSigner`]: crate::core::signature::PayloadSigner
//!
//! # Relying Party Usage
//!
//! A relying party checks responses with a [`ResponseVerifier`]:
//!
//! ```ignore
//! use siop_oid4vp::verifier::{ResponseVerifier, VerifyOptions};
//!
//! let verifier = ResponseVerifier::builder()
//!     .with_policy_config(&config)?
//!     .with_presentation_verifier(presentation_verifier)
//!     .with_revocation_verifier(status_list_checker)
//!     .build();
//!
//! let payload = AuthorizationResponsePayload::from_query(&body)?;
//! let verified = verifier
//!     .verify(
//!         &payload,
//!         &VerifyOptions::default()
//!             .with_audience(redirect_uri)
//!             .with_nonce(nonce)
//!             .with_presentation_definition(definition),
//!     )
//!     .await?;
//!
//! println!("signed by {}", verified.issuer());
//! ```
//!
//! Verification goes through the [`Stage`]s in order and stops at the first failure. The
//! revocation and linked domain policies default to `IfPresent`: they run when the response
//! carries a credential status or the signer's DID document a `LinkedDomains` service.
//!
//! [`ResponseVerifier`]: crate::verifier::ResponseVerifier
//! [`Stage`]: crate::verifier::Stage
//!
//! # Presentation Exchange
//!
//! Presentations are matched with the [`PresentationDefinition`]s of the request by
//! [`PresentationExchange`], on both the holder and the relying party side. Each definition
//! takes exactly one presentation.
//!
//! [`PresentationDefinition`]: crate::core::presentation_definition::PresentationDefinition
//! [`PresentationExchange`]: crate::core::presentation_exchange::PresentationExchange

pub mod config;
pub mod core;
pub mod error;
pub mod holder;
pub mod utils;
pub mod verifier;
pub use serde_json_path::JsonPath;
