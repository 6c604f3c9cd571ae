#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use siop_oid4vp::core::{
    did::{did_jwk, DidDocument},
    jwt::{self, JwsHeader},
    policy::{LinkedDomainVerifier, RevocationStatus, RevocationVerifier},
    presentation_definition::{PresentationDefinitionLocation, PresentationDefinitionWithLocation},
    response::{presentation::VerifiablePresentationWithSubmissionData, VpTokenLocation},
    signature::{InternalSignature, P256Signer, PayloadSigner, SignatureMaterial},
    version::SigningAlgorithm,
};
use siop_oid4vp::holder::VerifiedAuthorizationRequest;
use siop_oid4vp::verifier::PresentationVerifier;
use ssi::jwk::JWK;

pub const CLIENT_ID: &str = "https://rp.example.com";
pub const REDIRECT_URI: &str = "https://rp.example.com/siop/callback";
pub const NONCE: &str = "n-0S6_WzA2Mj";

/// A holder with a freshly generated P-256 key and its `did:jwk`.
pub struct Holder {
    pub key: JWK,
    pub did: String,
}

impl Holder {
    pub fn generate() -> Self {
        let secret = p256::SecretKey::random(&mut rand::rngs::OsRng);
        let key: JWK = serde_json::from_str(&secret.to_jwk_string()).unwrap();
        let did = did_jwk(&key).unwrap();
        Self { key, did }
    }

    pub fn signature(&self) -> SignatureMaterial {
        SignatureMaterial::Internal(InternalSignature {
            key: self.key.clone(),
            did: Some(self.did.clone()),
            kid: Some(format!("{}#0", self.did)),
            alg: SigningAlgorithm::ES256,
        })
    }

    /// A JWT presentation of a university degree credential.
    pub async fn degree_presentation(&self, degree: &str, revocable: bool) -> String {
        let signer = P256Signer::from_jwk(&self.key).unwrap();
        let header = JwsHeader::new(signer.alg()).with_kid(Some(format!("{}#0", self.did)));

        let mut vc = json!({
            "@context": ["https://www.w3.org/2018/credentials/v1"],
            "type": ["VerifiableCredential", "UniversityDegreeCredential"],
            "credentialSubject": {
                "id": self.did,
                "degree": { "type": degree, "name": "Bachelor of Science and Arts" }
            }
        });
        if revocable {
            vc["credentialStatus"] = json!({
                "id": "https://university.example/status/24#94567",
                "type": "StatusList2021Entry",
                "statusPurpose": "revocation",
                "statusListIndex": "94567",
                "statusListCredential": "https://university.example/status/24"
            });
        }

        // The credential proof is not checked by the tests, so the holder signs it as well.
        let credential = jwt::encode_sign(
            &header,
            &json!({ "iss": "did:example:university", "sub": self.did, "vc": vc }),
            &signer,
        )
        .await
        .unwrap();

        jwt::encode_sign(
            &header,
            &json!({
                "iss": self.did,
                "aud": REDIRECT_URI,
                "nonce": NONCE,
                "vp": {
                    "@context": ["https://www.w3.org/2018/credentials/v1"],
                    "type": ["VerifiablePresentation"],
                    "verifiableCredential": [credential]
                }
            }),
            &signer,
        )
        .await
        .unwrap()
    }
}

pub fn degree_definition(vp_token_location: VpTokenLocation) -> PresentationDefinitionWithLocation {
    let jd = &mut serde_json::Deserializer::from_str(include_str!(
        "examples/presentation_definition.json"
    ));
    PresentationDefinitionWithLocation::new(
        serde_path_to_error::deserialize(jd).unwrap(),
        PresentationDefinitionLocation::ClaimsVpToken,
        vp_token_location,
    )
}

/// The degree definition under another id.
pub fn renamed_degree_definition(
    id: &str,
    vp_token_location: VpTokenLocation,
) -> PresentationDefinitionWithLocation {
    let mut definition: serde_json::Value =
        serde_json::from_str(include_str!("examples/presentation_definition.json")).unwrap();
    definition["id"] = json!(id);
    PresentationDefinitionWithLocation::new(
        serde_json::from_value(definition).unwrap(),
        PresentationDefinitionLocation::ClaimsVpToken,
        vp_token_location,
    )
}

pub fn request(
    presentation_definitions: Vec<PresentationDefinitionWithLocation>,
) -> VerifiedAuthorizationRequest {
    VerifiedAuthorizationRequest {
        client_id: CLIENT_ID.into(),
        redirect_uri: Some(REDIRECT_URI.into()),
        nonce: Some(NONCE.into()),
        presentation_definitions,
        ..Default::default()
    }
}

/// Accepts every presentation and counts the calls.
#[derive(Debug, Default)]
pub struct CountingPresentationVerifier(pub AtomicUsize);

impl CountingPresentationVerifier {
    pub fn calls(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PresentationVerifier for CountingPresentationVerifier {
    async fn verify_presentation(
        &self,
        _presentation: &VerifiablePresentationWithSubmissionData,
    ) -> Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Reports every credential as revoked.
#[derive(Debug)]
pub struct RevokedEverything;

#[async_trait]
impl RevocationVerifier for RevokedEverything {
    async fn verify_revocation(
        &self,
        _presentation: &VerifiablePresentationWithSubmissionData,
    ) -> Result<RevocationStatus> {
        Ok(RevocationStatus::Invalid)
    }
}

#[derive(Debug)]
pub struct FixedLinkage(pub bool);

#[async_trait]
impl LinkedDomainVerifier for FixedLinkage {
    async fn verify_linked_domain(&self, _did: &str, _document: &DidDocument) -> Result<bool> {
        Ok(self.0)
    }
}

pub fn presentation_verifier() -> Arc<CountingPresentationVerifier> {
    Arc::new(CountingPresentationVerifier::default())
}
