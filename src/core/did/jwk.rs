//! `did:jwk`: the DID is the base64url encoded public JWK itself.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::prelude::*;
use ssi::jwk::JWK;

use super::{DidDocument, DidResolutionResult, DidResolver, VerificationMethod};

const PREFIX: &str = "did:jwk:";

/// The `did:jwk` of the public part of `jwk`.
pub fn did_jwk(jwk: &JWK) -> Result<String> {
    let public = serde_json::to_vec(&jwk.to_public()).context("failed to serialize JWK")?;
    Ok(format!("{PREFIX}{}", BASE64_URL_SAFE_NO_PAD.encode(public)))
}

#[derive(Debug, Clone, Default)]
pub struct DidJwkResolver;

#[async_trait]
impl DidResolver for DidJwkResolver {
    async fn resolve(&self, did: &str) -> Result<DidResolutionResult> {
        let Some(encoded) = did.strip_prefix(PREFIX) else {
            bail!("'{did}' is not a did:jwk")
        };

        let decoded = BASE64_URL_SAFE_NO_PAD
            .decode(encoded)
            .context("did:jwk is not base64url encoded")?;
        let jwk: JWK = serde_json::from_slice(&decoded).context("did:jwk is not a JWK")?;

        if jwk.to_public() != jwk {
            bail!("did:jwk must not contain private key material")
        }

        let vm_id = format!("{did}#0");
        Ok(DidDocument {
            id: did.to_owned(),
            verification_method: vec![VerificationMethod {
                id: vm_id.clone(),
                type_: "JsonWebKey2020".into(),
                controller: did.to_owned(),
                public_key_jwk: Some(jwk),
            }],
            authentication: vec![vm_id.clone().into()],
            assertion_method: vec![vm_id.into()],
            service: Vec::new(),
        }
        .into())
    }
}
