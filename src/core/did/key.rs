//! `did:key`, resolved through the `ssi` DID method.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use ssi::{
    dids::{DIDKey, VerificationMethodDIDResolver},
    jwk::{JWKResolver, JWK},
    verification_methods::AnyJwkMethod,
};

use super::{DidDocument, DidResolutionResult, DidResolver, VerificationMethod};

const PREFIX: &str = "did:key:";

#[derive(Debug, Clone, Default)]
pub struct DidKeyResolver;

#[async_trait]
impl DidResolver for DidKeyResolver {
    async fn resolve(&self, did: &str) -> Result<DidResolutionResult> {
        let Some(multibase) = did.strip_prefix(PREFIX) else {
            bail!("'{did}' is not a did:key")
        };

        // The only verification method of a did:key is named after the key itself.
        let vm_id = format!("{did}#{multibase}");
        let resolver: VerificationMethodDIDResolver<DIDKey, AnyJwkMethod> =
            VerificationMethodDIDResolver::new(DIDKey);
        let jwk = resolver
            .fetch_public_jwk(Some(&vm_id))
            .await
            .context("unable to resolve key from did:key")?;

        Ok(DidDocument {
            id: did.to_owned(),
            verification_method: vec![VerificationMethod {
                id: vm_id.clone(),
                type_: "JsonWebKey2020".into(),
                controller: did.to_owned(),
                public_key_jwk: Some(JWK::clone(&jwk)),
            }],
            authentication: vec![vm_id.clone().into()],
            assertion_method: vec![vm_id.into()],
            service: Vec::new(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_p256_key() {
        let did = "did:key:zDnaeaDj3YpPR4JXos2kCCNPS86hdELeN5PZh97KGkoFzUtGn";
        let document = DidKeyResolver.resolve(did).await.unwrap().did_document;

        assert_eq!(document.id, did);
        let jwk = document
            .find_jwk(Some(&format!(
                "{did}#zDnaeaDj3YpPR4JXos2kCCNPS86hdELeN5PZh97KGkoFzUtGn"
            )))
            .unwrap();
        assert_eq!(jwk.to_public(), *jwk);
    }

    #[tokio::test]
    async fn rejects_other_methods() {
        assert!(DidKeyResolver.resolve("did:web:example.com").await.is_err());
    }
}
