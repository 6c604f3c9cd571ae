use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use ssi::jwk::{Algorithm, JWK};
use url::Url;

use super::{
    jwt::{self, CompactJws, JwsHeader},
    util::{base_request, execute_for_body, AsyncHttpClient},
    version::SigningAlgorithm,
};

/// Signs the JWS signing input.
#[async_trait]
pub trait PayloadSigner: std::fmt::Debug {
    /// The algorithm that will be used to sign.
    fn alg(&self) -> &str;
    /// The public JWK of the signer.
    fn jwk(&self) -> &JWK;
    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>>;
}

#[derive(Debug)]
pub struct P256Signer {
    key: SigningKey,
    jwk: JWK,
}

impl P256Signer {
    pub fn new(key: SigningKey) -> Result<Self> {
        let pk: p256::PublicKey = key.verifying_key().into();
        let jwk = serde_json::from_str(&pk.to_jwk_string())?;
        Ok(Self { key, jwk })
    }

    /// Load a signer from a private P-256 JWK.
    pub fn from_jwk(jwk: &JWK) -> Result<Self> {
        let secret = p256::SecretKey::from_jwk_str(&serde_json::to_string(jwk)?)
            .context("not a private P-256 JWK")?;
        Self::new(SigningKey::from(secret))
    }

    /// A signer with a freshly generated key.
    pub fn random() -> Result<Self> {
        Self::new(SigningKey::random(&mut rand::rngs::OsRng))
    }
}

#[async_trait]
impl PayloadSigner for P256Signer {
    fn alg(&self) -> &str {
        "ES256"
    }

    fn jwk(&self) -> &JWK {
        &self.jwk
    }

    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let sig: Signature = self.key.sign(payload);
        Ok(sig.to_vec())
    }
}

/// Signs with a private JWK of any algorithm of [SigningAlgorithm].
#[derive(Debug, Clone)]
pub struct JwkSigner {
    key: JWK,
    public: JWK,
    alg: SigningAlgorithm,
}

impl JwkSigner {
    pub fn new(key: JWK, alg: SigningAlgorithm) -> Self {
        let public = key.to_public();
        Self { key, public, alg }
    }
}

#[async_trait]
impl PayloadSigner for JwkSigner {
    fn alg(&self) -> &str {
        self.alg.as_str()
    }

    fn jwk(&self) -> &JWK {
        &self.public
    }

    async fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        ssi::claims::jws::sign_bytes(self.alg.into(), payload, &self.key)
            .with_context(|| format!("failed to sign with {}", self.alg))
    }
}

/// Key held by the caller.
#[derive(Debug, Clone)]
pub struct InternalSignature {
    /// Private JWK.
    pub key: JWK,
    pub did: Option<String>,
    pub kid: Option<String>,
    pub alg: SigningAlgorithm,
}

/// Signing delegated to a remote endpoint.
///
/// The endpoint receives `{"issuer", "kid", "alg", "header", "payload"}` as JSON, with an
/// optional bearer token, and answers with `{"jws": "<compact JWS>"}`.
#[derive(Debug, Clone)]
pub struct ExternalSignature {
    pub signature_uri: Url,
    pub authz_token: Option<String>,
    pub did: Option<String>,
    pub kid: Option<String>,
    pub alg: SigningAlgorithm,
    pub http_client: Arc<dyn AsyncHttpClient + Send + Sync>,
}

/// Signing through a caller supplied [PayloadSigner].
#[derive(Debug, Clone)]
pub struct SuppliedSignature {
    pub signer: Arc<dyn PayloadSigner + Send + Sync>,
    pub did: Option<String>,
    pub kid: Option<String>,
}

/// How the `id_token` of a response is signed.
#[derive(Debug, Clone, Default)]
pub enum SignatureMaterial {
    Internal(InternalSignature),
    External(ExternalSignature),
    Supplied(SuppliedSignature),
    #[default]
    None,
}

#[derive(Serialize)]
struct RemoteSignRequest<'a> {
    issuer: Option<&'a str>,
    kid: Option<&'a str>,
    alg: &'a str,
    header: &'a JwsHeader,
    payload: &'a Json,
}

#[derive(Deserialize)]
struct RemoteSignResponse {
    jws: String,
}

impl SignatureMaterial {
    pub fn did(&self) -> Option<&str> {
        match self {
            Self::Internal(s) => s.did.as_deref(),
            Self::External(s) => s.did.as_deref(),
            Self::Supplied(s) => s.did.as_deref(),
            Self::None => None,
        }
    }

    /// Key id placed in the JWS header: the explicit `kid`, otherwise the DID.
    pub fn kid(&self) -> Option<String> {
        let kid = match self {
            Self::Internal(s) => s.kid.as_ref(),
            Self::External(s) => s.kid.as_ref(),
            Self::Supplied(s) => s.kid.as_ref(),
            Self::None => None,
        };
        kid.cloned().or_else(|| self.did().map(ToOwned::to_owned))
    }

    pub fn algorithm(&self) -> Result<SigningAlgorithm> {
        match self {
            Self::Internal(s) => Ok(s.alg),
            Self::External(s) => Ok(s.alg),
            Self::Supplied(s) => s.signer.alg().parse(),
            Self::None => bail!("no signature material"),
        }
    }

    /// The public key of the signer, when it is known locally.
    pub fn public_jwk(&self) -> Option<JWK> {
        match self {
            Self::Internal(s) => Some(s.key.to_public()),
            Self::Supplied(s) => Some(s.signer.jwk().clone()),
            Self::External(_) | Self::None => None,
        }
    }

    /// Check that the material can produce a signature.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Internal(s) => {
                let key = serde_json::to_value(&s.key)?;
                if key.get("d").is_none() {
                    bail!("internal signature key has no private part")
                }
                match s.key.get_algorithm() {
                    Some(alg) if alg != Algorithm::from(s.alg) => {
                        bail!("{} cannot be used with a {alg:?} key", s.alg)
                    }
                    _ => Ok(()),
                }
            }
            Self::External(_) | Self::Supplied(_) => Ok(()),
            Self::None => bail!("no signature material"),
        }
    }

    /// Sign `claims` and return a compact JWS.
    pub async fn sign(&self, header: &JwsHeader, claims: &Json) -> Result<String> {
        match self {
            Self::Internal(s) => {
                let signer = JwkSigner::new(s.key.clone(), s.alg);
                jwt::encode_sign(header, claims, &signer).await
            }
            Self::Supplied(s) => jwt::encode_sign(header, claims, s.signer.as_ref()).await,
            Self::External(s) => {
                let body = serde_json::to_vec(&RemoteSignRequest {
                    issuer: s.did.as_deref(),
                    kid: header.kid.as_deref(),
                    alg: s.alg.as_str(),
                    header,
                    payload: claims,
                })?;

                let mut request = base_request()
                    .method("POST")
                    .uri(s.signature_uri.as_str())
                    .header(CONTENT_TYPE, "application/json");
                if let Some(token) = &s.authz_token {
                    request = request.header(AUTHORIZATION, format!("Bearer {token}"));
                }
                let request = request
                    .body(body)
                    .context("failed to build signing request")?;

                let response = execute_for_body(s.http_client.as_ref(), request).await?;
                let RemoteSignResponse { jws } = serde_json::from_str(&response)
                    .context("signing endpoint did not return a JWS")?;
                CompactJws::parse(&jws).context("signing endpoint returned a malformed JWS")?;
                Ok(jws)
            }
            Self::None => bail!("no signature material"),
        }
    }
}

/// Checks the signature of a compact JWS against a public key.
#[async_trait]
pub trait SignatureVerifier: std::fmt::Debug {
    async fn verify(&self, jws: &CompactJws, jwk: &JWK) -> Result<()>;
}

/// Verifies signatures with `ssi`, for every algorithm the key type supports.
#[derive(Debug, Clone, Default)]
pub struct JwkSignatureVerifier;

#[async_trait]
impl SignatureVerifier for JwkSignatureVerifier {
    async fn verify(&self, jws: &CompactJws, jwk: &JWK) -> Result<()> {
        let _: Json = ssi::claims::jwt::decode_verify(jws.raw(), &jwk.to_public())
            .context("signature could not be verified")?;
        Ok(())
    }
}

/// RFC 7638 thumbprint of a JWK, base64url encoded.
pub fn jwk_thumbprint(jwk: &JWK) -> Result<String> {
    jwk.thumbprint().context("failed to compute JWK thumbprint")
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn private_jwk() -> JWK {
        let secret = p256::SecretKey::random(&mut rand::rngs::OsRng);
        serde_json::from_str(&secret.to_jwk_string()).unwrap()
    }

    #[tokio::test]
    async fn internal_key_round_trip() {
        let key = private_jwk();
        let material = SignatureMaterial::Internal(InternalSignature {
            key: key.clone(),
            did: None,
            kid: Some("key-1".into()),
            alg: SigningAlgorithm::ES256,
        });
        material.validate().unwrap();

        let header = JwsHeader::new("ES256").with_kid(material.kid());
        let token = material.sign(&header, &json!({ "a": 1 })).await.unwrap();
        let jws = CompactJws::parse(&token).unwrap();

        JwkSignatureVerifier
            .verify(&jws, &key.to_public())
            .await
            .unwrap();

        let other = private_jwk().to_public();
        assert!(JwkSignatureVerifier.verify(&jws, &other).await.is_err());
    }

    #[tokio::test]
    async fn eddsa_internal_key() {
        let key: JWK =
            serde_json::from_str(include_str!("../../tests/examples/holder_ed25519.jwk")).unwrap();
        let material = SignatureMaterial::Internal(InternalSignature {
            key: key.clone(),
            did: None,
            kid: None,
            alg: SigningAlgorithm::EdDSA,
        });
        material.validate().unwrap();

        let token = material
            .sign(&JwsHeader::new("EdDSA"), &json!({ "a": 1 }))
            .await
            .unwrap();
        let jws = CompactJws::parse(&token).unwrap();
        JwkSignatureVerifier
            .verify(&jws, &key.to_public())
            .await
            .unwrap();

        let mismatched = SignatureMaterial::Internal(InternalSignature {
            key,
            did: None,
            kid: None,
            alg: SigningAlgorithm::ES256,
        });
        assert!(mismatched.validate().is_err());
    }

    #[test]
    fn public_key_is_not_signing_material() {
        let material = SignatureMaterial::Internal(InternalSignature {
            key: private_jwk().to_public(),
            did: None,
            kid: None,
            alg: SigningAlgorithm::ES256,
        });
        assert!(material.validate().is_err());
        assert!(SignatureMaterial::None.validate().is_err());
    }

    #[test]
    fn kid_falls_back_to_did() {
        let material = SignatureMaterial::Supplied(SuppliedSignature {
            signer: Arc::new(P256Signer::random().unwrap()),
            did: Some("did:example:123".into()),
            kid: None,
        });
        assert_eq!(material.kid().as_deref(), Some("did:example:123"));
        assert_eq!(material.algorithm().unwrap(), SigningAlgorithm::ES256);
    }

    #[test]
    fn thumbprint_ignores_private_part() {
        let key = private_jwk();
        assert_eq!(
            jwk_thumbprint(&key).unwrap(),
            jwk_thumbprint(&key.to_public()).unwrap()
        );
    }
}
