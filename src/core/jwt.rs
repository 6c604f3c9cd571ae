//! Compact JWS encoding and decoding.
//!
//! Only the compact serialization is supported: `header.claims.signature`, each segment
//! base64url encoded without padding.

use anyhow::{bail, Context, Result};
use base64::prelude::*;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use ssi::jwk::JWK;

use super::signature::PayloadSigner;

/// The protected header of a JWS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwsHeader {
    pub alg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk: Option<JWK>,
}

impl JwsHeader {
    pub fn new(alg: impl Into<String>) -> Self {
        Self {
            alg: alg.into(),
            kid: None,
            typ: None,
            jwk: None,
        }
    }

    pub fn with_kid(mut self, kid: Option<String>) -> Self {
        self.kid = kid;
        self
    }

    pub fn with_typ(mut self, typ: impl Into<String>) -> Self {
        self.typ = Some(typ.into());
        self
    }
}

/// A parsed, not yet verified, compact JWS.
#[derive(Debug, Clone)]
pub struct CompactJws {
    raw: String,
    header: JwsHeader,
    claims: Map<String, Json>,
}

impl CompactJws {
    /// Split and decode a compact JWS.
    ///
    /// # Errors
    ///
    /// Fails unless the token has three base64url segments, a JSON header carrying `alg`,
    /// and a JSON object as claims.
    pub fn parse(raw: &str) -> Result<Self> {
        let (header, claims) = decode_unverified(raw)?;
        Ok(Self {
            raw: raw.to_owned(),
            header,
            claims,
        })
    }

    /// The compact serialization the signature is checked over.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn header(&self) -> &JwsHeader {
        &self.header
    }

    pub fn claims(&self) -> &Map<String, Json> {
        &self.claims
    }
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T> {
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(segment)
        .context("segment is not base64url encoded")?;
    serde_json::from_slice(&bytes).context("segment is not valid JSON")
}

/// Decode the header and claims of a JWT without checking its signature.
///
/// Used to read presentations and credentials whose proofs are checked by the caller.
pub fn decode_unverified(token: &str) -> Result<(JwsHeader, Map<String, Json>)> {
    let (header_b64, claims_b64, signature_b64) =
        ssi::claims::jws::split_jws(token).context("expected a compact JWS")?;
    if header_b64.is_empty() || claims_b64.is_empty() || signature_b64.contains('.') {
        bail!("expected a compact JWS with three segments")
    }

    let header = decode_segment(header_b64).context("invalid JWS header")?;
    let claims = decode_segment(claims_b64).context("JWS claims are not a JSON object")?;
    Ok((header, claims))
}

/// `base64url(header) || '.' || base64url(claims)`
pub fn signing_input(header: &JwsHeader, claims: &impl Serialize) -> Result<String> {
    let header_b64: String =
        serde_json::to_vec(header).map(|b| BASE64_URL_SAFE_NO_PAD.encode(b))?;
    let claims_b64 = serde_json::to_vec(claims).map(|b| BASE64_URL_SAFE_NO_PAD.encode(b))?;
    Ok(format!("{header_b64}.{claims_b64}"))
}

/// Sign `claims` with `signer` and return the compact serialization.
pub async fn encode_sign<S: PayloadSigner + ?Sized>(
    header: &JwsHeader,
    claims: &impl Serialize,
    signer: &S,
) -> Result<String> {
    let payload = signing_input(header, claims)?;
    let signature = signer.sign(payload.as_bytes()).await?;
    let signature_b64 = BASE64_URL_SAFE_NO_PAD.encode(signature);
    Ok(format!("{payload}.{signature_b64}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::core::signature::P256Signer;
    use serde_json::json;

    #[tokio::test]
    async fn encode_then_parse() {
        let signer = P256Signer::random().unwrap();
        let header = JwsHeader::new("ES256").with_typ("JWT");
        let token = encode_sign(&header, &json!({ "sub": "alice" }), &signer)
            .await
            .unwrap();

        let jws = CompactJws::parse(&token).unwrap();
        assert_eq!(jws.header(), &header);
        assert_eq!(jws.claims().get("sub"), Some(&json!("alice")));
        assert_eq!(jws.raw(), token);
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(CompactJws::parse("").is_err());
        assert!(CompactJws::parse("a.b").is_err());
        assert!(CompactJws::parse("a.b.c.d").is_err());
        // `{"typ":"JWT"}` has no `alg`.
        assert!(CompactJws::parse("eyJ0eXAiOiJKV1QifQ.e30.").is_err());
        // Claims must be an object.
        assert!(CompactJws::parse("eyJhbGciOiJFUzI1NiJ9.WzFd.").is_err());
    }
}
