use ssi::jwk::JWK;

use crate::{
    core::{
        did::{is_did, split_did_url, DidResolutionResult, ResolverRegistry},
        jwt::CompactJws,
        response::id_token::IdTokenClaims,
        signature::{jwk_thumbprint, SignatureVerifier},
        version::{SigningAlgorithm, SupportedVersion},
    },
    error::ResponseError,
};

/// Who signed an `id_token`.
#[derive(Debug, Clone, PartialEq)]
pub struct SignerInfo {
    /// `None` when the token is signed with the bare key of `sub_jwk`.
    pub did: Option<String>,
    pub kid: Option<String>,
    pub jwk: JWK,
    pub alg: SigningAlgorithm,
}

/// Find the key the token claims to be signed with and check the signature against it.
pub(crate) async fn verify_signature(
    jws: &CompactJws,
    claims: &IdTokenClaims,
    version: SupportedVersion,
    resolvers: &ResolverRegistry,
    verifier: &(dyn SignatureVerifier + Send + Sync),
) -> Result<(SignerInfo, Option<DidResolutionResult>), ResponseError> {
    let header = jws.header();
    let alg: SigningAlgorithm = header
        .alg
        .parse()
        .map_err(|e| ResponseError::SignatureInvalid(format!("{e:#}")))?;
    if !version.supports_algorithm(alg) {
        return Err(ResponseError::SignatureInvalid(format!(
            "{alg} is not accepted by {version}"
        )));
    }

    let kid = header.kid.clone();
    let did = kid
        .as_deref()
        .map(|kid| split_did_url(kid).0)
        .filter(|did| is_did(did))
        .or_else(|| Some(claims.sub.as_str()).filter(|sub| is_did(sub)))
        .map(ToOwned::to_owned);

    let (jwk, resolution) = match &did {
        Some(did) => {
            if is_did(&claims.sub) && &claims.sub != did {
                return Err(ResponseError::SignatureInvalid(format!(
                    "signed by '{did}' on behalf of '{}'",
                    claims.sub
                )));
            }

            let resolution =
                resolvers
                    .resolve(did)
                    .await
                    .map_err(|e| ResponseError::DidResolutionFailed {
                        did: did.clone(),
                        reason: format!("{e:#}"),
                    })?;
            let Some(jwk) = resolution.did_document.find_jwk(kid.as_deref()).cloned() else {
                return Err(ResponseError::SignatureInvalid(format!(
                    "'{did}' has no verification method matching {kid:?}"
                )));
            };
            (jwk, Some(resolution))
        }
        None => {
            let Some(jwk) = &claims.sub_jwk else {
                return Err(ResponseError::SignatureInvalid(
                    "the token names neither a DID nor a sub_jwk".into(),
                ));
            };
            let thumbprint = jwk_thumbprint(jwk)
                .map_err(|e| ResponseError::SignatureInvalid(format!("{e:#}")))?;
            if thumbprint != claims.sub {
                return Err(ResponseError::SignatureInvalid(
                    "sub is not the thumbprint of sub_jwk".into(),
                ));
            }
            (jwk.clone(), None)
        }
    };

    verifier
        .verify(jws, &jwk)
        .await
        .map_err(|e| ResponseError::SignatureInvalid(format!("{e:#}")))?;

    Ok((SignerInfo { did, kid, jwk, alg }, resolution))
}

/// Expectations on the claims of an `id_token`.
pub(crate) struct ClaimExpectations<'a> {
    pub audience: Option<&'a str>,
    pub nonce: Option<&'a str>,
    pub state: Option<&'a str>,
    pub now: i64,
}

pub(crate) fn validate_claims(
    claims: &IdTokenClaims,
    response_state: Option<&str>,
    expected: &ClaimExpectations<'_>,
) -> Result<(), ResponseError> {
    let Some(nonce) = &claims.nonce else {
        return Err(ResponseError::MissingNonce);
    };
    if expected.nonce.is_some_and(|n| n != nonce) {
        return Err(ResponseError::NonceMismatch);
    }

    if claims.exp <= expected.now {
        return Err(ResponseError::Expired {
            exp: claims.exp,
            now: expected.now,
        });
    }
    if claims.exp <= claims.iat {
        return Err(ResponseError::InvalidTimestamps {
            iat: claims.iat,
            exp: claims.exp,
        });
    }

    match (expected.audience, claims.aud.as_deref()) {
        (None, None) => {}
        (Some(expected), Some(found)) if expected == found => {}
        (Some(expected), Some(found)) => {
            return Err(ResponseError::AudienceInvalid {
                expected: expected.to_owned(),
                found: found.to_owned(),
            })
        }
        (expected, found) => {
            return Err(ResponseError::AudienceMismatch {
                expected: expected.map(ToOwned::to_owned),
                found: found.map(ToOwned::to_owned),
            })
        }
    }

    if let Some(state) = expected.state {
        if response_state.or(claims.state.as_deref()) != Some(state) {
            return Err(ResponseError::StateMismatch);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> IdTokenClaims {
        IdTokenClaims {
            iss: "https://self-issued.me/v2".into(),
            sub: "did:example:holder".into(),
            sub_jwk: None,
            aud: Some("https://rp.example/cb".into()),
            iat: 1_000,
            exp: 1_600,
            auth_time: Some(1_000),
            nonce: Some("n-0S6_WzA2Mj".into()),
            state: None,
            vp_token: None,
        }
    }

    fn expectations(audience: Option<&str>) -> ClaimExpectations<'_> {
        ClaimExpectations {
            audience,
            nonce: None,
            state: None,
            now: 1_100,
        }
    }

    #[test]
    fn audience_symmetry() {
        let claims = claims();
        let expected = expectations(Some("https://rp.example/cb"));
        assert!(validate_claims(&claims, None, &expected).is_ok());

        assert_eq!(
            validate_claims(&claims, None, &expectations(None)),
            Err(ResponseError::AudienceMismatch {
                expected: None,
                found: Some("https://rp.example/cb".into())
            })
        );
        assert!(matches!(
            validate_claims(&claims, None, &expectations(Some("https://other.example"))),
            Err(ResponseError::AudienceInvalid { .. })
        ));

        let no_aud = IdTokenClaims {
            aud: None,
            ..claims
        };
        assert!(matches!(
            validate_claims(&no_aud, None, &expectations(Some("https://rp.example/cb"))),
            Err(ResponseError::AudienceMismatch { found: None, .. })
        ));
    }

    #[test]
    fn lifetime() {
        let expected = ClaimExpectations {
            now: 1_600,
            ..expectations(Some("https://rp.example/cb"))
        };
        assert_eq!(
            validate_claims(&claims(), None, &expected),
            Err(ResponseError::Expired {
                exp: 1_600,
                now: 1_600
            })
        );

        let inverted = IdTokenClaims {
            iat: 2_000,
            ..claims()
        };
        assert!(matches!(
            validate_claims(&inverted, None, &expectations(Some("https://rp.example/cb"))),
            Err(ResponseError::InvalidTimestamps { .. })
        ));
    }

    #[test]
    fn nonce_and_state() {
        let without_nonce = IdTokenClaims {
            nonce: None,
            ..claims()
        };
        assert_eq!(
            validate_claims(&without_nonce, None, &expectations(Some("https://rp.example/cb"))),
            Err(ResponseError::MissingNonce)
        );

        let expected = ClaimExpectations {
            nonce: Some("other"),
            ..expectations(Some("https://rp.example/cb"))
        };
        assert_eq!(
            validate_claims(&claims(), None, &expected),
            Err(ResponseError::NonceMismatch)
        );

        let expected = ClaimExpectations {
            state: Some("af0ifjsldkj"),
            ..expectations(Some("https://rp.example/cb"))
        };
        assert!(validate_claims(&claims(), Some("af0ifjsldkj"), &expected).is_ok());
        assert_eq!(
            validate_claims(&claims(), Some("xyz"), &expected),
            Err(ResponseError::StateMismatch)
        );
        assert_eq!(
            validate_claims(&claims(), None, &expected),
            Err(ResponseError::StateMismatch)
        );
    }
}
