use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value as Json;

use crate::{
    core::{
        presentation_submission::{DescriptorMap, PresentationSubmission},
        response::{
            id_token::IdTokenClaims,
            parameters::VpToken,
            presentation::VerifiablePresentationWithSubmissionData,
            AuthorizationResponsePayload, VpTokenLocation,
        },
        version::SupportedVersion,
    },
    error::ResponseError,
};

/// Verifies the proofs of a presentation and of the credentials it contains.
#[async_trait]
pub trait PresentationVerifier: std::fmt::Debug {
    async fn verify_presentation(
        &self,
        presentation: &VerifiablePresentationWithSubmissionData,
    ) -> Result<()>;
}

/// The presentations of a response together with the submissions describing them.
#[derive(Debug, Default)]
pub(crate) struct SubmittedPresentations {
    pub presentations: Vec<VerifiablePresentationWithSubmissionData>,
    pub submissions: Vec<PresentationSubmission>,
}

/// Locate every presentation of `vp_token` through the descriptors of the response's
/// submissions.
///
/// Descriptors of the top-level `presentation_submission` locate presentations in the
/// response body, those of the `_vp_token` claim in the `id_token`. Entries no descriptor
/// points at are kept, located where `version` puts presentations by default.
pub(crate) fn extract(
    payload: &AuthorizationResponsePayload,
    claims: &IdTokenClaims,
    version: SupportedVersion,
) -> Result<SubmittedPresentations, ResponseError> {
    let vp_token = payload
        .vp_token()
        .transpose()
        .map_err(|e| ResponseError::MalformedResponse(format!("invalid vp_token: {e:#}")))?;
    let body_submission = payload
        .presentation_submission()
        .transpose()
        .map_err(|e| {
            ResponseError::MalformedResponse(format!("invalid presentation_submission: {e:#}"))
        })?;
    let id_token_submission = claims
        .vp_token
        .as_ref()
        .map(|v| v.presentation_submission.clone());

    let mut extracted = SubmittedPresentations::default();

    let Some(vp_token) = vp_token else {
        if body_submission.is_some() || id_token_submission.is_some() {
            return Err(ResponseError::MalformedResponse(
                "presentation_submission without vp_token".into(),
            ));
        }
        return Ok(extracted);
    };
    let vp_json = Json::from(vp_token.clone());
    let entries = vp_token.presentations();

    // Entries are told apart by position: the same presentation may be submitted twice.
    let mut described = vec![false; entries.len()];

    let located = [
        (VpTokenLocation::AuthorizationResponse, body_submission),
        (VpTokenLocation::IdToken, id_token_submission),
    ];
    for (location, submission) in located {
        let Some(submission) = submission else {
            continue;
        };

        for descriptor in submission.descriptor_map() {
            let index = select(&vp_json, descriptor)?;
            if std::mem::replace(&mut described[index], true) {
                continue;
            }
            extracted
                .presentations
                .push(VerifiablePresentationWithSubmissionData::new(
                    entries[index].clone(),
                    location,
                    descriptor.clone(),
                ));
        }
        extracted.submissions.push(submission);
    }

    let single = matches!(vp_token, VpToken::Single(_));
    for (index, entry) in entries.into_iter().enumerate() {
        if described[index] {
            continue;
        }

        let path = if single {
            "$".to_owned()
        } else {
            format!("$[{index}]")
        };
        tracing::debug!(path, "vp_token entry is not described by any submission");
        let descriptor = DescriptorMap::parse(path.clone(), entry.format(), &path)
            .map_err(|e| ResponseError::MalformedResponse(format!("{e:#}")))?;
        extracted
            .presentations
            .push(VerifiablePresentationWithSubmissionData::new(
                entry.clone(),
                version.default_vp_token_location(),
                descriptor,
            ));
    }

    Ok(extracted)
}

/// Position in `vp_token` of the entry `descriptor` points at.
fn select(vp_token: &Json, descriptor: &DescriptorMap) -> Result<usize, ResponseError> {
    let node = descriptor
        .path()
        .query(vp_token)
        .exactly_one()
        .map_err(|e| {
            ResponseError::MalformedResponse(format!(
                "descriptor `{}` does not select a single presentation: {e}",
                descriptor.id()
            ))
        })?;

    let index = match vp_token {
        Json::Array(entries) => entries.iter().position(|e| std::ptr::eq(e, node)),
        single => std::ptr::eq(single, node).then_some(0),
    };
    index.ok_or_else(|| {
        ResponseError::MalformedResponse(format!(
            "descriptor `{}` does not select a vp_token entry",
            descriptor.id()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::core::response::presentation::LocatedPresentation;
    use serde_json::json;

    fn claims(submission: Option<PresentationSubmission>) -> IdTokenClaims {
        serde_json::from_value(json!({
            "iss": "https://self-issued.me/v2",
            "sub": "did:example:holder",
            "iat": 0,
            "exp": 1,
            "_vp_token": submission.map(|s| json!({ "presentation_submission": s })),
        }))
        .unwrap()
    }

    fn ldp_vp(id: &str) -> Json {
        json!({ "id": id, "type": ["VerifiablePresentation"], "verifiableCredential": [] })
    }

    #[test]
    fn locate_by_submission() {
        let submission = PresentationSubmission::new(
            uuid::Uuid::new_v4(),
            "definition".into(),
            vec![
                DescriptorMap::parse("first", "ldp_vp", "$[1]").unwrap(),
                DescriptorMap::parse("second", "ldp_vp", "$[1]").unwrap(),
            ],
        );
        let payload: AuthorizationResponsePayload = json!({
            "vp_token": [ldp_vp("urn:vp:0"), ldp_vp("urn:vp:1")],
        })
        .try_into()
        .unwrap();

        let extracted = extract(
            &payload,
            &claims(Some(submission)),
            SupportedVersion::SiopV2D11,
        )
        .unwrap();

        assert_eq!(extracted.submissions.len(), 1);
        assert_eq!(extracted.presentations.len(), 2);

        let described = &extracted.presentations[0];
        assert_eq!(described.location(), VpTokenLocation::IdToken);
        assert_eq!(described.descriptor().id(), "first");
        assert_eq!(
            described.presentation().decoded_json().unwrap()["id"],
            "urn:vp:1"
        );

        let undescribed = &extracted.presentations[1];
        assert_eq!(
            undescribed.location(),
            VpTokenLocation::AuthorizationResponse
        );
        assert_eq!(
            undescribed.presentation().decoded_json().unwrap()["id"],
            "urn:vp:0"
        );
    }

    #[test]
    fn same_presentation_submitted_twice() {
        let submission = |definition: &str, path: &str| {
            PresentationSubmission::new(
                uuid::Uuid::new_v4(),
                definition.into(),
                vec![DescriptorMap::parse("degree", "ldp_vp", path).unwrap()],
            )
        };
        let payload: AuthorizationResponsePayload = json!({
            "vp_token": [ldp_vp("urn:vp:0"), ldp_vp("urn:vp:0")],
            "presentation_submission": submission("body-definition", "$[0]"),
        })
        .try_into()
        .unwrap();

        let extracted = extract(
            &payload,
            &claims(Some(submission("id-token-definition", "$[1]"))),
            SupportedVersion::SiopV2D11,
        )
        .unwrap();

        assert_eq!(extracted.presentations.len(), 2);
        assert_eq!(
            extracted.presentations[0].location(),
            VpTokenLocation::AuthorizationResponse
        );
        assert_eq!(
            extracted.presentations[1].location(),
            VpTokenLocation::IdToken
        );
        assert_eq!(
            extracted.presentations[0].presentation(),
            extracted.presentations[1].presentation()
        );
    }

    #[test]
    fn submission_needs_vp_token() {
        let submission = PresentationSubmission::new(
            uuid::Uuid::new_v4(),
            "definition".into(),
            vec![DescriptorMap::parse("first", "ldp_vp", "$").unwrap()],
        );
        let result = extract(
            &AuthorizationResponsePayload::new(),
            &claims(Some(submission)),
            SupportedVersion::SiopV2D11,
        );
        assert!(matches!(result, Err(ResponseError::MalformedResponse(_))));

        let empty = extract(
            &AuthorizationResponsePayload::new(),
            &claims(None),
            SupportedVersion::SiopV2D11,
        )
        .unwrap();
        assert!(empty.presentations.is_empty());
    }
}
