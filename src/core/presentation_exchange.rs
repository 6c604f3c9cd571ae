use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json_path::JsonPath;

use super::{
    presentation_definition::PresentationDefinitionWithLocation,
    presentation_submission::{DescriptorMap, PresentationSubmission},
    response::{
        presentation::{LocatedPresentation, VerifiablePresentationPayload},
        VpTokenLocation,
    },
};
use crate::core::presentation_definition::PresentationDefinition;

/// Presentation exchange error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PexError {
    /// Definitions were requested but no presentation was supplied.
    #[error("presentation definitions were requested but no presentation was supplied")]
    ExpectedPresentationMissing,

    /// Presentations were supplied although none were requested.
    #[error("presentations were supplied but no presentation definition was requested")]
    UnexpectedPresentationSupplied,

    /// Only one presentation per definition is supported.
    #[error("{definitions} presentation definition(s) but {presentations} presentation(s)")]
    DefinitionPresentationCountMismatch {
        definitions: usize,
        presentations: usize,
    },

    #[error("definition `{definition_id}` expects its presentation in {expected}, not {found}")]
    LocationMismatch {
        definition_id: String,
        expected: VpTokenLocation,
        found: VpTokenLocation,
    },

    #[error("presentation does not satisfy definition `{definition_id}`: {reason}")]
    DefinitionNotSatisfied {
        definition_id: String,
        reason: String,
    },
}

/// Evaluates one presentation against one definition.
///
/// Returns the submission describing how the presentation satisfies the definition.
#[async_trait]
pub trait PresentationEvaluator: std::fmt::Debug {
    async fn evaluate(
        &self,
        definition: &PresentationDefinition,
        presentation: &VerifiablePresentationPayload,
        submission: Option<&PresentationSubmission>,
    ) -> Result<PresentationSubmission>;
}

/// Evaluates input descriptor constraints (JSONPath and JSON Schema filters) against the
/// credentials of a presentation.
#[derive(Debug, Clone, Default)]
pub struct ConstraintEvaluator;

#[async_trait]
impl PresentationEvaluator for ConstraintEvaluator {
    async fn evaluate(
        &self,
        definition: &PresentationDefinition,
        presentation: &VerifiablePresentationPayload,
        submission: Option<&PresentationSubmission>,
    ) -> Result<PresentationSubmission> {
        let format = presentation.format();
        if !definition.accepts_format(&format) {
            bail!("format {format} is not accepted")
        }

        let credentials = presentation
            .credentials()
            .context("failed to read the presentation's credentials")?;

        if let Some(submission) = submission {
            if submission.definition_id() != definition.id() {
                bail!(
                    "submission references definition `{}`",
                    submission.definition_id()
                )
            }
            for d in submission.descriptor_map() {
                if definition.input_descriptor(d.id()).is_none() {
                    bail!("unknown input descriptor `{}`", d.id())
                }
            }
            // Every input descriptor must be satisfied, whatever the submission lists.
            for descriptor in definition.input_descriptors() {
                if !submission
                    .descriptor_map()
                    .iter()
                    .any(|d| d.id() == descriptor.id())
                {
                    bail!("input descriptor `{}` is not submitted", descriptor.id())
                }
            }
        }

        let descriptors = definition.input_descriptors();
        let mut descriptor_map = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let mut found = None;
            for credential in credentials.iter() {
                if !descriptor.accepts_format(&credential.format) {
                    continue;
                }
                if descriptor.is_satisfied_by(&credential.claims)? {
                    found = Some(credential);
                    break;
                }
            }

            let Some(credential) = found else {
                bail!("no credential satisfies input descriptor `{}`", descriptor.id())
            };

            descriptor_map.push(
                DescriptorMap::new(descriptor.id(), format.clone(), root_path()?).set_path_nested(
                    DescriptorMap::parse(
                        descriptor.id(),
                        credential.format.clone(),
                        &credential.path,
                    )?,
                ),
            );
        }

        Ok(PresentationSubmission::new(
            uuid::Uuid::new_v4(),
            definition.id().clone(),
            descriptor_map,
        ))
    }
}

fn root_path() -> Result<JsonPath> {
    JsonPath::parse("$").context("invalid root path")
}

/// Matches presentations with presentation definitions.
#[derive(Debug, Clone)]
pub struct PresentationExchange {
    evaluator: Arc<dyn PresentationEvaluator + Send + Sync>,
}

impl Default for PresentationExchange {
    fn default() -> Self {
        Self::new(Arc::new(ConstraintEvaluator))
    }
}

impl PresentationExchange {
    pub fn new(evaluator: Arc<dyn PresentationEvaluator + Send + Sync>) -> Self {
        Self { evaluator }
    }

    /// Check that every definition is satisfied by the presentation at the same position.
    ///
    /// Returns the submission of each definition, in order. Each of `submissions` is used for
    /// the definition it references and must reference one of `definitions`; a definition
    /// without one is evaluated against all of its input descriptors.
    pub async fn validate<P: LocatedPresentation + Sync>(
        &self,
        definitions: &[PresentationDefinitionWithLocation],
        presentations: &[P],
        submissions: &[PresentationSubmission],
    ) -> Result<Vec<PresentationSubmission>, PexError> {
        match (definitions.len(), presentations.len()) {
            (0, 0) => return Ok(Vec::new()),
            (_, 0) => return Err(PexError::ExpectedPresentationMissing),
            (0, _) => return Err(PexError::UnexpectedPresentationSupplied),
            (d, p) if d != p => {
                return Err(PexError::DefinitionPresentationCountMismatch {
                    definitions: d,
                    presentations: p,
                })
            }
            _ => {}
        }

        for submission in submissions {
            if !definitions
                .iter()
                .any(|d| d.definition().id() == submission.definition_id())
            {
                return Err(PexError::DefinitionNotSatisfied {
                    definition_id: submission.definition_id().clone(),
                    reason: "the submission references a definition that was not requested"
                        .into(),
                });
            }
        }

        let mut evaluated = Vec::with_capacity(definitions.len());
        for (definition, presentation) in definitions.iter().zip(presentations) {
            let definition_id = definition.definition().id();

            if presentation.location() != definition.vp_token_location() {
                return Err(PexError::LocationMismatch {
                    definition_id: definition_id.clone(),
                    expected: definition.vp_token_location(),
                    found: presentation.location(),
                });
            }

            let submission = submissions
                .iter()
                .find(|s| s.definition_id() == definition_id);

            let satisfied = self
                .evaluator
                .evaluate(definition.definition(), presentation.presentation(), submission)
                .await
                .map_err(|e| PexError::DefinitionNotSatisfied {
                    definition_id: definition_id.clone(),
                    reason: format!("{e:#}"),
                })?;

            tracing::debug!(definition_id, "presentation satisfies definition");
            evaluated.push(satisfied);
        }

        Ok(evaluated)
    }
}

/// Order `presentations` so the one at index `i` is located where definition `i` expects
/// it, as far as locations allow.
///
/// [PresentationExchange::validate] pairs definitions and presentations by index.
pub fn align_with_definitions<P: LocatedPresentation>(
    definitions: &[PresentationDefinitionWithLocation],
    presentations: Vec<P>,
) -> Vec<P> {
    if definitions.len() != presentations.len() {
        return presentations;
    }

    let mut remaining: Vec<Option<P>> = presentations.into_iter().map(Some).collect();
    let mut aligned = Vec::with_capacity(remaining.len());
    for definition in definitions {
        let index = remaining
            .iter()
            .position(|p| {
                p.as_ref()
                    .is_some_and(|p| p.location() == definition.vp_token_location())
            })
            .or_else(|| remaining.iter().position(Option::is_some));
        if let Some(presentation) = index.and_then(|i| remaining[i].take()) {
            aligned.push(presentation);
        }
    }
    aligned
}
