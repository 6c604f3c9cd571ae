use super::{credential_format::*, object::TypedParameter};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use serde_json_path::JsonPath;

/// A DescriptorMapId is a unique identifier for a DescriptorMap.
pub type DescriptorMapId = String;

/// Presentation Submissions express how the presented proofs satisfy the input descriptors
/// of a presentation definition.
///
/// Embedded Presentation Submission objects MUST be located within target data format as
/// the value of a `presentation_submission` property.
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-submission](https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-submission)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresentationSubmission {
    id: uuid::Uuid,
    definition_id: DescriptorMapId,
    descriptor_map: Vec<DescriptorMap>,
}

impl TypedParameter for PresentationSubmission {
    const KEY: &'static str = "presentation_submission";
}

impl PresentationSubmission {
    pub fn new(
        id: uuid::Uuid,
        definition_id: DescriptorMapId,
        descriptor_map: Vec<DescriptorMap>,
    ) -> Self {
        Self {
            id,
            definition_id,
            descriptor_map,
        }
    }

    pub fn id(&self) -> &uuid::Uuid {
        &self.id
    }

    pub fn definition_id(&self) -> &String {
        &self.definition_id
    }

    pub fn descriptor_map(&self) -> &Vec<DescriptorMap> {
        &self.descriptor_map
    }

}

impl TryFrom<Json> for PresentationSubmission {
    type Error = anyhow::Error;

    fn try_from(raw: Json) -> Result<Self, Self::Error> {
        match raw {
            // Form encoded responses carry the submission as JSON text.
            Json::String(s) => serde_json::from_str(&s),
            raw => serde_json::from_value(raw),
        }
        .context("invalid presentation submission")
    }
}

impl TryFrom<PresentationSubmission> for Json {
    type Error = anyhow::Error;

    fn try_from(value: PresentationSubmission) -> Result<Self, Self::Error> {
        serde_json::to_value(value).context("failed to serialize presentation submission")
    }
}

/// Descriptor Maps tie a submitted claim to the input descriptor it satisfies.
///
/// `path` is evaluated against the top level of the object the submission is embedded in;
/// `path_nested` is relative to the value selected by `path`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DescriptorMap {
    pub id: DescriptorMapId,
    pub format: ClaimFormatDesignation,
    pub path: JsonPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_nested: Option<Box<DescriptorMap>>,
}

impl DescriptorMap {
    pub fn new(
        id: impl Into<DescriptorMapId>,
        format: impl Into<ClaimFormatDesignation>,
        path: JsonPath,
    ) -> Self {
        Self {
            id: id.into(),
            format: format.into(),
            path,
            path_nested: None,
        }
    }

    /// Parse `path` and build a descriptor map from it.
    pub fn parse(
        id: impl Into<DescriptorMapId>,
        format: impl Into<ClaimFormatDesignation>,
        path: &str,
    ) -> Result<Self> {
        let path = JsonPath::parse(path).with_context(|| format!("invalid JSONPath '{path}'"))?;
        Ok(Self::new(id, format, path))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn format(&self) -> &ClaimFormatDesignation {
        &self.format
    }

    pub fn path(&self) -> &JsonPath {
        &self.path
    }

    pub fn path_nested(&self) -> Option<&DescriptorMap> {
        self.path_nested.as_deref()
    }

    /// Set the nested path of the descriptor map.
    ///
    /// The `id` property MUST be the same for each level of nesting.
    pub fn set_path_nested(mut self, mut path_nested: DescriptorMap) -> Self {
        path_nested.id.clone_from(&self.id);
        self.path_nested = Some(Box::new(path_nested));
        self
    }

    /// Re-anchor the descriptor at `path`, keeping the nested path.
    pub fn relocate(mut self, path: JsonPath, format: ClaimFormatDesignation) -> Self {
        self.path = path;
        self.format = format;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn parse_submission() {
        let value = json!({
            "id": "a30e3b91-fb77-4d22-95fa-871689c322e2",
            "definition_id": "degree-definition",
            "descriptor_map": [{
                "id": "university_degree",
                "format": "jwt_vp",
                "path": "$",
                "path_nested": {
                    "id": "university_degree",
                    "format": "jwt_vc",
                    "path": "$.vp.verifiableCredential[0]"
                }
            }]
        });

        let submission = PresentationSubmission::try_from(value.clone()).unwrap();
        let descriptor = &submission.descriptor_map()[0];

        assert_eq!(descriptor.format(), &ClaimFormatDesignation::JwtVp);
        assert_eq!(
            descriptor.path_nested().map(DescriptorMap::format),
            Some(&ClaimFormatDesignation::JwtVc)
        );
        assert_eq!(descriptor.id(), "university_degree");

        let back: Json = submission.try_into().unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn nested_descriptor_keeps_parent_id() {
        let descriptor = DescriptorMap::parse("outer", "jwt_vp", "$")
            .unwrap()
            .set_path_nested(DescriptorMap::parse("inner", "jwt_vc", "$.vp").unwrap());

        assert_eq!(descriptor.path_nested().unwrap().id(), "outer");
        assert!(DescriptorMap::parse("x", "jwt_vp", "$[").is_err());
    }
}
