use super::credential_format::*;
use super::input_descriptor::*;
use super::response::VpTokenLocation;
use super::version::SupportedVersion;

use serde::{Deserialize, Serialize};

/// A presentation definition is a JSON object that describes the information a Verifier
/// requires of a Holder.
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-definition](https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-definition)
#[derive(Clone, Default, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresentationDefinition {
    id: String,
    input_descriptors: Vec<InputDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<ClaimFormatMap>,
}

impl PresentationDefinition {
    pub fn new(id: String, input_descriptor: InputDescriptor) -> Self {
        Self {
            id,
            input_descriptors: vec![input_descriptor],
            ..Default::default()
        }
    }

    pub fn id(&self) -> &String {
        &self.id
    }

    pub fn input_descriptors(&self) -> &Vec<InputDescriptor> {
        &self.input_descriptors
    }

    /// Look up an input descriptor by its id.
    pub fn input_descriptor(&self, id: &str) -> Option<&InputDescriptor> {
        self.input_descriptors.iter().find(|d| d.id() == id)
    }

    /// Whether a presentation of the given format is acceptable for this definition.
    pub fn accepts_format(&self, format: &ClaimFormatDesignation) -> bool {
        match &self.format {
            None => true,
            Some(map) if map.is_empty() => true,
            Some(map) => map.keys().any(|requested| requested.accepts(format)),
        }
    }
}

/// Where a presentation definition was found in the authorization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PresentationDefinitionLocation {
    /// Nested in the `claims` request parameter, at `claims.vp_token`.
    #[serde(rename = "claims.vp_token")]
    ClaimsVpToken,
    /// The top level `presentation_definition` request parameter.
    #[serde(rename = "presentation_definition")]
    TopLevelPresentationDefinition,
}

/// A presentation definition together with where it came from and the envelope its
/// presentations must be submitted in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationDefinitionWithLocation {
    definition: PresentationDefinition,
    location: PresentationDefinitionLocation,
    vp_token_location: VpTokenLocation,
}

impl PresentationDefinitionWithLocation {
    pub fn new(
        definition: PresentationDefinition,
        location: PresentationDefinitionLocation,
        vp_token_location: VpTokenLocation,
    ) -> Self {
        Self {
            definition,
            location,
            vp_token_location,
        }
    }

    /// A definition whose presentations go where `version` submits them by default.
    pub fn for_version(
        definition: PresentationDefinition,
        location: PresentationDefinitionLocation,
        version: SupportedVersion,
    ) -> Self {
        Self::new(definition, location, version.default_vp_token_location())
    }

    pub fn definition(&self) -> &PresentationDefinition {
        &self.definition
    }

    pub fn location(&self) -> PresentationDefinitionLocation {
        self.location
    }

    pub fn vp_token_location(&self) -> VpTokenLocation {
        self.vp_token_location
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_definition_fixture() {
        let jd = &mut serde_json::Deserializer::from_str(include_str!(
            "../../tests/examples/presentation_definition.json"
        ));
        let definition: PresentationDefinition = serde_path_to_error::deserialize(jd).unwrap();

        assert_eq!(definition.id(), "degree-definition");
        assert!(definition.input_descriptor("university_degree").is_some());
        assert!(definition.accepts_format(&ClaimFormatDesignation::JwtVp));
        assert!(!definition.accepts_format(&ClaimFormatDesignation::LdpVp));
    }

    #[test]
    fn unset_envelope_follows_version() {
        let with_location = PresentationDefinitionWithLocation::for_version(
            PresentationDefinition::default(),
            PresentationDefinitionLocation::ClaimsVpToken,
            SupportedVersion::SiopV2Id1,
        );
        assert_eq!(with_location.vp_token_location(), VpTokenLocation::IdToken);

        let location: PresentationDefinitionLocation =
            serde_json::from_str(r#""claims.vp_token""#).unwrap();
        assert_eq!(location, PresentationDefinitionLocation::ClaimsVpToken);
    }
}
