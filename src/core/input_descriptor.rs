use super::credential_format::*;
use crate::utils::NonEmptyVec;

use anyhow::{anyhow, bail, Context, Result};
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use serde_json_path::JsonPath;

/// A GroupId represents a unique identifier for a group of Input Descriptors.
pub type GroupId = String;

/// The predicate Feature introduces properties enabling Verifier to request that Holder apply
/// a predicate and return the result.
///
/// See: [https://identity.foundation/presentation-exchange/#predicate-feature](https://identity.foundation/presentation-exchange/#predicate-feature)
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub enum Predicate {
    #[serde(rename = "required")]
    Required,
    #[serde(rename = "preferred")]
    Preferred,
}

/// Input Descriptors are objects used to describe the information a Verifier requires of a Holder.
///
/// All Input Descriptors MUST be satisfied by the presented credentials.
///
/// See: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object](https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputDescriptor {
    id: String,
    #[serde(default)]
    constraints: Constraints,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(default, skip_serializing_if = "ClaimFormatMap::is_empty")]
    format: ClaimFormatMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    group: Vec<GroupId>,
}

impl InputDescriptor {
    pub fn new(id: String, constraints: Constraints) -> Self {
        Self {
            id,
            constraints,
            ..Default::default()
        }
    }

    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Whether a credential of the given format may be submitted for this descriptor.
    pub fn accepts_format(&self, format: &ClaimFormatDesignation) -> bool {
        self.format.is_empty() || self.format.keys().any(|requested| requested.accepts(format))
    }

    /// Check whether the decoded `credential` satisfies every required constraint field.
    ///
    /// # Errors
    ///
    /// Returns an error when the descriptor itself is malformed (an unparsable JSONPath, an
    /// invalid filter schema, or a required predicate without a filter).
    pub fn is_satisfied_by(&self, credential: &Json) -> Result<bool> {
        if let Some(ConstraintsLimitDisclosure::Required) = self.constraints.limit_disclosure {
            if self.constraints.fields.is_empty() {
                bail!("input descriptor '{}': required limit disclosure must have fields", self.id)
            }
        }

        for field in self.constraints.fields.iter() {
            if !field
                .matches(credential)
                .with_context(|| format!("input descriptor '{}'", self.id))?
            {
                tracing::debug!(
                    input_descriptor = self.id,
                    "credential does not satisfy field {:?}",
                    field.path()
                );
                return Ok(false);
            }
        }

        Ok(true)
    }
}

/// Constraints are objects used to describe the constraints that a Holder must satisfy to
/// fulfill an Input Descriptor.
///
/// A constraint object MAY be empty, or it may include `fields` and `limit_disclosure`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    fields: Vec<ConstraintsField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit_disclosure: Option<ConstraintsLimitDisclosure>,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_constraint(mut self, field: ConstraintsField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn add_path(mut self, path: String) -> Self {
        self.path.push(path);
        self
    }

    pub fn path(&self) -> &NonEmptyVec<String> {
        &self.path
    }

    pub fn set_filter(mut self, filter: Json) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn set_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn set_optional(mut self, optional: bool) -> Self {
        self.optional = Some(optional);
        self
    }

    pub fn is_optional(&self) -> bool {
        self.optional.unwrap_or(false)
    }

    /// Evaluate the field against a credential.
    ///
    /// Paths are tried in order against the credential itself and, for JWT VCs, against
    /// its `vc` claim. The first path that selects anything decides: at least one selected
    /// value must pass the filter. When no path selects a value the field is satisfied only
    /// if it is optional.
    pub fn matches(&self, credential: &Json) -> Result<bool> {
        if let (Some(Predicate::Required), None) = (&self.predicate, &self.filter) {
            bail!("required predicate must have a filter")
        }

        let validator = match &self.filter {
            Some(filter) => Some(
                JSONSchema::compile(filter).map_err(|e| anyhow!("invalid filter: {e}"))?,
            ),
            None => None,
        };

        let mut roots = vec![credential];
        if let Some(vc) = credential.get("vc") {
            roots.push(vc);
        }

        for raw in self.path.iter() {
            let path = JsonPath::parse(raw).with_context(|| format!("invalid path '{raw}'"))?;

            let selected: Vec<&Json> = roots
                .iter()
                .flat_map(|root| path.query(root).all())
                .collect();

            if selected.is_empty() {
                continue;
            }

            return Ok(match &validator {
                Some(validator) => selected.iter().any(|value| validator.is_valid(value)),
                None => true,
            });
        }

        Ok(self.is_optional())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintsLimitDisclosure {
    Required,
    Preferred,
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn credential() -> Json {
        json!({
            "type": ["VerifiableCredential", "UniversityDegreeCredential"],
            "credentialSubject": {
                "id": "did:example:holder",
                "degree": { "type": "BachelorDegree" }
            }
        })
    }

    #[test]
    fn field_with_filter() {
        let field = ConstraintsField::new("$.type".into()).set_filter(json!({
            "type": "array",
            "contains": { "const": "UniversityDegreeCredential" }
        }));
        assert!(field.matches(&credential()).unwrap());

        let field = ConstraintsField::new("$.type".into()).set_filter(json!({
            "type": "array",
            "contains": { "const": "DriversLicense" }
        }));
        assert!(!field.matches(&credential()).unwrap());
    }

    #[test]
    fn falls_through_to_next_path() {
        let field = ConstraintsField::new("$.credentialSubject.birthDate".into())
            .add_path("$.credentialSubject.degree.type".into())
            .set_filter(json!({ "type": "string", "pattern": "^Bachelor" }));

        assert!(field.matches(&credential()).unwrap());
    }

    #[test]
    fn optional_field_may_be_absent() {
        let required = ConstraintsField::new("$.credentialSubject.email".into());
        let optional = required.clone().set_optional(true);

        assert!(!required.matches(&credential()).unwrap());
        assert!(optional.matches(&credential()).unwrap());
    }

    #[test]
    fn jwt_vc_claims_are_searched() {
        let jwt_vc_claims = json!({ "iss": "did:example:issuer", "vc": credential() });
        let field = ConstraintsField::new("$.credentialSubject.id".into());

        assert!(field.matches(&jwt_vc_claims).unwrap());
    }

    #[test]
    fn required_predicate_without_filter_is_an_error() {
        let field = ConstraintsField::new("$.type".into()).set_predicate(Predicate::Required);
        assert!(field.matches(&credential()).is_err());
    }

    #[test]
    fn descriptor_requires_all_fields() {
        let descriptor = InputDescriptor::new(
            "degree".into(),
            Constraints::new()
                .add_constraint(ConstraintsField::new("$.type".into()))
                .add_constraint(ConstraintsField::new("$.credentialSubject.gpa".into())),
        );

        assert!(!descriptor.is_satisfied_by(&credential()).unwrap());
    }
}
