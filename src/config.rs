use serde::Deserialize;
use url::Url;

use crate::core::{
    policy::{CheckLinkedDomain, RevocationVerification},
    version::SupportedVersion,
};

/// Deployment settings of a response verifier.
///
/// Every field has a default, so an empty object is a valid configuration:
///
/// ```json
/// {
///   "version": "SIOPv2_D11",
///   "revocation": "if_present",
///   "linked_domain": "if_present",
///   "universal_resolver": "https://dev.uniresolver.io/"
/// }
/// ```
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct PolicyConfig {
    pub version: SupportedVersion,
    pub revocation: RevocationVerification,
    pub linked_domain: CheckLinkedDomain,
    /// Resolver for DID methods without a dedicated resolver.
    pub universal_resolver: Option<BaseUrl>,
}

/// A url that is always a base (can be safely join()'ed with further path elements without
/// mangling).
#[derive(Deserialize, Debug, Clone, Hash, PartialEq, Eq)]
#[serde(try_from = "String")]
pub struct BaseUrl(Url);

impl std::ops::Deref for BaseUrl {
    type Target = Url;

    fn deref(&self) -> &Url {
        &self.0
    }
}

impl TryFrom<String> for BaseUrl {
    type Error = url::ParseError;

    fn try_from(mut url: String) -> Result<Self, Self::Error> {
        // Make URL a base.
        if !url.ends_with('/') {
            url += "/"
        }
        url.parse().map(Self)
    }
}
