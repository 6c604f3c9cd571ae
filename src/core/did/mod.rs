//! DID documents and pluggable DID resolution.
//!
//! Resolution is dispatched on the DID method through a [ResolverRegistry]. `did:jwk` is
//! resolved locally and `did:key` through `ssi`; other methods go to a fallback resolver such
//! as the [UniversalResolver](universal::UniversalResolver).

use std::{collections::HashMap, sync::Arc};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use ssi::jwk::JWK;

pub mod jwk;
pub mod key;
pub mod universal;

pub use self::jwk::{did_jwk, DidJwkResolver};
pub use self::key::DidKeyResolver;
pub use self::universal::UniversalResolver;

/// Service type whose presence marks a DID as linked to web domains.
pub const LINKED_DOMAINS: &str = "LinkedDomains";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub controller: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_jwk: Option<JWK>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    /// A single type or a set of types.
    #[serde(rename = "type")]
    pub type_: Json,
    pub service_endpoint: Json,
}

impl Service {
    pub fn has_type(&self, type_: &str) -> bool {
        match &self.type_ {
            Json::String(s) => s == type_,
            Json::Array(types) => types.iter().any(|t| t.as_str() == Some(type_)),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub verification_method: Vec<VerificationMethod>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authentication: Vec<Json>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertion_method: Vec<Json>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service: Vec<Service>,
}

impl DidDocument {
    /// The public key of the verification method referenced by `kid`.
    ///
    /// `kid` may be an absolute DID URL or a bare fragment. Without a fragment the first
    /// verification method carrying a JWK is used.
    pub fn find_jwk(&self, kid: Option<&str>) -> Option<&JWK> {
        let fragment = kid
            .and_then(|kid| split_did_url(kid).1)
            .filter(|f| !f.is_empty());

        match fragment {
            Some(fragment) => self
                .verification_method
                .iter()
                .find(|vm| {
                    split_did_url(&vm.id).1 == Some(fragment)
                        || vm.id.strip_prefix('#') == Some(fragment)
                })
                .and_then(|vm| vm.public_key_jwk.as_ref()),
            None => self
                .verification_method
                .iter()
                .find_map(|vm| vm.public_key_jwk.as_ref()),
        }
    }

    pub fn has_service_type(&self, type_: &str) -> bool {
        self.service.iter().any(|s| s.has_type(type_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidResolutionResult {
    pub did_document: DidDocument,
    #[serde(default)]
    pub did_resolution_metadata: Map<String, Json>,
    #[serde(default)]
    pub did_document_metadata: Map<String, Json>,
}

impl From<DidDocument> for DidResolutionResult {
    fn from(did_document: DidDocument) -> Self {
        Self {
            did_document,
            did_resolution_metadata: Map::new(),
            did_document_metadata: Map::new(),
        }
    }
}

/// Resolves a DID to its document.
#[async_trait]
pub trait DidResolver: std::fmt::Debug {
    async fn resolve(&self, did: &str) -> Result<DidResolutionResult>;
}

/// Per-method resolvers with an optional fallback.
#[derive(Debug, Clone)]
pub struct ResolverRegistry {
    methods: HashMap<String, Arc<dyn DidResolver + Send + Sync>>,
    fallback: Option<Arc<dyn DidResolver + Send + Sync>>,
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        Self::empty()
            .with_method("jwk", Arc::new(DidJwkResolver))
            .with_method("key", Arc::new(DidKeyResolver))
    }
}

impl ResolverRegistry {
    /// A registry that resolves nothing.
    pub fn empty() -> Self {
        Self {
            methods: HashMap::new(),
            fallback: None,
        }
    }

    pub fn with_method(
        mut self,
        method: impl Into<String>,
        resolver: Arc<dyn DidResolver + Send + Sync>,
    ) -> Self {
        self.methods.insert(method.into(), resolver);
        self
    }

    pub fn with_fallback(mut self, resolver: Arc<dyn DidResolver + Send + Sync>) -> Self {
        self.fallback = Some(resolver);
        self
    }

    pub async fn resolve(&self, did: &str) -> Result<DidResolutionResult> {
        let method = did_method(did).with_context(|| format!("'{did}' is not a DID"))?;

        let resolver = match self.methods.get(method).or(self.fallback.as_ref()) {
            Some(resolver) => resolver,
            None => bail!("no resolver for DID method '{method}'"),
        };

        tracing::debug!(did, method, "resolving DID");
        let resolution = resolver.resolve(did).await?;

        if resolution.did_document.id != did {
            bail!(
                "resolved document '{}' does not describe '{did}'",
                resolution.did_document.id
            )
        }

        Ok(resolution)
    }
}

pub fn is_did(value: &str) -> bool {
    did_method(value).is_some()
}

/// The method name of a DID (or DID URL).
pub fn did_method(did: &str) -> Option<&str> {
    let mut parts = did.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("did"), Some(method), Some(id)) if !method.is_empty() && !id.is_empty() => {
            Some(method)
        }
        _ => None,
    }
}

/// Split a DID URL into the DID and its fragment.
pub fn split_did_url(did_url: &str) -> (&str, Option<&str>) {
    match did_url.split_once('#') {
        Some((did, fragment)) => (did, Some(fragment)),
        None => (did_url, None),
    }
}
