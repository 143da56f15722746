// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Where raw trust data comes from.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::{ResourceNames, ValidatorConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Rules,
    RulesSignature,
    TrustList,
    TrustListSignature,
    ValueSets,
    ValueSetsSignature,
}

impl Resource {
    pub fn is_signature(self) -> bool {
        matches!(
            self,
            Resource::RulesSignature | Resource::TrustListSignature | Resource::ValueSetsSignature
        )
    }

    pub fn name(self, names: &ResourceNames) -> &str {
        match self {
            Resource::Rules => &names.rules,
            Resource::RulesSignature => &names.rules_signature,
            Resource::TrustList => &names.trust_list,
            Resource::TrustListSignature => &names.trust_list_signature,
            Resource::ValueSets => &names.value_sets,
            Resource::ValueSetsSignature => &names.value_sets_signature,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("request for {resource:?} failed: {message}")]
    Request { resource: Resource, message: String },

    #[error("request for {resource:?} returned HTTP {status}")]
    Status { resource: Resource, status: u16 },

    #[error("request for {resource:?} timed out after {timeout:?}")]
    Timeout { resource: Resource, timeout: Duration },

    #[error("trust data fetch did not complete within {0:?}")]
    Deadline(Duration),

    #[error("resource {0:?} is not available")]
    Missing(Resource),

    #[error("failed to create HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    pub fn code(&self) -> &'static str {
        match self {
            FetchError::Timeout { .. } | FetchError::Deadline(_) => "FETCH_TIMEOUT",
            _ => "FETCH_FAILED",
        }
    }
}

/// Raw blob source for the signed trust data. No retries; callers own retry policy.
#[async_trait]
pub trait TrustDataSource: Send + Sync {
    async fn fetch(&self, resource: Resource) -> Result<Vec<u8>, FetchError>;
}

/// Content/signature pairs for the three containers, not yet verified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTrustData {
    pub trust_list: Vec<u8>,
    pub trust_list_signature: Vec<u8>,
    pub rules: Vec<u8>,
    pub rules_signature: Vec<u8>,
    pub value_sets: Vec<u8>,
    pub value_sets_signature: Vec<u8>,
}

impl RawTrustData {
    /// Fetch all six resources concurrently; the first failure wins.
    #[instrument(skip_all)]
    pub async fn fetch(source: &dyn TrustDataSource) -> Result<Self, FetchError> {
        let (trust_list, trust_list_signature, rules, rules_signature, value_sets, value_sets_signature) = tokio::try_join!(
            source.fetch(Resource::TrustList),
            source.fetch(Resource::TrustListSignature),
            source.fetch(Resource::Rules),
            source.fetch(Resource::RulesSignature),
            source.fetch(Resource::ValueSets),
            source.fetch(Resource::ValueSetsSignature),
        )?;
        debug!(
            trust_list = trust_list.len(),
            rules = rules.len(),
            value_sets = value_sets.len(),
            "fetched trust data"
        );
        Ok(Self {
            trust_list,
            trust_list_signature,
            rules,
            rules_signature,
            value_sets,
            value_sets_signature,
        })
    }
}

/// Plain HTTP GET of `<base><resource name>`.
#[derive(Debug, Clone)]
pub struct HttpTrustDataSource {
    client: Client,
    content_base_url: String,
    signature_base_url: String,
    resources: ResourceNames,
    timeout: Duration,
}

impl HttpTrustDataSource {
    pub fn new(config: &ValidatorConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout)
            .user_agent(format!("hcert/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self {
            client,
            content_base_url: config.content_base_url.clone(),
            signature_base_url: config.signature_base_url.clone(),
            resources: config.resources.clone(),
            timeout: config.request_timeout,
        })
    }

    pub fn url(&self, resource: Resource) -> String {
        let base = if resource.is_signature() {
            &self.signature_base_url
        } else {
            &self.content_base_url
        };
        format!("{}/{}", base.trim_end_matches('/'), resource.name(&self.resources))
    }
}

#[async_trait]
impl TrustDataSource for HttpTrustDataSource {
    async fn fetch(&self, resource: Resource) -> Result<Vec<u8>, FetchError> {
        let url = self.url(resource);
        debug!(%url, "fetching trust data resource");
        let request = async {
            let response = self.client.get(&url).send().await.map_err(|e| FetchError::Request {
                resource,
                message: e.to_string(),
            })?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    resource,
                    status: status.as_u16(),
                });
            }
            let body = response.bytes().await.map_err(|e| FetchError::Request {
                resource,
                message: e.to_string(),
            })?;
            Ok::<_, FetchError>(body.to_vec())
        };
        tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| FetchError::Timeout {
                resource,
                timeout: self.timeout,
            })?
    }
}

/// In-memory source, for pinned trust data and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticTrustDataSource {
    blobs: HashMap<Resource, Vec<u8>>,
}

impl StaticTrustDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_raw(raw: RawTrustData) -> Self {
        Self::new()
            .with(Resource::TrustList, raw.trust_list)
            .with(Resource::TrustListSignature, raw.trust_list_signature)
            .with(Resource::Rules, raw.rules)
            .with(Resource::RulesSignature, raw.rules_signature)
            .with(Resource::ValueSets, raw.value_sets)
            .with(Resource::ValueSetsSignature, raw.value_sets_signature)
    }

    pub fn with(mut self, resource: Resource, blob: impl Into<Vec<u8>>) -> Self {
        self.blobs.insert(resource, blob.into());
        self
    }
}

#[async_trait]
impl TrustDataSource for StaticTrustDataSource {
    async fn fetch(&self, resource: Resource) -> Result<Vec<u8>, FetchError> {
        self.blobs.get(&resource).cloned().ok_or(FetchError::Missing(resource))
    }
}
