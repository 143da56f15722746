// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

pub const PRODUCTION_TRUST_URL: &str = "https://dgc-trust.qr.gv.at/";
pub const TEST_TRUST_URL: &str = "https://dgc-trusttest.qr.gv.at/";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Production,
    Test,
}

impl Environment {
    pub fn trust_base_url(self) -> &'static str {
        match self {
            Environment::Production => PRODUCTION_TRUST_URL,
            Environment::Test => TEST_TRUST_URL,
        }
    }
}

/// Names of the six trust-data resources under the base URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    pub rules: String,
    pub rules_signature: String,
    pub trust_list: String,
    pub trust_list_signature: String,
    pub value_sets: String,
    pub value_sets_signature: String,
}

impl Default for ResourceNames {
    fn default() -> Self {
        Self {
            rules: "rules".to_string(),
            rules_signature: "rulessig".to_string(),
            trust_list: "trustlist".to_string(),
            trust_list_signature: "trustlistsig".to_string(),
            value_sets: "valuesets".to_string(),
            value_sets_signature: "valuesetssig".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TgctKeyMaterial {
    /// DER SubjectPublicKeyInfo or DER certificate.
    Der(Vec<u8>),
    Pem(String),
}

#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub environment: Environment,
    pub content_base_url: String,
    pub signature_base_url: String,
    pub resources: ResourceNames,
    pub request_timeout: Duration,
    pub cache_ttl: Duration,
    /// DER certificates the signed trust data must chain to.
    pub trust_anchors: Vec<Vec<u8>>,
    pub tgct_key: Option<TgctKeyMaterial>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self::for_environment(Environment::default())
    }
}

impl ValidatorConfig {
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            environment,
            content_base_url: environment.trust_base_url().to_string(),
            signature_base_url: environment.trust_base_url().to_string(),
            resources: ResourceNames::default(),
            request_timeout: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(60 * 60),
            trust_anchors: Vec::new(),
            tgct_key: None,
        }
    }

    /// Switch environment; base URLs follow unless they were customized.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        let old = self.environment.trust_base_url();
        if self.content_base_url == old {
            self.content_base_url = environment.trust_base_url().to_string();
        }
        if self.signature_base_url == old {
            self.signature_base_url = environment.trust_base_url().to_string();
        }
        self.environment = environment;
        self
    }

    pub fn with_content_base_url(mut self, url: impl Into<String>) -> Self {
        self.content_base_url = url.into();
        self
    }

    pub fn with_signature_base_url(mut self, url: impl Into<String>) -> Self {
        self.signature_base_url = url.into();
        self
    }

    pub fn with_resources(mut self, resources: ResourceNames) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_trust_anchor(mut self, der: impl Into<Vec<u8>>) -> Self {
        self.trust_anchors.push(der.into());
        self
    }

    pub fn with_tgct_key_der(mut self, der: impl Into<Vec<u8>>) -> Self {
        self.tgct_key = Some(TgctKeyMaterial::Der(der.into()));
        self
    }

    pub fn with_tgct_key_pem(mut self, pem: impl Into<String>) -> Self {
        self.tgct_key = Some(TgctKeyMaterial::Pem(pem.into()));
        self
    }
}
