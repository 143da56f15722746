// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Outward result model, serialized for the UI layer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hcert_rules::RuleError;
use hcert_verify::{CertificateKind, FailureKind, VerifyError};
use serde::Serialize;
use thiserror::Error;

use crate::source::FetchError;

/// Top-level failure category. "Could not determine validity" is always one
/// of these; per-region rule failures never are.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Format,
    Decode,
    Signature,
    Network,
}

impl From<FailureKind> for ErrorKind {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Format => ErrorKind::Format,
            FailureKind::Decode => ErrorKind::Decode,
            FailureKind::Signature => ErrorKind::Signature,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{kind:?} error [{code}]: {message}")]
pub struct ValidationError {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Format, "UNKNOWN_FORMAT", message)
    }
}

impl From<VerifyError> for ValidationError {
    fn from(e: VerifyError) -> Self {
        Self::new(e.kind().into(), e.code(), e.to_string())
    }
}

impl From<FetchError> for ValidationError {
    fn from(e: FetchError) -> Self {
        Self::new(ErrorKind::Network, e.code(), e.to_string())
    }
}

/// Trust-data decode faults: an untrusted container is a signature problem,
/// anything else is malformed data.
impl From<RuleError> for ValidationError {
    fn from(e: RuleError) -> Self {
        match e {
            RuleError::Verify(inner) => inner.into(),
            other => Self::new(ErrorKind::Decode, other.code(), other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionResult {
    pub is_valid: bool,
    /// Only set when `is_valid`; `None` there means no expiry was found.
    pub valid_until: Option<DateTime<Utc>>,
    /// Localized descriptions of the failing rules.
    pub error: Vec<String>,
}

impl RegionResult {
    pub fn valid(valid_until: Option<DateTime<Utc>>) -> Self {
        Self {
            is_valid: true,
            valid_until,
            error: Vec::new(),
        }
    }

    pub fn invalid(error: Vec<String>) -> Self {
        Self {
            is_valid: false,
            valid_until: None,
            error,
        }
    }
}

/// Holder identity as printed on the certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Holder {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub first_name_transliterated: Option<String>,
    pub last_name_transliterated: Option<String>,
    pub date_of_birth: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Scheme {
    Hc1,
    Tgct,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Envelope, claims and signature all checked out.
    pub is_valid: bool,
    pub error: Option<ValidationError>,
    pub scheme: Option<Scheme>,
    pub kind: Option<CertificateKind>,
    pub holder: Option<Holder>,
    /// Per requested region; empty when `error` is set.
    pub regions: BTreeMap<String, RegionResult>,
}

impl ValidationResult {
    pub fn failed(error: ValidationError) -> Self {
        Self {
            is_valid: false,
            error: Some(error),
            scheme: None,
            kind: None,
            holder: None,
            regions: BTreeMap::new(),
        }
    }

    pub fn region(&self, region: &str) -> Option<&RegionResult> {
        self.regions.get(region)
    }
}

/// Construction-time configuration faults.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("invalid trust anchor: {0}")]
    TrustAnchor(#[source] VerifyError),

    #[error("invalid TGCT key: {0}")]
    TgctKey(#[source] VerifyError),

    #[error(transparent)]
    Source(#[from] FetchError),
}
