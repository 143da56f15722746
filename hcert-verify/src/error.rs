// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use chrono::{DateTime, Utc};
use hcert_cose::{CoseError, EnvelopeError};
use thiserror::Error;

use crate::claims::CertificateKind;

/// Coarse failure category surfaced to callers that must tell "unreadable"
/// apart from "untrusted".
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Input does not carry a recognized scheme prefix.
    Format,
    /// Prefix recognized, but the encoded structure is malformed.
    Decode,
    /// Cryptographic or trust-chain verification failed.
    Signature,
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Cose(#[from] CoseError),

    #[error("invalid claims: {0}")]
    Claims(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("missing kid header")]
    MissingKid,

    #[error("no trusted signer for kid {0}")]
    UnknownKid(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("signature verification failed: {0}")]
    BadSignature(String),

    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("signer certificate not valid at {at} (valid {not_before} .. {not_after})")]
    SignerNotValid {
        at: DateTime<Utc>,
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
    },

    #[error("signer is not authorized to issue {0:?} certificates")]
    SignerNotAuthorized(CertificateKind),

    #[error("signer certificate does not chain to a trust anchor")]
    UntrustedSigner,

    #[error("no trust anchor configured")]
    NoTrustAnchor,

    #[error("content hash does not match the signed hash")]
    HashMismatch,

    #[error("signed data not valid at {at} (valid {valid_from} .. {valid_until})")]
    ContainerNotValid {
        at: DateTime<Utc>,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    },
}

impl VerifyError {
    pub fn kind(&self) -> FailureKind {
        match self {
            VerifyError::Envelope(EnvelopeError::MissingPrefix(_)) => FailureKind::Format,
            VerifyError::Envelope(_) | VerifyError::Cose(_) | VerifyError::Claims(_) => FailureKind::Decode,
            _ => FailureKind::Signature,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            VerifyError::Envelope(e) => e.code(),
            VerifyError::Cose(e) => e.code(),
            VerifyError::Claims(_) => "INVALID_CLAIMS",
            VerifyError::UnsupportedAlgorithm(_) => "MISSING_OR_INVALID_ALG",
            VerifyError::MissingKid => "MISSING_KID",
            VerifyError::UnknownKid(_) => "UNKNOWN_KID",
            VerifyError::InvalidPublicKey(_) => "INVALID_PUBLIC_KEY",
            VerifyError::BadSignature(_) => "BAD_SIGNATURE",
            VerifyError::InvalidCertificate(_) => "INVALID_CERTIFICATE",
            VerifyError::SignerNotValid { .. } => "SIGNER_NOT_VALID",
            VerifyError::SignerNotAuthorized(_) => "SIGNER_NOT_AUTHORIZED",
            VerifyError::UntrustedSigner => "CERT_CHAIN_UNTRUSTED_ROOT",
            VerifyError::NoTrustAnchor => "CERT_CHAIN_NO_TRUST_ANCHORS",
            VerifyError::HashMismatch => "CONTENT_HASH_MISMATCH",
            VerifyError::ContainerNotValid { .. } => "SIGNED_DATA_NOT_VALID",
        }
    }
}
