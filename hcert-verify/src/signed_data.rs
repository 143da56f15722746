// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Signed trust-data containers (trust list, business rules, value sets).
//!
//! Each remote resource comes as a content blob plus a detached signature blob.
//! The signature blob is a COSE_Sign1 whose payload binds the content by hash
//! and carries the container's validity window:
//!
//! ```text
//! { 2: sha256(content), 4: validUntil (epoch secs), 5: validFrom (epoch secs) }
//! ```

use chrono::{DateTime, Utc};
use hcert_cose::{decode_value, parse_cose_sign1, CborValue, ParsedCoseSign1};
use sha2::{Digest as _, Sha256};
use tracing::debug;

use crate::error::VerifyError;
use crate::signature::verify_parsed_cose_sign1;
use crate::x509::SignerCertificate;

const CLAIM_CONTENT_HASH: i64 = 2;
const CLAIM_VALID_UNTIL: i64 = 4;
const CLAIM_VALID_FROM: i64 = 5;

/// Hardcoded root of trust for one environment.
#[derive(Debug, Clone)]
pub struct TrustAnchor {
    certificate: SignerCertificate,
}

impl TrustAnchor {
    pub fn from_der(der: &[u8]) -> Result<Self, VerifyError> {
        Ok(Self {
            certificate: SignerCertificate::from_der(der)?,
        })
    }

    pub fn certificate(&self) -> &SignerCertificate {
        &self.certificate
    }
}

/// Content whose signature and hash checked out against a trust anchor.
#[derive(Debug, Clone)]
pub struct VerifiedContent {
    pub content: Vec<u8>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl VerifiedContent {
    /// Half-open window `[valid_from, valid_until)`.
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.valid_from <= at && at < self.valid_until
    }
}

/// Verify a content/signature pair and check its window against `as_of`.
pub fn verify_signed_data(
    content: &[u8],
    signature: &[u8],
    anchors: &[TrustAnchor],
    as_of: DateTime<Utc>,
) -> Result<VerifiedContent, VerifyError> {
    if anchors.is_empty() {
        return Err(VerifyError::NoTrustAnchor);
    }

    let parsed = parse_cose_sign1(signature)?;
    verify_against_anchors(&parsed, anchors, as_of)?;

    let payload = parsed
        .payload
        .as_deref()
        .ok_or_else(|| VerifyError::Claims("signed data payload is detached".to_string()))?;
    let claims = decode_value(payload)?;

    let signed_hash = claims
        .get_int(CLAIM_CONTENT_HASH)
        .and_then(CborValue::as_bytes)
        .ok_or_else(|| VerifyError::Claims("signed data lacks content hash".to_string()))?;
    if Sha256::digest(content).as_slice() != signed_hash {
        return Err(VerifyError::HashMismatch);
    }

    let valid_from = epoch_claim(&claims, CLAIM_VALID_FROM, "validFrom")?;
    let valid_until = epoch_claim(&claims, CLAIM_VALID_UNTIL, "validUntil")?;
    let verified = VerifiedContent {
        content: content.to_vec(),
        valid_from,
        valid_until,
    };
    if !verified.is_valid_at(as_of) {
        return Err(VerifyError::ContainerNotValid {
            at: as_of,
            valid_from,
            valid_until,
        });
    }

    debug!(len = content.len(), %valid_from, %valid_until, "verified signed trust data");
    Ok(verified)
}

/// Either the message carries an `x5chain` leaf that chains to an anchor, or
/// one of the anchor keys signed it directly.
fn verify_against_anchors(
    parsed: &ParsedCoseSign1,
    anchors: &[TrustAnchor],
    as_of: DateTime<Utc>,
) -> Result<(), VerifyError> {
    if let Some(leaf_der) = parsed.x5chain().first() {
        let leaf = SignerCertificate::from_der(leaf_der)?;
        if !anchors.iter().any(|a| leaf.verify_issued_by(a.certificate()).is_ok()) {
            return Err(VerifyError::UntrustedSigner);
        }
        leaf.check_valid_at(as_of)?;
        return verify_parsed_cose_sign1(parsed, leaf.spki_der());
    }

    let mut last_err = VerifyError::NoTrustAnchor;
    for anchor in anchors {
        match verify_parsed_cose_sign1(parsed, anchor.certificate().spki_der()) {
            Ok(()) => return Ok(()),
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

fn epoch_claim(claims: &CborValue, label: i64, name: &str) -> Result<DateTime<Utc>, VerifyError> {
    let secs = claims
        .get_int(label)
        .and_then(CborValue::as_i64)
        .ok_or_else(|| VerifyError::Claims(format!("signed data lacks {name}")))?;
    DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| VerifyError::Claims(format!("{name} out of range")))
}
