// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Verification of `HC1:` health certificates against a trust list.

use chrono::{DateTime, Utc};
use hcert_cose::{decode_cwt_claims, parse_cose_sign1, unwrap_hc1, CoseError};
use tracing::debug;

use crate::claims::HealthCertificate;
use crate::error::VerifyError;
use crate::signature::verify_parsed_cose_sign1;
use crate::trust_list::TrustList;
use crate::x509::SignerCertificate;

/// A certificate whose signature chained to the trust list.
#[derive(Debug, Clone)]
pub struct VerifiedCertificate {
    pub kid: Vec<u8>,
    /// Subject DN of the document signer.
    pub signer: String,
    pub issuer: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub certificate: HealthCertificate,
    /// DCC claims as JSON, the shape business rules address.
    pub payload: serde_json::Value,
}

/// Decode and verify an `HC1:` string.
///
/// Structural problems are reported before any key is looked up, so a garbled
/// scan surfaces as a decode failure and not as an unknown signer. The signer
/// must be valid at `at` and, when it carries DCC key usages, be allowed to
/// sign the certificate's kind.
pub fn verify_hc1(qr: &str, trust_list: &TrustList, at: DateTime<Utc>) -> Result<VerifiedCertificate, VerifyError> {
    let cose = unwrap_hc1(qr)?;
    let parsed = parse_cose_sign1(&cose)?;
    let payload = parsed.payload.as_deref().ok_or(CoseError::DetachedPayload)?;
    let claims = decode_cwt_claims(payload)?;
    let certificate = HealthCertificate::from_json(&claims.dcc)?;

    let kid = parsed.kid().ok_or(VerifyError::MissingKid)?;
    let candidates = trust_list.signers_for(kid);
    if candidates.is_empty() {
        return Err(VerifyError::UnknownKid(hex::encode(kid)));
    }

    let mut last_err = VerifyError::UnknownKid(hex::encode(kid));
    let mut signer: Option<&SignerCertificate> = None;
    for candidate in candidates {
        match verify_parsed_cose_sign1(&parsed, candidate.spki_der()) {
            Ok(()) => {
                signer = Some(candidate);
                break;
            }
            Err(e) => last_err = e,
        }
    }
    let signer = signer.ok_or(last_err)?;

    signer.check_valid_at(at)?;
    if let Some(kind) = certificate.kind() {
        if !signer.may_sign(kind) {
            return Err(VerifyError::SignerNotAuthorized(kind));
        }
    }

    debug!(kid = %hex::encode(kid), signer = signer.subject(), kind = ?certificate.kind(), "verified HC1 certificate");
    Ok(VerifiedCertificate {
        kid: kid.to_vec(),
        signer: signer.subject().to_string(),
        issuer: claims.issuer,
        issued_at: claims.issued_at.and_then(|s| DateTime::<Utc>::from_timestamp(s, 0)),
        expires_at: claims.expiration.and_then(|s| DateTime::<Utc>::from_timestamp(s, 0)),
        certificate,
        payload: claims.dcc,
    })
}
