// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use hcert_cose::{decode_value, CborValue};
use tracing::{debug, warn};

use crate::error::VerifyError;
use crate::signed_data::{verify_signed_data, TrustAnchor};
use crate::x509::SignerCertificate;

/// Document signer certificates indexed by key identifier.
///
/// Content layout: `{"c": [{"i": kid, "r": certificate DER}, ...]}`.
#[derive(Debug, Clone, Default)]
pub struct TrustList {
    signers: HashMap<Vec<u8>, Vec<SignerCertificate>>,
    valid_from: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>,
}

impl TrustList {
    /// Verify the signed trust list against the anchors as of `as_of` and decode it.
    pub fn decode(
        content: &[u8],
        signature: &[u8],
        anchors: &[TrustAnchor],
        as_of: DateTime<Utc>,
    ) -> Result<Self, VerifyError> {
        let verified = verify_signed_data(content, signature, anchors, as_of)?;
        let mut list = Self::decode_content(&verified.content)?;
        list.valid_from = Some(verified.valid_from);
        list.valid_until = Some(verified.valid_until);
        Ok(list)
    }

    /// Build a list from pinned certificates; kids are derived from the DER.
    pub fn from_certificates<'a>(certs: impl IntoIterator<Item = &'a [u8]>) -> Result<Self, VerifyError> {
        let mut list = Self::default();
        for der in certs {
            let cert = SignerCertificate::from_der(der)?;
            list.signers.entry(cert.kid()).or_default().push(cert);
        }
        Ok(list)
    }

    fn decode_content(content: &[u8]) -> Result<Self, VerifyError> {
        let root = decode_value(content)?;
        let entries = root
            .get_text("c")
            .and_then(CborValue::as_array)
            .ok_or_else(|| VerifyError::Claims("trust list lacks 'c' array".to_string()))?;

        let mut list = Self::default();
        for entry in entries {
            let (Some(kid), Some(der)) = (
                entry.get_text("i").and_then(CborValue::as_bytes),
                entry.get_text("r").and_then(CborValue::as_bytes),
            ) else {
                warn!("skipping malformed trust list entry");
                continue;
            };
            match SignerCertificate::from_der(der) {
                Ok(cert) => list.signers.entry(kid.to_vec()).or_default().push(cert),
                Err(e) => warn!(kid = %hex::encode(kid), error = %e, "skipping unparsable signer certificate"),
            }
        }
        debug!(signers = list.len(), "decoded trust list");
        Ok(list)
    }

    /// Candidates for `kid`; several certificates may share a truncated kid.
    pub fn signers_for(&self, kid: &[u8]) -> &[SignerCertificate] {
        self.signers.get(kid).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.signers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }

    /// Window of the signed container; unbounded for pinned lists.
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.valid_from.map_or(true, |from| from <= at) && self.valid_until.map_or(true, |until| at < until)
    }

    pub fn valid_until(&self) -> Option<DateTime<Utc>> {
        self.valid_until
    }
}
