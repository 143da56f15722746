// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! X.509 handling for document signer certificates and trust anchors.

use chrono::{DateTime, Utc};
use sha2::{Digest as _, Sha256};

use crate::claims::CertificateKind;
use crate::error::VerifyError;
use crate::signature::verify_certificate_signature;

/// DCC extended key usages restricting which certificate kinds a signer may issue.
const EKU_TEST: &str = "1.3.6.1.4.1.1847.2021.1.1";
const EKU_VACCINATION: &str = "1.3.6.1.4.1.1847.2021.1.2";
const EKU_RECOVERY: &str = "1.3.6.1.4.1.1847.2021.1.3";

#[derive(Debug, Clone)]
pub struct SignerCertificate {
    der: Vec<u8>,
    subject_dn: String,
    issuer_dn: String,
    spki_der: Vec<u8>,
    tbs_der: Vec<u8>,
    signature_oid: String,
    signature: Vec<u8>,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    /// `None` when the certificate carries none of the DCC usages.
    allowed_kinds: Option<Vec<CertificateKind>>,
}

impl SignerCertificate {
    pub fn from_der(der: &[u8]) -> Result<Self, VerifyError> {
        let (_, cert) =
            x509_parser::parse_x509_certificate(der).map_err(|e| VerifyError::InvalidCertificate(format!("invalid DER: {e}")))?;

        let validity = cert.validity();
        let not_before = timestamp(validity.not_before.timestamp())?;
        let not_after = timestamp(validity.not_after.timestamp())?;

        let allowed_kinds = match cert.extended_key_usage() {
            Ok(Some(eku)) => {
                let kinds: Vec<CertificateKind> = eku
                    .value
                    .other
                    .iter()
                    .filter_map(|oid| match oid.to_id_string().as_str() {
                        EKU_TEST => Some(CertificateKind::Test),
                        EKU_VACCINATION => Some(CertificateKind::Vaccination),
                        EKU_RECOVERY => Some(CertificateKind::Recovery),
                        _ => None,
                    })
                    .collect();
                (!kinds.is_empty()).then_some(kinds)
            }
            Ok(None) => None,
            Err(e) => return Err(VerifyError::InvalidCertificate(format!("bad extended key usage: {e}"))),
        };

        Ok(Self {
            der: der.to_vec(),
            subject_dn: cert.tbs_certificate.subject.to_string(),
            issuer_dn: cert.tbs_certificate.issuer.to_string(),
            spki_der: cert.tbs_certificate.subject_pki.raw.to_vec(),
            tbs_der: cert.tbs_certificate.as_ref().to_vec(),
            signature_oid: cert.signature_algorithm.algorithm.to_id_string(),
            signature: cert.signature_value.data.to_vec(),
            not_before,
            not_after,
            allowed_kinds,
        })
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn spki_der(&self) -> &[u8] {
        &self.spki_der
    }

    pub fn subject(&self) -> &str {
        &self.subject_dn
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// DCC key identifier: first 8 bytes of SHA-256 over the certificate DER.
    pub fn kid(&self) -> Vec<u8> {
        Sha256::digest(&self.der)[..8].to_vec()
    }

    pub fn check_valid_at(&self, at: DateTime<Utc>) -> Result<(), VerifyError> {
        if at < self.not_before || at > self.not_after {
            return Err(VerifyError::SignerNotValid {
                at,
                not_before: self.not_before,
                not_after: self.not_after,
            });
        }
        Ok(())
    }

    pub fn may_sign(&self, kind: CertificateKind) -> bool {
        self.allowed_kinds.as_ref().map_or(true, |kinds| kinds.contains(&kind))
    }

    /// Check that `issuer` signed this certificate. An exact DER match with the
    /// issuer (self-pinned anchor) is accepted as well.
    pub fn verify_issued_by(&self, issuer: &SignerCertificate) -> Result<(), VerifyError> {
        if self.der == issuer.der {
            return Ok(());
        }
        if self.issuer_dn != issuer.subject_dn {
            return Err(VerifyError::UntrustedSigner);
        }
        verify_certificate_signature(&issuer.spki_der, &self.tbs_der, &self.signature_oid, &self.signature)
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, VerifyError> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| VerifyError::InvalidCertificate(format!("validity timestamp out of range: {secs}")))
}
