// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! COSE signature algorithms accepted for health certificates and trust data.
//!
//! Public keys are accepted as DER X.509 certificates or DER
//! SubjectPublicKeyInfo; certificates have their SPKI extracted first.

use hcert_cose::{encode_signature1_sig_structure, ParsedCoseSign1};
use p256::elliptic_curve::sec1::ToEncodedPoint as _;
use p256::pkcs8::DecodePublicKey as _;
use rsa::pkcs8::DecodePublicKey as _;
use rsa::pss;
use rsa::RsaPublicKey;
use sha2::{Sha256, Sha384, Sha512};
use signature::Verifier as _;

use crate::error::VerifyError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(i64)]
pub enum CoseAlgorithm {
    /// ECDSA w/ SHA-256 over P-256.
    ES256 = -7,
    /// ECDSA w/ SHA-384 over P-384.
    ES384 = -35,
    /// ECDSA w/ SHA-512 over P-521.
    ES512 = -36,
    /// RSASSA-PSS w/ SHA-256.
    PS256 = -37,
}

impl TryFrom<i64> for CoseAlgorithm {
    type Error = VerifyError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -7 => Ok(CoseAlgorithm::ES256),
            -35 => Ok(CoseAlgorithm::ES384),
            -36 => Ok(CoseAlgorithm::ES512),
            -37 => Ok(CoseAlgorithm::PS256),
            other => Err(VerifyError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Verify a parsed COSE_Sign1 (embedded payload) against one public key.
pub fn verify_parsed_cose_sign1(parsed: &ParsedCoseSign1, public_key_der: &[u8]) -> Result<(), VerifyError> {
    let alg = parsed
        .alg()
        .ok_or_else(|| VerifyError::UnsupportedAlgorithm("missing alg header".to_string()))
        .and_then(CoseAlgorithm::try_from)?;
    let sig_structure = encode_signature1_sig_structure(parsed, None)?;
    verify_signature(alg, public_key_der, &sig_structure, &parsed.signature)
}

/// Verify `sig` over `msg`. ECDSA signatures use the raw `r || s` encoding of COSE/JWS.
pub fn verify_signature(alg: CoseAlgorithm, public_key_der: &[u8], msg: &[u8], sig: &[u8]) -> Result<(), VerifyError> {
    let spki = extract_spki_der(public_key_der);
    match alg {
        CoseAlgorithm::ES256 => {
            let pk = p256::PublicKey::from_public_key_der(&spki)
                .map_err(|e| VerifyError::InvalidPublicKey(format!("bad P-256 public key: {e}")))?;
            let vk = p256::ecdsa::VerifyingKey::from_sec1_bytes(pk.to_encoded_point(false).as_bytes())
                .map_err(|e| VerifyError::InvalidPublicKey(format!("bad P-256 public key: {e}")))?;
            let signature = p256::ecdsa::Signature::from_slice(sig)
                .map_err(|e| VerifyError::BadSignature(format!("bad ES256 signature: {e}")))?;
            vk.verify(msg, &signature).map_err(|_| bad_signature())
        }
        CoseAlgorithm::ES384 => {
            let pk = p384::PublicKey::from_public_key_der(&spki)
                .map_err(|e| VerifyError::InvalidPublicKey(format!("bad P-384 public key: {e}")))?;
            let vk = p384::ecdsa::VerifyingKey::from_sec1_bytes(pk.to_encoded_point(false).as_bytes())
                .map_err(|e| VerifyError::InvalidPublicKey(format!("bad P-384 public key: {e}")))?;
            let signature = p384::ecdsa::Signature::from_slice(sig)
                .map_err(|e| VerifyError::BadSignature(format!("bad ES384 signature: {e}")))?;
            vk.verify(msg, &signature).map_err(|_| bad_signature())
        }
        CoseAlgorithm::ES512 => {
            let pk = p521::PublicKey::from_public_key_der(&spki)
                .map_err(|e| VerifyError::InvalidPublicKey(format!("bad P-521 public key: {e}")))?;
            let vk = p521::ecdsa::VerifyingKey::from_sec1_bytes(pk.to_encoded_point(false).as_bytes())
                .map_err(|e| VerifyError::InvalidPublicKey(format!("bad P-521 public key: {e}")))?;
            let signature = p521::ecdsa::Signature::from_slice(sig)
                .map_err(|e| VerifyError::BadSignature(format!("bad ES512 signature: {e}")))?;
            vk.verify(msg, &signature).map_err(|_| bad_signature())
        }
        CoseAlgorithm::PS256 => {
            let key = RsaPublicKey::from_public_key_der(&spki)
                .map_err(|e| VerifyError::InvalidPublicKey(format!("bad RSA public key: {e}")))?;
            let vk = pss::VerifyingKey::<Sha256>::new(key);
            let signature = pss::Signature::try_from(sig)
                .map_err(|e| VerifyError::BadSignature(format!("bad PS256 signature bytes: {e}")))?;
            vk.verify(msg, &signature).map_err(|_| bad_signature())
        }
    }
}

/// Verify an X.509 signature (DER-encoded ECDSA or PKCS#1 v1.5 RSA) made by
/// `issuer_spki_der` over `tbs_der`.
pub(crate) fn verify_certificate_signature(
    issuer_spki_der: &[u8],
    tbs_der: &[u8],
    signature_oid: &str,
    signature: &[u8],
) -> Result<(), VerifyError> {
    use rsa::pkcs1v15;

    let cert_sig_failed = || VerifyError::UntrustedSigner;
    match signature_oid {
        // sha256WithRSAEncryption / sha384WithRSAEncryption / sha512WithRSAEncryption
        "1.2.840.113549.1.1.11" => {
            let vk = pkcs1v15::VerifyingKey::<Sha256>::new(rsa_key(issuer_spki_der)?);
            let sig = pkcs1v15::Signature::try_from(signature).map_err(|_| cert_sig_failed())?;
            vk.verify(tbs_der, &sig).map_err(|_| cert_sig_failed())
        }
        "1.2.840.113549.1.1.12" => {
            let vk = pkcs1v15::VerifyingKey::<Sha384>::new(rsa_key(issuer_spki_der)?);
            let sig = pkcs1v15::Signature::try_from(signature).map_err(|_| cert_sig_failed())?;
            vk.verify(tbs_der, &sig).map_err(|_| cert_sig_failed())
        }
        "1.2.840.113549.1.1.13" => {
            let vk = pkcs1v15::VerifyingKey::<Sha512>::new(rsa_key(issuer_spki_der)?);
            let sig = pkcs1v15::Signature::try_from(signature).map_err(|_| cert_sig_failed())?;
            vk.verify(tbs_der, &sig).map_err(|_| cert_sig_failed())
        }

        // ecdsa-with-SHA256 / SHA384 / SHA512
        "1.2.840.10045.4.3.2" => {
            let pk = p256::PublicKey::from_public_key_der(issuer_spki_der)
                .map_err(|e| VerifyError::InvalidPublicKey(format!("bad P-256 issuer public key: {e}")))?;
            let vk = p256::ecdsa::VerifyingKey::from_sec1_bytes(pk.to_encoded_point(false).as_bytes())
                .map_err(|e| VerifyError::InvalidPublicKey(format!("bad P-256 issuer public key: {e}")))?;
            let sig = p256::ecdsa::Signature::from_der(signature).map_err(|_| cert_sig_failed())?;
            vk.verify(tbs_der, &sig).map_err(|_| cert_sig_failed())
        }
        "1.2.840.10045.4.3.3" => {
            let pk = p384::PublicKey::from_public_key_der(issuer_spki_der)
                .map_err(|e| VerifyError::InvalidPublicKey(format!("bad P-384 issuer public key: {e}")))?;
            let vk = p384::ecdsa::VerifyingKey::from_sec1_bytes(pk.to_encoded_point(false).as_bytes())
                .map_err(|e| VerifyError::InvalidPublicKey(format!("bad P-384 issuer public key: {e}")))?;
            let sig = p384::ecdsa::Signature::from_der(signature).map_err(|_| cert_sig_failed())?;
            vk.verify(tbs_der, &sig).map_err(|_| cert_sig_failed())
        }
        "1.2.840.10045.4.3.4" => {
            let pk = p521::PublicKey::from_public_key_der(issuer_spki_der)
                .map_err(|e| VerifyError::InvalidPublicKey(format!("bad P-521 issuer public key: {e}")))?;
            let vk = p521::ecdsa::VerifyingKey::from_sec1_bytes(pk.to_encoded_point(false).as_bytes())
                .map_err(|e| VerifyError::InvalidPublicKey(format!("bad P-521 issuer public key: {e}")))?;
            let sig = p521::ecdsa::Signature::from_der(signature).map_err(|_| cert_sig_failed())?;
            vk.verify(tbs_der, &sig).map_err(|_| cert_sig_failed())
        }

        other => Err(VerifyError::InvalidCertificate(format!(
            "unsupported certificate signature algorithm OID: {other}"
        ))),
    }
}

fn rsa_key(spki_der: &[u8]) -> Result<RsaPublicKey, VerifyError> {
    RsaPublicKey::from_public_key_der(spki_der).map_err(|e| VerifyError::InvalidPublicKey(format!("bad RSA public key: {e}")))
}

/// Normalize key input: a DER certificate yields its SPKI, anything else is assumed to be SPKI already.
pub(crate) fn extract_spki_der(der: &[u8]) -> Vec<u8> {
    match x509_parser::parse_x509_certificate(der) {
        Ok((_, cert)) => cert.tbs_certificate.subject_pki.raw.to_vec(),
        Err(_) => der.to_vec(),
    }
}

fn bad_signature() -> VerifyError {
    VerifyError::BadSignature("signature does not match".to_string())
}
