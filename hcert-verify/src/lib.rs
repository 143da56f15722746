// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Signature and trust verification for health certificates.
//!
//! Trust is bootstrapped from [`TrustAnchor`]s: they sign the trust list (and
//! the other trust-data containers), the trust list names the document signers
//! by `kid`, and a document signer signs each `HC1:` certificate. `TGCT:` test
//! certificates are verified against a single pinned key instead.

pub mod claims;
pub mod error;
pub mod hcert;
pub mod signature;
pub mod signed_data;
pub mod tgct;
pub mod trust_list;
pub mod x509;

pub use claims::{
    CertificateEntry, CertificateKind, DateOfBirth, HealthCertificate, PersonName, Recovery, TestResult, Vaccination,
};
pub use error::{FailureKind, VerifyError};
pub use hcert::{verify_hc1, VerifiedCertificate};
pub use signature::{verify_parsed_cose_sign1, verify_signature, CoseAlgorithm};
pub use signed_data::{verify_signed_data, TrustAnchor, VerifiedContent};
pub use tgct::{verify_tgct, TgctKey, TgctPayload, TGCT_PREFIX};
pub use trust_list::TrustList;
pub use x509::SignerCertificate;
