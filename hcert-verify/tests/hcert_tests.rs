// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

mod common;

use common::*;
use hcert_verify::{verify_hc1, CertificateEntry, CertificateKind, FailureKind, TrustList, VerifyError};

const IAT: i64 = 1_613_606_400; // 2021-02-18
const EXP: i64 = 1_645_142_400; // 2022-02-18

fn trust_list_for(signers: &[&TestSigner]) -> TrustList {
    TrustList::from_certificates(signers.iter().map(|s| s.der.as_slice())).unwrap()
}

fn issue(dcc: &serde_json::Value, signer: &TestSigner) -> String {
    let payload = cwt_payload(dcc, IAT, EXP);
    hc1(&sign_cose(&payload, Some(&signer.kid()), None, signer))
}

#[test]
fn valid_certificate_verifies_and_exposes_claims() {
    let anchor = make_anchor("CSCA AT");
    let dsc = make_signer("DSC AT", &anchor, (2020, 2030), &[EKU_VACCINATION]);
    let qr = issue(&vaccination_dcc(), &dsc);

    let verified = verify_hc1(&qr, &trust_list_for(&[&dsc]), ts("2021-06-01T00:00:00Z")).unwrap();
    assert_eq!(verified.kid, dsc.kid());
    assert_eq!(verified.issuer.as_deref(), Some("AT"));
    assert_eq!(verified.issued_at.unwrap().timestamp(), IAT);
    assert_eq!(verified.expires_at.unwrap().timestamp(), EXP);

    let cert = &verified.certificate;
    assert_eq!(cert.name.given_name.as_deref(), Some("Gabriele"));
    assert_eq!(cert.name.family_name.as_deref(), Some("Musterfrau"));
    assert_eq!(cert.date_of_birth_raw, "1998-02-26");
    assert_eq!(cert.kind(), Some(CertificateKind::Vaccination));
    match &cert.entry {
        Some(CertificateEntry::Vaccination(v)) => assert_eq!((v.dose_number, v.total_doses), (2, 2)),
        other => panic!("unexpected entry: {other:?}"),
    }
    assert_eq!(verified.payload["v"][0]["mp"], "EU/1/20/1528");
}

#[test]
fn unknown_kid_is_a_signature_failure() {
    let anchor = make_anchor("CSCA AT");
    let dsc = make_signer("DSC AT", &anchor, (2020, 2030), &[]);
    let other = make_signer("DSC other", &anchor, (2020, 2030), &[]);
    let qr = issue(&vaccination_dcc(), &dsc);

    let err = verify_hc1(&qr, &trust_list_for(&[&other]), ts("2021-06-01T00:00:00Z")).unwrap_err();
    assert!(matches!(err, VerifyError::UnknownKid(_)), "{err:?}");
    assert_eq!(err.kind(), FailureKind::Signature);
    assert_eq!(err.code(), "UNKNOWN_KID");
}

#[test]
fn key_under_wrong_kid_fails_signature_check() {
    let anchor = make_anchor("CSCA AT");
    let dsc = make_signer("DSC AT", &anchor, (2020, 2030), &[]);
    let impostor = make_signer("Impostor", &anchor, (2020, 2030), &[]);
    // Signed by the impostor but claiming the trusted signer's kid.
    let payload = cwt_payload(&vaccination_dcc(), IAT, EXP);
    let qr = hc1(&sign_cose(&payload, Some(&dsc.kid()), None, &impostor));

    let err = verify_hc1(&qr, &trust_list_for(&[&dsc]), ts("2021-06-01T00:00:00Z")).unwrap_err();
    assert!(matches!(err, VerifyError::BadSignature(_)), "{err:?}");
    assert_eq!(err.kind(), FailureKind::Signature);
}

#[test]
fn expired_signer_is_rejected_at_check_date() {
    let anchor = make_anchor("CSCA AT");
    let dsc = make_signer("DSC AT", &anchor, (2020, 2022), &[]);
    let qr = issue(&vaccination_dcc(), &dsc);
    let list = trust_list_for(&[&dsc]);

    assert!(verify_hc1(&qr, &list, ts("2021-06-01T00:00:00Z")).is_ok());
    let err = verify_hc1(&qr, &list, ts("2023-06-01T00:00:00Z")).unwrap_err();
    assert!(matches!(err, VerifyError::SignerNotValid { .. }), "{err:?}");
    assert_eq!(err.kind(), FailureKind::Signature);
}

#[test]
fn signer_restricted_to_tests_cannot_sign_vaccinations() {
    let anchor = make_anchor("CSCA AT");
    let dsc = make_signer("DSC tests", &anchor, (2020, 2030), &[EKU_TEST]);
    let qr = issue(&vaccination_dcc(), &dsc);

    let err = verify_hc1(&qr, &trust_list_for(&[&dsc]), ts("2021-06-01T00:00:00Z")).unwrap_err();
    assert!(matches!(err, VerifyError::SignerNotAuthorized(CertificateKind::Vaccination)), "{err:?}");
}

#[test]
fn missing_prefix_is_a_format_failure() {
    let err = verify_hc1("NOT-A-CERT", &TrustList::default(), ts("2021-06-01T00:00:00Z")).unwrap_err();
    assert_eq!(err.kind(), FailureKind::Format);
    assert_eq!(err.code(), "UNKNOWN_PREFIX");
}

#[test]
fn garbled_body_is_a_decode_failure() {
    for qr in ["HC1:", "HC1:!!!!", "HC1:6BF"] {
        let err = verify_hc1(qr, &TrustList::default(), ts("2021-06-01T00:00:00Z")).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Decode, "{qr}: {err:?}");
    }
}

#[test]
fn multiple_certificate_kinds_are_a_decode_failure() {
    let anchor = make_anchor("CSCA AT");
    let dsc = make_signer("DSC AT", &anchor, (2020, 2030), &[]);
    let mut dcc = vaccination_dcc();
    dcc["r"] = serde_json::json!([{
        "tg": "840539006", "fr": "2021-01-01", "co": "AT", "is": "BMSGPK",
        "df": "2021-01-12", "du": "2021-06-30", "ci": "URN:UVCI:01:AT:R1"
    }]);
    let qr = issue(&dcc, &dsc);

    let err = verify_hc1(&qr, &trust_list_for(&[&dsc]), ts("2021-06-01T00:00:00Z")).unwrap_err();
    assert!(matches!(err, VerifyError::Claims(_)), "{err:?}");
    assert_eq!(err.kind(), FailureKind::Decode);
}
