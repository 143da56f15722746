// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Typed view of the EU DCC claims (`hcert[-260][1]`).

use serde::{Deserialize, Serialize};

use crate::error::VerifyError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CertificateKind {
    Vaccination,
    Test,
    Recovery,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonName {
    #[serde(rename = "fn", default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(rename = "fnt")]
    pub family_name_transliterated: String,
    #[serde(rename = "gn", default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(rename = "gnt", default, skip_serializing_if = "Option::is_none")]
    pub given_name_transliterated: Option<String>,
}

/// Possibly partial date of birth; DCCs allow `YYYY`, `YYYY-MM` and `YYYY-MM-DD`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateOfBirth {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl DateOfBirth {
    /// Parse the DCC `dob` field. Unknown components (`XX`, empty) stay `None`;
    /// an entirely unknown date yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let date_part = raw.split('T').next().unwrap_or_default().trim();
        let mut parts = date_part.split('-');
        let year = parts.next().and_then(|y| y.parse::<i32>().ok());
        let month = parts.next().and_then(|m| m.parse::<u32>().ok()).filter(|m| (1..=12).contains(m));
        let day = parts.next().and_then(|d| d.parse::<u32>().ok()).filter(|d| (1..=31).contains(d));
        let dob = DateOfBirth {
            year,
            month: year.and(month),
            day: year.and(month).and(day),
        };
        (dob != DateOfBirth::default()).then_some(dob)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vaccination {
    #[serde(rename = "tg")]
    pub target_disease: String,
    #[serde(rename = "vp")]
    pub vaccine: String,
    #[serde(rename = "mp")]
    pub product: String,
    #[serde(rename = "ma")]
    pub manufacturer: String,
    #[serde(rename = "dn")]
    pub dose_number: u32,
    #[serde(rename = "sd")]
    pub total_doses: u32,
    #[serde(rename = "dt")]
    pub date: String,
    #[serde(rename = "co")]
    pub country: String,
    #[serde(rename = "is")]
    pub issuer: String,
    #[serde(rename = "ci")]
    pub certificate_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    #[serde(rename = "tg")]
    pub target_disease: String,
    #[serde(rename = "tt")]
    pub test_type: String,
    #[serde(rename = "nm", default, skip_serializing_if = "Option::is_none")]
    pub test_name: Option<String>,
    #[serde(rename = "ma", default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(rename = "sc")]
    pub sample_collected_at: String,
    #[serde(rename = "tr")]
    pub result: String,
    #[serde(rename = "tc", default, skip_serializing_if = "Option::is_none")]
    pub testing_centre: Option<String>,
    #[serde(rename = "co")]
    pub country: String,
    #[serde(rename = "is")]
    pub issuer: String,
    #[serde(rename = "ci")]
    pub certificate_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recovery {
    #[serde(rename = "tg")]
    pub target_disease: String,
    #[serde(rename = "fr")]
    pub first_positive: String,
    #[serde(rename = "co")]
    pub country: String,
    #[serde(rename = "is")]
    pub issuer: String,
    #[serde(rename = "df")]
    pub valid_from: String,
    #[serde(rename = "du")]
    pub valid_until: String,
    #[serde(rename = "ci")]
    pub certificate_id: String,
}

/// The single payload record a certificate carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CertificateEntry {
    Vaccination(Vaccination),
    Test(TestResult),
    Recovery(Recovery),
}

impl CertificateEntry {
    pub fn kind(&self) -> CertificateKind {
        match self {
            CertificateEntry::Vaccination(_) => CertificateKind::Vaccination,
            CertificateEntry::Test(_) => CertificateKind::Test,
            CertificateEntry::Recovery(_) => CertificateKind::Recovery,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCertificate {
    pub version: String,
    pub name: PersonName,
    pub date_of_birth_raw: String,
    pub date_of_birth: Option<DateOfBirth>,
    pub entry: Option<CertificateEntry>,
}

#[derive(Deserialize)]
struct WireDcc {
    ver: String,
    nam: PersonName,
    #[serde(default)]
    dob: String,
    #[serde(default)]
    v: Option<Vec<Vaccination>>,
    #[serde(default)]
    t: Option<Vec<TestResult>>,
    #[serde(default)]
    r: Option<Vec<Recovery>>,
}

impl HealthCertificate {
    /// Build from the JSON form of the DCC claims.
    ///
    /// At most one of `v`/`t`/`r` may be present, and a present one must hold
    /// exactly one record.
    pub fn from_json(dcc: &serde_json::Value) -> Result<Self, VerifyError> {
        let wire: WireDcc = serde_json::from_value(dcc.clone()).map_err(|e| VerifyError::Claims(e.to_string()))?;

        let mut entries = Vec::new();
        if let Some(v) = wire.v {
            entries.push(single("v", v)?.map(CertificateEntry::Vaccination));
        }
        if let Some(t) = wire.t {
            entries.push(single("t", t)?.map(CertificateEntry::Test));
        }
        if let Some(r) = wire.r {
            entries.push(single("r", r)?.map(CertificateEntry::Recovery));
        }
        let mut entries: Vec<CertificateEntry> = entries.into_iter().flatten().collect();
        if entries.len() > 1 {
            return Err(VerifyError::Claims(
                "certificate carries more than one of vaccination/test/recovery".to_string(),
            ));
        }

        Ok(HealthCertificate {
            version: wire.ver,
            date_of_birth: DateOfBirth::parse(&wire.dob),
            date_of_birth_raw: wire.dob,
            name: wire.nam,
            entry: entries.pop(),
        })
    }

    pub fn kind(&self) -> Option<CertificateKind> {
        self.entry.as_ref().map(CertificateEntry::kind)
    }
}

/// An empty array counts as absent.
fn single<T>(field: &str, mut records: Vec<T>) -> Result<Option<T>, VerifyError> {
    match records.len() {
        0 => Ok(None),
        1 => Ok(records.pop()),
        n => Err(VerifyError::Claims(format!("'{field}' must hold exactly one record, found {n}"))),
    }
}
