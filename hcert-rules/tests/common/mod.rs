// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Shared builders for `hcert-rules` integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use hcert_rules::{BusinessRules, Rule, RuleInput};
use serde_json::{json, Value};

pub(crate) fn ts(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
}

/// EU-schema rule JSON with an English and a German description.
pub(crate) fn rule_json(id: &str, country: &str, region: &str, logic: Value, from: &str, to: &str) -> Value {
    json!({
        "Identifier": id,
        "Type": "Acceptance",
        "Country": country,
        "Region": region,
        "Version": "1.0.0",
        "SchemaVersion": "1.0.0",
        "Engine": "CERTLOGIC",
        "EngineVersion": "1.0.0",
        "CertificateType": "General",
        "Description": [
            {"lang": "en", "desc": format!("{id} failed")},
            {"lang": "de", "desc": format!("{id} nicht erfüllt")}
        ],
        "ValidFrom": from,
        "ValidTo": to,
        "AffectedFields": [],
        "Logic": logic
    })
}

pub(crate) fn rule(id: &str, country: &str, region: &str, logic: Value) -> Rule {
    Rule::from_json(&rule_json(id, country, region, logic, "2020-01-01T00:00:00Z", "2030-01-01T00:00:00Z")).unwrap()
}

pub(crate) fn rules(list: Vec<Rule>) -> BusinessRules {
    BusinessRules::new(list)
}

pub(crate) fn vaccination_input() -> RuleInput {
    RuleInput::new(json!({
        "ver": "1.3.0",
        "nam": {"fn": "Musterfrau", "fnt": "MUSTERFRAU", "gn": "Gabriele", "gnt": "GABRIELE"},
        "dob": "1998-02",
        "v": [{
            "tg": "840539006",
            "vp": "1119349007",
            "mp": "EU/1/20/1528",
            "ma": "ORG-100030215",
            "dn": 2,
            "sd": 2,
            "dt": "2021-02-18",
            "co": "AT",
            "is": "Ministry of Health, Austria",
            "ci": "URN:UVCI:01:AT:10807843F94AEE0EE5093FBC254BD813#B"
        }]
    }))
}

/// `Logic` of a rule that holds for `days` days after the vaccination date.
pub(crate) fn valid_for_days(days: i64) -> Value {
    json!({
        "not-after": [
            {"plusTime": [{"var": "external.validationClock"}, 0, "day"]},
            {"plusTime": [{"var": "payload.v.0.dt"}, days, "day"]}
        ]
    })
}
