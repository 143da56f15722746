// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Business rule model and decoding.
//!
//! Container content layout: `{"r": [{"i": identifier, "r": rule JSON}, ...]}`.
//! Rule JSON follows the EU business-rule schema.

use chrono::{DateTime, Utc};
use hcert_cose::{decode_value, CborValue};
use hcert_verify::{verify_signed_data, TrustAnchor};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::certlogic::{parse_date_time, Expr};
use crate::error::RuleError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Description {
    pub lang: String,
    pub desc: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub identifier: String,
    pub rule_type: String,
    pub country: String,
    pub region: String,
    pub version: String,
    pub certificate_type: String,
    pub descriptions: Vec<Description>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub affected_fields: Vec<String>,
    pub logic: Expr,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireRule {
    identifier: String,
    #[serde(default)]
    r#type: String,
    country: String,
    #[serde(default)]
    region: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    certificate_type: String,
    #[serde(default)]
    description: Vec<Description>,
    valid_from: String,
    valid_to: String,
    #[serde(default)]
    affected_fields: Vec<String>,
    logic: serde_json::Value,
}

impl Rule {
    pub fn from_json(json: &serde_json::Value) -> Result<Self, RuleError> {
        let wire: WireRule = serde_json::from_value(json.clone()).map_err(|e| RuleError::Json {
            what: "rule",
            message: e.to_string(),
        })?;
        let instant = |raw: &str, field: &'static str| {
            parse_date_time(raw).ok_or_else(|| RuleError::Json {
                what: "rule",
                message: format!("{field} '{raw}' is not a date-time"),
            })
        };
        Ok(Rule {
            valid_from: instant(&wire.valid_from, "ValidFrom")?,
            valid_to: instant(&wire.valid_to, "ValidTo")?,
            logic: Expr::parse(&wire.logic)?,
            identifier: wire.identifier,
            rule_type: wire.r#type,
            country: wire.country,
            region: wire.region,
            version: wire.version,
            certificate_type: wire.certificate_type,
            descriptions: wire.description,
            affected_fields: wire.affected_fields,
        })
    }

    /// Whether the rule applies when rules are selected at `rules_date`: `[ValidFrom, ValidTo)`.
    pub fn is_active_at(&self, rules_date: DateTime<Utc>) -> bool {
        self.valid_from <= rules_date && rules_date < self.valid_to
    }

    /// Descriptions keyed by language, each formatted as `[<identifier>] <description>`.
    pub fn failure_descriptions(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.descriptions
            .iter()
            .map(|d| (d.lang.clone(), format!("[{}] {}", self.identifier, d.desc)))
    }
}

/// Ordered rule collection. Immutable once decoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BusinessRules {
    rules: Vec<Rule>,
    valid_from: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>,
}

impl BusinessRules {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    /// Verify the signed container as of `as_of` and decode its rules.
    pub fn decode(
        content: &[u8],
        signature: &[u8],
        anchors: &[TrustAnchor],
        as_of: DateTime<Utc>,
    ) -> Result<Self, RuleError> {
        let verified = verify_signed_data(content, signature, anchors, as_of)?;
        let mut rules = Self::decode_content(&verified.content)?;
        rules.valid_from = Some(verified.valid_from);
        rules.valid_until = Some(verified.valid_until);
        Ok(rules)
    }

    /// Decode container content. Rules that fail to parse are dropped.
    pub fn decode_content(content: &[u8]) -> Result<Self, RuleError> {
        let root = decode_value(content)?;
        let entries = root
            .get_text("r")
            .and_then(CborValue::as_array)
            .ok_or_else(|| RuleError::Json {
                what: "rules container",
                message: "missing 'r' array".to_string(),
            })?;

        let mut rules = Vec::with_capacity(entries.len());
        for entry in entries {
            let id = entry.get_text("i").and_then(CborValue::as_text).unwrap_or("<unknown>");
            let parsed = entry
                .get_text("r")
                .and_then(CborValue::as_text)
                .ok_or_else(|| RuleError::Json {
                    what: "rule",
                    message: "entry without JSON body".to_string(),
                })
                .and_then(|text| {
                    serde_json::from_str(text).map_err(|e| RuleError::Json {
                        what: "rule",
                        message: e.to_string(),
                    })
                })
                .and_then(|json| Rule::from_json(&json));
            match parsed {
                Ok(rule) => rules.push(rule),
                Err(e) => warn!(rule = id, error = %e, code = e.code(), "dropping rule that does not parse"),
            }
        }
        debug!(count = rules.len(), "decoded business rules");
        Ok(Self::new(rules))
    }

    /// Rules whose country and region match exactly (case-sensitive).
    pub fn filter(&self, country: &str, region: &str) -> BusinessRules {
        BusinessRules {
            rules: self
                .rules
                .iter()
                .filter(|r| r.country == country && r.region == region)
                .cloned()
                .collect(),
            ..*self
        }
    }

    /// Window of the signed container; unbounded when built in memory.
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.valid_from.map_or(true, |from| from <= at) && self.valid_until.map_or(true, |until| at < until)
    }

    pub fn valid_until(&self) -> Option<DateTime<Utc>> {
        self.valid_until
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<'a> IntoIterator for &'a BusinessRules {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}
