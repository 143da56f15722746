// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Validation of EU Digital COVID Certificates.
//!
//! A [`Validator`] takes a scanned `HC1:` (or internal `TGCT:`) string, checks
//! it against the signed trust data (trust list, business rules, value sets)
//! and reports, per requested region, whether the certificate is accepted and
//! until when.
//!
//! ```no_run
//! # async fn demo(anchor_der: Vec<u8>, qr: &str) -> Result<(), hcert::SetupError> {
//! use hcert::{Environment, Validator, ValidatorConfig};
//!
//! let config = ValidatorConfig::for_environment(Environment::Test).with_trust_anchor(anchor_der);
//! let validator = Validator::new(config)?;
//! let result = validator.validate_now(qr, "de", "AT", &["ET", "NG"]).await;
//! println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod person_match;
pub mod result;
pub mod source;
pub mod validator;

pub use cache::{TrustData, TrustDataCache};
pub use config::{Environment, ResourceNames, TgctKeyMaterial, ValidatorConfig, PRODUCTION_TRUST_URL, TEST_TRUST_URL};
pub use person_match::check_person;
pub use result::{ErrorKind, Holder, RegionResult, Scheme, SetupError, ValidationError, ValidationResult};
pub use source::{FetchError, HttpTrustDataSource, RawTrustData, Resource, StaticTrustDataSource, TrustDataSource};
pub use hcert_rules::{Clock, FixedClock, SystemClock};
pub use validator::Validator;
