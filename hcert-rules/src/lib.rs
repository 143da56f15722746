// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Business rules for health certificates.
//!
//! - [`rules`]: rule model, signed container decoding, country/region filter
//! - [`value_sets`]: code tables referenced from rule logic
//! - [`certlogic`]: expression tree and evaluator
//! - [`engine`]: evaluating a rule set against one certificate
//! - [`solver`]: how long a valid certificate stays valid

pub mod certlogic;
pub mod clock;
pub mod engine;
pub mod error;
pub mod rules;
pub mod solver;
pub mod value_sets;

pub use certlogic::{CompareOp, DateCompareOp, Expr, Value};
pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::{evaluate, RuleFailure, RuleInput, RuleValidationResult};
pub use error::RuleError;
pub use rules::{BusinessRules, Description, Rule};
pub use solver::{get_valid_until, solve_valid_until};
pub use value_sets::{ValueSet, ValueSetEntry, ValueSets};
