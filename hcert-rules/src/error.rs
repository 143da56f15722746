// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use hcert_cose::CoseError;
use hcert_verify::VerifyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    /// Rule logic that cannot be turned into an expression tree.
    #[error("malformed rule logic: {0}")]
    Logic(String),

    /// Fault while evaluating well-formed logic against a payload.
    #[error("rule evaluation failed: {0}")]
    Evaluation(String),

    #[error("malformed {what}: {message}")]
    Json { what: &'static str, message: String },

    #[error(transparent)]
    Cose(#[from] CoseError),

    #[error(transparent)]
    Verify(#[from] VerifyError),
}

impl RuleError {
    pub(crate) fn eval(msg: impl Into<String>) -> Self {
        RuleError::Evaluation(msg.into())
    }

    pub(crate) fn logic(msg: impl Into<String>) -> Self {
        RuleError::Logic(msg.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            RuleError::Logic(_) => "RULE_LOGIC_MALFORMED",
            RuleError::Evaluation(_) => "RULE_EVALUATION_FAILED",
            RuleError::Json { .. } => "TRUST_DATA_MALFORMED",
            RuleError::Cose(e) => e.code(),
            RuleError::Verify(e) => e.code(),
        }
    }
}
