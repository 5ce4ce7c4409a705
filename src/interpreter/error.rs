// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::Rc;
use thiserror::Error;

type String = Rc<str>;

/// Error type for endpoint resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Every rule was tried and none matched
    #[error("No rules matched: {context}")]
    NoMatch { context: String },

    /// An error rule matched
    #[error("{message}")]
    RuleError { message: String },

    /// A required parameter has no value and no default
    #[error("Missing required parameter `{0}`")]
    MissingParameter(String),

    /// A supplied parameter value does not match the declared type
    #[error("Invalid value for parameter `{name}`: expected {expected} but found `{found}`")]
    InvalidParameter {
        name: String,
        expected: String,
        found: String,
    },

    /// Rule trees are nested deeper than the configured limit
    #[error("Rule tree depth exceeds the limit of {0}")]
    RecursionLimit(usize),

    /// `resolve` was called before the rule set was type checked
    #[error("Engine has not been prepared. Call `prepare` before `resolve`")]
    NotPrepared,

    /// A function failed at runtime. The type checker rules this out for builtins.
    #[error("Internal error: {0}")]
    Internal(String),
}
