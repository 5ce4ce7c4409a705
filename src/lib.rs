// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Use README.md as crate documentation.
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

mod ast;
mod auth_schemes;
mod builtins;
mod engine;
mod interpreter;
mod parser;
mod source;
mod test_utils;
mod type_checker;
mod types;
mod utils;
mod value;

#[cfg(feature = "arc")]
use std::sync::Arc as Rc;
#[cfg(not(feature = "arc"))]
use std::rc::Rc;

pub use ast::{Parameter, ParameterType, RuleSet};
pub use auth_schemes::{AuthSchemeDiagnostic, Severity};
pub use builtins::aws::partition::{Partition, PartitionOutputs, PartitionTable};
pub use builtins::{Extension, ExtensionFcn};
pub use engine::{Engine, EngineOptions};
pub use interpreter::error::ResolveError;
pub use parser::ParseError;
pub use test_utils::{EndpointTestCase, EndpointTestSuite, Expectation, TestFailure};
pub use type_checker::{typecheck, TypeError};
pub use types::Type;
pub use value::{Endpoint, Value};

/// Items in `unstable` are likely to change.
pub mod unstable {
    pub use crate::ast::*;
    pub use crate::auth_schemes::AuthSchemeValidator;
    pub use crate::builtins::aws::arn::Arn;
    pub use crate::builtins::Builtin;
    pub use crate::parser::parse_template;
    pub use crate::source::*;
    pub use crate::type_checker::TypeChecker;
    pub use crate::utils::path::AccessComponent;
}
