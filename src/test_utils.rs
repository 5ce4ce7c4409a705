// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Endpoint test suites: parameters paired with the expected endpoint or error.

use crate::engine::Engine;
use crate::value::{Endpoint, Value};

use core::fmt;
use std::collections::BTreeMap;

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

/// `{ "testCases": [...] }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointTestSuite {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub test_cases: Vec<EndpointTestCase>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointTestCase {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
    pub expect: Expectation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expectation {
    Endpoint(Endpoint),
    /// Substring of the expected error message.
    Error(String),
}

/// A test case whose outcome differed from its expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestFailure {
    /// Position of the case in the suite, starting at 1.
    pub index: usize,
    pub documentation: Option<String>,
    pub message: String,
}

impl fmt::Display for TestFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.documentation {
            Some(doc) => write!(f, "test case {} ({doc}): {}", self.index, self.message),
            None => write!(f, "test case {}: {}", self.index, self.message),
        }
    }
}

impl EndpointTestSuite {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid endpoint test suite")
    }

    pub fn from_json_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json_str(&contents).with_context(|| format!("while loading {}", path.display()))
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("invalid endpoint test suite")
    }

    /// Run every case against `engine` and collect the failures.
    pub fn run(&self, engine: &Engine) -> Result<(), Vec<TestFailure>> {
        let failures: Vec<TestFailure> = self
            .test_cases
            .iter()
            .enumerate()
            .filter_map(|(idx, case)| {
                case.check(engine).err().map(|message| TestFailure {
                    index: idx + 1,
                    documentation: case.documentation.clone(),
                    message,
                })
            })
            .collect();
        debug!(
            "{} of {} test case(s) passed",
            self.test_cases.len() - failures.len(),
            self.test_cases.len()
        );
        match failures.is_empty() {
            true => Ok(()),
            false => Err(failures),
        }
    }
}

impl EndpointTestCase {
    /// Resolve this case's parameters and compare with the expectation.
    pub fn check(&self, engine: &Engine) -> Result<(), String> {
        let result = engine.resolve(&self.params);
        match (&self.expect, result) {
            (Expectation::Endpoint(expected), Ok(actual)) if *expected == actual => Ok(()),
            (Expectation::Endpoint(expected), Ok(actual)) => Err(format!(
                "expected endpoint {} but resolved {}",
                Value::from(expected.clone()),
                Value::from(actual)
            )),
            (Expectation::Endpoint(expected), Err(e)) => Err(format!(
                "expected endpoint `{}` but resolution failed: {e}",
                expected.url
            )),
            (Expectation::Error(expected), Err(e)) if e.to_string().contains(expected) => Ok(()),
            (Expectation::Error(expected), Err(e)) => Err(format!(
                "expected error containing `{expected}` but got `{e}`"
            )),
            (Expectation::Error(expected), Ok(actual)) => Err(format!(
                "expected error containing `{expected}` but resolved `{}`",
                actual.url
            )),
        }
    }
}
