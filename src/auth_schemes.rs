// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Validation of the `authSchemes` endpoint property.
//!
//! Each endpoint may carry a list of auth scheme records. Known schemes (`sigv4`,
//! `sigv4a` and the `beta-*` family) accept a fixed set of keys with fixed types.

use crate::ast::*;
use crate::utils::format_path;
use crate::Rc;

use core::fmt;
use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A problem found in an `authSchemes` property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthSchemeDiagnostic {
    pub severity: Severity,
    pub path: Vec<String>,
    pub message: String,
}

impl fmt::Display for AuthSchemeDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: ", self.severity)?;
        if !self.path.is_empty() {
            write!(f, "{}: ", format_path(&self.path))?;
        }
        write!(f, "{}", self.message)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum PropertyKind {
    String,
    Bool,
    StringList,
}

impl PropertyKind {
    fn matches(&self, lit: &Literal) -> bool {
        match (self, lit) {
            (PropertyKind::String, Literal::String(_)) => true,
            (PropertyKind::Bool, Literal::Bool(_)) => true,
            (PropertyKind::StringList, Literal::Array(items)) => {
                items.iter().all(|i| matches!(i, Literal::String(_)))
            }
            _ => false,
        }
    }
}

// Keys accepted by a scheme, in the order they are reported.
struct SchemeRules {
    properties: &'static [(&'static str, PropertyKind)],
    required: &'static [&'static str],
}

const SIGV4: SchemeRules = SchemeRules {
    properties: &[
        ("name", PropertyKind::String),
        ("signingName", PropertyKind::String),
        ("signingRegion", PropertyKind::String),
        ("disableDoubleEncoding", PropertyKind::Bool),
        ("disableNormalizePath", PropertyKind::Bool),
    ],
    required: &[],
};

const SIGV4A: SchemeRules = SchemeRules {
    properties: &[
        ("name", PropertyKind::String),
        ("signingName", PropertyKind::String),
        ("signingRegionSet", PropertyKind::StringList),
        ("disableDoubleEncoding", PropertyKind::Bool),
        ("disableNormalizePath", PropertyKind::Bool),
    ],
    required: &[],
};

const BETA: SchemeRules = SchemeRules {
    properties: &[
        ("name", PropertyKind::String),
        ("signingName", PropertyKind::String),
    ],
    required: &["signingName"],
};

fn rules_for(name: &str) -> Option<&'static SchemeRules> {
    match name {
        "sigv4" => Some(&SIGV4),
        "sigv4a" => Some(&SIGV4A),
        _ if name.starts_with("beta-") => Some(&BETA),
        _ => None,
    }
}

/// Walks every endpoint of a rule set and checks its auth schemes.
pub struct AuthSchemeValidator {
    unknown_property: Severity,
    path: Vec<String>,
    diagnostics: Vec<AuthSchemeDiagnostic>,
}

impl AuthSchemeValidator {
    pub fn new(unknown_property: Severity) -> Self {
        Self {
            unknown_property,
            path: vec![],
            diagnostics: vec![],
        }
    }

    pub fn validate(mut self, ruleset: &RuleSet) -> Vec<AuthSchemeDiagnostic> {
        self.rules(&ruleset.rules);
        self.diagnostics
    }

    fn report(&mut self, severity: Severity, message: String) {
        if severity == Severity::Warning {
            warn!("{}: {message}", format_path(&self.path));
        }
        self.diagnostics.push(AuthSchemeDiagnostic {
            severity,
            path: self.path.clone(),
            message,
        });
    }

    fn nested(&mut self, crumb: String, f: impl FnOnce(&mut Self)) {
        self.path.push(crumb);
        f(self);
        self.path.pop();
    }

    fn rules(&mut self, rules: &[Ref<Rule>]) {
        for (idx, rule) in rules.iter().enumerate() {
            self.nested(format!("rule {}", idx + 1), |v| match &rule.action {
                RuleAction::Endpoint(endpoint) => {
                    v.nested("endpoint".into(), |v| v.endpoint(&endpoint.properties))
                }
                RuleAction::Tree(rules) => v.nested("tree".into(), |v| v.rules(rules)),
                RuleAction::Error(_) => (),
            });
        }
    }

    fn endpoint(&mut self, properties: &BTreeMap<Rc<str>, Literal>) {
        let Some(schemes) = properties.get("authSchemes") else {
            return;
        };
        let Literal::Array(schemes) = schemes else {
            self.report(
                Severity::Error,
                format!("Expected `authSchemes` to be a list, found: `{schemes}`"),
            );
            return;
        };
        for (idx, scheme) in schemes.iter().enumerate() {
            self.nested(format!("auth scheme {}", idx + 1), |v| match scheme {
                Literal::Record(fields) => v.scheme(fields),
                _ => v.report(
                    Severity::Error,
                    format!("Expected `authSchemes` to be a list of objects, but found: `{scheme}`"),
                ),
            });
        }
    }

    fn scheme(&mut self, fields: &BTreeMap<Rc<str>, Literal>) {
        let name = match fields.get("name") {
            Some(Literal::String(t)) => t.raw.clone(),
            Some(other) => {
                self.report(
                    Severity::Error,
                    format!("Unexpected type for auth property `name`, found: `{other}`"),
                );
                return;
            }
            None => {
                self.report(
                    Severity::Error,
                    "Expected `authSchemes` to have a `name` key but it did not".to_string(),
                );
                return;
            }
        };

        let Some(rules) = rules_for(&name) else {
            self.report(Severity::Error, format!("Unexpected auth scheme: `{name}`"));
            return;
        };

        for key in rules.required {
            if !fields.contains_key(*key) {
                self.report(Severity::Error, format!("Missing key: `{key}`"));
            }
        }

        for (key, value) in fields.iter() {
            match rules.properties.iter().find(|(k, _)| *k == key.as_ref()) {
                Some((_, kind)) if kind.matches(value) => (),
                Some(_) => self.report(
                    Severity::Error,
                    format!("Unexpected type for auth property `{key}`, found: `{value}`"),
                ),
                None => {
                    let valid: Vec<&str> = rules.properties.iter().map(|(k, _)| *k).collect();
                    self.report(
                        self.unknown_property,
                        format!("Unexpected key: `{key}` (valid keys: {})", valid.join(", ")),
                    );
                }
            }
        }
    }
}
