// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::RuleSet;
use crate::auth_schemes::{AuthSchemeDiagnostic, AuthSchemeValidator, Severity};
use crate::builtins::aws::partition::PartitionTable;
use crate::builtins::{Builtin, Extension, Extensions};
use crate::interpreter::error::ResolveError;
use crate::interpreter::Interpreter;
use crate::type_checker::{TypeChecker, TypeError};
use crate::value::{Endpoint, Value};
use crate::Rc;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Result};
use log::info;
use parking_lot::RwLock;

/// Knobs shared by the type checker, the evaluator and the auth scheme validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Maximum nesting of tree rules. The top level list of rules is depth 1.
    pub max_tree_depth: usize,

    /// Severity of unknown keys in a known auth scheme.
    pub unknown_auth_property_severity: Severity,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_tree_depth: 64,
            unknown_auth_property_severity: Severity::Error,
        }
    }
}

/// The endpoint rules engine.
///
/// An engine owns one immutable rule set, the extensions registered for it and a
/// partition table. `resolve` takes `&self`; the partition table can be replaced
/// while other threads are resolving. Each call works on the table it saw when it
/// started.
pub struct Engine {
    ruleset: Rc<RuleSet>,
    extensions: Extensions,
    partitions: RwLock<Rc<PartitionTable>>,
    options: EngineOptions,
    prepared: bool,
}

impl Clone for Engine {
    fn clone(&self) -> Self {
        Self {
            ruleset: self.ruleset.clone(),
            extensions: self.extensions.clone(),
            partitions: RwLock::new(self.partitions()),
            options: self.options.clone(),
            prepared: self.prepared,
        }
    }
}

impl Engine {
    pub fn new(ruleset: RuleSet) -> Self {
        Self::with_options(ruleset, EngineOptions::default())
    }

    pub fn with_options(ruleset: RuleSet, options: EngineOptions) -> Self {
        Self {
            ruleset: Rc::new(ruleset),
            extensions: Extensions::new(),
            partitions: RwLock::new(Rc::new(PartitionTable::default())),
            options,
            prepared: false,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(Self::new(RuleSet::from_json_str(json)?))
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(RuleSet::from_json_file(path)?))
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(Self::new(RuleSet::from_yaml_str(yaml)?))
    }

    pub fn ruleset(&self) -> &RuleSet {
        &self.ruleset
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: EngineOptions) {
        self.options = options;
        self.prepared = false;
    }

    /// Register a function callable from rules as `name`.
    ///
    /// Names of builtins, `getAttr` and already registered extensions are rejected.
    pub fn add_extension(&mut self, name: &str, extension: Extension) -> Result<()> {
        if name == "getAttr" || Builtin::lookup(name).is_some() {
            bail!("`{name}` is a builtin function and cannot be redefined");
        }
        if self.extensions.contains_key(name) {
            bail!("extension `{name}` already added");
        }
        self.extensions.insert(name.to_string(), extension);
        self.prepared = false;
        Ok(())
    }

    /// Type check the rule set against the builtins and registered extensions.
    pub fn typecheck(&self) -> Result<(), Vec<TypeError>> {
        let errors = TypeChecker::new(&self.ruleset, &self.extensions, &self.options).check();
        match errors.is_empty() {
            true => Ok(()),
            false => Err(errors),
        }
    }

    /// Type check the rule set and enable `resolve`.
    pub fn prepare(&mut self) -> Result<(), Vec<TypeError>> {
        if !self.prepared {
            self.typecheck()?;
            self.prepared = true;
        }
        Ok(())
    }

    /// Resolve an endpoint for the given parameters.
    ///
    /// Parameters the rule set does not declare are ignored. `Value::Empty` is
    /// treated as an absent parameter.
    pub fn resolve(&self, params: &BTreeMap<String, Value>) -> Result<Endpoint, ResolveError> {
        if !self.prepared {
            return Err(ResolveError::NotPrepared);
        }
        let partitions = self.partitions();
        Interpreter::new(&self.ruleset, &partitions, &self.extensions, &self.options)
            .resolve(params)
    }

    /// Resolve with parameters given as a record value, as in test cases.
    pub fn resolve_value(&self, params: &Value) -> Result<Endpoint, ResolveError> {
        let params = match params {
            Value::Record(fields) => fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            Value::Empty => BTreeMap::new(),
            _ => {
                return Err(ResolveError::Internal(
                    format!("parameters must be a record. Got `{params}`").into(),
                ))
            }
        };
        self.resolve(&params)
    }

    /// The partition table used by calls starting now.
    pub fn partitions(&self) -> Rc<PartitionTable> {
        self.partitions.read().clone()
    }

    /// Replace the partition table. Calls already running keep the old table.
    pub fn set_partitions(&self, partitions: PartitionTable) {
        let count = partitions.partitions().len();
        *self.partitions.write() = Rc::new(partitions);
        info!("partition table replaced ({count} partition(s))");
    }

    pub fn set_partitions_from_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.set_partitions(PartitionTable::from_json_file(path)?);
        Ok(())
    }

    /// Check every endpoint's `authSchemes` property.
    pub fn validate_auth_schemes(&self) -> Vec<AuthSchemeDiagnostic> {
        AuthSchemeValidator::new(self.options.unknown_auth_property_severity)
            .validate(&self.ruleset)
    }
}
