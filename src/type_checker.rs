// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Static type checker for endpoint rule sets.
//!
//! The checker walks the rule tree once, threading a scope of bound names. A
//! condition's `assign` (or an `isSet(name)` test) narrows `Option<T>` to `T` for
//! the rest of that rule only; sibling rules start again from the parent scope.
//! Every error is collected, so a single run reports all problems in a rule set.

use crate::ast::*;
use crate::builtins::{check_arguments, Builtin, Extensions};
use crate::engine::EngineOptions;
use crate::types::Type;
use crate::utils::format_path;
use crate::utils::path::project_type;
use crate::Rc;

use core::fmt;
use std::collections::BTreeMap;

use log::debug;

/// A type error with the breadcrumb trail leading to the offending expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeError {
    pub path: Vec<String>,
    pub message: String,
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", format_path(&self.path), self.message)
        }
    }
}

impl std::error::Error for TypeError {}

// Names in scope. Cloned and extended, never shared between sibling rules.
type Scope = BTreeMap<Rc<str>, Type>;

/// Type checker for a single rule set.
#[derive(Debug)]
pub struct TypeChecker<'a> {
    ruleset: &'a RuleSet,
    extensions: &'a Extensions,
    max_tree_depth: usize,
    path: Vec<String>,
    errors: Vec<TypeError>,
}

impl<'a> TypeChecker<'a> {
    pub fn new(ruleset: &'a RuleSet, extensions: &'a Extensions, options: &EngineOptions) -> Self {
        Self {
            ruleset,
            extensions,
            max_tree_depth: options.max_tree_depth,
            path: vec![],
            errors: vec![],
        }
    }

    /// Check the whole rule set and return the errors in traversal order.
    pub fn check(mut self) -> Vec<TypeError> {
        let scope: Scope = self
            .ruleset
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.ty()))
            .collect();
        let ruleset = self.ruleset;
        self.rules(&ruleset.rules, &scope, 1);
        debug!("type check finished with {} error(s)", self.errors.len());
        self.errors
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(TypeError {
            path: self.path.clone(),
            message: message.into(),
        });
    }

    fn nested<T>(&mut self, crumb: String, f: impl FnOnce(&mut Self) -> T) -> T {
        self.path.push(crumb);
        let r = f(self);
        self.path.pop();
        r
    }

    fn rules(&mut self, rules: &[Ref<Rule>], scope: &Scope, depth: usize) {
        if depth > self.max_tree_depth {
            self.error(format!(
                "rule tree exceeds the maximum depth of {}",
                self.max_tree_depth
            ));
            return;
        }

        let mut unconditional: Option<usize> = None;
        for (idx, rule) in rules.iter().enumerate() {
            self.nested(format!("rule {}", idx + 1), |c| {
                if let Some(prev) = unconditional {
                    c.error(format!(
                        "rule is unreachable: rule {prev} at the same level has no conditions"
                    ));
                }
                c.rule(rule, scope.clone(), depth);
            });
            if rule.conditions.is_empty() && unconditional.is_none() {
                unconditional = Some(idx + 1);
            }
        }
    }

    fn rule(&mut self, rule: &Rule, mut scope: Scope, depth: usize) {
        for (idx, condition) in rule.conditions.iter().enumerate() {
            self.nested(format!("condition {}", idx + 1), |c| {
                c.condition(condition, &mut scope)
            });
        }

        match &rule.action {
            RuleAction::Endpoint(endpoint) => {
                self.nested("endpoint".into(), |c| c.endpoint(endpoint, &scope))
            }
            RuleAction::Error(message) => self.nested("error".into(), |c| {
                if let Some(ty) = c.expr(message, &scope) {
                    if let Err(e) = ty.expect_string() {
                        c.error(format!("error message: {e}"));
                    }
                }
            }),
            RuleAction::Tree(rules) => {
                self.nested("tree".into(), |c| c.rules(rules, &scope, depth + 1))
            }
        }
    }

    fn condition(&mut self, condition: &Condition, scope: &mut Scope) {
        let ty = self.expr(&condition.expr, scope);

        match (&condition.assign, &ty) {
            (Some(name), _) => {
                if let Some(prev) = scope.get(name) {
                    self.error(format!(
                        "Invalid shadowing of `{name}` (first declared with type {prev})"
                    ));
                    return;
                }
                let bound = ty.as_ref().map(|t| t.proven_truthy()).unwrap_or(Type::Any);
                scope.insert(name.clone(), bound);
            }
            (None, Some(ty)) => {
                if let Err(e) = ty.expect_condition() {
                    self.error(e.to_string());
                }
            }
            (None, None) => (),
        }

        // `isSet(name)` proves `name` for the rest of the rule.
        if let Expr::Call(call) = condition.expr.as_ref() {
            if call.function == Function::Builtin(Builtin::IsSet) {
                if let [arg] = call.args.as_slice() {
                    if let Expr::Ref(name) = arg.as_ref() {
                        if let Some(t) = scope.get(name).map(|t| t.proven_truthy()) {
                            scope.insert(name.clone(), t);
                        }
                    }
                }
            }
        }
    }

    fn endpoint(&mut self, endpoint: &EndpointTemplate, scope: &Scope) {
        self.nested("url".into(), |c| {
            if let Some(ty) = c.expr(&endpoint.url, scope) {
                if let Err(e) = ty.expect_string() {
                    c.error(format!("url: {e}"));
                }
            }
        });

        for (name, values) in endpoint.headers.iter() {
            self.nested(format!("header `{name}`"), |c| {
                for (idx, value) in values.iter().enumerate() {
                    c.nested(format!("value {}", idx + 1), |c| {
                        if let Some(ty) = c.expr(value, scope) {
                            if let Err(e) = ty.expect_string() {
                                c.error(format!("header value: {e}"));
                            }
                        }
                    });
                }
            });
        }

        for (name, value) in endpoint.properties.iter() {
            self.nested(format!("property `{name}`"), |c| {
                c.literal(value, scope);
            });
        }
    }

    /// Type of `expr`, or `None` when an error has been reported for it.
    fn expr(&mut self, expr: &Expr, scope: &Scope) -> Option<Type> {
        match expr {
            Expr::Ref(name) => match scope.get(name) {
                Some(ty) => Some(ty.clone()),
                None => {
                    self.error(format!(
                        "Undefined reference `{name}`. References must name a parameter or an earlier `assign`"
                    ));
                    None
                }
            },
            Expr::Literal(lit) => self.literal(lit, scope),
            Expr::Call(call) => self.call(call, scope),
            Expr::GetAttr { target, path, raw } => {
                let base = self.expr(target, scope)?;
                match project_type(&base, path) {
                    Ok(ty) => Some(ty),
                    Err(e) => {
                        self.error(format!("in `{}#{raw}`: {e}", target.as_ref()));
                        None
                    }
                }
            }
        }
    }

    fn call(&mut self, call: &FnCall, scope: &Scope) -> Option<Type> {
        let mut args = Vec::with_capacity(call.args.len());
        let mut ok = true;
        for (idx, arg) in call.args.iter().enumerate() {
            let name = &call.name;
            match self.nested(format!("argument {} of `{name}`", idx + 1), |c| {
                c.expr(arg, scope)
            }) {
                Some(ty) => args.push(ty),
                None => ok = false,
            }
        }
        if !ok {
            return None;
        }

        let result = match &call.function {
            Function::Builtin(builtin) => builtin.typecheck(&args),
            Function::Extension(name) => match self.extensions.get(name.as_ref()) {
                Some(ext) => check_arguments(name, &ext.args, &args).map(|_| ext.ret.clone()),
                None => {
                    self.error(format!("Unknown function `{name}`"));
                    return None;
                }
            },
        };
        match result {
            Ok(ty) => Some(ty),
            Err(e) => {
                self.error(format!("in `{call}`: {e}"));
                None
            }
        }
    }

    fn literal(&mut self, lit: &Literal, scope: &Scope) -> Option<Type> {
        match lit {
            Literal::String(template) => self.template(template, scope),
            Literal::Bool(_) => Some(Type::Bool),
            Literal::Integer(_) => Some(Type::Integer),
            Literal::Array(items) => {
                let mut member: Option<Type> = None;
                let mut ok = true;
                for (idx, item) in items.iter().enumerate() {
                    let ty = self.nested(format!("element {}", idx + 1), |c| {
                        c.literal(item, scope)
                    });
                    match (ty, &member) {
                        (Some(ty), None) => member = Some(ty),
                        (Some(ty), Some(first)) if ty.is_a(first) => (),
                        (Some(ty), Some(first)) => {
                            self.error(format!(
                                "array elements must share a type: element 1 is {first} but element {} is {ty}",
                                idx + 1
                            ));
                            ok = false;
                        }
                        (None, _) => ok = false,
                    }
                }
                ok.then(|| Type::array(member.unwrap_or(Type::Any)))
            }
            Literal::Record(fields) => {
                let mut types = BTreeMap::new();
                let mut ok = true;
                for (name, value) in fields.iter() {
                    match self.nested(format!("field `{name}`"), |c| c.literal(value, scope)) {
                        Some(ty) => {
                            types.insert(name.clone(), ty);
                        }
                        None => ok = false,
                    }
                }
                ok.then(|| Type::Record(Rc::new(types)))
            }
        }
    }

    fn template(&mut self, template: &Template, scope: &Scope) -> Option<Type> {
        let mut ok = true;
        for part in template.parts.iter() {
            if let TemplatePart::Dynamic { raw, expr } = part {
                self.nested(format!("template \"{}\"", template.raw), |c| {
                    match c.expr(expr, scope) {
                        Some(ty) => {
                            if let Err(e) = ty.expect_string() {
                                c.error(format!("placeholder `{{{raw}}}`: {e}"));
                                ok = false;
                            }
                        }
                        None => ok = false,
                    }
                });
            }
        }
        ok.then_some(Type::String)
    }
}

/// Type check `ruleset` without extensions.
pub fn typecheck(ruleset: &RuleSet, options: &EngineOptions) -> Result<(), Vec<TypeError>> {
    let extensions = Extensions::new();
    let errors = TypeChecker::new(ruleset, &extensions, options).check();
    match errors.is_empty() {
        true => Ok(()),
        false => Err(errors),
    }
}
