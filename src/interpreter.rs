// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

pub mod error;

use crate::ast::*;
use crate::builtins::aws::partition::PartitionTable;
use crate::builtins::{BuiltinContext, Extensions};
use crate::engine::EngineOptions;
use crate::utils::format_path;
use crate::utils::path::project_value;
use crate::value::{Endpoint, Value};
use crate::Rc;

use error::ResolveError;

use std::collections::BTreeMap;

use log::{debug, warn};

// Bindings visible to a rule. Each rule starts from a copy of its parent's scope.
type Scope = BTreeMap<Rc<str>, Value>;

fn internal(e: anyhow::Error) -> ResolveError {
    ResolveError::Internal(e.to_string().into())
}

fn format_trail(trail: &[usize]) -> String {
    let crumbs: Vec<String> = trail.iter().map(|idx| format!("rule {idx}")).collect();
    format_path(&crumbs)
}

/// Evaluates a type checked rule set against one set of parameters.
pub struct Interpreter<'a> {
    ruleset: &'a RuleSet,
    ctx: BuiltinContext<'a>,
    extensions: &'a Extensions,
    max_tree_depth: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        ruleset: &'a RuleSet,
        partitions: &'a PartitionTable,
        extensions: &'a Extensions,
        options: &EngineOptions,
    ) -> Self {
        Self {
            ruleset,
            ctx: BuiltinContext { partitions },
            extensions,
            max_tree_depth: options.max_tree_depth,
        }
    }

    /// Walk the rule tree and return the first endpoint that matches.
    pub fn resolve(&self, params: &BTreeMap<String, Value>) -> Result<Endpoint, ResolveError> {
        let scope = self.bind_parameters(params)?;
        let mut trail = vec![];
        match self.eval_rules(&self.ruleset.rules, &scope, &mut trail)? {
            Some(endpoint) => Ok(endpoint),
            None => Err(ResolveError::NoMatch {
                context: "no rule in the rule set matched".into(),
            }),
        }
    }

    fn bind_parameters(&self, params: &BTreeMap<String, Value>) -> Result<Scope, ResolveError> {
        for name in params.keys() {
            if self.ruleset.parameter(name).is_none() {
                debug!("ignoring unknown parameter `{name}`");
            }
        }

        let mut scope = Scope::new();
        for param in self.ruleset.parameters.iter() {
            let value = match params.get(param.name.as_ref()) {
                Some(v) if !v.is_empty() => {
                    if !param.ty.accepts(v) {
                        return Err(ResolveError::InvalidParameter {
                            name: param.name.clone(),
                            expected: param.ty.as_str().into(),
                            found: v.to_string().into(),
                        });
                    }
                    if let Some(deprecated) = &param.deprecated {
                        warn!(
                            "parameter `{}` is deprecated{}{}",
                            param.name,
                            deprecated
                                .since
                                .as_ref()
                                .map(|s| format!(" since {s}"))
                                .unwrap_or_default(),
                            deprecated
                                .message
                                .as_ref()
                                .map(|m| format!(": {m}"))
                                .unwrap_or_default(),
                        );
                    }
                    v.clone()
                }
                _ => match (&param.default, param.required) {
                    (Some(default), _) => default.clone(),
                    (None, true) => return Err(ResolveError::MissingParameter(param.name.clone())),
                    (None, false) => Value::Empty,
                },
            };
            scope.insert(param.name.clone(), value);
        }
        Ok(scope)
    }

    fn eval_rules(
        &self,
        rules: &[Ref<Rule>],
        scope: &Scope,
        trail: &mut Vec<usize>,
    ) -> Result<Option<Endpoint>, ResolveError> {
        if trail.len() >= self.max_tree_depth {
            return Err(ResolveError::RecursionLimit(self.max_tree_depth));
        }

        for (idx, rule) in rules.iter().enumerate() {
            trail.push(idx + 1);
            let result = self.eval_rule(rule, scope.clone(), trail);
            trail.pop();
            if let Some(endpoint) = result? {
                return Ok(Some(endpoint));
            }
        }
        Ok(None)
    }

    // Ok(None) means a condition did not hold and the next rule should be tried.
    fn eval_rule(
        &self,
        rule: &Rule,
        mut scope: Scope,
        trail: &mut Vec<usize>,
    ) -> Result<Option<Endpoint>, ResolveError> {
        for (idx, condition) in rule.conditions.iter().enumerate() {
            let value = self.eval_expr(&condition.expr, &scope)?;
            if !value.is_truthy() {
                debug!(
                    "{}: condition {} `{}` did not hold",
                    format_trail(trail),
                    idx + 1,
                    condition.expr.as_ref()
                );
                return Ok(None);
            }
            if let Some(name) = &condition.assign {
                scope.insert(name.clone(), value);
            }
        }

        debug!("{}: matched", format_trail(trail));
        match &rule.action {
            RuleAction::Endpoint(endpoint) => Ok(Some(self.render_endpoint(endpoint, &scope)?)),
            RuleAction::Error(message) => {
                let message = self.eval_expr(message, &scope)?;
                let message = message.expect_str("error message").map_err(internal)?;
                Err(ResolveError::RuleError {
                    message: message.into(),
                })
            }
            // Tree rules are terminal: once entered, one of their rules must match.
            RuleAction::Tree(rules) => match self.eval_rules(rules, &scope, trail)? {
                Some(endpoint) => Ok(Some(endpoint)),
                None => Err(ResolveError::NoMatch {
                    context: format!(
                        "tree rule at {} matched but none of its rules did",
                        format_trail(trail)
                    )
                    .into(),
                }),
            },
        }
    }

    fn eval_expr(&self, expr: &Expr, scope: &Scope) -> Result<Value, ResolveError> {
        match expr {
            Expr::Ref(name) => Ok(scope.get(name).cloned().unwrap_or(Value::Empty)),
            Expr::Literal(lit) => self.eval_literal(lit, scope),
            Expr::Call(call) => self.eval_call(call, scope),
            Expr::GetAttr { target, path, .. } => {
                let target = self.eval_expr(target, scope)?;
                Ok(project_value(&target, path))
            }
        }
    }

    fn eval_call(&self, call: &FnCall, scope: &Scope) -> Result<Value, ResolveError> {
        let args = call
            .args
            .iter()
            .map(|arg| self.eval_expr(arg, scope))
            .collect::<Result<Vec<_>, _>>()?;

        let result = match &call.function {
            Function::Builtin(builtin) => builtin.eval(&self.ctx, &args),
            Function::Extension(name) => match self.extensions.get(name.as_ref()) {
                Some(ext) => (ext.fcn)(&args),
                None => {
                    return Err(ResolveError::Internal(
                        format!("Unknown function `{name}`").into(),
                    ))
                }
            },
        };
        result.map_err(|e| ResolveError::Internal(format!("in `{call}`: {e}").into()))
    }

    fn eval_literal(&self, lit: &Literal, scope: &Scope) -> Result<Value, ResolveError> {
        Ok(match lit {
            Literal::String(template) => Value::from(self.render_template(template, scope)?),
            Literal::Bool(b) => Value::from(*b),
            Literal::Integer(n) => Value::from(*n),
            Literal::Array(items) => Value::from(
                items
                    .iter()
                    .map(|item| self.eval_literal(item, scope))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Literal::Record(fields) => {
                let mut record = BTreeMap::new();
                for (name, value) in fields.iter() {
                    record.insert(name.clone(), self.eval_literal(value, scope)?);
                }
                Value::from(record)
            }
        })
    }

    fn render_template(&self, template: &Template, scope: &Scope) -> Result<String, ResolveError> {
        let mut out = String::new();
        for part in template.parts.iter() {
            match part {
                TemplatePart::Literal(s) => out.push_str(s),
                TemplatePart::Dynamic { raw, expr } => {
                    let value = self.eval_expr(expr, scope)?;
                    let s = value
                        .expect_str(&format!("placeholder `{{{raw}}}`"))
                        .map_err(internal)?;
                    out.push_str(s);
                }
            }
        }
        Ok(out)
    }

    fn render_endpoint(
        &self,
        endpoint: &EndpointTemplate,
        scope: &Scope,
    ) -> Result<Endpoint, ResolveError> {
        let url = self.eval_expr(&endpoint.url, scope)?;
        let mut rendered = Endpoint::new(url.expect_str("endpoint url").map_err(internal)?);

        for (name, values) in endpoint.headers.iter() {
            let mut rendered_values = Vec::with_capacity(values.len());
            for value in values.iter() {
                let value = self.eval_expr(value, scope)?;
                let s = value
                    .expect_str(&format!("value of header `{name}`"))
                    .map_err(internal)?;
                rendered_values.push(s.to_string());
            }
            rendered.headers.insert(name.to_string(), rendered_values);
        }

        for (name, value) in endpoint.properties.iter() {
            rendered
                .properties
                .insert(name.to_string(), self.eval_literal(value, scope)?);
        }
        Ok(rendered)
    }
}
