// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::builtins::Builtin;
use crate::source::Source;
use crate::utils::format_path;
use crate::utils::path::parse_path;
use crate::value::Value;
use crate::Rc;

use core::fmt;
use std::collections::BTreeMap;

use anyhow::{bail, Result};
use log::info;
use serde_json::{Map, Value as JsonValue};

const VERSIONS: &[&str] = &["1.0", "1.1", "1.2", "1.3"];

/// A structural problem in a rule set document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Breadcrumbs from the document root, e.g. `while parsing rule 3`.
    pub path: Vec<String>,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", format_path(&self.path), self.message)
        }
    }
}

impl std::error::Error for ParseError {}

struct Parser {
    path: Vec<String>,
    errors: Vec<ParseError>,
}

type Object = Map<String, JsonValue>;

fn kind(v: &JsonValue) -> &'static str {
    match v {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

impl Parser {
    fn new() -> Self {
        Self {
            path: vec![],
            errors: vec![],
        }
    }

    fn error<T>(&mut self, message: impl Into<String>) -> Option<T> {
        self.errors.push(ParseError {
            path: self.path.clone(),
            message: message.into(),
        });
        None
    }

    fn nested<T>(&mut self, crumb: String, f: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        self.path.push(crumb);
        let r = f(self);
        self.path.pop();
        r
    }

    fn object<'a>(&mut self, v: &'a JsonValue, what: &str) -> Option<&'a Object> {
        match v {
            JsonValue::Object(o) => Some(o),
            _ => self.error(format!("expected {what} to be an object but found {}", kind(v))),
        }
    }

    fn check_keys(&mut self, obj: &Object, allowed: &[&str], what: &str) -> bool {
        let mut ok = true;
        for key in obj.keys() {
            if !allowed.contains(&key.as_str()) {
                self.error::<()>(format!(
                    "unexpected key `{key}` in {what} (valid keys: {})",
                    allowed.join(", ")
                ));
                ok = false;
            }
        }
        ok
    }

    fn required<'a>(&mut self, obj: &'a Object, key: &str, what: &str) -> Option<&'a JsonValue> {
        match obj.get(key) {
            Some(v) => Some(v),
            None => self.error(format!("missing required key `{key}` in {what}")),
        }
    }

    fn string(&mut self, v: &JsonValue, what: &str) -> Option<Rc<str>> {
        match v {
            JsonValue::String(s) => Some(s.as_str().into()),
            _ => self.error(format!("expected {what} to be a string but found {}", kind(v))),
        }
    }

    fn boolean(&mut self, v: &JsonValue, what: &str) -> Option<bool> {
        match v {
            JsonValue::Bool(b) => Some(*b),
            _ => self.error(format!("expected {what} to be a boolean but found {}", kind(v))),
        }
    }

    fn array<'a>(&mut self, v: &'a JsonValue, what: &str) -> Option<&'a Vec<JsonValue>> {
        match v {
            JsonValue::Array(a) => Some(a),
            _ => self.error(format!("expected {what} to be an array but found {}", kind(v))),
        }
    }

    fn ruleset(&mut self, doc: &JsonValue) -> Option<RuleSet> {
        let obj = self.object(doc, "rule set")?;
        self.check_keys(obj, &["version", "serviceId", "parameters", "rules"], "rule set");

        let version = self
            .required(obj, "version", "rule set")
            .and_then(|v| self.string(v, "version"))
            .and_then(|v| match VERSIONS.contains(&v.as_ref()) {
                true => Some(v),
                false => self.error(format!(
                    "unsupported rule set version `{v}` (supported: {})",
                    VERSIONS.join(", ")
                )),
            });

        let parameters = self.nested("while parsing parameters".into(), |p| {
            let params = p.required(obj, "parameters", "rule set")?;
            let params = p.object(params, "parameters")?;
            let mut parsed = vec![];
            let mut ok = true;
            for (name, param) in params.iter() {
                match p.nested(format!("while parsing parameter `{name}`"), |p| {
                    p.parameter(name, param)
                }) {
                    Some(param) => parsed.push(param),
                    None => ok = false,
                }
            }
            ok.then_some(parsed)
        });

        let rules = self
            .required(obj, "rules", "rule set")
            .and_then(|rules| self.rules(rules));

        Some(RuleSet {
            version: version?,
            parameters: parameters?,
            rules: rules?,
        })
    }

    fn parameter(&mut self, name: &str, v: &JsonValue) -> Option<Parameter> {
        let obj = self.object(v, "parameter")?;
        let mut ok = self.check_keys(
            obj,
            &[
                "type",
                "builtIn",
                "required",
                "default",
                "documentation",
                "deprecated",
            ],
            "parameter",
        );
        if name.is_empty() {
            ok = self.error::<()>("parameter name may not be empty").is_some();
        }

        let ty = self
            .required(obj, "type", "parameter")
            .and_then(|v| self.string(v, "type"))
            .and_then(|t| match t.to_ascii_lowercase().as_str() {
                "string" => Some(ParameterType::String),
                "boolean" => Some(ParameterType::Boolean),
                "stringarray" => Some(ParameterType::StringArray),
                _ => self.error(format!(
                    "unknown parameter type `{t}` (valid types: string, boolean, stringArray)"
                )),
            });

        let opt_string = |p: &mut Self, key: &str| match obj.get(key) {
            Some(v) => p.string(v, key).map(Some),
            None => Some(None),
        };
        let built_in = opt_string(self, "builtIn");
        let documentation = opt_string(self, "documentation");

        let required = match obj.get("required") {
            Some(v) => self.boolean(v, "required"),
            None => Some(false),
        };

        let deprecated = match obj.get("deprecated") {
            Some(v) => self.nested("while parsing deprecated".into(), |p| {
                let d = p.object(v, "deprecated")?;
                p.check_keys(d, &["message", "since"], "deprecated")
                    .then_some(())?;
                let message = match d.get("message") {
                    Some(m) => Some(p.string(m, "message")?),
                    None => None,
                };
                let since = match d.get("since") {
                    Some(s) => Some(p.string(s, "since")?),
                    None => None,
                };
                Some(Some(Deprecated { message, since }))
            }),
            None => Some(None),
        };

        let default = match (obj.get("default"), ty) {
            (Some(v), Some(ty)) => match serde_json::from_value::<Value>(v.clone()) {
                Ok(value) if ty.accepts(&value) => Some(Some(value)),
                Ok(value) => self.error(format!(
                    "default value `{value}` does not match parameter type {}",
                    ty.as_str()
                )),
                Err(e) => self.error(format!("invalid default value: {e}")),
            },
            _ => Some(None),
        };

        let (ty, required, default) = (ty?, required?, default?);
        if default.is_some() && !required {
            return self.error("a parameter with a `default` must also set `required: true`");
        }
        if !ok {
            return None;
        }

        Some(Parameter {
            name: name.into(),
            ty,
            required,
            default,
            built_in: built_in?,
            documentation: documentation?,
            deprecated: deprecated?,
        })
    }

    fn rules(&mut self, v: &JsonValue) -> Option<Vec<Ref<Rule>>> {
        let items = self.array(v, "rules")?;
        let mut rules = Vec::with_capacity(items.len());
        let mut ok = true;
        for (idx, item) in items.iter().enumerate() {
            match self.nested(format!("while parsing rule {}", idx + 1), |p| p.rule(item)) {
                Some(rule) => rules.push(Ref::new(rule)),
                None => ok = false,
            }
        }
        ok.then_some(rules)
    }

    fn rule(&mut self, v: &JsonValue) -> Option<Rule> {
        let obj = self.object(v, "rule")?;
        let rule_type = self
            .required(obj, "type", "rule")
            .and_then(|t| self.string(t, "type"))?;
        let action_key = match rule_type.as_ref() {
            "endpoint" => "endpoint",
            "error" => "error",
            "tree" => "rules",
            _ => {
                return self.error(format!(
                    "unknown rule type `{rule_type}` (valid types: endpoint, error, tree)"
                ))
            }
        };
        let keys_ok = self.check_keys(
            obj,
            &["type", "conditions", "documentation", action_key],
            "rule",
        );

        let documentation = match obj.get("documentation") {
            Some(d) => self.string(d, "documentation").map(Some),
            None => Some(None),
        };

        let conditions = self.required(obj, "conditions", "rule").and_then(|c| {
            let items = self.array(c, "conditions")?;
            let mut conditions = Vec::with_capacity(items.len());
            let mut ok = true;
            for (idx, item) in items.iter().enumerate() {
                match self.nested(format!("while parsing condition {}", idx + 1), |p| {
                    p.condition(item)
                }) {
                    Some(c) => conditions.push(c),
                    None => ok = false,
                }
            }
            ok.then_some(conditions)
        });

        let action = self.required(obj, action_key, "rule").and_then(|a| {
            match rule_type.as_ref() {
                "endpoint" => self
                    .nested("while parsing endpoint".into(), |p| p.endpoint(a))
                    .map(RuleAction::Endpoint),
                "error" => self
                    .nested("while parsing error".into(), |p| p.expr(a))
                    .map(RuleAction::Error),
                _ => self
                    .nested("while parsing tree rule".into(), |p| p.rules(a))
                    .map(RuleAction::Tree),
            }
        });

        let rule = Rule {
            conditions: conditions?,
            action: action?,
            documentation: documentation?,
        };
        keys_ok.then_some(rule)
    }

    fn condition(&mut self, v: &JsonValue) -> Option<Condition> {
        let obj = self.object(v, "condition")?;
        let keys_ok = self.check_keys(obj, &["fn", "argv", "assign"], "condition");
        let assign = match obj.get("assign") {
            Some(a) => match self.string(a, "assign")? {
                name if name.is_empty() => return self.error("`assign` may not be empty"),
                name => Some(name),
            },
            None => None,
        };
        if !obj.contains_key("fn") {
            return self.error("missing required key `fn` in condition");
        }
        let expr = self.call(obj)?;
        keys_ok.then_some(Condition {
            expr: Ref::new(expr),
            assign,
        })
    }

    fn endpoint(&mut self, v: &JsonValue) -> Option<EndpointTemplate> {
        let obj = self.object(v, "endpoint")?;
        let keys_ok = self.check_keys(obj, &["url", "headers", "properties"], "endpoint");

        let url = self
            .required(obj, "url", "endpoint")
            .and_then(|u| self.nested("while parsing url".into(), |p| p.expr(u)));

        let headers = match obj.get("headers") {
            Some(h) => self.nested("while parsing headers".into(), |p| {
                let h = p.object(h, "headers")?;
                let mut headers = BTreeMap::new();
                let mut ok = true;
                for (name, values) in h.iter() {
                    let parsed = p.nested(format!("while parsing header `{name}`"), |p| {
                        let values = p.array(values, "header values")?;
                        let mut exprs = Vec::with_capacity(values.len());
                        let mut ok = true;
                        for value in values {
                            match p.expr(value) {
                                Some(e) => exprs.push(e),
                                None => ok = false,
                            }
                        }
                        ok.then_some(exprs)
                    });
                    match parsed {
                        Some(exprs) => {
                            headers.insert(Rc::from(name.as_str()), exprs);
                        }
                        None => ok = false,
                    }
                }
                ok.then_some(headers)
            }),
            None => Some(BTreeMap::new()),
        };

        let properties = match obj.get("properties") {
            Some(props) => self.nested("while parsing properties".into(), |p| {
                let props = p.object(props, "properties")?;
                let mut properties = BTreeMap::new();
                let mut ok = true;
                for (name, value) in props.iter() {
                    match p.nested(format!("while parsing property `{name}`"), |p| {
                        p.literal(value)
                    }) {
                        Some(lit) => {
                            properties.insert(Rc::from(name.as_str()), lit);
                        }
                        None => ok = false,
                    }
                }
                ok.then_some(properties)
            }),
            None => Some(BTreeMap::new()),
        };

        let endpoint = EndpointTemplate {
            url: url?,
            headers: headers?,
            properties: properties?,
        };
        keys_ok.then_some(endpoint)
    }

    fn expr(&mut self, v: &JsonValue) -> Option<Ref<Expr>> {
        if let JsonValue::Object(obj) = v {
            if obj.contains_key("ref") {
                self.check_keys(obj, &["ref"], "reference").then_some(())?;
                let name = self.string(&obj["ref"], "ref")?;
                if name.is_empty() {
                    return self.error("reference name may not be empty");
                }
                return Some(Ref::new(Expr::Ref(name)));
            }
            if obj.contains_key("fn") {
                self.check_keys(obj, &["fn", "argv"], "function call")
                    .then_some(())?;
                return self.call(obj).map(Ref::new);
            }
        }
        self.literal(v).map(|l| Ref::new(Expr::Literal(l)))
    }

    fn call(&mut self, obj: &Object) -> Option<Expr> {
        let name = self.string(&obj["fn"], "fn")?;
        let argv = self
            .required(obj, "argv", "function call")
            .and_then(|a| self.array(a, "argv"))?;

        let mut args = Vec::with_capacity(argv.len());
        let mut ok = true;
        for (idx, arg) in argv.iter().enumerate() {
            match self.nested(format!("while parsing argument {}", idx + 1), |p| {
                p.expr(arg)
            }) {
                Some(e) => args.push(e),
                None => ok = false,
            }
        }
        if !ok {
            return None;
        }

        if name.as_ref() == "getAttr" {
            return self.get_attr(args);
        }

        let function = match Builtin::lookup(&name) {
            Some(builtin) => Function::Builtin(builtin),
            None => Function::Extension(name.clone()),
        };
        Some(Expr::Call(FnCall {
            name,
            function,
            args,
        }))
    }

    fn get_attr(&mut self, mut args: Vec<Ref<Expr>>) -> Option<Expr> {
        if args.len() != 2 {
            return self.error(format!(
                "`getAttr` expects 2 arguments but found {}",
                args.len()
            ));
        }
        let raw: Rc<str> = match args[1].as_ref() {
            Expr::Literal(Literal::String(t)) => match t.as_static() {
                Some(s) => s.into(),
                None => return self.error("the path argument of `getAttr` may not contain placeholders"),
            },
            other => {
                return self.error(format!(
                    "the path argument of `getAttr` must be a string literal but found {other}"
                ))
            }
        };
        let path = match parse_path(&raw) {
            Ok(path) => path,
            Err(e) => return self.error(e.to_string()),
        };
        args.truncate(1);
        let target = args.pop()?;
        Some(Expr::GetAttr { target, path, raw })
    }

    fn literal(&mut self, v: &JsonValue) -> Option<Literal> {
        match v {
            JsonValue::String(s) => self.template(s).map(Literal::String),
            JsonValue::Bool(b) => Some(Literal::Bool(*b)),
            JsonValue::Number(n) => match n.as_i64() {
                Some(n) => Some(Literal::Integer(n)),
                None => self.error(format!("only integers are supported but found {n}")),
            },
            JsonValue::Null => self.error("null is not a valid literal"),
            JsonValue::Array(items) => {
                let mut literals = Vec::with_capacity(items.len());
                let mut ok = true;
                for (idx, item) in items.iter().enumerate() {
                    match self.nested(format!("while parsing element {}", idx + 1), |p| {
                        p.literal(item)
                    }) {
                        Some(l) => literals.push(l),
                        None => ok = false,
                    }
                }
                ok.then_some(Literal::Array(literals))
            }
            JsonValue::Object(obj) => {
                let mut fields = BTreeMap::new();
                let mut ok = true;
                for (key, item) in obj.iter() {
                    match self.nested(format!("while parsing field `{key}`"), |p| {
                        p.literal(item)
                    }) {
                        Some(l) => {
                            fields.insert(Rc::from(key.as_str()), l);
                        }
                        None => ok = false,
                    }
                }
                ok.then_some(Literal::Record(fields))
            }
        }
    }

    fn template(&mut self, s: &str) -> Option<Template> {
        match parse_template(s) {
            Ok(t) => Some(t),
            Err(e) => self.error(format!("{e} in template `{s}`")),
        }
    }
}

fn unescape(s: &str) -> Rc<str> {
    s.replace("{{", "{").replace("}}", "}").as_str().into()
}

/// Shortform placeholder: `name` or `name#path`.
fn placeholder(raw: &str) -> Result<Ref<Expr>> {
    let raw = raw.trim();
    if raw.is_empty() {
        bail!("empty placeholder `{{}}`");
    }
    Ok(Ref::new(match raw.split_once('#') {
        Some((name, path)) => {
            if name.is_empty() {
                bail!("missing reference before `#` in placeholder `{{{raw}}}`");
            }
            Expr::GetAttr {
                target: Ref::new(Expr::Ref(name.into())),
                path: parse_path(path)?,
                raw: path.into(),
            }
        }
        None => Expr::Ref(raw.into()),
    }))
}

/// Split a string literal into static text and `{...}` placeholders.
/// `{{` and `}}` escape literal braces.
pub fn parse_template(s: &str) -> Result<Template> {
    let bytes = s.as_bytes();
    let mut parts = vec![];
    let mut depth = 0usize;
    let mut start = 0;
    let mut end = 0;
    let mut i = 0;
    while i < bytes.len() {
        if depth == 0 && (bytes[i..].starts_with(b"{{") || bytes[i..].starts_with(b"}}")) {
            i += 2;
            continue;
        }
        match bytes[i] {
            b'{' => {
                if depth == 0 {
                    if end != i {
                        parts.push(TemplatePart::Literal(unescape(&s[end..i])));
                    }
                    start = i + 1;
                }
                depth += 1;
            }
            b'}' => {
                if depth == 0 {
                    bail!("unmatched `}}`");
                }
                depth -= 1;
                if depth == 0 {
                    let raw = &s[start..i];
                    parts.push(TemplatePart::Dynamic {
                        raw: raw.into(),
                        expr: placeholder(raw)?,
                    });
                    end = i + 1;
                }
            }
            _ => (),
        }
        i += 1;
    }
    if depth != 0 {
        bail!("unmatched `{{`");
    }
    if end < s.len() {
        parts.push(TemplatePart::Literal(unescape(&s[end..])));
    }
    Ok(Template {
        raw: s.into(),
        parts,
    })
}

impl RuleSet {
    /// Build a rule set from an already decoded document, collecting every structural error.
    pub fn from_document(doc: &JsonValue) -> Result<RuleSet, Vec<ParseError>> {
        let mut parser = Parser::new();
        match parser.ruleset(doc) {
            Some(ruleset) if parser.errors.is_empty() => {
                info!(
                    "loaded rule set version {} with {} parameter(s) and {} rule(s)",
                    ruleset.version,
                    ruleset.parameters.len(),
                    ruleset.rules.len()
                );
                Ok(ruleset)
            }
            _ => Err(parser.errors),
        }
    }

    fn from_source(source: &Source, doc: &JsonValue) -> Result<RuleSet> {
        match Self::from_document(doc) {
            Ok(ruleset) => Ok(ruleset),
            Err(errors) => {
                let mut msg = format!(
                    "{}: rule set has {} error(s)",
                    source.file(),
                    errors.len()
                );
                for e in &errors {
                    msg.push_str("\n  ");
                    msg.push_str(&e.to_string());
                }
                bail!(msg)
            }
        }
    }

    fn from_json_source(source: Source) -> Result<RuleSet> {
        let doc: JsonValue = match serde_json::from_str(source.contents()) {
            Ok(doc) => doc,
            Err(e) => bail!(source.message(
                e.line() as u32,
                e.column() as u32,
                "error",
                &e.to_string()
            )),
        };
        Self::from_source(&source, &doc)
    }

    pub fn from_json_str(json: &str) -> Result<RuleSet> {
        Self::from_json_source(Source::from_contents("<string>".into(), json.to_string())?)
    }

    pub fn from_json_file<P: AsRef<std::path::Path>>(path: P) -> Result<RuleSet> {
        Self::from_json_source(Source::from_file(path)?)
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(yaml: &str) -> Result<RuleSet> {
        let source = Source::from_contents("<string>".into(), yaml.to_string())?;
        let doc: JsonValue = match serde_yaml::from_str(yaml) {
            Ok(doc) => doc,
            Err(e) => match e.location() {
                Some(loc) => bail!(source.message(
                    loc.line() as u32,
                    loc.column() as u32,
                    "error",
                    &e.to_string()
                )),
                None => bail!("{}: {e}", source.file()),
            },
        };
        Self::from_source(&source, &doc)
    }
}
