// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builtins::utils::{ensure_args_count, ensure_string};
use crate::builtins::{Builtin, BuiltinContext, BuiltinFcn};
use crate::types::Type;
use crate::value::Value;
use crate::Rc;

use std::collections::{BTreeMap, HashMap};

use ::url::{Host, Url};
use anyhow::Result;

pub fn register(m: &mut HashMap<&'static str, (Builtin, BuiltinFcn)>) {
    m.insert("parseURL", (Builtin::ParseUrl, parse_url));
}

pub fn url_type() -> Type {
    Type::record([
        ("scheme", Type::String),
        ("authority", Type::String),
        ("path", Type::String),
        ("normalizedPath", Type::String),
        ("isIp", Type::Bool),
    ])
}

fn parse_url(_ctx: &BuiltinContext, args: &[Value]) -> Result<Value> {
    let name = "parseURL";
    ensure_args_count(name, args, 1)?;
    let s = ensure_string(name, &args[0])?;
    Ok(match ParsedUrl::parse(&s) {
        Some(url) => url.into(),
        None => Value::Empty,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    pub scheme: String,
    pub authority: String,
    pub path: String,
    pub normalized_path: String,
    pub is_ip: bool,
}

impl ParsedUrl {
    /// Parse an http(s) URL. URLs with a query string are rejected.
    pub fn parse(s: &str) -> Option<ParsedUrl> {
        // Authority and path are taken verbatim so that "https://host" keeps an empty path.
        let (scheme, rest) = s.split_once("://")?;
        let scheme = scheme.to_ascii_lowercase();
        if !matches!(scheme.as_str(), "http" | "https") || rest.contains('?') {
            return None;
        }
        let rest = rest.split('#').next().unwrap_or_default();
        let (authority, path) = match rest.find('/') {
            Some(pos) => rest.split_at(pos),
            None => (rest, ""),
        };
        if authority.is_empty() {
            return None;
        }

        // Hosts the WHATWG parser rejects, such as `999.1.1.1`, are kept as names.
        let is_ip = match Url::parse(s).as_ref().map(Url::host) {
            Ok(Some(Host::Ipv6(_))) => true,
            Ok(Some(Host::Ipv4(_))) => is_dotted_quad(host_of(authority)),
            _ => false,
        };

        let mut normalized_path = String::with_capacity(path.len() + 2);
        if !path.starts_with('/') {
            normalized_path.push('/');
        }
        normalized_path.push_str(path);
        if !normalized_path.ends_with('/') {
            normalized_path.push('/');
        }

        Some(ParsedUrl {
            scheme,
            authority: authority.to_string(),
            path: path.to_string(),
            normalized_path,
            is_ip,
        })
    }
}

// Strip userinfo and port.
fn host_of(authority: &str) -> &str {
    let host = authority.rsplit('@').next().unwrap_or(authority);
    host.split(':').next().unwrap_or(host)
}

fn is_dotted_quad(host: &str) -> bool {
    let parts: Vec<&str> = host.split('.').collect();
    parts.len() == 4 && parts.iter().all(|p| p.parse::<u8>().is_ok())
}

impl From<ParsedUrl> for Value {
    fn from(url: ParsedUrl) -> Self {
        let mut fields: BTreeMap<Rc<str>, Value> = BTreeMap::new();
        fields.insert("scheme".into(), Value::from(url.scheme));
        fields.insert("authority".into(), Value::from(url.authority));
        fields.insert("path".into(), Value::from(url.path));
        fields.insert("normalizedPath".into(), Value::from(url.normalized_path));
        fields.insert("isIp".into(), Value::Bool(url.is_ip));
        Value::from(fields)
    }
}
