// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::ruleset;
use crate::builtins::aws::partition::PartitionTable;
use crate::builtins::{Extension, Extensions};
use crate::engine::{Engine, EngineOptions};
use crate::interpreter::error::ResolveError;
use crate::interpreter::Interpreter;
use crate::types::Type;
use crate::value::Value;

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use serde_json::json;

fn engine(doc: serde_json::Value) -> Engine {
    let mut engine = Engine::new(ruleset(doc));
    if let Err(errors) = engine.prepare() {
        panic!("type errors: {errors:?}");
    }
    engine
}

fn params(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn conditions_short_circuit_and_bind() -> Result<()> {
    let engine = engine(json!({
        "version": "1.0",
        "parameters": {
            "Region": { "type": "string", "required": true },
            "Endpoint": { "type": "string" }
        },
        "rules": [
            {
                "type": "endpoint",
                "conditions": [
                    { "fn": "isSet", "argv": [{ "ref": "Endpoint" }] },
                    { "fn": "parseURL", "argv": [{ "ref": "Endpoint" }], "assign": "url" }
                ],
                "endpoint": {
                    "url": "{url#scheme}://{url#authority}{url#normalizedPath}{Region}",
                    "headers": { "x-region": ["{Region}", "static"] }
                }
            },
            {
                "type": "endpoint",
                "conditions": [],
                "endpoint": {
                    "url": "https://{Region}.example.com",
                    "properties": {
                        "authSchemes": [{ "name": "sigv4", "signingRegion": "{Region}" }]
                    }
                }
            }
        ]
    }));

    let ep = engine.resolve(&params(&[
        ("Region", Value::from("us-east-1")),
        ("Endpoint", Value::from("https://example.com:8443/a")),
    ]))?;
    assert_eq!(ep.url, "https://example.com:8443/a/us-east-1");
    assert_eq!(ep.headers["x-region"], vec!["us-east-1", "static"]);

    // parseURL yields unset for a query string, so the first rule does not match.
    let ep = engine.resolve(&params(&[
        ("Region", Value::from("us-east-1")),
        ("Endpoint", Value::from("https://example.com/?q=1")),
    ]))?;
    assert_eq!(ep.url, "https://us-east-1.example.com");
    assert_eq!(
        ep.auth_schemes()[0]["signingRegion"],
        Value::from("us-east-1")
    );
    Ok(())
}

#[test]
fn tree_scope_is_inherited_and_trees_are_terminal() -> Result<()> {
    let engine = engine(json!({
        "version": "1.0",
        "parameters": { "Region": { "type": "string", "required": true } },
        "rules": [
            {
                "type": "tree",
                "conditions": [
                    { "fn": "aws.partition", "argv": [{ "ref": "Region" }], "assign": "p" }
                ],
                "rules": [{
                    "type": "endpoint",
                    "conditions": [
                        { "fn": "stringEquals", "argv": [{ "ref": "Region" }, "us-west-2"] }
                    ],
                    "endpoint": { "url": "https://svc.{Region}.{p#dnsSuffix}" }
                }]
            },
            { "type": "endpoint", "conditions": [], "endpoint": { "url": "https://unreached" } }
        ]
    }));

    let ep = engine.resolve(&params(&[("Region", Value::from("us-west-2"))]))?;
    assert_eq!(ep.url, "https://svc.us-west-2.amazonaws.com");

    match engine.resolve(&params(&[("Region", Value::from("eu-west-1"))])) {
        Err(ResolveError::NoMatch { context }) => {
            assert!(context.contains("tree rule at rule 1"), "{context}")
        }
        r => bail!("unexpected result {r:?}"),
    }
    Ok(())
}

#[test]
fn parameter_binding() -> Result<()> {
    let engine = engine(json!({
        "version": "1.0",
        "parameters": {
            "Region": { "type": "string", "required": true },
            "UseFIPS": { "type": "boolean", "required": true, "default": false },
            "Old": { "type": "string", "deprecated": { "message": "use Region", "since": "1.1" } }
        },
        "rules": [
            {
                "type": "endpoint",
                "conditions": [{ "fn": "booleanEquals", "argv": [{ "ref": "UseFIPS" }, true] }],
                "endpoint": { "url": "https://fips.{Region}" }
            },
            {
                "type": "error",
                "conditions": [],
                "error": "FIPS is required in {Region}"
            }
        ]
    }));

    assert_eq!(
        engine.resolve(&params(&[])),
        Err(ResolveError::MissingParameter("Region".into()))
    );

    match engine.resolve(&params(&[("Region", Value::from(true))])) {
        Err(ResolveError::InvalidParameter { name, expected, .. }) => {
            assert_eq!(name.as_ref(), "Region");
            assert_eq!(expected.as_ref(), "string");
        }
        r => bail!("unexpected result {r:?}"),
    }

    // Defaults apply and unknown parameters are ignored.
    let r = engine.resolve(&params(&[
        ("Region", Value::from("us-east-1")),
        ("Unknown", Value::from(1)),
        ("Old", Value::from("x")),
    ]));
    assert_eq!(
        r,
        Err(ResolveError::RuleError {
            message: "FIPS is required in us-east-1".into()
        })
    );

    let ep = engine.resolve(&params(&[
        ("Region", Value::from("us-east-1")),
        ("UseFIPS", Value::from(true)),
    ]))?;
    assert_eq!(ep.url, "https://fips.us-east-1");
    Ok(())
}

#[test]
fn getattr_and_negative_indexes() -> Result<()> {
    let engine = engine(json!({
        "version": "1.0",
        "parameters": { "Arn": { "type": "string", "required": true } },
        "rules": [{
            "type": "endpoint",
            "conditions": [
                { "fn": "aws.parseArn", "argv": [{ "ref": "Arn" }], "assign": "arn" },
                { "fn": "getAttr", "argv": [{ "ref": "arn" }, "resourceId[-1]"], "assign": "last" }
            ],
            "endpoint": { "url": "https://{last}.{arn#region}.example.com" }
        }]
    }));
    let ep = engine.resolve(&params(&[(
        "Arn",
        Value::from("arn:aws:s3-outposts:us-west-2:123456789012:outpost/op-01/bucket/b1"),
    )]))?;
    assert_eq!(ep.url, "https://b1.us-west-2.example.com");

    // Unparsable ARNs are unset, which exhausts the rule set.
    let r = engine.resolve(&params(&[("Arn", Value::from("not-an-arn"))]));
    assert!(matches!(r, Err(ResolveError::NoMatch { .. })), "{r:?}");
    Ok(())
}

#[test]
fn extensions_are_called() -> Result<()> {
    let mut engine = Engine::new(ruleset(json!({
        "version": "1.0",
        "parameters": { "Tenant": { "type": "string", "required": true } },
        "rules": [{
            "type": "endpoint",
            "conditions": [
                { "fn": "acme.shard", "argv": [{ "ref": "Tenant" }], "assign": "shard" }
            ],
            "endpoint": { "url": "https://{shard}.acme.example" }
        }]
    })));
    engine.add_extension(
        "acme.shard",
        Extension::new(vec![Type::String], Type::String.optional(), |args| {
            let tenant = args[0].as_string()?;
            Ok(match tenant.len() % 2 {
                0 => Value::from(format!("even-{tenant}")),
                _ => Value::Empty,
            })
        }),
    )?;
    assert!(engine.add_extension(
        "isSet",
        Extension::new(vec![Type::Any], Type::Bool, |_| Ok(Value::Bool(true)))
    )
    .is_err());

    assert_eq!(
        engine.resolve(&params(&[("Tenant", Value::from("ab"))])),
        Err(ResolveError::NotPrepared)
    );
    if let Err(errors) = engine.prepare() {
        bail!("{errors:?}");
    }

    let ep = engine.resolve(&params(&[("Tenant", Value::from("ab"))]))?;
    assert_eq!(ep.url, "https://even-ab.acme.example");
    assert!(engine
        .resolve(&params(&[("Tenant", Value::from("abc"))]))
        .is_err());
    Ok(())
}

#[test]
fn recursion_limit_guards_evaluation() {
    let mut rules = json!([{ "type": "endpoint", "conditions": [], "endpoint": { "url": "https://deep" } }]);
    for _ in 0..3 {
        rules = json!([{ "type": "tree", "conditions": [], "rules": rules }]);
    }
    let rs = ruleset(json!({ "version": "1.0", "parameters": {}, "rules": rules }));
    let partitions = PartitionTable::default();
    let extensions = Extensions::new();

    let shallow = EngineOptions {
        max_tree_depth: 2,
        ..EngineOptions::default()
    };
    let r = Interpreter::new(&rs, &partitions, &extensions, &shallow).resolve(&BTreeMap::new());
    assert_eq!(r, Err(ResolveError::RecursionLimit(2)));

    let r = Interpreter::new(&rs, &partitions, &extensions, &EngineOptions::default())
        .resolve(&BTreeMap::new());
    assert_eq!(r.map(|ep| ep.url), Ok("https://deep".to_string()));
}
