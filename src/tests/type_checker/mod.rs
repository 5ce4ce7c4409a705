// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::ruleset;
use crate::builtins::{Extension, Extensions};
use crate::engine::EngineOptions;
use crate::type_checker::{typecheck, TypeChecker, TypeError};
use crate::types::Type;
use crate::value::Value;

use serde_json::json;

fn errors(doc: serde_json::Value) -> Vec<TypeError> {
    match typecheck(&ruleset(doc), &EngineOptions::default()) {
        Ok(()) => vec![],
        Err(errors) => errors,
    }
}

fn endpoint(url: &str) -> serde_json::Value {
    json!({ "url": url })
}

#[test]
fn isset_narrows_for_the_rest_of_the_rule() {
    let errs = errors(json!({
        "version": "1.0",
        "parameters": { "Bucket": { "type": "string" } },
        "rules": [
            {
                "type": "endpoint",
                "conditions": [
                    { "fn": "isSet", "argv": [{ "ref": "Bucket" }] },
                    { "fn": "stringEquals", "argv": [{ "ref": "Bucket" }, "b"] }
                ],
                "endpoint": endpoint("https://{Bucket}.example.com")
            },
            {
                "type": "endpoint",
                "conditions": [],
                "endpoint": endpoint("https://{Bucket}.example.com")
            }
        ]
    }));
    // Only the sibling rule, which never proved `Bucket`, is rejected.
    assert_eq!(errs.len(), 1, "{errs:?}");
    let msg = errs[0].to_string();
    assert!(msg.starts_with("rule 2 -> endpoint -> url"), "{msg}");
    assert!(msg.contains("Option<String>"), "{msg}");
    assert!(msg.contains("hint"), "{msg}");
}

#[test]
fn assign_binds_proven_type() {
    let errs = errors(json!({
        "version": "1.0",
        "parameters": { "Region": { "type": "string" } },
        "rules": [{
            "type": "tree",
            "conditions": [
                { "fn": "aws.partition", "argv": [{ "ref": "Region" }], "assign": "p" }
            ],
            "rules": [{
                "type": "endpoint",
                "conditions": [
                    { "fn": "booleanEquals", "argv": [{ "fn": "getAttr", "argv": [{ "ref": "p" }, "supportsFIPS"] }, true] }
                ],
                "endpoint": endpoint("https://fips.{p#dnsSuffix}")
            }]
        }]
    }));
    // `aws.partition` needs a String but `Region` is optional.
    assert_eq!(errs.len(), 1, "{errs:?}");
    assert_eq!(errs[0].path, vec!["rule 1", "condition 1"]);
    assert!(errs[0].message.contains("Unexpected type in argument 1 of `aws.partition`"));
}

#[test]
fn resource_id_index_is_optional() {
    let errs = errors(json!({
        "version": "1.0",
        "parameters": { "Arn": { "type": "string", "required": true, "default": "arn:aws:s3:::b" } },
        "rules": [{
            "type": "endpoint",
            "conditions": [
                { "fn": "aws.parseArn", "argv": [{ "ref": "Arn" }], "assign": "arn" }
            ],
            "endpoint": endpoint("https://{arn#resourceId[2]}.example.com")
        }]
    }));
    assert_eq!(errs.len(), 1, "{errs:?}");
    let msg = errs[0].to_string();
    assert!(msg.contains("{arn#resourceId[2]}"), "{msg}");
    assert!(msg.contains("Option<String>"), "{msg}");
}

#[test]
fn shadowing_and_undefined_references() {
    let errs = errors(json!({
        "version": "1.0",
        "parameters": { "Region": { "type": "string", "required": true, "default": "us-east-1" } },
        "rules": [{
            "type": "endpoint",
            "conditions": [
                { "fn": "aws.partition", "argv": [{ "ref": "Region" }], "assign": "Region" },
                { "fn": "isSet", "argv": [{ "ref": "Later" }] }
            ],
            "endpoint": endpoint("https://example.com")
        }]
    }));
    assert_eq!(errs.len(), 2, "{errs:?}");
    assert!(errs[0].message.contains("Invalid shadowing of `Region`"));
    assert!(errs[1].message.contains("Undefined reference `Later`"));
}

#[test]
fn unreachable_rule() {
    let errs = errors(json!({
        "version": "1.0",
        "parameters": {},
        "rules": [
            { "type": "error", "conditions": [], "error": "always" },
            { "type": "endpoint", "conditions": [], "endpoint": endpoint("https://never") }
        ]
    }));
    assert_eq!(errs.len(), 1);
    assert!(errs[0].message.contains("rule is unreachable"));
}

#[test]
fn arity_and_unknown_functions() {
    let errs = errors(json!({
        "version": "1.0",
        "parameters": {},
        "rules": [{
            "type": "endpoint",
            "conditions": [
                { "fn": "not", "argv": [true, false] },
                { "fn": "frobnicate", "argv": [] }
            ],
            "endpoint": endpoint("https://example.com")
        }]
    }));
    assert_eq!(errs.len(), 2, "{errs:?}");
    assert!(errs[0].message.contains("`not` expects 1 argument(s)"), "{}", errs[0]);
    assert_eq!(errs[1].message, "Unknown function `frobnicate`");
}

#[test]
fn tree_depth_limit() {
    let mut rules = json!([{ "type": "error", "conditions": [], "error": "deep" }]);
    for _ in 0..4 {
        rules = json!([{ "type": "tree", "conditions": [], "rules": rules }]);
    }
    let rs = ruleset(json!({ "version": "1.0", "parameters": {}, "rules": rules }));

    let options = EngineOptions {
        max_tree_depth: 3,
        ..EngineOptions::default()
    };
    let errs = typecheck(&rs, &options).unwrap_err();
    assert_eq!(errs.len(), 1);
    assert!(errs[0].message.contains("maximum depth of 3"));
    assert!(typecheck(&rs, &EngineOptions::default()).is_ok());
}

#[test]
fn extensions_are_typed() {
    let rs = ruleset(json!({
        "version": "1.0",
        "parameters": { "Region": { "type": "string", "required": true, "default": "us-east-1" } },
        "rules": [{
            "type": "endpoint",
            "conditions": [
                { "fn": "acme.shard", "argv": [{ "ref": "Region" }], "assign": "shard" }
            ],
            "endpoint": endpoint("https://{shard}.acme.example")
        }]
    }));

    let mut extensions = Extensions::new();
    let check = |extensions: &Extensions| {
        TypeChecker::new(&rs, extensions, &EngineOptions::default()).check()
    };
    assert_eq!(check(&extensions).len(), 1);

    extensions.insert(
        "acme.shard".to_string(),
        Extension::new(vec![Type::String], Type::String.optional(), |_| {
            Ok(Value::from("s1"))
        }),
    );
    assert!(check(&extensions).is_empty());

    extensions.insert(
        "acme.shard".to_string(),
        Extension::new(vec![Type::Bool], Type::String, |_| Ok(Value::from("s1"))),
    );
    let errs = check(&extensions);
    assert_eq!(errs.len(), 1);
    assert!(errs[0].message.contains("Expected Bool but found String"), "{}", errs[0]);
}

#[test]
fn coalesce_and_ite() {
    let errs = errors(json!({
        "version": "1.3",
        "parameters": {
            "A": { "type": "string" },
            "UseFIPS": { "type": "boolean", "required": true, "default": false }
        },
        "rules": [{
            "type": "endpoint",
            "conditions": [
                { "fn": "coalesce", "argv": [{ "ref": "A" }, "default"], "assign": "a" },
                { "fn": "ite", "argv": [{ "ref": "UseFIPS" }, "-fips", ""], "assign": "suffix" }
            ],
            "endpoint": endpoint("https://{a}{suffix}.example.com")
        }]
    }));
    assert!(errs.is_empty(), "{errs:?}");
}
