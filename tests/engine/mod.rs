// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{bail, Result};
use endpoint_rules::*;

use std::collections::BTreeMap;

const LOCALHOST: &str = r#"{
    "version": "1.0",
    "parameters": {
        "Region": { "type": "String", "required": true, "builtIn": "AWS::Region" }
    },
    "rules": [
        {
            "documentation": "local testing",
            "conditions": [
                { "fn": "stringEquals", "argv": [{ "ref": "Region" }, "local"] }
            ],
            "type": "endpoint",
            "endpoint": { "url": "http://localhost:8080" }
        },
        {
            "conditions": [],
            "type": "endpoint",
            "endpoint": { "url": "https://{Region}.example.com" }
        }
    ]
}"#;

const PARTITIONED: &str = r#"{
    "version": "1.3",
    "parameters": {
        "Region": { "type": "string", "required": true }
    },
    "rules": [{
        "conditions": [
            { "fn": "aws.partition", "argv": [{ "ref": "Region" }], "assign": "p" }
        ],
        "type": "endpoint",
        "endpoint": { "url": "https://svc.{Region}.{p#dnsSuffix}" }
    }]
}"#;

fn prepared(json: &str) -> Result<Engine> {
    let mut engine = Engine::from_json_str(json)?;
    if let Err(errors) = engine.prepare() {
        bail!("type errors: {errors:?}");
    }
    Ok(engine)
}

fn region(r: &str) -> BTreeMap<String, Value> {
    BTreeMap::from([("Region".to_string(), Value::from(r))])
}

fn table(dns_suffix: &str) -> Result<PartitionTable> {
    PartitionTable::from_json_str(&format!(
        r#"{{
            "version": "1.1",
            "partitions": [{{
                "id": "aws",
                "regionRegex": "^us\\-\\w+\\-\\d+$",
                "outputs": {{
                    "name": "aws",
                    "dnsSuffix": "{dns_suffix}",
                    "dualStackDnsSuffix": "dual.{dns_suffix}",
                    "supportsFIPS": true,
                    "supportsDualStack": true,
                    "implicitGlobalRegion": "us-east-1"
                }}
            }}]
        }}"#
    ))
}

#[test]
fn localhost() -> Result<()> {
    let engine = prepared(LOCALHOST)?;
    assert_eq!(engine.resolve(&region("local"))?.url, "http://localhost:8080");
    assert_eq!(
        engine.resolve(&region("us-east-2"))?.url,
        "https://us-east-2.example.com"
    );
    Ok(())
}

#[test]
fn idempotence() -> Result<()> {
    let engine = prepared(PARTITIONED)?;
    let params = region("eu-west-1");
    let first = engine.resolve(&params)?;
    let second = engine.resolve(&params)?;
    assert_eq!(first, second);
    assert_eq!(first.url, "https://svc.eu-west-1.amazonaws.com");
    Ok(())
}

#[test]
fn partition_swap() -> Result<()> {
    let engine = prepared(PARTITIONED)?;
    let before = engine.partitions();

    engine.set_partitions(table("swapped.example")?);
    assert_eq!(
        engine.resolve(&region("us-east-1"))?.url,
        "https://svc.us-east-1.swapped.example"
    );

    // A snapshot taken before the swap is unaffected.
    assert_eq!(
        before.lookup("us-east-1").map(|p| p["dnsSuffix"].clone()),
        Some(Value::from("amazonaws.com"))
    );

    // Clones start from the table current at the time of cloning.
    let clone = engine.clone();
    engine.set_partitions(PartitionTable::default());
    assert_eq!(
        clone.resolve(&region("us-east-1"))?.url,
        "https://svc.us-east-1.swapped.example"
    );
    assert_eq!(
        engine.resolve(&region("us-east-1"))?.url,
        "https://svc.us-east-1.amazonaws.com"
    );
    Ok(())
}

#[test]
fn type_errors_block_resolution() -> Result<()> {
    let mut engine = Engine::from_json_str(
        r#"{
            "version": "1.0",
            "parameters": { "Region": { "type": "string" } },
            "rules": [{
                "conditions": [],
                "type": "endpoint",
                "endpoint": { "url": "https://{Region}.example.com" }
            }]
        }"#,
    )?;
    let errors = match engine.prepare() {
        Ok(()) => bail!("expected type errors"),
        Err(errors) => errors,
    };
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("{Region}"), "{}", errors[0]);
    assert_eq!(engine.resolve(&region("x")), Err(ResolveError::NotPrepared));

    // The free function reports the same errors.
    assert_eq!(
        typecheck(engine.ruleset(), &EngineOptions::default()),
        Err(errors)
    );
    Ok(())
}

#[test]
fn structural_errors() {
    let err = Engine::from_json_str(
        r#"{
            "version": "2.0",
            "parameters": { "Region": { "type": "float" } },
            "rules": [{ "conditions": [], "type": "endpoint", "endpoint": { "uri": "x" } }]
        }"#,
    )
    .err()
    .map(|e| e.to_string())
    .unwrap_or_default();
    assert!(err.contains("has 4 error(s)"), "{err}");
    assert!(err.contains("unsupported rule set version `2.0`"), "{err}");
    assert!(err.contains("unknown parameter type `float`"), "{err}");
    assert!(
        err.contains("while parsing rule 1 -> while parsing endpoint: unexpected key `uri`"),
        "{err}"
    );
}

#[test]
fn syntax_errors_point_at_source() {
    let err = Engine::from_json_str("{\n  \"version\": \"1.0\",\n  \"rules\": [,]\n}")
        .err()
        .map(|e| e.to_string())
        .unwrap_or_default();
    assert!(err.contains("<string>:3:"), "{err}");
    assert!(err.contains("^"), "{err}");
}

#[test]
fn test_suites() -> Result<()> {
    let engine = prepared(LOCALHOST)?;
    let suite = EndpointTestSuite::from_json_str(
        r#"{
            "testCases": [
                {
                    "documentation": "local",
                    "params": { "Region": "local" },
                    "expect": { "endpoint": { "url": "http://localhost:8080" } }
                },
                {
                    "documentation": "missing region",
                    "params": {},
                    "expect": { "error": "Missing required parameter `Region`" }
                },
                {
                    "documentation": "wrong expectation",
                    "params": { "Region": "us-east-1" },
                    "expect": { "endpoint": { "url": "https://wrong.example.com" } }
                }
            ]
        }"#,
    )?;
    let failures = match suite.run(&engine) {
        Ok(()) => bail!("the third case should fail"),
        Err(failures) => failures,
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].index, 3);
    assert!(failures[0]
        .to_string()
        .starts_with("test case 3 (wrong expectation): expected endpoint"));
    Ok(())
}

#[test]
fn auth_scheme_validation() -> Result<()> {
    let json = r#"{
        "version": "1.0",
        "parameters": {},
        "rules": [{
            "conditions": [],
            "type": "tree",
            "rules": [{
                "conditions": [],
                "type": "endpoint",
                "endpoint": {
                    "url": "https://example.com",
                    "properties": {
                        "authSchemes": [{ "name": "sigv4", "signingName": "s3", "region": "x" }]
                    }
                }
            }]
        }]
    }"#;
    let mut engine = Engine::from_json_str(json)?;
    let diagnostics = engine.validate_auth_schemes();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
        diagnostics[0].to_string(),
        "error: rule 1 -> tree -> rule 1 -> endpoint -> auth scheme 1: Unexpected key: `region` \
         (valid keys: name, signingName, signingRegion, disableDoubleEncoding, disableNormalizePath)"
    );

    engine.set_options(EngineOptions {
        unknown_auth_property_severity: Severity::Warning,
        ..EngineOptions::default()
    });
    assert_eq!(engine.validate_auth_schemes()[0].severity, Severity::Warning);
    Ok(())
}

#[test]
fn partitions_from_file() -> Result<()> {
    let engine = prepared(PARTITIONED)?;
    let path = std::env::temp_dir().join("endpoint-rules-partitions.json");
    std::fs::write(&path, include_str!("../../src/builtins/aws/partitions.json"))?;
    engine.set_partitions_from_json_file(&path)?;
    assert_eq!(
        engine.resolve(&region("cn-north-1"))?.url,
        "https://svc.cn-north-1.amazonaws.com.cn"
    );
    assert!(engine
        .set_partitions_from_json_file("/nonexistent/partitions.json")
        .is_err());
    Ok(())
}

#[test]
fn record_parameters() -> Result<()> {
    let engine = prepared(LOCALHOST)?;
    let params = Value::from_json_str(r#"{ "Region": "local", "Unused": 1 }"#)?;
    assert_eq!(engine.resolve_value(&params)?.url, "http://localhost:8080");
    assert_eq!(
        engine.resolve_value(&Value::Empty),
        Err(ResolveError::MissingParameter("Region".into()))
    );
    assert!(matches!(
        engine.resolve_value(&Value::from("us-east-1")),
        Err(ResolveError::Internal(_))
    ));
    Ok(())
}
