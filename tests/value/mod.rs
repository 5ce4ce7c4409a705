// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(test)]

use anyhow::Result;
use endpoint_rules::*;

#[test]
fn json_round_trip() -> Result<()> {
    let json = r#"{"a":[1,true,"s"],"b":{"c":null}}"#;
    let v = Value::from_json_str(json)?;
    assert_eq!(v["a"][0], Value::from(1));
    assert_eq!(v["a"][1], Value::from(true));
    assert_eq!(v["b"]["c"], Value::Empty);
    assert_eq!(v["missing"], Value::Empty);
    assert!(v["a"][1].as_bool()?);
    assert_eq!(v["a"][0].as_i64()?, 1);
    assert_eq!(v.as_record()?.len(), 2);
    assert_eq!(v["a"].as_array()?.len(), 3);
    assert!(v["a"].as_record().is_err());

    let again = Value::from_json_str(&v.to_json_str()?)?;
    assert_eq!(v, again);
    Ok(())
}

#[test]
fn floats_are_rejected() {
    let err = Value::from_json_str("1.5").unwrap_err();
    assert!(err.to_string().contains("1.5"), "{err}");
}

#[test]
fn endpoint_serialization() -> Result<()> {
    let mut endpoint = Endpoint::new("https://example.com");
    endpoint
        .headers
        .insert("x-amz-region".into(), vec!["us-east-1".into()]);
    let v = Value::from(endpoint);
    assert_eq!(
        serde_json::to_string(&v)?,
        r#"{"url":"https://example.com","headers":{"x-amz-region":["us-east-1"]}}"#
    );
    assert_eq!(
        Value::from_json_str(&v.to_json_str()?)?,
        Value::from_json_str(&serde_json::to_string(&v)?)?
    );
    Ok(())
}

#[test]
fn truthiness() {
    assert!(Value::from("").is_truthy());
    assert!(Value::from(0).is_truthy());
    assert!(!Value::from(false).is_truthy());
    assert!(!Value::Empty.is_truthy());
}

#[cfg(feature = "yaml")]
#[test]
fn yaml_values() -> Result<()> {
    let v = Value::from_yaml_str("region: us-east-1\nfips: true\n")?;
    assert_eq!(v["region"], Value::from("us-east-1"));
    assert_eq!(v["fips"], Value::from(true));
    Ok(())
}
