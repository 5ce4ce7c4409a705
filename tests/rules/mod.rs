// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::env;

use anyhow::{bail, Result};
use endpoint_rules::*;
use serde::{Deserialize, Serialize};
use test_generator::test_resources;

#[derive(Serialize, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct TestCase {
    note: String,
    ruleset: serde_json::Value,
    #[serde(default)]
    partitions: Option<serde_json::Value>,
    #[serde(default)]
    params: BTreeMap<String, Value>,
    #[serde(default)]
    want_result: Option<Endpoint>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    type_error: Option<String>,
    #[serde(default)]
    skip: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug)]
struct YamlTest {
    cases: Vec<TestCase>,
}

fn run_case(case: TestCase) -> Result<()> {
    let ruleset = match RuleSet::from_document(&case.ruleset) {
        Ok(ruleset) => ruleset,
        Err(errors) => match &case.error {
            Some(expected) => {
                let actual: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                if !actual.iter().any(|a| a.contains(expected)) {
                    bail!("parse errors {actual:?} do not contain `{expected}`");
                }
                return Ok(());
            }
            None => bail!("invalid rule set: {errors:?}"),
        },
    };

    let mut engine = Engine::new(ruleset);
    if let Some(partitions) = &case.partitions {
        engine.set_partitions(PartitionTable::from_json_str(&partitions.to_string())?);
    }

    match (engine.prepare(), &case.type_error) {
        (Ok(()), None) => (),
        (Err(errors), Some(expected)) => {
            let actual: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            if !actual.iter().any(|a| a.contains(expected)) {
                bail!("type errors {actual:?} do not contain `{expected}`");
            }
            return Ok(());
        }
        (Ok(()), Some(expected)) => bail!("type check succeeded; expected `{expected}`"),
        (Err(errors), None) => {
            for e in &errors {
                println!("{e}");
            }
            bail!("{} type error(s)", errors.len());
        }
    }

    match (engine.resolve(&case.params), &case.want_result, &case.error) {
        (Ok(actual), Some(expected), None) => {
            if actual != *expected {
                bail!(
                    "resolved\n{}\nexpected\n{}",
                    Value::from(actual),
                    Value::from(expected.clone())
                );
            }
        }
        (Err(actual), None, Some(expected)) => {
            let actual = actual.to_string();
            if !actual.contains(expected) {
                bail!("Error message\n`{actual}`\ndoes not contain `{expected}`");
            }
        }
        (Ok(actual), _, Some(expected)) => {
            bail!("resolved `{}`; expected error `{expected}`", actual.url)
        }
        (Err(actual), _, _) => bail!("{actual}"),
        _ => panic!("either want_result, error or type_error must be specified in test case."),
    }
    Ok(())
}

fn yaml_test_impl(file: &str) -> Result<()> {
    let yaml_str = std::fs::read_to_string(file)?;
    let test: YamlTest = serde_yaml::from_str(&yaml_str)?;

    println!("running {file}");

    for case in test.cases {
        print!("case {} ", case.note);
        if case.skip == Some(true) {
            println!("skipped");
            continue;
        }
        let note = case.note.clone();
        if let Err(e) = run_case(case) {
            bail!("case `{note}` failed: {e}");
        }
        println!("passed");
    }

    Ok(())
}

fn yaml_test(file: &str) -> Result<()> {
    match yaml_test_impl(file) {
        Ok(_) => Ok(()),
        Err(e) => {
            // If Err is returned, it doesn't always get printed by cargo test.
            // Therefore, panic with the error.
            panic!("{e}");
        }
    }
}

#[test]
#[ignore = "intended for running a single case file"]
fn one_yaml() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let Some(file) = env::args().find(|a| a.ends_with(".yaml")) else {
        bail!("missing <yaml-file>");
    };
    yaml_test(&file)
}

// Run every `*.yaml` case file and every `*.json` endpoint test suite under
// $ENDPOINT_RULES_DIR. A suite `x.tests.json` is run against the rule set `x.json`.
#[test]
#[ignore = "intended for running external rule sets"]
fn directory() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let Ok(dir) = env::var("ENDPOINT_RULES_DIR") else {
        bail!("ENDPOINT_RULES_DIR is not set");
    };

    let mut failures = 0;
    for entry in walkdir::WalkDir::new(&dir).sort_by_file_name() {
        let path = entry?.path().to_path_buf();
        let name = path.to_string_lossy().to_string();
        if name.ends_with(".yaml") {
            if let Err(e) = yaml_test_impl(&name) {
                println!("{name}: {e}");
                failures += 1;
            }
        } else if let Some(base) = name.strip_suffix(".tests.json") {
            let mut engine = Engine::from_json_file(format!("{base}.json"))?;
            if let Err(errors) = engine.prepare() {
                println!("{base}.json: {} type error(s)", errors.len());
                failures += 1;
                continue;
            }
            if let Err(errors) = EndpointTestSuite::from_json_file(&path)?.run(&engine) {
                for e in &errors {
                    println!("{name}: {e}");
                }
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{failures} file(s) failed");
    }
    Ok(())
}

#[test_resources("tests/rules/cases/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}
