// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use endpoint_rules::{Engine, EndpointTestSuite, Severity, Value};

fn read_file(file: &str) -> Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("Failed to read {file}"))
}

fn load_engine(rules: &str, partitions: Option<String>) -> Result<Engine> {
    let contents = read_file(rules)?;
    let mut engine = if rules.ends_with(".json") {
        Engine::from_json_str(&contents)?
    } else if rules.ends_with(".yaml") {
        Engine::from_yaml_str(&contents)?
    } else {
        bail!("Unsupported rule set `{rules}`. Must be json or yaml.")
    };

    if let Some(file) = partitions {
        engine.set_partitions_from_json_file(&file)?;
    }

    if let Err(errors) = engine.prepare() {
        for e in &errors {
            eprintln!("{e}");
        }
        bail!("{rules} has {} type error(s)", errors.len());
    }
    Ok(engine)
}

fn rules_resolve(
    rules: String,
    partitions: Option<String>,
    params: Option<String>,
    param: Vec<String>,
) -> Result<()> {
    let engine = load_engine(&rules, partitions)?;

    // Parameters from a file, then individual name=value overrides.
    let mut values: BTreeMap<String, Value> = match params {
        Some(file) => {
            let contents = read_file(&file)?;
            if file.ends_with(".json") {
                serde_json::from_str(&contents)?
            } else if file.ends_with(".yaml") {
                serde_yaml::from_str(&contents)?
            } else {
                bail!("invalid parameters file {file}");
            }
        }
        None => BTreeMap::new(),
    };
    for p in param {
        let Some((name, value)) = p.split_once('=') else {
            bail!("invalid parameter `{p}`. Expected name=value");
        };
        let value = match value {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::from(value),
        };
        values.insert(name.to_string(), value);
    }

    let endpoint = match engine.resolve(&values) {
        Ok(endpoint) => endpoint,
        Err(e) => bail!("{e}"),
    };
    println!("{}", serde_json::to_string_pretty(&endpoint)?);
    Ok(())
}

fn rules_typecheck(rules: String) -> Result<()> {
    let contents = read_file(&rules)?;
    let engine = if rules.ends_with(".yaml") {
        Engine::from_yaml_str(&contents)?
    } else {
        Engine::from_json_str(&contents)?
    };

    let mut failed = false;
    if let Err(errors) = engine.typecheck() {
        for e in &errors {
            println!("{e}");
        }
        failed = true;
    }
    for d in engine.validate_auth_schemes() {
        println!("{d}");
        failed |= d.severity == Severity::Error;
    }

    if failed {
        bail!("{rules} is not valid");
    }
    println!("{rules} is valid");
    Ok(())
}

fn rules_test(rules: String, partitions: Option<String>, tests: String) -> Result<()> {
    let engine = load_engine(&rules, partitions)?;
    let contents = read_file(&tests)?;
    let suite = if tests.ends_with(".yaml") {
        EndpointTestSuite::from_yaml_str(&contents)?
    } else {
        EndpointTestSuite::from_json_str(&contents)?
    };

    match suite.run(&engine) {
        Ok(()) => {
            println!("{} test case(s) passed", suite.test_cases.len());
            Ok(())
        }
        Err(failures) => {
            for f in &failures {
                println!("{f}");
            }
            bail!(
                "{} of {} test case(s) failed",
                failures.len(),
                suite.test_cases.len()
            )
        }
    }
}

#[derive(Subcommand)]
enum RulesCommand {
    /// Resolve an endpoint.
    Resolve {
        /// Rule set. json or yaml.
        #[arg(long, short, value_name = "rules.json")]
        rules: String,

        /// Partition table replacing the bundled one.
        #[arg(long, value_name = "partitions.json")]
        partitions: Option<String>,

        /// Parameters file. json or yaml.
        #[arg(long, value_name = "params.json")]
        params: Option<String>,

        /// Individual parameters.
        #[arg(long, short, value_name = "name=value")]
        param: Vec<String>,
    },

    /// Type check a rule set and validate its auth schemes.
    Typecheck {
        /// Rule set. json or yaml.
        file: String,
    },

    /// Run an endpoint test suite against a rule set.
    Test {
        /// Rule set. json or yaml.
        #[arg(long, short, value_name = "rules.json")]
        rules: String,

        /// Partition table replacing the bundled one.
        #[arg(long, value_name = "partitions.json")]
        partitions: Option<String>,

        /// Test suite. json or yaml.
        tests: String,
    },
}

#[derive(clap::Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: RulesCommand,
}

fn main() -> Result<()> {
    env_logger::init();

    // Parse and dispatch command.
    let cli = Cli::parse();
    match cli.command {
        RulesCommand::Resolve {
            rules,
            partitions,
            params,
            param,
        } => rules_resolve(rules, partitions, params, param),
        RulesCommand::Typecheck { file } => rules_typecheck(file),
        RulesCommand::Test {
            rules,
            partitions,
            tests,
        } => rules_test(rules, partitions, tests),
    }
}
