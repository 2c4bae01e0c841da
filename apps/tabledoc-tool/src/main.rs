//! CLI tool for entity schema work without a running store.
//!
//! Provides commands for:
//! - Deriving table DDL from entity definitions
//! - Validating an existing table description against an entity
//! - Compiling method-name queries to statements

mod cli;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::Value;

use cli::{Cli, Commands};
use tabledoc_core::config::MapperConfig;
use tabledoc_core::mapping::{MappingContext, TypeDefinition, TypeInfo, TypeRegistry};
use tabledoc_core::query::{MethodQuery, QueryCompiler};
use tabledoc_core::schema::{create_table_ddl, validate_existing, TableSchema};
use tabledoc_core::types::ObjectValue;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => MapperConfig::from_json_file(path)?,
        None => MapperConfig::default(),
    };

    match cli.command {
        Commands::Ddl {
            definitions,
            entity,
        } => {
            let (context, names) = load(&definitions, config)?;
            for name in names {
                if entity.as_deref().is_some_and(|wanted| wanted != name) {
                    continue;
                }
                let info = context.registry().get(&name).context("definition vanished")?;
                if !info.is_entity() {
                    tracing::debug!("Skipping non-entity type '{}'", name);
                    continue;
                }
                let descriptor = context.entity_by_name(&name)?;
                println!("{};", create_table_ddl(&descriptor));
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate {
            definitions,
            entity,
            table,
        } => {
            let (context, _) = load(&definitions, config)?;
            let descriptor = context.entity_by_name(&entity)?;
            let json = std::fs::read_to_string(&table)
                .with_context(|| format!("reading {}", table.display()))?;
            let discovered = TableSchema::from_json(&json)?;

            let mismatches = validate_existing(&descriptor, &discovered);
            if mismatches.is_empty() {
                println!("Table '{}' matches entity '{}'", discovered.name, entity);
                return Ok(ExitCode::SUCCESS);
            }
            println!("Table '{}' does not match entity '{}':", discovered.name, entity);
            for mismatch in &mismatches {
                println!("  - {}", mismatch);
            }
            Ok(ExitCode::from(2))
        }
        Commands::Compile {
            definitions,
            entity,
            method,
            arguments,
        } => {
            let (context, _) = load(&definitions, config)?;
            let descriptor = context.entity_by_name(&entity)?;
            let arguments = arguments
                .iter()
                .map(|text| parse_argument(text))
                .collect::<Result<Vec<_>>>()?;

            let mut query = MethodQuery::parse(&method)?;
            query.restrict_ignore_case(&descriptor, context.registry());
            let derived = query.to_descriptor(&descriptor, context.registry(), arguments)?;
            let compiled = QueryCompiler::new(&context).compile(&descriptor, &derived)?;

            println!("{}", compiled.text);
            for (name, value) in &compiled.parameters {
                println!("  {} = {}", name, value);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Registers every definition of a JSON file in a fresh context.
///
/// # Returns
/// The context and the registered type names, in file order.
fn load(path: &Path, config: MapperConfig) -> Result<(MappingContext, Vec<String>)> {
    let json =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let definitions: Vec<TypeDefinition> = serde_json::from_str(&json)
        .with_context(|| format!("parsing definitions in {}", path.display()))?;

    let registry = Arc::new(TypeRegistry::new());
    let mut names = Vec::with_capacity(definitions.len());
    for definition in definitions {
        names.push(definition.name.clone());
        registry.register(TypeInfo::from_definition(definition))?;
    }
    tracing::info!("Loaded {} type definition(s) from {}", names.len(), path.display());
    Ok((MappingContext::new(registry, config), names))
}

/// Converts a JSON command-line argument into a query argument.
fn parse_argument(text: &str) -> Result<ObjectValue> {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        // Bare words are taken as strings
        Err(_) => Value::String(text.to_string()),
    };
    json_to_object(value)
}

fn json_to_object(value: Value) -> Result<ObjectValue> {
    Ok(match value {
        Value::Null => ObjectValue::Null,
        Value::Bool(b) => ObjectValue::Bool(b),
        Value::String(s) => ObjectValue::String(s),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(v), _) => match i32::try_from(v) {
                Ok(small) => ObjectValue::Int(small),
                Err(_) => ObjectValue::Long(v),
            },
            (None, Some(v)) => ObjectValue::Double(v),
            (None, None) => bail!("unsupported number {}", n),
        },
        Value::Array(items) => ObjectValue::List(
            items
                .into_iter()
                .map(json_to_object)
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Object(entries) => ObjectValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| Ok((ObjectValue::String(k), json_to_object(v)?)))
                .collect::<Result<Vec<_>>>()?,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DEFINITIONS: &str = r#"[
        {
            "name": "Person",
            "table": { "table_name": "people" },
            "properties": [
                { "name": "id", "type": "long", "id": true, "generated": true },
                { "name": "lastName", "type": "string" },
                { "name": "age", "type": "int" }
            ]
        }
    ]"#;

    fn definitions_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DEFINITIONS.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_and_derive_ddl() {
        let file = definitions_file();
        let (context, names) = load(file.path(), MapperConfig::default()).unwrap();
        assert_eq!(names, vec!["Person"]);

        let entity = context.entity_by_name("Person").unwrap();
        assert_eq!(
            create_table_ddl(&entity),
            "CREATE TABLE IF NOT EXISTS people (id LONG GENERATED ALWAYS AS IDENTITY (NO CYCLE), \
             kv_json_ JSON, PRIMARY KEY(SHARD(id)))"
        );
    }

    #[test]
    fn test_compile_method_query() {
        let file = definitions_file();
        let (context, _) = load(file.path(), MapperConfig::default()).unwrap();
        let entity = context.entity_by_name("Person").unwrap();

        let query = MethodQuery::parse("findByAgeGreaterThan").unwrap();
        let descriptor = query
            .to_descriptor(&entity, context.registry(), vec![parse_argument("30").unwrap()])
            .unwrap();
        let compiled = QueryCompiler::new(&context).compile(&entity, &descriptor).unwrap();
        assert_eq!(
            compiled.text,
            "DECLARE $p_age INTEGER; SELECT * FROM people t WHERE t.kv_json_.age > $p_age"
        );
    }

    #[test]
    fn test_parse_argument() {
        assert_eq!(parse_argument("Lee").unwrap(), ObjectValue::from("Lee"));
        assert_eq!(parse_argument("\"42\"").unwrap(), ObjectValue::from("42"));
        assert_eq!(parse_argument("42").unwrap(), ObjectValue::Int(42));
        assert_eq!(parse_argument("5000000000").unwrap(), ObjectValue::Long(5_000_000_000));
        assert_eq!(parse_argument("true").unwrap(), ObjectValue::Bool(true));
        assert!(matches!(
            parse_argument("[1, 2]").unwrap(),
            ObjectValue::List(items) if items.len() == 2
        ));
    }
}
