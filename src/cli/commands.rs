//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

use crate::cli::output::{
    OutputFormat, format_count, format_created, format_deleted, format_message, format_records,
    format_status,
};
use crate::cli::parser::{Cli, Commands};
use crate::core::value::{Attributes, Value};
use crate::error::{CommandError, Error, Result};
use crate::facade::Finder;
use crate::persistence::{PersistenceCoordinator, SchemaSource, StoreConfig};
use crate::query::{Condition, Order, Query};

/// Executes the CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    if let Commands::Reset { yes: false } = cli.command {
        return Err(CommandError::ExecutionFailed(
            "Use --yes to confirm reset. This will delete all data.".to_string(),
        )
        .into());
    }

    let mut stack = open_stack(cli)?;

    match &cli.command {
        Commands::Status => cmd_status(&stack, format),
        Commands::Create { entity, attributes } => {
            cmd_create(&mut stack, entity, attributes, format)
        }
        Commands::Where {
            entity,
            condition,
            order,
            limit,
        } => {
            let query = Query::matching(parse_condition(condition)?)
                .maybe_order(order.as_deref().map(parse_order).transpose()?)
                .maybe_limit(*limit);
            cmd_fetch(&mut stack, entity, query, format)
        }
        Commands::All { entity, order } => {
            let query =
                Query::new().maybe_order(order.as_deref().map(parse_order).transpose()?);
            cmd_fetch(&mut stack, entity, query, format)
        }
        Commands::Count { entity, condition } => {
            let condition = condition.as_deref().map(parse_condition).transpose()?;
            cmd_count(&stack, entity, condition, format)
        }
        Commands::DeleteAll { entity } => cmd_delete_all(&mut stack, entity, format),
        Commands::Reset { .. } => cmd_reset(&mut stack, format),
    }
}

/// Opens the persistence stack described by the global options.
fn open_stack(cli: &Cli) -> Result<PersistenceCoordinator> {
    let schema = cli.schema.clone().ok_or_else(|| {
        Error::config("no schema definition; pass --schema or set RECORDKIT_SCHEMA")
    })?;

    let mut config = StoreConfig::new(cli.app_name.clone(), SchemaSource::File(schema));
    if let Some(dir) = &cli.store_dir {
        config = config.with_directory(dir);
    }

    let mut stack = PersistenceCoordinator::open(config)?;
    if cli.in_memory {
        stack.use_in_memory_store()?;
    }
    Ok(stack)
}

/// Parses a condition argument: a JSON object becomes an equality
/// mapping, anything else is passed through as a raw expression.
fn parse_condition(input: &str) -> Result<Condition> {
    match serde_json::from_str::<serde_json::Value>(input) {
        Ok(json @ serde_json::Value::Object(_)) => Ok(Condition::try_from(json)?),
        _ => Ok(Condition::from(input)),
    }
}

/// Parses an order argument: a JSON array or object is translated
/// structurally, anything else is an order string.
fn parse_order(input: &str) -> Result<Order> {
    match serde_json::from_str::<serde_json::Value>(input) {
        Ok(json @ (serde_json::Value::Array(_) | serde_json::Value::Object(_))) => {
            Ok(Order::try_from(json)?)
        }
        _ => Ok(Order::from(input)),
    }
}

/// Parses a JSON object of attributes.
fn parse_attributes(input: &str) -> Result<Attributes> {
    let json: serde_json::Value = serde_json::from_str(input)
        .map_err(|e| CommandError::InvalidArgument(format!("attributes: {e}")))?;
    let serde_json::Value::Object(map) = json else {
        return Err(CommandError::InvalidArgument(
            "attributes must be a JSON object".to_string(),
        )
        .into());
    };

    map.iter()
        .map(|(key, value)| {
            Value::from_json(value)
                .map(|value| (key.clone(), value))
                .ok_or_else(|| {
                    Error::from(CommandError::InvalidArgument(format!(
                        "attribute '{key}' is not a scalar"
                    )))
                })
        })
        .collect()
}

fn cmd_status(stack: &PersistenceCoordinator, format: OutputFormat) -> Result<String> {
    let stats = stack.stats()?;
    Ok(format_status(&stats, format))
}

fn cmd_create(
    stack: &mut PersistenceCoordinator,
    entity: &str,
    attributes: &str,
    format: OutputFormat,
) -> Result<String> {
    let attributes = parse_attributes(attributes)?;
    let finder = Finder::new(entity);
    let record = finder
        .create_with(Some(&attributes), stack.context_mut())?
        .ok_or_else(|| CommandError::ExecutionFailed("no record created".to_string()))?;

    stack.try_save_context()?;
    Ok(format_created(record.get(stack.context())?, format))
}

fn cmd_fetch(
    stack: &mut PersistenceCoordinator,
    entity: &str,
    query: Query,
    format: OutputFormat,
) -> Result<String> {
    let finder = Finder::new(entity);
    let handles = finder.fetch(stack.context_mut(), query)?;

    let ctx = stack.context();
    let records = handles
        .iter()
        .map(|handle| handle.get(ctx))
        .collect::<Result<Vec<_>>>()?;
    let description = stack.schema().entity(entity)?;
    Ok(format_records(description, &records, format))
}

fn cmd_count(
    stack: &PersistenceCoordinator,
    entity: &str,
    condition: Option<Condition>,
    format: OutputFormat,
) -> Result<String> {
    let count = Finder::new(entity).count(stack.context(), condition)?;
    Ok(format_count(entity, count, format))
}

fn cmd_delete_all(
    stack: &mut PersistenceCoordinator,
    entity: &str,
    format: OutputFormat,
) -> Result<String> {
    let deleted = Finder::new(entity).delete_all(stack.context_mut())?;
    stack.try_save_context()?;
    Ok(format_deleted(entity, deleted, format))
}

fn cmd_reset(stack: &mut PersistenceCoordinator, format: OutputFormat) -> Result<String> {
    stack.delete_store_and_reset()?;
    Ok(format_message("Store reset successfully.", format))
}
