//! The `bigdoors` command tree used by the demo console and the integration
//! tests.
use std::sync::Arc;

use crate::argument::{completions, validators, ArgumentConfig, ValueType};
use crate::command::{Action, CommandConfig};
use crate::config::ParserConfig;
use crate::error::DefinitionError;
use crate::issuer::permissions;
use crate::registry::CommandRegistry;
use crate::result::ParseResult;

pub const DOORS: &[&str] = &["front", "back", "barn", "castle gate"];
pub const PLAYERS: &[&str] = &["pim", "alex", "alice", "bob"];
pub const DIRECTIONS: &[&str] = &["north", "east", "south", "west"];

fn door() -> ArgumentConfig {
    ArgumentConfig::positional("doorID")
        .summary("The door to operate on.")
        .required()
        .completions(completions::fixed(DOORS))
}

fn report<F>(describe: F) -> Action
where
    F: Fn(&ParseResult) -> String + Send + Sync + 'static,
{
    Arc::new(move |result: &ParseResult| {
        println!("{}", describe(result));
        Ok(())
    })
}

fn join(result: &ParseResult, name: &str) -> String {
    result
        .values(name)
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn bigdoors() -> CommandConfig {
    CommandConfig::group("bigdoors")
        .description("Manages animated doors.")
        .subcommand(
            CommandConfig::new("addowner")
                .description("Adds owners to a door.")
                .argument(door())
                .argument(
                    ArgumentConfig::flag("a")
                        .long("admin")
                        .summary("Grant admin rights."),
                )
                .argument(
                    ArgumentConfig::named("p")
                        .long("player")
                        .summary("A player to add.")
                        .repeatable()
                        .completions(completions::fixed(PLAYERS)),
                )
                .action(report(|result| {
                    format!(
                        "added [{}] to {} (admin: {})",
                        join(result, "p"),
                        join(result, "doorID"),
                        result.flag("a")
                    )
                })),
        )
        .subcommand(
            CommandConfig::new("removeowner")
                .description("Removes an owner from a door.")
                .argument(door())
                .argument(
                    ArgumentConfig::named("p")
                        .long("player")
                        .required()
                        .completions(completions::fixed(PLAYERS)),
                )
                .action(report(|result| {
                    format!("removed {} from {}", join(result, "p"), join(result, "doorID"))
                })),
        )
        .subcommand(
            CommandConfig::new("setopendir")
                .description("Sets the direction a door opens in.")
                .argument(door())
                .argument(
                    ArgumentConfig::positional("direction")
                        .required()
                        .validator(validators::one_of(DIRECTIONS))
                        .completions(completions::fixed(DIRECTIONS)),
                )
                .action(report(|result| {
                    format!("{} now opens {}", join(result, "doorID"), join(result, "direction"))
                })),
        )
        .subcommand(
            CommandConfig::new("toggle")
                .description("Opens or closes doors.")
                .argument(
                    ArgumentConfig::positional("doors")
                        .required()
                        .repeatable()
                        .completions(completions::fixed(DOORS)),
                )
                .argument(
                    ArgumentConfig::named("t")
                        .long("time")
                        .summary("Animation time in seconds.")
                        .value_type(ValueType::Decimal)
                        .validator(validators::range(0.5, 30.0))
                        .default_value(2.0),
                )
                .action(report(|result| {
                    format!(
                        "toggled {} in {}s",
                        join(result, "doors"),
                        result.decimal("t").unwrap_or_default()
                    )
                })),
        )
        .subcommand(
            CommandConfig::new("list")
                .description("Lists doors.")
                .argument(
                    ArgumentConfig::named("n")
                        .long("limit")
                        .value_type(ValueType::Integer)
                        .validator(validators::range(1.0, 100.0))
                        .default_value(10i64),
                )
                .argument(
                    ArgumentConfig::named("o")
                        .long("owner")
                        .completions(completions::fixed(PLAYERS)),
                )
                .action(report(|result| {
                    let limit = result.integer("n").unwrap_or_default() as usize;
                    let doors: Vec<&str> = DOORS.iter().take(limit).cloned().collect();
                    match result.text("o") {
                        Some(owner) => format!("doors of {}: {}", owner, doors.join(", ")),
                        None => format!("doors: {}", doors.join(", ")),
                    }
                })),
        )
        .subcommand(
            CommandConfig::group("admin")
                .description("Server maintenance.")
                .permission(permissions::console_only())
                .subcommand(
                    CommandConfig::new("reload")
                        .description("Reloads the door database.")
                        .argument(ArgumentConfig::flag("f").long("force"))
                        .action(report(|result| format!("reloaded (force: {})", result.flag("f")))),
                ),
        )
}

/// A registry holding the `bigdoors` tree.
pub fn registry(config: ParserConfig) -> Result<CommandRegistry, DefinitionError> {
    let mut registry = CommandRegistry::new(config)?;
    registry.register(bigdoors())?;
    Ok(registry)
}
