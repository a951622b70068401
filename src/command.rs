//! Command nodes. A command owns its subcommands; each subcommand records the
//! name of the parent it was built under.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::argument::{Argument, ArgumentConfig, HELP_NAME};
use crate::error::DefinitionError;
use crate::issuer::{Issuer, Permission};
use crate::result::ParseResult;
use crate::schema::ArgumentSchema;

/// What to run for a parsed command. The library never calls it on its own;
/// see [`ParseResult::dispatch`].
pub type Action = Arc<dyn Fn(&ParseResult) -> Result<(), failure::Error> + Send + Sync>;

/// A plain description of a command and its subtree.
#[derive(Clone)]
pub struct CommandConfig {
    pub name: String,
    pub description: Option<String>,
    /// A purely structural command which only groups subcommands.
    pub is_virtual: bool,
    pub arguments: Vec<ArgumentConfig>,
    pub subcommands: Vec<CommandConfig>,
    pub permission: Option<Permission>,
    pub action: Option<Action>,
    /// Adds the `-h`/`--help` argument.
    pub add_help: bool,
}

impl CommandConfig {
    pub fn new(name: &str) -> CommandConfig {
        CommandConfig {
            name: name.to_owned(),
            description: None,
            is_virtual: false,
            arguments: Vec::new(),
            subcommands: Vec::new(),
            permission: None,
            action: None,
            add_help: true,
        }
    }

    /// A grouping-only command.
    pub fn group(name: &str) -> CommandConfig {
        CommandConfig {
            is_virtual: true,
            ..CommandConfig::new(name)
        }
    }

    pub fn description(mut self, description: &str) -> CommandConfig {
        self.description = Some(description.to_owned());
        self
    }

    pub fn argument(mut self, argument: ArgumentConfig) -> CommandConfig {
        self.arguments.push(argument);
        self
    }

    pub fn subcommand(mut self, subcommand: CommandConfig) -> CommandConfig {
        self.subcommands.push(subcommand);
        self
    }

    pub fn permission(mut self, permission: Permission) -> CommandConfig {
        self.permission = Some(permission);
        self
    }

    pub fn action(mut self, action: Action) -> CommandConfig {
        self.action = Some(action);
        self
    }

    pub fn without_help(mut self) -> CommandConfig {
        self.add_help = false;
        self
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(|ch: char| ch.is_whitespace() || ch == '"')
}

pub struct Command {
    name: String,
    /// `parent child` for a subcommand.
    path: String,
    parent: Option<String>,
    description: Option<String>,
    is_virtual: bool,
    schema: ArgumentSchema,
    children: BTreeMap<String, Arc<Command>>,
    /// The command's own predicate followed by those of its ancestors.
    permissions: Vec<Permission>,
    action: Option<Action>,
    has_help: bool,
}

impl Command {
    /// Builds a root command and its whole subtree.
    pub fn new(config: CommandConfig) -> Result<Arc<Command>, DefinitionError> {
        Command::build(config, None)
    }

    fn build(config: CommandConfig, parent: Option<&Command>) -> Result<Arc<Command>, DefinitionError> {
        if !is_valid_name(&config.name) {
            return Err(DefinitionError::InvalidCommandName { name: config.name });
        }

        let path = match parent {
            Some(parent) => format!("{} {}", parent.path, config.name),
            None => config.name.clone(),
        };

        // A group's own tokens are subcommand names or help.
        if config.is_virtual {
            if let Some(arg) = config.arguments.first() {
                return Err(DefinitionError::InvalidArgument {
                    command: path,
                    argument: arg.short_name.clone(),
                    reason: "a virtual command cannot declare arguments".to_owned(),
                });
            }
        }

        let help = if config.add_help {
            Some(Argument::help())
        } else {
            None
        };
        let schema = ArgumentSchema::new(&path, config.arguments, help)?;

        let mut permissions: Vec<Permission> = config.permission.into_iter().collect();
        if let Some(parent) = parent {
            permissions.extend(parent.permissions.iter().cloned());
        }

        let mut command = Command {
            name: config.name,
            path,
            parent: parent.map(|parent| parent.name.clone()),
            description: config.description,
            is_virtual: config.is_virtual,
            schema,
            children: BTreeMap::new(),
            permissions,
            action: config.action,
            has_help: config.add_help,
        };

        for sub in config.subcommands {
            let child = Command::build(sub, Some(&command))?;
            if command.children.contains_key(child.name()) {
                return Err(DefinitionError::DuplicateCommand { name: child.path.clone() });
            }
            command.children.insert(child.name.clone(), child);
        }

        Ok(Arc::new(command))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The full path from the root, e.g. `bigdoors addowner`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The name of the command this one was built under.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    pub fn schema(&self) -> &ArgumentSchema {
        &self.schema
    }

    /// The `-h`/`--help` argument, unless the command was built without it.
    pub fn help(&self) -> Option<&Argument> {
        if self.has_help {
            self.schema.by_short_name(HELP_NAME)
        } else {
            None
        }
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn child(&self, name: &str) -> Option<&Arc<Command>> {
        self.children.get(name)
    }

    /// Subcommands ordered by name.
    pub fn children(&self) -> impl Iterator<Item = &Arc<Command>> {
        self.children.values()
    }

    /// Whether `issuer` may use this command. A subcommand is only
    /// permitted if its ancestors are.
    pub fn is_permitted(&self, issuer: &dyn Issuer) -> bool {
        self.permissions.iter().all(|permission| permission(issuer))
    }

    pub fn action(&self) -> Option<&Action> {
        self.action.as_ref()
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Command")
            .field("path", &self.path)
            .field("is_virtual", &self.is_virtual)
            .field("schema", &self.schema)
            .field("children", &self.children.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PartialEq for Command {
    fn eq(&self, other: &Command) -> bool {
        self.path == other.path
    }
}
