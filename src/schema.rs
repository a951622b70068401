//! The per-command set of argument declarations.
use std::collections::HashMap;

use crate::argument::{Argument, ArgumentConfig};
use crate::error::DefinitionError;

/// The arguments of one command in a stable order: positional before named,
/// required before optional, valueless before valued and singular before
/// repeatable. Help and usage renderers list arguments in this order.
#[derive(Debug, Clone, Default)]
pub struct ArgumentSchema {
    arguments: Vec<Argument>,
    /// Indices into `arguments`.
    required: Vec<usize>,
    positional: Vec<usize>,
    by_short: HashMap<String, usize>,
    by_long: HashMap<String, usize>,
}

fn sort_key(arg: &Argument) -> (bool, bool, bool, bool) {
    (
        arg.is_named(),
        !arg.is_required(),
        !arg.is_valueless(),
        arg.is_repeatable(),
    )
}

impl ArgumentSchema {
    /// Builds the schema of `command`. `help` is appended to the declared
    /// arguments unless it is `None`.
    pub fn new(
        command: &str,
        configs: Vec<ArgumentConfig>,
        help: Option<Argument>,
    ) -> Result<ArgumentSchema, DefinitionError> {
        let mut arguments = Vec::with_capacity(configs.len() + 1);
        for config in configs {
            arguments.push(Argument::new(command, config)?);
        }
        arguments.extend(help);

        // A stable sort keeps the declaration order within each class.
        arguments.sort_by_key(sort_key);

        let mut schema = ArgumentSchema::default();
        for (index, mut arg) in arguments.into_iter().enumerate() {
            let names = Some(arg.name()).into_iter().chain(arg.long_name());
            for name in names {
                if schema.by_short.contains_key(name) || schema.by_long.contains_key(name) {
                    return Err(DefinitionError::DuplicateArgument {
                        command: command.to_owned(),
                        argument: name.to_owned(),
                    });
                }
            }
            if arg.long_name() == Some(arg.name()) {
                return Err(DefinitionError::DuplicateArgument {
                    command: command.to_owned(),
                    argument: arg.name().to_owned(),
                });
            }

            if arg.is_positional() {
                if let Some(&last) = schema.positional.last() {
                    if schema.arguments[last].is_repeatable() {
                        return Err(DefinitionError::InvalidArgument {
                            command: command.to_owned(),
                            argument: schema.arguments[last].name().to_owned(),
                            reason: "a repeatable positional argument must be the last one"
                                .to_owned(),
                        });
                    }
                }

                arg.set_position(schema.positional.len());
                schema.positional.push(index);
            }

            if arg.is_required() {
                schema.required.push(index);
            }

            schema.by_short.insert(arg.name().to_owned(), index);
            if let Some(long) = arg.long_name() {
                schema.by_long.insert(long.to_owned(), index);
            }

            schema.arguments.push(arg);
        }

        Ok(schema)
    }

    /// All arguments in rendering order.
    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    pub fn required(&self) -> impl Iterator<Item = &Argument> {
        self.required.iter().map(move |&i| &self.arguments[i])
    }

    pub fn positional(&self) -> impl Iterator<Item = &Argument> {
        self.positional.iter().map(move |&i| &self.arguments[i])
    }

    pub fn named(&self) -> impl Iterator<Item = &Argument> {
        self.arguments.iter().filter(|arg| arg.is_named())
    }

    /// The positional argument consuming the `slot`-th positional token. A
    /// trailing repeatable positional consumes every slot past its own.
    pub fn positional_at(&self, slot: usize) -> Option<&Argument> {
        match self.positional.get(slot) {
            Some(&i) => Some(&self.arguments[i]),
            None => self
                .positional
                .last()
                .map(|&i| &self.arguments[i])
                .filter(|arg| arg.is_repeatable()),
        }
    }

    pub fn by_short_name(&self, name: &str) -> Option<&Argument> {
        self.by_short.get(name).map(|&i| &self.arguments[i])
    }

    pub fn by_long_name(&self, name: &str) -> Option<&Argument> {
        self.by_long.get(name).map(|&i| &self.arguments[i])
    }

    /// Looks up `name` among short names first, then long names.
    pub fn lookup(&self, name: &str) -> Option<&Argument> {
        self.by_short_name(name).or_else(|| self.by_long_name(name))
    }

    /// Looks up a flag token's name. `long` prefers the long-name namespace.
    pub fn lookup_flag(&self, name: &str, long: bool) -> Option<&Argument> {
        if long {
            self.by_long_name(name).or_else(|| self.by_short_name(name))
        } else {
            self.lookup(name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(schema: &ArgumentSchema) -> Vec<&str> {
        schema.arguments().iter().map(|arg| arg.name()).collect()
    }

    #[test]
    fn ordering() {
        let schema = ArgumentSchema::new(
            "test",
            vec![
                ArgumentConfig::named("p").long("player").repeatable(),
                ArgumentConfig::named("max"),
                ArgumentConfig::flag("a").long("admin"),
                ArgumentConfig::positional("extra"),
                ArgumentConfig::named("name").required(),
                ArgumentConfig::positional("doorID").required(),
            ],
            Some(Argument::help()),
        )
        .unwrap();

        assert_eq!(names(&schema), vec!["doorID", "extra", "name", "a", "h", "max", "p"]);
        assert_eq!(
            schema.required().map(|arg| arg.name()).collect::<Vec<_>>(),
            vec!["doorID", "name"]
        );
        assert_eq!(
            schema.positional().map(|arg| arg.name()).collect::<Vec<_>>(),
            vec!["doorID", "extra"]
        );
        assert_eq!(schema.by_short_name("doorID").unwrap().position(), Some(0));
        assert_eq!(schema.by_short_name("extra").unwrap().position(), Some(1));
        assert_eq!(schema.positional_at(2).map(|arg| arg.name()), None);
    }

    #[test]
    fn lookup() {
        let schema = ArgumentSchema::new(
            "test",
            vec![ArgumentConfig::named("p").long("player")],
            Some(Argument::help()),
        )
        .unwrap();

        assert_eq!(schema.lookup("p").unwrap().name(), "p");
        assert_eq!(schema.lookup("player").unwrap().name(), "p");
        assert_eq!(schema.lookup_flag("help", true).unwrap().name(), "h");
        assert_eq!(schema.lookup_flag("p", true).unwrap().name(), "p");
        assert!(schema.lookup("x").is_none());
    }

    #[test]
    fn repeatable_positional() {
        let schema = ArgumentSchema::new(
            "test",
            vec![
                ArgumentConfig::positional("first").required(),
                ArgumentConfig::positional("rest").repeatable(),
            ],
            None,
        )
        .unwrap();
        assert_eq!(schema.positional_at(5).map(|arg| arg.name()), Some("rest"));

        let err = ArgumentSchema::new(
            "test",
            vec![
                ArgumentConfig::positional("rest").required().repeatable(),
                ArgumentConfig::positional("last"),
            ],
            None,
        )
        .unwrap_err();
        match err {
            DefinitionError::InvalidArgument { argument, .. } => assert_eq!(argument, "rest"),
            err => panic!("unexpected error: {}", err),
        }
    }

    #[test]
    fn duplicate_names() {
        let err = ArgumentSchema::new(
            "test",
            vec![ArgumentConfig::named("h")],
            Some(Argument::help()),
        )
        .unwrap_err();
        assert_eq!(
            err,
            DefinitionError::DuplicateArgument {
                command: "test".to_owned(),
                argument: "h".to_owned(),
            }
        );

        assert!(ArgumentSchema::new(
            "test",
            vec![
                ArgumentConfig::named("p").long("player"),
                ArgumentConfig::named("player"),
            ],
            None,
        )
        .is_err());
    }
}
