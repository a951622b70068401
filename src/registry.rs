use std::collections::BTreeMap;
use std::sync::Arc;

use crate::command::{Command, CommandConfig};
use crate::config::ParserConfig;
use crate::error::{CommandError, DefinitionError, ErrorKind, Result};
use crate::issuer::Issuer;
use crate::parser::parse_arguments;
use crate::resolver::{resolve, Resolved};
use crate::result::{Arguments, ParseResult};
use crate::tokenizer::tokenize;

/// The table of root commands. Built once at startup and read-only
/// afterwards; share it behind an `Arc` to parse from several threads.
#[derive(Debug)]
pub struct CommandRegistry {
    config: ParserConfig,
    roots: BTreeMap<String, Arc<Command>>,
}

impl CommandRegistry {
    pub fn new(config: ParserConfig) -> std::result::Result<CommandRegistry, DefinitionError> {
        config.validate()?;
        Ok(CommandRegistry {
            config,
            roots: BTreeMap::new(),
        })
    }

    pub fn with_defaults() -> CommandRegistry {
        CommandRegistry {
            config: ParserConfig::default(),
            roots: BTreeMap::new(),
        }
    }

    /// Builds `config` and its subtree and registers it as a root command.
    pub fn register(
        &mut self,
        config: CommandConfig,
    ) -> std::result::Result<Arc<Command>, DefinitionError> {
        if self.roots.contains_key(&config.name) {
            return Err(DefinitionError::DuplicateCommand { name: config.name });
        }

        let command = Command::new(config)?;
        self.check_names(&command)?;
        trace!("register: {}", command.path());
        self.roots.insert(command.name().to_owned(), command.clone());
        Ok(command)
    }

    /// Rejects named arguments in `command`'s subtree that the configured
    /// flag syntax could not address.
    fn check_names(&self, command: &Command) -> std::result::Result<(), DefinitionError> {
        for arg in command.schema().arguments().iter().filter(|arg| arg.is_named()) {
            for name in Some(arg.name()).into_iter().chain(arg.long_name()) {
                if !self.config.is_addressable(name) {
                    return Err(DefinitionError::InvalidArgumentName {
                        command: command.path().to_owned(),
                        argument: name.to_owned(),
                    });
                }
            }
        }

        for child in command.children() {
            self.check_names(child)?;
        }

        Ok(())
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Root commands ordered by name.
    pub fn roots(&self) -> impl Iterator<Item = &Arc<Command>> {
        self.roots.values()
    }

    pub fn root(&self, name: &str) -> Option<&Arc<Command>> {
        self.roots.get(name)
    }

    /// Looks up a command by its path, e.g. `["bigdoors", "addowner"]`.
    pub fn find(&self, path: &[&str]) -> Option<&Arc<Command>> {
        let (first, rest) = path.split_first()?;
        let mut current = self.roots.get(*first)?;
        for name in rest {
            current = current.child(name)?;
        }
        Some(current)
    }

    fn error(&self, kind: ErrorKind) -> CommandError {
        CommandError::with_diagnostics(kind, self.config.capture_backtraces)
    }

    /// The tree-descent phase alone.
    pub fn resolve<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Resolved> {
        resolve(&self.roots, tokens, self.config.capture_backtraces)
    }

    /// Tokenizes and parses a submitted line. An open quoted span is an
    /// error here.
    pub fn parse(&self, issuer: Arc<dyn Issuer>, input: &str) -> Result<ParseResult> {
        let tokenized = tokenize(input);
        if !tokenized.well_formed {
            return Err(self.error(ErrorKind::UnmatchedQuote {
                input: input.to_owned(),
            }));
        }

        self.parse_tokens(issuer, &tokenized.tokens)
    }

    /// Parses pre-split tokens.
    pub fn parse_tokens(&self, issuer: Arc<dyn Issuer>, tokens: &[String]) -> Result<ParseResult> {
        let Resolved { command, index } = self.resolve(tokens)?;

        if !command.is_permitted(&*issuer) {
            debug!("parse: {} denied to {}", command.path(), issuer.name());
            return Err(self.error(ErrorKind::NoPermission {
                command: command.path().to_owned(),
                issuer: issuer.name().to_owned(),
            }));
        }

        let rest = &tokens[index + 1..];
        let arguments = if command.is_virtual() {
            match rest.first() {
                // A group on its own shows its usage.
                None => Arguments::HelpRequested,
                Some(token) if self.is_help_token(&command, token) => {
                    Arguments::HelpRequested
                }
                Some(token) => {
                    return Err(self.error(ErrorKind::CommandNotFound {
                        name: token.to_owned(),
                    }));
                }
            }
        } else {
            parse_arguments(&self.config, &command, rest)?
        };

        Ok(ParseResult::new(command, arguments, issuer))
    }

    /// Uncached suggestions for a partial line. See [`Suggester`] for the
    /// cached front end.
    ///
    /// [`Suggester`]: crate::suggest::Suggester
    pub fn suggest(&self, issuer: &dyn Issuer, input: &str) -> Vec<String> {
        crate::suggest::suggest(self, issuer, input)
    }

    fn is_help_token(&self, command: &Command, token: &str) -> bool {
        match crate::parser::split_flag(&self.config, token) {
            Some(flag) => match (command.help(), command.schema().lookup_flag(flag.name, flag.long)) {
                (Some(help), Some(arg)) => help.name() == arg.name() && flag.value.is_none(),
                _ => false,
            },
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argument::{ArgumentConfig, Value};
    use crate::issuer::{permissions, ConsoleIssuer, SimpleIssuer};
    use pretty_assertions::assert_eq;

    fn registry() -> CommandRegistry {
        let mut registry = CommandRegistry::with_defaults();
        registry
            .register(
                CommandConfig::group("root").subcommand(
                    CommandConfig::new("leaf")
                        .argument(ArgumentConfig::positional("x").required())
                        .permission(permissions::node("root.leaf")),
                ),
            )
            .unwrap();
        registry
    }

    fn console() -> Arc<dyn Issuer> {
        Arc::new(ConsoleIssuer)
    }

    #[test]
    fn registration() {
        let mut registry = registry();
        assert_eq!(
            registry.register(CommandConfig::new("root")).unwrap_err(),
            DefinitionError::DuplicateCommand {
                name: "root".to_owned()
            }
        );
        assert!(registry.find(&["root", "leaf"]).is_some());
        assert!(registry.find(&["leaf"]).is_none());
        assert!(registry.find(&[]).is_none());

        let config = ParserConfig {
            separator: '-',
            ..ParserConfig::default()
        };
        assert!(CommandRegistry::new(config).is_err());
    }

    #[test]
    fn unaddressable_names() {
        let named = |name: &str| {
            CommandConfig::group("root")
                .subcommand(CommandConfig::new("leaf").argument(ArgumentConfig::named(name)))
        };

        let mut registry = CommandRegistry::with_defaults();
        assert_eq!(
            registry.register(named("a=b")).unwrap_err(),
            DefinitionError::InvalidArgumentName {
                command: "root leaf".to_owned(),
                argument: "a=b".to_owned(),
            }
        );
        assert!(registry.register(named("-x")).is_err());
        assert!(registry.root("root").is_none());
        assert!(registry.register(named("a:b")).is_ok());

        let config = ParserConfig {
            separator: ':',
            ..ParserConfig::default()
        };
        let mut registry = CommandRegistry::new(config).unwrap();
        assert!(registry.register(named("a:b")).is_err());
        assert!(registry
            .register(CommandConfig::new("long").argument(ArgumentConfig::named("x").long("to:do")))
            .is_err());
        assert!(registry.register(named("a=b")).is_ok());

        // Positional names never appear on the line.
        let mut registry = CommandRegistry::with_defaults();
        assert!(registry
            .register(CommandConfig::new("pos").argument(ArgumentConfig::positional("a=b")))
            .is_ok());
    }

    #[test]
    fn parsing() {
        let registry = registry();
        let result = registry.parse(console(), "root leaf \"a b\"").unwrap();
        assert_eq!(result.command().path(), "root leaf");
        assert_eq!(result.value("x"), Some(&Value::from("a b")));
        assert_eq!(result.issuer().name(), "console");

        let tokens = vec!["root".to_owned(), "leaf".to_owned(), "a b".to_owned()];
        assert_eq!(registry.parse_tokens(console(), &tokens).unwrap(), result);
    }

    #[test]
    fn virtual_commands() {
        let registry = registry();
        assert!(registry.parse(console(), "root").unwrap().is_help_requested());
        assert!(registry.parse(console(), "root --help").unwrap().is_help_requested());
        assert_eq!(
            registry.parse(console(), "root nope").unwrap_err().into_kind(),
            ErrorKind::CommandNotFound {
                name: "nope".to_owned()
            }
        );
    }

    #[test]
    fn errors() {
        let registry = registry();
        let err = registry.parse(console(), "root leaf \"a b").unwrap_err();
        assert!(err.is_recoverable());

        let bob: Arc<dyn Issuer> = Arc::new(SimpleIssuer::new("bob"));
        assert_eq!(
            registry.parse(bob, "root leaf x").unwrap_err().into_kind(),
            ErrorKind::NoPermission {
                command: "root leaf".to_owned(),
                issuer: "bob".to_owned(),
            }
        );

        assert_eq!(
            registry.parse(console(), "leaf x").unwrap_err().into_kind(),
            ErrorKind::CommandNotFound {
                name: "leaf".to_owned()
            }
        );
    }
}
