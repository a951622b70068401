//! The argument phase: binds the tokens following a resolved command to its
//! argument declarations.
use std::collections::BTreeMap;

use crate::argument::{Argument, Value};
use crate::command::Command;
use crate::config::ParserConfig;
use crate::error::{CommandError, ErrorKind, Result};
use crate::result::{Arguments, ParsedArgument};

/// A named-argument token split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagToken<'a> {
    /// The name without its prefix characters.
    pub name: &'a str,
    /// Written with a doubled prefix (`--name`).
    pub long: bool,
    /// The text after the separator, if the token has one.
    pub value: Option<&'a str>,
}

/// Returns `true` if `token` is written as a named argument.
pub fn is_flag(config: &ParserConfig, token: &str) -> bool {
    let mut chars = token.chars();
    chars.next() == Some(config.flag_prefix) && chars.next().is_some()
}

/// Splits a named-argument token. Returns `None` for positional tokens.
pub fn split_flag<'a>(config: &ParserConfig, token: &'a str) -> Option<FlagToken<'a>> {
    if !is_flag(config, token) {
        return None;
    }

    let prefix_len = config.flag_prefix.len_utf8();
    let mut rest = &token[prefix_len..];
    let long = rest.starts_with(config.flag_prefix);
    if long {
        rest = &rest[prefix_len..];
    }

    let (name, value) = if config.space_separated {
        (rest, None)
    } else {
        match rest.find(config.separator) {
            Some(at) => (&rest[..at], Some(&rest[at + config.separator.len_utf8()..])),
            None => (rest, None),
        }
    };

    Some(FlagToken { name, long, value })
}

struct ArgumentParser<'a> {
    config: &'a ParserConfig,
    command: &'a Command,
    values: BTreeMap<String, ParsedArgument>,
}

impl<'a> ArgumentParser<'a> {
    fn error(&self, kind: ErrorKind) -> CommandError {
        CommandError::with_diagnostics(kind, self.config.capture_backtraces)
    }

    fn non_existing(&self, argument: &str) -> CommandError {
        self.error(ErrorKind::NonExistingArgument {
            command: self.command.path().to_owned(),
            argument: argument.to_owned(),
        })
    }

    fn missing(&self, argument: &str) -> CommandError {
        self.error(ErrorKind::MissingArgument {
            command: self.command.path().to_owned(),
            argument: argument.to_owned(),
        })
    }

    /// Converts, validates and merges one occurrence of `arg`.
    fn bind(&mut self, arg: &Argument, raw: &str) -> Result<()> {
        let value = arg.convert(raw).map_err(|reason| {
            self.error(ErrorKind::IllegalValue {
                command: self.command.path().to_owned(),
                argument: arg.name().to_owned(),
                value: raw.to_owned(),
                reason,
            })
        })?;

        if !arg.validate(&value) {
            return Err(self.error(ErrorKind::ValidationFailure {
                command: self.command.path().to_owned(),
                argument: arg.name().to_owned(),
                value: raw.to_owned(),
            }));
        }

        self.merge(arg, value)
    }

    fn merge(&mut self, arg: &Argument, value: Value) -> Result<()> {
        if !self.values.contains_key(arg.name()) {
            self.values.insert(
                arg.name().to_owned(),
                ParsedArgument::new(arg.cardinality(), value),
            );
            return Ok(());
        }

        // A repeated flag has no value to lose.
        if !arg.is_repeatable() && !arg.is_valueless() && self.config.reject_duplicates {
            return Err(self.error(ErrorKind::DuplicateArgument {
                command: self.command.path().to_owned(),
                argument: arg.name().to_owned(),
            }));
        }

        if let Some(parsed) = self.values.get_mut(arg.name()) {
            parsed.merge(value);
        }

        Ok(())
    }

    fn parse(mut self, tokens: &[String]) -> Result<Arguments> {
        let command = self.command;
        let schema = command.schema();
        let mut positional_slot = 0;
        let mut iter = tokens.iter();
        while let Some(token) = iter.next() {
            match split_flag(self.config, token) {
                Some(flag) => {
                    let arg = match schema.lookup_flag(flag.name, flag.long) {
                        Some(arg) if arg.is_named() => arg,
                        _ => return Err(self.non_existing(flag.name)),
                    };

                    if let Some(present) = arg.flag_value() {
                        if let Some(value) = flag.value {
                            return Err(self.error(ErrorKind::IllegalValue {
                                command: self.command.path().to_owned(),
                                argument: arg.name().to_owned(),
                                value: value.to_owned(),
                                reason: "the argument does not take a value".to_owned(),
                            }));
                        }
                        self.merge(arg, present.into())?;
                        continue;
                    }

                    let raw = if self.config.space_separated {
                        iter.next().map(|s| s.as_str())
                    } else {
                        flag.value
                    };

                    match raw {
                        Some(raw) => self.bind(arg, raw)?,
                        None => return Err(self.missing(arg.name())),
                    }
                }
                None => {
                    let arg = match schema.positional_at(positional_slot) {
                        Some(arg) => arg,
                        None => return Err(self.non_existing(token)),
                    };
                    positional_slot += 1;
                    self.bind(arg, token)?;
                }
            }
        }

        let requests_help = self
            .command
            .help()
            .and_then(|help| self.values.get(help.name()))
            .map(|parsed| parsed.value() == Some(&Value::Boolean(true)))
            .unwrap_or(false);
        if requests_help {
            trace!("parse: help requested for {}", self.command.path());
            return Ok(Arguments::HelpRequested);
        }

        for arg in schema.arguments() {
            if self.values.contains_key(arg.name()) {
                continue;
            }

            if arg.is_required() {
                debug!("parse: {}: missing `{}'", self.command.path(), arg.name());
                return Err(self.missing(arg.name()));
            }

            if let Some(default) = ParsedArgument::default_for(arg) {
                self.values.insert(arg.name().to_owned(), default);
            }
        }

        Ok(Arguments::Values(self.values))
    }
}

/// Parses `tokens`, the tokens following the command, against `command`'s
/// schema. The first error stops the parse.
pub fn parse_arguments(
    config: &ParserConfig,
    command: &Command,
    tokens: &[String],
) -> Result<Arguments> {
    let parser = ArgumentParser {
        config,
        command,
        values: BTreeMap::new(),
    };

    parser.parse(tokens)
}
