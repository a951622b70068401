use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::argument::{Argument, Cardinality, Value};
use crate::command::Command;
use crate::issuer::Issuer;

/// The value(s) bound to one argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedArgument {
    Single(Value),
    Repeated(Vec<Value>),
}

impl ParsedArgument {
    /// The first occurrence of a parsed argument.
    pub fn new(cardinality: Cardinality, value: Value) -> ParsedArgument {
        match cardinality {
            Cardinality::Single => ParsedArgument::Single(value),
            Cardinality::Repeatable => ParsedArgument::Repeated(vec![value]),
        }
    }

    /// Merges another occurrence: repeated arguments append, single ones are
    /// overwritten.
    pub fn merge(&mut self, value: Value) {
        match self {
            ParsedArgument::Single(current) => *current = value,
            ParsedArgument::Repeated(values) => values.push(value),
        }
    }

    /// The binding of an argument absent from the input, if it has one.
    pub fn default_for(arg: &Argument) -> Option<ParsedArgument> {
        match (arg.cardinality(), arg.default_value()) {
            (cardinality, Some(value)) => Some(ParsedArgument::new(cardinality, value)),
            (Cardinality::Repeatable, None) => Some(ParsedArgument::Repeated(Vec::new())),
            (Cardinality::Single, None) => None,
        }
    }

    /// The single value, or the last one of a repeated argument.
    pub fn value(&self) -> Option<&Value> {
        match self {
            ParsedArgument::Single(value) => Some(value),
            ParsedArgument::Repeated(values) => values.last(),
        }
    }

    pub fn values(&self) -> &[Value] {
        match self {
            ParsedArgument::Single(value) => std::slice::from_ref(value),
            ParsedArgument::Repeated(values) => values,
        }
    }
}

/// The outcome of the argument phase.
#[derive(Debug, Clone, PartialEq)]
pub enum Arguments {
    /// Help was requested: nothing else in the input is meaningful.
    HelpRequested,
    /// Bindings keyed by each argument's short name.
    Values(BTreeMap<String, ParsedArgument>),
}

/// A fully parsed command, ready to be handed to its action.
#[derive(Clone)]
pub struct ParseResult {
    command: Arc<Command>,
    arguments: Arguments,
    issuer: Arc<dyn Issuer>,
}

impl ParseResult {
    pub fn new(command: Arc<Command>, arguments: Arguments, issuer: Arc<dyn Issuer>) -> ParseResult {
        ParseResult {
            command,
            arguments,
            issuer,
        }
    }

    pub fn command(&self) -> &Arc<Command> {
        &self.command
    }

    pub fn issuer(&self) -> &dyn Issuer {
        &*self.issuer
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Callers must check this before dispatching.
    pub fn is_help_requested(&self) -> bool {
        self.arguments == Arguments::HelpRequested
    }

    /// Looks up an argument by its short or long name.
    pub fn get(&self, name: &str) -> Option<&ParsedArgument> {
        let values = match &self.arguments {
            Arguments::Values(values) => values,
            Arguments::HelpRequested => return None,
        };

        let arg = self.command.schema().lookup(name)?;
        values.get(arg.name())
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(|parsed| parsed.value())
    }

    pub fn values(&self, name: &str) -> &[Value] {
        self.get(name).map(|parsed| parsed.values()).unwrap_or(&[])
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(|value| value.as_str())
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.value(name).and_then(|value| value.as_integer())
    }

    pub fn decimal(&self, name: &str) -> Option<f64> {
        self.value(name).and_then(|value| value.as_decimal())
    }

    /// The state of a valueless argument. Unknown names read as `false`.
    pub fn flag(&self, name: &str) -> bool {
        self.value(name)
            .and_then(|value| value.as_bool())
            .unwrap_or(false)
    }

    /// Runs the command's action. Returns `false` without running anything
    /// if help was requested or the command has no action.
    pub fn dispatch(&self) -> Result<bool, failure::Error> {
        if self.is_help_requested() {
            return Ok(false);
        }

        match self.command.action() {
            Some(action) => {
                trace!("dispatch: {}", self.command.path());
                action(self)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl PartialEq for ParseResult {
    fn eq(&self, other: &ParseResult) -> bool {
        self.command.path() == other.command.path()
            && self.arguments == other.arguments
            && self.issuer.name() == other.issuer.name()
    }
}

impl fmt::Debug for ParseResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ParseResult")
            .field("command", &self.command.path())
            .field("arguments", &self.arguments)
            .field("issuer", &self.issuer.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argument::ArgumentConfig;
    use pretty_assertions::assert_eq;

    #[test]
    fn merging() {
        let mut single = ParsedArgument::new(Cardinality::Single, Value::from("5"));
        single.merge(Value::from("9"));
        assert_eq!(single, ParsedArgument::Single(Value::from("9")));

        let mut repeated = ParsedArgument::new(Cardinality::Repeatable, Value::from("a"));
        repeated.merge(Value::from("b"));
        assert_eq!(
            repeated.values(),
            &[Value::from("a"), Value::from("b")][..]
        );
        assert_eq!(repeated.value(), Some(&Value::from("b")));
    }

    #[test]
    fn defaults() {
        let flag = Argument::new("t", ArgumentConfig::flag("a")).unwrap();
        assert_eq!(
            ParsedArgument::default_for(&flag),
            Some(ParsedArgument::Single(Value::Boolean(false)))
        );

        let list = Argument::new("t", ArgumentConfig::named("p").repeatable()).unwrap();
        assert_eq!(
            ParsedArgument::default_for(&list),
            Some(ParsedArgument::Repeated(vec![]))
        );

        let plain = Argument::new("t", ArgumentConfig::named("x")).unwrap();
        assert_eq!(ParsedArgument::default_for(&plain), None);

        let with_default = Argument::new("t", ArgumentConfig::named("x").default_value("y")).unwrap();
        assert_eq!(
            ParsedArgument::default_for(&with_default),
            Some(ParsedArgument::Single(Value::from("y")))
        );
    }
}
