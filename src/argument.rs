//! Argument declarations: how an argument is written, how many times it may
//! appear, and how its raw text turns into a [`Value`].
use std::fmt;
use std::sync::Arc;

use crate::command::Command;
use crate::error::DefinitionError;
use crate::issuer::Issuer;

/// A converted argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            Value::Decimal(n) => Some(*n),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Decimal(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Value {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Value {
        Value::Decimal(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Boolean(b)
    }
}

/// Converts raw text into a value. `Err` carries a human-readable reason.
pub type Converter = Arc<dyn Fn(&str) -> Result<Value, String> + Send + Sync>;
/// Accepts or rejects a converted value.
pub type Validator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
/// Produces completion candidates for an argument's value.
pub type CompletionProvider = Arc<dyn Fn(&CompletionRequest) -> Vec<String> + Send + Sync>;

/// What a completion provider gets to see.
pub struct CompletionRequest<'a> {
    pub issuer: &'a dyn Issuer,
    pub command: &'a Command,
    /// The (possibly truncated) value typed so far. Providers may use it to
    /// narrow expensive lookups; the engine filters by prefix regardless.
    pub partial: &'a str,
}

#[derive(Clone)]
pub enum ValueType {
    Text,
    Integer,
    Decimal,
    Boolean,
    Custom(Converter),
}

impl Default for ValueType {
    fn default() -> ValueType {
        ValueType::Text
    }
}

impl fmt::Debug for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValueType::Text => write!(f, "Text"),
            ValueType::Integer => write!(f, "Integer"),
            ValueType::Decimal => write!(f, "Decimal"),
            ValueType::Boolean => write!(f, "Boolean"),
            ValueType::Custom(_) => write!(f, "Custom"),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

impl ValueType {
    pub fn convert(&self, raw: &str) -> Result<Value, String> {
        match self {
            ValueType::Text => Ok(Value::Text(raw.to_owned())),
            ValueType::Integer => raw
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|err| err.to_string()),
            ValueType::Decimal => raw
                .parse::<f64>()
                .map(Value::Decimal)
                .map_err(|err| err.to_string()),
            ValueType::Boolean => parse_bool(raw)
                .map(Value::Boolean)
                .ok_or_else(|| "expected true or false".to_owned()),
            ValueType::Custom(convert) => convert(raw),
        }
    }
}

/// How an argument is written on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentForm {
    /// Consumed by position, no prefix.
    Positional,
    /// `-name=value` or `--long=value`.
    Named,
    /// `-name` alone. Sets the given value when present and its negation
    /// when absent.
    Flag(bool),
}

impl Default for ArgumentForm {
    fn default() -> ArgumentForm {
        ArgumentForm::Named
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// A later occurrence replaces (or duplicates, see `ParserConfig`) the
    /// earlier one.
    Single,
    /// Occurrences accumulate in order.
    Repeatable,
}

impl Default for Cardinality {
    fn default() -> Cardinality {
        Cardinality::Single
    }
}

/// A plain description of an argument. Turned into an [`Argument`] (and
/// validated) when its command is built.
#[derive(Clone, Default)]
pub struct ArgumentConfig {
    pub short_name: String,
    pub long_name: Option<String>,
    pub summary: Option<String>,
    pub form: ArgumentForm,
    pub required: bool,
    pub cardinality: Cardinality,
    pub value_type: ValueType,
    pub default: Option<Value>,
    pub validator: Option<Validator>,
    pub completions: Option<CompletionProvider>,
}

impl ArgumentConfig {
    pub fn positional(name: &str) -> ArgumentConfig {
        ArgumentConfig {
            short_name: name.to_owned(),
            form: ArgumentForm::Positional,
            ..Default::default()
        }
    }

    pub fn named(short_name: &str) -> ArgumentConfig {
        ArgumentConfig {
            short_name: short_name.to_owned(),
            form: ArgumentForm::Named,
            ..Default::default()
        }
    }

    /// A valueless argument which is `true` when present.
    pub fn flag(short_name: &str) -> ArgumentConfig {
        ArgumentConfig {
            short_name: short_name.to_owned(),
            form: ArgumentForm::Flag(true),
            ..Default::default()
        }
    }

    pub fn long(mut self, long_name: &str) -> ArgumentConfig {
        self.long_name = Some(long_name.to_owned());
        self
    }

    pub fn summary(mut self, summary: &str) -> ArgumentConfig {
        self.summary = Some(summary.to_owned());
        self
    }

    pub fn required(mut self) -> ArgumentConfig {
        self.required = true;
        self
    }

    pub fn repeatable(mut self) -> ArgumentConfig {
        self.cardinality = Cardinality::Repeatable;
        self
    }

    pub fn value_type(mut self, value_type: ValueType) -> ArgumentConfig {
        self.value_type = value_type;
        self
    }

    pub fn default_value<V: Into<Value>>(mut self, value: V) -> ArgumentConfig {
        self.default = Some(value.into());
        self
    }

    pub fn validator(mut self, validator: Validator) -> ArgumentConfig {
        self.validator = Some(validator);
        self
    }

    pub fn completions(mut self, provider: CompletionProvider) -> ArgumentConfig {
        self.completions = Some(provider);
        self
    }
}

pub const HELP_NAME: &str = "h";
pub const HELP_LONG_NAME: &str = "help";

/// Names the tokenizer can keep in one token. Whether the parser can
/// address them depends on its configuration, see
/// `ParserConfig::is_addressable`.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(|ch: char| ch.is_whitespace() || ch == '"')
}

/// A validated argument declaration. Immutable once built.
#[derive(Clone)]
pub struct Argument {
    short_name: String,
    long_name: Option<String>,
    summary: Option<String>,
    form: ArgumentForm,
    required: bool,
    cardinality: Cardinality,
    value_type: ValueType,
    default: Option<Value>,
    validator: Option<Validator>,
    completions: Option<CompletionProvider>,
    /// The slot among the command's positional arguments.
    position: Option<usize>,
}

impl Argument {
    /// Validates `config`. `command` is only used in error messages.
    pub fn new(command: &str, config: ArgumentConfig) -> Result<Argument, DefinitionError> {
        let invalid = |reason: &str| DefinitionError::InvalidArgument {
            command: command.to_owned(),
            argument: config.short_name.clone(),
            reason: reason.to_owned(),
        };

        for name in Some(&config.short_name).into_iter().chain(config.long_name.as_ref()) {
            if !is_valid_name(name) {
                return Err(DefinitionError::InvalidArgumentName {
                    command: command.to_owned(),
                    argument: name.clone(),
                });
            }
        }

        if let ArgumentForm::Flag(_) = config.form {
            if config.required {
                return Err(invalid("a valueless argument cannot be required"));
            }
            if config.cardinality == Cardinality::Repeatable {
                return Err(invalid("a valueless argument cannot be repeatable"));
            }
            if config.default.is_some() {
                return Err(invalid("a valueless argument takes its default from its flag value"));
            }
        }

        if config.required && config.default.is_some() {
            return Err(invalid("a required argument cannot have a default value"));
        }

        // The default goes through the same conversion and validation as
        // typed input.
        let default = match &config.default {
            Some(value) => {
                let converted = config
                    .value_type
                    .convert(&value.to_string())
                    .map_err(|err| invalid(&format!("default value {}: {}", value, err)))?;
                if let Some(validator) = &config.validator {
                    if !validator(&converted) {
                        return Err(invalid(&format!("default value {} is rejected", value)));
                    }
                }
                Some(converted)
            }
            None => None,
        };

        Ok(Argument {
            short_name: config.short_name,
            long_name: config.long_name,
            summary: config.summary,
            form: config.form,
            required: config.required,
            cardinality: config.cardinality,
            value_type: config.value_type,
            default,
            validator: config.validator,
            completions: config.completions,
            position: None,
        })
    }

    /// The `-h`/`--help` argument every command gets by default.
    pub fn help() -> Argument {
        Argument {
            short_name: HELP_NAME.to_owned(),
            long_name: Some(HELP_LONG_NAME.to_owned()),
            summary: Some("Shows the usage of this command.".to_owned()),
            form: ArgumentForm::Flag(true),
            required: false,
            cardinality: Cardinality::Single,
            value_type: ValueType::Boolean,
            default: None,
            validator: None,
            completions: None,
            position: None,
        }
    }

    pub(crate) fn set_position(&mut self, position: usize) {
        self.position = Some(position);
    }

    /// The short name, which is also the argument's identity in a parse
    /// result.
    pub fn name(&self) -> &str {
        &self.short_name
    }

    pub fn long_name(&self) -> Option<&str> {
        self.long_name.as_deref()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn form(&self) -> ArgumentForm {
        self.form
    }

    pub fn is_positional(&self) -> bool {
        self.form == ArgumentForm::Positional
    }

    pub fn is_named(&self) -> bool {
        !self.is_positional()
    }

    pub fn is_valueless(&self) -> bool {
        match self.form {
            ArgumentForm::Flag(_) => true,
            _ => false,
        }
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn is_repeatable(&self) -> bool {
        self.cardinality == Cardinality::Repeatable
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    /// The value a present flag stands for.
    pub fn flag_value(&self) -> Option<bool> {
        match self.form {
            ArgumentForm::Flag(value) => Some(value),
            _ => None,
        }
    }

    /// The value used when the argument is absent from the input.
    pub fn default_value(&self) -> Option<Value> {
        match self.form {
            ArgumentForm::Flag(value) => Some(Value::Boolean(!value)),
            _ => self.default.clone(),
        }
    }

    pub fn convert(&self, raw: &str) -> Result<Value, String> {
        self.value_type.convert(raw)
    }

    pub fn validate(&self, value: &Value) -> bool {
        match &self.validator {
            Some(validator) => validator(value),
            None => true,
        }
    }

    /// Completion candidates for this argument's value, unfiltered.
    pub fn complete(&self, request: &CompletionRequest) -> Vec<String> {
        match (&self.completions, &self.value_type) {
            (Some(provider), _) => provider(request),
            (None, ValueType::Boolean) => vec!["true".to_owned(), "false".to_owned()],
            (None, _) => Vec::new(),
        }
    }

    /// `-name` as typed with `prefix`.
    pub fn short_flag(&self, prefix: char) -> String {
        format!("{}{}", prefix, self.short_name)
    }

    /// `--long-name` as typed with `prefix`.
    pub fn long_flag(&self, prefix: char) -> Option<String> {
        self.long_name
            .as_ref()
            .map(|long| format!("{}{}{}", prefix, prefix, long))
    }
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Argument")
            .field("short_name", &self.short_name)
            .field("long_name", &self.long_name)
            .field("form", &self.form)
            .field("required", &self.required)
            .field("cardinality", &self.cardinality)
            .field("value_type", &self.value_type)
            .field("position", &self.position)
            .finish()
    }
}

pub mod validators {
    use super::*;

    /// Accepts integers and decimals within `min..=max`.
    pub fn range(min: f64, max: f64) -> Validator {
        Arc::new(move |value: &Value| match value.as_decimal() {
            Some(n) => min <= n && n <= max,
            None => false,
        })
    }

    /// Accepts text values from `choices`.
    pub fn one_of(choices: &[&str]) -> Validator {
        let choices: Vec<String> = choices.iter().map(|s| (*s).to_owned()).collect();
        Arc::new(move |value: &Value| match value.as_str() {
            Some(s) => choices.iter().any(|choice| choice == s),
            None => false,
        })
    }

    pub fn non_empty() -> Validator {
        Arc::new(|value: &Value| match value {
            Value::Text(s) => !s.trim().is_empty(),
            _ => true,
        })
    }
}

pub mod completions {
    use super::*;

    /// Always offers `candidates`.
    pub fn fixed(candidates: &[&str]) -> CompletionProvider {
        let candidates: Vec<String> = candidates.iter().map(|s| (*s).to_owned()).collect();
        Arc::new(move |_: &CompletionRequest| candidates.clone())
    }
}
