//! Parses hierarchical command lines (`bigdoors addowner myDoor -p=pim`) into
//! typed, validated arguments and suggests completions for partial ones.
//!
//! Build a [`CommandRegistry`] once from [`CommandConfig`]s, then share it
//! behind an `Arc`: [`CommandRegistry::parse`] for submitted lines, a
//! [`Suggester`] for tab completion.
#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate failure;

pub mod argument;
pub mod cache;
pub mod command;
pub mod config;
pub mod demo;
pub mod error;
pub mod issuer;
pub mod logger;
pub mod parser;
pub mod registry;
pub mod resolver;
pub mod result;
pub mod schema;
pub mod suggest;
pub mod tokenizer;
pub mod worker;

pub use crate::argument::{Argument, ArgumentConfig, CompletionRequest, Value, ValueType};
pub use crate::cache::SuggestionCache;
pub use crate::command::{Command, CommandConfig};
pub use crate::config::{CacheConfig, ParserConfig};
pub use crate::error::{CommandError, DefinitionError, ErrorKind};
pub use crate::issuer::{ConsoleIssuer, Issuer, SimpleIssuer};
pub use crate::registry::CommandRegistry;
pub use crate::result::{Arguments, ParseResult, ParsedArgument};
pub use crate::suggest::Suggester;
