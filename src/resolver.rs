//! Finds the deepest command named by the leading tokens.
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::command::Command;
use crate::error::{CommandError, ErrorKind, Result};

/// The command the leading tokens resolve to and the index of the token
/// naming it. Tokens after `index` belong to the argument phase.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub command: Arc<Command>,
    pub index: usize,
}

/// Walks down from the root command named by `tokens[0]` for as long as the
/// next token names a child. An unknown token stops the descent without an
/// error since it may be an argument value.
pub fn resolve<S: AsRef<str>>(
    roots: &BTreeMap<String, Arc<Command>>,
    tokens: &[S],
    capture_backtraces: bool,
) -> Result<Resolved> {
    let not_found = |name: &str| {
        CommandError::with_diagnostics(
            ErrorKind::CommandNotFound {
                name: name.to_owned(),
            },
            capture_backtraces,
        )
    };

    let first = match tokens.first() {
        Some(first) => first.as_ref(),
        None => return Err(not_found("")),
    };

    let mut current = match roots.get(first) {
        Some(root) => root.clone(),
        None => return Err(not_found(first)),
    };

    // A root token cannot name a subcommand.
    if current.parent().is_some() {
        debug!("resolve: `{}' is a subcommand", first);
        return Err(not_found(first));
    }

    let mut index = 0;
    while current.has_children() && index + 1 < tokens.len() {
        let next = tokens[index + 1].as_ref();
        let child = match current.child(next) {
            Some(child) => child.clone(),
            None => break,
        };

        if child.parent() != Some(current.name()) {
            debug!(
                "resolve: `{}' was reached from `{}' but belongs to `{:?}'",
                next,
                current.path(),
                child.parent()
            );
            return Err(not_found(next));
        }

        trace!("resolve: {} -> {}", current.path(), child.name());
        current = child;
        index += 1;
    }

    Ok(Resolved {
        command: current,
        index,
    })
}
